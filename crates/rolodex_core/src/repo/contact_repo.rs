//! Contact repository contracts and directory-backed implementation.
//!
//! # Responsibility
//! - Provide list/load/save/delete over one contacts directory.
//! - Keep file layout and codec details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call `Contact::validate()` before touching disk.
//! - Every save replaces the whole file atomically and refreshes `updated_at`.
//! - Bulk listing skips unparseable files; single loads surface the error.

use crate::model::contact::{Contact, ContactValidationError, CONTACT_KIND};
use crate::repo::atomic_write::write_atomically;
use crate::repo::codec::{encode_contact, ParseError};
use crate::repo::index_counter::IndexCounter;
use crate::repo::naming::record_filename;
use crate::repo::scanner::{ensure_directory, parse_contact_file, scan_directory};
use chrono::Utc;
use log::{debug, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for contact persistence and lookup.
#[derive(Debug)]
pub enum RepoError {
    /// A single record failed to decode.
    Parse { path: PathBuf, source: ParseError },
    /// Root path is missing or not a directory.
    Directory { path: PathBuf, reason: String },
    /// Read, write, rename or remove failed.
    Io { path: PathBuf, source: io::Error },
    /// No record matches the given reference.
    NotFound(String),
    /// Record violates a model invariant.
    Validation(ContactValidationError),
    /// Target file already exists on create.
    AlreadyExists(PathBuf),
    /// Counter state is unreadable or exhausted.
    Counter(String),
}

impl RepoError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Directory { path, reason } => {
                write!(f, "contacts directory `{}` {reason}", path.display())
            }
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::NotFound(reference) => write!(f, "contact not found: {reference}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::AlreadyExists(path) => write!(f, "file already exists: {}", path.display()),
            Self::Counter(message) => write!(f, "index counter error: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::Validation(err) => Some(err),
            Self::Directory { .. }
            | Self::NotFound(_)
            | Self::AlreadyExists(_)
            | Self::Counter(_) => None,
        }
    }
}

impl From<ContactValidationError> for RepoError {
    fn from(value: ContactValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Repository interface for contact records.
pub trait ContactRepository {
    /// Root directory holding the record files.
    fn directory(&self) -> &Path;
    /// Loads every valid record; corrupt files are skipped.
    fn list_contacts(&self) -> RepoResult<Vec<Contact>>;
    /// Loads one record file, surfacing parse errors.
    fn load_contact(&self, path: &Path) -> RepoResult<Contact>;
    /// Writes a new record; fails if its file already exists.
    fn create_contact(&self, contact: &mut Contact) -> RepoResult<()>;
    /// Replaces an existing record's file.
    fn save_contact(&self, contact: &mut Contact) -> RepoResult<()>;
    /// Removes the record's file.
    fn delete_contact(&self, contact: &Contact) -> RepoResult<()>;
}

/// Directory-backed contact repository.
#[derive(Debug, Clone)]
pub struct FileContactRepository {
    dir: PathBuf,
}

impl FileContactRepository {
    /// Binds the repository to an existing directory.
    pub fn open(dir: impl Into<PathBuf>) -> RepoResult<Self> {
        let dir = dir.into();
        ensure_directory(&dir)?;
        Ok(Self { dir })
    }

    /// Default storage path for a record that has none yet.
    pub fn default_path(&self, contact: &Contact) -> PathBuf {
        self.dir.join(record_filename(
            &contact.identifier,
            &contact.title,
            CONTACT_KIND,
        ))
    }

    fn write(&self, contact: &mut Contact) -> RepoResult<()> {
        contact.validate()?;
        if contact.path.as_os_str().is_empty() {
            contact.path = self.default_path(contact);
        }
        contact.updated_at = Some(Utc::now());

        let encoded = encode_contact(contact).map_err(|source| RepoError::Parse {
            path: contact.path.clone(),
            source,
        })?;
        write_atomically(&contact.path, encoded.as_bytes())
            .map_err(|err| RepoError::io(&contact.path, err))?;

        debug!(
            "event=contact_save module=repo status=ok index={} identifier={}",
            contact.index, contact.identifier
        );
        Ok(())
    }
}

impl ContactRepository for FileContactRepository {
    fn directory(&self) -> &Path {
        &self.dir
    }

    fn list_contacts(&self) -> RepoResult<Vec<Contact>> {
        scan_directory(&self.dir)
    }

    fn load_contact(&self, path: &Path) -> RepoResult<Contact> {
        parse_contact_file(path)
    }

    fn create_contact(&self, contact: &mut Contact) -> RepoResult<()> {
        if contact.path.as_os_str().is_empty() {
            contact.path = self.default_path(contact);
        }
        if contact.path.exists() {
            return Err(RepoError::AlreadyExists(contact.path.clone()));
        }
        self.write(contact)?;
        info!(
            "event=contact_create module=repo status=ok index={} identifier={}",
            contact.index, contact.identifier
        );
        Ok(())
    }

    fn save_contact(&self, contact: &mut Contact) -> RepoResult<()> {
        self.write(contact)
    }

    fn delete_contact(&self, contact: &Contact) -> RepoResult<()> {
        match std::fs::remove_file(&contact.path) {
            Ok(()) => {
                info!(
                    "event=contact_delete module=repo status=ok index={} identifier={}",
                    contact.index, contact.identifier
                );
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(RepoError::NotFound(contact.identifier.clone()))
            }
            Err(err) => Err(RepoError::io(&contact.path, err)),
        }
    }
}

/// Assigns indices to records that have none and persists each one.
///
/// Returns how many records were updated.
pub fn assign_missing_indices<R: ContactRepository + ?Sized>(
    repo: &R,
    counter: &IndexCounter,
    contacts: &mut [Contact],
) -> RepoResult<usize> {
    let mut assigned = 0;
    for contact in contacts.iter_mut().filter(|contact| contact.index == 0) {
        contact.index = counter.next_index()?;
        repo.save_contact(contact)?;
        assigned += 1;
    }
    if assigned > 0 {
        info!("event=index_assign module=repo status=ok assigned={assigned}");
    }
    Ok(assigned)
}

/// Finds a record by numeric index first, then by identifier.
pub fn find_contact<'a>(contacts: &'a [Contact], reference: &str) -> Option<&'a Contact> {
    let reference = reference.trim();
    let by_index = reference
        .parse::<u32>()
        .ok()
        .filter(|index| *index > 0)
        .and_then(|index| contacts.iter().find(|contact| contact.index == index));
    by_index.or_else(|| {
        contacts
            .iter()
            .find(|contact| contact.identifier == reference)
    })
}

/// Groups record positions by index, keeping only indices used more than once.
pub fn find_duplicate_indices(contacts: &[Contact]) -> BTreeMap<u32, Vec<usize>> {
    let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (position, contact) in contacts.iter().enumerate() {
        if contact.index > 0 {
            groups.entry(contact.index).or_default().push(position);
        }
    }
    groups.retain(|_, positions| positions.len() > 1);
    groups
}

/// Highest index in use, `0` for none.
pub fn max_index(contacts: &[Contact]) -> u32 {
    contacts
        .iter()
        .map(|contact| contact.index)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{find_contact, find_duplicate_indices, max_index};
    use crate::model::contact::Contact;

    fn contact(identifier: &str, index: u32) -> Contact {
        let mut contact = Contact::new(identifier, identifier);
        contact.index = index;
        contact
    }

    #[test]
    fn find_contact_prefers_index_over_identifier() {
        let contacts = vec![contact("7", 1), contact("20240101T090000", 7)];
        let found = find_contact(&contacts, "7").unwrap();
        assert_eq!(found.identifier, "20240101T090000");
        let by_id = find_contact(&contacts, "20240101T090000").unwrap();
        assert_eq!(by_id.index, 7);
        assert!(find_contact(&contacts, "99").is_none());
    }

    #[test]
    fn duplicate_indices_are_grouped() {
        let contacts = vec![contact("a", 3), contact("b", 3), contact("c", 4), contact("d", 0)];
        let duplicates = find_duplicate_indices(&contacts);
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[&3], vec![0, 1]);
        assert_eq!(max_index(&contacts), 4);
    }
}
