//! Directory scanning for contact files.
//!
//! # Invariants
//! - Only files matching the contact filename convention are decoded.
//! - Records that fail to decode never abort a listing; they are logged and skipped.
//! - Read and traversal failures are returned to the caller.
//! - Order is stable for an unchanged directory (walk sorted by file name).

use crate::model::contact::Contact;
use crate::repo::codec::{decode_contact, ParseError};
use crate::repo::contact_repo::{RepoError, RepoResult};
use crate::repo::naming::parse_contact_filename;
use log::{info, warn};
use std::io;
use std::path::Path;
use std::time::Instant;
use walkdir::WalkDir;

/// Fails with `RepoError::Directory` unless `dir` is an existing directory.
pub fn ensure_directory(dir: &Path) -> RepoResult<()> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(RepoError::Directory {
            path: dir.to_path_buf(),
            reason: "is not a directory".to_string(),
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(RepoError::Directory {
            path: dir.to_path_buf(),
            reason: "does not exist".to_string(),
        }),
        Err(err) => Err(RepoError::Directory {
            path: dir.to_path_buf(),
            reason: format!("cannot be accessed: {err}"),
        }),
    }
}

/// Reads and decodes one contact file.
///
/// Sets `path`, and fills a missing identifier from the filename.
/// Non-UTF-8 content is a `RepoError::Parse`, not an I/O failure.
pub fn parse_contact_file(path: &Path) -> RepoResult<Contact> {
    let raw = std::fs::read_to_string(path).map_err(|err| match err.kind() {
        io::ErrorKind::InvalidData => RepoError::Parse {
            path: path.to_path_buf(),
            source: ParseError::InvalidEncoding,
        },
        _ => RepoError::io(path, err),
    })?;
    let mut contact = decode_contact(&raw).map_err(|source| RepoError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    if contact.identifier.trim().is_empty() {
        if let Some(parsed) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_contact_filename)
        {
            contact.identifier = parsed.identifier.to_string();
        }
    }
    contact.path = path.to_path_buf();
    Ok(contact)
}

/// Loads every valid contact under `dir`, recursively.
pub fn scan_directory(dir: &Path) -> RepoResult<Vec<Contact>> {
    ensure_directory(dir)?;
    let started_at = Instant::now();
    let mut contacts = Vec::new();
    let mut skipped = 0usize;

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| walk_error(dir, err))?;
        // Symlinked records are read through the link.
        if !(entry.file_type().is_file() || entry.path_is_symlink()) {
            continue;
        }
        let is_contact_file = entry
            .file_name()
            .to_str()
            .and_then(parse_contact_filename)
            .is_some();
        if !is_contact_file {
            continue;
        }

        match parse_contact_file(entry.path()) {
            Ok(contact) => contacts.push(contact),
            Err(err @ RepoError::Parse { .. }) => {
                skipped += 1;
                warn!("event=scan_skip module=scanner status=skipped error={err}");
            }
            Err(err) => {
                warn!("event=contacts_scan module=scanner status=error error={err}");
                return Err(err);
            }
        }
    }

    info!(
        "event=contacts_scan module=scanner status=ok count={} skipped={} duration_ms={}",
        contacts.len(),
        skipped,
        started_at.elapsed().as_millis()
    );
    Ok(contacts)
}

fn walk_error(root: &Path, err: walkdir::Error) -> RepoError {
    let path = err.path().unwrap_or(root).to_path_buf();
    RepoError::io(path, io::Error::from(err))
}
