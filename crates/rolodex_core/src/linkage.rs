//! Identity and cross-reference collaborator.
//!
//! # Responsibility
//! - Mint identifiers for new records and build their storage filenames.
//! - Keep the reverse edge of a relation in sync on the linked record.
//!
//! # Invariants
//! - Reverse sync is best effort: callers log failures and keep their own write.
//! - The store never owns linkage state; it only calls through [`Linkage`].

use crate::model::relations::RelationKind;
use crate::repo::contact_repo::{find_contact, ContactRepository, FileContactRepository, RepoError};
use crate::repo::naming::record_filename;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use uuid::Uuid;

/// Identifier generation scheme for new records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierScheme {
    /// `YYYYMMDDTHHMMSS` creation timestamp.
    #[default]
    Timestamp,
    /// Random UUID v4 rendered without hyphens.
    Opaque,
}

impl IdentifierScheme {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "timestamp" => Some(Self::Timestamp),
            "opaque" | "uuid" => Some(Self::Opaque),
            _ => None,
        }
    }

    pub fn mint(self, at: DateTime<Utc>) -> String {
        match self {
            Self::Timestamp => at.format("%Y%m%dT%H%M%S").to_string(),
            Self::Opaque => Uuid::new_v4().simple().to_string(),
        }
    }
}

/// Direction of a relation edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationChange {
    Added,
    Removed,
}

/// What a reverse sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Linked record was rewritten.
    Updated,
    /// Linked record already reflected the change.
    Unchanged,
    /// Linked record is not reachable from this store.
    Skipped,
}

#[derive(Debug)]
pub enum LinkageError {
    Repo(RepoError),
}

impl Display for LinkageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "reverse relation sync failed: {err}"),
        }
    }
}

impl Error for LinkageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for LinkageError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Collaborator interface the store calls for identity and reverse links.
pub trait Linkage {
    /// Returns a new identifier; `at` is the creation time.
    fn mint_identifier(&self, at: DateTime<Utc>) -> String;

    /// Builds the storage filename for `(identifier, title, kind)`.
    fn storage_filename(&self, identifier: &str, title: &str, kind: &str) -> String {
        record_filename(identifier, title, kind)
    }

    /// Mirrors a relation edit onto the linked record.
    fn sync_reverse(
        &self,
        source_id: &str,
        target_id: &str,
        kind: RelationKind,
        change: RelationChange,
    ) -> Result<SyncOutcome, LinkageError>;
}

/// Linkage for a single contacts directory.
///
/// People relations are mirrored onto the target contact's `related_people`.
/// Task and idea records live in other stores and are skipped.
#[derive(Debug, Clone)]
pub struct LocalLinkage {
    dir: PathBuf,
    scheme: IdentifierScheme,
}

impl LocalLinkage {
    pub fn new(dir: impl Into<PathBuf>, scheme: IdentifierScheme) -> Self {
        Self {
            dir: dir.into(),
            scheme,
        }
    }

    pub fn scheme(&self) -> IdentifierScheme {
        self.scheme
    }
}

impl Linkage for LocalLinkage {
    fn mint_identifier(&self, at: DateTime<Utc>) -> String {
        self.scheme.mint(at)
    }

    fn sync_reverse(
        &self,
        source_id: &str,
        target_id: &str,
        kind: RelationKind,
        change: RelationChange,
    ) -> Result<SyncOutcome, LinkageError> {
        if kind != RelationKind::People {
            debug!("event=linkage_sync module=linkage status=skipped kind={kind}");
            return Ok(SyncOutcome::Skipped);
        }

        let repo = FileContactRepository::open(&self.dir)?;
        let contacts = repo.list_contacts()?;
        let Some(target) = contacts
            .iter()
            .find(|contact| contact.identifier == target_id)
            .or_else(|| find_contact(&contacts, target_id))
        else {
            debug!("event=linkage_sync module=linkage status=skipped reason=target_missing");
            return Ok(SyncOutcome::Skipped);
        };

        let mut target = target.clone();
        let changed = match change {
            RelationChange::Added => target.relations.add(RelationKind::People, source_id),
            RelationChange::Removed => target.relations.remove(RelationKind::People, source_id),
        };
        if !changed {
            return Ok(SyncOutcome::Unchanged);
        }

        repo.save_contact(&mut target)?;
        debug!(
            "event=linkage_sync module=linkage status=ok kind={kind} target_index={}",
            target.index
        );
        Ok(SyncOutcome::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::IdentifierScheme;
    use chrono::{TimeZone, Utc};

    #[test]
    fn timestamp_scheme_formats_creation_time() {
        let at = Utc.with_ymd_and_hms(2024, 2, 29, 13, 5, 9).unwrap();
        assert_eq!(IdentifierScheme::Timestamp.mint(at), "20240229T130509");
    }

    #[test]
    fn opaque_scheme_yields_hex_tokens() {
        let id = IdentifierScheme::Opaque.mint(Utc::now());
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!(IdentifierScheme::parse("UUID"), Some(IdentifierScheme::Opaque));
        assert_eq!(IdentifierScheme::parse("nope"), None);
    }
}
