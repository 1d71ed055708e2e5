//! Contact domain model.
//!
//! # Responsibility
//! - Define the canonical in-memory shape of one contact record.
//! - Keep closed vocabularies (category, cadence) lossless for unknown values.
//!
//! # Invariants
//! - `identifier` is assigned once at creation and never changes.
//! - `tags` always contains [`CONTACT_TAG`] exactly once.
//! - Relation arrays are sets: no duplicates, never absent.
//! - `path` is derived at creation and stays stable across title changes.

use crate::model::relations::Relations;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Sentinel tag that marks a file as a contact record.
pub const CONTACT_TAG: &str = "contact";

/// Record kind literal used in storage filenames (`__contact.md`).
pub const CONTACT_KIND: &str = "contact";

/// Relationship classification. Drives the default contact frequency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Close,
    Family,
    Network,
    Work,
    Social,
    Providers,
    Recruiters,
    /// Unrecognized value, preserved verbatim.
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Close => "close",
            Self::Family => "family",
            Self::Network => "network",
            Self::Work => "work",
            Self::Social => "social",
            Self::Providers => "providers",
            Self::Recruiters => "recruiters",
            Self::Other(value) => value.as_str(),
        }
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        match value {
            "close" => Self::Close,
            "family" => Self::Family,
            "network" => Self::Network,
            "work" => Self::Work,
            "social" => Self::Social,
            "providers" => Self::Providers,
            "recruiters" => Self::Recruiters,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How reminder logic treats a contact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CadenceStyle {
    /// Regular check-ins; the only style with overdue tracking.
    Periodic,
    /// Passive monitoring.
    Ambient,
    /// Event-based.
    Triggered,
    Other(String),
}

impl CadenceStyle {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Periodic => "periodic",
            Self::Ambient => "ambient",
            Self::Triggered => "triggered",
            Self::Other(value) => value.as_str(),
        }
    }
}

impl From<&str> for CadenceStyle {
    fn from(value: &str) -> Self {
        match value {
            "periodic" => Self::Periodic,
            "ambient" => Self::Ambient,
            "triggered" => Self::Triggered,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for CadenceStyle {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<CadenceStyle> for String {
    fn from(value: CadenceStyle) -> Self {
        value.as_str().to_string()
    }
}

impl Display for CadenceStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow state tokens used by convention. The store does not enforce them.
pub mod state {
    pub const OK: &str = "ok";
    pub const ACTIVE: &str = "active";
    pub const FOLLOWUP: &str = "followup";
    pub const PING: &str = "ping";
    pub const ARCHIVED: &str = "archived";
}

/// Kind of interaction recorded by a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Email,
    Call,
    Text,
    Meeting,
    Social,
    Bump,
    Note,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 7] = [
        Self::Email,
        Self::Call,
        Self::Text,
        Self::Meeting,
        Self::Social,
        Self::Bump,
        Self::Note,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Call => "call",
            Self::Text => "text",
            Self::Meeting => "meeting",
            Self::Social => "social",
            Self::Bump => "bump",
            Self::Note => "note",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
    }
}

impl Display for InteractionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation errors for contact invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactValidationError {
    EmptyTitle,
    EmptyIdentifier,
    MissingContactTag,
}

impl Display for ContactValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "contact title cannot be empty"),
            Self::EmptyIdentifier => write!(f, "contact identifier cannot be empty"),
            Self::MissingContactTag => write!(f, "contact tags must include `{CONTACT_TAG}`"),
        }
    }
}

impl Error for ContactValidationError {}

/// Canonical contact record.
///
/// Optional scalar attributes use `None` for "absent"; the codec never writes
/// empty keys for them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contact {
    pub title: String,
    /// Creation timestamp (`date` header key).
    pub created: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub identifier: String,
    /// Human-facing handle. `0` means "not yet assigned".
    pub index: u32,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub category: Option<Category>,
    pub cadence: Option<CadenceStyle>,
    pub state: Option<String>,
    pub label: Option<String>,
    pub last_contacted: Option<DateTime<Utc>>,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub review_count: u32,
    /// Refreshed by the repository on every save.
    pub updated_at: Option<DateTime<Utc>>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub location: Option<String>,
    pub birthday: Option<String>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    /// Overrides the category frequency when non-zero.
    pub custom_frequency_days: u32,
    pub last_interaction: Option<String>,
    pub related_contact_labels: Vec<String>,
    #[serde(flatten)]
    pub relations: Relations,
    /// Header keys this version does not model, kept for round-trips.
    #[serde(skip)]
    pub extra: serde_yaml::Mapping,
    #[serde(skip)]
    pub body: String,
    #[serde(rename = "file_path")]
    pub path: PathBuf,
}

impl Contact {
    /// Creates an empty contact with the sentinel tag and no attributes.
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            created: None,
            tags: vec![CONTACT_TAG.to_string()],
            identifier: identifier.into(),
            index: 0,
            email: None,
            phone: None,
            category: None,
            cadence: None,
            state: None,
            label: None,
            last_contacted: None,
            last_reviewed: None,
            review_count: 0,
            updated_at: None,
            company: None,
            role: None,
            location: None,
            birthday: None,
            linkedin: None,
            twitter: None,
            website: None,
            notes: None,
            custom_frequency_days: 0,
            last_interaction: None,
            related_contact_labels: Vec::new(),
            relations: Relations::default(),
            extra: serde_yaml::Mapping::new(),
            body: String::new(),
            path: PathBuf::new(),
        }
    }

    /// Checks the invariants that every persisted contact must satisfy.
    pub fn validate(&self) -> Result<(), ContactValidationError> {
        if self.title.trim().is_empty() {
            return Err(ContactValidationError::EmptyTitle);
        }
        if self.identifier.trim().is_empty() {
            return Err(ContactValidationError::EmptyIdentifier);
        }
        if !self.has_contact_tag() {
            return Err(ContactValidationError::MissingContactTag);
        }
        Ok(())
    }

    pub fn has_contact_tag(&self) -> bool {
        self.tags.iter().any(|tag| tag == CONTACT_TAG)
    }

    /// User tags, without the sentinel.
    pub fn user_tags(&self) -> impl Iterator<Item = &str> {
        self.tags
            .iter()
            .map(String::as_str)
            .filter(|tag| *tag != CONTACT_TAG)
    }

    /// Replaces the user tags while keeping the sentinel first.
    ///
    /// Blank values and repeats are dropped; first occurrence wins.
    pub fn set_user_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized = vec![CONTACT_TAG.to_string()];
        for tag in tags {
            let tag = tag.as_ref().trim();
            if tag.is_empty() || normalized.iter().any(|existing| existing == tag) {
                continue;
            }
            normalized.push(tag.to_string());
        }
        self.tags = normalized;
    }

    /// Ensures the sentinel is present exactly once, keeping other tags in order.
    pub fn normalize_tags(&mut self) {
        let mut seen_sentinel = false;
        self.tags.retain(|tag| {
            if tag == CONTACT_TAG {
                if seen_sentinel {
                    return false;
                }
                seen_sentinel = true;
            }
            true
        });
        if !seen_sentinel {
            self.tags.insert(0, CONTACT_TAG.to_string());
        }
    }

    pub fn is_archived(&self) -> bool {
        self.state.as_deref() == Some(state::ARCHIVED)
    }
}

#[cfg(test)]
mod tests {
    use super::{CadenceStyle, Category, Contact, ContactValidationError, InteractionKind};

    #[test]
    fn unknown_category_round_trips_verbatim() {
        let category = Category::from("book-club");
        assert_eq!(category, Category::Other("book-club".to_string()));
        assert_eq!(String::from(category), "book-club");
    }

    #[test]
    fn cadence_parses_known_values() {
        assert_eq!(CadenceStyle::from("ambient"), CadenceStyle::Ambient);
        assert_eq!(CadenceStyle::from("weekly").as_str(), "weekly");
    }

    #[test]
    fn interaction_kind_parse_is_case_insensitive() {
        assert_eq!(InteractionKind::parse(" Call "), Some(InteractionKind::Call));
        assert_eq!(InteractionKind::parse("fax"), None);
    }

    #[test]
    fn set_user_tags_keeps_sentinel_first_and_dedupes() {
        let mut contact = Contact::new("20240101T090000", "Ada");
        contact.set_user_tags(["friends", "contact", " friends ", "", "climbing"]);
        assert_eq!(contact.tags, vec!["contact", "friends", "climbing"]);
    }

    #[test]
    fn normalize_tags_collapses_duplicate_sentinels() {
        let mut contact = Contact::new("20240101T090000", "Ada");
        contact.tags = vec![
            "vip".to_string(),
            "contact".to_string(),
            "contact".to_string(),
        ];
        contact.normalize_tags();
        assert_eq!(contact.tags, vec!["vip", "contact"]);
    }

    #[test]
    fn validate_rejects_blank_title() {
        let contact = Contact::new("20240101T090000", "   ");
        assert_eq!(contact.validate(), Err(ContactValidationError::EmptyTitle));
    }
}
