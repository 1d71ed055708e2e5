//! Storage filename convention: `{identifier}--{slug}__{kind}.md`.
//!
//! # Invariants
//! - Slugs only contain `[a-z0-9-]`, without leading, trailing or repeated `-`.
//! - A filename is computed once at creation; later title edits never rename.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9-]").expect("valid slug filter regex"));
static HYPHEN_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-{2,}").expect("valid hyphen run regex"));
static CONTACT_FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<identifier>[0-9A-Za-z]+)--(?P<slug>[^_]*)__contact(?:_[^.]*)?\.md$")
        .expect("valid contact filename regex")
});

/// Lowercase, hyphen-joined, alphanumeric-and-hyphen rendering of `title`.
pub fn slugify(title: &str) -> String {
    let lowered = title.trim().to_lowercase().replace(char::is_whitespace, "-");
    let filtered = NON_SLUG_RE.replace_all(&lowered, "");
    let collapsed = HYPHEN_RUN_RE.replace_all(&filtered, "-");
    collapsed.trim_matches('-').to_string()
}

/// Builds the storage filename for a record.
pub fn record_filename(identifier: &str, title: &str, kind: &str) -> String {
    format!("{identifier}--{}__{kind}.md", slugify(title))
}

/// Components of a contact filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactFilename<'a> {
    pub identifier: &'a str,
    pub slug: &'a str,
}

/// Matches a contact filename, returning its identifier and slug.
pub fn parse_contact_filename(file_name: &str) -> Option<ContactFilename<'_>> {
    let caps = CONTACT_FILENAME_RE.captures(file_name)?;
    Some(ContactFilename {
        identifier: caps.name("identifier")?.as_str(),
        slug: caps.name("slug")?.as_str(),
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_contact_filename, record_filename, slugify};

    #[test]
    fn slugify_strips_punctuation_and_collapses_hyphens() {
        assert_eq!(slugify("Sarah Chen"), "sarah-chen");
        assert_eq!(slugify("  O'Brien,  Dr. Pat  "), "obrien-dr-pat");
        assert_eq!(slugify("--Zoë -- Smith--"), "zo-smith");
    }

    #[test]
    fn record_filename_follows_convention() {
        assert_eq!(
            record_filename("20240101T090000", "Sarah Chen", "contact"),
            "20240101T090000--sarah-chen__contact.md"
        );
    }

    #[test]
    fn parse_contact_filename_accepts_keywords_suffix() {
        let parsed = parse_contact_filename("20240101T090000--sarah-chen__contact_work.md").unwrap();
        assert_eq!(parsed.identifier, "20240101T090000");
        assert_eq!(parsed.slug, "sarah-chen");
    }

    #[test]
    fn parse_contact_filename_rejects_other_kinds() {
        assert!(parse_contact_filename("20240101T090000--ship-it__task.md").is_none());
        assert!(parse_contact_filename("notes.md").is_none());
        assert!(parse_contact_filename("20240101T090000--sarah__contact.txt").is_none());
    }
}
