//! Interaction log section inside a contact body.
//!
//! # Responsibility
//! - Splice new log entries under the `## Interaction Log` heading.
//! - Format entries as `- **YYYY-MM-DD** (kind) - note`.
//!
//! # Invariants
//! - Only the heading line is recognized; everything else in the body is opaque.
//! - Existing entries are never reordered; new entries land on top.
//! - At most one heading is ever created.

use crate::model::contact::InteractionKind;
use chrono::NaiveDate;

/// Heading line that opens the log section.
pub const INTERACTION_LOG_HEADING: &str = "## Interaction Log";

/// Inserts `entry` as the most recent line of the interaction log.
///
/// When the heading exists, the entry becomes the first line after the heading
/// and its trailing blank lines. Otherwise a new section is appended after the
/// trimmed body, separated by one blank line.
pub fn append_interaction_log(body: &str, entry: &str) -> String {
    if let Some(insert_at) = find_insert_position(body) {
        let (before, after) = body.split_at(insert_at);
        let mut out = String::with_capacity(body.len() + entry.len() + 3);
        out.push_str(before);
        if !before.ends_with('\n') {
            // Heading is the last line and has no newline.
            out.push_str("\n\n");
        }
        out.push_str(entry);
        out.push('\n');
        out.push_str(after);
        return out;
    }

    let trimmed = body.trim_end();
    if trimmed.is_empty() {
        return format!("\n{INTERACTION_LOG_HEADING}\n\n{entry}\n");
    }
    format!("{trimmed}\n\n{INTERACTION_LOG_HEADING}\n\n{entry}\n")
}

/// Byte offset right after the heading line and any blank lines following it.
fn find_insert_position(body: &str) -> Option<usize> {
    let mut offset = 0;
    let mut found = false;
    let mut lines = body.split_inclusive('\n');

    for line in lines.by_ref() {
        offset += line.len();
        if line.trim_end_matches(['\n', '\r']) == INTERACTION_LOG_HEADING {
            found = true;
            break;
        }
    }
    if !found {
        return None;
    }

    for line in lines {
        if !line.trim_end_matches(['\n', '\r']).is_empty() {
            break;
        }
        offset += line.len();
    }
    Some(offset)
}

/// Renders one log line.
pub fn format_log_entry(date: NaiveDate, kind: InteractionKind, note: Option<&str>) -> String {
    let mut entry = format!("- **{}** ({})", date.format("%Y-%m-%d"), kind.as_str());
    if let Some(note) = note.map(str::trim).filter(|note| !note.is_empty()) {
        entry.push_str(" - ");
        entry.push_str(note);
    }
    entry
}
