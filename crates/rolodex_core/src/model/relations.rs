//! Cross-reference arrays and their set-style editing.
//!
//! # Invariants
//! - Each array holds unique values in first-insertion order.
//! - Arrays are never absent: empty means "no relations".
//! - Editing one array never touches the linked record; reverse edges belong
//!   to the linkage collaborator.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Which relation array an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    People,
    Tasks,
    Ideas,
}

impl RelationKind {
    /// Header key of the backing array.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::People => "related_people",
            Self::Tasks => "related_tasks",
            Self::Ideas => "related_ideas",
        }
    }
}

impl Display for RelationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Foreign identifiers this contact links to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relations {
    #[serde(rename = "related_people", default)]
    pub people: Vec<String>,
    #[serde(rename = "related_tasks", default)]
    pub tasks: Vec<String>,
    #[serde(rename = "related_ideas", default)]
    pub ideas: Vec<String>,
}

impl Relations {
    pub fn get(&self, kind: RelationKind) -> &[String] {
        match kind {
            RelationKind::People => &self.people,
            RelationKind::Tasks => &self.tasks,
            RelationKind::Ideas => &self.ideas,
        }
    }

    pub fn get_mut(&mut self, kind: RelationKind) -> &mut Vec<String> {
        match kind {
            RelationKind::People => &mut self.people,
            RelationKind::Tasks => &mut self.tasks,
            RelationKind::Ideas => &mut self.ideas,
        }
    }

    /// Adds `value` to the selected array. Returns `true` when it changed.
    pub fn add(&mut self, kind: RelationKind, value: &str) -> bool {
        add_relation(self.get_mut(kind), value)
    }

    /// Removes `value` from the selected array. Returns `true` when it changed.
    pub fn remove(&mut self, kind: RelationKind, value: &str) -> bool {
        remove_relation(self.get_mut(kind), value)
    }

    /// Drops repeated entries in every array.
    pub fn normalize(&mut self) {
        dedupe_preserving_order(&mut self.people);
        dedupe_preserving_order(&mut self.tasks);
        dedupe_preserving_order(&mut self.ideas);
    }
}

/// Appends `value` unless already present. Blank values are ignored.
pub fn add_relation(set: &mut Vec<String>, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || set.iter().any(|existing| existing == value) {
        return false;
    }
    set.push(value.to_string());
    true
}

/// Removes every occurrence of `value`; survivors keep their order.
pub fn remove_relation(set: &mut Vec<String>, value: &str) -> bool {
    let value = value.trim();
    let before = set.len();
    set.retain(|existing| existing != value);
    set.len() != before
}

/// Keeps the first occurrence of each value.
pub fn dedupe_preserving_order(set: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    set.retain(|value| seen.insert(value.clone()));
}
