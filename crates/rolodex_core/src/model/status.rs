//! Reminder status derived from relationship metadata.
//!
//! All functions are pure over a contact and an explicit `now`.
//!
//! # Invariants
//! - Only `periodic` (or unset) cadence yields any flag.
//! - Frequency `0` means "no basis for judgment": every flag is false.
//! - A never-contacted contact is overdue and needs attention.

use crate::model::contact::{CadenceStyle, Category, Contact};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Days within which a contact starts needing attention before it is overdue.
pub const ATTENTION_WINDOW_DAYS: i64 = 7;

/// Sentinel returned by [`Contact::days_since_contact`] for "never".
pub const NEVER_CONTACTED: i64 = -1;

/// Single display label; see [`Contact::status`] for priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    Overdue,
    Attention,
    Fresh,
}

impl ContactStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::Attention => "attention",
            Self::Fresh => "fresh",
        }
    }
}

/// Default contact frequency for a category, `0` when it has none.
pub fn default_frequency_days(category: Option<&Category>) -> i64 {
    match category {
        Some(Category::Close) | Some(Category::Family) => 30,
        Some(Category::Work) => 60,
        Some(Category::Network) => 90,
        _ => 0,
    }
}

impl Contact {
    /// Custom override when positive, otherwise the category default.
    pub fn frequency_days(&self) -> i64 {
        if self.custom_frequency_days > 0 {
            return i64::from(self.custom_frequency_days);
        }
        default_frequency_days(self.category.as_ref())
    }

    /// Whole 24-hour periods since last contact; `-1` when never contacted.
    ///
    /// Future timestamps yield negative values and are not clamped.
    pub fn days_since_contact(&self, now: DateTime<Utc>) -> i64 {
        match self.last_contacted {
            Some(last) => (now - last).num_days(),
            None => NEVER_CONTACTED,
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.tracked_window(now) {
            Some((_, NEVER_CONTACTED)) => true,
            Some((freq, days)) => days > freq,
            None => false,
        }
    }

    pub fn needs_attention(&self, now: DateTime<Utc>) -> bool {
        match self.tracked_window(now) {
            Some((_, NEVER_CONTACTED)) => true,
            Some((freq, days)) => days > freq - ATTENTION_WINDOW_DAYS && days <= freq,
            None => false,
        }
    }

    /// Contacted within half the expected frequency.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.tracked_window(now) {
            Some((_, NEVER_CONTACTED)) => false,
            Some((freq, days)) => days >= 0 && days <= freq / 2,
            None => false,
        }
    }

    /// Overdue, then attention, then fresh.
    pub fn status(&self, now: DateTime<Utc>) -> Option<ContactStatus> {
        if self.is_overdue(now) {
            Some(ContactStatus::Overdue)
        } else if self.needs_attention(now) {
            Some(ContactStatus::Attention)
        } else if self.is_fresh(now) {
            Some(ContactStatus::Fresh)
        } else {
            None
        }
    }

    /// `(frequency, days_since_contact)` when reminders apply to this contact.
    fn tracked_window(&self, now: DateTime<Utc>) -> Option<(i64, i64)> {
        match self.cadence {
            None | Some(CadenceStyle::Periodic) => {}
            Some(_) => return None,
        }
        let freq = self.frequency_days();
        if freq == 0 {
            return None;
        }
        Some((freq, self.days_since_contact(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::ContactStatus;
    use crate::model::contact::{CadenceStyle, Category, Contact};
    use chrono::{Duration, TimeZone, Utc};

    fn contact_with(category: Category) -> Contact {
        let mut contact = Contact::new("20240101T090000", "Status Check");
        contact.category = Some(category);
        contact
    }

    #[test]
    fn custom_frequency_overrides_category() {
        let mut contact = contact_with(Category::Work);
        assert_eq!(contact.frequency_days(), 60);
        contact.custom_frequency_days = 14;
        assert_eq!(contact.frequency_days(), 14);
    }

    #[test]
    fn unrecognized_category_has_no_frequency() {
        let contact = contact_with(Category::Other("gym".to_string()));
        assert_eq!(contact.frequency_days(), 0);
        assert_eq!(contact.status(Utc::now()), None);
    }

    #[test]
    fn partial_days_truncate_toward_zero() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let mut contact = contact_with(Category::Close);
        contact.last_contacted = Some(now - Duration::hours(47));
        assert_eq!(contact.days_since_contact(now), 1);
        contact.last_contacted = Some(now + Duration::hours(49));
        assert_eq!(contact.days_since_contact(now), -2);
    }

    #[test]
    fn future_contact_is_neither_overdue_nor_fresh() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let mut contact = contact_with(Category::Close);
        contact.last_contacted = Some(now + Duration::days(3));
        assert!(!contact.is_overdue(now));
        assert!(!contact.is_fresh(now));
    }

    #[test]
    fn ambient_cadence_disables_all_flags() {
        let now = Utc::now();
        let mut contact = contact_with(Category::Family);
        contact.cadence = Some(CadenceStyle::Ambient);
        assert!(!contact.is_overdue(now));
        assert!(!contact.needs_attention(now));
        assert!(!contact.is_fresh(now));
    }

    #[test]
    fn status_priority_prefers_overdue() {
        let contact = contact_with(Category::Network);
        assert_eq!(contact.status(Utc::now()), Some(ContactStatus::Overdue));
    }
}
