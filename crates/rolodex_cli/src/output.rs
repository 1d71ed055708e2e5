//! Text and JSON rendering for command results.

use chrono::{DateTime, Local, Utc};
use rolodex_core::{Contact, ContactStatus, ReindexReport};
use serde::Serialize;

/// Contact plus the fields derived at read time.
#[derive(Debug, Serialize)]
pub struct ContactView<'a> {
    #[serde(flatten)]
    contact: &'a Contact,
    frequency_days: i64,
    days_since_contact: i64,
    status: Option<&'static str>,
}

impl<'a> ContactView<'a> {
    pub fn new(contact: &'a Contact, now: DateTime<Utc>) -> Self {
        Self {
            contact,
            frequency_days: contact.frequency_days(),
            days_since_contact: contact.days_since_contact(now),
            status: contact.status(now).map(ContactStatus::as_str),
        }
    }
}

pub struct Printer {
    json: bool,
    quiet: bool,
    now: DateTime<Utc>,
}

impl Printer {
    pub fn new(json: bool, quiet: bool) -> Self {
        Self {
            json,
            quiet,
            now: Utc::now(),
        }
    }

    pub fn contacts(&self, contacts: &[Contact]) -> serde_json::Result<()> {
        if self.json {
            let views: Vec<ContactView<'_>> = contacts
                .iter()
                .map(|contact| ContactView::new(contact, self.now))
                .collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
            return Ok(());
        }

        if contacts.is_empty() {
            if !self.quiet {
                println!("No contacts found.");
            }
            return Ok(());
        }
        println!(
            "{:>4}  {:<28} {:<10} {:<9} {:>6}",
            "#", "NAME", "TYPE", "STATE", "DAYS"
        );
        for contact in contacts {
            println!("{}", self.list_row(contact));
        }
        Ok(())
    }

    pub fn contact_detail(&self, contact: &Contact) -> serde_json::Result<()> {
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&ContactView::new(contact, self.now))?
            );
            return Ok(());
        }

        println!("#{} {}", contact.index, contact.title);
        let fields = [
            ("identifier", Some(contact.identifier.clone())),
            ("type", contact.category.as_ref().map(ToString::to_string)),
            ("style", contact.cadence.as_ref().map(ToString::to_string)),
            ("state", contact.state.clone()),
            ("email", contact.email.clone()),
            ("phone", contact.phone.clone()),
            ("company", contact.company.clone()),
            ("role", contact.role.clone()),
            ("location", contact.location.clone()),
            ("label", contact.label.clone()),
            ("last contact", contact.last_contacted.map(format_local)),
            ("last interaction", contact.last_interaction.clone()),
            ("last bump", contact.last_reviewed.map(format_local)),
            ("status", contact.status(self.now).map(|s| s.as_str().to_string())),
            ("file", Some(contact.path.display().to_string())),
        ];
        for (label, value) in fields {
            if let Some(value) = value.filter(|value| !value.is_empty()) {
                println!("  {label:<17}{value}");
            }
        }

        let tags: Vec<&str> = contact.user_tags().collect();
        if !tags.is_empty() {
            println!("  {:<17}{}", "tags", tags.join(", "));
        }
        for kind in [
            rolodex_core::RelationKind::People,
            rolodex_core::RelationKind::Tasks,
            rolodex_core::RelationKind::Ideas,
        ] {
            let linked = contact.relations.get(kind);
            if !linked.is_empty() {
                println!("  {:<17}{}", kind.field_name(), linked.join(", "));
            }
        }

        let body = contact.body.trim();
        if !body.is_empty() {
            println!();
            println!("{body}");
        }
        Ok(())
    }

    /// Confirmation for a write; JSON mode prints the resulting record.
    pub fn changed(&self, verb: &str, contact: &Contact) -> serde_json::Result<()> {
        if self.json {
            return self.contact_detail(contact);
        }
        if !self.quiet {
            println!("{verb} #{} {}", contact.index, contact.title);
        }
        Ok(())
    }

    pub fn reindex(&self, report: &ReindexReport) -> serde_json::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(report)?);
            return Ok(());
        }
        for change in &report.reassigned {
            println!("#{} -> #{}  {}", change.from, change.to, change.title);
        }
        if !self.quiet {
            println!(
                "Scanned {} contacts, reassigned {}, next index {}.",
                report.scanned,
                report.reassigned.len(),
                report.next_index
            );
        }
        Ok(())
    }

    fn list_row(&self, contact: &Contact) -> String {
        let days = match contact.days_since_contact(self.now) {
            days if days < 0 => "never".to_string(),
            days => days.to_string(),
        };
        let marker = match contact.status(self.now) {
            Some(ContactStatus::Overdue) => " !",
            Some(ContactStatus::Attention) => " ~",
            Some(ContactStatus::Fresh) | None => "",
        };
        format!(
            "{:>4}  {:<28} {:<10} {:<9} {:>6}{marker}",
            contact.index,
            truncate(&contact.title, 28),
            contact.category.as_ref().map_or("", |category| category.as_str()),
            contact.state.as_deref().unwrap_or(""),
            days,
        )
    }
}

fn format_local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d").to_string()
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('~');
    out
}

#[cfg(test)]
mod tests {
    use super::{truncate, ContactView};
    use chrono::{Duration, Utc};
    use rolodex_core::{Category, Contact};

    #[test]
    fn view_carries_derived_status_fields() {
        let now = Utc::now();
        let mut contact = Contact::new("20240101T000000", "Sarah Chen");
        contact.category = Some(Category::Work);
        contact.last_contacted = Some(now - Duration::days(61));

        let json = serde_json::to_value(ContactView::new(&contact, now)).unwrap();
        assert_eq!(json["title"], "Sarah Chen");
        assert_eq!(json["days_since_contact"], 61);
        assert_eq!(json["frequency_days"], 60);
        assert_eq!(json["status"], "overdue");
    }

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("Ada", 5), "Ada");
        assert_eq!(truncate("Ada Lovelace", 5), "Ada ~");
    }
}
