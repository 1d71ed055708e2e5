//! Contact use-case service.
//!
//! # Responsibility
//! - Resolve references (index or identifier) against a fresh directory scan.
//! - Provide list/create/update/log/review/relation/delete/reindex flows.
//! - Call the linkage collaborator for identifiers and reverse relations.
//!
//! # Invariants
//! - Every read path assigns missing indices before returning records.
//! - New identifiers are unique within the directory.
//! - Reverse relation sync never fails the caller's own write.

use crate::linkage::{IdentifierScheme, Linkage, LocalLinkage, RelationChange};
use crate::model::contact::{
    state, CadenceStyle, Category, Contact, InteractionKind, CONTACT_KIND,
};
use crate::model::relations::RelationKind;
use crate::repo::contact_repo::{
    assign_missing_indices, find_contact, find_duplicate_indices, max_index, ContactRepository,
    FileContactRepository, RepoError,
};
use crate::repo::index_counter::IndexCounter;
use crate::service::interaction_log::{append_interaction_log, format_log_entry};
use chrono::{DateTime, Duration, Local, Utc};
use log::{info, warn};
use serde::Serialize;
use std::cmp::Reverse;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const MAX_IDENTIFIER_ATTEMPTS: i64 = 600;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for contact use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Reference matched no contact.
    NotFound(String),
    /// Caller input rejected before any write.
    Validation(String),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::NotFound(reference) => write!(f, "contact not found: {reference}"),
            Self::Validation(message) => write!(f, "invalid input: {message}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(reference) => Self::NotFound(reference),
            RepoError::Validation(err) => Self::Validation(err.to_string()),
            other => Self::Repo(other),
        }
    }
}

/// Sort order for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContactSort {
    /// Case-insensitive title.
    #[default]
    Name,
    /// Longest since contact first; never-contacted last.
    Days,
    Category,
    State,
}

impl ContactSort {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "name" => Some(Self::Name),
            "days" | "contacted" => Some(Self::Days),
            "category" | "type" => Some(Self::Category),
            "state" => Some(Self::State),
            _ => None,
        }
    }
}

/// Listing filters. Empty query lists every non-archived contact by name.
#[derive(Debug, Clone, Default)]
pub struct ContactListQuery {
    pub category: Option<Category>,
    pub state: Option<String>,
    pub cadence: Option<CadenceStyle>,
    pub overdue_only: bool,
    pub search: Option<String>,
    pub include_archived: bool,
    pub sort: ContactSort,
}

/// Input for [`ContactService::create`].
#[derive(Debug, Clone, Default)]
pub struct NewContact {
    pub title: String,
    pub category: Option<Category>,
    pub cadence: Option<CadenceStyle>,
    pub state: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub location: Option<String>,
    pub tags: Vec<String>,
}

impl NewContact {
    pub fn named(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ContactPatch {
    pub title: Option<String>,
    pub category: Option<Category>,
    pub cadence: Option<CadenceStyle>,
    pub state: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub location: Option<String>,
    pub label: Option<String>,
    pub custom_frequency_days: Option<u32>,
    /// Replaces every non-sentinel tag.
    pub tags: Option<Vec<String>>,
}

impl ContactPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category.is_none()
            && self.cadence.is_none()
            && self.state.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.company.is_none()
            && self.role.is_none()
            && self.location.is_none()
            && self.label.is_none()
            && self.custom_frequency_days.is_none()
            && self.tags.is_none()
    }
}

/// One index moved by [`ContactService::reindex`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexChange {
    pub identifier: String,
    pub title: String,
    pub from: u32,
    pub to: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub scanned: usize,
    pub reassigned: Vec<IndexChange>,
    pub next_index: u32,
}

/// Contact service over a repository, an index counter and a linkage.
pub struct ContactService<R: ContactRepository, L: Linkage> {
    repo: R,
    counter: IndexCounter,
    linkage: L,
}

impl ContactService<FileContactRepository, LocalLinkage> {
    /// Opens the directory-backed service for `dir`.
    pub fn open(dir: impl AsRef<Path>, scheme: IdentifierScheme) -> ServiceResult<Self> {
        let dir = dir.as_ref();
        let repo = FileContactRepository::open(dir)?;
        let counter = IndexCounter::open(dir)?;
        Ok(Self::new(repo, counter, LocalLinkage::new(dir, scheme)))
    }
}

impl<R: ContactRepository, L: Linkage> ContactService<R, L> {
    pub fn new(repo: R, counter: IndexCounter, linkage: L) -> Self {
        Self {
            repo,
            counter,
            linkage,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn counter(&self) -> &IndexCounter {
        &self.counter
    }

    /// Scans the directory and assigns indices where missing.
    pub fn load_all(&self) -> ServiceResult<Vec<Contact>> {
        let mut contacts = self.repo.list_contacts()?;
        assign_missing_indices(&self.repo, &self.counter, &mut contacts)?;
        Ok(contacts)
    }

    pub fn list(&self, query: &ContactListQuery) -> ServiceResult<Vec<Contact>> {
        self.list_at(query, Utc::now())
    }

    /// Same as [`Self::list`] with an explicit clock for status filters.
    pub fn list_at(
        &self,
        query: &ContactListQuery,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<Contact>> {
        let needle = query
            .search
            .as_deref()
            .map(|value| value.trim().to_lowercase())
            .filter(|value| !value.is_empty());

        let mut contacts: Vec<Contact> = self
            .load_all()?
            .into_iter()
            .filter(|contact| matches_query(contact, query, needle.as_deref(), now))
            .collect();

        match query.sort {
            ContactSort::Name => contacts.sort_by_key(|contact| contact.title.to_lowercase()),
            ContactSort::Days => {
                contacts.sort_by_key(|contact| Reverse(days_sort_key(contact, now)))
            }
            ContactSort::Category => contacts.sort_by(|a, b| {
                category_key(a)
                    .cmp(category_key(b))
                    .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
            }),
            ContactSort::State => contacts.sort_by(|a, b| {
                a.state
                    .as_deref()
                    .unwrap_or("")
                    .cmp(b.state.as_deref().unwrap_or(""))
                    .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
            }),
        }
        Ok(contacts)
    }

    /// Looks up one contact by index or identifier.
    pub fn get(&self, reference: &str) -> ServiceResult<Contact> {
        let contacts = self.load_all()?;
        find_contact(&contacts, reference)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(reference.trim().to_string()))
    }

    pub fn create(&self, request: NewContact) -> ServiceResult<Contact> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(ServiceError::Validation(
                "contact name must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let existing = self.repo.list_contacts()?;
        let identifier = self.unique_identifier(&existing, now)?;

        let mut contact = Contact::new(identifier, title);
        contact.created = Some(now);
        contact.category = Some(request.category.unwrap_or(Category::Network));
        contact.cadence = Some(request.cadence.unwrap_or(CadenceStyle::Periodic));
        contact.state = Some(non_blank(request.state).unwrap_or_else(|| state::OK.to_string()));
        contact.email = non_blank(request.email);
        contact.phone = non_blank(request.phone);
        contact.company = non_blank(request.company);
        contact.role = non_blank(request.role);
        contact.location = non_blank(request.location);
        contact.set_user_tags(&request.tags);
        contact.path = self.repo.directory().join(self.linkage.storage_filename(
            &contact.identifier,
            &contact.title,
            CONTACT_KIND,
        ));
        contact.index = self.counter.next_index()?;

        self.repo.create_contact(&mut contact)?;
        Ok(contact)
    }

    /// Applies `patch`; the file path stays put even when the title changes.
    pub fn update(&self, reference: &str, patch: ContactPatch) -> ServiceResult<Contact> {
        let mut contact = self.get(reference)?;

        if let Some(title) = patch.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(ServiceError::Validation(
                    "contact name must not be empty".to_string(),
                ));
            }
            contact.title = title.to_string();
        }
        if let Some(category) = patch.category {
            contact.category = Some(category);
        }
        if let Some(cadence) = patch.cadence {
            contact.cadence = Some(cadence);
        }
        if let Some(value) = patch.state {
            contact.state = non_blank(Some(value));
        }
        apply_text(&mut contact.email, patch.email);
        apply_text(&mut contact.phone, patch.phone);
        apply_text(&mut contact.company, patch.company);
        apply_text(&mut contact.role, patch.role);
        apply_text(&mut contact.location, patch.location);
        apply_text(&mut contact.label, patch.label);
        if let Some(days) = patch.custom_frequency_days {
            contact.custom_frequency_days = days;
        }
        if let Some(tags) = patch.tags {
            contact.set_user_tags(&tags);
        }

        self.repo.save_contact(&mut contact)?;
        info!(
            "event=contact_update module=service status=ok index={}",
            contact.index
        );
        Ok(contact)
    }

    /// Records an interaction: contact time, kind, optional state and a log line.
    pub fn log_interaction(
        &self,
        reference: &str,
        kind: InteractionKind,
        note: Option<&str>,
        new_state: Option<&str>,
    ) -> ServiceResult<Contact> {
        let mut contact = self.get(reference)?;
        let now = Utc::now();

        contact.last_contacted = Some(now);
        contact.last_interaction = Some(kind.as_str().to_string());
        if let Some(value) = new_state.map(str::trim).filter(|value| !value.is_empty()) {
            contact.state = Some(value.to_string());
        }
        let entry = format_log_entry(now.with_timezone(&Local).date_naive(), kind, note);
        contact.body = append_interaction_log(&contact.body, &entry);

        self.repo.save_contact(&mut contact)?;
        info!(
            "event=interaction_log module=service status=ok index={} kind={kind}",
            contact.index
        );
        Ok(contact)
    }

    /// Marks the contact as reviewed without counting it as contact.
    pub fn review(&self, reference: &str) -> ServiceResult<Contact> {
        let mut contact = self.get(reference)?;
        contact.last_reviewed = Some(Utc::now());
        contact.review_count = contact.review_count.saturating_add(1);

        self.repo.save_contact(&mut contact)?;
        info!(
            "event=contact_review module=service status=ok index={} count={}",
            contact.index, contact.review_count
        );
        Ok(contact)
    }

    pub fn add_relation(
        &self,
        reference: &str,
        kind: RelationKind,
        target: &str,
    ) -> ServiceResult<Contact> {
        self.edit_relation(reference, kind, target, RelationChange::Added)
    }

    pub fn remove_relation(
        &self,
        reference: &str,
        kind: RelationKind,
        target: &str,
    ) -> ServiceResult<Contact> {
        self.edit_relation(reference, kind, target, RelationChange::Removed)
    }

    /// Deletes the contact's file. Its index is never handed out again.
    pub fn delete(&self, reference: &str) -> ServiceResult<Contact> {
        let contact = self.get(reference)?;
        self.repo.delete_contact(&contact)?;
        Ok(contact)
    }

    /// Repairs duplicate indices and brings the counter past every index in use.
    ///
    /// Within a duplicate group the contact with the smallest identifier keeps
    /// its index; the rest receive fresh ones.
    pub fn reindex(&self) -> ServiceResult<ReindexReport> {
        let mut contacts = self.repo.list_contacts()?;
        let mut report = ReindexReport {
            scanned: contacts.len(),
            ..ReindexReport::default()
        };

        self.counter.reconcile(max_index(&contacts))?;

        for mut positions in find_duplicate_indices(&contacts).into_values() {
            positions.sort_by(|a, b| contacts[*a].identifier.cmp(&contacts[*b].identifier));
            for position in positions.into_iter().skip(1) {
                let contact = &mut contacts[position];
                let from = contact.index;
                contact.index = self.counter.next_index()?;
                self.repo.save_contact(contact)?;
                report.reassigned.push(IndexChange {
                    identifier: contact.identifier.clone(),
                    title: contact.title.clone(),
                    from,
                    to: contact.index,
                });
            }
        }

        for contact in contacts.iter_mut().filter(|contact| contact.index == 0) {
            contact.index = self.counter.next_index()?;
            self.repo.save_contact(contact)?;
            report.reassigned.push(IndexChange {
                identifier: contact.identifier.clone(),
                title: contact.title.clone(),
                from: 0,
                to: contact.index,
            });
        }

        report.next_index = self.counter.peek()?;
        info!(
            "event=reindex module=service status=ok scanned={} reassigned={} next_index={}",
            report.scanned,
            report.reassigned.len(),
            report.next_index
        );
        Ok(report)
    }

    fn edit_relation(
        &self,
        reference: &str,
        kind: RelationKind,
        target: &str,
        change: RelationChange,
    ) -> ServiceResult<Contact> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ServiceError::Validation(
                "relation target must not be empty".to_string(),
            ));
        }

        let contacts = self.load_all()?;
        let mut contact = find_contact(&contacts, reference)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(reference.trim().to_string()))?;

        // People may be referenced by index; store the permanent identifier.
        let target = match kind {
            RelationKind::People => find_contact(&contacts, target)
                .map(|other| other.identifier.clone())
                .unwrap_or_else(|| target.to_string()),
            RelationKind::Tasks | RelationKind::Ideas => target.to_string(),
        };
        if kind == RelationKind::People && target == contact.identifier {
            return Err(ServiceError::Validation(
                "a contact cannot be related to itself".to_string(),
            ));
        }

        let changed = match change {
            RelationChange::Added => contact.relations.add(kind, &target),
            RelationChange::Removed => contact.relations.remove(kind, &target),
        };
        if changed {
            self.repo.save_contact(&mut contact)?;
            info!(
                "event=relation_edit module=service status=ok index={} kind={kind} change={change:?}",
                contact.index
            );
        }

        if let Err(err) = self
            .linkage
            .sync_reverse(&contact.identifier, &target, kind, change)
        {
            warn!("event=linkage_sync module=service status=error kind={kind} error={err}");
        }
        Ok(contact)
    }

    fn unique_identifier(
        &self,
        existing: &[Contact],
        now: DateTime<Utc>,
    ) -> ServiceResult<String> {
        for offset in 0..MAX_IDENTIFIER_ATTEMPTS {
            let candidate = self
                .linkage
                .mint_identifier(now + Duration::seconds(offset));
            if !existing.iter().any(|contact| contact.identifier == candidate) {
                return Ok(candidate);
            }
        }
        Err(ServiceError::Validation(
            "could not mint a unique identifier".to_string(),
        ))
    }
}

fn matches_query(
    contact: &Contact,
    query: &ContactListQuery,
    needle: Option<&str>,
    now: DateTime<Utc>,
) -> bool {
    if contact.is_archived() && !query.include_archived {
        return false;
    }
    if let Some(category) = &query.category {
        if contact.category.as_ref() != Some(category) {
            return false;
        }
    }
    if let Some(wanted) = query.state.as_deref() {
        if contact.state.as_deref() != Some(wanted) {
            return false;
        }
    }
    if let Some(cadence) = &query.cadence {
        if contact.cadence.as_ref() != Some(cadence) {
            return false;
        }
    }
    if query.overdue_only && !contact.is_overdue(now) {
        return false;
    }
    match needle {
        Some(needle) => search_haystack(contact).any(|field| field.to_lowercase().contains(needle)),
        None => true,
    }
}

fn search_haystack(contact: &Contact) -> impl Iterator<Item = &str> {
    [
        Some(contact.title.as_str()),
        contact.company.as_deref(),
        contact.email.as_deref(),
        contact.role.as_deref(),
    ]
    .into_iter()
    .flatten()
    .chain(contact.user_tags())
}

fn days_sort_key(contact: &Contact, now: DateTime<Utc>) -> i64 {
    contact.days_since_contact(now)
}

fn category_key(contact: &Contact) -> &str {
    contact.category.as_ref().map_or("", Category::as_str)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Blank input clears the field.
fn apply_text(field: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        *field = non_blank(Some(value));
    }
}

#[cfg(test)]
mod tests {
    use super::{ContactSort, ServiceError};
    use crate::repo::contact_repo::RepoError;

    #[test]
    fn sort_parse_accepts_cli_aliases() {
        assert_eq!(ContactSort::parse("Days"), Some(ContactSort::Days));
        assert_eq!(ContactSort::parse("type"), Some(ContactSort::Category));
        assert_eq!(ContactSort::parse("age"), None);
    }

    #[test]
    fn repo_not_found_maps_to_service_not_found() {
        let err = ServiceError::from(RepoError::NotFound("42".to_string()));
        assert!(matches!(err, ServiceError::NotFound(reference) if reference == "42"));
    }
}
