//! Contact domain model.
//!
//! # Responsibility
//! - Define the canonical contact record and its closed vocabularies.
//! - Derive reminder status and edit relation sets without touching storage.
//!
//! # Invariants
//! - Every contact is identified by a stable `identifier`.
//! - Deletion removes the backing file; indices are retired, not reclaimed.

pub mod contact;
pub mod relations;
pub mod status;
