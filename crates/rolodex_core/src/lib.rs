//! Core domain logic for rolodex, a file-backed contact store.
//! Each contact is one markdown file with a YAML header; this crate owns
//! the record format, index allocation and relationship status rules.

pub mod config;
pub mod linkage;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{Config, ConfigError};
pub use linkage::{IdentifierScheme, Linkage, LinkageError, LocalLinkage, RelationChange};
pub use logging::{default_log_dir, default_log_level, init_logging, LoggingError, LoggingOptions};
pub use model::contact::{CadenceStyle, Category, Contact, ContactValidationError, InteractionKind};
pub use model::relations::{RelationKind, Relations};
pub use model::status::ContactStatus;
pub use repo::codec::{decode_contact, encode_contact, ParseError};
pub use repo::contact_repo::{ContactRepository, FileContactRepository, RepoError, RepoResult};
pub use repo::index_counter::IndexCounter;
pub use service::contact_service::{
    ContactListQuery, ContactPatch, ContactService, ContactSort, NewContact, ReindexReport,
    ServiceError, ServiceResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
