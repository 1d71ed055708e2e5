//! Contact use-case services.
//!
//! # Responsibility
//! - Orchestrate repository, counter and linkage calls into use-case APIs.
//! - Keep the CLI decoupled from storage details.

pub mod contact_service;
pub mod interaction_log;
