//! Persistence layer over a directory of contact files.
//!
//! # Responsibility
//! - Encode/decode records and enumerate them from disk.
//! - Allocate stable per-directory indices across invocations.
//! - Isolate file layout details from service/business orchestration.
//!
//! # Invariants
//! - Every file write is an atomic whole-file replacement.
//! - Repository APIs return semantic errors (`NotFound`, `Validation`) in
//!   addition to I/O errors.

pub mod atomic_write;
pub mod codec;
pub mod contact_repo;
pub mod index_counter;
pub mod naming;
pub mod scanner;
