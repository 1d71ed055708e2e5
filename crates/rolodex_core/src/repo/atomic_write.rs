//! Crash-safe whole-file replacement.
//!
//! Content goes to a temporary sibling, is fsynced, then renamed over the
//! destination. The temporary file is removed on every failure path, so a
//! concurrent reader sees either the old file or the new one.

use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically replaces `path` with `contents`.
///
/// # Errors
/// - Returns the first I/O error; no retries are attempted.
pub fn write_atomically(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
