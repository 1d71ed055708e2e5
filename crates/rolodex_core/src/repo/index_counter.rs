//! Sequential index allocation persisted next to the contact files.
//!
//! # Responsibility
//! - Hand out small, monotonically increasing indices per directory.
//! - Heal itself from existing records when the counter file is missing.
//!
//! # Invariants
//! - A value is handed out at most once, even after its record is deleted.
//! - The counter file always holds the next value to allocate.
//! - Read-increment-persist runs under an in-process mutex and an exclusive
//!   advisory lock on a sibling lock file, so concurrent processes sharing the
//!   directory cannot both receive the same value.
//!
//! One `IndexCounter` is constructed per invocation and passed by reference.

use crate::repo::atomic_write::write_atomically;
use crate::repo::contact_repo::{max_index, RepoError, RepoResult};
use crate::repo::scanner::{ensure_directory, scan_directory};
use fs2::FileExt;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const COUNTER_FILENAME: &str = ".rolodex-counter.json";
pub const COUNTER_LOCK_FILENAME: &str = ".rolodex-counter.lock";
pub const COUNTER_SPEC_VERSION: &str = "0.1.0";

/// On-disk counter document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterData {
    pub next_index_id: u32,
    #[serde(default)]
    pub spec_version: String,
}

impl CounterData {
    fn starting_at(next_index_id: u32) -> Self {
        Self {
            next_index_id: next_index_id.max(1),
            spec_version: COUNTER_SPEC_VERSION.to_string(),
        }
    }
}

/// Persistent allocator for one contacts directory.
#[derive(Debug)]
pub struct IndexCounter {
    file_path: PathBuf,
    lock_path: PathBuf,
    state: Mutex<CounterData>,
}

/// Held advisory lock; released on drop.
struct CounterFileLock(File);

impl Drop for CounterFileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

impl IndexCounter {
    /// Loads the counter for `dir`, initializing it from existing records
    /// (`max(index) + 1`) when no counter file exists yet.
    ///
    /// # Errors
    /// - `RepoError::Directory` when `dir` is not a directory.
    /// - `RepoError::Counter` when the counter file is not valid JSON.
    pub fn open(dir: impl AsRef<Path>) -> RepoResult<Self> {
        let dir = dir.as_ref();
        ensure_directory(dir)?;

        let counter = Self {
            file_path: dir.join(COUNTER_FILENAME),
            lock_path: dir.join(COUNTER_LOCK_FILENAME),
            state: Mutex::new(CounterData::starting_at(1)),
        };

        let initial = {
            let _file_lock = counter.lock_file()?;
            match counter.read_disk()? {
                Some(data) => data,
                None => {
                    let existing_max = max_index(&scan_directory(dir)?);
                    let data = CounterData::starting_at(existing_max.saturating_add(1));
                    counter.write_disk(&data)?;
                    info!(
                        "event=counter_init module=counter status=ok next_index={} existing_max={}",
                        data.next_index_id, existing_max
                    );
                    data
                }
            }
        };

        *counter.lock_state()? = initial;
        Ok(counter)
    }

    /// Path of the counter file.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Allocates the next index and persists its successor.
    ///
    /// The on-disk value is re-read under the file lock so allocations made by
    /// other processes since `open` are honored.
    pub fn next_index(&self) -> RepoResult<u32> {
        let mut state = self.lock_state()?;
        let _file_lock = self.lock_file()?;

        let current = self.current_value(&state)?;
        let successor = current
            .checked_add(1)
            .ok_or_else(|| RepoError::Counter("index space exhausted".to_string()))?;
        let updated = CounterData {
            next_index_id: successor,
            spec_version: version_or_default(&state.spec_version),
        };

        // State only advances once the successor is durable.
        self.write_disk(&updated)?;
        *state = updated;

        debug!("event=index_allocate module=counter status=ok index={current}");
        Ok(current)
    }

    /// Returns the value the next allocation would hand out.
    pub fn peek(&self) -> RepoResult<u32> {
        let state = self.lock_state()?;
        let _file_lock = self.lock_file()?;
        self.current_value(&state)
    }

    /// Raises the counter above `max_existing` when it lags behind.
    ///
    /// Never lowers the counter. Returns the resulting next value.
    pub fn reconcile(&self, max_existing: u32) -> RepoResult<u32> {
        let mut state = self.lock_state()?;
        let _file_lock = self.lock_file()?;

        let current = self.current_value(&state)?;
        let floor = max_existing.saturating_add(1);
        if current >= floor {
            state.next_index_id = current;
            return Ok(current);
        }

        let updated = CounterData {
            next_index_id: floor,
            spec_version: version_or_default(&state.spec_version),
        };
        self.write_disk(&updated)?;
        *state = updated;
        info!(
            "event=counter_reconcile module=counter status=ok from={} to={}",
            current, floor
        );
        Ok(floor)
    }

    fn current_value(&self, state: &CounterData) -> RepoResult<u32> {
        let on_disk = self.read_disk()?.map_or(0, |data| data.next_index_id);
        Ok(on_disk.max(state.next_index_id).max(1))
    }

    fn lock_state(&self) -> RepoResult<MutexGuard<'_, CounterData>> {
        self.state
            .lock()
            .map_err(|_| RepoError::Counter("counter state lock poisoned".to_string()))
    }

    fn lock_file(&self) -> RepoResult<CounterFileLock> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|err| RepoError::io(&self.lock_path, err))?;
        FileExt::lock_exclusive(&file).map_err(|err| RepoError::io(&self.lock_path, err))?;
        Ok(CounterFileLock(file))
    }

    fn read_disk(&self) -> RepoResult<Option<CounterData>> {
        let raw = match std::fs::read_to_string(&self.file_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(RepoError::io(&self.file_path, err)),
        };
        let mut data: CounterData = serde_json::from_str(&raw).map_err(|err| {
            RepoError::Counter(format!(
                "failed to parse `{}`: {err}",
                self.file_path.display()
            ))
        })?;
        data.spec_version = version_or_default(&data.spec_version);
        Ok(Some(data))
    }

    fn write_disk(&self, data: &CounterData) -> RepoResult<()> {
        let encoded = serde_json::to_vec_pretty(data)
            .map_err(|err| RepoError::Counter(format!("failed to encode counter: {err}")))?;
        write_atomically(&self.file_path, &encoded)
            .map_err(|err| RepoError::io(&self.file_path, err))
    }
}

fn version_or_default(version: &str) -> String {
    if version.trim().is_empty() {
        COUNTER_SPEC_VERSION.to_string()
    } else {
        version.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{IndexCounter, COUNTER_FILENAME};

    #[test]
    fn missing_spec_version_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(COUNTER_FILENAME), r#"{"next_index_id": 5}"#).unwrap();

        let counter = IndexCounter::open(dir.path()).unwrap();
        assert_eq!(counter.next_index().unwrap(), 5);

        let raw = std::fs::read_to_string(dir.path().join(COUNTER_FILENAME)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["next_index_id"], 6);
        assert_eq!(json["spec_version"], "0.1.0");
    }

    #[test]
    fn reconcile_never_lowers_the_counter() {
        let dir = tempfile::tempdir().unwrap();
        let counter = IndexCounter::open(dir.path()).unwrap();
        assert_eq!(counter.reconcile(9).unwrap(), 10);
        assert_eq!(counter.reconcile(2).unwrap(), 10);
        assert_eq!(counter.next_index().unwrap(), 10);
    }
}
