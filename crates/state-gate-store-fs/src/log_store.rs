// crates/state-gate-store-fs/src/log_store.rs
// ============================================================================
// Module: Filesystem Run Log Store
// Description: Implements RunLogStore over one append-only CSV file per run.
// Purpose: Back the engine's commit algorithm (§4.8.2, §5) with a concrete,
//          lock-disciplined filesystem layout.
// Dependencies: state_gate_core::{interfaces, identifiers, run, config},
//               crate::{lock, csv_codec}
// ============================================================================

//! ## Overview
//! Each run's log lives at `<runs_dir>/<run_id>.csv`. The revision-checked
//! append (§5) holds the per-file lock for the entire read-decide-write
//! critical section: it reads the current last row, compares its revision
//! against the caller's expectation, and only then appends.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use state_gate_core::config::LockPolicy;
use state_gate_core::identifiers::RunId;
use state_gate_core::interfaces::AppendOutcome;
use state_gate_core::interfaces::LogStoreError;
use state_gate_core::interfaces::RunLogStore;
use state_gate_core::run::RunEntry;

use crate::csv_codec::HEADER_ROW;
use crate::csv_codec::decode_entries;
use crate::csv_codec::encode_entry;
use crate::lock::FileLock;

/// A [`RunLogStore`] backed by one `<run_id>.csv` file per run under a
/// configured directory.
pub struct FsRunLogStore {
    runs_dir: PathBuf,
    lock_policy: LockPolicy,
}

impl FsRunLogStore {
    /// Builds a store rooted at `runs_dir`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`LogStoreError::Io`] if `runs_dir` cannot be created.
    pub fn new(runs_dir: impl Into<PathBuf>, lock_policy: LockPolicy) -> Result<Self, LogStoreError> {
        let runs_dir = runs_dir.into();
        std::fs::create_dir_all(&runs_dir).map_err(|source| LogStoreError::Io {
            run_id: None,
            source,
        })?;
        Ok(Self {
            runs_dir,
            lock_policy,
        })
    }

    fn path_for(&self, run_id: &RunId) -> PathBuf {
        self.runs_dir.join(format!("{run_id}.csv"))
    }

    fn read_raw(&self, run_id: &RunId) -> Result<String, LogStoreError> {
        std::fs::read_to_string(self.path_for(run_id)).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LogStoreError::NotFound(run_id.clone())
            } else {
                LogStoreError::Io {
                    run_id: Some(run_id.clone()),
                    source,
                }
            }
        })
    }
}

impl RunLogStore for FsRunLogStore {
    fn create_run(&self, run_id: &RunId, init_entry: &RunEntry) -> Result<(), LogStoreError> {
        let path = self.path_for(run_id);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::AlreadyExists {
                    LogStoreError::AlreadyExists(run_id.clone())
                } else {
                    LogStoreError::Io {
                        run_id: Some(run_id.clone()),
                        source,
                    }
                }
            })?;
        writeln!(file, "{HEADER_ROW}").map_err(|source| LogStoreError::Io {
            run_id: Some(run_id.clone()),
            source,
        })?;
        writeln!(file, "{}", encode_entry(init_entry)).map_err(|source| LogStoreError::Io {
            run_id: Some(run_id.clone()),
            source,
        })?;
        Ok(())
    }

    fn append_with_revision_check(
        &self,
        run_id: &RunId,
        entry: &RunEntry,
        expected_revision: u64,
    ) -> Result<AppendOutcome, LogStoreError> {
        let path = self.path_for(run_id);
        let lock = FileLock::new(&path, self.lock_policy);
        let _guard = lock.acquire().map_err(|error| LogStoreError::Lock {
            run_id: run_id.clone(),
            reason: error.to_string(),
        })?;

        let current = self.read_entries(run_id)?;
        let Some(latest) = current.last() else {
            return Err(LogStoreError::Corrupt {
                run_id: run_id.clone(),
                reason: "log has no entries".to_owned(),
            });
        };
        if latest.revision != expected_revision {
            return Ok(AppendOutcome::Conflict {
                current_revision: latest.revision,
            });
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|source| LogStoreError::Io {
                run_id: Some(run_id.clone()),
                source,
            })?;
        writeln!(file, "{}", encode_entry(entry)).map_err(|source| LogStoreError::Io {
            run_id: Some(run_id.clone()),
            source,
        })?;
        Ok(AppendOutcome::Appended)
    }

    fn read_entries(&self, run_id: &RunId) -> Result<Vec<RunEntry>, LogStoreError> {
        let contents = self.read_raw(run_id)?;
        decode_entries(&contents).map_err(|error| LogStoreError::Corrupt {
            run_id: run_id.clone(),
            reason: error.to_string(),
        })
    }

    fn exists(&self, run_id: &RunId) -> bool {
        self.path_for(run_id).is_file()
    }

    fn list_run_ids(&self) -> Result<Vec<RunId>, LogStoreError> {
        list_run_ids_in(&self.runs_dir)
    }
}

fn list_run_ids_in(dir: &Path) -> Result<Vec<RunId>, LogStoreError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LogStoreError::Io {
        run_id: None,
        source,
    })?;

    let mut run_ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LogStoreError::Io {
            run_id: None,
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Ok(run_id) = RunId::parse(stem.to_owned()) {
            run_ids.push(run_id);
        }
    }
    Ok(run_ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LockPolicy {
        LockPolicy {
            max_attempts: 20,
            retry_interval_ms: 5,
            stale_timeout_ms: 5_000,
        }
    }

    fn init_entry(run_id: &RunId) -> RunEntry {
        RunEntry {
            timestamp: "2026-01-01T00:00:00Z".to_owned(),
            state: "start".to_owned(),
            revision: 1,
            event: "__init__".to_owned(),
            idempotency_key: format!("__init__:{run_id}"),
            artifact_paths: Vec::new(),
        }
    }

    #[test]
    fn create_then_read_round_trips_the_init_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsRunLogStore::new(dir.path(), policy()).expect("store");
        let run_id = RunId::generate();
        store.create_run(&run_id, &init_entry(&run_id)).expect("create");

        let entries = store.read_entries(&run_id).expect("read");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].revision, 1);
        assert!(store.exists(&run_id));
    }

    #[test]
    fn append_with_matching_revision_succeeds_and_bumps_latest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsRunLogStore::new(dir.path(), policy()).expect("store");
        let run_id = RunId::generate();
        store.create_run(&run_id, &init_entry(&run_id)).expect("create");

        let mut next = init_entry(&run_id);
        next.revision = 2;
        next.event = "go".to_owned();
        next.state = "end".to_owned();
        next.idempotency_key = "k2".to_owned();

        let outcome = store
            .append_with_revision_check(&run_id, &next, 1)
            .expect("append");
        assert_eq!(outcome, AppendOutcome::Appended);
        assert_eq!(store.get_latest_entry(&run_id).expect("latest").revision, 2);
    }

    #[test]
    fn append_with_stale_revision_reports_conflict_without_writing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsRunLogStore::new(dir.path(), policy()).expect("store");
        let run_id = RunId::generate();
        store.create_run(&run_id, &init_entry(&run_id)).expect("create");

        let mut next = init_entry(&run_id);
        next.revision = 2;
        next.idempotency_key = "k2".to_owned();

        let outcome = store
            .append_with_revision_check(&run_id, &next, 0)
            .expect("append call itself succeeds");
        assert_eq!(outcome, AppendOutcome::Conflict { current_revision: 1 });
        assert_eq!(store.read_entries(&run_id).expect("read").len(), 1);
    }

    #[test]
    fn get_entry_by_idempotency_key_finds_a_prior_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsRunLogStore::new(dir.path(), policy()).expect("store");
        let run_id = RunId::generate();
        let init = init_entry(&run_id);
        store.create_run(&run_id, &init).expect("create");

        let found = store
            .get_entry_by_idempotency_key(&run_id, &init.idempotency_key)
            .expect("lookup");
        assert_eq!(found, Some(init));
    }

    #[test]
    fn list_run_ids_ignores_non_csv_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsRunLogStore::new(dir.path(), policy()).expect("store");
        let run_id = RunId::generate();
        store.create_run(&run_id, &init_entry(&run_id)).expect("create");
        std::fs::write(dir.path().join("notes.txt"), b"ignore me").expect("write stray file");

        let ids = store.list_run_ids().expect("list");
        assert_eq!(ids, vec![run_id]);
    }
}
