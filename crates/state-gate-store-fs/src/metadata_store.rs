// crates/state-gate-store-fs/src/metadata_store.rs
// ============================================================================
// Module: Filesystem Metadata Store
// Description: Implements MetadataStore over one JSON sidecar file per run.
// Purpose: Back the engine's metadata reads and (deferred, post-commit)
//          context merges (§4.6, §9) with a concrete filesystem layout.
// Dependencies: state_gate_core::{interfaces, identifiers, run},
//               crate::lock, serde_json
// ============================================================================

//! ## Overview
//! Each run's metadata lives at `<metadata_dir>/<run_id>.json`, written whole
//! on every [`MetadataStore::save`] under the same per-file lock primitive the
//! log store uses, so a concurrent reader never observes a half-written file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use state_gate_core::config::LockPolicy;
use state_gate_core::identifiers::RunId;
use state_gate_core::interfaces::MetadataStore;
use state_gate_core::interfaces::MetadataStoreError;
use state_gate_core::run::RunMetadata;

use crate::lock::FileLock;

/// A [`MetadataStore`] backed by one `<run_id>.json` file per run under a
/// configured directory.
pub struct FsMetadataStore {
    metadata_dir: PathBuf,
    lock_policy: LockPolicy,
}

impl FsMetadataStore {
    /// Builds a store rooted at `metadata_dir`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataStoreError::Io`] if `metadata_dir` cannot be
    /// created.
    pub fn new(
        metadata_dir: impl Into<PathBuf>,
        lock_policy: LockPolicy,
    ) -> Result<Self, MetadataStoreError> {
        let metadata_dir = metadata_dir.into();
        std::fs::create_dir_all(&metadata_dir).map_err(|source| MetadataStoreError::Io {
            run_id: None,
            source,
        })?;
        Ok(Self {
            metadata_dir,
            lock_policy,
        })
    }

    fn path_for(&self, run_id: &RunId) -> PathBuf {
        self.metadata_dir.join(format!("{run_id}.json"))
    }
}

impl MetadataStore for FsMetadataStore {
    fn save(&self, metadata: &RunMetadata) -> Result<(), MetadataStoreError> {
        let path = self.path_for(&metadata.run_id);
        let lock = FileLock::new(&path, self.lock_policy);
        let _guard = lock.acquire().map_err(|error| MetadataStoreError::Lock {
            run_id: metadata.run_id.clone(),
            reason: error.to_string(),
        })?;

        let json = serde_json::to_vec_pretty(metadata).map_err(|source| MetadataStoreError::Io {
            run_id: Some(metadata.run_id.clone()),
            source: std::io::Error::other(source),
        })?;
        std::fs::write(&path, json).map_err(|source| MetadataStoreError::Io {
            run_id: Some(metadata.run_id.clone()),
            source,
        })
    }

    fn load(&self, run_id: &RunId) -> Result<RunMetadata, MetadataStoreError> {
        let path = self.path_for(run_id);
        let contents = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                MetadataStoreError::NotFound(run_id.clone())
            } else {
                MetadataStoreError::Io {
                    run_id: Some(run_id.clone()),
                    source,
                }
            }
        })?;
        let metadata: RunMetadata =
            serde_json::from_str(&contents).map_err(|error| MetadataStoreError::Invalid {
                run_id: run_id.clone(),
                reason: error.to_string(),
            })?;
        if &metadata.run_id != run_id {
            return Err(MetadataStoreError::Invalid {
                run_id: run_id.clone(),
                reason: "metadata run_id does not match its filename".to_owned(),
            });
        }
        Ok(metadata)
    }

    fn exists(&self, run_id: &RunId) -> bool {
        self.path_for(run_id).is_file()
    }

    fn list_all(&self) -> Result<Vec<RunId>, MetadataStoreError> {
        list_run_ids_in(&self.metadata_dir)
    }

    fn delete(&self, run_id: &RunId) -> Result<(), MetadataStoreError> {
        match std::fs::remove_file(self.path_for(run_id)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MetadataStoreError::Io {
                run_id: Some(run_id.clone()),
                source,
            }),
        }
    }
}

fn list_run_ids_in(dir: &Path) -> Result<Vec<RunId>, MetadataStoreError> {
    let entries = std::fs::read_dir(dir).map_err(|source| MetadataStoreError::Io {
        run_id: None,
        source,
    })?;

    let mut run_ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| MetadataStoreError::Io {
            run_id: None,
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
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

    fn metadata(run_id: RunId) -> RunMetadata {
        RunMetadata {
            run_id,
            process_id: state_gate_core::identifiers::ProcessId::from("sample"),
            created_at: "2026-01-01T00:00:00Z".to_owned(),
            context: serde_json::Map::new(),
            artifact_base_path: None,
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsMetadataStore::new(dir.path(), policy()).expect("store");
        let run_id = RunId::generate();
        let original = metadata(run_id.clone());
        store.save(&original).expect("save");

        let loaded = store.load(&run_id).expect("load");
        assert_eq!(loaded, original);
        assert!(store.exists(&run_id));
    }

    #[test]
    fn load_missing_run_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsMetadataStore::new(dir.path(), policy()).expect("store");
        let result = store.load(&RunId::generate());
        assert!(matches!(result, Err(MetadataStoreError::NotFound(_))));
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsMetadataStore::new(dir.path(), policy()).expect("store");
        let run_id = RunId::generate();
        store.save(&metadata(run_id.clone())).expect("save");

        store.delete(&run_id).expect("first delete");
        store.delete(&run_id).expect("second delete is a no-op");
        assert!(!store.exists(&run_id));
    }

    #[test]
    fn list_all_ignores_non_json_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsMetadataStore::new(dir.path(), policy()).expect("store");
        let run_id = RunId::generate();
        store.save(&metadata(run_id.clone())).expect("save");
        std::fs::write(dir.path().join("notes.txt"), b"ignore me").expect("write stray file");

        let ids = store.list_all().expect("list");
        assert_eq!(ids, vec![run_id]);
    }
}
