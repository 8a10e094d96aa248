// crates/state-gate-core/src/interfaces.rs
// ============================================================================
// Module: Storage Interfaces
// Description: Backend-agnostic traits for the run log and metadata stores.
// Purpose: Let the engine (crate::engine) orchestrate persistence without
//          depending on a concrete filesystem backend; state-gate-store-fs
//          implements these traits over the local filesystem.
// Dependencies: crate::run, thiserror
// ============================================================================

//! ## Overview
//! These traits exist so the engine's commit algorithm (§4.8.2) can be
//! exercised against an in-memory fake in tests, and so that the locking
//! discipline of §5 stays entirely inside the concrete implementation.
//!
//! Security posture: implementations receive run ids and paths that have
//! already passed [`crate::artifact::check_path_safety`] and
//! [`crate::identifiers::RunId::parse`]; they must not re-derive trust from
//! unchecked strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::identifiers::RunId;
use crate::run::RunEntry;
use crate::run::RunMetadata;

// ============================================================================
// SECTION: Run Log Store
// ============================================================================

/// Errors raised by a [`RunLogStore`] implementation.
#[derive(Debug, Error)]
pub enum LogStoreError {
    /// The requested run's log file does not exist.
    #[error("run log not found for run '{0}'")]
    NotFound(RunId),
    /// A run log already exists where [`RunLogStore::create_run`] expected
    /// none.
    #[error("run log already exists for run '{0}'")]
    AlreadyExists(RunId),
    /// The log file's contents could not be parsed.
    #[error("run log for '{run_id}' is corrupt: {reason}")]
    Corrupt {
        /// The affected run.
        run_id: RunId,
        /// A human-readable description of the parse failure.
        reason: String,
    },
    /// An underlying I/O error occurred, not always scoped to one run (for
    /// example, enumerating the run directory itself).
    #[error("run log I/O error{}: {source}", run_id.as_ref().map_or_else(String::new, |id| format!(" for '{id}'")))]
    Io {
        /// The affected run, if the failure is scoped to one.
        run_id: Option<RunId>,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Acquiring the per-file lock failed or timed out.
    #[error("run log lock error for '{run_id}': {reason}")]
    Lock {
        /// The affected run.
        run_id: RunId,
        /// A human-readable description.
        reason: String,
    },
}

/// The outcome of [`RunLogStore::append_with_revision_check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The entry was appended because the expected revision matched.
    Appended,
    /// The expected revision did not match the log's current revision; no
    /// write occurred.
    Conflict {
        /// The log's actual current revision.
        current_revision: u64,
    },
}

/// The append-only, revision-checked run log store (§4.5).
pub trait RunLogStore {
    /// Creates a new run's log file with a header row and the synthetic
    /// init entry.
    ///
    /// # Errors
    ///
    /// Returns [`LogStoreError::AlreadyExists`] if the file already exists,
    /// or [`LogStoreError::Io`] on an underlying I/O failure.
    fn create_run(&self, run_id: &RunId, init_entry: &RunEntry) -> Result<(), LogStoreError>;

    /// Appends `entry` under the revision-checked commit protocol of §5: the
    /// critical section re-reads the latest row before deciding to append.
    ///
    /// # Errors
    ///
    /// Returns [`LogStoreError::NotFound`] if the run does not exist, or
    /// [`LogStoreError::Lock`]/[`LogStoreError::Io`] on lock or I/O failure.
    fn append_with_revision_check(
        &self,
        run_id: &RunId,
        entry: &RunEntry,
        expected_revision: u64,
    ) -> Result<AppendOutcome, LogStoreError>;

    /// Reads every entry of a run's log, in file order.
    ///
    /// # Errors
    ///
    /// Returns [`LogStoreError::NotFound`] if the run does not exist, or
    /// [`LogStoreError::Corrupt`]/[`LogStoreError::Io`] on read failure.
    fn read_entries(&self, run_id: &RunId) -> Result<Vec<RunEntry>, LogStoreError>;

    /// Returns the most recently appended entry.
    ///
    /// # Errors
    ///
    /// See [`RunLogStore::read_entries`].
    fn get_latest_entry(&self, run_id: &RunId) -> Result<RunEntry, LogStoreError> {
        self.read_entries(run_id)?
            .into_iter()
            .next_back()
            .ok_or_else(|| LogStoreError::Corrupt {
                run_id: run_id.clone(),
                reason: "log has no entries".to_owned(),
            })
    }

    /// Returns the entry whose `idempotency_key` equals `key`, if any.
    ///
    /// # Errors
    ///
    /// See [`RunLogStore::read_entries`].
    fn get_entry_by_idempotency_key(
        &self,
        run_id: &RunId,
        key: &str,
    ) -> Result<Option<RunEntry>, LogStoreError> {
        Ok(self
            .read_entries(run_id)?
            .into_iter()
            .find(|entry| entry.idempotency_key == key))
    }

    /// Returns whether a run's log file exists.
    fn exists(&self, run_id: &RunId) -> bool;

    /// Lists every run id known to the store.
    ///
    /// # Errors
    ///
    /// Returns [`LogStoreError::Io`] if the backing directory cannot be
    /// enumerated.
    fn list_run_ids(&self) -> Result<Vec<RunId>, LogStoreError>;
}

// ============================================================================
// SECTION: Metadata Store
// ============================================================================

/// Errors raised by a [`MetadataStore`] implementation.
#[derive(Debug, Error)]
pub enum MetadataStoreError {
    /// No metadata file exists for the requested run.
    #[error("metadata not found for run '{0}'")]
    NotFound(RunId),
    /// The metadata file exists but fails shape validation.
    #[error("metadata for '{run_id}' is invalid: {reason}")]
    Invalid {
        /// The affected run.
        run_id: RunId,
        /// A human-readable description of the shape failure.
        reason: String,
    },
    /// An underlying I/O error occurred, not always scoped to one run (for
    /// example, enumerating the metadata directory itself).
    #[error("metadata I/O error{}: {source}", run_id.as_ref().map_or_else(String::new, |id| format!(" for '{id}'")))]
    Io {
        /// The affected run, if the failure is scoped to one.
        run_id: Option<RunId>,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Acquiring the per-file lock failed or timed out.
    #[error("metadata lock error for '{run_id}': {reason}")]
    Lock {
        /// The affected run.
        run_id: RunId,
        /// A human-readable description.
        reason: String,
    },
}

/// The per-run JSON metadata sidecar store (§4.6).
pub trait MetadataStore {
    /// Writes `metadata` whole, under a lock.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataStoreError::Lock`] or [`MetadataStoreError::Io`] on
    /// failure.
    fn save(&self, metadata: &RunMetadata) -> Result<(), MetadataStoreError>;

    /// Loads a run's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataStoreError::NotFound`] if no file exists,
    /// [`MetadataStoreError::Invalid`] if the file fails shape validation,
    /// or [`MetadataStoreError::Io`] on read failure.
    fn load(&self, run_id: &RunId) -> Result<RunMetadata, MetadataStoreError>;

    /// Returns whether a metadata file exists for `run_id`.
    fn exists(&self, run_id: &RunId) -> bool;

    /// Lists every run id with metadata present.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataStoreError::Io`] if the backing directory cannot be
    /// enumerated.
    fn list_all(&self) -> Result<Vec<RunId>, MetadataStoreError>;

    /// Deletes a run's metadata file, if present.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataStoreError::Io`] on failure other than "not found".
    fn delete(&self, run_id: &RunId) -> Result<(), MetadataStoreError>;
}
