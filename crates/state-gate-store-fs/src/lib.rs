//! # state-gate-store-fs
//!
//! The filesystem-backed implementation of `state_gate_core`'s storage
//! traits: [`FsRunLogStore`] for the append-only per-run CSV log, and
//! [`FsMetadataStore`] for the JSON metadata sidecar. Both use
//! [`lock::FileLock`] to serialize concurrent access to a given run's files.

pub mod csv_codec;
pub mod lock;
pub mod log_store;
pub mod metadata_store;

pub use log_store::FsRunLogStore;
pub use metadata_store::FsMetadataStore;
