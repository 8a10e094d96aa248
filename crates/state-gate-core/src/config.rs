// crates/state-gate-core/src/config.rs
// ============================================================================
// Module: Gate Configuration
// Description: The on-disk layout and lock policy shared by every component
//              that touches the filesystem.
// Purpose: Give the store, registry, and lock primitive a single source of
//          truth for directory names and retry policy, with defaults
//          matching the §6 on-disk layout.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! `GateConfig` is deserialized from an optional JSON file at the root of a
//! gate's working directory; every field defaults to the values described in
//! §6 of the governing specification, so a gate with no config file at all
//! behaves identically to one with an explicit, fully-populated file.

use serde::Deserialize;
use serde::Serialize;

/// Layout and policy configuration for a single state-gate root directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Directory name (relative to root) holding `.state_gate/runs`.
    pub runs_dir: String,
    /// Directory name holding `.state_gate/metadata`.
    pub metadata_dir: String,
    /// Directory name holding `.state_gate/artifacts/<run_id>`.
    pub artifacts_dir: String,
    /// Directory name holding `.state_gate/processes`.
    pub processes_dir: String,
    /// File extension (without leading dot) used for run log files.
    pub log_ext: String,
    /// The lock acquisition policy shared by the log and metadata stores.
    pub lock_policy: LockPolicy,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            runs_dir: "runs".to_owned(),
            metadata_dir: "metadata".to_owned(),
            artifacts_dir: "artifacts".to_owned(),
            processes_dir: "processes".to_owned(),
            log_ext: "csv".to_owned(),
            lock_policy: LockPolicy::default(),
        }
    }
}

/// Retry and staleness policy for the per-file advisory lock (§5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockPolicy {
    /// Maximum number of acquisition attempts before giving up.
    pub max_attempts: u32,
    /// Fixed delay between acquisition attempts, in milliseconds.
    pub retry_interval_ms: u64,
    /// Age, in milliseconds, past which a sentinel is considered stale and
    /// may be reclaimed.
    pub stale_timeout_ms: u64,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            retry_interval_ms: 20,
            stale_timeout_ms: 30_000,
        }
    }
}

/// The default name of the default-run pointer file named in §6.
pub const DEFAULT_RUN_POINTER_FILE: &str = "state-gate-config.json";

/// A default-run pointer: `{ run_id, role? }`, read by the CLI and other
/// external collaborators that want to operate against "the current run"
/// without naming it explicitly on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultRunPointer {
    /// The run id to operate against by default.
    pub run_id: crate::identifiers::RunId,
    /// An optional role to present by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<crate::identifiers::RoleName>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_layout() {
        let config = GateConfig::default();
        assert_eq!(config.runs_dir, "runs");
        assert_eq!(config.metadata_dir, "metadata");
        assert_eq!(config.log_ext, "csv");
    }

    #[test]
    fn deserializing_an_empty_object_yields_defaults() {
        let config: GateConfig = serde_json::from_str("{}").expect("empty object deserializes");
        assert_eq!(config, GateConfig::default());
    }
}
