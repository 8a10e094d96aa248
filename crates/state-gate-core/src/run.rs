// crates/state-gate-core/src/run.rs
// ============================================================================
// Module: Run Data Types
// Description: The append-only log row (RunEntry) and the mutable metadata
//              sidecar (RunMetadata), plus the cumulative-artifact-set helper
//              shared by the engine and the guard evaluator.
// Purpose: Give storage backends (crate::interfaces) and the engine
//          (crate::engine) a single shared representation of a run's
//          persisted state.
// Dependencies: serde, crate::identifiers
// ============================================================================

//! ## Overview
//! [`RunEntry`] is the in-memory form of one row of the append-only log
//! (§4.5); its on-disk CSV encoding lives in the `state-gate-store-fs` crate,
//! which depends on this one. [`RunMetadata`] is the JSON sidecar (§4.6).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::ProcessId;
use crate::identifiers::RunId;

// ============================================================================
// SECTION: RunEntry
// ============================================================================

/// One row of a run's append-only log.
///
/// # Invariants
/// - `revision` is 1-based; the first row of any run is always revision 1.
/// - `artifact_paths` holds the *cumulative* set for this row, not just the
///   paths newly attached by this event (see [`union_artifact_paths`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEntry {
    /// ISO-8601 UTC timestamp of acceptance.
    pub timestamp: String,
    /// The state the run occupies as of this row.
    pub state: String,
    /// The 1-based, strictly monotonic revision number.
    pub revision: u64,
    /// The event name that produced this row (`__init__` for the first row).
    pub event: String,
    /// The caller-supplied idempotency key.
    pub idempotency_key: String,
    /// The cumulative, order-preserving, deduplicated artifact path set.
    pub artifact_paths: Vec<String>,
}

/// Builds the reserved idempotency key for a run's synthetic init row.
#[must_use]
pub fn init_idempotency_key(run_id: &RunId) -> String {
    format!("{}:{run_id}", crate::identifiers::INIT_EVENT)
}

/// Merges `previous` and `added` into a single order-preserving, deduplicated
/// list, per the "Cumulative artifacts" invariant in §3.
#[must_use]
pub fn union_artifact_paths(previous: &[String], added: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(previous.len() + added.len());
    let mut out = Vec::with_capacity(previous.len() + added.len());
    for path in previous.iter().chain(added.iter()) {
        if seen.insert(path.clone()) {
            out.push(path.clone());
        }
    }
    out
}

// ============================================================================
// SECTION: RunMetadata
// ============================================================================

/// The per-run JSON sidecar (§4.6): everything about a run that is not part
/// of the immutable audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// The run's identifier.
    pub run_id: RunId,
    /// The identifier of the process this run is an instance of.
    pub process_id: ProcessId,
    /// ISO-8601 UTC creation timestamp.
    pub created_at: String,
    /// The run's mutable context map.
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
    /// An optional base directory artifact paths are resolved under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_base_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_deduplicates_while_preserving_first_seen_order() {
        let previous = vec!["a.txt".to_owned(), "b.txt".to_owned()];
        let added = vec!["b.txt".to_owned(), "c.txt".to_owned()];
        let merged = union_artifact_paths(&previous, &added);
        assert_eq!(merged, vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn init_idempotency_key_is_namespaced_per_run() {
        let run_id = RunId::generate();
        let key = init_idempotency_key(&run_id);
        assert!(key.starts_with("__init__:"));
        assert!(key.ends_with(run_id.as_str()));
    }
}
