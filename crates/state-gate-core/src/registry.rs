// crates/state-gate-core/src/registry.rs
// ============================================================================
// Module: Process Registry
// Description: In-memory cache of validated process definitions, lazily
//              loaded from a directory of YAML files.
// Purpose: Let the engine resolve a process id to a validated Process
//          without re-parsing and re-validating YAML on every call.
// Dependencies: serde_yaml, crate::model, crate::validator
// ============================================================================

//! ## Overview
//! A process definition is installed in the registry once, either directly
//! (for tests and embedders that already have a validated [`Process`]) or
//! lazily by [`ProcessRegistry::get_or_load`], which tries `<id>.yaml` then
//! `<id>.yml` under the registry's process directory. A parse or validation
//! failure is treated as "not found": the registry never caches an invalid
//! definition, and a subsequent fix to the file on disk is picked up on the
//! next lookup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::identifiers::ProcessId;
use crate::model::Process;
use crate::validator::validate_process;

/// Errors encountered while loading a process definition from disk.
#[derive(Debug, thiserror::Error)]
pub enum RegistryLoadError {
    /// Neither `<id>.yaml` nor `<id>.yml` exists under the process
    /// directory.
    #[error("no process definition file found for '{0}'")]
    NotFound(ProcessId),
    /// The file exists but is not valid YAML.
    #[error("process '{process_id}' failed to parse: {source}")]
    Parse {
        /// The affected process id.
        process_id: ProcessId,
        /// The underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },
    /// The file parsed but failed static validation.
    #[error("process '{process_id}' failed validation: {errors:?}")]
    Invalid {
        /// The affected process id.
        process_id: ProcessId,
        /// The accumulated validation errors.
        errors: Vec<crate::validator::ValidationError>,
    },
    /// An underlying I/O error occurred while reading the file.
    #[error("process '{process_id}' I/O error: {source}")]
    Io {
        /// The affected process id.
        process_id: ProcessId,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// An in-memory, lazily-populated cache of validated process definitions.
pub struct ProcessRegistry {
    processes_dir: PathBuf,
    cache: Mutex<HashMap<ProcessId, Process>>,
}

impl ProcessRegistry {
    /// Builds a registry that loads process files from `processes_dir` on
    /// cache miss.
    #[must_use]
    pub fn new(processes_dir: impl Into<PathBuf>) -> Self {
        Self {
            processes_dir: processes_dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a cached process without touching the filesystem.
    ///
    /// # Panics
    ///
    /// Panics only if the internal cache mutex is poisoned by an earlier
    /// panic in another thread.
    #[must_use]
    pub fn get(&self, process_id: &ProcessId) -> Option<Process> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic we cannot recover from")]
        let cache = self.cache.lock().unwrap();
        cache.get(process_id).cloned()
    }

    /// Installs an already-validated process directly, bypassing the
    /// filesystem. Intended for tests and embedders with their own process
    /// source.
    ///
    /// # Panics
    ///
    /// See [`ProcessRegistry::get`].
    pub fn install(&self, process: Process) {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic we cannot recover from")]
        let mut cache = self.cache.lock().unwrap();
        cache.insert(process.id.clone(), process);
    }

    /// Returns a cached process, or attempts to load, parse, and validate it
    /// from `<processes_dir>/<id>.yaml` then `<id>.yml` on miss.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryLoadError::NotFound`] if neither file exists, or a
    /// parse/validation error otherwise. A failed load is never cached.
    ///
    /// # Panics
    ///
    /// See [`ProcessRegistry::get`].
    pub fn get_or_load(&self, process_id: &ProcessId) -> Result<Process, RegistryLoadError> {
        if let Some(process) = self.get(process_id) {
            return Ok(process);
        }

        let process = self.load_from_disk(process_id)?;
        self.install(process.clone());
        Ok(process)
    }

    fn load_from_disk(&self, process_id: &ProcessId) -> Result<Process, RegistryLoadError> {
        let candidates = [
            self.processes_dir.join(format!("{process_id}.yaml")),
            self.processes_dir.join(format!("{process_id}.yml")),
        ];

        let path = candidates
            .iter()
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| RegistryLoadError::NotFound(process_id.clone()))?;

        let contents = std::fs::read_to_string(path).map_err(|source| RegistryLoadError::Io {
            process_id: process_id.clone(),
            source,
        })?;

        let parsed: Process =
            serde_yaml::from_str(&contents).map_err(|source| RegistryLoadError::Parse {
                process_id: process_id.clone(),
                source,
            })?;

        validate_process(parsed).map_err(|errors| RegistryLoadError::Invalid {
            process_id: process_id.clone(),
            errors,
        })
    }

    /// The directory this registry loads process files from.
    #[must_use]
    pub fn processes_dir(&self) -> &Path {
        &self.processes_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::EventName;
    use crate::identifiers::RoleName;
    use crate::identifiers::StateName;
    use crate::model::EventDefinition;
    use crate::model::State;
    use crate::model::Transition;

    fn sample_yaml() -> &'static str {
        r#"
id: sample
initial_state: start
states:
  - name: start
    is_final: false
  - name: end
    is_final: true
events:
  - name: go
    allowed_roles: ["*"]
transitions:
  - from: start
    event: go
    to: end
"#
    }

    #[test]
    fn loads_parses_and_validates_then_memoizes() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("sample.yaml"), sample_yaml()).expect("write fixture");

        let registry = ProcessRegistry::new(dir.path());
        let process_id = ProcessId::from("sample");

        assert!(registry.get(&process_id).is_none());
        let loaded = registry.get_or_load(&process_id).expect("load succeeds");
        assert_eq!(loaded.initial_state, StateName::from("start"));
        assert!(registry.get(&process_id).is_some());
    }

    #[test]
    fn missing_file_is_not_found_not_a_panic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ProcessRegistry::new(dir.path());
        let result = registry.get_or_load(&ProcessId::from("nonexistent"));
        assert!(matches!(result, Err(RegistryLoadError::NotFound(_))));
    }

    #[test]
    fn invalid_definition_is_never_cached() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("broken.yaml"),
            "id: broken\ninitial_state: nowhere\nstates: []\nevents: []\ntransitions: []\n",
        )
        .expect("write fixture");

        let registry = ProcessRegistry::new(dir.path());
        let process_id = ProcessId::from("broken");
        assert!(registry.get_or_load(&process_id).is_err());
        assert!(registry.get(&process_id).is_none());
    }

    #[test]
    fn install_bypasses_disk_and_is_immediately_visible() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ProcessRegistry::new(dir.path());
        let process = Process {
            id: ProcessId::from("installed"),
            version: "1".to_owned(),
            initial_state: StateName::from("start"),
            initial_context: serde_json::Map::new(),
            states: vec![
                State {
                    name: StateName::from("start"),
                    prompt: None,
                    required_artifacts: vec![],
                    tool_permissions: Default::default(),
                    is_final: false,
                },
                State {
                    name: StateName::from("end"),
                    prompt: None,
                    required_artifacts: vec![],
                    tool_permissions: Default::default(),
                    is_final: true,
                },
            ],
            events: vec![EventDefinition {
                name: EventName::from("go"),
                payload_shape: None,
                allowed_roles: vec![RoleName::from("*")],
            }],
            transitions: vec![Transition {
                from: StateName::from("start"),
                event: EventName::from("go"),
                to: StateName::from("end"),
                guard: None,
                allowed_roles: None,
            }],
            guards: Default::default(),
            artifacts: vec![],
            roles: vec![],
        };
        registry.install(process.clone());
        assert_eq!(registry.get(&ProcessId::from("installed")), Some(process));
    }
}
