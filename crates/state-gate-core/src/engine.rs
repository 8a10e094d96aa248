// crates/state-gate-core/src/engine.rs
// ============================================================================
// Module: State Engine
// Description: The use-case facade orchestrating create-run, emit-event, and
//              the read-only query operations.
// Purpose: Be the single place that enforces role authorization, state
//          legality, guard satisfaction, optimistic concurrency, and
//          idempotency together, in the order §4.8 specifies.
// Dependencies: crate::{artifact, context, guard, interfaces, model,
//               registry, role, run}
// ============================================================================

//! ## Overview
//! [`StateEngine`] is generic over a [`RunLogStore`] and a [`MetadataStore`]
//! so that the commit algorithm of §4.8.2 can be exercised against in-memory
//! fakes in tests without touching a real filesystem. It owns a
//! [`ProcessRegistry`] directly rather than being generic over it, since the
//! registry's own caching and YAML-loading behavior (§4.7) is not a seam any
//! embedder has asked to swap.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use thiserror::Error;

use crate::artifact::FsArtifactProbe;
use crate::artifact::check_path_safety;
use crate::guard::GuardContext;
use crate::guard::GuardEvaluator;
use crate::guard::evaluate_named_guard;
use crate::identifiers::EventName;
use crate::identifiers::INIT_EVENT;
use crate::identifiers::ProcessId;
use crate::identifiers::RoleName;
use crate::identifiers::RunId;
use crate::identifiers::StateName;
use crate::interfaces::AppendOutcome;
use crate::interfaces::LogStoreError;
use crate::interfaces::MetadataStore;
use crate::interfaces::MetadataStoreError;
use crate::interfaces::RunLogStore;
use crate::model::Process;
use crate::model::Transition;
use crate::registry::ProcessRegistry;
use crate::registry::RegistryLoadError;
use crate::role::check_event as role_check_event;
use crate::role::check_transition as role_check_transition;
use crate::run::RunEntry;
use crate::run::RunMetadata;
use crate::run::init_idempotency_key;
use crate::run::union_artifact_paths;

// ============================================================================
// SECTION: Error taxonomy (§7)
// ============================================================================

/// The closed error taxonomy surfaced by every engine operation.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "code")]
pub enum EngineError {
    /// The referenced run does not exist.
    #[error("run '{run_id}' was not found")]
    #[serde(rename = "RUN_NOT_FOUND")]
    RunNotFound {
        /// The affected run.
        run_id: RunId,
    },
    /// The referenced process does not exist or fails to load.
    #[error("process '{process_id}' was not found")]
    #[serde(rename = "PROCESS_NOT_FOUND")]
    ProcessNotFound {
        /// The affected process.
        process_id: ProcessId,
    },
    /// The caller's expected revision does not match the run's current
    /// revision.
    #[error("expected revision {expected_revision}, run is at {current_revision}")]
    #[serde(rename = "REVISION_CONFLICT")]
    RevisionConflict {
        /// The run's actual current revision.
        current_revision: u64,
        /// The revision the caller expected.
        expected_revision: u64,
    },
    /// The role is not permitted to perform the requested operation.
    #[error("{reason}")]
    #[serde(rename = "FORBIDDEN")]
    Forbidden {
        /// A human-readable reason.
        reason: String,
    },
    /// No candidate transition's guard was satisfied.
    #[error("guard '{guard_name}' was not satisfied")]
    #[serde(rename = "GUARD_FAILED")]
    GuardFailed {
        /// The name of the guard that was last found unsatisfied.
        guard_name: String,
        /// The reasons the guard was unsatisfied.
        missing_requirements: Vec<String>,
    },
    /// The event is not defined, or no transition exists for it from the
    /// run's current state.
    #[error("{reason}")]
    #[serde(rename = "INVALID_EVENT")]
    InvalidEvent {
        /// A human-readable reason.
        reason: String,
    },
    /// The request payload failed shape or path-safety validation.
    #[error("payload failed validation: {validation_errors:?}")]
    #[serde(rename = "INVALID_PAYLOAD")]
    InvalidPayload {
        /// Per-field validation errors.
        validation_errors: Vec<FieldError>,
    },
    /// The request itself is malformed independent of payload shape.
    #[error("{reason}")]
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput {
        /// A human-readable reason.
        reason: String,
    },
    /// An unexpected failure occurred; the underlying cause is logged but
    /// redacted here.
    #[error("internal error: {reason}")]
    #[serde(rename = "INTERNAL_ERROR")]
    Internal {
        /// A redacted human-readable summary.
        reason: String,
    },
}

/// A single field-scoped validation error, used by
/// [`EngineError::InvalidPayload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// A JSON-Pointer path identifying the offending field.
    pub path: String,
    /// A human-readable message.
    pub message: String,
}

impl From<RegistryLoadError> for EngineError {
    fn from(error: RegistryLoadError) -> Self {
        match error {
            RegistryLoadError::NotFound(process_id) => Self::ProcessNotFound { process_id },
            RegistryLoadError::Invalid { process_id, .. } => Self::ProcessNotFound { process_id },
            RegistryLoadError::Parse { process_id, .. } => Self::ProcessNotFound { process_id },
            RegistryLoadError::Io { process_id, source } => {
                tracing::error!(%process_id, error = %source, "process registry I/O failure");
                Self::Internal {
                    reason: "process registry I/O failure".to_owned(),
                }
            }
        }
    }
}

impl From<MetadataStoreError> for EngineError {
    fn from(error: MetadataStoreError) -> Self {
        match error {
            MetadataStoreError::NotFound(run_id) => Self::RunNotFound { run_id },
            MetadataStoreError::Invalid { run_id, reason } => {
                tracing::error!(%run_id, %reason, "metadata shape validation failed");
                Self::Internal {
                    reason: "run metadata is invalid".to_owned(),
                }
            }
            MetadataStoreError::Io { run_id, source } => {
                tracing::error!(?run_id, error = %source, "metadata I/O failure");
                Self::Internal {
                    reason: "metadata I/O failure".to_owned(),
                }
            }
            MetadataStoreError::Lock { run_id, reason } => {
                tracing::error!(%run_id, %reason, "metadata lock failure");
                Self::Internal {
                    reason: "metadata lock failure".to_owned(),
                }
            }
        }
    }
}

impl From<LogStoreError> for EngineError {
    fn from(error: LogStoreError) -> Self {
        match error {
            LogStoreError::NotFound(run_id) => Self::RunNotFound { run_id },
            LogStoreError::AlreadyExists(run_id) => {
                tracing::error!(%run_id, "run log already exists");
                Self::Internal {
                    reason: "run log already exists".to_owned(),
                }
            }
            LogStoreError::Corrupt { run_id, reason } => {
                tracing::error!(%run_id, %reason, "run log is corrupt");
                Self::Internal {
                    reason: "run log is corrupt".to_owned(),
                }
            }
            LogStoreError::Io { run_id, source } => {
                tracing::error!(?run_id, error = %source, "run log I/O failure");
                Self::Internal {
                    reason: "run log I/O failure".to_owned(),
                }
            }
            LogStoreError::Lock { run_id, reason } => {
                tracing::error!(%run_id, %reason, "run log lock failure");
                Self::Internal {
                    reason: "run log lock failure".to_owned(),
                }
            }
        }
    }
}

// ============================================================================
// SECTION: Operation results
// ============================================================================

/// The result of [`StateEngine::create_run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateRunResult {
    /// The newly allocated run id.
    pub run_id: RunId,
    /// The process's initial state.
    pub initial_state: StateName,
    /// Always `1` for a freshly created run.
    pub revision: u64,
}

/// The result of a successful [`StateEngine::emit_event`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmitEventResult {
    /// A freshly generated identifier for this acceptance, distinct from
    /// the idempotency key.
    pub event_id: String,
    /// Always `true`; kept explicit to mirror the external wire shape.
    pub accepted: bool,
    /// Whether this result is a replay of a prior acceptance rather than a
    /// new commit.
    pub replayed: bool,
    /// The state transitioned from and to.
    pub transition: TransitionInfo,
    /// The run's new revision after this event.
    pub new_revision: u64,
    /// The destination state's guidance prompt, if any.
    pub new_state_prompt: Option<String>,
}

/// The `from`/`to` pair of a taken transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionInfo {
    /// The originating state.
    pub from: StateName,
    /// The destination state.
    pub to: StateName,
}

/// The result of [`StateEngine::get_state`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetStateResult {
    /// The process this run instantiates.
    pub process_id: ProcessId,
    /// The process definition's version string.
    pub process_version: String,
    /// The run's current state.
    pub current_state: StateName,
    /// The current state's guidance prompt, if any.
    pub current_state_prompt: Option<String>,
    /// The run's current revision.
    pub revision: u64,
    /// The run's current context map.
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Reasons guards on outgoing transitions are currently unsatisfied.
    pub missing_guards: Vec<String>,
    /// Artifact types the current state declares as required.
    pub required_artifacts: Vec<String>,
    /// Event names currently allowed from this state for at least one role.
    pub allowed_events: Vec<String>,
    /// The timestamp of the run's most recent log row.
    pub updated_at: String,
    /// The artifact base path, if configured.
    pub artifact_base_path: Option<String>,
}

/// Per-event information returned by [`StateEngine::list_events`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventInfo {
    /// The event's name.
    pub name: String,
    /// Whether this event currently has at least one fireable transition.
    pub allowed: bool,
    /// A human-readable reason, populated when `allowed` is `false`.
    pub blocked_reason: Option<String>,
}

/// The result of [`StateEngine::list_events`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListEventsResult {
    /// The run's current state.
    pub current_state: StateName,
    /// Per-event allow/block information.
    pub events: Vec<EventInfo>,
}

/// A summary row returned by [`StateEngine::list_runs`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// The run's identifier.
    pub run_id: RunId,
    /// The process this run instantiates.
    pub process_id: ProcessId,
    /// The run's current state.
    pub current_state: StateName,
    /// The run's current revision.
    pub revision: u64,
}

// ============================================================================
// SECTION: StateEngine
// ============================================================================

/// The use-case facade described in §4.8, generic over the run log and
/// metadata store implementations.
pub struct StateEngine<L: RunLogStore, M: MetadataStore> {
    log_store: L,
    metadata_store: M,
    registry: ProcessRegistry,
    artifact_probe: FsArtifactProbe,
}

impl<L: RunLogStore, M: MetadataStore> StateEngine<L, M> {
    /// Builds a state engine over the given stores and process registry.
    pub const fn new(log_store: L, metadata_store: M, registry: ProcessRegistry) -> Self {
        Self {
            log_store,
            metadata_store,
            registry,
            artifact_probe: FsArtifactProbe,
        }
    }

    /// Exposes the process registry so embedders can pre-install process
    /// definitions without going through the YAML front end.
    #[must_use]
    pub const fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // 4.8.1 create_run
    // ------------------------------------------------------------------

    /// Creates a new run of `process_id`, merging `initial_context` over the
    /// process's own initial context (caller wins on conflict).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ProcessNotFound`] if the process cannot be
    /// resolved, or [`EngineError::Internal`] on an underlying storage
    /// failure.
    pub fn create_run(
        &self,
        process_id: &ProcessId,
        initial_context: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<CreateRunResult, EngineError> {
        let process = self.registry.get_or_load(process_id)?;

        let run_id = RunId::generate();
        let mut context = process.initial_context.clone();
        if let Some(caller_context) = initial_context {
            for (key, value) in caller_context {
                context.insert(key, value);
            }
        }

        let now = now_rfc3339();
        let init_entry = RunEntry {
            timestamp: now.clone(),
            state: process.initial_state.to_string(),
            revision: 1,
            event: INIT_EVENT.to_owned(),
            idempotency_key: init_idempotency_key(&run_id),
            artifact_paths: Vec::new(),
        };

        self.log_store.create_run(&run_id, &init_entry)?;

        self.metadata_store.save(&RunMetadata {
            run_id: run_id.clone(),
            process_id: process_id.clone(),
            created_at: now,
            context,
            artifact_base_path: None,
        })?;

        tracing::info!(%run_id, %process_id, "run created");

        Ok(CreateRunResult {
            run_id,
            initial_state: process.initial_state,
            revision: 1,
        })
    }

    // ------------------------------------------------------------------
    // 4.8.2 emit_event
    // ------------------------------------------------------------------

    /// Emits `event_name` against `run_id`, implementing the thirteen-step
    /// algorithm of §4.8.2 in order.
    ///
    /// # Errors
    ///
    /// Returns the specific [`EngineError`] variant named at each numbered
    /// step of §4.8.2.
    #[allow(clippy::too_many_arguments, reason = "mirrors the six-parameter external EmitEvent operation plus role and payload")]
    pub fn emit_event(
        &self,
        run_id: &RunId,
        event_name: &EventName,
        expected_revision: u64,
        idempotency_key: &str,
        role: &RoleName,
        payload: Option<serde_json::Map<String, serde_json::Value>>,
        artifact_paths: Option<Vec<String>>,
    ) -> Result<EmitEventResult, EngineError> {
        // Step 1: idempotency key must be non-empty.
        if idempotency_key.is_empty() {
            return Err(EngineError::InvalidPayload {
                validation_errors: vec![FieldError {
                    path: "/idempotency_key".to_owned(),
                    message: "idempotency_key must be non-empty".to_owned(),
                }],
            });
        }

        // Step 2: load metadata.
        let metadata = self.metadata_store.load(run_id)?;

        // Step 3: resolve process.
        let process = self.registry.get_or_load(&metadata.process_id)?;

        // Step 4: idempotent replay, checked before the revision check.
        if let Some(existing) =
            self.log_store.get_entry_by_idempotency_key(run_id, idempotency_key)?
        {
            tracing::info!(%run_id, %idempotency_key, "idempotent replay");
            return Ok(EmitEventResult {
                event_id: uuid::Uuid::now_v7().to_string(),
                accepted: true,
                replayed: true,
                transition: TransitionInfo {
                    from: StateName::from(existing.state.clone()),
                    to: StateName::from(existing.state.clone()),
                },
                new_revision: existing.revision,
                new_state_prompt: process.state(&StateName::from(existing.state)).and_then(|s| s.prompt.clone()),
            });
        }

        // Step 5: validate artifact_paths.
        let artifact_paths = artifact_paths.unwrap_or_default();
        let mut validation_errors = Vec::new();
        for (index, path) in artifact_paths.iter().enumerate() {
            if let Err(invalid) = check_path_safety(path) {
                validation_errors.push(FieldError {
                    path: format!("/artifact_paths/{index}"),
                    message: invalid.reason.to_owned(),
                });
            }
        }
        if !validation_errors.is_empty() {
            return Err(EngineError::InvalidPayload { validation_errors });
        }

        // Step 6: fetch latest entry.
        let latest = self.log_store.get_latest_entry(run_id)?;

        // Step 7: optimistic revision check.
        if latest.revision != expected_revision {
            return Err(EngineError::RevisionConflict {
                current_revision: latest.revision,
                expected_revision,
            });
        }

        // Step 8: event must be defined.
        let event = process.event(event_name).ok_or_else(|| EngineError::InvalidEvent {
            reason: format!("event '{event_name}' is not defined"),
        })?;

        // Step 9: event-level permission.
        let event_check = role_check_event(role, event);
        if !event_check.allowed {
            return Err(EngineError::Forbidden {
                reason: event_check.reason.unwrap_or_default(),
            });
        }

        // Step 10: transition selection.
        let latest_state = StateName::from(latest.state.clone());
        let candidates: Vec<&Transition> = process.transitions_for(&latest_state, event_name).collect();
        if candidates.is_empty() {
            return Err(EngineError::InvalidEvent {
                reason: format!("no transition for event '{event_name}' from state '{latest_state}'"),
            });
        }

        let effective_artifacts = union_artifact_paths(&latest.artifact_paths, &artifact_paths);
        let guard_evaluator = GuardEvaluator::new(&self.artifact_probe);
        let guard_ctx = GuardContext {
            artifact_paths: &effective_artifacts,
            context: &metadata.context,
            artifact_base_path: metadata.artifact_base_path.as_deref(),
        };

        let (guarded, guardless): (Vec<&Transition>, Vec<&Transition>) =
            candidates.into_iter().partition(|t| t.guard.is_some());

        let mut selected: Option<&Transition> = None;
        let mut last_guard_failure: Option<(String, Vec<String>)> = None;

        for &transition in &guarded {
            if !role_check_transition(role, transition).allowed {
                continue;
            }
            let outcome = evaluate_named_guard(
                &guard_evaluator,
                &process.guards,
                transition.guard.as_ref(),
                &guard_ctx,
            );
            if outcome.satisfied {
                selected = Some(transition);
                break;
            }
            #[allow(clippy::unwrap_used, reason = "guarded transitions always carry a guard name by partition construction")]
            let guard_name = transition.guard.as_ref().unwrap().to_string();
            last_guard_failure = Some((guard_name, outcome.reasons));
        }

        if selected.is_none() {
            for &transition in &guardless {
                if role_check_transition(role, transition).allowed {
                    selected = Some(transition);
                    break;
                }
            }
        }

        let Some(transition) = selected else {
            return Err(match last_guard_failure {
                Some((guard_name, missing_requirements)) => EngineError::GuardFailed {
                    guard_name,
                    missing_requirements,
                },
                None => EngineError::Forbidden {
                    reason: format!("role '{role}' may not take any transition for event '{event_name}'"),
                },
            });
        };

        // Step 11: optional context merge, persisted after commit (§9
        // resolved open question: deferring avoids a divergence window
        // between metadata and the log on commit failure).
        let merged_context = match &payload {
            Some(payload) if !payload.is_empty() => {
                let mut merged = metadata.context.clone();
                for (key, value) in payload {
                    merged.insert(key.clone(), value.clone());
                }
                Some(merged)
            }
            _ => None,
        };

        // Step 12: commit.
        let now = now_rfc3339();
        let new_revision = expected_revision + 1;
        let new_entry = RunEntry {
            timestamp: now,
            state: transition.to.to_string(),
            revision: new_revision,
            event: event_name.to_string(),
            idempotency_key: idempotency_key.to_owned(),
            artifact_paths: effective_artifacts,
        };

        match self
            .log_store
            .append_with_revision_check(run_id, &new_entry, expected_revision)?
        {
            AppendOutcome::Conflict { current_revision } => {
                return Err(EngineError::RevisionConflict {
                    current_revision,
                    expected_revision,
                });
            }
            AppendOutcome::Appended => {}
        }

        if let Some(merged_context) = merged_context {
            self.metadata_store.save(&RunMetadata {
                context: merged_context,
                ..metadata
            })?;
        }

        tracing::info!(%run_id, %event_name, new_revision, "event accepted");

        Ok(EmitEventResult {
            event_id: uuid::Uuid::now_v7().to_string(),
            accepted: true,
            replayed: false,
            transition: TransitionInfo {
                from: latest_state,
                to: transition.to.clone(),
            },
            new_revision,
            new_state_prompt: process.state(&transition.to).and_then(|s| s.prompt.clone()),
        })
    }

    // ------------------------------------------------------------------
    // 4.8.3 read-only projections
    // ------------------------------------------------------------------

    /// Projects a run's current state, including which events are currently
    /// fireable.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RunNotFound`] or [`EngineError::ProcessNotFound`]
    /// if either lookup fails.
    pub fn get_state(&self, run_id: &RunId) -> Result<GetStateResult, EngineError> {
        let metadata = self.metadata_store.load(run_id)?;
        let process = self.registry.get_or_load(&metadata.process_id)?;
        let latest = self.log_store.get_latest_entry(run_id)?;
        let current_state = StateName::from(latest.state.clone());
        let state_def = process.state(&current_state);

        let list = self.list_events_inner(&process, &metadata, &latest, false);

        let missing_guards: Vec<String> = list
            .events
            .iter()
            .filter_map(|e| e.blocked_reason.clone())
            .collect();

        Ok(GetStateResult {
            process_id: metadata.process_id,
            process_version: process.version.clone(),
            current_state,
            current_state_prompt: state_def.and_then(|s| s.prompt.clone()),
            revision: latest.revision,
            context: metadata.context,
            missing_guards,
            required_artifacts: state_def
                .map(|s| s.required_artifacts.iter().map(ToString::to_string).collect())
                .unwrap_or_default(),
            allowed_events: list
                .events
                .iter()
                .filter(|e| e.allowed)
                .map(|e| e.name.clone())
                .collect(),
            updated_at: latest.timestamp,
            artifact_base_path: metadata.artifact_base_path,
        })
    }

    /// Lists every event, partitioned into allowed and (optionally) blocked.
    ///
    /// # Errors
    ///
    /// See [`StateEngine::get_state`].
    pub fn list_events(
        &self,
        run_id: &RunId,
        include_blocked: bool,
    ) -> Result<ListEventsResult, EngineError> {
        let metadata = self.metadata_store.load(run_id)?;
        let process = self.registry.get_or_load(&metadata.process_id)?;
        let latest = self.log_store.get_latest_entry(run_id)?;
        Ok(self.list_events_inner(&process, &metadata, &latest, include_blocked))
    }

    /// Shared implementation behind [`StateEngine::get_state`] and
    /// [`StateEngine::list_events`].
    fn list_events_inner(
        &self,
        process: &Process,
        metadata: &RunMetadata,
        latest: &RunEntry,
        include_blocked: bool,
    ) -> ListEventsResult {
        let current_state = StateName::from(latest.state.clone());
        let guard_evaluator = GuardEvaluator::new(&self.artifact_probe);
        let guard_ctx = GuardContext {
            artifact_paths: &latest.artifact_paths,
            context: &metadata.context,
            artifact_base_path: metadata.artifact_base_path.as_deref(),
        };

        let mut events = Vec::new();
        for event in &process.events {
            let candidates: Vec<&Transition> =
                process.transitions_for(&current_state, &event.name).collect();
            if candidates.is_empty() {
                continue;
            }

            let mut strictest_reason: Option<String> = None;
            let mut allowed = false;
            for transition in &candidates {
                let outcome = evaluate_named_guard(
                    &guard_evaluator,
                    &process.guards,
                    transition.guard.as_ref(),
                    &guard_ctx,
                );
                if !outcome.satisfied {
                    strictest_reason.get_or_insert_with(|| "guard not satisfied".to_owned());
                    continue;
                }
                allowed = true;
                break;
            }

            if allowed || include_blocked {
                events.push(EventInfo {
                    name: event.name.to_string(),
                    allowed,
                    blocked_reason: if allowed { None } else { strictest_reason },
                });
            }
        }

        ListEventsResult {
            current_state,
            events,
        }
    }

    /// Lists every run known to the log store.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Internal`] if the run log directory cannot be
    /// enumerated.
    pub fn list_runs(&self) -> Result<Vec<RunSummary>, EngineError> {
        let run_ids = self.log_store.list_run_ids()?;
        let mut summaries = Vec::with_capacity(run_ids.len());
        for run_id in run_ids {
            let metadata = match self.metadata_store.load(&run_id) {
                Ok(metadata) => metadata,
                Err(_) => continue,
            };
            let latest = self.log_store.get_latest_entry(&run_id)?;
            summaries.push(RunSummary {
                run_id,
                process_id: metadata.process_id,
                current_state: StateName::from(latest.state),
                revision: latest.revision,
            });
        }
        Ok(summaries)
    }

    /// Returns the full, ordered event history of a run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RunNotFound`] if the run does not exist.
    pub fn get_event_history(&self, run_id: &RunId) -> Result<Vec<RunEntry>, EngineError> {
        Ok(self.log_store.read_entries(run_id)?)
    }
}

/// The current UTC time, formatted as required by [`RunEntry::timestamp`]
/// and [`RunMetadata::created_at`].
fn now_rfc3339() -> String {
    #[allow(clippy::expect_used, reason = "system clock before the Unix epoch is not a recoverable condition")]
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .expect("formatting the current time as RFC 3339 never fails")
}
