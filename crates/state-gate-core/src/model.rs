// crates/state-gate-core/src/model.rs
// ============================================================================
// Module: Process Model
// Description: The typed, serde-deserializable definition of a process
//              (state-machine definition): states, events, transitions,
//              guards, artifact types, and roles.
// Purpose: Give the validator (crate::validator) and the registry
//          (crate::registry) a single shared in-memory representation.
// Dependencies: serde, crate::guard, crate::identifiers
// ============================================================================

//! ## Overview
//! A [`Process`] is deserialized directly from the on-disk YAML front end
//! (see `crate::registry`) and is never mutated after construction; the
//! validator either returns it unchanged or rejects it with structured
//! errors. Field order in the structs here follows the on-disk YAML shape,
//! not the validation order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::guard::Guard;
use crate::identifiers::ArtifactTypeName;
use crate::identifiers::EventName;
use crate::identifiers::GuardName;
use crate::identifiers::ProcessId;
use crate::identifiers::RoleName;
use crate::identifiers::StateName;

// ============================================================================
// SECTION: Tool permission policy
// ============================================================================

/// The decision a hook adapter should make for an external tool invocation
/// while a run sits in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPermission {
    /// The tool call is permitted without prompting.
    Allowed,
    /// The tool call is rejected.
    Denied,
    /// The tool call requires interactive confirmation.
    Ask,
}

// ============================================================================
// SECTION: States
// ============================================================================

/// A single named state in a process.
///
/// # Invariants
/// - `name` is unique within the owning [`Process`] (enforced by the
///   validator, not this type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// The state's unique name.
    pub name: StateName,
    /// Optional guidance text surfaced to the agent occupying this state.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Optional list of artifact types this state expects to be present.
    #[serde(default)]
    pub required_artifacts: Vec<ArtifactTypeName>,
    /// Optional per-tool permission policy consulted by the hook adapter.
    #[serde(default)]
    pub tool_permissions: BTreeMap<String, ToolPermission>,
    /// Whether reaching this state ends the run.
    #[serde(default)]
    pub is_final: bool,
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// A named input accepted by the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    /// The event's unique name.
    pub name: EventName,
    /// An optional, shape-only payload description (§1: payload-schema
    /// enforcement beyond shape is a stub and is not consulted here).
    #[serde(default)]
    pub payload_shape: Option<serde_json::Value>,
    /// Roles permitted to emit this event; `["*"]` permits every role.
    pub allowed_roles: Vec<RoleName>,
}

// ============================================================================
// SECTION: Transitions
// ============================================================================

/// A directed edge `(from, event) -> to`, optionally guarded and
/// role-restricted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// The originating state name.
    pub from: StateName,
    /// The event name that may trigger this transition.
    pub event: EventName,
    /// The destination state name.
    pub to: StateName,
    /// An optional named guard that must be satisfied for this transition to
    /// be selected.
    #[serde(default)]
    pub guard: Option<GuardName>,
    /// An optional role restriction narrower than the event's own.
    #[serde(default)]
    pub allowed_roles: Option<Vec<RoleName>>,
}

// ============================================================================
// SECTION: Artifact and role definitions
// ============================================================================

/// A documentary description of an artifact type recognized by the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDefinition {
    /// The artifact type's unique name.
    pub artifact_type: ArtifactTypeName,
    /// A human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

/// A documentary description of a role recognized by the process. Role
/// definitions are not themselves enforced; they exist so the YAML front end
/// and tooling can list known roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// The role's unique name.
    pub role: RoleName,
    /// A human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// SECTION: Process
// ============================================================================

/// An immutable, validated process definition.
///
/// # Invariants
/// - Construction outside [`crate::validator::validate_process`] should be
///   treated as untrusted; only a [`Process`] that has passed validation may
///   be installed into a [`crate::registry::ProcessRegistry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    /// The process's stable identifier.
    pub id: ProcessId,
    /// The process definition's version, documentary only.
    #[serde(default = "default_process_version")]
    pub version: String,
    /// The name of the state a new run starts in.
    pub initial_state: StateName,
    /// Initial context merged into every new run's metadata, overridden by
    /// caller-supplied initial context on conflict.
    #[serde(default)]
    pub initial_context: serde_json::Map<String, serde_json::Value>,
    /// All states in the process, in definition order.
    pub states: Vec<State>,
    /// All events accepted by the process, in definition order.
    pub events: Vec<EventDefinition>,
    /// All transitions, in definition order; definition order governs
    /// transition-selection tie-breaking (§4.8.2 step 10).
    pub transitions: Vec<Transition>,
    /// Named guards referenced by transitions.
    #[serde(default)]
    pub guards: BTreeMap<GuardName, Guard>,
    /// Documentary artifact type definitions.
    #[serde(default)]
    pub artifacts: Vec<ArtifactDefinition>,
    /// Documentary role definitions.
    #[serde(default)]
    pub roles: Vec<RoleDefinition>,
}

fn default_process_version() -> String {
    "1".to_owned()
}

impl Process {
    /// Finds a state by name.
    #[must_use]
    pub fn state(&self, name: &StateName) -> Option<&State> {
        self.states.iter().find(|s| &s.name == name)
    }

    /// Finds an event definition by name.
    #[must_use]
    pub fn event(&self, name: &EventName) -> Option<&EventDefinition> {
        self.events.iter().find(|e| &e.name == name)
    }

    /// Returns all transitions originating from `from` for `event`, in
    /// definition order.
    pub fn transitions_for(
        &self,
        from: &StateName,
        event: &EventName,
    ) -> impl Iterator<Item = &Transition> {
        self.transitions
            .iter()
            .filter(move |t| &t.from == from && &t.event == event)
    }
}
