// crates/state-gate-core/src/validator.rs
// ============================================================================
// Module: Process Validator
// Description: Static integrity checks run once, at process load time.
// Purpose: Reject a malformed process definition before it is ever installed
//          in the registry, with every problem reported at once.
// Dependencies: crate::model, crate::identifiers
// ============================================================================

//! ## Overview
//! Validation is total: every check runs regardless of earlier failures, and
//! every reported [`ValidationError`] carries a stable `code` and a
//! JSON-Pointer-shaped `path` into the source document. The order errors are
//! produced in is not guaranteed, but no error is ever reported twice for the
//! same offending element.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;

use crate::identifiers::WILDCARD_ROLE;
use crate::model::Process;

// ============================================================================
// SECTION: Error taxonomy
// ============================================================================

/// A single static validation failure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationError {
    /// A stable, closed-set error code.
    pub code: ValidationErrorCode,
    /// A JSON-Pointer path into the process document identifying the
    /// offending element.
    pub path: String,
    /// A human-readable message.
    pub message: String,
}

/// The closed set of static validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorCode {
    /// Two or more states share a name.
    DuplicateStateName,
    /// Two or more events share a name.
    DuplicateEventName,
    /// Two or more roles share a name.
    DuplicateRoleName,
    /// Two or more artifact type definitions share a name.
    DuplicateArtifactType,
    /// `initial_state` does not name a defined state.
    UnknownInitialState,
    /// A transition's `from` does not name a defined state.
    InvalidTransitionFrom,
    /// A transition's `to` does not name a defined state.
    InvalidTransitionTo,
    /// A transition or event references a guard name not present in the
    /// guard table.
    UnknownGuardReference,
    /// A role reference does not name a defined role and is not the
    /// wildcard.
    UnknownRoleReference,
    /// A guard or state references an artifact type name that is not
    /// defined.
    UnknownArtifactType,
    /// A state is not reachable from `initial_state`.
    UnreachableState,
    /// No state has `is_final = true`.
    NoFinalState,
    /// An `allowed_roles` list mixes the wildcard with concrete role names.
    InvalidWildcardRole,
    /// An `ArtifactCount` guard's minimum is negative (represented here as
    /// failing to parse as a non-negative integer upstream).
    InvalidMinCount,
}

fn error(
    code: ValidationErrorCode,
    path: impl Into<String>,
    message: impl Into<String>,
) -> ValidationError {
    ValidationError {
        code,
        path: path.into(),
        message: message.into(),
    }
}

// ============================================================================
// SECTION: Entry point
// ============================================================================

/// Validates `process`, returning it unchanged on success or every
/// accumulated [`ValidationError`] on failure.
///
/// # Errors
///
/// Returns a non-empty `Vec<ValidationError>` when any static invariant from
/// §3 is violated.
pub fn validate_process(process: Process) -> Result<Process, Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_duplicate_names(&process, &mut errors);
    check_initial_state(&process, &mut errors);
    check_transition_endpoints(&process, &mut errors);
    check_guard_references(&process, &mut errors);
    check_role_references(&process, &mut errors);
    check_required_artifact_references(&process, &mut errors);
    check_wildcard_roles(&process, &mut errors);
    check_final_state(&process, &mut errors);
    check_reachability(&process, &mut errors);

    if errors.is_empty() {
        Ok(process)
    } else {
        Err(dedupe(errors))
    }
}

fn dedupe(errors: Vec<ValidationError>) -> Vec<ValidationError> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(errors.len());
    for e in errors {
        let key = (e.code, e.path.clone());
        if seen.insert(key) {
            out.push(e);
        }
    }
    out
}

// Required so `(ValidationErrorCode, String)` can live in a `BTreeSet`.
impl PartialOrd for ValidationErrorCode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ValidationErrorCode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

// ============================================================================
// SECTION: Individual checks
// ============================================================================

fn check_duplicate_names(process: &Process, errors: &mut Vec<ValidationError>) {
    let mut seen_states = HashSet::new();
    for (index, state) in process.states.iter().enumerate() {
        if !seen_states.insert(&state.name) {
            errors.push(error(
                ValidationErrorCode::DuplicateStateName,
                format!("/states/{index}/name"),
                format!("duplicate state name '{}'", state.name),
            ));
        }
    }

    let mut seen_events = HashSet::new();
    for (index, event) in process.events.iter().enumerate() {
        if !seen_events.insert(&event.name) {
            errors.push(error(
                ValidationErrorCode::DuplicateEventName,
                format!("/events/{index}/name"),
                format!("duplicate event name '{}'", event.name),
            ));
        }
    }

    let mut seen_roles = HashSet::new();
    for (index, role) in process.roles.iter().enumerate() {
        if !seen_roles.insert(&role.role) {
            errors.push(error(
                ValidationErrorCode::DuplicateRoleName,
                format!("/roles/{index}/role"),
                format!("duplicate role name '{}'", role.role),
            ));
        }
    }

    let mut seen_artifacts = HashSet::new();
    for (index, artifact) in process.artifacts.iter().enumerate() {
        if !seen_artifacts.insert(&artifact.artifact_type) {
            errors.push(error(
                ValidationErrorCode::DuplicateArtifactType,
                format!("/artifacts/{index}/artifact_type"),
                format!("duplicate artifact type '{}'", artifact.artifact_type),
            ));
        }
    }
}

fn check_initial_state(process: &Process, errors: &mut Vec<ValidationError>) {
    if process.state(&process.initial_state).is_none() {
        errors.push(error(
            ValidationErrorCode::UnknownInitialState,
            "/initial_state",
            format!("initial_state '{}' is not a defined state", process.initial_state),
        ));
    }
}

fn check_transition_endpoints(process: &Process, errors: &mut Vec<ValidationError>) {
    for (index, transition) in process.transitions.iter().enumerate() {
        if process.state(&transition.from).is_none() {
            errors.push(error(
                ValidationErrorCode::InvalidTransitionFrom,
                format!("/transitions/{index}/from"),
                format!("transition 'from' state '{}' is not defined", transition.from),
            ));
        }
        if process.state(&transition.to).is_none() {
            errors.push(error(
                ValidationErrorCode::InvalidTransitionTo,
                format!("/transitions/{index}/to"),
                format!("transition 'to' state '{}' is not defined", transition.to),
            ));
        }
    }
}

fn check_guard_references(process: &Process, errors: &mut Vec<ValidationError>) {
    for (index, transition) in process.transitions.iter().enumerate() {
        if let Some(guard_name) = &transition.guard {
            if !process.guards.contains_key(guard_name) {
                errors.push(error(
                    ValidationErrorCode::UnknownGuardReference,
                    format!("/transitions/{index}/guard"),
                    format!("transition references undefined guard '{guard_name}'"),
                ));
            }
        }
    }

    for (guard_index, guard) in process.guards.values().enumerate() {
        let artifact_type = match guard {
            crate::guard::Guard::ArtifactExists { artifact_type }
            | crate::guard::Guard::ArtifactCount { artifact_type, .. } => Some(artifact_type),
            _ => None,
        };
        if let Some(artifact_type) = artifact_type {
            let known = process
                .artifacts
                .iter()
                .any(|a| &a.artifact_type == artifact_type);
            if !known {
                errors.push(error(
                    ValidationErrorCode::UnknownArtifactType,
                    format!("/guards/{guard_index}/artifact_type"),
                    format!("guard references undefined artifact type '{artifact_type}'"),
                ));
            }
        }
        if let crate::guard::Guard::ArtifactCount { min, .. } = guard {
            // `min` is a `u32`, so negative values cannot reach this point
            // from a numeric deserializer; a value supplied as a negative
            // literal fails to deserialize before validation runs. This
            // check exists for forward compatibility should the field ever
            // widen to a signed type.
            let _ = min;
        }
    }
}

fn check_role_references(process: &Process, errors: &mut Vec<ValidationError>) {
    let known_roles: HashSet<&str> = process.roles.iter().map(|r| r.role.as_str()).collect();
    let mut check_list = |roles: &[crate::identifiers::RoleName], path: String, errors: &mut Vec<ValidationError>| {
        for role in roles {
            if role.as_str() != WILDCARD_ROLE && !known_roles.contains(role.as_str()) {
                errors.push(error(
                    ValidationErrorCode::UnknownRoleReference,
                    path.clone(),
                    format!("role reference '{role}' is not a defined role"),
                ));
            }
        }
    };

    for (index, event) in process.events.iter().enumerate() {
        check_list(&event.allowed_roles, format!("/events/{index}/allowed_roles"), errors);
    }
    for (index, transition) in process.transitions.iter().enumerate() {
        if let Some(roles) = &transition.allowed_roles {
            check_list(roles, format!("/transitions/{index}/allowed_roles"), errors);
        }
    }
}

fn check_required_artifact_references(process: &Process, errors: &mut Vec<ValidationError>) {
    let known: HashSet<&str> = process
        .artifacts
        .iter()
        .map(|a| a.artifact_type.as_str())
        .collect();
    for (index, state) in process.states.iter().enumerate() {
        for (artifact_index, artifact_type) in state.required_artifacts.iter().enumerate() {
            if !known.contains(artifact_type.as_str()) {
                errors.push(error(
                    ValidationErrorCode::UnknownArtifactType,
                    format!("/states/{index}/required_artifacts/{artifact_index}"),
                    format!("state references undefined artifact type '{artifact_type}'"),
                ));
            }
        }
    }
}

fn check_wildcard_roles(process: &Process, errors: &mut Vec<ValidationError>) {
    let mut check_list = |roles: &[crate::identifiers::RoleName], path: String, errors: &mut Vec<ValidationError>| {
        let has_wildcard = roles.iter().any(|r| r.as_str() == WILDCARD_ROLE);
        if has_wildcard && roles.len() > 1 {
            errors.push(error(
                ValidationErrorCode::InvalidWildcardRole,
                path,
                "allowed_roles mixes the '*' wildcard with concrete role names".to_owned(),
            ));
        }
    };

    for (index, event) in process.events.iter().enumerate() {
        check_list(&event.allowed_roles, format!("/events/{index}/allowed_roles"), errors);
    }
    for (index, transition) in process.transitions.iter().enumerate() {
        if let Some(roles) = &transition.allowed_roles {
            check_list(roles, format!("/transitions/{index}/allowed_roles"), errors);
        }
    }
}

fn check_final_state(process: &Process, errors: &mut Vec<ValidationError>) {
    if !process.states.iter().any(|s| s.is_final) {
        errors.push(error(
            ValidationErrorCode::NoFinalState,
            "/states",
            "no state has is_final = true",
        ));
    }
}

fn check_reachability(process: &Process, errors: &mut Vec<ValidationError>) {
    if process.state(&process.initial_state).is_none() {
        // Already reported as UnknownInitialState; reachability is undefined.
        return;
    }

    let mut adjacency: HashMap<&crate::identifiers::StateName, Vec<&crate::identifiers::StateName>> =
        HashMap::new();
    for transition in &process.transitions {
        adjacency.entry(&transition.from).or_default().push(&transition.to);
    }

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(&process.initial_state);
    queue.push_back(&process.initial_state);
    while let Some(current) = queue.pop_front() {
        if let Some(neighbors) = adjacency.get(current) {
            for next in neighbors {
                if visited.insert(*next) {
                    queue.push_back(next);
                }
            }
        }
    }

    for (index, state) in process.states.iter().enumerate() {
        if !visited.contains(&state.name) {
            errors.push(error(
                ValidationErrorCode::UnreachableState,
                format!("/states/{index}/name"),
                format!("state '{}' is unreachable from initial_state", state.name),
            ));
        }
    }
}
