// crates/state-gate-core/src/role.rs
// ============================================================================
// Module: Role Checker
// Description: Role-based permission checks for events and transitions.
// Purpose: Decide whether a caller-presented role may fire an event or take
//          a transition.
// Dependencies: crate::identifiers, crate::model
// ============================================================================

//! ## Overview
//! Roles are trusted input (§1 Non-goals: authentication is out of scope);
//! the checker only evaluates set membership against `allowed_roles` lists,
//! honoring the `*` wildcard.

use crate::identifiers::RoleName;
use crate::identifiers::WILDCARD_ROLE;
use crate::model::EventDefinition;
use crate::model::Transition;

/// The outcome of a role permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCheck {
    /// Whether the role is permitted.
    pub allowed: bool,
    /// A human-readable reason, populated when `allowed` is `false`.
    pub reason: Option<String>,
}

impl RoleCheck {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

fn roles_permit(allowed_roles: &[RoleName], role: &RoleName) -> bool {
    allowed_roles
        .iter()
        .any(|allowed| allowed.as_str() == WILDCARD_ROLE || allowed == role)
}

/// Checks whether `role` may fire `event`.
#[must_use]
pub fn check_event(role: &RoleName, event: &EventDefinition) -> RoleCheck {
    if roles_permit(&event.allowed_roles, role) {
        RoleCheck::allow()
    } else {
        RoleCheck::deny(format!(
            "role '{role}' is not permitted to emit event '{}'",
            event.name
        ))
    }
}

/// Checks whether `role` may take `transition`. A transition with no
/// `allowed_roles` list is unrestricted.
#[must_use]
pub fn check_transition(role: &RoleName, transition: &Transition) -> RoleCheck {
    match &transition.allowed_roles {
        None => RoleCheck::allow(),
        Some(allowed) if roles_permit(allowed, role) => RoleCheck::allow(),
        Some(_) => RoleCheck::deny(format!(
            "role '{role}' is not permitted to take the transition to '{}'",
            transition.to
        )),
    }
}

/// The conjunction of [`check_event`] and [`check_transition`],
/// short-circuiting on the event check.
#[must_use]
pub fn check_full(role: &RoleName, event: &EventDefinition, transition: &Transition) -> RoleCheck {
    let event_check = check_event(role, event);
    if !event_check.allowed {
        return event_check;
    }
    check_transition(role, transition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::EventName;
    use crate::identifiers::StateName;

    fn event(allowed_roles: &[&str]) -> EventDefinition {
        EventDefinition {
            name: EventName::from("go"),
            payload_shape: None,
            allowed_roles: allowed_roles.iter().map(|r| RoleName::from(*r)).collect(),
        }
    }

    fn transition(allowed_roles: Option<&[&str]>) -> Transition {
        Transition {
            from: StateName::from("start"),
            event: EventName::from("go"),
            to: StateName::from("end"),
            guard: None,
            allowed_roles: allowed_roles.map(|rs| rs.iter().map(|r| RoleName::from(*r)).collect()),
        }
    }

    #[test]
    fn wildcard_permits_every_role() {
        let e = event(&["*"]);
        assert!(check_event(&RoleName::from("anyone"), &e).allowed);
    }

    #[test]
    fn concrete_role_list_rejects_unlisted_roles() {
        let e = event(&["agent"]);
        assert!(!check_event(&RoleName::from("reviewer"), &e).allowed);
        assert!(check_event(&RoleName::from("agent"), &e).allowed);
    }

    #[test]
    fn transition_without_allowed_roles_is_unrestricted() {
        let t = transition(None);
        assert!(check_transition(&RoleName::from("anyone"), &t).allowed);
    }

    #[test]
    fn check_full_short_circuits_on_event() {
        let e = event(&["agent"]);
        let t = transition(Some(&["reviewer"]));
        let result = check_full(&RoleName::from("reviewer"), &e, &t);
        assert!(!result.allowed);
        assert!(result.reason.expect("reason").contains("emit event"));
    }
}
