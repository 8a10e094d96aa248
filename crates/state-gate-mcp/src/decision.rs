// crates/state-gate-mcp/src/decision.rs
// ============================================================================
// Module: Tool-Call Hook Adapter
// Description: Maps a run's current state and a candidate tool name to an
//              allow/deny/ask decision (§9, §10.5).
// Purpose: Give an external tool-runner a single call it can make before
//          letting an agent invoke one of its own tools, without that
//          tool-runner needing to understand process definitions itself.
// Dependencies: state-gate-core
// ============================================================================

//! ## Overview
//! Each [`State`] carries a `tool_permissions` table keyed by tool name. A
//! tool absent from the table is neither explicitly allowed nor denied; this
//! adapter treats that silence as [`ToolDecision::Ask`] rather than
//! defaulting open or closed, since the process author simply never
//! considered the tool.

use serde::Serialize;
use state_gate_core::model::State;
use state_gate_core::model::ToolPermission;

/// The decision returned for one `(state, tool_name)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolDecision {
    /// The tool call may proceed without prompting.
    Allow,
    /// The tool call must be rejected.
    Deny,
    /// The tool call requires interactive confirmation.
    Ask,
}

impl From<ToolPermission> for ToolDecision {
    fn from(permission: ToolPermission) -> Self {
        match permission {
            ToolPermission::Allowed => Self::Allow,
            ToolPermission::Denied => Self::Deny,
            ToolPermission::Ask => Self::Ask,
        }
    }
}

/// Decides whether `tool_name` may be invoked while a run sits in `state`.
///
/// A tool not named in `state.tool_permissions` decides [`ToolDecision::Ask`].
#[must_use]
pub fn decide_tool_call(state: &State, tool_name: &str) -> ToolDecision {
    state
        .tool_permissions
        .get(tool_name)
        .copied()
        .map_or(ToolDecision::Ask, ToolDecision::from)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use state_gate_core::identifiers::StateName;

    use super::*;

    fn state_with(permissions: &[(&str, ToolPermission)]) -> State {
        State {
            name: StateName::from("reviewing"),
            prompt: None,
            required_artifacts: Vec::new(),
            tool_permissions: permissions.iter().map(|(name, perm)| ((*name).to_owned(), *perm)).collect::<BTreeMap<_, _>>(),
            is_final: false,
        }
    }

    #[test]
    fn allowed_tool_decides_allow() {
        let state = state_with(&[("read_file", ToolPermission::Allowed)]);
        assert_eq!(decide_tool_call(&state, "read_file"), ToolDecision::Allow);
    }

    #[test]
    fn denied_tool_decides_deny() {
        let state = state_with(&[("delete_repo", ToolPermission::Denied)]);
        assert_eq!(decide_tool_call(&state, "delete_repo"), ToolDecision::Deny);
    }

    #[test]
    fn ask_tool_decides_ask() {
        let state = state_with(&[("send_email", ToolPermission::Ask)]);
        assert_eq!(decide_tool_call(&state, "send_email"), ToolDecision::Ask);
    }

    #[test]
    fn unlisted_tool_decides_ask() {
        let state = state_with(&[("read_file", ToolPermission::Allowed)]);
        assert_eq!(decide_tool_call(&state, "run_shell"), ToolDecision::Ask);
    }
}
