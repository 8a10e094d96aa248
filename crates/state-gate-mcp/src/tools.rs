// crates/state-gate-mcp/src/tools.rs
// ============================================================================
// Module: Tool Catalog and Dispatch
// Description: Exposes the six external operations (§6) plus the hook
//              adapter's decision function as MCP tool calls.
// Purpose: Translate a `tools/call` request's JSON arguments into a
//          `StateEngine` method call and its result back into a tool-call
//          result, without the transport loop needing to know about the
//          engine's API shape.
// Dependencies: serde_json, state-gate-core, state-gate-store-fs
// ============================================================================

//! ## Overview
//! Each tool takes a JSON object of arguments named after the engine
//! method's own parameters (`process_id`, `run_id`, `event_name`, ...). A
//! call that the engine rejects is reported as a successful JSON-RPC
//! response whose result carries `"isError": true`, matching MCP's
//! convention of keeping tool-execution failures out of the JSON-RPC error
//! channel; only malformed requests reach that channel (see `crate::main`).

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use state_gate_core::engine::EngineError;
use state_gate_core::engine::StateEngine;
use state_gate_core::identifiers::EventName;
use state_gate_core::identifiers::ProcessId;
use state_gate_core::identifiers::RoleName;
use state_gate_core::identifiers::RunId;
use state_gate_store_fs::FsMetadataStore;
use state_gate_store_fs::FsRunLogStore;

use crate::decision::decide_tool_call;

/// The concrete engine every tool call dispatches against.
pub type Engine = StateEngine<FsRunLogStore, FsMetadataStore>;

/// One entry of the `tools/list` catalog.
#[derive(Debug, serde::Serialize)]
pub struct ToolDefinition {
    /// The tool's invocation name, passed as `params.name` in `tools/call`.
    pub name: &'static str,
    /// A one-line human-readable description.
    pub description: &'static str,
    /// A minimal JSON Schema for the tool's `arguments` object.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Returns the full catalog, in the order the operations appear in §6.
#[must_use]
pub fn catalog() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "create_run",
            description: "Create a new run of a process.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "process_id": { "type": "string" },
                    "context": { "type": "object" },
                },
                "required": ["process_id"],
            }),
        },
        ToolDefinition {
            name: "emit_event",
            description: "Emit an event against a run, advancing it to the next state.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "run_id": { "type": "string" },
                    "event_name": { "type": "string" },
                    "expected_revision": { "type": "integer" },
                    "idempotency_key": { "type": "string" },
                    "role": { "type": "string" },
                    "payload": { "type": "object" },
                    "artifact_paths": { "type": "array", "items": { "type": "string" } },
                },
                "required": ["run_id", "event_name", "expected_revision", "idempotency_key", "role"],
            }),
        },
        ToolDefinition {
            name: "get_state",
            description: "Project a run's current state.",
            input_schema: json!({
                "type": "object",
                "properties": { "run_id": { "type": "string" } },
                "required": ["run_id"],
            }),
        },
        ToolDefinition {
            name: "list_events",
            description: "List a run's currently fireable events, optionally including blocked ones.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "run_id": { "type": "string" },
                    "include_blocked": { "type": "boolean" },
                },
                "required": ["run_id"],
            }),
        },
        ToolDefinition {
            name: "list_runs",
            description: "List every run known to the gate.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDefinition {
            name: "get_event_history",
            description: "Return a run's full, ordered event history.",
            input_schema: json!({
                "type": "object",
                "properties": { "run_id": { "type": "string" } },
                "required": ["run_id"],
            }),
        },
        ToolDefinition {
            name: "decide_tool_call",
            description: "Decide whether an external tool call is allowed, denied, or needs confirmation in a run's current state.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "run_id": { "type": "string" },
                    "tool_name": { "type": "string" },
                },
                "required": ["run_id", "tool_name"],
            }),
        },
    ]
}

/// The outcome of one `tools/call` invocation, shaped for the MCP
/// `content`/`isError` tool-result convention.
#[derive(Debug, serde::Serialize)]
pub struct CallToolResult {
    /// Always one plain-text content block carrying the JSON-encoded
    /// result or error.
    pub content: Vec<ContentBlock>,
    /// `true` when the tool rejected the call.
    #[serde(rename = "isError")]
    pub is_error: bool,
}

/// One block of a tool-call result's `content` array.
#[derive(Debug, serde::Serialize)]
pub struct ContentBlock {
    /// Always `"text"`; no other content types are produced.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// The JSON-encoded payload, as text.
    pub text: String,
}

impl CallToolResult {
    fn ok(value: &impl serde::Serialize) -> Self {
        Self {
            content: vec![ContentBlock {
                kind: "text",
                text: serde_json::to_string(value).unwrap_or_else(|_| "null".to_owned()),
            }],
            is_error: false,
        }
    }

    fn err(error: &EngineError) -> Self {
        Self {
            content: vec![ContentBlock {
                kind: "text",
                text: serde_json::to_string(error).unwrap_or_else(|_| "null".to_owned()),
            }],
            is_error: true,
        }
    }

    /// Builds the tool-call result for an engine call: `Ok` reports success,
    /// `Err` reports an [`EngineError`] with `isError: true` — never a
    /// [`DispatchError`], which covers only malformed arguments.
    fn from_engine_result<T: serde::Serialize>(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(value) => Self::ok(&value),
            Err(error) => Self::err(&error),
        }
    }
}

/// An error in the shape of `arguments` itself, distinct from an
/// [`EngineError`]: the request never reached the engine.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// `name` does not match any entry in [`catalog`].
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    /// A required argument was missing or had the wrong JSON type.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

/// Dispatches one `tools/call` request to the matching tool.
///
/// # Errors
///
/// Returns [`DispatchError`] when `name` is unrecognized or `arguments` does
/// not match the tool's expected shape. An error the *engine* returns is not
/// a [`DispatchError`]; it is reported inside a successful [`CallToolResult`]
/// with `is_error: true`.
pub fn dispatch(engine: &Engine, name: &str, arguments: &Map<String, Value>) -> Result<CallToolResult, DispatchError> {
    match name {
        "create_run" => create_run(engine, arguments),
        "emit_event" => emit_event(engine, arguments),
        "get_state" => get_state(engine, arguments),
        "list_events" => list_events(engine, arguments),
        "list_runs" => Ok(CallToolResult::from_engine_result(engine.list_runs())),
        "get_event_history" => get_event_history(engine, arguments),
        "decide_tool_call" => decide_tool_call_tool(engine, arguments),
        other => Err(DispatchError::UnknownTool(other.to_owned())),
    }
}

/// Reads `field` from `arguments` as a required string.
fn as_str<'a>(arguments: &'a Map<String, Value>, field: &str) -> Result<&'a str, DispatchError> {
    arguments
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| DispatchError::InvalidArguments(format!("missing or non-string '{field}'")))
}

/// Reads `field` from `arguments` as a required non-negative integer.
fn as_u64(arguments: &Map<String, Value>, field: &str) -> Result<u64, DispatchError> {
    arguments
        .get(field)
        .and_then(Value::as_u64)
        .ok_or_else(|| DispatchError::InvalidArguments(format!("missing or non-integer '{field}'")))
}

/// Reads `field` from `arguments` as an optional JSON object.
fn as_object(arguments: &Map<String, Value>, field: &str) -> Result<Option<Map<String, Value>>, DispatchError> {
    match arguments.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(DispatchError::InvalidArguments(format!("'{field}' must be an object"))),
    }
}

/// Reads `field` from `arguments` as an optional array of strings.
fn as_string_array(arguments: &Map<String, Value>, field: &str) -> Result<Option<Vec<String>>, DispatchError> {
    match arguments.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let strings = items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(ToOwned::to_owned)
                        .ok_or_else(|| DispatchError::InvalidArguments(format!("'{field}' must be an array of strings")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(strings))
        }
        Some(_) => Err(DispatchError::InvalidArguments(format!("'{field}' must be an array"))),
    }
}

/// Parses `raw` as a [`RunId`], rejecting a malformed argument before any
/// engine call is made.
fn parse_run_id(raw: &str) -> Result<RunId, DispatchError> {
    RunId::parse(raw).map_err(|err| DispatchError::InvalidArguments(err.to_string()))
}

/// Handles the `create_run` tool.
fn create_run(engine: &Engine, arguments: &Map<String, Value>) -> Result<CallToolResult, DispatchError> {
    let process_id = ProcessId::from(as_str(arguments, "process_id")?);
    let context = as_object(arguments, "context")?;
    Ok(CallToolResult::from_engine_result(engine.create_run(&process_id, context)))
}

/// Handles the `emit_event` tool.
fn emit_event(engine: &Engine, arguments: &Map<String, Value>) -> Result<CallToolResult, DispatchError> {
    let run_id = parse_run_id(as_str(arguments, "run_id")?)?;
    let event_name = EventName::from(as_str(arguments, "event_name")?);
    let expected_revision = as_u64(arguments, "expected_revision")?;
    let idempotency_key = as_str(arguments, "idempotency_key")?.to_owned();
    let role = RoleName::from(as_str(arguments, "role")?);
    let payload = as_object(arguments, "payload")?;
    let artifact_paths = as_string_array(arguments, "artifact_paths")?;

    let result = engine.emit_event(&run_id, &event_name, expected_revision, &idempotency_key, &role, payload, artifact_paths);
    Ok(CallToolResult::from_engine_result(result))
}

/// Handles the `get_state` tool.
fn get_state(engine: &Engine, arguments: &Map<String, Value>) -> Result<CallToolResult, DispatchError> {
    let run_id = parse_run_id(as_str(arguments, "run_id")?)?;
    Ok(CallToolResult::from_engine_result(engine.get_state(&run_id)))
}

/// Handles the `list_events` tool.
fn list_events(engine: &Engine, arguments: &Map<String, Value>) -> Result<CallToolResult, DispatchError> {
    let run_id = parse_run_id(as_str(arguments, "run_id")?)?;
    let include_blocked = arguments.get("include_blocked").and_then(Value::as_bool).unwrap_or(false);
    Ok(CallToolResult::from_engine_result(engine.list_events(&run_id, include_blocked)))
}

/// Handles the `get_event_history` tool.
fn get_event_history(engine: &Engine, arguments: &Map<String, Value>) -> Result<CallToolResult, DispatchError> {
    let run_id = parse_run_id(as_str(arguments, "run_id")?)?;
    Ok(CallToolResult::from_engine_result(engine.get_event_history(&run_id)))
}

/// Handles the `decide_tool_call` tool: loads the run's current process
/// state and runs it through [`decide_tool_call`].
fn decide_tool_call_tool(engine: &Engine, arguments: &Map<String, Value>) -> Result<CallToolResult, DispatchError> {
    let run_id = parse_run_id(as_str(arguments, "run_id")?)?;
    let tool_name = as_str(arguments, "tool_name")?;

    let outcome = (|| {
        let snapshot = engine.get_state(&run_id)?;
        let process = engine
            .registry()
            .get_or_load(&snapshot.process_id)
            .map_err(|err| EngineError::Internal { reason: err.to_string() })?;
        let state = process
            .state(&snapshot.current_state)
            .ok_or_else(|| EngineError::Internal {
                reason: format!("run is in unknown state '{}'", snapshot.current_state),
            })?;
        Ok(decide_tool_call(state, tool_name))
    })();

    Ok(CallToolResult::from_engine_result(outcome))
}

#[cfg(test)]
mod tests {
    use state_gate_core::config::LockPolicy;
    use state_gate_core::identifiers::ArtifactTypeName;
    use state_gate_core::identifiers::StateName;
    use state_gate_core::model::EventDefinition;
    use state_gate_core::model::Process;
    use state_gate_core::model::State;
    use state_gate_core::model::ToolPermission;
    use state_gate_core::model::Transition;
    use state_gate_core::registry::ProcessRegistry;

    use super::*;

    fn policy() -> LockPolicy {
        LockPolicy {
            max_attempts: 50,
            retry_interval_ms: 5,
            stale_timeout_ms: 5_000,
        }
    }

    fn build_engine(root: &std::path::Path) -> Engine {
        let log_store = FsRunLogStore::new(root.join("runs"), policy()).expect("log store");
        let metadata_store = FsMetadataStore::new(root.join("metadata"), policy()).expect("metadata store");
        let registry = ProcessRegistry::new(root.join("processes"));
        StateEngine::new(log_store, metadata_store, registry)
    }

    fn sample_process() -> Process {
        let mut tool_permissions = std::collections::BTreeMap::new();
        tool_permissions.insert("read_file".to_owned(), ToolPermission::Allowed);
        Process {
            id: ProcessId::from("sample"),
            version: "1".to_owned(),
            initial_state: StateName::from("start"),
            initial_context: Map::new(),
            states: vec![
                State {
                    name: StateName::from("start"),
                    prompt: None,
                    required_artifacts: Vec::<ArtifactTypeName>::new(),
                    tool_permissions,
                    is_final: false,
                },
                State {
                    name: StateName::from("end"),
                    prompt: None,
                    required_artifacts: Vec::new(),
                    tool_permissions: Default::default(),
                    is_final: true,
                },
            ],
            events: vec![EventDefinition {
                name: EventName::from("finish"),
                payload_shape: None,
                allowed_roles: vec![RoleName::from("agent")],
            }],
            transitions: vec![Transition {
                from: StateName::from("start"),
                event: EventName::from("finish"),
                to: StateName::from("end"),
                guard: None,
                allowed_roles: None,
            }],
            guards: Default::default(),
            artifacts: vec![],
            roles: vec![],
        }
    }

    #[test]
    fn catalog_names_match_the_six_operations_plus_the_hook_adapter() {
        let names: Vec<&str> = catalog().iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["create_run", "emit_event", "get_state", "list_events", "list_runs", "get_event_history", "decide_tool_call"]
        );
    }

    #[test]
    fn create_run_dispatch_round_trips_through_json_arguments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = build_engine(dir.path());
        engine.registry().install(sample_process());

        let mut arguments = Map::new();
        arguments.insert("process_id".to_owned(), json!("sample"));
        let result = dispatch(&engine, "create_run", &arguments).expect("dispatch");
        assert!(!result.is_error);
    }

    #[test]
    fn unknown_tool_name_is_a_dispatch_error_not_an_engine_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = build_engine(dir.path());
        let err = dispatch(&engine, "delete_everything", &Map::new()).expect_err("unknown tool");
        assert!(matches!(err, DispatchError::UnknownTool(_)));
    }

    #[test]
    fn missing_required_argument_is_a_dispatch_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = build_engine(dir.path());
        let err = dispatch(&engine, "create_run", &Map::new()).expect_err("missing process_id");
        assert!(matches!(err, DispatchError::InvalidArguments(_)));
    }

    #[test]
    fn decide_tool_call_tool_reports_allow_for_a_listed_tool() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = build_engine(dir.path());
        engine.registry().install(sample_process());
        let created = engine.create_run(&ProcessId::from("sample"), None).expect("create run");

        let mut arguments = Map::new();
        arguments.insert("run_id".to_owned(), json!(created.run_id.as_str()));
        arguments.insert("tool_name".to_owned(), json!("read_file"));
        let result = dispatch(&engine, "decide_tool_call", &arguments).expect("dispatch");
        assert!(!result.is_error);
        assert_eq!(result.content[0].text, "\"allow\"");
    }

    #[test]
    fn an_engine_rejection_is_reported_as_an_error_content_block_not_a_dispatch_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = build_engine(dir.path());

        let mut arguments = Map::new();
        arguments.insert("process_id".to_owned(), json!("no-such-process"));
        let result = dispatch(&engine, "create_run", &arguments).expect("dispatch");
        assert!(result.is_error);
    }
}
