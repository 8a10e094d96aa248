// crates/state-gate-mcp/src/main.rs
// ============================================================================
// Module: State Gate MCP Entry Point
// Description: A stdio-framed JSON-RPC transport exposing the six external
//              state-gate operations, plus the hook adapter's decision
//              function, as tool calls (§10.5).
// Purpose: Let an agent-tool protocol client drive a run without linking
//          against state-gate-core directly.
// Dependencies: clap, serde_json, state-gate-core, state-gate-store-fs,
//               tracing, tracing-subscriber.
// ============================================================================

//! ## Overview
//! One JSON-RPC 2.0 request per line of stdin, one response per line of
//! stdout; `tools/list` returns the catalog, `tools/call` dispatches into
//! [`tools::dispatch`]. Logging goes to stderr exclusively so it never
//! interleaves with the JSON-RPC stream on stdout.

mod decision;
mod protocol;
mod tools;

use std::io::BufRead as _;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;
use serde_json::json;
use state_gate_core::config::GateConfig;
use state_gate_core::engine::StateEngine;
use state_gate_core::registry::ProcessRegistry;
use state_gate_store_fs::FsMetadataStore;
use state_gate_store_fs::FsRunLogStore;

use crate::protocol::JsonRpcError;
use crate::protocol::JsonRpcRequest;
use crate::protocol::JsonRpcResponse;
use crate::tools::Engine;

/// Name of the optional `GateConfig` override file under `.state_gate/`,
/// matching `state-gate-cli`'s convention.
const GATE_CONFIG_FILE: &str = "gate.json";

/// Command-line options for the MCP server.
#[derive(Parser, Debug)]
#[command(name = "state-gate-mcp", about = "Serve state-gate operations over stdio JSON-RPC")]
struct Cli {
    /// Gate root directory; state lives under `<root>/.state_gate`.
    #[arg(long, value_name = "DIR", default_value = ".")]
    root: PathBuf,
}

/// Process entry point, returning a process exit code rather than panicking.
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base = cli.root.join(".state_gate");
    let config = load_gate_config(&base);
    let engine = match build_engine(&base, &config) {
        Ok(engine) => engine,
        Err(error) => {
            tracing::error!(base = %base.display(), %error, "failed to prepare gate storage");
            return ExitCode::FAILURE;
        }
    };

    serve(&engine);
    ExitCode::SUCCESS
}

/// Loads `<base>/gate.json` if present and well-formed, else the documented
/// §6 defaults. A malformed override file is logged and ignored rather than
/// aborting the server, since a stdio tool server has no interactive way to
/// surface a startup error to its caller.
fn load_gate_config(base: &Path) -> GateConfig {
    let path = base.join(GATE_CONFIG_FILE);
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return GateConfig::default();
    };
    match serde_json::from_str(&contents) {
        Ok(config) => config,
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "ignoring malformed gate config");
            GateConfig::default()
        }
    }
}

/// Builds the filesystem-backed engine rooted at `base`, per `config`.
///
/// # Errors
///
/// Returns the store's own error message if the run log or metadata store
/// cannot be initialized under `base`.
fn build_engine(base: &Path, config: &GateConfig) -> Result<Engine, String> {
    let lock_policy = config.lock_policy;
    let log_store = FsRunLogStore::new(base.join(&config.runs_dir), lock_policy).map_err(|error| error.to_string())?;
    let metadata_store =
        FsMetadataStore::new(base.join(&config.metadata_dir), lock_policy).map_err(|error| error.to_string())?;
    let registry = ProcessRegistry::new(base.join(&config.processes_dir));
    Ok(StateEngine::new(log_store, metadata_store, registry))
}

/// Reads JSON-RPC requests from stdin until EOF, writing one response per
/// line to stdout. A malformed line or a notification (no `id`) is logged
/// and skipped.
fn serve(engine: &Engine) {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            tracing::error!("stdin read error, stopping");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(engine, &line);
        if let Some(response) = response {
            #[allow(clippy::unwrap_used, reason = "a JsonRpcResponse of JSON values always serializes")]
            let body = serde_json::to_string(&response).unwrap();
            if writeln!(stdout, "{body}").is_err() {
                tracing::error!("stdout write error, stopping");
                break;
            }
            let _ = stdout.flush();
        }
    }
}

/// Parses and dispatches one request line, returning `None` for a
/// notification (which must not receive a reply).
fn handle_line(engine: &Engine, line: &str) -> Option<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(error) => {
            return Some(JsonRpcResponse::failure(
                Value::Null,
                JsonRpcError::new(JsonRpcError::PARSE_ERROR, error.to_string()),
            ));
        }
    };

    let id = request.id.clone();
    let result = handle_request(engine, request);

    let id = id?;
    Some(match result {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(error) => JsonRpcResponse::failure(id, error),
    })
}

/// Routes one parsed request to the matching JSON-RPC method.
fn handle_request(engine: &Engine, request: JsonRpcRequest) -> Result<Value, JsonRpcError> {
    match request.method.as_str() {
        "tools/list" => Ok(json!({ "tools": tools::catalog() })),
        "tools/call" => handle_tools_call(engine, request.params),
        other => Err(JsonRpcError::new(JsonRpcError::METHOD_NOT_FOUND, format!("unknown method '{other}'"))),
    }
}

/// Handles `tools/call`: extracts `name`/`arguments` from `params` and
/// dispatches into [`tools::dispatch`].
fn handle_tools_call(engine: &Engine, params: Option<Value>) -> Result<Value, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::new(JsonRpcError::INVALID_PARAMS, "missing params"))?;
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::new(JsonRpcError::INVALID_PARAMS, "missing params.name"))?;
    let arguments = match params.get("arguments") {
        None | Some(Value::Null) => serde_json::Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(JsonRpcError::new(JsonRpcError::INVALID_PARAMS, "params.arguments must be an object")),
    };

    tools::dispatch(engine, name, &arguments)
        .map(|result| serde_json::to_value(result).unwrap_or(Value::Null))
        .map_err(|error| JsonRpcError::new(JsonRpcError::INVALID_PARAMS, error.to_string()))
}

#[cfg(test)]
mod tests {
    use state_gate_core::config::LockPolicy;
    use state_gate_core::identifiers::ProcessId;
    use state_gate_core::model::EventDefinition;
    use state_gate_core::model::Process;
    use state_gate_core::model::State;
    use state_gate_core::identifiers::EventName;
    use state_gate_core::identifiers::RoleName;
    use state_gate_core::identifiers::StateName;

    use super::*;

    fn policy() -> LockPolicy {
        LockPolicy {
            max_attempts: 50,
            retry_interval_ms: 5,
            stale_timeout_ms: 5_000,
        }
    }

    fn test_engine(root: &std::path::Path) -> Engine {
        let log_store = FsRunLogStore::new(root.join("runs"), policy()).expect("log store");
        let metadata_store = FsMetadataStore::new(root.join("metadata"), policy()).expect("metadata store");
        let registry = ProcessRegistry::new(root.join("processes"));
        let engine = StateEngine::new(log_store, metadata_store, registry);
        engine.registry().install(Process {
            id: ProcessId::from("sample"),
            version: "1".to_owned(),
            initial_state: StateName::from("start"),
            initial_context: serde_json::Map::new(),
            states: vec![State {
                name: StateName::from("start"),
                prompt: None,
                required_artifacts: Vec::new(),
                tool_permissions: Default::default(),
                is_final: true,
            }],
            events: vec![EventDefinition {
                name: EventName::from("noop"),
                payload_shape: None,
                allowed_roles: vec![RoleName::from("agent")],
            }],
            transitions: vec![],
            guards: Default::default(),
            artifacts: vec![],
            roles: vec![],
        });
        engine
    }

    #[test]
    fn tools_list_returns_the_full_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = test_engine(dir.path());
        let line = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let response = handle_line(&engine, line).expect("tools/list always replies");
        assert!(response.error.is_none());
        let tools = response.result.expect("result").get("tools").expect("tools field").as_array().expect("array").len();
        assert_eq!(tools, 7);
    }

    #[test]
    fn tools_call_dispatches_to_the_named_tool() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = test_engine(dir.path());
        let line = r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"create_run","arguments":{"process_id":"sample"}}}"#;
        let response = handle_line(&engine, line).expect("tools/call always replies");
        assert!(response.error.is_none());
    }

    #[test]
    fn unknown_method_is_a_json_rpc_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = test_engine(dir.path());
        let line = r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#;
        let response = handle_line(&engine, line).expect("a request with an id always replies");
        let error = response.error.expect("method not found");
        assert_eq!(error.code, JsonRpcError::METHOD_NOT_FOUND);
    }

    #[test]
    fn a_notification_with_no_id_receives_no_response() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = test_engine(dir.path());
        let line = r#"{"jsonrpc":"2.0","method":"tools/list"}"#;
        assert!(handle_line(&engine, line).is_none());
    }

    #[test]
    fn malformed_json_produces_a_parse_error_with_a_null_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = test_engine(dir.path());
        let response = handle_line(&engine, "{not json}").expect("parse errors always reply");
        assert_eq!(response.error.expect("parse error").code, JsonRpcError::PARSE_ERROR);
        assert_eq!(response.id, Value::Null);
    }
}
