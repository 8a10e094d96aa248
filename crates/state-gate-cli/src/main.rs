// crates/state-gate-cli/src/main.rs
// ============================================================================
// Module: State Gate CLI Entry Point
// Description: Command dispatcher for the six external state-gate operations.
// Purpose: Give an operator or a scripted agent a thin, local front end over
//          the filesystem-backed engine without holding any engine state of
//          its own.
// Dependencies: clap, state-gate-core, state-gate-store-fs, serde_json,
//               thiserror, tracing, tracing-subscriber.
// ============================================================================

//! ## Overview
//! Every subcommand resolves a gate root (`--root`, default `.`), builds a
//! [`StateEngine`] over `<root>/.state_gate`, and prints its result as one
//! line of pretty JSON to stdout. `emit-event` and the read-only commands
//! fall back to the default-run pointer file (§6) when `--run-id` is
//! omitted, so a scripted caller can `create-run --set-default` once and
//! then address "the current run" implicitly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use state_gate_core::config::DEFAULT_RUN_POINTER_FILE;
use state_gate_core::config::DefaultRunPointer;
use state_gate_core::config::GateConfig;
use state_gate_core::engine::EngineError;
use state_gate_core::engine::StateEngine;
use state_gate_core::identifiers::EventName;
use state_gate_core::identifiers::ProcessId;
use state_gate_core::identifiers::RoleName;
use state_gate_core::identifiers::RunId;
use state_gate_core::registry::ProcessRegistry;
use state_gate_store_fs::FsMetadataStore;
use state_gate_store_fs::FsRunLogStore;
use thiserror::Error;

/// The concrete, filesystem-backed engine every CLI command operates on.
type Engine = StateEngine<FsRunLogStore, FsMetadataStore>;

/// Name of the optional `GateConfig` override file under `.state_gate/`.
///
/// Distinct from [`DEFAULT_RUN_POINTER_FILE`], which holds the default-run
/// pointer rather than layout/lock-policy settings.
const GATE_CONFIG_FILE: &str = "gate.json";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "state-gate", about = "Operate state-gate runs from the command line")]
struct Cli {
    /// Gate root directory; state lives under `<root>/.state_gate`.
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    root: PathBuf,
    /// Selected subcommand.
    #[command(subcommand)]
    command: Commands,
}

/// The six external operations of §6, one subcommand each.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new run of a process.
    CreateRun(CreateRunArgs),
    /// Emit an event against a run.
    EmitEvent(EmitEventArgs),
    /// Project a run's current state.
    GetState(RunSelectorArgs),
    /// List a run's currently fireable (and optionally blocked) events.
    ListEvents(ListEventsArgs),
    /// List every run known to the gate.
    ListRuns,
    /// Print a run's full, ordered event history.
    History(RunSelectorArgs),
}

/// Arguments shared by every command that targets one existing run.
#[derive(Args, Debug, Clone)]
struct RunSelectorArgs {
    /// Run id to operate on; defaults to the default-run pointer.
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,
}

/// Arguments for `create-run`.
#[derive(Args, Debug)]
struct CreateRunArgs {
    /// Identifier of the process to instantiate.
    #[arg(long, value_name = "PROCESS_ID")]
    process: String,
    /// Path to a JSON object merged over the process's initial context.
    #[arg(long, value_name = "PATH")]
    context_file: Option<PathBuf>,
    /// Write the new run (and `--role`, if given) to the default-run pointer.
    #[arg(long, action = ArgAction::SetTrue)]
    set_default: bool,
    /// Role recorded alongside the run id when `--set-default` is given.
    #[arg(long, value_name = "ROLE")]
    role: Option<String>,
}

/// Arguments for `emit-event`.
#[derive(Args, Debug)]
struct EmitEventArgs {
    /// Run id to operate on; defaults to the default-run pointer.
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,
    /// Name of the event to emit.
    #[arg(long, value_name = "EVENT")]
    event: String,
    /// The caller's expected current revision.
    #[arg(long, value_name = "REVISION")]
    expected_revision: u64,
    /// A caller-supplied idempotency key.
    #[arg(long, value_name = "KEY")]
    idempotency_key: String,
    /// Role presented by the caller; defaults to the default-run pointer's
    /// role.
    #[arg(long, value_name = "ROLE")]
    role: Option<String>,
    /// Path to a JSON object merged into the run's context on success.
    #[arg(long, value_name = "PATH")]
    payload_file: Option<PathBuf>,
    /// An artifact path to attach to this event; repeatable.
    #[arg(long = "artifact", value_name = "PATH", action = ArgAction::Append)]
    artifacts: Vec<String>,
}

/// Arguments for `list-events`.
#[derive(Args, Debug)]
struct ListEventsArgs {
    /// Run id to operate on; defaults to the default-run pointer.
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,
    /// Also report events that are defined but currently blocked.
    #[arg(long, action = ArgAction::SetTrue)]
    include_blocked: bool,
}

// ============================================================================
// SECTION: CLI error type
// ============================================================================

/// The CLI's own error type, wrapping every failure mode a subcommand can
/// hit before or after calling the engine.
#[derive(Debug, Error)]
enum CliError {
    /// The engine rejected the operation.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// A run id or role supplied on the command line was malformed.
    #[error("{0}")]
    InvalidInput(String),
    /// No `--run-id`/`--role` was given and no default-run pointer exists.
    #[error("no --run-id given and no default run is set; run `create-run --set-default` first")]
    NoDefaultRun,
    /// Reading or writing a file under the gate root failed.
    #[error("{path}: {source}")]
    Io {
        /// The file that could not be read or written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A JSON file did not parse.
    #[error("{path}: {source}")]
    Json {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// A storage backend failed to initialize under the gate root.
    #[error("failed to prepare gate storage: {0}")]
    StoreInit(String),
}

/// Result alias for every fallible CLI-level operation.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry point
// ============================================================================

/// CLI entry point, returning a process exit code rather than panicking.
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let body = serde_json::json!({ "error": err.to_string() });
            #[allow(clippy::unwrap_used, reason = "serializing a two-field object of strings cannot fail")]
            let line = serde_json::to_string(&body).unwrap();
            let _ = writeln!(std::io::stderr(), "{line}");
            ExitCode::FAILURE
        }
    }
}

/// Parses arguments, wires the engine, and dispatches the selected subcommand.
fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let base = cli.root.join(".state_gate");
    let config = load_gate_config(&base)?;
    let engine = build_engine(&base, &config)?;
    match cli.command {
        Commands::CreateRun(args) => command_create_run(&engine, &base, args),
        Commands::EmitEvent(args) => command_emit_event(&engine, &base, args),
        Commands::GetState(args) => command_get_state(&engine, &base, args),
        Commands::ListEvents(args) => command_list_events(&engine, &base, args),
        Commands::ListRuns => command_list_runs(&engine),
        Commands::History(args) => command_history(&engine, &base, args),
    }
}

// ============================================================================
// SECTION: Engine and config wiring
// ============================================================================

/// Loads `<base>/gate.json` if present, else the documented §6 defaults.
fn load_gate_config(base: &Path) -> CliResult<GateConfig> {
    let path = base.join(GATE_CONFIG_FILE);
    if !path.is_file() {
        return Ok(GateConfig::default());
    }
    let contents = fs::read_to_string(&path).map_err(|source| CliError::Io { path: path.clone(), source })?;
    serde_json::from_str(&contents).map_err(|source| CliError::Json { path, source })
}

/// Builds the filesystem-backed engine rooted at `base`, per `config`.
fn build_engine(base: &Path, config: &GateConfig) -> CliResult<Engine> {
    let lock_policy = config.lock_policy;
    let log_store = FsRunLogStore::new(base.join(&config.runs_dir), lock_policy)
        .map_err(|err| CliError::StoreInit(err.to_string()))?;
    let metadata_store = FsMetadataStore::new(base.join(&config.metadata_dir), lock_policy)
        .map_err(|err| CliError::StoreInit(err.to_string()))?;
    let registry = ProcessRegistry::new(base.join(&config.processes_dir));
    Ok(StateEngine::new(log_store, metadata_store, registry))
}

// ============================================================================
// SECTION: Default-run pointer
// ============================================================================

/// Reads the default-run pointer file, if one exists under `base`.
fn load_default_pointer(base: &Path) -> CliResult<Option<DefaultRunPointer>> {
    let path = base.join(DEFAULT_RUN_POINTER_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&path).map_err(|source| CliError::Io { path: path.clone(), source })?;
    let pointer = serde_json::from_str(&contents).map_err(|source| CliError::Json { path, source })?;
    Ok(Some(pointer))
}

/// Writes `pointer` as the new default-run pointer file under `base`.
fn save_default_pointer(base: &Path, pointer: &DefaultRunPointer) -> CliResult<()> {
    fs::create_dir_all(base).map_err(|source| CliError::Io { path: base.to_path_buf(), source })?;
    let path = base.join(DEFAULT_RUN_POINTER_FILE);
    #[allow(clippy::unwrap_used, reason = "serializing a struct of strings cannot fail")]
    let body = serde_json::to_string_pretty(pointer).unwrap();
    fs::write(&path, body).map_err(|source| CliError::Io { path, source })
}

/// Resolves the run id to operate on: `given` if present, else the default
/// pointer's run id.
fn resolve_run_id(base: &Path, given: Option<&str>) -> CliResult<RunId> {
    if let Some(value) = given {
        return RunId::parse(value).map_err(|err| CliError::InvalidInput(err.to_string()));
    }
    let pointer = load_default_pointer(base)?.ok_or(CliError::NoDefaultRun)?;
    Ok(pointer.run_id)
}

/// Resolves the calling role: `given` if present, else the default
/// pointer's recorded role.
fn resolve_role(base: &Path, given: Option<&str>) -> CliResult<RoleName> {
    if let Some(value) = given {
        return Ok(RoleName::from(value));
    }
    let pointer = load_default_pointer(base)?.ok_or(CliError::NoDefaultRun)?;
    pointer.role.ok_or(CliError::NoDefaultRun)
}

/// Reads and parses `path` as a JSON object, rejecting any other JSON shape.
fn read_json_file(path: &Path) -> CliResult<serde_json::Map<String, serde_json::Value>> {
    let contents = fs::read_to_string(path).map_err(|source| CliError::Io { path: path.to_path_buf(), source })?;
    match serde_json::from_str(&contents) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(CliError::InvalidInput(format!("{}: expected a JSON object", path.display()))),
        Err(source) => Err(CliError::Json { path: path.to_path_buf(), source }),
    }
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Pretty-prints `value` as one JSON document to stdout.
fn print_json(value: &impl serde::Serialize) -> CliResult<()> {
    let body = serde_json::to_string_pretty(value).map_err(|source| CliError::Json {
        path: PathBuf::from("<stdout>"),
        source,
    })?;
    writeln!(std::io::stdout(), "{body}").map_err(|source| CliError::Io { path: PathBuf::from("<stdout>"), source })
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Runs `create-run`: instantiates a process and, with `--set-default`,
/// records it as the default run.
fn command_create_run(engine: &Engine, base: &Path, args: CreateRunArgs) -> CliResult<()> {
    let context = args.context_file.as_deref().map(read_json_file).transpose()?;
    let result = engine.create_run(&ProcessId::from(args.process.as_str()), context)?;

    if args.set_default {
        save_default_pointer(
            base,
            &DefaultRunPointer {
                run_id: result.run_id.clone(),
                role: args.role.map(|r| RoleName::from(r.as_str())),
            },
        )?;
    }

    print_json(&result)
}

/// Runs `emit-event`: resolves the run, role, payload, and artifacts, then
/// fires the event against the engine.
fn command_emit_event(engine: &Engine, base: &Path, args: EmitEventArgs) -> CliResult<()> {
    let run_id = resolve_run_id(base, args.run_id.as_deref())?;
    let role = resolve_role(base, args.role.as_deref())?;
    let payload = args.payload_file.as_deref().map(read_json_file).transpose()?;
    let artifact_paths = (!args.artifacts.is_empty()).then_some(args.artifacts);

    let result = engine.emit_event(
        &run_id,
        &EventName::from(args.event.as_str()),
        args.expected_revision,
        &args.idempotency_key,
        &role,
        payload,
        artifact_paths,
    )?;

    print_json(&result)
}

/// Runs `get-state`: projects a run's current state.
fn command_get_state(engine: &Engine, base: &Path, args: RunSelectorArgs) -> CliResult<()> {
    let run_id = resolve_run_id(base, args.run_id.as_deref())?;
    print_json(&engine.get_state(&run_id)?)
}

/// Runs `list-events`: lists a run's fireable (and optionally blocked) events.
fn command_list_events(engine: &Engine, base: &Path, args: ListEventsArgs) -> CliResult<()> {
    let run_id = resolve_run_id(base, args.run_id.as_deref())?;
    print_json(&engine.list_events(&run_id, args.include_blocked)?)
}

/// Runs `list-runs`: lists every run known to the gate.
fn command_list_runs(engine: &Engine) -> CliResult<()> {
    print_json(&engine.list_runs()?)
}

/// Runs `history`: prints a run's full, ordered event history.
fn command_history(engine: &Engine, base: &Path, args: RunSelectorArgs) -> CliResult<()> {
    let run_id = resolve_run_id(base, args.run_id.as_deref())?;
    print_json(&engine.get_event_history(&run_id)?)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use state_gate_core::identifiers::RunId;

    use super::*;

    #[test]
    fn load_gate_config_falls_back_to_defaults_when_no_override_file_exists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_gate_config(dir.path()).expect("load config");
        assert_eq!(config.runs_dir, GateConfig::default().runs_dir);
    }

    #[test]
    fn load_gate_config_reads_an_override_file_when_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(GATE_CONFIG_FILE), r#"{"runs_dir": "custom-runs"}"#).expect("write override");
        let config = load_gate_config(dir.path()).expect("load config");
        assert_eq!(config.runs_dir, "custom-runs");
    }

    #[test]
    fn build_engine_creates_usable_stores_under_the_base_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = GateConfig::default();
        let engine = build_engine(dir.path(), &config).expect("build engine");
        assert!(engine.list_runs().expect("list runs").is_empty());
    }

    #[test]
    fn default_run_pointer_round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pointer = DefaultRunPointer {
            run_id: RunId::generate(),
            role: Some(RoleName::from("agent")),
        };
        save_default_pointer(dir.path(), &pointer).expect("save pointer");
        let loaded = load_default_pointer(dir.path()).expect("load pointer").expect("pointer present");
        assert_eq!(loaded.run_id, pointer.run_id);
        assert_eq!(loaded.role, pointer.role);
    }

    #[test]
    fn resolve_run_id_prefers_the_explicit_argument_over_the_pointer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let explicit = RunId::generate();
        let resolved = resolve_run_id(dir.path(), Some(explicit.as_str())).expect("resolve");
        assert_eq!(resolved, explicit);
    }

    #[test]
    fn resolve_run_id_fails_with_no_argument_and_no_pointer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = resolve_run_id(dir.path(), None).expect_err("must fail without a default run");
        assert!(matches!(err, CliError::NoDefaultRun));
    }

    #[test]
    fn read_json_file_rejects_non_object_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("payload.json");
        fs::write(&path, "[1, 2, 3]").expect("write payload");
        let err = read_json_file(&path).expect_err("array is not an object");
        assert!(matches!(err, CliError::InvalidInput(_)));
    }

    #[test]
    fn create_run_and_emit_event_flow_through_the_cli_helpers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let processes_dir = dir.path().join("processes");
        fs::create_dir_all(&processes_dir).expect("processes dir");
        fs::write(
            processes_dir.join("simple.yaml"),
            r#"
id: simple
version: "1"
initial_state: start
states:
  - name: start
    is_final: false
  - name: end
    is_final: true
events:
  - name: finish
    allowed_roles: [agent]
transitions:
  - from: start
    event: finish
    to: end
"#,
        )
        .expect("write process");

        let config = GateConfig::default();
        let engine = build_engine(dir.path(), &config).expect("build engine");
        let created = engine.create_run(&ProcessId::from("simple"), None).expect("create run");
        assert_eq!(created.revision, 1);

        let result = engine
            .emit_event(
                &created.run_id,
                &EventName::from("finish"),
                1,
                "k1",
                &RoleName::from("agent"),
                None,
                None,
            )
            .expect("emit finish");
        assert_eq!(result.new_revision, 2);
        assert!(!result.replayed);
    }
}
