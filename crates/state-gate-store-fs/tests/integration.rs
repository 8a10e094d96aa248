//! Integration coverage that exercises [`FsRunLogStore`] and
//! [`FsMetadataStore`] together, the way `state-gate-core`'s engine actually
//! uses them, rather than each store in isolation.

use state_gate_core::config::LockPolicy;
use state_gate_core::identifiers::ProcessId;
use state_gate_core::identifiers::RunId;
use state_gate_core::interfaces::AppendOutcome;
use state_gate_core::interfaces::MetadataStore;
use state_gate_core::interfaces::RunLogStore;
use state_gate_core::run::RunEntry;
use state_gate_core::run::RunMetadata;
use state_gate_store_fs::FsMetadataStore;
use state_gate_store_fs::FsRunLogStore;

fn policy() -> LockPolicy {
    LockPolicy {
        max_attempts: 50,
        retry_interval_ms: 5,
        stale_timeout_ms: 5_000,
    }
}

fn init_entry(run_id: &RunId) -> RunEntry {
    RunEntry {
        timestamp: "2026-01-01T00:00:00Z".to_owned(),
        state: "start".to_owned(),
        revision: 1,
        event: "__init__".to_owned(),
        idempotency_key: format!("__init__:{run_id}"),
        artifact_paths: Vec::new(),
    }
}

#[test]
fn a_run_can_be_created_advanced_and_its_metadata_kept_in_step() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_store = FsRunLogStore::new(dir.path().join("runs"), policy()).expect("log store");
    let metadata_store =
        FsMetadataStore::new(dir.path().join("metadata"), policy()).expect("metadata store");

    let run_id = RunId::generate();
    log_store.create_run(&run_id, &init_entry(&run_id)).expect("create run");
    metadata_store
        .save(&RunMetadata {
            run_id: run_id.clone(),
            process_id: ProcessId::from("sample"),
            created_at: "2026-01-01T00:00:00Z".to_owned(),
            context: serde_json::Map::new(),
            artifact_base_path: None,
        })
        .expect("save metadata");

    let mut next = init_entry(&run_id);
    next.revision = 2;
    next.event = "advance".to_owned();
    next.state = "end".to_owned();
    next.idempotency_key = "advance-1".to_owned();
    let outcome = log_store
        .append_with_revision_check(&run_id, &next, 1)
        .expect("append");
    assert_eq!(outcome, AppendOutcome::Appended);

    let metadata = metadata_store.load(&run_id).expect("load metadata");
    assert_eq!(metadata.process_id, ProcessId::from("sample"));
    assert_eq!(log_store.get_latest_entry(&run_id).expect("latest").state, "end");

    let run_ids = log_store.list_run_ids().expect("list log run ids");
    assert_eq!(run_ids, vec![run_id.clone()]);
    let metadata_ids = metadata_store.list_all().expect("list metadata run ids");
    assert_eq!(metadata_ids, vec![run_id]);
}

#[test]
fn concurrent_revision_checked_appends_let_exactly_one_writer_win() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runs_dir = dir.path().join("runs");
    let log_store = FsRunLogStore::new(&runs_dir, policy()).expect("log store");
    let run_id = RunId::generate();
    log_store.create_run(&run_id, &init_entry(&run_id)).expect("create run");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let runs_dir = runs_dir.clone();
            let run_id = run_id.clone();
            std::thread::spawn(move || {
                let store = FsRunLogStore::new(&runs_dir, policy()).expect("log store");
                let mut entry = init_entry(&run_id);
                entry.revision = 2;
                entry.event = "advance".to_owned();
                entry.state = "end".to_owned();
                entry.idempotency_key = format!("advance-{i}");
                store.append_with_revision_check(&run_id, &entry, 1)
            })
        })
        .collect();

    let outcomes: Vec<AppendOutcome> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread panicked").expect("append call succeeds"))
        .collect();

    let appended = outcomes.iter().filter(|o| **o == AppendOutcome::Appended).count();
    let conflicts = outcomes
        .iter()
        .filter(|o| matches!(o, AppendOutcome::Conflict { .. }))
        .count();
    assert_eq!(appended, 1, "exactly one concurrent writer should win the revision check");
    assert_eq!(conflicts, 7);

    let entries = log_store.read_entries(&run_id).expect("read entries");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].revision, 2);
}

#[test]
fn deleting_metadata_does_not_touch_the_run_log() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_store = FsRunLogStore::new(dir.path().join("runs"), policy()).expect("log store");
    let metadata_store =
        FsMetadataStore::new(dir.path().join("metadata"), policy()).expect("metadata store");

    let run_id = RunId::generate();
    log_store.create_run(&run_id, &init_entry(&run_id)).expect("create run");
    metadata_store
        .save(&RunMetadata {
            run_id: run_id.clone(),
            process_id: ProcessId::from("sample"),
            created_at: "2026-01-01T00:00:00Z".to_owned(),
            context: serde_json::Map::new(),
            artifact_base_path: None,
        })
        .expect("save metadata");

    metadata_store.delete(&run_id).expect("delete metadata");
    assert!(!metadata_store.exists(&run_id));
    assert!(log_store.exists(&run_id));
}
