//! End-to-end flows through the public interceptor API, backed by a real
//! state file.

use warden_core::interceptor::{GateDecision, Interceptor, ToolInput};
use warden_core::session::SessionStore;
use warden_core::types::{ExecutionOutput, WorkflowPhase};
use warden_core::{WardenConfig, WardenError};

fn file_backed(dir: &tempfile::TempDir) -> Interceptor {
    let store = SessionStore::load(&dir.path().join("sessions.json"));
    Interceptor::new(&WardenConfig::default(), store).unwrap()
}

fn bash(command: &str) -> ToolInput {
    ToolInput {
        command: Some(command.to_string()),
        paths: Vec::new(),
    }
}

fn file(path: &str) -> ToolInput {
    ToolInput {
        command: None,
        paths: vec![path.to_string()],
    }
}

fn success() -> ExecutionOutput {
    ExecutionOutput {
        exit_code: Some(0),
        duration_ms: 25,
        ..Default::default()
    }
}

fn failure(stderr: &str) -> ExecutionOutput {
    ExecutionOutput {
        stderr: stderr.to_string(),
        exit_code: Some(1),
        duration_ms: 25,
        ..Default::default()
    }
}

#[test]
fn session_survives_process_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut warden = file_backed(&dir);
        warden.session_created("s1").unwrap();
        warden.user_prompt("s1").unwrap();
        warden
            .after_execute("s1", "Read", &file("src/lib.rs"), &success())
            .unwrap();
    }

    // New process, same state file.
    let warden = file_backed(&dir);
    let state = warden.session("s1").unwrap();
    assert_eq!(state.phase, WorkflowPhase::Exploration);
    assert_eq!(state.tool_history.len(), 1);
}

#[test]
fn blocked_command_never_reaches_execution() {
    let dir = tempfile::tempdir().unwrap();
    let mut warden = file_backed(&dir);
    warden.session_created("s1").unwrap();

    // Plain, encoded, and quote-mangled variants of the same command.
    for command in ["rm -rf /", "rm%20-rf%20/", r#"r"m" -rf /"#] {
        let decision = warden.before_execute("s1", "Bash", &bash(command)).unwrap();
        assert!(
            matches!(decision, GateDecision::Deny { .. }),
            "{command} was not denied"
        );
    }
}

#[test]
fn escalation_pauses_then_recovers_through_successes() {
    let dir = tempfile::tempdir().unwrap();
    let mut warden = file_backed(&dir);
    warden.session_created("s1").unwrap();

    let mut escalations = 0;
    for _ in 0..3 {
        let outcome = warden
            .after_execute("s1", "Bash", &bash("npm test"), &failure("1 failed"))
            .unwrap();
        if outcome.escalation.is_some() {
            escalations += 1;
        }
    }
    assert_eq!(escalations, 1);

    // Paused: benign work needs confirmation.
    assert!(matches!(
        warden.before_execute("s1", "Bash", &bash("ls")).unwrap(),
        GateDecision::Ask { .. }
    ));

    // Three clean executions restore normal operation.
    for _ in 0..3 {
        warden
            .after_execute("s1", "Bash", &bash("npm test"), &success())
            .unwrap();
    }
    assert_eq!(
        warden.before_execute("s1", "Bash", &bash("ls")).unwrap(),
        GateDecision::Allow
    );
    assert!(!warden.session("s1").unwrap().error_recovery.escalated());
}

#[test]
fn compaction_checkpoint_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot_json;
    let todo_id;

    {
        let mut warden = file_backed(&dir);
        warden.session_created("s1").unwrap();
        warden.user_prompt("s1").unwrap();
        todo_id = warden.add_todo("s1", "land the fix").unwrap();
        for _ in 0..3 {
            warden
                .after_execute("s1", "Bash", &bash("make test"), &failure("FAILED"))
                .unwrap();
        }
        let snapshot = warden.compaction_begin("s1").unwrap();
        snapshot_json = serde_json::to_string(&snapshot).unwrap();
    }

    let mut warden = file_backed(&dir);
    warden.compaction_end("s1", Some(&snapshot_json)).unwrap();

    let state = warden.session("s1").unwrap();
    assert_eq!(state.pending_todos.len(), 1);
    assert_eq!(state.pending_todos[0].id, todo_id);
    assert!(state.error_recovery.escalated());

    // Escalation carried over the checkpoint still pauses work.
    assert!(matches!(
        warden.before_execute("s1", "Bash", &bash("ls")).unwrap(),
        GateDecision::Ask { .. }
    ));
}

#[test]
fn operations_during_compaction_window_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut warden = file_backed(&dir);
    warden.session_created("s1").unwrap();
    warden.compaction_begin("s1").unwrap();

    assert!(matches!(
        warden.after_execute("s1", "Bash", &bash("ls"), &success()),
        Err(WardenError::SessionBusy(_))
    ));
    assert!(matches!(
        warden.add_todo("s1", "x"),
        Err(WardenError::SessionBusy(_))
    ));

    warden.compaction_end("s1", None).unwrap();
    assert!(warden.add_todo("s1", "x").is_ok());
}

#[test]
fn deleted_session_stays_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let mut warden = file_backed(&dir);
    warden.session_created("s1").unwrap();
    let snapshot = warden.compaction_begin("s1").unwrap();
    let json = serde_json::to_string(&snapshot).unwrap();
    warden.compaction_end("s1", None).unwrap();
    warden.session_deleted("s1").unwrap();

    // Rehydration cannot resurrect a torn-down session.
    assert!(matches!(
        warden.compaction_end("s1", Some(&json)),
        Err(WardenError::SessionNotFound(_))
    ));
    assert!(matches!(
        warden.session("s1"),
        Err(WardenError::SessionNotFound(_))
    ));
}

#[test]
fn full_task_lifecycle_ends_idle() {
    let dir = tempfile::tempdir().unwrap();
    let mut warden = file_backed(&dir);
    warden.session_created("s1").unwrap();
    warden.user_prompt("s1").unwrap();

    warden
        .after_execute("s1", "Grep", &file("src/"), &success())
        .unwrap();
    warden
        .after_execute("s1", "Edit", &file("src/parser.rs"), &success())
        .unwrap();
    let todo = warden.add_todo("s1", "run the suite").unwrap();
    assert_eq!(
        warden.session("s1").unwrap().phase,
        WorkflowPhase::Implementation
    );

    // Verification with pending work does not terminate the task.
    let outcome = warden
        .after_execute("s1", "Bash", &bash("cargo test"), &success())
        .unwrap();
    assert_eq!(outcome.phase, WorkflowPhase::Verification);

    warden.complete_todo("s1", &todo).unwrap();
    let outcome = warden
        .after_execute("s1", "Bash", &bash("cargo test"), &success())
        .unwrap();
    assert_eq!(outcome.phase, WorkflowPhase::Idle);

    let state = warden.session("s1").unwrap();
    assert_eq!(state.completed_todos.len(), 1);
    assert_eq!(state.created_todo_count, 1);
}

#[test]
fn guarded_paths_deny_across_tools() {
    let dir = tempfile::tempdir().unwrap();
    let mut warden = file_backed(&dir);
    warden.session_created("s1").unwrap();

    for (tool, path) in [
        ("Read", ".env"),
        ("Write", "deploy/.env.production"),
        ("Edit", "../../home/user/.ssh/id_rsa"),
        ("Read", "certs/server.pem"),
    ] {
        let decision = warden.before_execute("s1", tool, &file(path)).unwrap();
        assert!(
            matches!(decision, GateDecision::Deny { .. }),
            "{tool} on {path} was not denied"
        );
    }

    assert_eq!(
        warden
            .before_execute("s1", "Read", &file("src/main.rs"))
            .unwrap(),
        GateDecision::Allow
    );
}
