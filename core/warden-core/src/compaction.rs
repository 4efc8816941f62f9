//! Compaction snapshot and rehydration.
//!
//! A compaction event collapses the host context; the essential subset of
//! session state is serialized to a bounded snapshot beforehand and
//! rehydrated into a fresh `SessionState` on resume.
//!
//! Round-trip law: `rehydrate(snapshot(s))` equals `s` restricted to the
//! preserved fields — todo ids are never regenerated and escalation is
//! never dropped, since an escalated session must not resume as healthy.
//! Malformed or version-incompatible snapshots fail safe to a fresh
//! default state with a logged warning.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recovery::{ErrorCategory, ErrorRecoveryState, RecoveryStatus};
use crate::session::SessionState;
use crate::types::{PhaseTransition, TodoItem, WorkflowPhase};

const SNAPSHOT_VERSION: u32 = 1;

/// Phase-history transitions preserved across compaction. Older entries
/// are dropped; phase history is diagnostic, not load-bearing.
const PHASE_HISTORY_TAIL: usize = 20;

/// The bounded snapshot written at a compaction boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactSnapshot {
    pub version: u32,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub phase: WorkflowPhase,
    #[serde(default)]
    pub phase_history: Vec<PhaseTransition>,
    #[serde(default)]
    pub pending_todos: Vec<TodoItem>,
    #[serde(default)]
    pub strike_count: u32,
    #[serde(default)]
    pub escalated: bool,
    #[serde(default)]
    pub last_error_category: Option<ErrorCategory>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Serializes the essential subset of a session's state.
pub fn snapshot(state: &SessionState) -> CompactSnapshot {
    let tail_start = state.phase_history.len().saturating_sub(PHASE_HISTORY_TAIL);
    CompactSnapshot {
        version: SNAPSHOT_VERSION,
        session_id: state.session_id.clone(),
        created_at: state.created_at,
        phase: state.phase,
        phase_history: state.phase_history[tail_start..].to_vec(),
        pending_todos: state.pending_todos.clone(),
        strike_count: state.error_recovery.strike_count,
        escalated: state.error_recovery.escalated(),
        last_error_category: state.error_recovery.last_error_category,
        metadata: state.metadata.clone(),
    }
}

/// Rebuilds a fresh session state from a snapshot.
///
/// Only the preserved fields carry over; tool history and completed todos
/// start empty. An escalated snapshot resumes in the escalated state —
/// any in-progress recovery streak conservatively restarts.
pub fn rehydrate(snapshot: CompactSnapshot) -> SessionState {
    let mut state = SessionState::new(&snapshot.session_id);
    state.created_at = snapshot.created_at;
    state.phase = snapshot.phase;
    state.phase_history = snapshot.phase_history;
    state.created_todo_count = snapshot.pending_todos.len() as u32;
    state.pending_todos = snapshot.pending_todos;
    state.metadata = snapshot.metadata;
    state.error_recovery = ErrorRecoveryState {
        strike_count: snapshot.strike_count,
        status: if snapshot.escalated {
            RecoveryStatus::Escalated
        } else {
            RecoveryStatus::Normal
        },
        consecutive_successes: 0,
        last_error_category: snapshot.last_error_category,
    };
    state
}

/// Parses and rehydrates a serialized snapshot.
///
/// Fail-safe: malformed JSON or an incompatible version yields a fresh
/// default state for `session_id` with a logged warning, never an error.
pub fn rehydrate_json(session_id: &str, json: &str) -> SessionState {
    match serde_json::from_str::<CompactSnapshot>(json) {
        Ok(snap) if snap.version == SNAPSHOT_VERSION => rehydrate(snap),
        Ok(snap) => {
            tracing::warn!(
                session = %session_id,
                version = snap.version,
                expected = SNAPSHOT_VERSION,
                "Incompatible snapshot version, starting fresh"
            );
            SessionState::new(session_id)
        }
        Err(e) => {
            tracing::warn!(session = %session_id, error = %e, "Malformed snapshot, starting fresh");
            SessionState::new(session_id)
        }
    }
}
