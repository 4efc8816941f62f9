//! Per-session state record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recovery::ErrorRecoveryState;
use crate::types::{Classification, PhaseTransition, TodoItem, ToolExecutionRecord, WorkflowPhase};

/// Maximum tool-history entries retained per session. Appends beyond the
/// cap drop the oldest record.
pub const TOOL_HISTORY_CAP: usize = 200;

/// The full mutable state of one session.
///
/// Owned exclusively by the `SessionStore`; every other component reaches
/// it through the store's accessor for that session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub phase: WorkflowPhase,
    #[serde(default)]
    pub phase_history: Vec<PhaseTransition>,
    #[serde(default)]
    pub error_recovery: ErrorRecoveryState,
    #[serde(default)]
    pub pending_todos: Vec<TodoItem>,
    #[serde(default)]
    pub completed_todos: Vec<TodoItem>,
    /// Count of todos ever created; `pending + completed` shrinks only on
    /// teardown, this never does.
    #[serde(default)]
    pub created_todo_count: u32,
    #[serde(default)]
    pub tool_history: Vec<ToolExecutionRecord>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Exclusive-access marker for the compaction window. Never persisted.
    #[serde(skip)]
    pub compacting: bool,
}

impl SessionState {
    pub fn new(session_id: &str) -> Self {
        let now = Utc::now();
        SessionState {
            session_id: session_id.to_string(),
            created_at: now,
            last_activity_at: now,
            phase: WorkflowPhase::Idle,
            phase_history: Vec::new(),
            error_recovery: ErrorRecoveryState::default(),
            pending_todos: Vec::new(),
            completed_todos: Vec::new(),
            created_todo_count: 0,
            tool_history: Vec::new(),
            metadata: HashMap::new(),
            compacting: false,
        }
    }

    /// Moves the session to `to`, recording the transition. No-op when the
    /// phase is unchanged.
    pub fn set_phase(&mut self, to: WorkflowPhase) {
        if self.phase == to {
            return;
        }
        self.phase_history.push(PhaseTransition {
            from: self.phase,
            to,
            at: Utc::now(),
        });
        self.phase = to;
    }

    /// Appends an execution record, dropping the oldest beyond the cap.
    pub fn push_tool_record(&mut self, record: ToolExecutionRecord) {
        if self.tool_history.len() >= TOOL_HISTORY_CAP {
            let excess = self.tool_history.len() + 1 - TOOL_HISTORY_CAP;
            self.tool_history.drain(..excess);
        }
        self.tool_history.push(record);
    }

    pub fn add_todo(&mut self, todo: TodoItem) {
        self.created_todo_count += 1;
        self.pending_todos.push(todo);
    }

    /// Marks a pending todo completed. Returns false when the id is not
    /// pending (already completed or never created).
    pub fn complete_todo(&mut self, id: &str) -> bool {
        let Some(pos) = self.pending_todos.iter().position(|t| t.id == id) else {
            return false;
        };
        let mut todo = self.pending_todos.remove(pos);
        todo.completed_at = Some(Utc::now());
        self.completed_todos.push(todo);
        true
    }

    pub fn has_pending_todos(&self) -> bool {
        !self.pending_todos.is_empty()
    }

    /// Classification of the most recent tool execution, if any.
    pub fn last_classification(&self) -> Option<Classification> {
        self.tool_history.last().map(|r| r.classification)
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_phase_records_history() {
        let mut state = SessionState::new("s1");
        state.set_phase(WorkflowPhase::Intent);
        state.set_phase(WorkflowPhase::Exploration);
        assert_eq!(state.phase, WorkflowPhase::Exploration);
        assert_eq!(state.phase_history.len(), 2);
        assert_eq!(state.phase_history[0].from, WorkflowPhase::Idle);
        assert_eq!(state.phase_history[1].to, WorkflowPhase::Exploration);
    }

    #[test]
    fn test_set_phase_same_phase_is_noop() {
        let mut state = SessionState::new("s1");
        state.set_phase(WorkflowPhase::Intent);
        state.set_phase(WorkflowPhase::Intent);
        assert_eq!(state.phase_history.len(), 1);
    }

    #[test]
    fn test_tool_history_is_bounded() {
        let mut state = SessionState::new("s1");
        for i in 0..(TOOL_HISTORY_CAP + 10) {
            state.push_tool_record(ToolExecutionRecord {
                tool_name: format!("tool-{i}"),
                at: Utc::now(),
                success: true,
                duration_ms: 1,
                classification: Classification::Success,
            });
        }
        assert_eq!(state.tool_history.len(), TOOL_HISTORY_CAP);
        // Oldest entries were dropped, newest kept.
        assert_eq!(
            state.tool_history.last().unwrap().tool_name,
            format!("tool-{}", TOOL_HISTORY_CAP + 9)
        );
    }

    #[test]
    fn test_complete_todo_moves_and_stamps() {
        let mut state = SessionState::new("s1");
        let todo = TodoItem::new("write tests");
        let id = todo.id.clone();
        state.add_todo(todo);
        assert!(state.has_pending_todos());

        assert!(state.complete_todo(&id));
        assert!(!state.has_pending_todos());
        assert_eq!(state.completed_todos.len(), 1);
        assert!(state.completed_todos[0].completed_at.is_some());
        // Identity survives the move.
        assert_eq!(state.completed_todos[0].id, id);
    }

    #[test]
    fn test_complete_unknown_todo_returns_false() {
        let mut state = SessionState::new("s1");
        assert!(!state.complete_todo("no-such-id"));
    }
}
