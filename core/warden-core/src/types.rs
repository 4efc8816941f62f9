//! Core types shared across the warden engine.
//!
//! These are the vocabulary of the orchestration pipeline: workflow phases,
//! todo items, tool execution records, and the normalized execution output
//! shape the host runtime hands to `after_execute`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of the structured workflow a session is in.
///
/// Transitions move forward in the canonical order below; a new top-level
/// user intent resets the session to `Intent`, and finishing verification
/// with no pending todos returns it to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowPhase {
    Idle,
    Intent,
    Assessment,
    Exploration,
    Implementation,
    Verification,
}

impl WorkflowPhase {
    /// Position in the canonical forward order. Used to detect regressions
    /// in phase history, not to drive transitions.
    pub fn ordinal(self) -> u8 {
        match self {
            WorkflowPhase::Idle => 0,
            WorkflowPhase::Intent => 1,
            WorkflowPhase::Assessment => 2,
            WorkflowPhase::Exploration => 3,
            WorkflowPhase::Implementation => 4,
            WorkflowPhase::Verification => 5,
        }
    }
}

impl Default for WorkflowPhase {
    fn default() -> Self {
        WorkflowPhase::Idle
    }
}

/// One recorded phase change, kept in the session's phase history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: WorkflowPhase,
    pub to: WorkflowPhase,
    pub at: DateTime<Utc>,
}

/// A work item tracked during the implementation phase.
///
/// Ids are ulids minted at creation and are stable across compaction
/// round-trips. Items are never deleted except on session teardown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TodoItem {
    pub fn new(description: &str) -> Self {
        TodoItem {
            id: ulid::Ulid::new().to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Outcome of classifying one tool execution's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Success,
    Error,
    Unknown,
}

/// Immutable record of one completed tool execution.
///
/// Appended to the session's bounded tool history; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionRecord {
    pub tool_name: String,
    pub at: DateTime<Utc>,
    pub success: bool,
    pub duration_ms: u64,
    pub classification: Classification,
}

/// Normalized output of a tool execution, provided by the host runtime.
///
/// The host must fill `exit_code` when the underlying primitive exposes
/// one; `timed_out` marks executions that hit the host's time bound and
/// is always classified as an error, never as unknown-benign.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub timed_out: bool,
}

impl ExecutionOutput {
    /// Combined stdout + stderr text, the channel used for pattern-based
    /// classification when no exit code is available.
    pub fn combined_text(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}
