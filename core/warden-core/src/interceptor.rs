//! The tool-execution boundary.
//!
//! `before_execute` gates an action through the security validator and
//! returns a decision before anything runs; `after_execute` classifies the
//! output, updates strikes and phase, and commits the session. Both are
//! synchronous: the caller processes at most one in-flight before/after
//! pair per session at a time, and the exclusive `&mut` access handed out
//! by the store keeps per-session mutation serialized.
//!
//! Execution itself happens outside the core; this module never runs
//! anything.

use chrono::Utc;

use crate::compaction::{self, CompactSnapshot};
use crate::config::{WardenConfig, WorkflowConfig};
use crate::error::{Result, WardenError};
use crate::recovery::{self, suggestion_for, ErrorCategory, ErrorRecoveryEngine};
use crate::security::{SecurityValidator, Verdict};
use crate::session::{SessionState, SessionStore};
use crate::types::{Classification, ExecutionOutput, TodoItem, ToolExecutionRecord, WorkflowPhase};
use crate::workflow::{self, PhaseSignal};

/// The security-relevant fields of a tool invocation, resolved from the
/// tool's input schema by the boundary caller (command string for
/// execution-class tools, path fields for file-class tools).
#[derive(Debug, Clone, Default)]
pub struct ToolInput {
    pub command: Option<String>,
    pub paths: Vec<String>,
}

/// Gate decision for one pending tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// Suspend pending external confirmation. The confirmation UX belongs
    /// to the host; the core only supplies the reason.
    Ask { reason: String },
    /// Abort before execution; surfaced to the user with the matched rule.
    Deny { reason: String },
}

/// What `after_execute` decided, returned for observability.
#[derive(Debug, Clone)]
pub struct AfterOutcome {
    pub classification: Classification,
    pub category: Option<ErrorCategory>,
    pub phase: WorkflowPhase,
    /// Present exactly once per escalation; carries the blocking notice.
    pub escalation: Option<recovery::EscalationEvent>,
}

/// Broad tool class, derived from the tool name. Only used for phase
/// signals; command-bearing tools are further classified by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolClass {
    Read,
    Write,
    Execute,
    Other,
}

fn tool_class(tool_name: &str) -> ToolClass {
    match tool_name {
        "Read" | "Grep" | "Glob" | "LS" | "NotebookRead" | "WebFetch" | "WebSearch" => {
            ToolClass::Read
        }
        "Write" | "Edit" | "MultiEdit" | "NotebookEdit" => ToolClass::Write,
        "Bash" => ToolClass::Execute,
        _ => ToolClass::Other,
    }
}

/// The boundary component. Owns the store, the validator, and the
/// recovery engine; all session mutation funnels through here.
pub struct Interceptor {
    store: SessionStore,
    validator: SecurityValidator,
    recovery: ErrorRecoveryEngine,
    workflow: WorkflowConfig,
}

impl Interceptor {
    pub fn new(config: &WardenConfig, store: SessionStore) -> Result<Self> {
        Ok(Interceptor {
            store,
            validator: SecurityValidator::from_config(&config.security)?,
            recovery: ErrorRecoveryEngine::new(config.error_recovery.clone()),
            workflow: config.workflow.clone(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle events
    // ─────────────────────────────────────────────────────────────────────

    /// Host reported a new session.
    pub fn session_created(&mut self, session_id: &str) -> Result<()> {
        self.store.create(session_id);
        self.store.save()
    }

    /// Host reported session teardown. The record is discarded for good.
    pub fn session_deleted(&mut self, session_id: &str) -> Result<()> {
        self.store.remove(session_id)?;
        self.store.save()
    }

    /// Host reported the session went idle.
    pub fn session_idle(&mut self, session_id: &str) -> Result<()> {
        let tracking = self.workflow.enable_phase_tracking;
        let state = self.store.get_mut(session_id)?;
        guard_compaction(state)?;
        if tracking {
            let next = workflow::next_phase(state.phase, &PhaseSignal::SessionIdle);
            state.set_phase(next);
        }
        state.touch();
        self.store.save()
    }

    /// A new top-level user message. Creates the session when the host
    /// delivers the prompt before the created event.
    pub fn user_prompt(&mut self, session_id: &str) -> Result<()> {
        let tracking = self.workflow.enable_phase_tracking;
        let state = self.store.create(session_id);
        guard_compaction(state)?;
        if tracking {
            let next = workflow::next_phase(state.phase, &PhaseSignal::UserIntent);
            state.set_phase(next);
        }
        state.touch();
        self.store.save()
    }

    /// External acknowledgment of an escalation notice.
    pub fn acknowledge_escalation(&mut self, session_id: &str) -> Result<()> {
        let state = self.store.get_mut(session_id)?;
        self.recovery.acknowledge(&mut state.error_recovery);
        self.store.save()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tool-execution boundary
    // ─────────────────────────────────────────────────────────────────────

    /// Gates a pending tool execution. Must complete before the action is
    /// allowed to run.
    pub fn before_execute(
        &mut self,
        session_id: &str,
        _tool_name: &str,
        input: &ToolInput,
    ) -> Result<GateDecision> {
        let state = self.store.get_mut(session_id)?;
        guard_compaction(state)?;

        let mut verdict = Verdict::Allow;
        if let Some(command) = &input.command {
            verdict = verdict.combine(self.validator.validate_command(command));
        }
        // File guards are evaluated independently of the command verdict.
        for path in &input.paths {
            verdict = verdict.combine(self.validator.validate_path(path));
        }

        let decision = match verdict {
            Verdict::Deny { rule } => GateDecision::Deny {
                reason: format!("Blocked by security rule `{rule}`"),
            },
            Verdict::Ask { rule } => GateDecision::Ask {
                reason: format!("Flagged by security rule `{rule}`; confirmation required"),
            },
            Verdict::Allow => GateDecision::Allow,
        };

        // An escalated session pauses automated action: anything that
        // would be allowed requires intervention instead.
        if state.error_recovery.escalated() {
            if let GateDecision::Allow = decision {
                let category = state
                    .error_recovery
                    .last_error_category
                    .unwrap_or(ErrorCategory::Generic);
                return Ok(GateDecision::Ask {
                    reason: format!(
                        "Session escalated after {} failed executions. {}",
                        state.error_recovery.strike_count,
                        suggestion_for(category)
                    ),
                });
            }
        }

        Ok(decision)
    }

    /// Consumes the outcome of an execution: classification, strike
    /// accounting, phase transition, history append, then commit.
    pub fn after_execute(
        &mut self,
        session_id: &str,
        tool_name: &str,
        input: &ToolInput,
        output: &ExecutionOutput,
    ) -> Result<AfterOutcome> {
        let tracking = self.workflow.enable_phase_tracking;
        let state = self.store.get_mut(session_id)?;
        guard_compaction(state)?;

        let (classification, category) = recovery::classify(output);
        let escalation = self
            .recovery
            .record_execution(&mut state.error_recovery, classification, category);

        if tracking {
            if let Some(signal) = phase_signal(tool_name, input) {
                let next = workflow::next_phase(state.phase, &signal);
                state.set_phase(next);
            }
        }

        state.push_tool_record(ToolExecutionRecord {
            tool_name: tool_name.to_string(),
            at: Utc::now(),
            success: classification == Classification::Success,
            duration_ms: output.duration_ms,
            classification,
        });

        // Terminal rule: verification finished with nothing outstanding
        // returns the session to idle.
        if tracking
            && state.phase == WorkflowPhase::Verification
            && !state.has_pending_todos()
            && classification != Classification::Error
        {
            state.set_phase(WorkflowPhase::Idle);
        }

        state.touch();
        let phase = state.phase;
        self.store.save()?;

        Ok(AfterOutcome {
            classification,
            category,
            phase,
            escalation,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Todos
    // ─────────────────────────────────────────────────────────────────────

    /// Records a new pending todo; returns its stable id.
    pub fn add_todo(&mut self, session_id: &str, description: &str) -> Result<String> {
        let state = self.store.get_mut(session_id)?;
        guard_compaction(state)?;
        let todo = TodoItem::new(description);
        let id = todo.id.clone();
        state.add_todo(todo);
        self.store.save()?;
        Ok(id)
    }

    /// Completion signal for a todo. Unknown ids are ignored (the signal
    /// is detected, not authoritative).
    pub fn complete_todo(&mut self, session_id: &str, todo_id: &str) -> Result<bool> {
        let state = self.store.get_mut(session_id)?;
        guard_compaction(state)?;
        let completed = state.complete_todo(todo_id);
        self.store.save()?;
        Ok(completed)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Compaction checkpoint
    // ─────────────────────────────────────────────────────────────────────

    /// Opens the exclusive compaction window and returns the snapshot.
    /// Until [`Interceptor::compaction_end`], every other operation on
    /// this session fails with `SessionBusy`.
    pub fn compaction_begin(&mut self, session_id: &str) -> Result<CompactSnapshot> {
        let state = self.store.get_mut(session_id)?;
        if state.compacting {
            return Err(WardenError::SessionBusy(session_id.to_string()));
        }
        state.compacting = true;
        Ok(compaction::snapshot(state))
    }

    /// Closes the compaction window. When a serialized snapshot is
    /// supplied, the session is rehydrated from it (fail-safe on
    /// malformed input); otherwise the live state simply resumes.
    pub fn compaction_end(&mut self, session_id: &str, snapshot_json: Option<&str>) -> Result<()> {
        match snapshot_json {
            Some(json) => {
                // Rehydration replaces the record wholesale; the session
                // must still exist (deleted sessions stay deleted).
                if !self.store.contains(session_id) {
                    return Err(WardenError::SessionNotFound(session_id.to_string()));
                }
                self.store.insert(compaction::rehydrate_json(session_id, json));
            }
            None => {
                self.store.get_mut(session_id)?.compacting = false;
            }
        }
        self.store.save()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Read-only views
    // ─────────────────────────────────────────────────────────────────────

    pub fn session(&self, session_id: &str) -> Result<&SessionState> {
        self.store.get(session_id)
    }

    /// Phase-appropriate guidance for the session, for system-prompt
    /// composition.
    pub fn guidance(&self, session_id: &str) -> Result<&'static str> {
        Ok(workflow::guidance_for(self.store.get(session_id)?.phase))
    }
}

fn guard_compaction(state: &SessionState) -> Result<()> {
    if state.compacting {
        return Err(WardenError::SessionBusy(state.session_id.clone()));
    }
    Ok(())
}

/// Derives the phase signal for a completed tool call. Execution-class
/// tools are classified by command content, not tool identity.
fn phase_signal(tool_name: &str, input: &ToolInput) -> Option<PhaseSignal> {
    match tool_class(tool_name) {
        ToolClass::Read => Some(PhaseSignal::ReadTool),
        ToolClass::Write => Some(PhaseSignal::WriteTool),
        ToolClass::Execute => input.command.as_ref().map(|command| PhaseSignal::Command {
            command: command.clone(),
        }),
        ToolClass::Other => None,
    }
}
