//! Event handler for agent runtime hooks.
//!
//! Reads one hook event as JSON from stdin and drives the engine.
//!
//! ## Event dispatch
//!
//! ```text
//! SessionStart     → create session (rehydrate from snapshot if present)
//! UserPromptSubmit → intent reset; phase guidance emitted as context
//! PreToolUse       → gate decision (allow/ask/deny) written to stdout
//! PostToolUse      → classify output, update phase/strikes/history
//! PreCompact       → snapshot written to ~/.warden/snapshots/<id>.json
//! Stop             → session idle
//! SessionEnd       → session record removed
//! ```

use std::io::{self, Read};
use std::path::PathBuf;

use fs_err as fs;
use serde::Deserialize;
use serde_json::{json, Value};

use warden_core::compaction;
use warden_core::config::{self, load_config};
use warden_core::interceptor::{GateDecision, Interceptor, ToolInput};
use warden_core::session::SessionStore;
use warden_core::types::ExecutionOutput;

/// The subset of hook-event fields the engine consumes. Unknown fields
/// are ignored for forward compatibility with the host runtime.
#[derive(Debug, Deserialize)]
pub struct HookInput {
    pub session_id: Option<String>,
    pub hook_event_name: Option<String>,
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default)]
    pub tool_response: Value,
}

#[derive(Debug, PartialEq)]
enum HookEvent {
    SessionStart,
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
    PreCompact,
    Stop,
    SessionEnd,
    Unknown(String),
}

impl HookInput {
    fn event(&self) -> Option<HookEvent> {
        let name = self.hook_event_name.as_deref()?;
        Some(match name {
            "SessionStart" => HookEvent::SessionStart,
            "UserPromptSubmit" => HookEvent::UserPromptSubmit,
            "PreToolUse" => HookEvent::PreToolUse,
            "PostToolUse" => HookEvent::PostToolUse,
            "PreCompact" => HookEvent::PreCompact,
            "Stop" => HookEvent::Stop,
            "SessionEnd" => HookEvent::SessionEnd,
            other => HookEvent::Unknown(other.to_string()),
        })
    }
}

pub fn run() -> Result<(), String> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| format!("Failed to read stdin: {}", e))?;

    if input.trim().is_empty() {
        return Ok(());
    }

    let hook_input: HookInput =
        serde_json::from_str(&input).map_err(|e| format!("Failed to parse hook input: {}", e))?;

    let mut out = io::stdout();
    handle_hook_input(&mut build_interceptor()?, hook_input, &mut out)
}

pub fn print_snapshot(session_id: &str) -> Result<(), String> {
    let warden = build_interceptor()?;
    let state = warden
        .session(session_id)
        .map_err(|e| e.to_string())?;
    let snapshot = compaction::snapshot(state);
    let json = serde_json::to_string_pretty(&snapshot).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

pub fn acknowledge(session_id: &str) -> Result<(), String> {
    build_interceptor()?
        .acknowledge_escalation(session_id)
        .map_err(|e| e.to_string())
}

fn build_interceptor() -> Result<Interceptor, String> {
    let store = match config::get_sessions_path() {
        Some(path) => SessionStore::load(&path),
        None => SessionStore::new_in_memory(),
    };
    Interceptor::new(&load_config(), store).map_err(|e| e.to_string())
}

fn handle_hook_input(
    warden: &mut Interceptor,
    hook_input: HookInput,
    out: &mut impl io::Write,
) -> Result<(), String> {
    let event = match hook_input.event() {
        Some(e) => e,
        None => return Ok(()),
    };

    let session_id = match &hook_input.session_id {
        Some(id) => id.clone(),
        None => {
            tracing::debug!(event = ?event, "Skipping event (missing session_id)");
            return Ok(());
        }
    };

    // Only the PreToolUse gate propagates failure to the exit code; a
    // state-tracking failure must not disrupt the host runtime.
    let is_gate = event == HookEvent::PreToolUse;
    let result = dispatch_event(warden, event, &session_id, &hook_input, out);
    if is_gate {
        return result;
    }
    if let Err(e) = result {
        tracing::warn!(session = %session_id, error = %e, "State tracking failed");
    }
    Ok(())
}

fn dispatch_event(
    warden: &mut Interceptor,
    event: HookEvent,
    session_id: &str,
    hook_input: &HookInput,
    out: &mut impl io::Write,
) -> Result<(), String> {
    let session_id = session_id.to_string();
    match event {
        HookEvent::SessionStart => {
            warden.session_created(&session_id).map_err(|e| e.to_string())?;
            if let Some(snapshot_json) = take_snapshot_file(&session_id) {
                warden
                    .compaction_end(&session_id, Some(&snapshot_json))
                    .map_err(|e| e.to_string())?;
            }
            Ok(())
        }

        HookEvent::UserPromptSubmit => {
            warden.user_prompt(&session_id).map_err(|e| e.to_string())?;
            let guidance = warden.guidance(&session_id).map_err(|e| e.to_string())?;
            let response = json!({
                "hookSpecificOutput": {
                    "hookEventName": "UserPromptSubmit",
                    "additionalContext": guidance,
                }
            });
            writeln!(out, "{response}").map_err(|e| e.to_string())
        }

        HookEvent::PreToolUse => {
            // Tool events can arrive before SessionStart; creating the
            // session is idempotent.
            warden.session_created(&session_id).map_err(|e| e.to_string())?;
            let tool_name = hook_input.tool_name.as_deref().unwrap_or_default();
            let tool_input = extract_tool_input(&hook_input.tool_input);
            let decision = warden
                .before_execute(&session_id, tool_name, &tool_input)
                .map_err(|e| e.to_string())?;
            writeln!(out, "{}", decision_response(&decision)).map_err(|e| e.to_string())
        }

        HookEvent::PostToolUse => {
            warden.session_created(&session_id).map_err(|e| e.to_string())?;
            let tool_name = hook_input.tool_name.as_deref().unwrap_or_default();
            let tool_input = extract_tool_input(&hook_input.tool_input);
            let output = extract_execution_output(&hook_input.tool_response);
            let outcome = warden
                .after_execute(&session_id, tool_name, &tool_input, &output)
                .map_err(|e| e.to_string())?;

            if let Some(escalation) = outcome.escalation {
                let notice = format!(
                    "{} consecutive failed executions. {}",
                    escalation.strike_count, escalation.suggestion
                );
                let response = json!({
                    "hookSpecificOutput": {
                        "hookEventName": "PostToolUse",
                        "additionalContext": notice,
                    }
                });
                writeln!(out, "{response}").map_err(|e| e.to_string())?;
            }
            Ok(())
        }

        HookEvent::PreCompact => {
            let snapshot = warden
                .compaction_begin(&session_id)
                .map_err(|e| e.to_string())?;
            let json = serde_json::to_string(&snapshot).map_err(|e| e.to_string())?;
            write_snapshot_file(&session_id, &json)
        }

        HookEvent::Stop => warden.session_idle(&session_id).map_err(|e| e.to_string()),

        HookEvent::SessionEnd => {
            // Deleting an already-unknown session is not worth failing a
            // teardown hook over.
            if let Err(e) = warden.session_deleted(&session_id) {
                tracing::debug!(session = %session_id, error = %e, "SessionEnd for unknown session");
            }
            let _ = remove_snapshot_file(&session_id);
            Ok(())
        }

        HookEvent::Unknown(name) => {
            tracing::debug!(event_name = %name, "Unhandled event");
            Ok(())
        }
    }
}

/// Pulls the security-relevant fields out of a tool's input object. The
/// field names follow the host runtime's tool schemas.
fn extract_tool_input(tool_input: &Value) -> ToolInput {
    let command = tool_input
        .get("command")
        .and_then(Value::as_str)
        .map(str::to_string);

    let paths = ["file_path", "path", "notebook_path"]
        .iter()
        .filter_map(|key| tool_input.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    ToolInput { command, paths }
}

/// Normalizes a tool response into an [`ExecutionOutput`]. Objects map
/// field-by-field (missing fields default); plain-string responses are
/// treated as stdout with no exit code.
fn extract_execution_output(tool_response: &Value) -> ExecutionOutput {
    match tool_response {
        Value::String(s) => ExecutionOutput {
            stdout: s.clone(),
            ..Default::default()
        },
        Value::Object(_) => {
            serde_json::from_value(tool_response.clone()).unwrap_or_default()
        }
        _ => ExecutionOutput::default(),
    }
}

fn decision_response(decision: &GateDecision) -> Value {
    let (permission, reason) = match decision {
        GateDecision::Allow => ("allow", String::new()),
        GateDecision::Ask { reason } => ("ask", reason.clone()),
        GateDecision::Deny { reason } => ("deny", reason.clone()),
    };
    json!({
        "hookSpecificOutput": {
            "hookEventName": "PreToolUse",
            "permissionDecision": permission,
            "permissionDecisionReason": reason,
        }
    })
}

fn snapshot_path(session_id: &str) -> Option<PathBuf> {
    config::get_warden_dir().map(|d| d.join("snapshots").join(format!("{session_id}.json")))
}

fn write_snapshot_file(session_id: &str, json: &str) -> Result<(), String> {
    let path = snapshot_path(session_id).ok_or("Cannot determine home directory")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    fs::write(&path, json).map_err(|e| e.to_string())
}

/// Reads and removes the pending snapshot for a session, if one exists.
fn take_snapshot_file(session_id: &str) -> Option<String> {
    let path = snapshot_path(session_id)?;
    let json = fs::read_to_string(&path).ok()?;
    let _ = remove_snapshot_file(session_id);
    Some(json)
}

fn remove_snapshot_file(session_id: &str) -> Result<(), String> {
    let path = snapshot_path(session_id).ok_or("Cannot determine home directory")?;
    if path.exists() {
        fs::remove_file(&path).map_err(|e| e.to_string())?;
    }
    Ok(())
}
