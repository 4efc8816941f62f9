//! Core engine for warden: session orchestration for AI coding agents.
//!
//! The engine is embedded by a host runtime (the `warden-hook` binary in
//! this workspace) and is driven entirely by lifecycle and tool-boundary
//! events. It tracks a workflow phase per session, validates commands and
//! file paths before execution, counts failed executions toward an
//! escalation notice, and checkpoints session state across context
//! compaction.
//!
//! Entry point is [`Interceptor`]; everything else is plumbing it
//! coordinates.

pub mod compaction;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod recovery;
pub mod security;
pub mod session;
pub mod types;
pub mod workflow;

pub use compaction::CompactSnapshot;
pub use config::{load_config, WardenConfig};
pub use error::{Result, WardenError};
pub use interceptor::{AfterOutcome, GateDecision, Interceptor, ToolInput};
pub use recovery::{ErrorCategory, ErrorRecoveryState, RecoveryStatus};
pub use security::{SecurityValidator, Verdict};
pub use session::{SessionState, SessionStore};
pub use types::{Classification, ExecutionOutput, TodoItem, WorkflowPhase};
