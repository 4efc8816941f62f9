//! Error classification and recovery escalation.
//!
//! Classifies tool-execution output and maintains the per-session strike
//! counter. Repeated failures escalate once (idempotent) into a blocking
//! notice; escalation is left through an explicit acknowledgment or a run
//! of consecutive successes, modeled as a three-state machine:
//!
//! ```text
//! Normal ──(strikes ≥ threshold)──► Escalated ──(success)──► Recovering
//!   ▲                                   ▲                        │
//!   │                                   └──────(error)───────────┤
//!   └──(N consecutive successes, or acknowledge from anywhere)───┘
//! ```
//!
//! # Classification channel
//!
//! A present exit code is authoritative (0 → success, non-zero → error)
//! and `timed_out` always classifies as an error: no definitive success
//! signal within the bound is a failure, not unknown-benign. Only when no
//! exit code is available is the combined stdout+stderr text matched, and
//! then against anchored error shapes rather than a bare `error` substring,
//! so benign output echoing the word "error" is not counted as a strike.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ErrorRecoveryConfig;
use crate::types::{Classification, ExecutionOutput};

/// Category of a classified error. Suggestions are keyed by category, not
/// by the raw matched pattern, so every category has guaranteed coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    CommandNotFound,
    FileNotFound,
    PermissionDenied,
    Timeout,
    SyntaxError,
    TestFailure,
    Network,
    Generic,
}

/// Recovery state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    #[default]
    Normal,
    Escalated,
    Recovering,
}

/// Per-session error-recovery substate. Mutated only by
/// [`ErrorRecoveryEngine::record_execution`] and
/// [`ErrorRecoveryEngine::acknowledge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ErrorRecoveryState {
    #[serde(default)]
    pub strike_count: u32,
    #[serde(default)]
    pub status: RecoveryStatus,
    #[serde(default)]
    pub consecutive_successes: u32,
    #[serde(default)]
    pub last_error_category: Option<ErrorCategory>,
}

impl ErrorRecoveryState {
    /// Sticky escalation flag: true until the session is back to Normal.
    pub fn escalated(&self) -> bool {
        !matches!(self.status, RecoveryStatus::Normal)
    }
}

/// Raised exactly once when the strike threshold is crossed. The caller
/// surfaces this as a blocking, human-visible notice.
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationEvent {
    pub strike_count: u32,
    pub suggestion: &'static str,
}

struct ErrorShape {
    category: ErrorCategory,
    regex: Regex,
}

impl ErrorShape {
    fn new(category: ErrorCategory, pattern: &str) -> Self {
        ErrorShape {
            category,
            regex: Regex::new(pattern).expect("invalid error shape pattern"),
        }
    }
}

/// Anchored error shapes, checked in order; first match decides the
/// category. Specific shapes come before the generic ones.
static ERROR_SHAPES: Lazy<Vec<ErrorShape>> = Lazy::new(|| {
    vec![
        ErrorShape::new(
            ErrorCategory::CommandNotFound,
            r"(command not found|not recognized as an internal or external command|No such command)",
        ),
        ErrorShape::new(
            ErrorCategory::FileNotFound,
            r"(\bENOENT\b|No such file or directory)",
        ),
        ErrorShape::new(
            ErrorCategory::PermissionDenied,
            r"(\bEACCES\b|\bEPERM\b|Permission denied|Operation not permitted)",
        ),
        ErrorShape::new(ErrorCategory::Timeout, r"(?i)\btimed?[ -]?out\b"),
        ErrorShape::new(
            ErrorCategory::Network,
            r"(\bECONNREFUSED\b|\bECONNRESET\b|\bETIMEDOUT\b|Connection refused|getaddrinfo .*not known)",
        ),
        ErrorShape::new(
            ErrorCategory::SyntaxError,
            r"(?m)(^\s*SyntaxError\b|syntax error)",
        ),
        ErrorShape::new(
            ErrorCategory::TestFailure,
            r"(?m)(^FAILED\b|^FAIL\b|test result: FAILED|\b\d+ failed\b|\bassertion .*failed\b)",
        ),
        ErrorShape::new(
            ErrorCategory::Generic,
            r"(?m)(^\s*(error|Error|ERROR)(\[\w+\])?:|panicked at|Traceback \(most recent call last\)|^fatal:)",
        ),
    ]
});

/// Classifies a normalized execution output.
///
/// Returns the classification and, for errors, the best-matching category
/// (`Generic` when nothing more specific matches).
pub fn classify(output: &ExecutionOutput) -> (Classification, Option<ErrorCategory>) {
    if output.timed_out {
        return (Classification::Error, Some(ErrorCategory::Timeout));
    }

    let text_category = || {
        let text = output.combined_text();
        ERROR_SHAPES
            .iter()
            .find(|shape| shape.regex.is_match(&text))
            .map(|shape| shape.category)
    };

    match output.exit_code {
        Some(0) => (Classification::Success, None),
        Some(_) => (
            Classification::Error,
            Some(text_category().unwrap_or(ErrorCategory::Generic)),
        ),
        None => match text_category() {
            Some(category) => (Classification::Error, Some(category)),
            None => (Classification::Unknown, None),
        },
    }
}

/// Recovery suggestion for a category. Total over categories; `Generic`
/// is the guaranteed fallback.
pub fn suggestion_for(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::CommandNotFound => {
            "The command does not exist in this environment. Check the spelling or install the tool before retrying."
        }
        ErrorCategory::FileNotFound => {
            "A referenced file or directory is missing. Verify the path exists before retrying."
        }
        ErrorCategory::PermissionDenied => {
            "Access was denied. Check file ownership and permissions instead of retrying as-is."
        }
        ErrorCategory::Timeout => {
            "The execution exceeded its time bound. Narrow the operation or raise the limit deliberately."
        }
        ErrorCategory::SyntaxError => {
            "The input failed to parse. Re-read the exact error location before editing again."
        }
        ErrorCategory::TestFailure => {
            "Tests failed. Read the failing assertions before changing code; do not rerun blindly."
        }
        ErrorCategory::Network => {
            "A network operation failed. Confirm connectivity and the target host before retrying."
        }
        ErrorCategory::Generic => {
            "Repeated failures on this approach. Step back and try a different strategy or ask for guidance."
        }
    }
}

/// The escalation state machine. Holds configuration only; all mutable
/// state lives in the session's [`ErrorRecoveryState`].
pub struct ErrorRecoveryEngine {
    config: ErrorRecoveryConfig,
}

impl ErrorRecoveryEngine {
    pub fn new(config: ErrorRecoveryConfig) -> Self {
        ErrorRecoveryEngine { config }
    }

    /// Records one classified execution against the session's recovery
    /// state. Returns an [`EscalationEvent`] only on the Normal →
    /// Escalated edge; re-entering Escalated from Recovering never
    /// re-fires the side effect.
    pub fn record_execution(
        &self,
        state: &mut ErrorRecoveryState,
        classification: Classification,
        category: Option<ErrorCategory>,
    ) -> Option<EscalationEvent> {
        match classification {
            Classification::Error => {
                state.consecutive_successes = 0;
                state.last_error_category = Some(category.unwrap_or(ErrorCategory::Generic));
                if state.strike_count < self.config.max_strikes {
                    state.strike_count += 1;
                }

                match state.status {
                    RecoveryStatus::Normal => {
                        if state.strike_count >= self.config.escalation_threshold {
                            state.status = RecoveryStatus::Escalated;
                            let category =
                                state.last_error_category.unwrap_or(ErrorCategory::Generic);
                            tracing::warn!(
                                strikes = state.strike_count,
                                ?category,
                                "Escalation threshold reached"
                            );
                            return Some(EscalationEvent {
                                strike_count: state.strike_count,
                                suggestion: suggestion_for(category),
                            });
                        }
                    }
                    RecoveryStatus::Recovering => {
                        // Back to escalated, but the notice already fired.
                        state.status = RecoveryStatus::Escalated;
                    }
                    RecoveryStatus::Escalated => {}
                }
                None
            }
            Classification::Success => {
                match state.status {
                    RecoveryStatus::Normal => {}
                    RecoveryStatus::Escalated | RecoveryStatus::Recovering => {
                        state.status = RecoveryStatus::Recovering;
                        state.consecutive_successes += 1;
                        if state.consecutive_successes
                            >= self.config.required_recovery_successes()
                        {
                            tracing::info!("Session recovered after consecutive successes");
                            self.reset(state);
                        }
                    }
                }
                None
            }
            // Unknown neither counts toward nor breaks a success streak.
            Classification::Unknown => None,
        }
    }

    /// Explicit acknowledgment from the external caller; clears
    /// escalation from any state.
    pub fn acknowledge(&self, state: &mut ErrorRecoveryState) {
        self.reset(state);
    }

    fn reset(&self, state: &mut ErrorRecoveryState) {
        state.status = RecoveryStatus::Normal;
        state.strike_count = 0;
        state.consecutive_successes = 0;
        state.last_error_category = None;
    }
}
