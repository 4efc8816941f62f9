//! Workflow phase state machine.
//!
//! Maps derived signals to phase transitions. Conservative rules: phases
//! only move forward in the canonical order; the single reset signal is a
//! new top-level user intent, and the terminal Verification → Idle step is
//! decided by the interceptor once pending work is drained.
//!
//! # Signal → transition table
//!
//! ```text
//! UserIntent                       → Intent        (reset, from any phase)
//! ReadTool in Intent/Assessment    → Exploration
//! WriteTool                        → Implementation (if forward)
//! Command classified verification  → Verification   (content-based)
//! Command classified implementation→ Implementation (if forward)
//! VerificationRun (explicit)       → Verification   (overrides heuristic)
//! SessionIdle                      → Idle
//! anything else                    → no change
//! ```
//!
//! Command classification inspects the command text, never the tool name:
//! the same execution primitive serves both implementation-support and
//! verification actions, so tool identity alone cannot disambiguate.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::WorkflowPhase;

/// A derived event the phase machine consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseSignal {
    /// First message of a session or a new top-level user intent.
    UserIntent,
    /// A read/search-class tool call (file read, grep, glob).
    ReadTool,
    /// A write/edit-class tool call.
    WriteTool,
    /// An execution-class tool call; intent is classified from content.
    Command { command: String },
    /// A dedicated verification action. Always wins over the heuristic.
    VerificationRun,
    /// Host-reported idle.
    SessionIdle,
}

/// Intent classified from command content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandIntent {
    Verification,
    Implementation,
    Neutral,
}

static VERIFICATION_COMMANDS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bcargo\s+(test|check|clippy|build|bench)\b",
        r"\b(npm|pnpm|yarn|bun)\s+(run\s+)?(test|build|lint|typecheck|check)\b",
        r"\b(pytest|jest|vitest|mocha|rspec|tox|phpunit)\b",
        r"\bgo\s+(test|build|vet)\b",
        r"\bmake\s+(test|check|build|lint)\b",
        r"\b(tsc|eslint|ruff|flake8|mypy|golangci-lint)\b",
        r"\bmvn\s+(test|verify|package)\b",
        r"\bgradlew?\s+(test|check|build)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid verification pattern"))
    .collect()
});

static IMPLEMENTATION_COMMANDS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(mkdir|touch|mv|cp|ln|chmod|chown)\b",
        r"\bsed\s+-i\b",
        r"\bgit\s+(add|commit|apply|stash|checkout\s+-b)\b",
        r"\b(npm|pnpm|yarn|pip3?|cargo)\s+(install|add)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid implementation pattern"))
    .collect()
});

/// Classifies an execution-class command by its content.
pub fn classify_command_intent(command: &str) -> CommandIntent {
    if VERIFICATION_COMMANDS.iter().any(|re| re.is_match(command)) {
        return CommandIntent::Verification;
    }
    if IMPLEMENTATION_COMMANDS.iter().any(|re| re.is_match(command)) {
        return CommandIntent::Implementation;
    }
    CommandIntent::Neutral
}

/// Computes the next phase for a (current phase, signal) pair.
///
/// Pure function; the caller records the transition and its timestamp.
pub fn next_phase(current: WorkflowPhase, signal: &PhaseSignal) -> WorkflowPhase {
    match signal {
        PhaseSignal::UserIntent => WorkflowPhase::Intent,
        PhaseSignal::SessionIdle => WorkflowPhase::Idle,
        PhaseSignal::VerificationRun => WorkflowPhase::Verification,
        PhaseSignal::ReadTool => match current {
            WorkflowPhase::Intent | WorkflowPhase::Assessment => WorkflowPhase::Exploration,
            other => other,
        },
        PhaseSignal::WriteTool => forward_only(current, WorkflowPhase::Implementation),
        PhaseSignal::Command { command } => match classify_command_intent(command) {
            CommandIntent::Verification => WorkflowPhase::Verification,
            CommandIntent::Implementation => forward_only(current, WorkflowPhase::Implementation),
            CommandIntent::Neutral => current,
        },
    }
}

/// Adopts `target` only when it moves the phase forward; anything else
/// keeps the current phase (no regressions without an explicit reset).
fn forward_only(current: WorkflowPhase, target: WorkflowPhase) -> WorkflowPhase {
    if target.ordinal() > current.ordinal() {
        target
    } else {
        current
    }
}

/// Phase-appropriate guidance, consumed by the system-prompt composer.
/// Pure function of the phase; non-empty for every variant.
pub fn guidance_for(phase: WorkflowPhase) -> &'static str {
    match phase {
        WorkflowPhase::Idle => {
            "No task in flight. Wait for a user request before taking action."
        }
        WorkflowPhase::Intent => {
            "Understand the request before acting. Restate the goal and identify \
             what must be true when the work is done."
        }
        WorkflowPhase::Assessment => {
            "Judge scope and risk. Decide what needs to be read before anything \
             is changed."
        }
        WorkflowPhase::Exploration => {
            "Read before writing. Locate the relevant code and understand the \
             existing behavior before proposing changes."
        }
        WorkflowPhase::Implementation => {
            "Make the change in small, reviewable steps. Track outstanding work \
             as todos and keep unrelated code untouched."
        }
        WorkflowPhase::Verification => {
            "Prove the change works. Run the relevant tests and builds; do not \
             declare completion on an unverified change."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_intent_resets_from_any_phase() {
        for phase in [
            WorkflowPhase::Idle,
            WorkflowPhase::Exploration,
            WorkflowPhase::Verification,
        ] {
            assert_eq!(next_phase(phase, &PhaseSignal::UserIntent), WorkflowPhase::Intent);
        }
    }

    #[test]
    fn test_read_moves_intent_to_exploration() {
        assert_eq!(
            next_phase(WorkflowPhase::Intent, &PhaseSignal::ReadTool),
            WorkflowPhase::Exploration
        );
        assert_eq!(
            next_phase(WorkflowPhase::Assessment, &PhaseSignal::ReadTool),
            WorkflowPhase::Exploration
        );
    }

    #[test]
    fn test_read_elsewhere_keeps_phase() {
        assert_eq!(
            next_phase(WorkflowPhase::Implementation, &PhaseSignal::ReadTool),
            WorkflowPhase::Implementation
        );
    }

    #[test]
    fn test_write_moves_forward_to_implementation() {
        assert_eq!(
            next_phase(WorkflowPhase::Exploration, &PhaseSignal::WriteTool),
            WorkflowPhase::Implementation
        );
    }

    #[test]
    fn test_write_does_not_regress_from_verification() {
        assert_eq!(
            next_phase(WorkflowPhase::Verification, &PhaseSignal::WriteTool),
            WorkflowPhase::Verification
        );
    }

    #[test]
    fn test_test_command_moves_to_verification() {
        let signal = PhaseSignal::Command {
            command: "cargo test --workspace".to_string(),
        };
        assert_eq!(
            next_phase(WorkflowPhase::Implementation, &signal),
            WorkflowPhase::Verification
        );
    }

    #[test]
    fn test_neutral_command_keeps_phase() {
        let signal = PhaseSignal::Command {
            command: "ls -la".to_string(),
        };
        assert_eq!(
            next_phase(WorkflowPhase::Exploration, &signal),
            WorkflowPhase::Exploration
        );
    }

    #[test]
    fn test_explicit_verification_overrides_heuristic() {
        // Content looks neutral, explicit signal still wins.
        assert_eq!(
            next_phase(WorkflowPhase::Implementation, &PhaseSignal::VerificationRun),
            WorkflowPhase::Verification
        );
    }

    #[test]
    fn test_canonical_progression() {
        // [first user message, read, edit, test run] per the contract.
        let mut phase = WorkflowPhase::Idle;
        let signals = [
            PhaseSignal::UserIntent,
            PhaseSignal::ReadTool,
            PhaseSignal::WriteTool,
            PhaseSignal::Command {
                command: "npm run test".to_string(),
            },
        ];
        let mut seen = vec![phase];
        for signal in &signals {
            phase = next_phase(phase, signal);
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                WorkflowPhase::Idle,
                WorkflowPhase::Intent,
                WorkflowPhase::Exploration,
                WorkflowPhase::Implementation,
                WorkflowPhase::Verification,
            ]
        );
        // No regression anywhere after the reset.
        for pair in seen[1..].windows(2) {
            assert!(pair[1].ordinal() >= pair[0].ordinal());
        }
    }

    #[test]
    fn test_intent_classifier_on_content_not_tool() {
        assert_eq!(
            classify_command_intent("pytest tests/ -x"),
            CommandIntent::Verification
        );
        assert_eq!(
            classify_command_intent("mkdir -p src/components"),
            CommandIntent::Implementation
        );
        assert_eq!(classify_command_intent("echo hello"), CommandIntent::Neutral);
    }

    #[test]
    fn test_build_counts_as_verification() {
        assert_eq!(
            classify_command_intent("cargo build --release"),
            CommandIntent::Verification
        );
    }

    #[test]
    fn test_guidance_nonempty_for_every_phase() {
        for phase in [
            WorkflowPhase::Idle,
            WorkflowPhase::Intent,
            WorkflowPhase::Assessment,
            WorkflowPhase::Exploration,
            WorkflowPhase::Implementation,
            WorkflowPhase::Verification,
        ] {
            assert!(!guidance_for(phase).is_empty());
        }
    }
}
