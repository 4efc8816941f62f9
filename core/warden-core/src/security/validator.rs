//! Command and path validation pipeline.
//!
//! Strictly ordered: normalize (de-obfuscate) → blocked patterns → warning
//! patterns; for paths, canonicalize (collapse `..`, resolve symlinks when
//! the path exists) → guarded-path globs. File guards are evaluated
//! independently of command patterns, so a command verdict never short-
//! circuits path resolution.

use std::path::{Component, Path, PathBuf};

use crate::config::SecurityConfig;
use crate::error::{Result, WardenError};
use crate::security::normalize::normalize_command;
use crate::security::patterns::{
    CommandRule, PathRule, BLOCKED_COMMANDS, GUARDED_PATHS, WARNING_COMMANDS,
};
use crate::security::redact::redact;

/// Validation verdict. Ephemeral; returned synchronously and never
/// persisted. `Ask` and `Deny` carry the matched rule name for audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Ask { rule: String },
    Deny { rule: String },
}

impl Verdict {
    pub fn is_deny(&self) -> bool {
        matches!(self, Verdict::Deny { .. })
    }

    /// Combines two stage verdicts: deny from either is final, then ask,
    /// then allow.
    pub fn combine(self, other: Verdict) -> Verdict {
        match (self, other) {
            (deny @ Verdict::Deny { .. }, _) => deny,
            (_, deny @ Verdict::Deny { .. }) => deny,
            (ask @ Verdict::Ask { .. }, _) => ask,
            (_, ask @ Verdict::Ask { .. }) => ask,
            _ => Verdict::Allow,
        }
    }
}

/// Pure validation pipeline. Holds the compiled rule sets (built-ins plus
/// config-supplied extras) and no session state.
pub struct SecurityValidator {
    extra_blocked: Vec<CommandRule>,
    extra_warning: Vec<CommandRule>,
    extra_guarded: Vec<PathRule>,
    obfuscation_detection: bool,
}

impl SecurityValidator {
    /// Builds a validator from config. Config-supplied patterns are
    /// compiled here; an invalid pattern is a configuration error, not
    /// something to silently skip.
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        let compile = |prefix: &str, patterns: &[String]| -> Result<Vec<CommandRule>> {
            patterns
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let regex = regex::Regex::new(p).map_err(|e| WardenError::InvalidPattern {
                        pattern: p.clone(),
                        details: e.to_string(),
                    })?;
                    Ok(CommandRule {
                        name: format!("{prefix}-{i}"),
                        regex,
                    })
                })
                .collect()
        };

        let extra_guarded = config
            .blocked_files
            .iter()
            .enumerate()
            .map(|(i, g)| {
                let pattern = glob::Pattern::new(g).map_err(|e| WardenError::InvalidPattern {
                    pattern: g.clone(),
                    details: e.to_string(),
                })?;
                Ok(PathRule {
                    name: format!("config-file-{i}"),
                    pattern,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SecurityValidator {
            extra_blocked: compile("config-blocked", &config.blocked_patterns)?,
            extra_warning: compile("config-warning", &config.warning_patterns)?,
            extra_guarded,
            obfuscation_detection: config.obfuscation_detection,
        })
    }

    /// Validates a command string. The raw input is decoded to a fixed
    /// point first so encoded variants of blocked commands still match.
    pub fn validate_command(&self, raw: &str) -> Verdict {
        let normalized = if self.obfuscation_detection {
            normalize_command(raw)
        } else {
            raw.to_string()
        };

        if let Some(rule) = first_command_match(&BLOCKED_COMMANDS, &self.extra_blocked, &normalized)
        {
            tracing::info!(rule = %rule, command = %redact(&normalized), "Command blocked");
            return Verdict::Deny { rule };
        }

        if let Some(rule) = first_command_match(&WARNING_COMMANDS, &self.extra_warning, &normalized)
        {
            tracing::debug!(rule = %rule, command = %redact(&normalized), "Command flagged");
            return Verdict::Ask { rule };
        }

        Verdict::Allow
    }

    /// Validates a file path against the guarded-path globs.
    ///
    /// The path is resolved to canonical absolute form before matching so
    /// traversal (`../../secrets/.env`) and symlink indirection cannot
    /// bypass the guards.
    pub fn validate_path(&self, raw_path: &str) -> Verdict {
        let canonical = canonicalize_for_matching(raw_path);
        let file_name = Path::new(&canonical)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let matched = GUARDED_PATHS
            .iter()
            .chain(self.extra_guarded.iter())
            .find(|rule| rule.matches(&canonical, &file_name));

        match matched {
            Some(rule) => {
                tracing::info!(rule = %rule.name, path = %canonical, "Path access blocked");
                Verdict::Deny {
                    rule: rule.name.clone(),
                }
            }
            None => Verdict::Allow,
        }
    }
}

fn first_command_match(
    built_in: &[CommandRule],
    extra: &[CommandRule],
    normalized: &str,
) -> Option<String> {
    built_in
        .iter()
        .chain(extra.iter())
        .find(|rule| rule.regex.is_match(normalized))
        .map(|rule| rule.name.clone())
}

/// Resolves a path to a canonical form suitable for glob matching.
///
/// Lexical collapse of `.` and `..` always happens, so guards apply to
/// paths that do not exist yet. When the path exists on disk, symlinks
/// are additionally resolved via `fs::canonicalize`.
pub fn canonicalize_for_matching(raw_path: &str) -> String {
    let path = Path::new(raw_path);

    if path.exists() {
        if let Ok(resolved) = path.canonicalize() {
            return resolved.to_string_lossy().into_owned();
        }
    }

    lexical_normalize(path).to_string_lossy().into_owned()
}

/// Collapses `.` and `..` components without touching the filesystem.
/// `..` at the start of a relative path is dropped; the traversal target
/// is what matters for guard matching, not where it came from.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    // Above the starting point; nothing left to strip.
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
