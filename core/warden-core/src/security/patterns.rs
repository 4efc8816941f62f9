//! Built-in security rule tables.
//!
//! Compiled once on first use. Rules are evaluated in declaration order,
//! first match wins within a set; config-supplied rules are appended after
//! the built-ins by the validator. Every rule carries a name so a deny can
//! be surfaced to the user with the matched rule identified.

use glob::Pattern;
use once_cell::sync::Lazy;
use regex::Regex;

/// A named command rule (blocked or warning set).
#[derive(Debug, Clone)]
pub struct CommandRule {
    pub name: String,
    pub regex: Regex,
}

impl CommandRule {
    pub fn new(name: &str, pattern: &str) -> Self {
        CommandRule {
            name: name.to_string(),
            regex: Regex::new(pattern).expect("invalid built-in command pattern"),
        }
    }
}

/// A named guarded-path rule.
///
/// The glob is matched against both the canonicalized path and its final
/// file name, so `.env*` guards `.env.production` at any depth.
#[derive(Debug, Clone)]
pub struct PathRule {
    pub name: String,
    pub pattern: Pattern,
}

impl PathRule {
    pub fn new(name: &str, glob: &str) -> Self {
        PathRule {
            name: name.to_string(),
            pattern: Pattern::new(glob).expect("invalid built-in path glob"),
        }
    }

    pub fn matches(&self, canonical_path: &str, file_name: &str) -> bool {
        self.pattern.matches(canonical_path) || self.pattern.matches(file_name)
    }
}

/// Commands that are never allowed to run. Matched against the
/// normalized (de-obfuscated) command text.
pub static BLOCKED_COMMANDS: Lazy<Vec<CommandRule>> = Lazy::new(|| {
    vec![
        CommandRule::new(
            "recursive-remove-root",
            r"\brm\s+(-\S+\s+)*-[a-zA-Z]*[rR][a-zA-Z]*\s+(-\S+\s+)*(/|~|\$HOME)\s*(\s|$|\*)",
        ),
        CommandRule::new(
            "raw-device-write",
            r"(\bdd\b[^|;&]*\bof=|>\s*)/dev/(sd|hd|nvme|disk|vd)",
        ),
        CommandRule::new("mkfs", r"\bmkfs(\.\w+)?\b"),
        CommandRule::new(
            "fork-bomb",
            r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
        ),
        CommandRule::new("world-writable-root", r"\bchmod\s+(-\w+\s+)*-R\s+777\s+/(\s|$)"),
        CommandRule::new(
            "shell-history-truncate",
            r"(>\s*\S*\.(bash_history|zsh_history)(\s|$)|\bhistory\s+-c\b)",
        ),
    ]
});

/// Commands that require external confirmation before running.
pub static WARNING_COMMANDS: Lazy<Vec<CommandRule>> = Lazy::new(|| {
    vec![
        CommandRule::new("sudo", r"\bsudo\s+"),
        CommandRule::new(
            "download-pipe-shell",
            r"\b(curl|wget)\b[^|;&]*\|\s*(ba|z|da|fi)?sh\b",
        ),
        CommandRule::new("git-force-push", r"\bgit\s+push\b.*\s(--force|-f)\b"),
        CommandRule::new("git-hard-reset", r"\bgit\s+reset\s+--hard\b"),
        CommandRule::new("git-clean-force", r"\bgit\s+clean\s+-\w*f"),
        CommandRule::new("package-publish", r"\b(npm|pnpm|yarn|cargo|gem)\s+publish\b"),
        CommandRule::new(
            "recursive-remove",
            r"\brm\s+(-\S+\s+)*-[a-zA-Z]*[rR][a-zA-Z]*\s+",
        ),
    ]
});

/// Paths whose access is denied regardless of the command verdict.
pub static GUARDED_PATHS: Lazy<Vec<PathRule>> = Lazy::new(|| {
    vec![
        PathRule::new("env-file", ".env*"),
        PathRule::new("pem-key", "*.pem"),
        PathRule::new("key-file", "*.key"),
        PathRule::new("ssh-private-key", "id_rsa*"),
        PathRule::new("ssh-private-key-ed25519", "id_ed25519*"),
        PathRule::new("ssh-dir", "**/.ssh/**"),
        PathRule::new("aws-credentials", "**/.aws/credentials"),
        PathRule::new("secrets-dir", "**/secrets/**"),
        PathRule::new("pkcs12-bundle", "*.p12"),
        PathRule::new("gcp-service-account", "service-account*.json"),
    ]
});
