//! Configuration loading for the warden engine.
//!
//! Config lives at `~/.warden/config.json` and is read-only to the core.
//! Every field has a default; a missing or malformed file yields the
//! default configuration with a logged warning rather than an error.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the path to the warden state directory (~/.warden).
pub fn get_warden_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".warden"))
}

/// Returns the path to the warden configuration file.
pub fn get_config_path() -> Option<PathBuf> {
    get_warden_dir().map(|d| d.join("config.json"))
}

/// Returns the path to the session state file.
pub fn get_sessions_path() -> Option<PathBuf> {
    get_warden_dir().map(|d| d.join("sessions.json"))
}

/// Top-level warden configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub error_recovery: ErrorRecoveryConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// When false, the engine records no phase transitions and sessions
    /// stay in their current phase.
    #[serde(default = "default_true")]
    pub enable_phase_tracking: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        WorkflowConfig {
            enable_phase_tracking: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecoveryConfig {
    /// Hard cap on the strike counter; increments stop here (observability
    /// only, escalation has already fired by then).
    #[serde(default = "default_max_strikes")]
    pub max_strikes: u32,
    /// Consecutive-ish error count at which escalation fires (default 3).
    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold: u32,
    /// Consecutive successes required to leave the recovering state.
    /// Defaults to the escalation threshold.
    #[serde(default)]
    pub recovery_successes: Option<u32>,
}

impl ErrorRecoveryConfig {
    /// Successes required after escalation before the session is
    /// considered healthy again.
    pub fn required_recovery_successes(&self) -> u32 {
        self.recovery_successes.unwrap_or(self.escalation_threshold)
    }
}

impl Default for ErrorRecoveryConfig {
    fn default() -> Self {
        ErrorRecoveryConfig {
            max_strikes: default_max_strikes(),
            escalation_threshold: default_escalation_threshold(),
            recovery_successes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Site-specific blocked command patterns (regex), appended after the
    /// built-in set and evaluated in declaration order.
    #[serde(default)]
    pub blocked_patterns: Vec<String>,
    /// Site-specific warning command patterns (regex).
    #[serde(default)]
    pub warning_patterns: Vec<String>,
    /// Site-specific guarded path globs.
    #[serde(default)]
    pub blocked_files: Vec<String>,
    /// When false, commands are matched as-is without obfuscation decoding.
    #[serde(default = "default_true")]
    pub obfuscation_detection: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            blocked_patterns: Vec::new(),
            warning_patterns: Vec::new(),
            blocked_files: Vec::new(),
            obfuscation_detection: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_strikes() -> u32 {
    10
}

fn default_escalation_threshold() -> u32 {
    3
}

/// Loads configuration from the default location, falling back to
/// defaults when the file is missing or malformed.
pub fn load_config() -> WardenConfig {
    match get_config_path() {
        Some(path) => load_config_from(&path),
        None => WardenConfig::default(),
    }
}

/// Loads configuration from a specific path.
pub fn load_config_from(path: &Path) -> WardenConfig {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return WardenConfig::default(),
    };

    match serde_json::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Malformed config, using defaults");
            WardenConfig::default()
        }
    }
}
