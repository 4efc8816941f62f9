//! Error types for warden-core operations.
//!
//! Validation and escalation outcomes are returned as values, not errors;
//! `WardenError` covers contract violations and infrastructure failures only.

/// All errors that can occur in warden-core operations.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    // ─────────────────────────────────────────────────────────────────────
    // Session Errors
    // ─────────────────────────────────────────────────────────────────────
    /// Operation against a session id that was never created or has been
    /// deleted. Deleted sessions are permanently discarded; this is a
    /// contract violation by the caller, not a no-op.
    #[error("Unknown session: {0}")]
    SessionNotFound(String),

    /// Operation attempted while the session is inside a compaction
    /// window. Compaction is an exclusive-access checkpoint.
    #[error("Session busy (compaction in progress): {0}")]
    SessionBusy(String),

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid security pattern {pattern:?}: {details}")]
    InvalidPattern { pattern: String, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using WardenError.
pub type Result<T> = std::result::Result<T, WardenError>;
