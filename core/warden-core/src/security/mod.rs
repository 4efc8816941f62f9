//! Security validation pipeline.
//!
//! A pure pipeline with no session state: commands are de-obfuscated to a
//! fixed point, matched against blocked and warning pattern sets, and paths
//! are canonicalized before guarded-glob evaluation. Verdicts are returned
//! synchronously to the interceptor and never persisted.
//!
//! # Module Structure
//!
//! - [`normalize`]: iterative obfuscation decoding (percent, hex, octal,
//!   quotes, whitespace)
//! - [`patterns`]: built-in blocked/warning/guarded rule tables
//! - [`validator`]: the ordered pipeline and verdict combination
//! - [`redact`]: credential redaction for anything that gets logged

pub mod normalize;
pub mod patterns;
pub mod redact;
pub mod validator;

pub use normalize::normalize_command;
pub use redact::redact;
pub use validator::{canonicalize_for_matching, SecurityValidator, Verdict};
