//! Session state ownership.
//!
//! The [`SessionStore`] is the single writer of per-session state; every
//! other component mutates a session only through its accessor. Entries
//! are independent — cross-session work needs no coordination — while
//! per-session mutation is serialized by the exclusive borrow the store
//! hands out.

pub mod store;
pub mod types;

pub use store::SessionStore;
pub use types::{SessionState, TOOL_HISTORY_CAP};
