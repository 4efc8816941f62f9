//! File-based logging for the hook binary.
//!
//! Hooks run with stdout wired to the host runtime, so logs go to daily
//! rotated files under `~/.warden/logs/` instead. Verbosity is controlled
//! with `WARDEN_LOG` (default `info`).

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use warden_core::config;

/// Initializes the global subscriber. The returned guard must live for
/// the duration of the process so buffered log lines are flushed.
pub fn init() -> Option<WorkerGuard> {
    let log_dir = config::get_warden_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir).ok()?;

    let appender = tracing_appender::rolling::daily(log_dir, "warden-hook.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_env("WARDEN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .init();

    Some(guard)
}
