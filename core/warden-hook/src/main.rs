//! warden-hook: CLI hook handler for the warden session engine.
//!
//! Invoked by the agent runtime's hook configuration. The main `handle`
//! subcommand reads one hook event as JSON from stdin, drives the
//! engine, and (for gate decisions) writes the hook response JSON to
//! stdout.
//!
//! ## Subcommands
//!
//! - `handle`: Main hook handler, reads JSON from stdin
//! - `snapshot`: Print a session's compaction snapshot as JSON
//! - `ack`: Acknowledge an escalated session

mod handle;
mod logging;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "warden-hook")]
#[command(about = "Session orchestration engine for agent runtimes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a hook event (reads JSON from stdin)
    Handle,

    /// Print the compaction snapshot for a session
    Snapshot {
        #[arg(long)]
        session_id: String,
    },

    /// Clear an escalation after human review
    Ack {
        #[arg(long)]
        session_id: String,
    },
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Handle => handle::run(),
        Commands::Snapshot { session_id } => handle::print_snapshot(&session_id),
        Commands::Ack { session_id } => handle::acknowledge(&session_id),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "warden-hook failed");
        std::process::exit(1);
    }
}
