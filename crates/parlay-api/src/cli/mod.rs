//! CLI command definitions and dispatch for the `parlay` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod keys;

use clap::{Parser, Subcommand};

/// Conversation backend with streaming agent replies.
#[derive(Parser)]
#[command(name = "parlay", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of plain text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value_t = 8600, env = "PARLAY_PORT")]
        port: u16,

        /// Host address to bind.
        #[arg(long, default_value = "127.0.0.1", env = "PARLAY_HOST")]
        host: String,

        /// Export spans to OpenTelemetry (stdout exporter).
        #[arg(long)]
        otel: bool,
    },

    /// Manage API keys.
    Keys {
        #[command(subcommand)]
        action: KeysCommand,
    },
}

#[derive(Subcommand)]
pub enum KeysCommand {
    /// Create a new API key (and its user) and print it once.
    Create {
        /// Display name for the key.
        #[arg(long, default_value = "default")]
        name: String,
    },

    /// List existing API keys (hashes are never shown).
    List,
}
