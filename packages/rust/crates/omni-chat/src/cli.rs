use std::path::PathBuf;

use clap::{Parser, Subcommand};

use omni_chat::DEFAULT_STDIO_SESSION_ID;

#[derive(Parser)]
#[command(name = "omni-chat")]
#[command(about = "Session-scoped chat gateway: HTTP server or stdio conversation.")]
pub(crate) struct Cli {
    /// Override config directory (settings.yaml lookup).
    #[arg(long, global = true)]
    pub(crate) conf: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run HTTP server (POST /chat). Default bind: 0.0.0.0:8000
    Gateway {
        /// Listen address (e.g. 0.0.0.0:8000)
        #[arg(long)]
        bind: Option<String>,

        /// Per-turn generation timeout in seconds (default: 120)
        #[arg(long)]
        turn_timeout: Option<u64>,

        /// Max concurrent chat turns (omit for no limit)
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Path to the instructions document (default: skills.md)
        #[arg(long)]
        instructions: Option<PathBuf>,
    },
    /// Read lines from stdin, run turn, print reply. Exit on EOF.
    Stdio {
        /// Session ID for conversation (default: default)
        #[arg(long, default_value = DEFAULT_STDIO_SESSION_ID)]
        session_id: String,

        /// Path to the instructions document (default: skills.md)
        #[arg(long)]
        instructions: Option<PathBuf>,
    },
}
