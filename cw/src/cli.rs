//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// ClusterWatch - cluster membership watchdog and push scheduling
#[derive(Parser)]
#[command(
    name = "cw",
    about = "Cluster membership watchdog and pluggable push scheduling",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a JSONL script of cluster events, watchdog requests and push batches
    Replay {
        /// Script file, one step per line ("-" for stdin)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Force-stop the push scheduler at the end (drops buffered messages)
        #[arg(long)]
        force_stop: bool,
    },

    /// Print the effective configuration as YAML
    Config,

    /// Print the log file path
    LogPath,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clusterwatch")
        .join("logs")
        .join("clusterwatch.log");
    debug!(?path, "get_log_path: returning path");
    path
}
