//! ClusterWatch - membership watchdog and push scheduling
//!
//! CLI entry point for replaying scripted cluster sessions.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};
use eyre::{Context, Result};
use tracing::{debug, info};

use clusterwatch::cli::{Cli, Command, get_log_path};
use clusterwatch::config::Config;
use clusterwatch::replay;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Replay { file, force_stop }) => {
            debug!(?file, force_stop, "main: matched Replay command");
            cmd_replay(&config, &file, force_stop).await
        }
        Some(Command::Config) => {
            debug!("main: matched Config command");
            cmd_config(&config)
        }
        Some(Command::LogPath) => {
            debug!("main: matched LogPath command");
            println!("{}", get_log_path().display());
            Ok(())
        }
        None => {
            debug!("main: no command specified, printing help");
            Cli::command().print_help().context("Failed to print help")?;
            println!();
            Ok(())
        }
    }
}

/// Replay a script and print every output as a JSON line
async fn cmd_replay(config: &Config, file: &Path, force_stop: bool) -> Result<()> {
    debug!(?file, "cmd_replay: called");
    let text = if file == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read script from stdin")?;
        text
    } else {
        fs::read_to_string(file).context(format!("Failed to read script {}", file.display()))?
    };

    let steps = replay::parse_script(&text)?;
    info!(steps = steps.len(), "Replaying script");

    for output in replay::run(config, steps, force_stop).await? {
        println!("{}", serde_json::to_string(&output).context("Failed to encode output")?);
    }
    Ok(())
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to encode configuration")?;
    print!("{}", yaml);
    Ok(())
}
