//! # nebula-sync
//!
//! CLI tool for running and simulating nebula-sync nodes.
//!
//! ## Commands
//!
//! - `run`: Run one node over UDP broadcast
//! - `simulate`: Run a group of nodes on an in-memory radio
//! - `decode`: Decode a hex frame
//!
//! ## Example
//!
//! ```bash
//! # Two terminals on the same LAN (or two hosts)
//! nebula-sync run --pair
//! nebula-sync --config right.toml run
//!
//! # Five poi for thirty simulated seconds
//! nebula-sync simulate --devices 5 --seconds 30 --json
//!
//! # What is this frame?
//! nebula-sync decode "4E 50 12 07 C8"
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

mod commands;
mod config;
mod handler;
mod udp;

use commands::{decode, run, simulate};
use config::Config;

/// Config file read when `--config` is not given, if present.
const DEFAULT_CONFIG_FILE: &str = "nebula-sync.toml";

/// CLI tool for running and simulating nebula-sync nodes.
#[derive(Parser, Debug)]
#[command(name = "nebula-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one node over UDP broadcast until Ctrl-C
    Run {
        /// Broadcast a pair request at startup
        #[arg(long)]
        pair: bool,
    },

    /// Run a group of nodes on an in-memory radio
    Simulate {
        /// Number of nodes
        #[arg(long, short, default_value = "3")]
        devices: usize,

        /// Simulated run time in seconds
        #[arg(long, short, default_value = "10")]
        seconds: u64,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode and print one frame
    Decode {
        /// Frame bytes in hex
        hex: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.logging.filter);

    match cli.command {
        Commands::Run { pair } => {
            run::run(&config, pair).await?;
        }
        Commands::Simulate {
            devices,
            seconds,
            json,
        } => {
            simulate::run(&config, devices, seconds, json)?;
        }
        Commands::Decode { hex } => {
            decode::run(&hex)?;
        }
    }

    Ok(())
}

/// Explicit path, else `nebula-sync.toml` if it exists, else defaults.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::from_file(path)?),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Ok(Config::from_file(Path::new(DEFAULT_CONFIG_FILE))?)
        }
        None => Ok(Config::default()),
    }
}

fn log_filter(configured: &str) -> tracing_subscriber::EnvFilter {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| configured.to_string());

    tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

fn init_logging(configured: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(configured))
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_simulate_flags() {
        let cli = Cli::parse_from(["nebula-sync", "simulate", "--devices", "4", "--json"]);
        match cli.command {
            Commands::Simulate {
                devices,
                seconds,
                json,
            } => {
                assert_eq!(devices, 4);
                assert_eq!(seconds, 10);
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["nebula-sync", "run", "--pair", "--config", "poi.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("poi.toml")));
        assert!(matches!(cli.command, Commands::Run { pair: true }));
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("none.toml"))).is_err());
    }
}
