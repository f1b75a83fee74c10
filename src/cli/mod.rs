//! Command-line interface.

mod allowance;
mod config;
mod track;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tokentally::TallyConfig;

#[derive(Parser, Debug)]
#[command(name = "tokentally", version, about = "Daily token allowance tracker")]
pub(crate) struct Cli {
    /// Config file (default: ~/.tokentally/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Track a user's sent/received tokens until interrupted
    Track {
        /// User id to track
        #[arg(long)]
        fid: u64,
        /// Display name shown in output
        #[arg(long)]
        name: Option<String>,
        /// Run a single refresh cycle and exit
        #[arg(long)]
        once: bool,
        /// Print status as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Compute remaining allowance for a sent count
    Allowance {
        /// Tokens sent today
        #[arg(long)]
        sent: u64,
        /// Evaluate at this RFC 3339 instant instead of now
        #[arg(long)]
        at: Option<String>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Print the effective configuration (API key redacted)
    Show,
    /// Print the config file path in use
    Path,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = json
        || std::env::var("TOKENTALLY_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

pub(crate) async fn run() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Track {
            fid,
            name,
            once,
            json,
        } => track::cmd_track(load_config(config_path)?, fid, name, once, json).await,
        Commands::Allowance { sent, at } => {
            allowance::cmd_allowance(&load_config(config_path)?, sent, at.as_deref())
        }
        Commands::Config { action } => config::cmd_config(config_path, action),
    }
}

pub(crate) fn load_config(path: Option<&Path>) -> Result<TallyConfig> {
    TallyConfig::load(path).context("Failed to load config")
}
