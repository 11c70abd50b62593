//! `mirage` - SQL deception router.
//!
//! Benign reads are answered from the real PostgreSQL store; queries that
//! look like injection attempts are answered with fabricated records.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mirage_core::MirageConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mirage", version, about = "SQL deception router")]
struct Cli {
    /// Log filter, e.g. "info" or "mirage=debug". Falls back to RUST_LOG.
    #[arg(long, global = true, env = "MIRAGE_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the enabled front ends (Postgres wire and HTTP).
    Serve {
        #[arg(long, short, default_value = "mirage.yaml")]
        config: PathBuf,
    },

    /// Show how a query would be classified and routed, without running it.
    Classify {
        /// SQL text to classify.
        sql: String,

        /// Configuration whose signatures and read keywords apply. Built-in
        /// defaults otherwise.
        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// Validate a configuration file.
    Check {
        #[arg(long, short, default_value = "mirage.yaml")]
        config: PathBuf,
    },
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.cmd {
        Command::Serve { config } => commands::serve::run(&config).await,
        Command::Classify { sql, config } => {
            let config = match config {
                Some(path) => commands::serve::load_config(&path)?,
                None => MirageConfig::default(),
            };
            commands::classify::run(&config, &sql)
        }
        Command::Check { config } => commands::check::run(&config),
    }
}
