//! Tontine - maintenance and inspection tool
//!
//! Operates on an engine snapshot file:
//! - recompute every ledger from its transaction log and report drift
//! - purge records orphaned by deleted associations
//! - inspect associations, balances and the cross-association summary

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use config::CliConfig;

/// Tontine CLI
#[derive(Parser)]
#[command(name = "tontine")]
#[command(about = "Tontine engine maintenance and inspection", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TONTINE_CONFIG")]
    config: Option<String>,

    /// Snapshot file, overrides the configured path
    #[arg(short, long, env = "TONTINE_SNAPSHOT")]
    snapshot: Option<String>,

    /// Log level
    #[arg(long, env = "TONTINE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "TONTINE_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write an empty snapshot
    Init {
        /// Replace an existing snapshot
        #[arg(long)]
        force: bool,
    },

    /// Rebuild every ledger from its transaction log
    Recompute {
        /// Report drift without saving the repaired snapshot
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete records referencing deleted associations
    Purge {
        /// Report findings without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Show associations with their totals and balances
    Inspect {
        /// Only this association
        #[arg(long)]
        association: Option<String>,
    },

    /// Print the cross-association balance summary as JSON
    Summary,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref()).context("loading configuration")?;

    // Override with CLI args
    if let Some(path) = &cli.snapshot {
        config.snapshot_path = path.into();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json {
        config.logging.json = true;
    }

    init_tracing(&config);
    config.validate()?;

    match cli.command {
        Command::Init { force } => commands::init(&config, force),
        Command::Recompute { dry_run } => commands::recompute(&config, dry_run),
        Command::Purge { dry_run } => commands::purge(&config, dry_run),
        Command::Inspect { association } => commands::inspect(&config, association.as_deref()),
        Command::Summary => commands::summary(&config),
    }
}

fn init_tracing(config: &CliConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
