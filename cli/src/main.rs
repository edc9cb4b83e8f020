// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # convoy CLI
//!
//! The `convoy` binary embeds the mission engine for local runs and inspects
//! the mission store.
//!
//! ## Commands
//!
//! - `convoy run <MISSIONS.yaml>` - Run a batch of missions to completion
//! - `convoy mission list|show|delete` - Inspect the mission store
//! - `convoy config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use tracing::{info, warn};

use convoy_core::domain::engine_config::{EngineConfigManifest, ObservabilityConfig};
use convoy_orchestrator::commands::{self, ConfigCommand, MissionCommand, RunArgs};

/// convoy - deployment mission orchestrator
#[derive(Parser)]
#[command(name = "convoy")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CONVOY_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the config value
    #[arg(long, global = true, env = "CONVOY_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every mission in a manifest on an embedded engine
    #[command(name = "run")]
    Run(RunArgs),

    /// Inspect the mission store
    #[command(name = "mission")]
    Mission {
        #[command(subcommand)]
        command: MissionCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // A broken config file must not stop `config validate` from reporting it.
    let observability = EngineConfigManifest::load_or_default(cli.config.clone())
        .map(|config| config.spec.observability)
        .unwrap_or_default();
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| observability.logging.level.clone());
    init_logging(&level, &observability.logging.format)?;

    match cli.command {
        Some(Commands::Run(args)) => {
            init_metrics(&observability);
            commands::run::execute(args, cli.config).await
        }
        Some(Commands::Mission { command }) => {
            commands::mission::handle_command(command, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

/// Install the Prometheus scrape endpoint when enabled in config
fn init_metrics(observability: &ObservabilityConfig) {
    if !observability.metrics.enabled {
        return;
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, observability.metrics.port));
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => info!(%addr, "Prometheus metrics endpoint listening"),
        Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
    }
}
