// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Relay CLI
//!
//! The `relay` binary runs the workflow engine and talks to a running one.
//!
//! ## Commands
//!
//! - `relay serve` - Run the engine: HTTP API + queue processor
//! - `relay workflow list|execute|show` - Thin client over the HTTP API
//!
//! Configuration is environment-first (`RELAY_*` variables, `.env` honored);
//! every variable is also a flag.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod commands;
mod serve;

use commands::workflow::WorkflowCommand;

/// Relay workflow automation engine
#[derive(Parser)]
#[command(name = "relay")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// HTTP API host
    #[arg(long, global = true, env = "RELAY_HOST", default_value = "127.0.0.1")]
    host: String,

    /// HTTP API port
    #[arg(long, global = true, env = "RELAY_PORT", default_value = "8080")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RELAY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine: HTTP API plus the execution queue processor
    Serve {
        /// PostgreSQL connection string; omit to run on the in-memory store
        #[arg(long, env = "RELAY_DATABASE_URL")]
        database_url: Option<String>,

        /// Queue poll interval when idle, in milliseconds
        #[arg(long, env = "RELAY_IDLE_INTERVAL_MS", default_value = "1000")]
        idle_interval_ms: u64,

        /// Back-off after a queue tick error, in milliseconds
        #[arg(long, env = "RELAY_ERROR_INTERVAL_MS", default_value = "5000")]
        error_interval_ms: u64,
    },

    /// Workflow management against a running engine
    #[command(name = "workflow")]
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; absence is not an error.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Serve {
            database_url,
            idle_interval_ms,
            error_interval_ms,
        } => {
            serve::run(serve::ServeConfig {
                host: cli.host,
                port: cli.port,
                database_url,
                idle_interval_ms,
                error_interval_ms,
            })
            .await
        }
        Commands::Workflow { command } => {
            commands::workflow::handle_command(command, &cli.host, cli.port).await
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
