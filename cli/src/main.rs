// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Quill
//!
//! The `quill` binary hosts the writing-feedback HTTP service and offers a
//! local client for the same analysis pipeline.
//!
//! ## Commands
//!
//! - `quill serve` - Run the HTTP API (and static UI when configured)
//! - `quill analyze [FILE]` - Analyze text from a file or stdin
//! - `quill providers` - List configured providers and their availability
//! - `quill config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

mod commands;
mod server;

use commands::ConfigCommand;

/// Quill - AI writing feedback service
#[derive(Parser)]
#[command(name = "quill")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "QUILL_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "QUILL_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    #[command(name = "serve")]
    Serve {
        /// Bind host (overrides configuration)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides configuration and PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Analyze a piece of writing
    #[command(name = "analyze")]
    Analyze {
        /// File to analyze (default: read stdin)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Provider id, or "auto" for priority order with fallback
        #[arg(short, long)]
        provider: Option<String>,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// List configured AI providers
    #[command(name = "providers")]
    Providers,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    if let Ok(path) = dotenv {
        debug!("Loaded environment from {:?}", path);
    }

    match cli.command {
        Some(Commands::Serve { host, port }) => server::start_server(cli.config, host, port).await,
        Some(Commands::Analyze {
            file,
            provider,
            json,
        }) => commands::analyze::execute(cli.config, file, provider, json).await,
        Some(Commands::Providers) => commands::providers::execute(cli.config).await,
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
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
