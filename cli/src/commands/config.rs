// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use quill_core::domain::service_config::ServiceConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./quill-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  --config flag: {}", path.display()),
            None => println!("  --config flag: {}", "(not set)".dimmed()),
        }
        for (i, path) in ServiceConfigManifest::search_paths().iter().enumerate() {
            let marker = if path.exists() { "✓".green() } else { "-".dimmed() };
            println!("  {}. {} {}", i + 1, path.display(), marker);
        }
        println!();
    }

    let manifest = ServiceConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let config = &manifest.spec;

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", manifest.metadata.name);
    println!();

    println!("{}", "Server:".bold());
    println!("  Listen: {}:{}", config.server.host, config.server.port);
    println!("  CORS origins: {}", config.server.cors_origins.join(", "));
    if config.server.rate_limit.enabled {
        println!(
            "  Rate limit: {} requests / {}s per IP",
            config.server.rate_limit.max_requests, config.server.rate_limit.window_secs
        );
    } else {
        println!("  Rate limit: {}", "disabled".dimmed());
    }
    println!("  Body limit: {} bytes", config.server.body_limit_bytes);
    match &config.server.static_dir {
        Some(dir) => println!("  Static files: {}", dir.display()),
        None => println!("  Static files: {}", "(none)".dimmed()),
    }
    println!();

    println!("{}", "LLM Providers (priority order):".bold());
    for provider in &config.providers {
        let state = if provider.enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!(
            "  {} ({:?}) [{}]",
            provider.id.bold(),
            provider.provider_type,
            state
        );
        println!("    Model: {}", provider.model);
        println!("    Endpoint: {}", provider.endpoint());
    }
    println!();

    println!("{}", "Generation:".bold());
    println!("  Max tokens: {}", config.generation.max_tokens);
    println!("  Temperature: {}", config.generation.temperature);
    if let Some(timeout) = config.generation.timeout_secs {
        println!("  Timeout: {}s", timeout);
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let manifest = ServiceConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    manifest
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = sample_config(with_examples);

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn sample_config(with_examples: bool) -> &'static str {
    if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_are_valid_manifests() {
        for with_examples in [false, true] {
            let manifest = ServiceConfigManifest::from_yaml_str(sample_config(with_examples))
                .expect("template parses");
            manifest.validate().expect("template validates");
            assert_eq!(manifest.spec.providers[0].id, "openai");
        }
    }

    #[tokio::test]
    async fn test_generate_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("quill-config.yaml");

        generate(output.clone(), false).await.unwrap();

        let manifest = ServiceConfigManifest::from_yaml_file(&output).unwrap();
        assert_eq!(manifest.kind, "ServiceConfig");
    }
}
