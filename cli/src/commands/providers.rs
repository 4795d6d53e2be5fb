// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use quill_core::{
    domain::service_config::ServiceConfigManifest, infrastructure::llm::ProviderRegistry,
};

/// Print every configured provider, marking those whose credentials resolved
pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let manifest =
        ServiceConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    manifest
        .validate()
        .context("Configuration validation failed")?;

    let registry = ProviderRegistry::from_config(&manifest.spec)
        .context("Failed to initialize LLM providers")?;

    println!("{}", "AI Providers (priority order):".bold());
    for provider in &manifest.spec.providers {
        let status = if registry.is_available(&provider.id) {
            "available".green()
        } else if !provider.enabled {
            "disabled".dimmed()
        } else {
            "no credentials".yellow()
        };
        println!(
            "  {} {} ({}) [{}]",
            provider.id.bold(),
            provider.display_name,
            provider.model,
            status
        );
    }
    println!();

    match registry.default_provider() {
        Some(id) => println!("Default provider: {}", id.cyan()),
        None => println!("Default provider: {}", "(none)".dimmed()),
    }

    Ok(())
}
