// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Local analysis through the same pipeline the HTTP API uses

use anyhow::{Context, Result};
use colored::Colorize;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use quill_core::{
    application::AnalysisOrchestrator,
    domain::analysis::{CanonicalAnalysis, ProviderPreference},
    domain::service_config::ServiceConfigManifest,
    infrastructure::llm::ProviderRegistry,
    presentation::api::AnalyzeResponse,
};

pub async fn execute(
    config_path: Option<PathBuf>,
    file: Option<PathBuf>,
    provider: Option<String>,
    json: bool,
) -> Result<()> {
    let text = match &file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };

    let manifest =
        ServiceConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    manifest
        .validate()
        .context("Configuration validation failed")?;

    let registry = ProviderRegistry::from_config(&manifest.spec)
        .context("Failed to initialize LLM providers")?;
    let orchestrator = AnalysisOrchestrator::new(Arc::new(registry));

    let preference = ProviderPreference::from(provider.as_deref());
    let outcome = orchestrator
        .analyze_text(Some(&text), preference)
        .await
        .context("Analysis failed")?;

    if json {
        let response = AnalyzeResponse {
            success: true,
            analysis: outcome.analysis,
            provider: outcome.used_provider,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    print_analysis(&outcome.analysis, &outcome.used_provider);
    Ok(())
}

fn print_analysis(analysis: &CanonicalAnalysis, provider: &str) {
    println!("{} {}", "Analyzed by:".bold(), provider.cyan());
    println!();

    println!(
        "{} {}",
        "Grammar".bold(),
        format_score(analysis.grammar.score)
    );
    print_list("Issues", &analysis.grammar.issues);
    print_list("Suggestions", &analysis.grammar.suggestions);
    println!();

    println!("{} {}", "Style".bold(), format_score(analysis.style.score));
    if let Some(tone) = &analysis.style.tone {
        println!("  Tone: {}", tone);
    }
    if let Some(clarity) = &analysis.style.clarity {
        println!("  Clarity: {}", clarity);
    }
    print_list("Suggestions", &analysis.style.suggestions);
    println!();

    println!("{}", "Content".bold());
    print_list("Strengths", &analysis.content.strengths);
    print_list("Weaknesses", &analysis.content.weaknesses);
    print_list("Suggestions", &analysis.content.suggestions);
    println!();

    println!("{}", "Improved version".bold());
    println!("{}", analysis.improved_version);
}

fn format_score(score: Option<u8>) -> String {
    match score {
        Some(score) => format!("{}/10", score).green().to_string(),
        None => "N/A".dimmed().to_string(),
    }
}

fn print_list(label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("  {}:", label);
    for item in items {
        println!("    - {}", item);
    }
}
