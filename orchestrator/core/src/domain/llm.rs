// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Provider-agnostic interface to the LLM services Quill can ask for feedback.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary between orchestration and vendor APIs

// Implementations live in infrastructure/llm/. The orchestrator only ever sees
// `LLMProvider`, so tests substitute fake providers without any HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain interface for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion for `prompt`, returning the raw text content
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError>;
}

/// Options for LLM generation, shared by every provider so outputs stay comparable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1500,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// Generated text
    pub text: String,

    /// Model used (e.g., "gpt-3.5-turbo", "gemini-pro")
    pub model: String,
}

/// Errors raised by a provider adapter
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

/// Coarse classification of a failed provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFailureKind {
    Quota,
    RateLimit,
    Auth,
    Transport,
}

impl fmt::Display for ProviderFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Quota => "quota",
            Self::RateLimit => "rate_limit",
            Self::Auth => "auth",
            Self::Transport => "transport",
        };
        f.write_str(label)
    }
}

/// Classify a raw provider error message.
///
/// Vendors signal quota exhaustion and throttling only through message text, so
/// this is the single place those substrings are matched. Quota wins over rate
/// limiting because OpenAI reports exhausted credit as an HTTP 429.
pub fn classify_provider_error(raw: &str) -> ProviderFailureKind {
    let message = raw.to_lowercase();

    if message.contains("quota") {
        return ProviderFailureKind::Quota;
    }

    if ["rate limit", "rate_limit", "too many requests"]
        .iter()
        .any(|needle| message.contains(needle))
    {
        return ProviderFailureKind::RateLimit;
    }

    // Status codes only count next to "http"/"status"; bare digits show up in ports and ids
    if [
        "unauthorized",
        "authentication",
        "api key",
        "permission",
        "http 401",
        "http 403",
        "status 401",
        "status 403",
    ]
    .iter()
    .any(|needle| message.contains(needle))
    {
        return ProviderFailureKind::Auth;
    }

    ProviderFailureKind::Transport
}
