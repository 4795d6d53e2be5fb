// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Prompt Template Engine
//!
//! Renders the analysis prompt sent to every provider, using Handlebars for
//! placeholder substitution.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Turn validated user text into the provider-agnostic prompt
//! - **Integration:** AnalysisRequest text → LLM input
//!
//! # Supported Placeholders
//!
//! - `{{text}}` - The user's text, inserted verbatim
//!
//! # Usage
//!
//! ```ignore
//! let engine = PromptTemplateEngine::new();
//! let prompt = engine.build_prompt("Their going to the store.")?;
//! ```

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;

// ============================================================================
// Template
// ============================================================================

/// Fixed analysis instruction. The JSON block is the canonical schema the
/// response parser expects.
pub const ANALYSIS_TEMPLATE: &str = r#"Please analyze the following text and provide feedback in the exact JSON format below:

Text to analyze: "{{text}}"

Please respond with a JSON object containing:
{
    "grammar": {
        "score": "number from 1-10",
        "issues": ["list of grammar issues found"],
        "suggestions": ["list of grammar improvement suggestions"]
    },
    "style": {
        "score": "number from 1-10",
        "tone": "description of the writing tone",
        "clarity": "assessment of clarity and readability",
        "suggestions": ["list of style improvement suggestions"]
    },
    "content": {
        "strengths": ["list of content strengths"],
        "weaknesses": ["list of content areas for improvement"],
        "suggestions": ["list of content improvement suggestions"]
    },
    "improved_version": "complete improved version of the text"
}

Write the issues, suggestions, tone, clarity, strengths and weaknesses as full sentences of specific feedback, not just scores. Respond with the JSON object only."#;

/// Context data for prompt template rendering
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext<'a> {
    pub text: &'a str,
}

// ============================================================================
// Template Engine
// ============================================================================

pub struct PromptTemplateEngine {
    handlebars: Handlebars<'static>,
}

impl PromptTemplateEngine {
    /// Create a new template engine
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();

        handlebars.set_strict_mode(true);
        // User text goes to an LLM, not a browser
        handlebars.register_escape_fn(handlebars::no_escape);

        Self { handlebars }
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &PromptContext<'_>) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .context("Failed to render prompt template")
    }

    /// Render the analysis prompt for already-validated text
    pub fn build_prompt(&self, text: &str) -> Result<String> {
        self.render(ANALYSIS_TEMPLATE, &PromptContext { text })
    }
}

impl Default for PromptTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::REQUIRED_KEYS;

    #[test]
    fn test_prompt_embeds_text() {
        let engine = PromptTemplateEngine::new();
        let prompt = engine.build_prompt("Their going to the store.").unwrap();

        assert!(prompt.contains("Text to analyze: \"Their going to the store.\""));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let engine = PromptTemplateEngine::new();
        let first = engine.build_prompt("Same input").unwrap();
        let second = PromptTemplateEngine::default().build_prompt("Same input").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_prompt_lists_every_schema_key() {
        let prompt = PromptTemplateEngine::new().build_prompt("x").unwrap();
        for key in REQUIRED_KEYS {
            assert!(prompt.contains(&format!("\"{}\"", key)), "missing {}", key);
        }
        assert!(prompt.contains("\"tone\""));
        assert!(prompt.contains("\"weaknesses\""));
    }

    #[test]
    fn test_text_is_not_html_escaped() {
        let prompt = PromptTemplateEngine::new()
            .build_prompt("Tom & Jerry <3 \"quotes\"")
            .unwrap();
        assert!(prompt.contains("Tom & Jerry <3 \"quotes\""));
    }

    #[test]
    fn test_text_with_braces_is_data() {
        let prompt = PromptTemplateEngine::new()
            .build_prompt("Use {{placeholder}} here")
            .unwrap();
        assert!(prompt.contains("Use {{placeholder}} here"));
    }

    #[test]
    fn test_analysis_template_compiles() {
        assert!(handlebars::template::Template::compile(ANALYSIS_TEMPLATE).is_ok());
        assert!(PromptTemplateEngine::new().build_prompt("x").is_ok());
    }
}
