// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Analysis orchestration: provider selection, invocation, response validation
//! and ordered fallback.
//!
//! Per request: `Received → Validated → ProviderSelected → Invoking →
//! {Parsed → Success | AttemptFailed → (next candidate | Exhausted)}`.
//! Nothing survives the request except the shared, read-only registry.

use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::analysis::{
    parse_and_validate, AnalysisError, AnalysisOutcome, AnalysisRequest, CanonicalAnalysis,
    ProviderPreference,
};
use crate::infrastructure::llm::ProviderRegistry;
use crate::infrastructure::prompt_template_engine::PromptTemplateEngine;

/// Which providers a request may touch, and whether failure falls through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidatePlan {
    /// One provider; its failure is the request's failure
    Single(String),
    /// Two or more providers tried in priority order until one succeeds
    Fallback(Vec<String>),
}

pub struct AnalysisOrchestrator {
    registry: Arc<ProviderRegistry>,
    prompts: PromptTemplateEngine,
}

impl AnalysisOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            prompts: PromptTemplateEngine::new(),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Resolve a preference against the registry.
    ///
    /// An explicit provider never falls back to another one; `auto` falls back
    /// only when more than one provider is available.
    pub fn select_candidates(
        &self,
        preference: &ProviderPreference,
    ) -> Result<CandidatePlan, AnalysisError> {
        match preference {
            ProviderPreference::Named(id) => {
                if self.registry.is_available(id) {
                    Ok(CandidatePlan::Single(id.clone()))
                } else {
                    Err(AnalysisError::ProviderUnavailable(id.clone()))
                }
            }
            ProviderPreference::Auto => {
                let mut ids = self.registry.provider_ids();
                match ids.len() {
                    0 => Err(AnalysisError::NoProviderAvailable),
                    1 => Ok(CandidatePlan::Single(ids.remove(0))),
                    _ => Ok(CandidatePlan::Fallback(ids)),
                }
            }
        }
    }

    /// Validate raw input, then analyze it
    pub async fn analyze_text(
        &self,
        text: Option<&str>,
        preference: ProviderPreference,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let request = AnalysisRequest::new(text, preference).inspect_err(|e| {
            metrics::counter!(
                "quill_analysis_requests_total",
                "provider" => "none",
                "outcome" => AnalysisError::Validation(e.clone()).label()
            )
            .increment(1);
        })?;
        self.analyze(&request).await
    }

    /// Run one validated request to completion
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        let span = info_span!(
            "analysis",
            request_id = %Uuid::new_v4(),
            preference = %request.preference(),
            chars = request.text().chars().count(),
        );

        let result: Result<AnalysisOutcome, AnalysisError> = async {
            let plan = self.select_candidates(request.preference())?;
            let prompt = self
                .prompts
                .build_prompt(request.text())
                .map_err(|e| AnalysisError::Internal(format!("{:#}", e)))?;

            match plan {
                CandidatePlan::Single(provider) => {
                    let analysis = self.attempt(&provider, &prompt).await?;
                    Ok(AnalysisOutcome {
                        analysis,
                        used_provider: provider,
                    })
                }
                CandidatePlan::Fallback(candidates) => {
                    self.execute_with_fallback(&candidates, &prompt).await
                }
            }
        }
        .instrument(span)
        .await;

        match &result {
            Ok(outcome) => metrics::counter!(
                "quill_analysis_requests_total",
                "provider" => outcome.used_provider.clone(),
                "outcome" => "success"
            )
            .increment(1),
            Err(e) => metrics::counter!(
                "quill_analysis_requests_total",
                "provider" => "none",
                "outcome" => e.label()
            )
            .increment(1),
        }

        result
    }

    /// Try candidates strictly in order; the first valid response wins.
    ///
    /// Attempts are sequential so a paid provider is never billed for a call
    /// whose answer would be discarded.
    pub async fn execute_with_fallback(
        &self,
        candidates: &[String],
        prompt: &str,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let mut attempted = Vec::with_capacity(candidates.len());
        let mut last_error = None;

        for provider in candidates {
            attempted.push(provider.clone());

            match self.attempt(provider, prompt).await {
                Ok(analysis) => {
                    return Ok(AnalysisOutcome {
                        analysis,
                        used_provider: provider.clone(),
                    });
                }
                Err(e) => {
                    if attempted.len() < candidates.len() {
                        info!("Provider '{}' failed, trying next candidate", provider);
                    }
                    last_error = Some(e);
                }
            }
        }

        let last = last_error.unwrap_or(AnalysisError::NoProviderAvailable);
        warn!(
            attempted = ?attempted,
            last_error = last.label(),
            kind = ?last.failure_kind(),
            "All providers failed"
        );
        debug!("Last provider error: {}", last);

        Err(AnalysisError::AllProvidersFailed {
            attempted,
            last: Box::new(last),
        })
    }

    /// invoke → parse → check top-level keys, against a single provider
    async fn attempt(&self, provider: &str, prompt: &str) -> Result<CanonicalAnalysis, AnalysisError> {
        let result = self
            .registry
            .invoke(provider, prompt)
            .await
            .and_then(|raw| parse_and_validate(&raw));

        match &result {
            Ok(_) => info!(provider, "Analysis attempt succeeded"),
            Err(e) => warn!(
                provider,
                error = e.label(),
                kind = ?e.failure_kind(),
                "Analysis attempt failed"
            ),
        }

        result
    }
}
