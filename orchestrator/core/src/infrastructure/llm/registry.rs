// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry - Provider Availability and Uniform Invocation
//
// Holds the providers whose credentials were present at startup, in
// registration (priority) order. Invocation is a single outbound call with the
// shared generation options; retries and fallback belong to the orchestrator.

use crate::domain::analysis::{AnalysisError, ProviderDescriptor};
use crate::domain::llm::{classify_provider_error, GenerationOptions, LLMProvider};
use crate::domain::service_config::{ProviderConfig, ProviderType, ServiceConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::gemini::GeminiAdapter;
use super::openai::OpenAIAdapter;

struct RegisteredProvider {
    descriptor: ProviderDescriptor,
    provider: Arc<dyn LLMProvider>,
}

/// Registry of configured LLM providers
pub struct ProviderRegistry {
    providers: Vec<RegisteredProvider>,
    options: GenerationOptions,
}

impl ProviderRegistry {
    /// Empty registry; providers are added with [`ProviderRegistry::register`]
    pub fn new(options: GenerationOptions) -> Self {
        Self {
            providers: Vec::new(),
            options,
        }
    }

    /// Create provider registry from service configuration
    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let mut registry = Self::new(config.generation.options());
        let client = Self::build_http_client(config.generation.timeout_secs)?;

        info!("Initializing LLM provider registry");

        for provider_config in &config.providers {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.id);
                continue;
            }

            let api_key = match Self::resolve_api_key(provider_config) {
                Ok(key) => key,
                Err(e) => {
                    info!("Provider '{}' not available: {}", provider_config.id, e);
                    continue;
                }
            };

            let descriptor = ProviderDescriptor {
                id: provider_config.id.clone(),
                display_name: provider_config.display_name.clone(),
                model_name: provider_config.model.clone(),
                available: true,
            };
            let provider = Self::create_provider(provider_config, client.clone(), api_key);

            if let Err(e) = registry.register(descriptor, provider) {
                warn!("Failed to register provider '{}': {}", provider_config.id, e);
                continue;
            }

            info!(
                "Provider '{}' initialized ({})",
                provider_config.id, provider_config.model
            );
        }

        if registry.providers.is_empty() {
            warn!("No LLM providers available - analysis requests will be rejected");
        }

        Ok(registry)
    }

    fn build_http_client(timeout_secs: Option<u64>) -> anyhow::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))
    }

    /// Create a provider instance from configuration
    fn create_provider(
        config: &ProviderConfig,
        client: reqwest::Client,
        api_key: String,
    ) -> Arc<dyn LLMProvider> {
        let endpoint = config.endpoint().to_string();
        let model = config.model.clone();

        match config.provider_type {
            ProviderType::OpenAI | ProviderType::OpenAICompatible => {
                Arc::new(OpenAIAdapter::new(client, endpoint, api_key, model))
            }
            ProviderType::Gemini => Arc::new(GeminiAdapter::new(client, endpoint, api_key, model)),
        }
    }

    /// Resolve API key from config (supports "env:VAR_NAME" syntax).
    ///
    /// Hosted providers need a non-empty key; OpenAI-compatible servers may run
    /// without one.
    fn resolve_api_key(config: &ProviderConfig) -> anyhow::Result<String> {
        let key = match &config.api_key {
            Some(k) => match k.strip_prefix("env:") {
                Some(var_name) => std::env::var(var_name).map_err(|_| {
                    anyhow::anyhow!("Environment variable not set: {}", var_name)
                })?,
                None => k.clone(),
            },
            None => String::new(),
        };

        let needs_key = !matches!(config.provider_type, ProviderType::OpenAICompatible);
        if needs_key && key.trim().is_empty() {
            anyhow::bail!("No API key configured");
        }

        Ok(key)
    }

    /// Append a provider; ids must be unique
    pub fn register(
        &mut self,
        descriptor: ProviderDescriptor,
        provider: Arc<dyn LLMProvider>,
    ) -> anyhow::Result<()> {
        if self.is_available(&descriptor.id) {
            anyhow::bail!("Provider '{}' is already registered", descriptor.id);
        }
        self.providers.push(RegisteredProvider {
            descriptor,
            provider,
        });
        Ok(())
    }

    /// Providers in registration order
    pub fn list_available(&self) -> Vec<ProviderDescriptor> {
        self.providers.iter().map(|p| p.descriptor.clone()).collect()
    }

    /// Provider ids in registration order
    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.descriptor.id.clone()).collect()
    }

    pub fn is_available(&self, provider_id: &str) -> bool {
        self.providers.iter().any(|p| p.descriptor.id == provider_id)
    }

    /// Highest-priority provider, if any
    pub fn default_provider(&self) -> Option<&str> {
        self.providers.first().map(|p| p.descriptor.id.as_str())
    }

    /// Send `prompt` to one provider and return its raw text
    pub async fn invoke(&self, provider_id: &str, prompt: &str) -> Result<String, AnalysisError> {
        let registered = self
            .providers
            .iter()
            .find(|p| p.descriptor.id == provider_id)
            .ok_or_else(|| AnalysisError::ProviderUnavailable(provider_id.to_string()))?;

        let response = match registered.provider.generate(prompt, &self.options).await {
            Ok(response) => response,
            Err(e) => {
                let message = e.to_string();
                let kind = classify_provider_error(&message);
                metrics::counter!(
                    "quill_provider_attempts_total",
                    "provider" => provider_id.to_string(),
                    "result" => kind.to_string()
                )
                .increment(1);
                return Err(AnalysisError::ProviderCallFailed {
                    provider: provider_id.to_string(),
                    kind,
                    message,
                });
            }
        };

        debug!(
            provider = provider_id,
            model = %response.model,
            "Raw provider output: {}",
            response.text
        );

        if response.text.trim().is_empty() {
            metrics::counter!(
                "quill_provider_attempts_total",
                "provider" => provider_id.to_string(),
                "result" => "empty"
            )
            .increment(1);
            return Err(AnalysisError::EmptyResponse {
                provider: provider_id.to_string(),
            });
        }

        metrics::counter!(
            "quill_provider_attempts_total",
            "provider" => provider_id.to_string(),
            "result" => "ok"
        )
        .increment(1);

        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{GenerationResponse, LLMError};
    use crate::domain::service_config::ServiceConfigSpec;
    use async_trait::async_trait;

    struct StaticProvider(Result<&'static str, &'static str>);

    #[async_trait]
    impl LLMProvider for StaticProvider {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<GenerationResponse, LLMError> {
            match self.0 {
                Ok(text) => Ok(GenerationResponse {
                    text: text.to_string(),
                    model: "static".to_string(),
                }),
                Err(msg) => Err(LLMError::RateLimit(msg.to_string())),
            }
        }
    }

    fn descriptor(id: &str) -> ProviderDescriptor {
        ProviderDescriptor {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            model_name: "static".to_string(),
            available: true,
        }
    }

    fn provider_config(id: &str, provider_type: ProviderType, api_key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            id: id.to_string(),
            provider_type,
            display_name: id.to_string(),
            model: "model".to_string(),
            endpoint: None,
            api_key: api_key.map(str::to_string),
            enabled: true,
        }
    }

    #[test]
    fn test_registration_order_is_preserved() {
        let mut registry = ProviderRegistry::new(GenerationOptions::default());
        registry.register(descriptor("b"), Arc::new(StaticProvider(Ok("{}")))).unwrap();
        registry.register(descriptor("a"), Arc::new(StaticProvider(Ok("{}")))).unwrap();

        assert_eq!(registry.provider_ids(), vec!["b", "a"]);
        assert_eq!(registry.default_provider(), Some("b"));
        assert!(registry.list_available().iter().all(|d| d.available));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ProviderRegistry::new(GenerationOptions::default());
        registry.register(descriptor("a"), Arc::new(StaticProvider(Ok("{}")))).unwrap();
        assert!(registry
            .register(descriptor("a"), Arc::new(StaticProvider(Ok("{}"))))
            .is_err());
    }

    #[tokio::test]
    async fn test_invoke_unknown_provider() {
        let registry = ProviderRegistry::new(GenerationOptions::default());
        let err = registry.invoke("ghost", "prompt").await.unwrap_err();
        assert!(matches!(err, AnalysisError::ProviderUnavailable(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_invoke_empty_output() {
        let mut registry = ProviderRegistry::new(GenerationOptions::default());
        registry.register(descriptor("a"), Arc::new(StaticProvider(Ok("   ")))).unwrap();

        let err = registry.invoke("a", "prompt").await.unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyResponse { provider } if provider == "a"));
    }

    #[tokio::test]
    async fn test_invoke_classifies_failure() {
        let mut registry = ProviderRegistry::new(GenerationOptions::default());
        registry
            .register(descriptor("a"), Arc::new(StaticProvider(Err("slow down"))))
            .unwrap();

        match registry.invoke("a", "prompt").await.unwrap_err() {
            AnalysisError::ProviderCallFailed { provider, kind, .. } => {
                assert_eq!(provider, "a");
                assert_eq!(kind, crate::domain::llm::ProviderFailureKind::RateLimit);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    struct RecordingProvider(std::sync::Mutex<Option<GenerationOptions>>);

    #[async_trait]
    impl LLMProvider for RecordingProvider {
        async fn generate(
            &self,
            _prompt: &str,
            options: &GenerationOptions,
        ) -> Result<GenerationResponse, LLMError> {
            *self.0.lock().unwrap() = Some(options.clone());
            Ok(GenerationResponse {
                text: "{}".to_string(),
                model: "recording".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_invoke_passes_registry_options() {
        let options = GenerationOptions {
            max_tokens: 321,
            temperature: 0.2,
        };
        let recorder = Arc::new(RecordingProvider(std::sync::Mutex::new(None)));
        let mut registry = ProviderRegistry::new(options.clone());
        registry.register(descriptor("a"), recorder.clone()).unwrap();

        registry.invoke("a", "prompt").await.unwrap();

        assert_eq!(recorder.0.lock().unwrap().as_ref(), Some(&options));
    }

    #[test]
    fn test_from_config_skips_uncredentialed_providers() {
        let config = ServiceConfigSpec {
            providers: vec![
                provider_config("openai", ProviderType::OpenAI, Some("env:QUILL_TEST_UNSET_OPENAI_KEY")),
                provider_config("gemini", ProviderType::Gemini, Some("literal-key")),
                provider_config("local", ProviderType::OpenAICompatible, None),
                provider_config("bare", ProviderType::OpenAI, None),
            ],
            ..ServiceConfigSpec::default()
        };

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.provider_ids(), vec!["gemini", "local"]);
    }

    #[test]
    fn test_from_config_skips_disabled_providers() {
        let mut disabled = provider_config("gemini", ProviderType::Gemini, Some("key"));
        disabled.enabled = false;
        let config = ServiceConfigSpec {
            providers: vec![disabled],
            ..ServiceConfigSpec::default()
        };

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(registry.list_available().is_empty());
        assert_eq!(registry.default_provider(), None);
    }
}
