// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0

// Service Configuration Types
//
// Defines the configuration schema for a Quill service instance:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - HTTP server settings (bind address, CORS, rate limiting, static files)
// - LLM provider list, whose order is the auto-mode priority order
// - Generation parameters shared by every provider
// - Observability settings

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::domain::llm::GenerationOptions;

pub const API_VERSION: &str = "quill/v1";
pub const KIND: &str = "ServiceConfig";

/// Top-level Kubernetes-style service configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfigManifest {
    /// API version (must be "quill/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ServiceConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: ServiceConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable instance name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfigSpec {
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM providers, highest priority first
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Maximum request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Directory of static UI assets served for non-API paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests allowed per client IP within one window
    #[serde(default = "default_rate_limit_max")]
    pub max_requests: u32,

    #[serde(default = "default_rate_limit_window")]
    pub window_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "openai-compatible")]
    OpenAICompatible,
    Gemini,
}

impl ProviderType {
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::OpenAI | Self::OpenAICompatible => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Stable provider id used by clients (e.g., "openai", "gemini")
    pub id: String,

    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    /// Name shown to users
    pub display_name: String,

    /// Model identifier sent to the provider API
    pub model: String,

    /// API endpoint URL (defaults per provider type)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProviderConfig {
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider_type.default_endpoint())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-call timeout; the HTTP client default applies when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl GenerationConfig {
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Port for the Prometheus scrape endpoint; disabled when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

fn default_rate_limit_max() -> u32 {
    100
}

fn default_rate_limit_window() -> u64 {
    15 * 60
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            rate_limit: RateLimitConfig::default(),
            body_limit_bytes: default_body_limit(),
            static_dir: None,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: default_rate_limit_max(),
            window_secs: default_rate_limit_window(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: None,
        }
    }
}

/// OpenAI first, Gemini second; each only becomes available when its key resolves
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            id: "openai".to_string(),
            provider_type: ProviderType::OpenAI,
            display_name: "OpenAI GPT".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            endpoint: None,
            api_key: Some("env:OPENAI_API_KEY".to_string()),
            enabled: true,
        },
        ProviderConfig {
            id: "gemini".to_string(),
            provider_type: ProviderType::Gemini,
            display_name: "Google Gemini".to_string(),
            model: "gemini-pro".to_string(),
            endpoint: None,
            api_key: Some("env:GEMINI_API_KEY".to_string()),
            enabled: true,
        },
    ]
}

impl Default for ServiceConfigSpec {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            providers: default_providers(),
            generation: GenerationConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Default for ServiceConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "quill".to_string(),
                version: None,
            },
            spec: ServiceConfigSpec::default(),
        }
    }
}

impl ServiceConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Candidate configuration paths, in precedence order
    /// 1. QUILL_CONFIG_PATH environment variable
    /// 2. ./quill-config.yaml (working directory)
    /// 3. ~/.quill/config.yaml (user home)
    /// 4. /etc/quill/config.yaml (system, Unix) or C:\ProgramData\Quill\config.yaml (Windows)
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(path) = std::env::var("QUILL_CONFIG_PATH") {
            paths.push(PathBuf::from(path));
        }

        paths.push(PathBuf::from("./quill-config.yaml"));

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".quill").join("config.yaml"));
        }

        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/quill/config.yaml"));
        #[cfg(windows)]
        paths.push(PathBuf::from("C:\\ProgramData\\Quill\\config.yaml"));

        paths
    }

    /// First existing configuration file in the search paths
    pub fn discover_config() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|path| path.exists())
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::info!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PORT") {
            match val.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: PORT={}", port);
                    self.spec.server.port = port;
                }
                Err(_) => {
                    tracing::warn!("Invalid value for PORT: '{}'. Ignoring.", val);
                }
            }
        }

        if let Ok(host) = std::env::var("QUILL_HOST") {
            if !host.is_empty() {
                tracing::info!("Environment override: QUILL_HOST={}", host);
                self.spec.server.host = host;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let mut seen = HashSet::new();
        for provider in &self.spec.providers {
            if provider.id.is_empty() {
                anyhow::bail!("Provider id cannot be empty");
            }

            if provider.id.eq_ignore_ascii_case("auto") {
                anyhow::bail!("Provider id 'auto' is reserved");
            }

            if !seen.insert(provider.id.as_str()) {
                anyhow::bail!("Duplicate provider id: {}", provider.id);
            }

            if provider.model.is_empty() {
                anyhow::bail!("Model cannot be empty for provider: {}", provider.id);
            }

            if provider.endpoint().is_empty() {
                anyhow::bail!("Endpoint cannot be empty for provider: {}", provider.id);
            }
        }

        let rate_limit = &self.spec.server.rate_limit;
        if rate_limit.enabled && (rate_limit.max_requests == 0 || rate_limit.window_secs == 0) {
            anyhow::bail!("rate_limit.max_requests and rate_limit.window_secs must be positive");
        }

        let temperature = self.spec.generation.temperature;
        if !(0.0..=2.0).contains(&temperature) {
            anyhow::bail!("generation.temperature must be within 0.0..=2.0, got {}", temperature);
        }

        if self.spec.generation.max_tokens == 0 {
            anyhow::bail!("generation.max_tokens must be positive");
        }

        Ok(())
    }
}

/// Resolved configuration used throughout the service
pub type ServiceConfig = ServiceConfigSpec;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = ServiceConfigManifest::default();
        assert_eq!(manifest.api_version, "quill/v1");
        assert_eq!(manifest.kind, "ServiceConfig");
        assert_eq!(manifest.spec.server.port, 3000);
        assert_eq!(manifest.spec.providers.len(), 2);
        assert_eq!(manifest.spec.providers[0].id, "openai");
        assert_eq!(manifest.spec.providers[1].id, "gemini");
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_minimal_spec_uses_defaults() {
        let yaml = r#"
apiVersion: quill/v1
kind: ServiceConfig
metadata:
  name: test
spec:
  providers:
    - id: gemini
      type: gemini
      display_name: Google Gemini
      model: gemini-1.5-flash
      api_key: env:GEMINI_API_KEY
"#;
        let manifest = ServiceConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.server.rate_limit.max_requests, 100);
        assert_eq!(manifest.spec.server.rate_limit.window_secs, 900);
        assert_eq!(manifest.spec.generation.max_tokens, 1500);
        assert_eq!(manifest.spec.providers[0].provider_type, ProviderType::Gemini);
        assert_eq!(
            manifest.spec.providers[0].endpoint(),
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert!(manifest.spec.providers[0].enabled);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut manifest = ServiceConfigManifest::default();
        manifest.spec.providers.push(ProviderConfig {
            id: "local".to_string(),
            provider_type: ProviderType::OpenAICompatible,
            display_name: "LM Studio".to_string(),
            model: "llama-3.2".to_string(),
            endpoint: Some("http://localhost:1234/v1".to_string()),
            api_key: None,
            enabled: false,
        });

        let yaml = serde_yaml::to_string(&manifest).unwrap();
        assert!(yaml.contains("type: openai-compatible"));

        let parsed = ServiceConfigManifest::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.spec.providers.len(), 3);
        assert_eq!(parsed.spec.providers[2].endpoint(), "http://localhost:1234/v1");
        assert!(!parsed.spec.providers[2].enabled);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill-config.yaml");

        let manifest = ServiceConfigManifest::default();
        manifest.to_yaml_file(&path).unwrap();

        let loaded = ServiceConfigManifest::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.metadata.name, "quill");
        assert_eq!(loaded.spec.providers.len(), 2);
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = ServiceConfigManifest::load_or_default(Some(dir.path().join("nope.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        let mut manifest = ServiceConfigManifest::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.metadata.name = String::new();
        assert!(manifest.validate().is_err());
        manifest.metadata.name = "quill".to_string();

        let duplicate = manifest.spec.providers[0].clone();
        manifest.spec.providers.push(duplicate);
        assert!(manifest.validate().is_err());
        manifest.spec.providers.pop();

        manifest.spec.providers[0].id = "auto".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.providers[0].id = "openai".to_string();

        manifest.spec.server.rate_limit.max_requests = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.server.rate_limit.enabled = false;
        assert!(manifest.validate().is_ok());

        manifest.spec.generation.temperature = 3.5;
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_unknown_provider_type_rejected() {
        let yaml = r#"
apiVersion: quill/v1
kind: ServiceConfig
metadata:
  name: test
spec:
  providers:
    - id: claude
      type: anthropic
      display_name: Claude
      model: claude
"#;
        assert!(ServiceConfigManifest::from_yaml_str(yaml).is_err());
    }
}
