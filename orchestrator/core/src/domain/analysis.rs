// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Analysis
//!
//! Request, result and error types for a single writing-feedback analysis.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Canonical schema, input validation and the error taxonomy

use serde::{Deserialize, Deserializer, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::domain::llm::ProviderFailureKind;

/// Maximum accepted input length, in characters
pub const MAX_TEXT_CHARS: usize = 10_000;

/// Top-level keys every provider answer must carry
pub const REQUIRED_KEYS: [&str; 4] = ["grammar", "style", "content", "improved_version"];

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Text input is required and must be a string")]
    EmptyText,

    #[error("Text too long. Maximum 10,000 characters allowed.")]
    TooLong { length: usize },
}

/// Check user text before anything is sent to a provider.
///
/// `None` stands for an absent or non-string `text` field.
pub fn validate_input(text: Option<&str>) -> Result<&str, ValidationError> {
    let text = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Err(ValidationError::EmptyText),
    };

    let length = text.chars().count();
    if length > MAX_TEXT_CHARS {
        return Err(ValidationError::TooLong { length });
    }

    Ok(text)
}

/// Which provider the caller wants to answer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProviderPreference {
    #[default]
    Auto,
    Named(String),
}

impl FromStr for ProviderPreference {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            Ok(Self::Named(trimmed.to_string()))
        }
    }
}

impl From<Option<&str>> for ProviderPreference {
    fn from(value: Option<&str>) -> Self {
        match value {
            Some(s) => s.parse().unwrap_or_default(),
            None => Self::Auto,
        }
    }
}

impl fmt::Display for ProviderPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Named(id) => f.write_str(id),
        }
    }
}

/// A length-validated analysis request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    text: String,
    preference: ProviderPreference,
}

impl AnalysisRequest {
    pub fn new(
        text: Option<&str>,
        preference: ProviderPreference,
    ) -> Result<Self, ValidationError> {
        let text = validate_input(text)?;
        Ok(Self {
            text: text.to_string(),
            preference,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn preference(&self) -> &ProviderPreference {
        &self.preference
    }
}

/// Public summary of a configured provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "model")]
    pub model_name: String,
    pub available: bool,
}

// ============================================================================
// Canonical result
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrammarFeedback {
    #[serde(default, deserialize_with = "lenient::score")]
    pub score: Option<u8>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub issues: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StyleFeedback {
    #[serde(default, deserialize_with = "lenient::score")]
    pub score: Option<u8>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tone: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub clarity: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentFeedback {
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub weaknesses: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub suggestions: Vec<String>,
}

/// The normalized answer, whichever provider produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalAnalysis {
    pub grammar: GrammarFeedback,
    pub style: StyleFeedback,
    pub content: ContentFeedback,
    pub improved_version: String,
}

/// Successful result of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub analysis: CanonicalAnalysis,
    pub used_provider: String,
}

/// Parse raw provider output into the canonical schema.
///
/// Only the four top-level keys are mandatory. Nested fields are optional and
/// coerced where the intent is unambiguous (numeric-string scores, a bare
/// string where a list was asked for).
pub fn parse_and_validate(raw: &str) -> Result<CanonicalAnalysis, AnalysisError> {
    let value: serde_json::Value = match serde_json::from_str(raw.trim()) {
        Ok(v) => v,
        Err(e) => match extract_fenced_json(raw) {
            Some(inner) => serde_json::from_str(&inner).map_err(|inner_err| {
                AnalysisError::MalformedResponse {
                    detail: inner_err.to_string(),
                }
            })?,
            None => {
                return Err(AnalysisError::MalformedResponse {
                    detail: e.to_string(),
                })
            }
        },
    };

    let missing: Vec<String> = REQUIRED_KEYS
        .iter()
        .filter(|key| value.get(**key).is_none())
        .map(|key| key.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(AnalysisError::IncompleteResponse { missing });
    }

    serde_json::from_value(value).map_err(|e| AnalysisError::MalformedResponse {
        detail: e.to_string(),
    })
}

/// Pull the body out of a ```json ... ``` (or bare ```) block
fn extract_fenced_json(text: &str) -> Option<String> {
    for marker in ["```json", "```"] {
        if let Some(start) = text.find(marker) {
            let content_start = start + marker.len();
            if let Some(end_offset) = text[content_start..].find("```") {
                return Some(text[content_start..content_start + end_offset].trim().to_string());
            }
        }
    }
    None
}

mod lenient {
    use super::*;
    use serde_json::Value;

    pub fn score<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        let number = match value {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => leading_number(&s),
            _ => None,
        };
        Ok(number
            .filter(|n| n.is_finite())
            .map(|n| n.round().clamp(1.0, 10.0) as u8))
    }

    // "8", "8/10", " 7.5 "
    fn leading_number(s: &str) -> Option<f64> {
        let digits: String = s
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        digits.parse().ok()
    }

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        })
    }

    pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) => vec![s],
            Some(Value::Array(items)) => items
                .into_iter()
                .filter(|item| !item.is_null())
                .map(|item| match item {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            Some(other) => vec![other.to_string()],
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Every way an analysis request can end without a result
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Provider '{0}' is not available")]
    ProviderUnavailable(String),

    #[error("Provider '{provider}' call failed ({kind}): {message}")]
    ProviderCallFailed {
        provider: String,
        kind: ProviderFailureKind,
        message: String,
    },

    #[error("Provider '{provider}' returned no content")]
    EmptyResponse { provider: String },

    #[error("Provider response is not valid JSON: {detail}")]
    MalformedResponse { detail: String },

    #[error("Provider response is missing required keys: {}", missing.join(", "))]
    IncompleteResponse { missing: Vec<String> },

    #[error("No AI providers available")]
    NoProviderAvailable,

    #[error("All providers failed ({}); last error: {last}", attempted.join(", "))]
    AllProvidersFailed {
        attempted: Vec<String>,
        last: Box<AnalysisError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Quota/rate-limit classification of the error, looking through an
    /// exhausted fallback chain to its last attempt
    pub fn failure_kind(&self) -> Option<ProviderFailureKind> {
        match self {
            Self::ProviderCallFailed { kind, .. } => Some(*kind),
            Self::AllProvidersFailed { last, .. } => last.failure_kind(),
            _ => None,
        }
    }

    /// Short stable label, used for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation(ValidationError::EmptyText) => "empty_text",
            Self::Validation(ValidationError::TooLong { .. }) => "too_long",
            Self::ProviderUnavailable(_) => "provider_unavailable",
            Self::ProviderCallFailed { .. } => "provider_call_failed",
            Self::EmptyResponse { .. } => "empty_response",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::IncompleteResponse { .. } => "incomplete_response",
            Self::NoProviderAvailable => "no_provider_available",
            Self::AllProvidersFailed { .. } => "all_providers_failed",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_analysis() -> serde_json::Value {
        json!({
            "grammar": {
                "score": 8,
                "issues": ["Missing comma after introductory clause"],
                "suggestions": ["Add a comma after 'However'"]
            },
            "style": {
                "score": 7,
                "tone": "Formal and measured",
                "clarity": "Clear, though the second sentence runs long",
                "suggestions": ["Split the second sentence"]
            },
            "content": {
                "strengths": ["Concrete example"],
                "weaknesses": ["Conclusion is abrupt"],
                "suggestions": ["Close with a summary"]
            },
            "improved_version": "However, the results were clear."
        })
    }

    #[test]
    fn test_validate_accepts_bounds() {
        assert!(validate_input(Some("a")).is_ok());

        let exact = "x".repeat(MAX_TEXT_CHARS);
        assert!(validate_input(Some(&exact)).is_ok());
    }

    #[test]
    fn test_validate_rejects_too_long() {
        let over = "x".repeat(MAX_TEXT_CHARS + 1);
        assert_eq!(
            validate_input(Some(&over)),
            Err(ValidationError::TooLong {
                length: MAX_TEXT_CHARS + 1
            })
        );
    }

    #[test]
    fn test_validate_counts_characters_not_bytes() {
        let accented = "é".repeat(MAX_TEXT_CHARS);
        assert!(accented.len() > MAX_TEXT_CHARS);
        assert!(validate_input(Some(&accented)).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert_eq!(validate_input(None), Err(ValidationError::EmptyText));
        assert_eq!(validate_input(Some("")), Err(ValidationError::EmptyText));
        assert_eq!(validate_input(Some("  \n\t ")), Err(ValidationError::EmptyText));
    }

    #[test]
    fn test_preference_parsing() {
        assert_eq!("auto".parse::<ProviderPreference>().unwrap(), ProviderPreference::Auto);
        assert_eq!("AUTO".parse::<ProviderPreference>().unwrap(), ProviderPreference::Auto);
        assert_eq!("".parse::<ProviderPreference>().unwrap(), ProviderPreference::Auto);
        assert_eq!(
            "gemini".parse::<ProviderPreference>().unwrap(),
            ProviderPreference::Named("gemini".to_string())
        );
        assert_eq!(ProviderPreference::from(None), ProviderPreference::Auto);
    }

    #[test]
    fn test_request_keeps_original_text() {
        let request = AnalysisRequest::new(Some("  Hello there. "), ProviderPreference::Auto).unwrap();
        assert_eq!(request.text(), "  Hello there. ");
        assert_eq!(request.preference(), &ProviderPreference::Auto);
    }

    #[test]
    fn test_parse_full_response() {
        let raw = sample_analysis().to_string();
        let analysis = parse_and_validate(&raw).unwrap();

        assert_eq!(analysis.grammar.score, Some(8));
        assert_eq!(analysis.style.tone.as_deref(), Some("Formal and measured"));
        assert_eq!(analysis.content.weaknesses, vec!["Conclusion is abrupt"]);
        assert_eq!(analysis.improved_version, "However, the results were clear.");
    }

    #[test]
    fn test_serialized_analysis_parses_back_unchanged() {
        let analysis = parse_and_validate(&sample_analysis().to_string()).unwrap();
        let raw = serde_json::to_string(&analysis).unwrap();
        assert_eq!(parse_and_validate(&raw).unwrap(), analysis);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = parse_and_validate("Here is my feedback: the text is good.").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_rejects_missing_top_level_key() {
        let mut value = sample_analysis();
        value.as_object_mut().unwrap().remove("content");

        match parse_and_validate(&value.to_string()).unwrap_err() {
            AnalysisError::IncompleteResponse { missing } => {
                assert_eq!(missing, vec!["content".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_non_object_is_incomplete() {
        match parse_and_validate("[1, 2, 3]").unwrap_err() {
            AnalysisError::IncompleteResponse { missing } => assert_eq!(missing.len(), 4),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_tolerates_missing_nested_fields() {
        let raw = json!({
            "grammar": {},
            "style": { "tone": "casual" },
            "content": { "strengths": ["energetic"] },
            "improved_version": "Hi!"
        })
        .to_string();

        let analysis = parse_and_validate(&raw).unwrap();
        assert_eq!(analysis.grammar, GrammarFeedback::default());
        assert_eq!(analysis.style.score, None);
        assert!(analysis.content.suggestions.is_empty());
    }

    #[test]
    fn test_parse_coerces_loose_scores() {
        let mut value = sample_analysis();
        value["grammar"]["score"] = json!("9");
        value["style"]["score"] = json!("6/10");
        let analysis = parse_and_validate(&value.to_string()).unwrap();
        assert_eq!(analysis.grammar.score, Some(9));
        assert_eq!(analysis.style.score, Some(6));

        value["grammar"]["score"] = json!(14);
        value["style"]["score"] = json!("number from 1-10");
        let analysis = parse_and_validate(&value.to_string()).unwrap();
        assert_eq!(analysis.grammar.score, Some(10));
        assert_eq!(analysis.style.score, None);
    }

    #[test]
    fn test_parse_accepts_fenced_json() {
        let raw = format!("```json\n{}\n```", sample_analysis());
        assert!(parse_and_validate(&raw).is_ok());
    }

    #[test]
    fn test_parse_rejects_wrong_top_level_shape() {
        let mut value = sample_analysis();
        value["grammar"] = json!("pretty good");
        let err = parse_and_validate(&value.to_string()).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse { .. }));
    }

    #[test]
    fn test_failure_kind_looks_through_fallback_chain() {
        let err = AnalysisError::AllProvidersFailed {
            attempted: vec!["openai".into(), "gemini".into()],
            last: Box::new(AnalysisError::ProviderCallFailed {
                provider: "gemini".into(),
                kind: ProviderFailureKind::Quota,
                message: "quota".into(),
            }),
        };
        assert_eq!(err.failure_kind(), Some(ProviderFailureKind::Quota));
        assert_eq!(AnalysisError::NoProviderAvailable.failure_kind(), None);
    }
}
