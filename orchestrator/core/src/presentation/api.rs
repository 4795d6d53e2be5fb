// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    handler::HandlerWithoutStateExt,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{debug, error, warn};

use crate::application::AnalysisOrchestrator;
use crate::domain::analysis::{
    AnalysisError, CanonicalAnalysis, ProviderDescriptor, ProviderPreference, ValidationError,
};
use crate::domain::llm::ProviderFailureKind;
use crate::domain::service_config::ServerConfig;

use super::rate_limit::{rate_limit_middleware, IpRateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
}

/// Build the HTTP router: API routes, CORS, body limit, rate limiting, and
/// either static assets or a JSON 404 for everything else
pub fn app(orchestrator: Arc<AnalysisOrchestrator>, server: &ServerConfig) -> anyhow::Result<Router> {
    let state = AppState { orchestrator };

    // Unknown /api paths hit the nested fallback, so they are rate limited too
    let mut api = Router::new()
        .route("/analyze", post(analyze_handler))
        .route("/providers", get(providers_handler))
        .route("/health", get(health_handler))
        .fallback(not_found)
        .with_state(state);

    if server.rate_limit.enabled {
        let limiter = Arc::new(IpRateLimiter::new(
            server.rate_limit.max_requests,
            Duration::from_secs(server.rate_limit.window_secs),
        )?);
        api = api.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
    }

    let router = Router::new().nest("/api", api);

    let router = match &server.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir).fallback(not_found.into_service())),
        None => router.fallback(not_found),
    };

    Ok(router
        .layer(DefaultBodyLimit::max(server.body_limit_bytes))
        .layer(cors_layer(&server.cors_origins)?)
        .layer(TraceLayer::new_for_http()))
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return Ok(layer.allow_origin(AllowOrigin::any()));
    }

    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).map_err(|_| anyhow::anyhow!("Invalid CORS origin: {}", o))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true))
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
    #[serde(default)]
    pub text: Option<serde_json::Value>,
    #[serde(default)]
    pub provider: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub analysis: CanonicalAnalysis,
    pub provider: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProvidersResponse {
    pub success: bool,
    pub providers: Vec<ProviderDescriptor>,
    pub default: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// HTTP face of an [`AnalysisError`]
#[derive(Debug)]
pub enum ApiError {
    Analysis(AnalysisError),
    PayloadTooLarge,
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        Self::Analysis(err)
    }
}

const UNAVAILABLE_MESSAGE: &str = "AI service temporarily unavailable";
const INTERNAL_MESSAGE: &str = "Internal server error";

/// Status code and client-safe message. Provider text never leaves the server.
pub fn error_status(err: &AnalysisError) -> (StatusCode, String) {
    let throttled = match err.failure_kind() {
        Some(ProviderFailureKind::Quota) => {
            Some((StatusCode::TOO_MANY_REQUESTS, "API quota exceeded"))
        }
        Some(ProviderFailureKind::RateLimit) => {
            Some((StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded"))
        }
        _ => None,
    };
    if let Some((status, message)) = throttled {
        return (status, message.to_string());
    }

    match err {
        AnalysisError::Validation(v) => (StatusCode::BAD_REQUEST, v.to_string()),
        AnalysisError::ProviderUnavailable(_)
        | AnalysisError::NoProviderAvailable
        | AnalysisError::AllProvidersFailed { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_MESSAGE.to_string())
        }
        AnalysisError::ProviderCallFailed { .. }
        | AnalysisError::EmptyResponse { .. }
        | AnalysisError::MalformedResponse { .. }
        | AnalysisError::IncompleteResponse { .. }
        | AnalysisError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Analysis(err) => {
                let (status, message) = error_status(err);
                let kind = err.failure_kind();
                if status.is_server_error() {
                    error!(error = err.label(), ?kind, status = status.as_u16(), "Analysis failed");
                } else {
                    warn!(error = err.label(), ?kind, status = status.as_u16(), "Analysis rejected");
                }
                debug!("Analysis error detail: {}", err);
                (status, message)
            }
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large".to_string(),
            ),
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn analyze_handler(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(ApiError::PayloadTooLarge);
        }
        Err(rejection) => {
            debug!("Unreadable analyze body: {}", rejection.body_text());
            return Err(AnalysisError::Validation(ValidationError::EmptyText).into());
        }
    };

    let text = body.text.as_ref().and_then(serde_json::Value::as_str);
    let preference =
        ProviderPreference::from(body.provider.as_ref().and_then(serde_json::Value::as_str));

    let outcome = state.orchestrator.analyze_text(text, preference).await?;

    Ok(Json(AnalyzeResponse {
        success: true,
        analysis: outcome.analysis,
        provider: outcome.used_provider,
    }))
}

async fn providers_handler(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let registry = state.orchestrator.registry();

    Json(ProvidersResponse {
        success: true,
        providers: registry.list_available(),
        default: registry.default_provider().map(str::to_string),
    })
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

async fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new("Endpoint not found")))
}
