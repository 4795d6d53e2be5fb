// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0

//! HTTP service startup and graceful shutdown

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use quill_core::{
    application::AnalysisOrchestrator,
    domain::service_config::ServiceConfigManifest,
    infrastructure::llm::ProviderRegistry,
    presentation::api,
};

pub async fn start_server(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let manifest =
        ServiceConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    manifest
        .validate()
        .context("Configuration validation failed")?;

    info!("Configuration loaded: {}", manifest.metadata.name);

    let mut config = manifest.spec;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    if let Some(metrics_port) = config.observability.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener((Ipv4Addr::UNSPECIFIED, metrics_port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics on port {}", metrics_port);
    }

    let registry =
        ProviderRegistry::from_config(&config).context("Failed to initialize LLM providers")?;

    let available = registry.provider_ids();
    if available.is_empty() {
        anyhow::bail!(
            "No AI provider is available. Set OPENAI_API_KEY or GEMINI_API_KEY, \
             or configure a provider with credentials."
        );
    }
    info!("Available providers: {}", available.join(", "));

    if config.server.static_dir.is_none() {
        warn!("No static_dir configured; only the /api routes are served");
    }

    let orchestrator = Arc::new(AnalysisOrchestrator::new(Arc::new(registry)));
    let app = api::app(orchestrator, &config.server).context("Failed to build HTTP router")?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Quill listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    info!("Quill stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
