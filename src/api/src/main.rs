//! xG Inference API
//!
//! REST API and CLI for expected-goals predictions and precomputed heatmaps.

mod cli;
mod config;
mod error;
mod features;
mod heatmap;
mod model;
mod pitch;
mod registry;
mod routes;
mod selector;
mod service;
mod types;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::heatmap::HeatmapData;
use crate::registry::create_shared_registry;
use crate::routes::AppState;
use crate::service::PredictionService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stderr keeps CLI output on stdout clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xg_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Serve { host, port } => run_server(host, port).await,
        Commands::Predict {
            input,
            format,
            models,
        } => cli::run_predict(input, format, models),
        Commands::Heatmaps {
            output,
            resolution,
            models,
        } => tokio::task::spawn_blocking(move || cli::run_heatmaps(output, resolution, models))
            .await?,
        Commands::Models { models } => cli::run_models(models),
    }
}

/// Run the API server.
async fn run_server(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    // Load configuration
    let mut config = AppConfig::load()?;

    // Override with CLI args
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("Models directory: {}", config.models.dir);

    // Load models
    let registry = create_shared_registry(&config.models.dir)?;
    if registry.is_empty() {
        tracing::warn!("No model variants loaded; only penalty predictions will succeed");
    } else {
        tracing::info!(
            "Loaded {} model variant(s): {}",
            registry.len(),
            registry.names().collect::<Vec<_>>().join(", ")
        );
    }

    // Load precomputed heatmaps
    let heatmaps = load_heatmaps(&config.heatmaps.path);

    // Create application state
    let cors = cors_layer(&config.server.cors_origins)?;
    let state = Arc::new(AppState {
        service: PredictionService::new(registry),
        heatmaps,
        config: config.clone(),
    });

    // Build router
    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/models", get(routes::model_info))
        .route("/redshaw-xg/api/predict", post(routes::predict))
        .route("/redshaw-xg/api/predict/grid", get(routes::predict_grid))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Start server
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn load_heatmaps(path: &str) -> Option<HeatmapData> {
    if !Path::new(path).exists() {
        tracing::warn!("Heatmap file {} not found; grid endpoint disabled", path);
        return None;
    }
    match HeatmapData::from_file(path) {
        Ok(data) => {
            tracing::info!("Heatmaps loaded from {}", path);
            Some(data)
        }
        Err(e) => {
            tracing::warn!("Failed to load heatmaps: {:#}", e);
            None
        }
    }
}

/// Permissive when no origins are configured.
fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin '{}'", o))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]))
}
