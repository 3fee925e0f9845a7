//! Iris MLOps pipeline
//!
//! Trains a few classifiers on the Iris dataset, tracks the runs in a local
//! file-backed experiment store, registers the best model and serves it
//! over HTTP with a prediction log and basic monitoring.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        IRIS MLOPS                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  dataset ─► processor ─► trainer ─► tracker / registry       │
//! │                              │                               │
//! │                              ▼                               │
//! │                   best_model_model.json + scaler.json        │
//! │                              │                               │
//! │  ┌───────────┐   ┌───────────▼──────────┐   ┌─────────────┐  │
//! │  │ Background│   │  API (Axum)          │   │ Prometheus  │  │
//! │  │ monitor   │◄──┤  /predict /metrics … ├──►│ registry    │  │
//! │  └─────┬─────┘   └───────────┬──────────┘   └─────────────┘  │
//! │        └──────────────┬──────┘                               │
//! │                       ▼                                      │
//! │                ┌─────────────┐                               │
//! │                │   SQLite    │                               │
//! │                └─────────────┘                               │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod data;
pub mod db;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod middleware;
pub mod ml;
pub mod models;
pub mod monitoring;
pub mod smoke;
pub mod tracking;
pub mod training;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::Config;
pub use error::{AppError, AppResult, PipelineError, PipelineResult};

use inference::Predictor;
use monitoring::{ApiMetrics, PerformanceMonitor};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub config: Config,
    /// `None` when no trained model was found at startup
    pub predictor: Option<Arc<Predictor>>,
    pub metrics: Arc<ApiMetrics>,
    pub performance: Arc<PerformanceMonitor>,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/", get(handlers::root::index))
        .route("/health", get(handlers::health::check))
        .route("/predict", post(handlers::predict::predict))
        .route("/metrics", get(handlers::metrics::export))
        .route("/predictions/history", get(handlers::history::list));

    let monitoring_routes = Router::new()
        .route("/monitoring/stats", get(handlers::monitoring::stats))
        .route("/monitoring/volume", get(handlers::monitoring::volume))
        .route("/monitoring/drift", get(handlers::monitoring::drift))
        .route("/monitoring/health", get(handlers::monitoring::health));

    Router::new()
        .merge(api_routes)
        .merge(monitoring_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::tracking::track_requests,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
