//! Health check handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::models::format_timestamp;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub model_loaded: bool,
    pub version: String,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: format_timestamp(chrono::Utc::now()),
        model_loaded: state.predictor.is_some(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
