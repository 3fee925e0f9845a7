//! Service index

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct IndexResponse {
    message: &'static str,
    version: &'static str,
    health: &'static str,
    metrics: &'static str,
}

pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "Iris Classification API",
        version: env!("CARGO_PKG_VERSION"),
        health: "/health",
        metrics: "/metrics",
    })
}
