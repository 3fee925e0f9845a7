//! Monitoring endpoints over the prediction log

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::monitoring::stats::{MAX_WINDOW_DAYS, MAX_WINDOW_HOURS};
use crate::monitoring::{
    check_drift, hourly_volume, prediction_stats, ClassStats, DriftReport, HealthStatus,
    HourlyVolume,
};
use crate::{AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    7
}

#[derive(Debug, Deserialize)]
pub struct VolumeQuery {
    #[serde(default = "default_hours")]
    pub hours: i64,
}

fn default_hours() -> i64 {
    24
}

#[derive(Debug, Deserialize)]
pub struct DriftQuery {
    pub threshold: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub days: i64,
    pub stats: Vec<ClassStats>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VolumeResponse {
    pub hours: i64,
    pub volume: Vec<HourlyVolume>,
}

pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> AppResult<Json<StatsResponse>> {
    let days = query.days.clamp(0, MAX_WINDOW_DAYS);
    let stats = prediction_stats(&state.pool, days, Utc::now()).await?;
    Ok(Json(StatsResponse { days, stats }))
}

pub async fn volume(
    State(state): State<AppState>,
    Query(query): Query<VolumeQuery>,
) -> AppResult<Json<VolumeResponse>> {
    let hours = query.hours.clamp(0, MAX_WINDOW_HOURS);
    let volume = hourly_volume(&state.pool, hours, Utc::now()).await?;
    Ok(Json(VolumeResponse { hours, volume }))
}

pub async fn drift(
    State(state): State<AppState>,
    Query(query): Query<DriftQuery>,
) -> Json<DriftReport> {
    let threshold = query.threshold.unwrap_or(state.config.drift_threshold);
    Json(check_drift(&state.pool, threshold, Utc::now()).await)
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.performance.health_status())
}
