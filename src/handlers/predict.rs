//! Prediction handler

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use validator::Validate;

use crate::models::{format_timestamp, IrisFeatures, PredictionRecord, PredictionResponse};
use crate::{AppError, AppResult, AppState};

/// Score one flower, append it to the log and update the counters
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<IrisFeatures>, JsonRejection>,
) -> AppResult<Json<PredictionResponse>> {
    let Json(features) = payload?;
    features.validate()?;

    let predictor = state.predictor.as_ref().ok_or(AppError::ModelNotLoaded)?;

    let timer = Instant::now();
    let prediction = predictor
        .predict(features.as_array())
        .map_err(|e| AppError::PredictionError(e.to_string()))?;
    let timestamp = Utc::now();

    // The log is best effort; the caller still gets its prediction
    match PredictionRecord::insert(&state.pool, &features, &prediction, timestamp).await {
        Ok(id) => tracing::debug!(id, "Prediction logged: {}", prediction.label),
        Err(e) => tracing::error!("Error logging prediction: {}", e),
    }

    state.metrics.observe_prediction(
        prediction.label,
        prediction.probability,
        timer.elapsed().as_secs_f64(),
    );

    tracing::info!(
        "Prediction made: {} (confidence: {:.4})",
        prediction.label,
        prediction.probability
    );

    Ok(Json(PredictionResponse {
        prediction: prediction.label.to_string(),
        probability: prediction.probability,
        all_probabilities: prediction.all_probabilities,
        timestamp: format_timestamp(timestamp),
    }))
}
