//! Prediction history handler

use axum::{
    extract::{Query, State},
    Json,
};

use crate::models::{HistoryFilter, HistoryResponse, PredictionRecord};
use crate::{AppResult, AppState};

/// Most recent predictions first
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<HistoryFilter>,
) -> AppResult<Json<HistoryResponse>> {
    let history = PredictionRecord::recent(&state.pool, filter.effective_limit()).await?;

    Ok(Json(HistoryResponse {
        count: history.len(),
        history,
    }))
}
