//! Prometheus scrape endpoint

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::monitoring::metrics::CONTENT_TYPE;
use crate::{AppError, AppResult, AppState};

pub async fn export(State(state): State<AppState>) -> AppResult<Response> {
    let body = state
        .metrics
        .encode()
        .map_err(|e| AppError::InternalError(format!("metrics encode error: {}", e)))?;

    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response())
}
