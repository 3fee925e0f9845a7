//! Request accounting for the performance monitor and the HTTP counters

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AppState;

/// Count every request; 5xx responses also count as errors
pub async fn track_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    let success = !response.status().is_server_error();

    state.performance.log_request(success);
    state.metrics.observe_request(success);

    response
}
