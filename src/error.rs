//! Error handling

use axum::{
    extract::rejection::JsonRejection,
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised by the offline stages (data, training, tracking, model loading)
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Model not fitted: {0}")]
    NotFitted(&'static str),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

#[derive(Debug)]
pub enum AppError {
    // Resource errors
    NotFound(String),

    // Validation errors
    ValidationError(String),
    BadRequestBody(JsonRejection),

    // Serving errors
    ModelNotLoaded,
    PredictionError(String),

    // Database errors
    DatabaseError(String),

    // Generic errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::ValidationError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::BadRequestBody(rejection) => (rejection.status(), rejection.body_text()),
            AppError::ModelNotLoaded => (StatusCode::SERVICE_UNAVAILABLE, "Model not loaded".to_string()),
            AppError::PredictionError(msg) => {
                tracing::error!("Error making prediction: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Prediction error: {}", msg))
            }
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred".to_string())
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequestBody(rejection)
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Database(e) => AppError::DatabaseError(e.to_string()),
            PipelineError::NotFound(msg) => AppError::NotFound(msg),
            other => AppError::PredictionError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::ModelNotLoaded.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::ValidationError("bad".into()).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::DatabaseError("locked".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_pipeline_error_mapping() {
        let err: AppError = PipelineError::ShapeMismatch { expected: 4, actual: 3 }.into();
        assert!(matches!(err, AppError::PredictionError(_)));

        let err: AppError = PipelineError::NotFound("models/x.json".into()).into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_json_rejection_keeps_status_and_json_body() {
        use axum::body::{to_bytes, Body};
        use axum::extract::FromRequest;
        use axum::http::{header, Request};

        let request = Request::post("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"sepal_length": 5.1}"#))
            .unwrap();
        let rejection = Json::<crate::models::IrisFeatures>::from_request(request, &())
            .await
            .unwrap_err();

        let response = AppError::from(rejection).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], 422);
        assert!(body["error"].as_str().unwrap().contains("sepal_width"));
    }
}
