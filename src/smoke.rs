//! End-to-end check of a running API

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::handlers::health::HealthResponse;
use crate::models::{HistoryResponse, IrisFeatures, PredictionResponse};

/// One typical flower per class
pub const CANONICAL_SAMPLES: [(&str, [f64; 4]); 3] = [
    ("setosa", [5.1, 3.5, 1.4, 0.2]),
    ("versicolor", [6.0, 2.9, 4.5, 1.5]),
    ("virginica", [7.7, 3.0, 6.1, 2.3]),
];

#[derive(Debug, thiserror::Error)]
pub enum SmokeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned {status}")]
    UnexpectedStatus { endpoint: String, status: StatusCode },

    #[error("model is not loaded")]
    ModelNotLoaded,

    #[error("expected {expected}, got {actual}")]
    UnexpectedLabel { expected: String, actual: String },
}

#[derive(Debug, Serialize)]
pub struct SmokeReport {
    pub base_url: String,
    pub predictions: Vec<PredictionResponse>,
    pub history_count: usize,
    pub metrics_bytes: usize,
}

fn check_status(endpoint: &str, status: StatusCode) -> Result<(), SmokeError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(SmokeError::UnexpectedStatus { endpoint: endpoint.to_string(), status })
    }
}

/// Hit every public endpoint; the first failure aborts the run
pub async fn run(base_url: &str) -> Result<SmokeReport, SmokeError> {
    let base = base_url.trim_end_matches('/');
    let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

    let response = client.get(format!("{base}/health")).send().await?;
    check_status("/health", response.status())?;
    let health: HealthResponse = response.json().await?;
    if !health.model_loaded {
        return Err(SmokeError::ModelNotLoaded);
    }
    tracing::info!("Health check passed");

    let mut predictions = Vec::with_capacity(CANONICAL_SAMPLES.len());
    for (expected, values) in CANONICAL_SAMPLES {
        let response = client
            .post(format!("{base}/predict"))
            .json(&IrisFeatures::from(values))
            .send()
            .await?;
        check_status("/predict", response.status())?;
        let prediction: PredictionResponse = response.json().await?;
        if prediction.prediction != expected {
            return Err(SmokeError::UnexpectedLabel {
                expected: expected.to_string(),
                actual: prediction.prediction,
            });
        }
        tracing::info!(
            "Prediction for {:?}: {} ({:.4})",
            values,
            prediction.prediction,
            prediction.probability
        );
        predictions.push(prediction);
    }

    let response = client
        .get(format!("{base}/predictions/history"))
        .query(&[("limit", 10)])
        .send()
        .await?;
    check_status("/predictions/history", response.status())?;
    let history: HistoryResponse = response.json().await?;

    let response = client.get(format!("{base}/metrics")).send().await?;
    check_status("/metrics", response.status())?;
    let metrics = response.text().await?;

    tracing::info!("All smoke tests passed");
    Ok(SmokeReport {
        base_url: base.to_string(),
        predictions,
        history_count: history.count,
        metrics_bytes: metrics.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::db::memory_pool;
    use crate::inference::test_support::fitted_predictor;
    use crate::monitoring::{ApiMetrics, PerformanceMonitor};
    use crate::{create_router, AppState, Config};

    async fn serve(with_model: bool) -> String {
        let state = AppState {
            pool: memory_pool().await,
            config: Config::default(),
            predictor: with_model.then(|| Arc::new(fitted_predictor())),
            metrics: Arc::new(ApiMetrics::new().unwrap()),
            performance: Arc::new(PerformanceMonitor::new()),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_smoke_against_live_server() {
        let url = serve(true).await;
        let report = run(&url).await.unwrap();

        assert_eq!(report.predictions.len(), 3);
        assert_eq!(report.history_count, 3);
        assert!(report.metrics_bytes > 0);
    }

    #[tokio::test]
    async fn test_smoke_fails_without_model() {
        let url = serve(false).await;
        assert!(matches!(run(&url).await, Err(SmokeError::ModelNotLoaded)));
    }

    #[tokio::test]
    async fn test_smoke_fails_on_unreachable_server() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        assert!(matches!(run(&url).await, Err(SmokeError::Http(_))));
    }
}
