//! Periodic monitoring pass run alongside the API

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;

use super::drift::{try_check_drift, DriftReport};
use super::metrics::ApiMetrics;
use super::stats::{confidence_proxy, prediction_stats};
use crate::config::Config;

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub drift_threshold: f64,
    pub interval: Duration,
    pub retry: Duration,
}

impl From<&Config> for MonitorSettings {
    fn from(config: &Config) -> Self {
        Self {
            drift_threshold: config.drift_threshold,
            interval: Duration::from_secs(config.monitor_interval_secs),
            retry: Duration::from_secs(config.monitor_retry_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorPass {
    pub accuracy_proxy: Option<f64>,
    pub drift: DriftReport,
}

/// One pass: refresh the accuracy gauge from the last day and the drift gauges
pub async fn run_once(
    pool: &SqlitePool,
    metrics: &ApiMetrics,
    drift_threshold: f64,
    now: DateTime<Utc>,
) -> Result<MonitorPass, sqlx::Error> {
    let stats = prediction_stats(pool, 1, now).await?;
    let accuracy_proxy = confidence_proxy(&stats);
    if let Some(value) = accuracy_proxy {
        metrics.model_accuracy.set(value);
    }

    let drift = try_check_drift(pool, drift_threshold, now).await?;
    metrics.record_drift(&drift);
    if drift.drift_detected {
        tracing::warn!(changes = ?drift.feature_changes, "Data drift detected!");
    }

    Ok(MonitorPass { accuracy_proxy, drift })
}

/// Runs until the runtime shuts down; failures are logged and retried
pub fn spawn(pool: SqlitePool, metrics: Arc<ApiMetrics>, settings: MonitorSettings) -> JoinHandle<()> {
    tracing::info!(
        interval_secs = settings.interval.as_secs(),
        "Background monitoring started"
    );

    tokio::spawn(async move {
        loop {
            let wait = match run_once(&pool, &metrics, settings.drift_threshold, Utc::now()).await {
                Ok(pass) => {
                    tracing::debug!(accuracy_proxy = ?pass.accuracy_proxy, status = ?pass.drift.status, "Monitoring pass complete");
                    settings.interval
                }
                Err(e) => {
                    tracing::error!("Error in background monitoring: {}", e);
                    settings.retry
                }
            };
            tokio::time::sleep(wait).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::models::prediction::test_support::log_at;
    use crate::monitoring::drift::DriftStatus;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn test_run_once_updates_gauges() {
        let pool = memory_pool().await;
        let metrics = ApiMetrics::new().unwrap();
        let now = Utc::now();
        log_at(&pool, [5.0, 3.0, 6.0, 2.0], 2, 0.8, now - ChronoDuration::hours(1)).await;
        log_at(&pool, [5.0, 3.0, 1.5, 0.2], 0, 1.0, now - ChronoDuration::hours(3)).await;
        log_at(&pool, [5.0, 3.0, 1.5, 0.2], 0, 0.9, now - ChronoDuration::days(12)).await;

        let pass = run_once(&pool, &metrics, 0.1, now).await.unwrap();

        assert!((pass.accuracy_proxy.unwrap() - 0.9).abs() < 1e-9);
        assert!((metrics.model_accuracy.get() - 0.9).abs() < 1e-9);
        assert_eq!(pass.drift.status, DriftStatus::Success);
        assert!(pass.drift.drift_detected);
        assert_eq!(metrics.drift_detected.get(), 1);
    }

    #[tokio::test]
    async fn test_run_once_fails_without_schema() {
        let pool = crate::db::create_pool("sqlite::memory:").await.unwrap();
        let metrics = ApiMetrics::new().unwrap();
        assert!(run_once(&pool, &metrics, 0.1, Utc::now()).await.is_err());
    }

    #[test]
    fn test_settings_from_config() {
        let settings = MonitorSettings::from(&Config::default());
        assert_eq!(settings.interval, Duration::from_secs(300));
        assert_eq!(settings.retry, Duration::from_secs(60));
        assert_eq!(settings.drift_threshold, 0.1);
    }
}
