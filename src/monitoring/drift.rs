//! Mean-shift drift check between a recent and a baseline window

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::data::FEATURE_COLUMNS;
use crate::models::format_timestamp;

pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.1;

const RECENT_HOURS: i64 = 24;
const BASELINE_START_DAYS: i64 = 30;
const BASELINE_END_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    Success,
    InsufficientData,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriftReport {
    pub status: DriftStatus,
    pub drift_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_changes: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_samples: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_samples: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DriftReport {
    fn without_drift(status: DriftStatus) -> Self {
        Self {
            status,
            drift_detected: false,
            feature_changes: None,
            threshold: None,
            recent_samples: None,
            baseline_samples: None,
            error: None,
        }
    }

    pub fn insufficient_data() -> Self {
        Self::without_drift(DriftStatus::InsufficientData)
    }

    pub fn failed(err: impl ToString) -> Self {
        Self { error: Some(err.to_string()), ..Self::without_drift(DriftStatus::Error) }
    }
}

#[derive(Debug, FromRow)]
struct WindowMeans {
    samples: i64,
    sepal_length: Option<f64>,
    sepal_width: Option<f64>,
    petal_length: Option<f64>,
    petal_width: Option<f64>,
}

impl WindowMeans {
    fn means(&self) -> [f64; 4] {
        [self.sepal_length, self.sepal_width, self.petal_length, self.petal_width]
            .map(|m| m.unwrap_or(0.0))
    }
}

const WINDOW_MEANS_SQL: &str = r#"
    SELECT
        COUNT(*) AS samples,
        AVG(sepal_length) AS sepal_length,
        AVG(sepal_width) AS sepal_width,
        AVG(petal_length) AS petal_length,
        AVG(petal_width) AS petal_width
    FROM predictions
"#;

async fn recent_window(pool: &SqlitePool, now: DateTime<Utc>) -> Result<WindowMeans, sqlx::Error> {
    let sql = format!("{} WHERE timestamp > ?", WINDOW_MEANS_SQL);
    sqlx::query_as::<_, WindowMeans>(&sql)
        .bind(format_timestamp(now - Duration::hours(RECENT_HOURS)))
        .fetch_one(pool)
        .await
}

async fn baseline_window(pool: &SqlitePool, now: DateTime<Utc>) -> Result<WindowMeans, sqlx::Error> {
    let sql = format!("{} WHERE timestamp BETWEEN ? AND ?", WINDOW_MEANS_SQL);
    sqlx::query_as::<_, WindowMeans>(&sql)
        .bind(format_timestamp(now - Duration::days(BASELINE_START_DAYS)))
        .bind(format_timestamp(now - Duration::days(BASELINE_END_DAYS)))
        .fetch_one(pool)
        .await
}

/// `|recent - baseline| / baseline`, 0 where the baseline mean is 0
pub fn relative_change(recent: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        return 0.0;
    }
    ((recent - baseline) / baseline).abs()
}

/// Compare the last 24 hours against the window 30 to 7 days back
pub async fn try_check_drift(
    pool: &SqlitePool,
    threshold: f64,
    now: DateTime<Utc>,
) -> Result<DriftReport, sqlx::Error> {
    let recent = recent_window(pool, now).await?;
    let baseline = baseline_window(pool, now).await?;

    if recent.samples == 0 || baseline.samples == 0 {
        return Ok(DriftReport::insufficient_data());
    }

    let feature_changes: BTreeMap<String, f64> = FEATURE_COLUMNS
        .iter()
        .zip(recent.means().into_iter().zip(baseline.means()))
        .map(|(name, (r, b))| (name.to_string(), relative_change(r, b)))
        .collect();
    let drift_detected = feature_changes.values().any(|change| *change > threshold);

    Ok(DriftReport {
        status: DriftStatus::Success,
        drift_detected,
        feature_changes: Some(feature_changes),
        threshold: Some(threshold),
        recent_samples: Some(recent.samples),
        baseline_samples: Some(baseline.samples),
        error: None,
    })
}

/// Like [`try_check_drift`] but folds failures into an `error` report
pub async fn check_drift(pool: &SqlitePool, threshold: f64, now: DateTime<Utc>) -> DriftReport {
    match try_check_drift(pool, threshold, now).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Error checking data drift: {}", e);
            DriftReport::failed(e)
        }
    }
}
