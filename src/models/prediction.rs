//! Prediction log model

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

use super::features::IrisFeatures;
use crate::inference::Prediction;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Text form stored in the log; sorts lexicographically in time order
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PredictionRecord {
    pub id: i64,
    pub timestamp: String,
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
    pub prediction: String,
    pub probability: f64,
    pub all_probabilities: Json<BTreeMap<String, f64>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryFilter {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<PredictionRecord>,
    pub count: usize,
}

pub const DEFAULT_HISTORY_LIMIT: i64 = 100;
pub const MAX_HISTORY_LIMIT: i64 = 1000;

impl HistoryFilter {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(0, MAX_HISTORY_LIMIT)
    }
}

impl PredictionRecord {
    /// Append one prediction; rows are never updated afterwards
    pub async fn insert(
        pool: &SqlitePool,
        features: &IrisFeatures,
        prediction: &Prediction,
        timestamp: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO predictions
                (timestamp, sepal_length, sepal_width, petal_length, petal_width,
                 prediction, probability, all_probabilities)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(format_timestamp(timestamp))
        .bind(features.sepal_length)
        .bind(features.sepal_width)
        .bind(features.petal_length)
        .bind(features.petal_width)
        .bind(prediction.label)
        .bind(prediction.probability)
        .bind(Json(&prediction.all_probabilities))
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent first
    pub async fn recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PredictionRecord>(
            r#"
            SELECT * FROM predictions
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM predictions")
            .fetch_one(pool)
            .await
    }

    pub fn features(&self) -> IrisFeatures {
        IrisFeatures::from([self.sepal_length, self.sepal_width, self.petal_length, self.petal_width])
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::data::TARGET_NAMES;

    /// Log a synthetic prediction at a fixed time
    pub async fn log_at(pool: &SqlitePool, features: [f64; 4], class: usize, confidence: f64, at: DateTime<Utc>) -> i64 {
        let rest = (1.0 - confidence) / 2.0;
        let all_probabilities = TARGET_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), if i == class { confidence } else { rest }))
            .collect();
        let prediction = Prediction {
            class_index: class,
            label: TARGET_NAMES[class],
            probability: confidence,
            all_probabilities,
        };
        PredictionRecord::insert(pool, &IrisFeatures::from(features), &prediction, at)
            .await
            .expect("insert prediction")
    }
}
