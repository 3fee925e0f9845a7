//! Rolling aggregates over the prediction log

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::models::format_timestamp;

/// Longest look-back accepted for stats and volume queries
pub const MAX_WINDOW_DAYS: i64 = 3650;
pub const MAX_WINDOW_HOURS: i64 = MAX_WINDOW_DAYS * 24;

/// Confidence summary for one predicted class
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ClassStats {
    pub prediction: String,
    pub count: i64,
    pub avg_confidence: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct HourlyVolume {
    pub hour: String,
    pub prediction_count: i64,
}

/// Per-class counts and confidence over the last `days` days, busiest class first
pub async fn prediction_stats(
    pool: &SqlitePool,
    days: i64,
    now: DateTime<Utc>,
) -> Result<Vec<ClassStats>, sqlx::Error> {
    let since = format_timestamp(now - Duration::days(days.clamp(0, MAX_WINDOW_DAYS)));

    sqlx::query_as::<_, ClassStats>(
        r#"
        SELECT
            prediction,
            COUNT(*) AS count,
            AVG(probability) AS avg_confidence,
            MIN(probability) AS min_confidence,
            MAX(probability) AS max_confidence
        FROM predictions
        WHERE timestamp > ?
        GROUP BY prediction
        ORDER BY count DESC, prediction
        "#
    )
    .bind(since)
    .fetch_all(pool)
    .await
}

/// Prediction counts bucketed by hour, oldest bucket first
pub async fn hourly_volume(
    pool: &SqlitePool,
    hours: i64,
    now: DateTime<Utc>,
) -> Result<Vec<HourlyVolume>, sqlx::Error> {
    let since = format_timestamp(now - Duration::hours(hours.clamp(0, MAX_WINDOW_HOURS)));

    sqlx::query_as::<_, HourlyVolume>(
        r#"
        SELECT
            strftime('%Y-%m-%d %H:00:00', timestamp) AS hour,
            COUNT(*) AS prediction_count
        FROM predictions
        WHERE timestamp > ?
        GROUP BY strftime('%Y-%m-%d %H:00:00', timestamp)
        ORDER BY hour
        "#
    )
    .bind(since)
    .fetch_all(pool)
    .await
}

/// Mean of the per-class average confidence; stands in for live accuracy
pub fn confidence_proxy(stats: &[ClassStats]) -> Option<f64> {
    if stats.is_empty() {
        return None;
    }
    Some(stats.iter().map(|s| s.avg_confidence).sum::<f64>() / stats.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::models::prediction::test_support::log_at;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_prediction_stats_groups_by_class() {
        let pool = memory_pool().await;
        let now = Utc::now();
        log_at(&pool, [5.1, 3.5, 1.4, 0.2], 0, 0.9, now - Duration::hours(1)).await;
        log_at(&pool, [5.0, 3.4, 1.5, 0.2], 0, 0.7, now - Duration::hours(2)).await;
        log_at(&pool, [6.7, 3.0, 5.2, 2.3], 2, 0.8, now - Duration::days(1)).await;
        // Outside the window
        log_at(&pool, [6.0, 2.9, 4.5, 1.5], 1, 0.6, now - Duration::days(10)).await;

        let stats = prediction_stats(&pool, 7, now).await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].prediction, "setosa");
        assert_eq!(stats[0].count, 2);
        assert!((stats[0].avg_confidence - 0.8).abs() < 1e-9);
        assert_eq!(stats[0].min_confidence, 0.7);
        assert_eq!(stats[0].max_confidence, 0.9);
        assert_eq!(stats[1].prediction, "virginica");
    }

    #[tokio::test]
    async fn test_hourly_volume_buckets() {
        let pool = memory_pool().await;
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        log_at(&pool, [5.1, 3.5, 1.4, 0.2], 0, 0.9, now - Duration::minutes(5)).await;
        log_at(&pool, [5.1, 3.5, 1.4, 0.2], 0, 0.9, now - Duration::minutes(20)).await;
        log_at(&pool, [5.1, 3.5, 1.4, 0.2], 0, 0.9, now - Duration::hours(2)).await;
        log_at(&pool, [5.1, 3.5, 1.4, 0.2], 0, 0.9, now - Duration::hours(30)).await;

        let volume = hourly_volume(&pool, 24, now).await.unwrap();
        assert_eq!(
            volume,
            vec![
                HourlyVolume { hour: "2024-05-01 10:00:00".into(), prediction_count: 1 },
                HourlyVolume { hour: "2024-05-01 12:00:00".into(), prediction_count: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn test_huge_windows_are_bounded() {
        let pool = memory_pool().await;
        let now = Utc::now();
        log_at(&pool, [5.1, 3.5, 1.4, 0.2], 0, 0.9, now - Duration::hours(1)).await;

        let stats = prediction_stats(&pool, 1_000_000_000, now).await.unwrap();
        assert_eq!(stats[0].count, 1);
        let volume = hourly_volume(&pool, i64::MAX, now).await.unwrap();
        assert_eq!(volume.len(), 1);
        assert!(prediction_stats(&pool, i64::MIN, now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_log() {
        let pool = memory_pool().await;
        assert!(prediction_stats(&pool, 7, Utc::now()).await.unwrap().is_empty());
        assert!(hourly_volume(&pool, 24, Utc::now()).await.unwrap().is_empty());
    }

    #[test]
    fn test_confidence_proxy() {
        assert_eq!(confidence_proxy(&[]), None);
        let stats = vec![
            ClassStats { prediction: "setosa".into(), count: 3, avg_confidence: 0.9, min_confidence: 0.8, max_confidence: 1.0 },
            ClassStats { prediction: "virginica".into(), count: 1, avg_confidence: 0.7, min_confidence: 0.7, max_confidence: 0.7 },
        ];
        assert!((confidence_proxy(&stats).unwrap() - 0.8).abs() < 1e-9);
    }
}
