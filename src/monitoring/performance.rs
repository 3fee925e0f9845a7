//! Request/error counters behind `/monitoring/health`

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Error rate at or above which the API reports itself degraded
pub const DEGRADED_ERROR_RATE: f64 = 0.05;

#[derive(Debug)]
pub struct PerformanceMonitor {
    started: Instant,
    started_at: DateTime<Utc>,
    requests: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: f64,
    pub total_requests: u64,
    pub error_count: u64,
    pub error_rate: f64,
    pub status: &'static str,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn log_request(&self, success: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn health_status(&self) -> HealthStatus {
        let total_requests = self.requests.load(Ordering::Relaxed);
        let error_count = self.errors.load(Ordering::Relaxed);
        let error_rate = error_count as f64 / total_requests.max(1) as f64;

        HealthStatus {
            started_at: self.started_at,
            uptime_seconds: self.started.elapsed().as_secs_f64(),
            total_requests,
            error_count,
            error_rate,
            status: if error_rate < DEGRADED_ERROR_RATE { "healthy" } else { "degraded" },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_monitor_is_healthy() {
        let status = PerformanceMonitor::new().health_status();
        assert_eq!(status.total_requests, 0);
        assert_eq!(status.error_rate, 0.0);
        assert_eq!(status.status, "healthy");
    }

    #[test]
    fn test_degrades_at_five_percent() {
        let monitor = PerformanceMonitor::new();
        for _ in 0..19 {
            monitor.log_request(true);
        }
        monitor.log_request(false);

        let status = monitor.health_status();
        assert_eq!(status.total_requests, 20);
        assert_eq!(status.error_count, 1);
        assert_eq!(status.error_rate, 0.05);
        assert_eq!(status.status, "degraded");
    }

    #[test]
    fn test_low_error_rate_stays_healthy() {
        let monitor = PerformanceMonitor::new();
        for _ in 0..99 {
            monitor.log_request(true);
        }
        monitor.log_request(false);
        assert_eq!(monitor.health_status().status, "healthy");
    }
}
