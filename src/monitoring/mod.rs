//! Prediction log analytics, API health counters and Prometheus export

pub mod background;
pub mod drift;
pub mod metrics;
pub mod performance;
pub mod stats;

pub use drift::{check_drift, DriftReport, DriftStatus};
pub use metrics::ApiMetrics;
pub use performance::{HealthStatus, PerformanceMonitor};
pub use stats::{hourly_volume, prediction_stats, ClassStats, HourlyVolume};
