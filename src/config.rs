//! Configuration module

use std::env;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite URL of the prediction log
    pub database_url: String,

    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Processed arrays and fitted scaler
    pub data_dir: PathBuf,

    /// Saved best model
    pub models_dir: PathBuf,

    /// Log files (api.log, predictions.db)
    pub log_dir: PathBuf,

    /// Root of the experiment tracker
    pub tracking_dir: PathBuf,

    /// Experiment name used by the trainer
    pub experiment_name: String,

    /// Model loaded by the API at startup
    pub model_path: PathBuf,

    /// Scaler loaded by the API at startup
    pub scaler_path: PathBuf,

    /// Relative mean change that flags drift
    pub drift_threshold: f64,

    /// Background monitor period in seconds
    pub monitor_interval_secs: u64,

    /// Delay after a failed monitor pass in seconds
    pub monitor_retry_secs: u64,

    /// Held-out fraction for the train/test split
    pub test_size: f64,

    /// Seed for the split and the classifiers
    pub random_state: u64,

    /// Environment (development, production)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://logs/predictions.db".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: PathBuf::from("data"),
            models_dir: PathBuf::from("models"),
            log_dir: PathBuf::from("logs"),
            tracking_dir: PathBuf::from("mlruns"),
            experiment_name: "iris_classification".to_string(),
            model_path: PathBuf::from("models/best_model_model.json"),
            scaler_path: PathBuf::from("data/scaler.json"),
            drift_threshold: crate::monitoring::drift::DEFAULT_DRIFT_THRESHOLD,
            monitor_interval_secs: 300,
            monitor_retry_secs: 60,
            test_size: 0.2,
            random_state: 42,
            environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),

            host: env::var("HOST").unwrap_or(defaults.host),

            port: parse_var("PORT").unwrap_or(defaults.port),

            data_dir: env::var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),

            models_dir: env::var("MODELS_DIR").map(PathBuf::from).unwrap_or(defaults.models_dir),

            log_dir: env::var("LOG_DIR").map(PathBuf::from).unwrap_or(defaults.log_dir),

            tracking_dir: env::var("TRACKING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.tracking_dir),

            experiment_name: env::var("EXPERIMENT_NAME").unwrap_or(defaults.experiment_name),

            model_path: env::var("MODEL_PATH").map(PathBuf::from).unwrap_or(defaults.model_path),

            scaler_path: env::var("SCALER_PATH").map(PathBuf::from).unwrap_or(defaults.scaler_path),

            drift_threshold: parse_var("DRIFT_THRESHOLD").unwrap_or(defaults.drift_threshold),

            monitor_interval_secs: parse_var("MONITOR_INTERVAL_SECS")
                .unwrap_or(defaults.monitor_interval_secs),

            monitor_retry_secs: parse_var("MONITOR_RETRY_SECS")
                .unwrap_or(defaults.monitor_retry_secs),

            test_size: parse_var("TEST_SIZE")
                .filter(|v: &f64| *v > 0.0 && *v < 1.0)
                .unwrap_or(defaults.test_size),

            random_state: parse_var("RANDOM_STATE").unwrap_or(defaults.random_state),

            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_point_at_pipeline_outputs() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.model_path, config.models_dir.join("best_model_model.json"));
        assert_eq!(config.scaler_path, config.data_dir.join("scaler.json"));
        assert!((config.drift_threshold - 0.1).abs() < f64::EPSILON);
        assert!(!config.is_production());
    }
}
