//! Prometheus metrics exported on `/metrics`

use prometheus::{
    exponential_buckets, linear_buckets, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts,
    IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use super::drift::DriftReport;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

pub struct ApiMetrics {
    registry: Registry,
    pub predictions_total: IntCounter,
    pub prediction_duration: Histogram,
    pub prediction_confidence: Histogram,
    pub class_predictions: IntCounterVec,
    pub model_accuracy: Gauge,
    pub drift_detected: IntGauge,
    pub feature_drift_ratio: GaugeVec,
    pub http_requests: IntCounter,
    pub http_errors: IntCounter,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("predictions_total", &self.predictions_total.get())
            .field("http_requests", &self.http_requests.get())
            .finish_non_exhaustive()
    }
}

impl ApiMetrics {
    /// Build the collectors on a private registry so tests and servers don't collide
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let predictions_total = IntCounter::new("iris_predictions_total", "Total number of predictions made")?;
        let prediction_duration = Histogram::with_opts(
            HistogramOpts::new("iris_prediction_duration_seconds", "Prediction latency in seconds")
                .buckets(exponential_buckets(0.0001, 2.0, 16)?),
        )?;
        let prediction_confidence = Histogram::with_opts(
            HistogramOpts::new("iris_prediction_confidence", "Model prediction confidence")
                .buckets(linear_buckets(0.1, 0.1, 10)?),
        )?;
        let class_predictions = IntCounterVec::new(
            Opts::new("iris_class_predictions_total", "Predictions by class"),
            &["class_name"],
        )?;
        let model_accuracy = Gauge::new(
            "iris_model_accuracy",
            "Mean prediction confidence over the last day",
        )?;
        let drift_detected = IntGauge::new("iris_data_drift_detected", "1 when the last drift check flagged drift")?;
        let feature_drift_ratio = GaugeVec::new(
            Opts::new("iris_feature_drift_ratio", "Relative change of the feature mean against the baseline"),
            &["feature"],
        )?;
        let http_requests = IntCounter::new("iris_http_requests_total", "Total HTTP requests served")?;
        let http_errors = IntCounter::new("iris_http_errors_total", "HTTP requests answered with a 5xx status")?;

        registry.register(Box::new(predictions_total.clone()))?;
        registry.register(Box::new(prediction_duration.clone()))?;
        registry.register(Box::new(prediction_confidence.clone()))?;
        registry.register(Box::new(class_predictions.clone()))?;
        registry.register(Box::new(model_accuracy.clone()))?;
        registry.register(Box::new(drift_detected.clone()))?;
        registry.register(Box::new(feature_drift_ratio.clone()))?;
        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_errors.clone()))?;

        Ok(Self {
            registry,
            predictions_total,
            prediction_duration,
            prediction_confidence,
            class_predictions,
            model_accuracy,
            drift_detected,
            feature_drift_ratio,
            http_requests,
            http_errors,
        })
    }

    pub fn observe_prediction(&self, class_name: &str, confidence: f64, seconds: f64) {
        self.predictions_total.inc();
        self.prediction_duration.observe(seconds);
        self.prediction_confidence.observe(confidence);
        self.class_predictions.with_label_values(&[class_name]).inc();
    }

    pub fn observe_request(&self, success: bool) {
        self.http_requests.inc();
        if !success {
            self.http_errors.inc();
        }
    }

    pub fn record_drift(&self, report: &DriftReport) {
        self.drift_detected.set(i64::from(report.drift_detected));
        if let Some(changes) = &report.feature_changes {
            for (feature, ratio) in changes {
                self.feature_drift_ratio.with_label_values(&[feature.as_str()]).set(*ratio);
            }
        }
    }

    /// Text exposition format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::drift::DriftStatus;
    use std::collections::BTreeMap;

    #[test]
    fn test_prediction_metrics_are_exported() {
        let metrics = ApiMetrics::new().unwrap();
        metrics.observe_prediction("setosa", 0.97, 0.002);
        metrics.observe_prediction("setosa", 0.91, 0.003);
        metrics.observe_prediction("virginica", 0.88, 0.001);

        assert_eq!(metrics.predictions_total.get(), 3);
        assert_eq!(metrics.class_predictions.with_label_values(&["setosa"]).get(), 2);

        let text = metrics.encode().unwrap();
        assert!(text.contains("iris_predictions_total 3"));
        assert!(text.contains(r#"iris_class_predictions_total{class_name="virginica"} 1"#));
        assert!(text.contains("iris_prediction_duration_seconds_count 3"));
    }

    #[test]
    fn test_request_counters() {
        let metrics = ApiMetrics::new().unwrap();
        metrics.observe_request(true);
        metrics.observe_request(false);
        assert_eq!(metrics.http_requests.get(), 2);
        assert_eq!(metrics.http_errors.get(), 1);
    }

    #[test]
    fn test_record_drift() {
        let metrics = ApiMetrics::new().unwrap();
        let report = DriftReport {
            status: DriftStatus::Success,
            drift_detected: true,
            feature_changes: Some(BTreeMap::from([("petal_length".to_string(), 0.4)])),
            threshold: Some(0.1),
            recent_samples: Some(3),
            baseline_samples: Some(9),
            error: None,
        };
        metrics.record_drift(&report);

        assert_eq!(metrics.drift_detected.get(), 1);
        assert_eq!(metrics.feature_drift_ratio.with_label_values(&["petal_length"]).get(), 0.4);

        metrics.record_drift(&DriftReport::insufficient_data());
        assert_eq!(metrics.drift_detected.get(), 0);
    }

    #[test]
    fn test_registries_are_independent() {
        let a = ApiMetrics::new().unwrap();
        let b = ApiMetrics::new().unwrap();
        a.predictions_total.inc();
        assert_eq!(b.predictions_total.get(), 0);
    }
}
