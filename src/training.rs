//! Model training with experiment tracking

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::config::Config;
use crate::data::{dataset, DataProcessor, Split};
use crate::error::{PipelineError, PipelineResult};
use crate::ml::{
    Classifier, ClassificationReport, EvaluationMetrics, LogisticRegression, RandomForest, Svm,
    TrainedModel,
};
use crate::tracking::{ModelVersion, RunStatus, Tracker};

pub const BEST_MODEL_NAME: &str = "best_model";
pub const BEST_MODEL_REGISTRY: &str = "iris_best_model";

/// One fitted and evaluated candidate
#[derive(Debug, Clone)]
pub struct TrainingResult {
    pub name: &'static str,
    pub model: TrainedModel,
    pub metrics: EvaluationMetrics,
}

/// What the train command reports when it finishes
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub best_model: String,
    pub metrics: EvaluationMetrics,
    pub model_path: PathBuf,
    pub registered_version: Option<u32>,
    pub candidates: Vec<(String, EvaluationMetrics)>,
}

pub struct ModelTrainer<'a> {
    tracker: &'a Tracker,
    candidates: Vec<TrainedModel>,
}

fn run_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

impl<'a> ModelTrainer<'a> {
    pub fn new(tracker: &'a Tracker, random_state: u64) -> Self {
        Self::with_candidates(
            tracker,
            vec![
                TrainedModel::LogisticRegression(LogisticRegression::new(random_state, 1000)),
                TrainedModel::RandomForest(RandomForest::new(random_state, 100)),
                TrainedModel::Svm(Svm::new(random_state)),
            ],
        )
    }

    pub fn with_candidates(tracker: &'a Tracker, candidates: Vec<TrainedModel>) -> Self {
        Self { tracker, candidates }
    }

    pub fn candidate_names(&self) -> Vec<&'static str> {
        self.candidates.iter().map(|m| m.name()).collect()
    }

    pub fn evaluate(model: &TrainedModel, split: &Split) -> PipelineResult<(EvaluationMetrics, Vec<usize>)> {
        let y_pred = model.predict(&split.x_test)?;
        Ok((EvaluationMetrics::compute(&split.y_test, &y_pred), y_pred))
    }

    /// Fit one candidate inside its own tracked run
    pub fn train_model(&self, mut model: TrainedModel, split: &Split) -> PipelineResult<TrainingResult> {
        let name = model.name();
        tracing::info!("Training {}", name);

        let mut run = self.tracker.start_run(&format!("{}_{}", name, run_timestamp()))?;
        run.log_params(&model.params())?;

        model.fit(&split.x_train, &split.y_train)?;

        let (metrics, y_pred) = Self::evaluate(&model, split)?;
        run.log_metrics(&metrics.to_map())?;
        run.log_model(&model, name, Some(format!("iris_{}", name).as_str()))?;

        let report = ClassificationReport::compute(&split.y_test, &y_pred);
        run.log_dict(&report.to_json(), "classification_report.json")?;
        run.finish(RunStatus::Finished)?;

        tracing::info!("{} - Accuracy: {:.4}", name, metrics.accuracy);
        Ok(TrainingResult { name, model, metrics })
    }

    /// Train every candidate, in declaration order
    pub fn train_all(&self, split: &Split) -> PipelineResult<Vec<TrainingResult>> {
        self.candidates
            .iter()
            .cloned()
            .map(|model| self.train_model(model, split))
            .collect()
    }

    /// Highest accuracy wins; earlier candidates win ties
    pub fn select_best(results: &[TrainingResult]) -> Option<&TrainingResult> {
        let mut best: Option<&TrainingResult> = None;
        for result in results {
            if best.map_or(true, |b| result.metrics.accuracy > b.metrics.accuracy) {
                best = Some(result);
            }
        }
        if let Some(b) = best {
            tracing::info!("Best model: {} with accuracy: {:.4}", b.name, b.metrics.accuracy);
        }
        best
    }

    pub fn save_model(model: &TrainedModel, model_name: &str, models_dir: &Path) -> PipelineResult<PathBuf> {
        fs::create_dir_all(models_dir)?;
        let path = models_dir.join(format!("{}_model.json", model_name));
        model.save(&path)?;
        tracing::info!("Model saved to {}", path.display());
        Ok(path)
    }

    /// Log the winner in a dedicated run and register it
    pub fn register_best(&self, best: &TrainingResult, model_path: &Path) -> PipelineResult<Option<ModelVersion>> {
        let mut run = self
            .tracker
            .start_run(&format!("{}_{}", BEST_MODEL_NAME, run_timestamp()))?;
        run.log_params(&best.model.params())?;
        run.log_metrics(&best.metrics.to_map())?;
        let version = run.log_model(&best.model, BEST_MODEL_NAME, Some(BEST_MODEL_REGISTRY))?;
        run.log_param("model_type", best.name)?;
        run.log_artifact(model_path)?;
        run.finish(RunStatus::Finished)?;
        Ok(version)
    }
}

/// Dataset -> processed arrays + scaler on disk
pub fn prepare_data(config: &Config) -> PipelineResult<Split> {
    let ds = dataset::load();
    let mut processor = DataProcessor::new(config.test_size, config.random_state);
    let split = processor.preprocess(&ds)?;
    processor.save(&split, &ds, &config.data_dir)?;
    tracing::info!("Data processing completed successfully");
    Ok(split)
}

/// Processed arrays from disk, or a fresh preparation when they are missing
pub fn load_or_prepare(config: &Config) -> PipelineResult<Split> {
    let mut processor = DataProcessor::new(config.test_size, config.random_state);
    match processor.load_processed(&config.data_dir) {
        Ok(split) => {
            tracing::info!("Loaded processed data");
            Ok(split)
        }
        Err(PipelineError::NotFound(path)) => {
            tracing::info!("Processing data from scratch ({} missing)", path);
            prepare_data(config)
        }
        Err(e) => Err(e),
    }
}

/// Full training stage: train, select, save, register
pub fn train(config: &Config) -> PipelineResult<TrainingSummary> {
    let split = load_or_prepare(config)?;

    let tracker = Tracker::open(&config.tracking_dir, &config.experiment_name)?;
    let trainer = ModelTrainer::new(&tracker, config.random_state);
    let results = trainer.train_all(&split)?;

    let best = ModelTrainer::select_best(&results)
        .ok_or_else(|| PipelineError::InvalidData("no candidate models trained".into()))?;
    let model_path = ModelTrainer::save_model(&best.model, BEST_MODEL_NAME, &config.models_dir)?;
    let version = trainer.register_best(best, &model_path)?;

    tracing::info!("Training pipeline completed successfully");
    Ok(TrainingSummary {
        best_model: best.name.to_string(),
        metrics: best.metrics,
        model_path,
        registered_version: version.map(|v| v.version),
        candidates: results
            .iter()
            .map(|r| (r.name.to_string(), r.metrics))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::test_support::iris_split;

    fn test_config(root: &Path) -> Config {
        Config {
            data_dir: root.join("data"),
            models_dir: root.join("models"),
            tracking_dir: root.join("mlruns"),
            model_path: root.join("models/best_model_model.json"),
            scaler_path: root.join("data/scaler.json"),
            ..Config::default()
        }
    }

    fn result(name: &'static str, accuracy: f64) -> TrainingResult {
        TrainingResult {
            name,
            model: TrainedModel::LogisticRegression(LogisticRegression::default()),
            metrics: EvaluationMetrics { accuracy, precision: 0.0, recall: 0.0, f1_score: 0.0 },
        }
    }

    #[test]
    fn test_select_best_keeps_first_on_tie() {
        let results = vec![result("a", 0.9), result("b", 0.95), result("c", 0.95)];
        assert_eq!(ModelTrainer::select_best(&results).unwrap().name, "b");
        assert!(ModelTrainer::select_best(&[]).is_none());
    }

    #[test]
    fn test_default_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::open(dir.path(), "exp").unwrap();
        let trainer = ModelTrainer::new(&tracker, 42);
        assert_eq!(trainer.candidate_names(), vec!["logistic_regression", "random_forest", "svm"]);
    }

    #[test]
    fn test_train_model_logs_run() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::open(dir.path(), "exp").unwrap();
        let trainer = ModelTrainer::new(&tracker, 42);

        let split = iris_split();
        let result = trainer
            .train_model(TrainedModel::LogisticRegression(LogisticRegression::default()), &split)
            .unwrap();
        assert!(result.metrics.accuracy > 0.8);

        let runs = tracker.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].run_name.starts_with("logistic_regression_"));
        assert_eq!(runs[0].status, RunStatus::Finished);
        assert_eq!(tracker.list_versions("iris_logistic_regression").unwrap().len(), 1);
    }

    #[test]
    fn test_full_training_stage() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let summary = train(&config).unwrap();

        assert_eq!(summary.candidates.len(), 3);
        assert!(summary.metrics.accuracy >= 0.85);
        assert!(config.model_path.exists());
        assert!(config.scaler_path.exists());
        assert_eq!(summary.registered_version, Some(1));

        let best = summary
            .candidates
            .iter()
            .map(|(_, m)| m.accuracy)
            .fold(0.0, f64::max);
        assert_eq!(summary.metrics.accuracy, best);

        let loaded = TrainedModel::load(&config.model_path).unwrap();
        assert_eq!(loaded.name(), summary.best_model);
    }
}
