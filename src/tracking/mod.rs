//! Local experiment tracker
//!
//! Experiments, runs and registered model versions are kept as plain JSON
//! files under one root directory:
//!
//! ```text
//! mlruns/
//! ├── 0/                          experiment "iris_classification"
//! │   ├── meta.json
//! │   └── <run_id>/
//! │       ├── meta.json           name, status, start/end
//! │       ├── params.json
//! │       ├── metrics.json
//! │       └── artifacts/
//! └── models/
//!     └── iris_best_model/
//!         └── version-1/
//!             ├── meta.json
//!             └── model.json
//! ```

mod registry;
mod run;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::data::storage::{load_json, save_json};
use crate::error::PipelineResult;

pub use registry::ModelVersion;
pub use run::{ActiveRun, RunInfo, RunStatus};

const META_FILE: &str = "meta.json";
const REGISTRY_DIR: &str = "models";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

pub struct Tracker {
    root: PathBuf,
    experiment: Experiment,
    registry_lock: Arc<Mutex<()>>,
}

impl Tracker {
    /// Open (or create) the named experiment under `root`
    pub fn open(root: impl Into<PathBuf>, experiment_name: &str) -> PipelineResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let experiments = Self::list_experiments(&root)?;
        let experiment = match experiments.iter().find(|e| e.name == experiment_name) {
            Some(existing) => existing.clone(),
            None => {
                let next_id = experiments
                    .iter()
                    .filter_map(|e| e.experiment_id.parse::<u64>().ok())
                    .max()
                    .map_or(0, |id| id + 1);
                let experiment = Experiment {
                    experiment_id: next_id.to_string(),
                    name: experiment_name.to_string(),
                    created_at: Utc::now(),
                };
                save_json(&experiment, &root.join(&experiment.experiment_id).join(META_FILE))?;
                tracing::info!(
                    experiment = %experiment.name,
                    id = %experiment.experiment_id,
                    "Created experiment"
                );
                experiment
            }
        };

        Ok(Self {
            root,
            experiment,
            registry_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn experiment_dir(&self) -> PathBuf {
        self.root.join(&self.experiment.experiment_id)
    }

    fn registry_dir(&self) -> PathBuf {
        self.root.join(REGISTRY_DIR)
    }

    /// All experiments stored under `root`
    pub fn list_experiments(root: &Path) -> PipelineResult<Vec<Experiment>> {
        let mut experiments = Vec::new();
        if !root.exists() {
            return Ok(experiments);
        }

        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            if !path.is_dir() || path.file_name().map_or(false, |n| n == REGISTRY_DIR) {
                continue;
            }
            let meta = path.join(META_FILE);
            if meta.exists() {
                experiments.push(load_json(&meta)?);
            }
        }
        experiments.sort_by(|a: &Experiment, b| a.created_at.cmp(&b.created_at));
        Ok(experiments)
    }

    pub fn start_run(&self, run_name: &str) -> PipelineResult<ActiveRun> {
        ActiveRun::start(
            self.experiment_dir(),
            &self.experiment.experiment_id,
            run_name,
            self.registry_dir(),
            Arc::clone(&self.registry_lock),
        )
    }

    /// Runs of this experiment, oldest first
    pub fn list_runs(&self) -> PipelineResult<Vec<RunInfo>> {
        let mut runs = Vec::new();
        for entry in fs::read_dir(self.experiment_dir())? {
            let path = entry?.path();
            let meta = path.join(META_FILE);
            if path.is_dir() && meta.exists() {
                runs.push(load_json::<RunInfo>(&meta)?);
            }
        }
        runs.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(runs)
    }

    pub fn list_versions(&self, registered_name: &str) -> PipelineResult<Vec<ModelVersion>> {
        registry::list_versions(&self.registry_dir(), registered_name)
    }

    pub fn latest_version(&self, registered_name: &str) -> PipelineResult<Option<ModelVersion>> {
        Ok(self.list_versions(registered_name)?.into_iter().last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_open_reuses_experiment_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let first = Tracker::open(dir.path(), "iris_classification").unwrap();
        let again = Tracker::open(dir.path(), "iris_classification").unwrap();
        let other = Tracker::open(dir.path(), "other").unwrap();

        assert_eq!(first.experiment(), again.experiment());
        assert_eq!(first.experiment().experiment_id, "0");
        assert_eq!(other.experiment().experiment_id, "1");
        assert_eq!(Tracker::list_experiments(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_run_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::open(dir.path(), "exp").unwrap();

        let mut run = tracker.start_run("svm_20240101_000000").unwrap();
        run.log_param("C", "1.0").unwrap();
        run.log_metrics(&BTreeMap::from([("accuracy".to_string(), 0.9)])).unwrap();
        run.log_dict(&serde_json::json!({"setosa": {"support": 10}}), "classification_report.json")
            .unwrap();
        let run_dir = run.dir().to_path_buf();
        let info = run.finish(RunStatus::Finished).unwrap();

        assert_eq!(info.status, RunStatus::Finished);
        assert!(info.end_time.is_some());
        assert!(run_dir.join("artifacts/classification_report.json").exists());

        let params: BTreeMap<String, String> = load_json(&run_dir.join("params.json")).unwrap();
        assert_eq!(params["C"], "1.0");
        let metrics: BTreeMap<String, f64> = load_json(&run_dir.join("metrics.json")).unwrap();
        assert_eq!(metrics["accuracy"], 0.9);

        let runs = tracker.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_name, "svm_20240101_000000");
    }

    #[test]
    fn test_dropped_run_is_marked_failed() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::open(dir.path(), "exp").unwrap();
        {
            let _run = tracker.start_run("abandoned").unwrap();
        }
        let runs = tracker.list_runs().unwrap();
        assert_eq!(runs[0].status, RunStatus::Failed);
    }

    #[test]
    fn test_registered_versions_increase() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::open(dir.path(), "exp").unwrap();

        for _ in 0..2 {
            let run = tracker.start_run("best_model").unwrap();
            let version = run
                .log_model(&vec![1.0, 2.0], "best_model", Some("iris_best_model"))
                .unwrap()
                .unwrap();
            assert!(version.version >= 1);
            run.finish(RunStatus::Finished).unwrap();
        }

        let versions = tracker.list_versions("iris_best_model").unwrap();
        assert_eq!(versions.iter().map(|v| v.version).collect::<Vec<_>>(), vec![1, 2]);
        let latest = tracker.latest_version("iris_best_model").unwrap().unwrap();
        assert_eq!(latest.version, 2);
        assert!(latest.model_path(dir.path()).exists());
        assert!(tracker.list_versions("unknown").unwrap().is_empty());
    }
}
