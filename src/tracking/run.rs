use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::registry::{self, ModelVersion};
use super::META_FILE;
use crate::data::storage::save_json;
use crate::error::{PipelineError, PipelineResult};

const PARAMS_FILE: &str = "params.json";
const METRICS_FILE: &str = "metrics.json";
const ARTIFACTS_DIR: &str = "artifacts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub run_name: String,
    pub experiment_id: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// An open run; params, metrics and artifacts are flushed as they are logged
pub struct ActiveRun {
    dir: PathBuf,
    info: RunInfo,
    params: BTreeMap<String, String>,
    metrics: BTreeMap<String, f64>,
    registry_dir: PathBuf,
    registry_lock: Arc<Mutex<()>>,
    closed: bool,
}

impl ActiveRun {
    pub(super) fn start(
        experiment_dir: PathBuf,
        experiment_id: &str,
        run_name: &str,
        registry_dir: PathBuf,
        registry_lock: Arc<Mutex<()>>,
    ) -> PipelineResult<Self> {
        let run_id = Uuid::new_v4().simple().to_string();
        let dir = experiment_dir.join(&run_id);
        fs::create_dir_all(dir.join(ARTIFACTS_DIR))?;

        let info = RunInfo {
            run_id,
            run_name: run_name.to_string(),
            experiment_id: experiment_id.to_string(),
            status: RunStatus::Running,
            start_time: Utc::now(),
            end_time: None,
        };
        save_json(&info, &dir.join(META_FILE))?;
        tracing::debug!(run_id = %info.run_id, run_name, "Run started");

        Ok(Self {
            dir,
            info,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            registry_dir,
            registry_lock,
            closed: false,
        })
    }

    pub fn info(&self) -> &RunInfo {
        &self.info
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_param(&mut self, key: &str, value: impl ToString) -> PipelineResult<()> {
        self.params.insert(key.to_string(), value.to_string());
        save_json(&self.params, &self.dir.join(PARAMS_FILE))
    }

    pub fn log_params(&mut self, params: &BTreeMap<String, String>) -> PipelineResult<()> {
        self.params.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        save_json(&self.params, &self.dir.join(PARAMS_FILE))
    }

    pub fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>) -> PipelineResult<()> {
        self.metrics.extend(metrics.iter().map(|(k, v)| (k.clone(), *v)));
        save_json(&self.metrics, &self.dir.join(METRICS_FILE))
    }

    /// Store a JSON document as an artifact
    pub fn log_dict(&self, value: &serde_json::Value, artifact_file: &str) -> PipelineResult<()> {
        save_json(value, &self.dir.join(ARTIFACTS_DIR).join(artifact_file))
    }

    /// Copy a local file into the run's artifacts
    pub fn log_artifact(&self, local_path: &Path) -> PipelineResult<PathBuf> {
        let file_name = local_path
            .file_name()
            .ok_or_else(|| PipelineError::InvalidData(format!("not a file: {}", local_path.display())))?;
        if !local_path.exists() {
            return Err(PipelineError::NotFound(local_path.display().to_string()));
        }

        let target = self.dir.join(ARTIFACTS_DIR).join(file_name);
        fs::copy(local_path, &target)?;
        Ok(target)
    }

    /// Store a model under `artifacts/<artifact_path>/model.json`, optionally registering it
    pub fn log_model<T: Serialize + ?Sized>(
        &self,
        model: &T,
        artifact_path: &str,
        registered_name: Option<&str>,
    ) -> PipelineResult<Option<ModelVersion>> {
        let model_dir = self.dir.join(ARTIFACTS_DIR).join(artifact_path);
        save_json(model, &model_dir.join(registry::MODEL_FILE))?;

        let Some(name) = registered_name else {
            return Ok(None);
        };

        let _guard = self.registry_lock.lock();
        let version = registry::register(&self.registry_dir, name, &self.info.run_id, model)?;
        tracing::info!(model = name, version = version.version, "Registered model version");
        Ok(Some(version))
    }

    pub fn finish(mut self, status: RunStatus) -> PipelineResult<RunInfo> {
        self.close(status)?;
        Ok(self.info.clone())
    }

    fn close(&mut self, status: RunStatus) -> PipelineResult<()> {
        self.info.status = status;
        self.info.end_time = Some(Utc::now());
        self.closed = true;
        save_json(&self.info, &self.dir.join(META_FILE))
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close(RunStatus::Failed) {
                tracing::warn!(run_id = %self.info.run_id, "Failed to close run: {}", e);
            }
        }
    }
}
