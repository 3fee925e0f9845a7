//! Registered model versions

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::META_FILE;
use crate::data::storage::{load_json, save_json};
use crate::error::PipelineResult;

pub(super) const MODEL_FILE: &str = "model.json";
const VERSION_PREFIX: &str = "version-";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelVersion {
    pub name: String,
    pub version: u32,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
}

impl ModelVersion {
    fn dir(&self, registry_dir: &Path) -> PathBuf {
        registry_dir.join(&self.name).join(format!("{}{}", VERSION_PREFIX, self.version))
    }

    /// Location of the stored model, given the tracker root
    pub fn model_path(&self, tracking_root: &Path) -> PathBuf {
        self.dir(&tracking_root.join(super::REGISTRY_DIR)).join(MODEL_FILE)
    }
}

pub(super) fn list_versions(registry_dir: &Path, name: &str) -> PipelineResult<Vec<ModelVersion>> {
    let model_dir = registry_dir.join(name);
    let mut versions = Vec::new();
    if !model_dir.exists() {
        return Ok(versions);
    }

    for entry in fs::read_dir(&model_dir)? {
        let path = entry?.path();
        let is_version = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with(VERSION_PREFIX));
        if is_version && path.join(META_FILE).exists() {
            versions.push(load_json::<ModelVersion>(&path.join(META_FILE))?);
        }
    }
    versions.sort_by_key(|v| v.version);
    Ok(versions)
}

/// Caller holds the registry lock
pub(super) fn register<T: Serialize + ?Sized>(
    registry_dir: &Path,
    name: &str,
    run_id: &str,
    model: &T,
) -> PipelineResult<ModelVersion> {
    let next = list_versions(registry_dir, name)?
        .last()
        .map_or(1, |v| v.version + 1);

    let version = ModelVersion {
        name: name.to_string(),
        version: next,
        run_id: run_id.to_string(),
        created_at: Utc::now(),
    };
    let dir = version.dir(registry_dir);
    save_json(model, &dir.join(MODEL_FILE))?;
    save_json(&version, &dir.join(META_FILE))?;
    Ok(version)
}
