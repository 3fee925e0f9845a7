use std::fs;
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Save a value as pretty JSON, creating parent directories
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> PipelineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Load a JSON value, mapping a missing file to `PipelineError::NotFound`
pub fn load_json<T: DeserializeOwned>(path: &Path) -> PipelineResult<T> {
    if !path.exists() {
        return Err(PipelineError::NotFound(path.display().to_string()));
    }

    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}
