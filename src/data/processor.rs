//! Split, scale and persist the dataset

use std::fs;
use std::path::Path;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::dataset::{Dataset, CLASS_COUNT};
use super::scaler::StandardScaler;
use super::storage::{load_json, save_json};
use crate::error::{PipelineError, PipelineResult};

const X_TRAIN_FILE: &str = "x_train.json";
const X_TEST_FILE: &str = "x_test.json";
const Y_TRAIN_FILE: &str = "y_train.json";
const Y_TEST_FILE: &str = "y_test.json";
pub const SCALER_FILE: &str = "scaler.json";
const RAW_CSV_FILE: &str = "iris_raw.csv";

/// Scaled train/test arrays
#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Vec<usize>,
    pub y_test: Vec<usize>,
}

pub struct DataProcessor {
    test_size: f64,
    random_state: u64,
    scaler: StandardScaler,
}

impl Default for DataProcessor {
    fn default() -> Self {
        Self::new(0.2, 42)
    }
}

impl DataProcessor {
    pub fn new(test_size: f64, random_state: u64) -> Self {
        Self {
            test_size,
            random_state,
            scaler: StandardScaler::new(),
        }
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Stratified split followed by scaling (fit on train only)
    pub fn preprocess(&mut self, dataset: &Dataset) -> PipelineResult<Split> {
        tracing::info!("Preprocessing data");

        let (train_idx, test_idx) = self.stratified_indices(&dataset.targets)?;

        let x_train = dataset.features.select(Axis(0), &train_idx);
        let x_test = dataset.features.select(Axis(0), &test_idx);
        let y_train = train_idx.iter().map(|&i| dataset.targets[i]).collect();
        let y_test = test_idx.iter().map(|&i| dataset.targets[i]).collect();

        let x_train = self.scaler.fit_transform(&x_train)?;
        let x_test = self.scaler.transform(&x_test)?;

        tracing::info!("Training set size: {}", x_train.nrows());
        tracing::info!("Test set size: {}", x_test.nrows());

        Ok(Split { x_train, x_test, y_train, y_test })
    }

    fn stratified_indices(&self, targets: &[usize]) -> PipelineResult<(Vec<usize>, Vec<usize>)> {
        let mut rng = StdRng::seed_from_u64(self.random_state);
        let mut train = Vec::new();
        let mut test = Vec::new();

        for class in 0..CLASS_COUNT {
            let mut members: Vec<usize> = (0..targets.len())
                .filter(|&i| targets[i] == class)
                .collect();
            if members.is_empty() {
                continue;
            }

            members.shuffle(&mut rng);
            let n_test = (members.len() as f64 * self.test_size).round() as usize;
            if n_test == 0 || n_test >= members.len() {
                return Err(PipelineError::InvalidData(format!(
                    "test_size {} leaves class {} with an empty side",
                    self.test_size, class
                )));
            }

            test.extend_from_slice(&members[..n_test]);
            train.extend_from_slice(&members[n_test..]);
        }

        train.shuffle(&mut rng);
        test.shuffle(&mut rng);
        Ok((train, test))
    }

    /// Persist arrays, the fitted scaler and the raw table
    pub fn save(&self, split: &Split, dataset: &Dataset, data_dir: &Path) -> PipelineResult<()> {
        fs::create_dir_all(data_dir)?;

        save_json(&split.x_train, &data_dir.join(X_TRAIN_FILE))?;
        save_json(&split.x_test, &data_dir.join(X_TEST_FILE))?;
        save_json(&split.y_train, &data_dir.join(Y_TRAIN_FILE))?;
        save_json(&split.y_test, &data_dir.join(Y_TEST_FILE))?;
        save_json(&self.scaler, &data_dir.join(SCALER_FILE))?;
        fs::write(data_dir.join(RAW_CSV_FILE), dataset.to_csv())?;

        tracing::info!("Data saved to {}", data_dir.display());
        Ok(())
    }

    /// Load previously processed arrays and restore the scaler
    pub fn load_processed(&mut self, data_dir: &Path) -> PipelineResult<Split> {
        let split = Split {
            x_train: load_json(&data_dir.join(X_TRAIN_FILE))?,
            x_test: load_json(&data_dir.join(X_TEST_FILE))?,
            y_train: load_json(&data_dir.join(Y_TRAIN_FILE))?,
            y_test: load_json(&data_dir.join(Y_TEST_FILE))?,
        };
        self.scaler = load_json(&data_dir.join(SCALER_FILE))?;

        if split.x_train.nrows() != split.y_train.len() || split.x_test.nrows() != split.y_test.len() {
            return Err(PipelineError::InvalidData("feature/target row counts differ".into()));
        }
        Ok(split)
    }
}

/// Load the fitted scaler on its own (API startup)
pub fn load_scaler(path: &Path) -> PipelineResult<StandardScaler> {
    load_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset;

    #[test]
    fn test_default_split_sizes_and_stratification() {
        let ds = dataset::load();
        let mut processor = DataProcessor::default();
        let split = processor.preprocess(&ds).unwrap();

        assert_eq!(split.x_train.nrows(), 120);
        assert_eq!(split.x_test.nrows(), 30);
        for class in 0..CLASS_COUNT {
            assert_eq!(split.y_test.iter().filter(|&&t| t == class).count(), 10);
            assert_eq!(split.y_train.iter().filter(|&&t| t == class).count(), 40);
        }
    }

    #[test]
    fn test_split_is_deterministic_for_seed() {
        let ds = dataset::load();
        let a = DataProcessor::new(0.2, 7).preprocess(&ds).unwrap();
        let b = DataProcessor::new(0.2, 7).preprocess(&ds).unwrap();
        assert_eq!(a.y_train, b.y_train);
        assert_eq!(a.x_test, b.x_test);
    }

    #[test]
    fn test_train_split_is_standardized() {
        let ds = dataset::load();
        let split = DataProcessor::default().preprocess(&ds).unwrap();
        let means = split.x_train.mean_axis(Axis(0)).unwrap();
        assert!(means.iter().all(|m| m.abs() < 1e-9));
    }

    #[test]
    fn test_degenerate_test_size_is_rejected() {
        let ds = dataset::load();
        let result = DataProcessor::new(0.001, 42).preprocess(&ds);
        assert!(matches!(result, Err(PipelineError::InvalidData(_))));
    }

    #[test]
    fn test_save_and_load_processed() {
        let dir = tempfile::tempdir().unwrap();
        let ds = dataset::load();
        let mut processor = DataProcessor::default();
        let split = processor.preprocess(&ds).unwrap();
        processor.save(&split, &ds, dir.path()).unwrap();

        assert!(dir.path().join("iris_raw.csv").exists());

        let mut reloaded = DataProcessor::default();
        let loaded = reloaded.load_processed(dir.path()).unwrap();
        assert_eq!(loaded.y_test, split.y_test);
        assert_eq!(loaded.x_train, split.x_train);
        assert_eq!(reloaded.scaler(), processor.scaler());

        let scaler = load_scaler(&dir.path().join(SCALER_FILE)).unwrap();
        assert_eq!(&scaler, processor.scaler());
    }

    #[test]
    fn test_load_processed_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = DataProcessor::default().load_processed(&dir.path().join("nothing"));
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }
}
