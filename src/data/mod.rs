//! Dataset loading, preprocessing and persistence

pub mod dataset;
pub mod processor;
pub mod scaler;
pub mod storage;

pub use dataset::{Dataset, CLASS_COUNT, FEATURE_COLUMNS, FEATURE_COUNT, FEATURE_NAMES, TARGET_NAMES};
pub use processor::{DataProcessor, Split};
pub use scaler::StandardScaler;
