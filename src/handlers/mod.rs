//! HTTP handlers

pub mod health;
pub mod history;
pub mod metrics;
pub mod monitoring;
pub mod predict;
pub mod root;
