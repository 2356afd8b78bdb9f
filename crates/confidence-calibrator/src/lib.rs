//! Confidence Calibrator
//!
//! Loads labeled validation data, searches ensemble weights and the AI
//! threshold against it, and reports how well the active configuration
//! separates AI from human text.

pub mod calibrator;
pub mod cross_validation;
pub mod dataset;
pub mod error;
pub mod evaluation;

pub use calibrator::{CalibrationEngine, CalibrationRun, CalibrationSettings, Objective, SearchStrategy};
pub use cross_validation::{CrossValidationReport, FoldResult};
pub use dataset::ValidationDataset;
pub use error::CalibrationError;
pub use evaluation::{evaluate, EvaluationReport};

#[cfg(test)]
mod tests;
