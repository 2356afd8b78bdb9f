//! Ensemble engine: fans a text out to every analyzer, combines their
//! estimates by confidence-scaled weights, and classifies the result against
//! the active (default or calibrated) configuration.

pub mod config;
pub mod engine;

pub use config::{ConfigHandle, EngineSettings, EnsembleConfig, DEFAULT_MAX_INPUT_CHARS};
pub use engine::{
    aggregate, weighted_score, AnalyzerOutcome, AnalyzerOutcomes, AnnotatedResult, EnsembleEngine,
};
