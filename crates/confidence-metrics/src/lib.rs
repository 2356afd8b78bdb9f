//! Confidence and uncertainty annotations for ensemble results.
//!
//! Per-prediction: certainty level, bootstrap interval over analyzer
//! probabilities, a Bayesian blend, and per-analyzer disagreement.
//! Per-batch: Beta credible interval, bootstrap/normal/Wilson intervals,
//! a paired bootstrap over results, and an overall reliability grade.

pub mod intervals;
pub mod reliability;
pub mod uncertainty;

pub use intervals::{
    bootstrap_batch, confidence_interval, BatchBootstrap, ConfidenceInterval, IntervalMethod, ResampledSummary,
};
pub use reliability::{bayesian_credible_interval, model_reliability, CredibleInterval, ModelReliability};
pub use uncertainty::{
    bayesian_probability, uncertainty_breakdown, BootstrapInterval, CertaintyBlend, CertaintyLevel,
    PredictionUncertainty, UncertaintyEstimator, UncertaintySettings,
};
