use std::sync::{Arc, PoisonError, RwLock};

use analysis_core::{CalibrationResult, Thresholds, WeightVector, DEFAULT_WEIGHTS};
use confidence_metrics::UncertaintySettings;
use serde::{Deserialize, Serialize};

/// Default bound on analyzed text length, in characters.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 200_000;

/// The swappable part of the ensemble: weights and decision thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub weights: WeightVector,
    pub thresholds: Thresholds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationResult>,
}

impl EnsembleConfig {
    /// Default weights restricted to `names`. Analyzers without a default
    /// weight get an even share.
    pub fn for_analyzers<S: AsRef<str>>(names: &[S]) -> Self {
        let fallback = 1.0 / DEFAULT_WEIGHTS.len() as f64;
        let weights = WeightVector::new(names.iter().map(|n| {
            let name = n.as_ref();
            let w = DEFAULT_WEIGHTS
                .iter()
                .find(|(d, _)| *d == name)
                .map(|(_, w)| *w)
                .unwrap_or(fallback);
            (name.to_string(), w)
        }));
        Self {
            weights,
            thresholds: Thresholds::default(),
            calibration: None,
        }
    }

    pub fn from_calibration(result: CalibrationResult) -> Self {
        Self {
            weights: result.best_weights.clone(),
            thresholds: result.best_thresholds,
            calibration: Some(result),
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            weights: WeightVector::default_weights(),
            thresholds: Thresholds::default(),
            calibration: None,
        }
    }
}

/// Static engine settings, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub max_input_chars: usize,
    /// Attach uncertainty annotations when set.
    pub uncertainty: Option<UncertaintySettings>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            uncertainty: Some(UncertaintySettings::default()),
        }
    }
}

/// Holder of the active configuration.
///
/// Readers take a whole `Arc` snapshot; writers replace the `Arc` in a
/// single store, so no reader ever observes a half-applied calibration.
#[derive(Debug)]
pub struct ConfigHandle {
    current: RwLock<Arc<EnsembleConfig>>,
}

impl ConfigHandle {
    pub fn new(config: EnsembleConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<EnsembleConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Installs `config` and returns the previous one.
    pub fn swap(&self, config: EnsembleConfig) -> Arc<EnsembleConfig> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(config))
    }
}
