use anyhow::{Context, Result};
use analysis_orchestrator::EngineSettings;
use confidence_calibrator::CalibrationSettings;
use confidence_metrics::UncertaintySettings;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    // Engine
    pub analyzers: Vec<String>,            // empty = every registered analyzer
    pub max_input_chars: usize,            // 200000
    pub analysis_timeout_ms: Option<u64>,  // unset = no deadline

    // Uncertainty annotation
    pub uncertainty: bool,
    pub bootstrap_resamples: usize,        // 1000
    pub confidence_level: f64,             // 0.95

    // Calibration search
    pub weight_step: f64,                  // 0.05
    pub threshold_step: f64,               // 0.01
    pub min_per_class: usize,              // 10
    pub min_weight_units: usize,           // 0 = weights may drop to zero
    pub cv_folds: usize,                   // 5
    pub seed: u64,                         // 42
}

impl DetectorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; missing keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            analyzers: var("DETECTOR_ANALYZERS", "")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            max_input_chars: var("DETECTOR_MAX_INPUT_CHARS", "200000")
                .parse()
                .context("DETECTOR_MAX_INPUT_CHARS must be a positive integer")?,
            analysis_timeout_ms: lookup("DETECTOR_TIMEOUT_MS")
                .map(|v| v.parse())
                .transpose()
                .context("DETECTOR_TIMEOUT_MS must be an integer")?,

            uncertainty: var("DETECTOR_UNCERTAINTY", "true")
                .parse()
                .context("DETECTOR_UNCERTAINTY must be true or false")?,
            bootstrap_resamples: var("DETECTOR_BOOTSTRAP_RESAMPLES", "1000").parse()?,
            confidence_level: var("DETECTOR_CONFIDENCE_LEVEL", "0.95").parse()?,

            weight_step: var("DETECTOR_WEIGHT_STEP", "0.05").parse()?,
            threshold_step: var("DETECTOR_THRESHOLD_STEP", "0.01").parse()?,
            min_per_class: var("DETECTOR_MIN_PER_CLASS", "10").parse()?,
            min_weight_units: var("DETECTOR_MIN_WEIGHT_UNITS", "0").parse()?,
            cv_folds: var("DETECTOR_CV_FOLDS", "5").parse()?,
            seed: var("DETECTOR_SEED", "42").parse()?,
        };

        if config.max_input_chars == 0 {
            anyhow::bail!("DETECTOR_MAX_INPUT_CHARS must be greater than 0");
        }
        if !(0.0..1.0).contains(&config.confidence_level) {
            anyhow::bail!("DETECTOR_CONFIDENCE_LEVEL must be in [0, 1)");
        }
        Ok(config)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_input_chars: self.max_input_chars,
            uncertainty: self.uncertainty.then(|| UncertaintySettings {
                bootstrap_resamples: self.bootstrap_resamples,
                confidence_level: self.confidence_level,
                seed: self.seed,
                ..UncertaintySettings::default()
            }),
        }
    }

    pub fn calibration_settings(&self) -> CalibrationSettings {
        CalibrationSettings {
            weight_step: self.weight_step,
            threshold_step: self.threshold_step,
            min_per_class: self.min_per_class,
            min_weight_units: self.min_weight_units,
            ..CalibrationSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<DetectorConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DetectorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(config.analyzers.is_empty());
        assert_eq!(config.max_input_chars, 200_000);
        assert_eq!(config.analysis_timeout_ms, None);
        assert!(config.uncertainty);
        assert_eq!(config.calibration_settings(), CalibrationSettings::default());
        assert_eq!(config.engine_settings(), EngineSettings::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DETECTOR_ANALYZERS", "lexical, ml ,"),
            ("DETECTOR_UNCERTAINTY", "false"),
            ("DETECTOR_TIMEOUT_MS", "250"),
            ("DETECTOR_WEIGHT_STEP", "0.1"),
            ("DETECTOR_MIN_WEIGHT_UNITS", "1"),
        ])
        .unwrap();
        assert_eq!(config.analyzers, vec!["lexical", "ml"]);
        assert_eq!(config.analysis_timeout_ms, Some(250));
        assert!(config.engine_settings().uncertainty.is_none());
        assert_eq!(config.calibration_settings().weight_step, 0.1);
        assert_eq!(config.calibration_settings().min_weight_units, 1);
    }

    #[test]
    fn test_invalid_values() {
        assert!(config_from(&[("DETECTOR_MAX_INPUT_CHARS", "lots")]).is_err());
        assert!(config_from(&[("DETECTOR_MAX_INPUT_CHARS", "0")]).is_err());
        assert!(config_from(&[("DETECTOR_CONFIDENCE_LEVEL", "1.5")]).is_err());
        assert!(config_from(&[("DETECTOR_UNCERTAINTY", "maybe")]).is_err());
    }
}
