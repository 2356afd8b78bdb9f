//! Uncertainty Estimation Module
//!
//! Annotates a single ensemble result with how much its verdict can be
//! trusted: a blended certainty score, a bootstrap interval over the
//! surviving analyzers' probabilities, an independent Bayesian blend and the
//! share of disagreement each analyzer contributes.

use std::collections::BTreeMap;

use analysis_core::stats::{mean, percentile_value, std_dev};
use analysis_core::{AnalyzerEstimate, EnsembleResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Probabilities are kept away from 0 and 1 before forming likelihood ratios.
const LIKELIHOOD_FLOOR: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertaintyLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

impl CertaintyLevel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s > 0.8 => CertaintyLevel::VeryHigh,
            s if s > 0.6 => CertaintyLevel::High,
            s if s > 0.4 => CertaintyLevel::Medium,
            s if s > 0.2 => CertaintyLevel::Low,
            _ => CertaintyLevel::VeryLow,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CertaintyLevel::VeryHigh => "Very High",
            CertaintyLevel::High => "High",
            CertaintyLevel::Medium => "Medium",
            CertaintyLevel::Low => "Low",
            CertaintyLevel::VeryLow => "Very Low",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            CertaintyLevel::VeryHigh => {
                "Analyzers agree and the evidence is strong. The classification can be relied on."
            }
            CertaintyLevel::High => {
                "The classification is likely correct. Spot-check borderline cases."
            }
            CertaintyLevel::Medium => {
                "Moderate certainty. Corroborate with other context before acting on it."
            }
            CertaintyLevel::Low => {
                "Low certainty. Treat the classification as a weak signal only."
            }
            CertaintyLevel::VeryLow => {
                "Very low certainty. Provide a longer sample or review the text manually."
            }
        }
    }
}

/// How weighted confidence and agreement combine into one certainty score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CertaintyBlend {
    Product,
    Weighted { confidence_weight: f64 },
}

impl Default for CertaintyBlend {
    fn default() -> Self {
        CertaintyBlend::Product
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintySettings {
    pub blend: CertaintyBlend,
    pub bootstrap_resamples: usize,
    pub confidence_level: f64,
    pub seed: u64,
}

impl Default for UncertaintySettings {
    fn default() -> Self {
        Self {
            blend: CertaintyBlend::Product,
            bootstrap_resamples: 1000,
            confidence_level: 0.95,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub std_error: f64,
    pub confidence_level: f64,
    pub resamples: usize,
}

impl BootstrapInterval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Uncertainty annotation attached to an ensemble result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionUncertainty {
    pub prediction_certainty: f64,
    pub certainty_level: CertaintyLevel,
    pub recommendation: String,
    pub bootstrap: Option<BootstrapInterval>,
    pub bayesian_probability: f64,
    /// Per analyzer: aggregation weight x distance from the aggregate probability.
    pub uncertainty_breakdown: BTreeMap<String, f64>,
    pub total_disagreement: f64,
    /// 0 at the 0.5 midpoint, 1 at either extreme.
    pub threshold_distance: f64,
}

#[derive(Debug, Clone, Default)]
pub struct UncertaintyEstimator {
    settings: UncertaintySettings,
}

impl UncertaintyEstimator {
    pub fn new(settings: UncertaintySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &UncertaintySettings {
        &self.settings
    }

    pub fn prediction_certainty(&self, result: &EnsembleResult) -> f64 {
        let certainty = match self.settings.blend {
            CertaintyBlend::Product => result.weighted_confidence * result.agreement_score,
            CertaintyBlend::Weighted { confidence_weight } => {
                let w = confidence_weight.clamp(0.0, 1.0);
                w * result.weighted_confidence + (1.0 - w) * result.agreement_score
            }
        };
        certainty.clamp(0.0, 1.0)
    }

    pub fn prediction_uncertainty(&self, result: &EnsembleResult) -> PredictionUncertainty {
        let certainty = self.prediction_certainty(result);
        let level = CertaintyLevel::from_score(certainty);

        let probabilities: Vec<f64> = result
            .surviving_estimates()
            .map(|(est, _)| est.ai_probability)
            .collect();

        let breakdown = uncertainty_breakdown(result);
        let total_disagreement = breakdown.values().sum();

        PredictionUncertainty {
            prediction_certainty: certainty,
            certainty_level: level,
            recommendation: level.recommendation().to_string(),
            bootstrap: self.bootstrap_interval(&probabilities),
            bayesian_probability: bayesian_probability(result.surviving_estimates().map(|(est, _)| est)),
            uncertainty_breakdown: breakdown,
            total_disagreement,
            threshold_distance: (result.ai_probability - 0.5).abs() * 2.0,
        }
    }

    /// Percentile bootstrap interval of the mean of `probabilities`.
    ///
    /// Each resample draws from its own RNG seeded from the configured seed
    /// and the resample index, so the interval is reproducible even though
    /// resamples run in parallel.
    pub fn bootstrap_interval(&self, probabilities: &[f64]) -> Option<BootstrapInterval> {
        if probabilities.is_empty() || self.settings.bootstrap_resamples == 0 {
            return None;
        }
        let n = probabilities.len();
        let seed = self.settings.seed;

        let means: Vec<f64> = (0..self.settings.bootstrap_resamples)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                let total: f64 = (0..n).map(|_| probabilities[rng.gen_range(0..n)]).sum();
                total / n as f64
            })
            .collect();

        let level = self.settings.confidence_level.clamp(0.0, 1.0);
        let tail = (1.0 - level) / 2.0 * 100.0;
        let interval = BootstrapInterval {
            mean: mean(&means),
            lower: percentile_value(&means, tail),
            upper: percentile_value(&means, 100.0 - tail),
            std_error: std_dev(&means),
            confidence_level: level,
            resamples: means.len(),
        };
        tracing::debug!(
            "Bootstrap over {} estimates: [{:.3}, {:.3}]",
            n,
            interval.lower,
            interval.upper
        );
        Some(interval)
    }
}

/// Sequential likelihood-ratio update from an even prior, one step per analyzer.
pub fn bayesian_probability<'a, I>(estimates: I) -> f64
where
    I: IntoIterator<Item = &'a AnalyzerEstimate>,
{
    let log_odds: f64 = estimates
        .into_iter()
        .map(|est| {
            let ai = est.ai_probability.clamp(LIKELIHOOD_FLOOR, 1.0 - LIKELIHOOD_FLOOR);
            let human = est.human_probability.clamp(LIKELIHOOD_FLOOR, 1.0 - LIKELIHOOD_FLOOR);
            (ai / human).ln()
        })
        .sum();
    1.0 / (1.0 + (-log_odds).exp())
}

/// Weighted distance of each surviving analyzer from the aggregate.
pub fn uncertainty_breakdown(result: &EnsembleResult) -> BTreeMap<String, f64> {
    result
        .surviving_estimates()
        .map(|(est, weight)| {
            (
                est.analyzer_name.clone(),
                weight * (est.ai_probability - result.ai_probability).abs(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Classification, MetricSet};
    use approx::assert_relative_eq;

    fn result(probs: &[(&str, f64, f64)], weighted_confidence: f64, agreement: f64) -> EnsembleResult {
        let mut individual = BTreeMap::new();
        let mut weights = BTreeMap::new();
        for (name, p, w) in probs {
            individual.insert(
                name.to_string(),
                AnalyzerEstimate::new(name, *p, MetricSet::new(0.8)),
            );
            weights.insert(name.to_string(), *w);
        }
        let ai: f64 = probs.iter().map(|(_, p, w)| p * w).sum();
        EnsembleResult {
            classification: Classification::Indeterminate,
            ai_probability: ai,
            human_probability: 1.0 - ai,
            agreement_score: agreement,
            weighted_confidence,
            individual_results: individual,
            aggregation_weights: weights,
            failed_analyzers: BTreeMap::new(),
            excluded_analyzers: Vec::new(),
            ai_threshold: 0.6,
            human_threshold: 0.4,
            truncated: false,
            best_thresholds: None,
        }
    }

    #[test]
    fn test_certainty_levels() {
        assert_eq!(CertaintyLevel::from_score(0.81), CertaintyLevel::VeryHigh);
        assert_eq!(CertaintyLevel::from_score(0.8), CertaintyLevel::High);
        assert_eq!(CertaintyLevel::from_score(0.5), CertaintyLevel::Medium);
        assert_eq!(CertaintyLevel::from_score(0.3), CertaintyLevel::Low);
        assert_eq!(CertaintyLevel::from_score(0.0), CertaintyLevel::VeryLow);
        assert_eq!(CertaintyLevel::VeryHigh.as_str(), "Very High");
    }

    #[test]
    fn test_certainty_blends() {
        let r = result(&[("a", 0.7, 1.0)], 0.8, 0.5);
        let product = UncertaintyEstimator::default();
        assert_relative_eq!(product.prediction_certainty(&r), 0.4);

        let weighted = UncertaintyEstimator::new(UncertaintySettings {
            blend: CertaintyBlend::Weighted { confidence_weight: 0.25 },
            ..Default::default()
        });
        assert_relative_eq!(weighted.prediction_certainty(&r), 0.25 * 0.8 + 0.75 * 0.5);
    }

    #[test]
    fn test_bayesian_blend() {
        let r = result(&[("a", 0.8, 0.5), ("b", 0.8, 0.5)], 0.8, 1.0);
        let p = bayesian_probability(r.surviving_estimates().map(|(e, _)| e));
        assert_relative_eq!(p, 16.0 / 17.0, epsilon = 1e-9);

        assert_relative_eq!(bayesian_probability(Vec::<&AnalyzerEstimate>::new()), 0.5);

        let opposed = result(&[("a", 0.8, 0.5), ("b", 0.2, 0.5)], 0.8, 0.4);
        let p = bayesian_probability(opposed.surviving_estimates().map(|(e, _)| e));
        assert_relative_eq!(p, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_bootstrap_is_reproducible_and_bounded() {
        let est = UncertaintyEstimator::default();
        let probs = [0.2, 0.4, 0.6, 0.9];
        let a = est.bootstrap_interval(&probs).unwrap();
        let b = est.bootstrap_interval(&probs).unwrap();
        assert_eq!(a, b);
        assert!(a.lower <= a.mean && a.mean <= a.upper);
        assert!(a.lower >= 0.2 && a.upper <= 0.9);
        assert_eq!(a.resamples, 1000);
        assert!(est.bootstrap_interval(&[]).is_none());
    }

    #[test]
    fn test_bootstrap_of_identical_values_is_degenerate() {
        let a = UncertaintyEstimator::default()
            .bootstrap_interval(&[0.7, 0.7, 0.7])
            .unwrap();
        assert_relative_eq!(a.width(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(a.mean, 0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_breakdown_weights_distance() {
        let r = result(&[("a", 0.9, 0.5), ("b", 0.5, 0.5)], 0.8, 0.6);
        // aggregate is 0.7
        let breakdown = uncertainty_breakdown(&r);
        assert_relative_eq!(breakdown["a"], 0.1, epsilon = 1e-12);
        assert_relative_eq!(breakdown["b"], 0.1, epsilon = 1e-12);

        let u = UncertaintyEstimator::default().prediction_uncertainty(&r);
        assert_relative_eq!(u.total_disagreement, 0.2, epsilon = 1e-12);
        assert_relative_eq!(u.threshold_distance, 0.4, epsilon = 1e-12);
        assert_eq!(u.certainty_level, CertaintyLevel::Medium);
        assert_eq!(u.recommendation, CertaintyLevel::Medium.recommendation());
    }
}
