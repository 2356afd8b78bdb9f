//! Batch-level reliability of the ensemble over many texts.

use std::collections::BTreeMap;

use analysis_core::stats::{mean, shannon_entropy, std_dev};
use analysis_core::EnsembleResult;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, ContinuousCDF};

/// Weighted confidence above which a prediction counts as high-confidence.
const HIGH_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredibleInterval {
    pub credibility_level: f64,
    pub posterior_alpha: f64,
    pub posterior_beta: f64,
    pub posterior_mean: f64,
    pub posterior_mode: f64,
    pub lower: f64,
    pub upper: f64,
    /// Texts counted as AI (probability above 0.5).
    pub successes: usize,
    pub trials: usize,
}

/// Beta-binomial credible interval for the AI share of a batch.
///
/// Each probability above 0.5 counts as one AI outcome; the posterior is
/// `Beta(prior_alpha + successes, prior_beta + failures)`.
pub fn bayesian_credible_interval(
    ai_probabilities: &[f64],
    prior_alpha: f64,
    prior_beta: f64,
    credibility_level: f64,
) -> Option<CredibleInterval> {
    if ai_probabilities.is_empty() || prior_alpha <= 0.0 || prior_beta <= 0.0 {
        return None;
    }
    let trials = ai_probabilities.len();
    let successes = ai_probabilities.iter().filter(|&&p| p > 0.5).count();

    let alpha = prior_alpha + successes as f64;
    let beta = prior_beta + (trials - successes) as f64;
    let posterior = Beta::new(alpha, beta).ok()?;

    let tail = (1.0 - credibility_level.clamp(0.0, 1.0)) / 2.0;
    let posterior_mean = alpha / (alpha + beta);
    let posterior_mode = if alpha > 1.0 && beta > 1.0 {
        (alpha - 1.0) / (alpha + beta - 2.0)
    } else {
        posterior_mean
    };

    Some(CredibleInterval {
        credibility_level,
        posterior_alpha: alpha,
        posterior_beta: beta,
        posterior_mean,
        posterior_mode,
        lower: posterior.inverse_cdf(tail),
        upper: posterior.inverse_cdf(1.0 - tail),
        successes,
        trials,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReliability {
    pub reliability_score: f64,
    pub grade: String,
    pub mean_confidence: f64,
    pub std_confidence: f64,
    pub high_confidence_ratio: f64,
    pub mean_ai_probability: f64,
    pub std_ai_probability: f64,
    pub stability_score: f64,
    pub diversity_score: f64,
    pub total_predictions: usize,
    pub recommendation: String,
}

/// Summarizes how dependable a batch of ensemble outputs is.
///
/// Score = 0.5 x high-confidence ratio + 0.3 x stability + 0.2 x diversity,
/// where stability penalizes spread in ai_probability and diversity is the
/// normalized entropy of the rounded probabilities.
pub fn model_reliability(results: &[EnsembleResult]) -> Option<ModelReliability> {
    if results.is_empty() {
        return None;
    }
    let confidences: Vec<f64> = results.iter().map(|r| r.weighted_confidence).collect();
    let probabilities: Vec<f64> = results.iter().map(|r| r.ai_probability).collect();

    let high_ratio = confidences.iter().filter(|&&c| c > HIGH_CONFIDENCE).count() as f64
        / results.len() as f64;
    let std_ai = std_dev(&probabilities);
    let stability = (1.0 - std_ai / 0.5).clamp(0.0, 1.0);

    let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();
    for p in &probabilities {
        *buckets.entry((p * 100.0).round() as i64).or_insert(0) += 1;
    }
    let diversity = if buckets.len() > 1 {
        shannon_entropy(buckets.values().copied()) / (buckets.len() as f64).log2()
    } else {
        0.0
    };

    let score = high_ratio * 0.5 + stability * 0.3 + diversity * 0.2;

    Some(ModelReliability {
        reliability_score: score,
        grade: grade(score).to_string(),
        mean_confidence: mean(&confidences),
        std_confidence: std_dev(&confidences),
        high_confidence_ratio: high_ratio,
        mean_ai_probability: mean(&probabilities),
        std_ai_probability: std_ai,
        stability_score: stability,
        diversity_score: diversity,
        total_predictions: results.len(),
        recommendation: recommendation(score).to_string(),
    })
}

fn grade(score: f64) -> &'static str {
    match score {
        s if s >= 0.9 => "A+",
        s if s >= 0.8 => "A",
        s if s >= 0.7 => "B+",
        s if s >= 0.6 => "B",
        s if s >= 0.5 => "C",
        _ => "D",
    }
}

fn recommendation(score: f64) -> &'static str {
    match score {
        s if s >= 0.8 => "Highly reliable. Suitable for consequential decisions.",
        s if s >= 0.6 => "Reliable for most uses.",
        s if s >= 0.4 => "Moderately reliable. Validate further or recalibrate.",
        _ => "Low reliability. Review analyzer weights and calibration data.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::Classification;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn result(ai_probability: f64, weighted_confidence: f64) -> EnsembleResult {
        EnsembleResult {
            classification: Classification::Indeterminate,
            ai_probability,
            human_probability: 1.0 - ai_probability,
            agreement_score: 1.0,
            weighted_confidence,
            individual_results: BTreeMap::new(),
            aggregation_weights: BTreeMap::new(),
            failed_analyzers: BTreeMap::new(),
            excluded_analyzers: Vec::new(),
            ai_threshold: 0.6,
            human_threshold: 0.4,
            truncated: false,
            best_thresholds: None,
        }
    }

    #[test]
    fn test_credible_interval_uniform_prior() {
        let ci = bayesian_credible_interval(&[0.9, 0.8, 0.2, 0.7], 1.0, 1.0, 0.95).unwrap();
        assert_eq!(ci.successes, 3);
        assert_relative_eq!(ci.posterior_alpha, 4.0);
        assert_relative_eq!(ci.posterior_beta, 2.0);
        assert_relative_eq!(ci.posterior_mean, 4.0 / 6.0);
        assert_relative_eq!(ci.posterior_mode, 0.75);
        assert!(ci.lower < ci.posterior_mean && ci.posterior_mean < ci.upper);
        assert!(ci.lower > 0.0 && ci.upper < 1.0);
    }

    #[test]
    fn test_credible_interval_rejects_bad_input() {
        assert!(bayesian_credible_interval(&[], 1.0, 1.0, 0.95).is_none());
        assert!(bayesian_credible_interval(&[0.6], 0.0, 1.0, 0.95).is_none());
    }

    #[test]
    fn test_reliability_of_confident_varied_batch() {
        let results: Vec<EnsembleResult> = [0.1, 0.2, 0.8, 0.9]
            .iter()
            .map(|&p| result(p, 0.85))
            .collect();
        let rel = model_reliability(&results).unwrap();
        assert_relative_eq!(rel.high_confidence_ratio, 1.0);
        assert_relative_eq!(rel.diversity_score, 1.0);
        assert_eq!(rel.total_predictions, 4);
        assert!(rel.stability_score < 1.0);
        assert_relative_eq!(
            rel.reliability_score,
            0.5 + 0.3 * rel.stability_score + 0.2,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_diversity_is_stable_across_calls() {
        let results: Vec<EnsembleResult> = (0..40)
            .map(|i| result((i * 37 % 100) as f64 / 100.0, 0.6))
            .collect();
        let first = model_reliability(&results).unwrap();
        for _ in 0..20 {
            let again = model_reliability(&results).unwrap();
            assert_eq!(again.diversity_score.to_bits(), first.diversity_score.to_bits());
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_reliability_of_unsure_batch() {
        let results = vec![result(0.5, 0.1), result(0.5, 0.2)];
        let rel = model_reliability(&results).unwrap();
        assert_eq!(rel.high_confidence_ratio, 0.0);
        assert_eq!(rel.diversity_score, 0.0);
        assert_relative_eq!(rel.stability_score, 1.0);
        assert_relative_eq!(rel.reliability_score, 0.3);
        assert_eq!(rel.grade, "D");
        assert!(model_reliability(&[]).is_none());
    }
}
