//! Batch-level intervals over many ensemble outputs.
//!
//! `confidence_interval` bounds the mean AI probability of a batch (or, for
//! Wilson, the share of texts called AI). `bootstrap_batch` resamples whole
//! results so the AI probability and the confidence move together.

use analysis_core::stats::{mean, median, percentile_value, population_std_dev};
use analysis_core::EnsembleResult;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalMethod {
    /// Percentile bootstrap of the mean.
    Bootstrap,
    /// Mean +- z x standard error.
    Normal,
    /// Wilson score interval for the proportion above 0.5.
    Wilson,
}

impl IntervalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalMethod::Bootstrap => "bootstrap",
            IntervalMethod::Normal => "normal",
            IntervalMethod::Wilson => "wilson",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub method: IntervalMethod,
    pub confidence_level: f64,
    pub samples: usize,
    pub mean: f64,
    pub std: f64,
    pub lower: f64,
    pub upper: f64,
    pub margin_of_error: f64,
    /// Normal: analytic standard error. Bootstrap: std of the resampled means.
    pub std_error: Option<f64>,
    /// Wilson only: observed share of predictions above 0.5.
    pub proportion: Option<f64>,
}

/// Two-sided standard normal quantile for `confidence_level`.
fn z_score(confidence_level: f64) -> Option<f64> {
    let normal = Normal::new(0.0, 1.0).ok()?;
    Some(normal.inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0))
}

/// Interval around a batch of AI probabilities.
///
/// `resamples` and `seed` only matter for [`IntervalMethod::Bootstrap`].
/// Returns `None` for an empty batch or a level outside (0, 1).
pub fn confidence_interval(
    predictions: &[f64],
    confidence_level: f64,
    method: IntervalMethod,
    resamples: usize,
    seed: u64,
) -> Option<ConfidenceInterval> {
    if predictions.is_empty() || !(confidence_level > 0.0 && confidence_level < 1.0) {
        return None;
    }
    let n = predictions.len() as f64;
    let mu = mean(predictions);
    let std = population_std_dev(predictions);

    let (lower, upper, margin, std_error, proportion) = match method {
        IntervalMethod::Bootstrap => {
            if resamples == 0 {
                return None;
            }
            let means = resampled_means(&[predictions], resamples, seed).pop()?;
            let tail = (1.0 - confidence_level) / 2.0 * 100.0;
            let lower = percentile_value(&means, tail);
            let upper = percentile_value(&means, 100.0 - tail);
            (lower, upper, (upper - lower) / 2.0, Some(population_std_dev(&means)), None)
        }
        IntervalMethod::Normal => {
            let z = z_score(confidence_level)?;
            let se = std / n.sqrt();
            (mu - z * se, mu + z * se, z * se, Some(se), None)
        }
        IntervalMethod::Wilson => {
            let z = z_score(confidence_level)?;
            let p = predictions.iter().filter(|&&x| x > 0.5).count() as f64 / n;
            let z2 = z * z;
            let denominator = 1.0 + z2 / n;
            let center = (p + z2 / (2.0 * n)) / denominator;
            let margin = z * ((p * (1.0 - p) + z2 / (4.0 * n)) / n).sqrt() / denominator;
            (center - margin, center + margin, margin, None, Some(p))
        }
    };

    Some(ConfidenceInterval {
        method,
        confidence_level,
        samples: predictions.len(),
        mean: mu,
        std,
        lower,
        upper,
        margin_of_error: margin,
        std_error,
        proportion,
    })
}

/// Summary of one bootstrapped series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledSummary {
    pub mean: f64,
    pub std: f64,
    /// 2.5th and 97.5th percentiles of the resampled means.
    pub lower: f64,
    pub upper: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl ResampledSummary {
    fn from_means(means: &[f64]) -> Self {
        Self {
            mean: mean(means),
            std: population_std_dev(means),
            lower: percentile_value(means, 2.5),
            upper: percentile_value(means, 97.5),
            median: median(means),
            min: means.iter().copied().fold(f64::INFINITY, f64::min),
            max: means.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchBootstrap {
    pub ai_probability: ResampledSummary,
    pub confidence: ResampledSummary,
    pub resamples: usize,
    pub original_samples: usize,
}

/// Bootstraps a batch of results, resampling AI probability and weighted
/// confidence with the same indices.
pub fn bootstrap_batch(results: &[EnsembleResult], resamples: usize, seed: u64) -> Option<BatchBootstrap> {
    if results.is_empty() || resamples == 0 {
        return None;
    }
    let probabilities: Vec<f64> = results.iter().map(|r| r.ai_probability).collect();
    let confidences: Vec<f64> = results.iter().map(|r| r.weighted_confidence).collect();

    let mut columns = resampled_means(&[probabilities.as_slice(), confidences.as_slice()], resamples, seed);
    let confidence = columns.pop()?;
    let ai_probability = columns.pop()?;
    tracing::debug!("Bootstrapped {} results with {} resamples", results.len(), resamples);

    Some(BatchBootstrap {
        ai_probability: ResampledSummary::from_means(&ai_probability),
        confidence: ResampledSummary::from_means(&confidence),
        resamples,
        original_samples: results.len(),
    })
}

/// Means of every column under `resamples` shared index draws.
///
/// Resample `i` uses its own RNG seeded with `seed + i`, so the output does
/// not depend on how rayon schedules the work.
fn resampled_means(columns: &[&[f64]], resamples: usize, seed: u64) -> Vec<Vec<f64>> {
    let n = columns.first().map_or(0, |c| c.len());
    let per_resample: Vec<Vec<f64>> = (0..resamples)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let mut totals = vec![0.0; columns.len()];
            for _ in 0..n {
                let index = rng.gen_range(0..n);
                for (total, column) in totals.iter_mut().zip(columns) {
                    *total += column[index];
                }
            }
            totals.into_iter().map(|t| t / n as f64).collect()
        })
        .collect();

    (0..columns.len())
        .map(|c| per_resample.iter().map(|row| row[c]).collect())
        .collect()
}
