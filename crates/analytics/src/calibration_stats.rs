//! Probability calibration quality of ensemble scores.

use serde::{Deserialize, Serialize};

/// Calibration error statistics over a set of scored, labeled texts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStats {
    /// Expected Calibration Error (lower is better)
    pub ece: f64,
    /// Maximum Calibration Error
    pub mce: f64,
    /// Mean squared error of the AI probabilities
    pub brier_score: f64,
    pub sample_size: usize,
    /// Non-empty reliability diagram bins, lowest probability first
    pub reliability_bins: Vec<ReliabilityBin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityBin {
    pub lower: f64,
    pub upper: f64,
    pub avg_predicted: f64,
    /// Fraction of texts in the bin that are actually AI
    pub actual_positive_rate: f64,
    pub count: usize,
}

/// Bins `(ai_probability, actually_ai)` pairs into `bins` equal-width
/// buckets. Returns `None` for empty input or zero bins.
pub fn calibration_stats(predictions: &[(f64, bool)], bins: usize) -> Option<CalibrationStats> {
    if predictions.is_empty() || bins == 0 {
        return None;
    }
    let mut buckets: Vec<Vec<(f64, bool)>> = vec![Vec::new(); bins];
    for &(pred, outcome) in predictions {
        let p = pred.clamp(0.0, 1.0);
        let idx = ((p * bins as f64) as usize).min(bins - 1);
        buckets[idx].push((p, outcome));
    }

    let n = predictions.len() as f64;
    let mut reliability_bins = Vec::new();
    let mut ece = 0.0;
    let mut mce: f64 = 0.0;

    for (i, bucket) in buckets.iter().enumerate() {
        if bucket.is_empty() {
            continue;
        }
        let avg_predicted = bucket.iter().map(|(p, _)| p).sum::<f64>() / bucket.len() as f64;
        let actual_positive_rate =
            bucket.iter().filter(|(_, o)| *o).count() as f64 / bucket.len() as f64;
        let gap = (avg_predicted - actual_positive_rate).abs();

        ece += gap * bucket.len() as f64 / n;
        mce = mce.max(gap);

        reliability_bins.push(ReliabilityBin {
            lower: i as f64 / bins as f64,
            upper: (i + 1) as f64 / bins as f64,
            avg_predicted,
            actual_positive_rate,
            count: bucket.len(),
        });
    }

    let brier_score = predictions
        .iter()
        .map(|&(pred, outcome)| {
            let y = if outcome { 1.0 } else { 0.0 };
            (pred.clamp(0.0, 1.0) - y).powi(2)
        })
        .sum::<f64>()
        / n;

    Some(CalibrationStats {
        ece,
        mce,
        brier_score,
        sample_size: predictions.len(),
        reliability_bins,
    })
}
