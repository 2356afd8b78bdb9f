//! Reliability evaluation of the active configuration on labeled texts.

use analysis_core::{ConfusionMatrix, EnsembleResult, TextLabel};
use analysis_orchestrator::{aggregate, EnsembleEngine};
use analytics::{CalibrationStats, RocReport};
use confidence_metrics::{BatchBootstrap, ConfidenceInterval, CredibleInterval, IntervalMethod, ModelReliability};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::ValidationDataset;
use crate::error::CalibrationError;

const RELIABILITY_BINS: usize = 10;
const CREDIBILITY_LEVEL: f64 = 0.95;
const BOOTSTRAP_RESAMPLES: usize = 1000;
const BOOTSTRAP_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub samples: usize,
    /// Texts where the ensemble was unavailable; scored as not AI.
    pub unavailable: usize,
    pub ai_threshold: f64,
    pub calibrated: bool,
    pub confusion_matrix: ConfusionMatrix,
    pub accuracy: f64,
    pub f1_score: f64,
    pub roc: RocReport,
    pub calibration: Option<CalibrationStats>,
    pub reliability: Option<ModelReliability>,
    /// Beta posterior over the share of texts the ensemble calls AI.
    pub ai_share: Option<CredibleInterval>,
    /// Wilson score interval for the same share.
    pub ai_share_wilson: Option<ConfidenceInterval>,
    /// Normal-approximation interval for the mean AI probability.
    pub mean_probability: Option<ConfidenceInterval>,
    /// Paired bootstrap of AI probability and confidence over the batch.
    pub bootstrap: Option<BatchBootstrap>,
}

/// Runs the engine over `dataset` with its current configuration.
pub fn evaluate(
    engine: &EnsembleEngine,
    dataset: &ValidationDataset,
) -> Result<EvaluationReport, CalibrationError> {
    if dataset.is_empty() {
        return Err(CalibrationError::MalformedDataset("dataset is empty".into()));
    }
    // one snapshot for every text, so a concurrent swap cannot mix configurations
    let config = engine.config();
    let texts: Vec<&str> = dataset.items().iter().map(|i| i.text.as_str()).collect();
    let labels: Vec<TextLabel> = dataset.items().iter().map(|i| i.label).collect();

    let outputs: Vec<_> = texts
        .par_iter()
        .map(|text| aggregate(&engine.collect_outcomes(text), &config))
        .collect();
    let mut results: Vec<EnsembleResult> = Vec::with_capacity(outputs.len());
    let mut scores = Vec::with_capacity(outputs.len());
    for output in outputs {
        match output {
            Ok(result) => {
                scores.push(result.ai_probability);
                results.push(result);
            }
            Err(e) => {
                tracing::debug!("Scoring unavailable text as human: {}", e);
                scores.push(0.0);
            }
        }
    }
    let unavailable = texts.len() - results.len();

    let roc = analytics::analyze(&labels, &scores)?;
    let threshold = config.thresholds.ai_threshold;
    let confusion = analytics::confusion_at(&labels, &scores, threshold);

    let pairs: Vec<(f64, bool)> = scores
        .iter()
        .zip(&labels)
        .map(|(s, l)| (*s, l.is_ai()))
        .collect();
    let probabilities: Vec<f64> = results.iter().map(|r| r.ai_probability).collect();

    tracing::info!(
        "Evaluated {} texts: accuracy {:.3}, F1 {:.3}, ROC AUC {:.3} ({})",
        texts.len(),
        confusion.accuracy(),
        confusion.f1(),
        roc.roc_auc,
        roc.auc_grade.as_str()
    );

    Ok(EvaluationReport {
        samples: texts.len(),
        unavailable,
        ai_threshold: threshold,
        calibrated: config.is_calibrated(),
        confusion_matrix: confusion,
        accuracy: confusion.accuracy(),
        f1_score: confusion.f1(),
        roc,
        calibration: analytics::calibration_stats(&pairs, RELIABILITY_BINS),
        reliability: confidence_metrics::model_reliability(&results),
        ai_share: confidence_metrics::bayesian_credible_interval(
            &probabilities,
            1.0,
            1.0,
            CREDIBILITY_LEVEL,
        ),
        ai_share_wilson: confidence_metrics::confidence_interval(
            &probabilities,
            CREDIBILITY_LEVEL,
            IntervalMethod::Wilson,
            0,
            BOOTSTRAP_SEED,
        ),
        mean_probability: confidence_metrics::confidence_interval(
            &probabilities,
            CREDIBILITY_LEVEL,
            IntervalMethod::Normal,
            0,
            BOOTSTRAP_SEED,
        ),
        bootstrap: confidence_metrics::bootstrap_batch(&results, BOOTSTRAP_RESAMPLES, BOOTSTRAP_SEED),
    })
}
