//! Stratified k-fold cross-validation of the calibration search.

use analysis_core::stats::{mean, std_dev};
use analysis_core::{ConfusionMatrix, TextLabel, WeightVector};
use analysis_orchestrator::EnsembleEngine;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::calibrator::{prepare, scores_under, CalibrationEngine, PreparedItem};
use crate::dataset::{check_counts, ValidationDataset};
use crate::error::CalibrationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    pub fold: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub weights: WeightVector,
    pub ai_threshold: f64,
    pub f1_score: f64,
    pub accuracy: f64,
    /// Held-out ROC AUC; absent when the fold's curve cannot be built.
    pub roc_auc: Option<f64>,
    pub confusion_matrix: ConfusionMatrix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub folds: Vec<FoldResult>,
    pub mean_f1: f64,
    pub std_f1: f64,
    pub mean_accuracy: f64,
    pub std_accuracy: f64,
    pub mean_roc_auc: f64,
    pub std_roc_auc: f64,
    pub items_skipped: usize,
    pub seed: u64,
}

impl CalibrationEngine {
    /// Calibrates on k-1 folds and scores the held-out fold, for every fold.
    ///
    /// Folds are stratified by label after a seeded shuffle, so the report
    /// is reproducible for a given seed.
    pub fn cross_validate(
        &self,
        engine: &EnsembleEngine,
        dataset: &ValidationDataset,
        folds: usize,
        seed: u64,
    ) -> Result<CrossValidationReport, CalibrationError> {
        if folds < 2 {
            return Err(CalibrationError::InvalidGrid(format!(
                "cross-validation needs at least 2 folds, got {}",
                folds
            )));
        }
        let required = self.settings().min_per_class.max(folds);
        dataset.validate(required)?;
        let grid = self.grid()?;

        let (items, skipped) = prepare(engine, dataset);
        let ai = items.iter().filter(|i| i.label.is_ai()).count();
        check_counts(ai, items.len() - ai, required)?;

        let assignment = assign_folds(&items, folds, seed);
        let names = engine.analyzer_names();
        tracing::info!(
            "Cross-validating on {} texts with {} folds (seed {})",
            items.len(),
            folds,
            seed
        );

        let mut results = Vec::with_capacity(folds);
        for fold in 0..folds {
            let mut train_items = Vec::new();
            let mut test_items = Vec::new();
            for (item, &assigned) in items.iter().zip(&assignment) {
                if assigned == fold {
                    test_items.push(item.clone());
                } else {
                    train_items.push(item.clone());
                }
            }

            let outcome = self.search(&names, &train_items, grid)?;
            let threshold = outcome.best.threshold;

            let scores = scores_under(&test_items, &outcome.weights);
            let labels: Vec<TextLabel> = test_items.iter().map(|i| i.label).collect();
            let confusion = analytics::confusion_at(&labels, &scores, threshold);
            let roc_auc = analytics::analyze(&labels, &scores).ok().map(|r| r.roc_auc);

            tracing::debug!(
                "Fold {}: F1 {:.3}, accuracy {:.3}",
                fold,
                confusion.f1(),
                confusion.accuracy()
            );
            results.push(FoldResult {
                fold,
                train_size: train_items.len(),
                test_size: test_items.len(),
                weights: outcome.weights,
                ai_threshold: threshold,
                f1_score: confusion.f1(),
                accuracy: confusion.accuracy(),
                roc_auc,
                confusion_matrix: confusion,
            });
        }

        let f1: Vec<f64> = results.iter().map(|r| r.f1_score).collect();
        let accuracy: Vec<f64> = results.iter().map(|r| r.accuracy).collect();
        let auc: Vec<f64> = results.iter().filter_map(|r| r.roc_auc).collect();

        Ok(CrossValidationReport {
            mean_f1: mean(&f1),
            std_f1: std_dev(&f1),
            mean_accuracy: mean(&accuracy),
            std_accuracy: std_dev(&accuracy),
            mean_roc_auc: mean(&auc),
            std_roc_auc: std_dev(&auc),
            folds: results,
            items_skipped: skipped,
            seed,
        })
    }
}

/// Fold index per item: each class is shuffled and dealt round-robin.
fn assign_folds(items: &[PreparedItem], folds: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0; items.len()];
    for class in [TextLabel::Ai, TextLabel::Human] {
        let mut indices: Vec<usize> = (0..items.len()).filter(|&i| items[i].label == class).collect();
        indices.shuffle(&mut rng);
        for (position, index) in indices.into_iter().enumerate() {
            assignment[index] = position % folds;
        }
    }
    assignment
}
