//! Calibration Engine
//!
//! Searches analyzer weights and the AI threshold against labeled texts.
//! Analyzers run once per item; every candidate configuration re-aggregates
//! the cached outcomes, so the search never touches the live engine until
//! the final swap.

use analysis_core::{CalibrationResult, ConfusionMatrix, TextLabel, Thresholds, WeightVector};
use analysis_orchestrator::{weighted_score, AnalyzerOutcomes, EnsembleEngine};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::{check_counts, ValidationDataset};
use crate::error::CalibrationError;

/// Metric the search maximizes. The other one breaks ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    F1,
    Accuracy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStrategy {
    /// Every point of the weight simplex at `weight_step` resolution.
    Exhaustive,
    /// Greedy single-unit weight transfers from an even split, taking the
    /// best improving move each round.
    CoordinateAscent { max_rounds: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSettings {
    pub weight_step: f64,
    pub threshold_step: f64,
    pub min_per_class: usize,
    pub objective: Objective,
    pub strategy: SearchStrategy,
    /// Upper bound on exhaustive weight candidates.
    pub max_candidates: usize,
    /// Weight every analyzer keeps, in `weight_step` units.
    ///
    /// At 0 the search may put all weight on a few analyzers. Texts on which
    /// those analyzers are excluded (too short, failed) then come back
    /// unavailable even when the others produced confident estimates.
    pub min_weight_units: usize,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            weight_step: 0.05,
            threshold_step: 0.01,
            min_per_class: 10,
            objective: Objective::F1,
            strategy: SearchStrategy::Exhaustive,
            max_candidates: 50_000,
            min_weight_units: 0,
        }
    }
}

/// A finished calibration and how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRun {
    pub result: CalibrationResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub candidates_evaluated: usize,
    pub items_used: usize,
    /// Items where no analyzer produced a usable estimate.
    pub items_skipped: usize,
    pub objective: Objective,
    pub strategy: SearchStrategy,
}

/// Analyzer outcomes for one dataset item, computed once.
#[derive(Debug, Clone)]
pub(crate) struct PreparedItem {
    pub outcomes: AnalyzerOutcomes,
    pub label: TextLabel,
}

#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub units: Vec<usize>,
    pub threshold: f64,
    pub confusion: ConfusionMatrix,
}

pub(crate) struct SearchOutcome {
    pub best: Candidate,
    pub weights: WeightVector,
    pub candidates_evaluated: usize,
}

pub struct CalibrationEngine {
    settings: CalibrationSettings,
}

impl CalibrationEngine {
    pub fn new(settings: CalibrationSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CalibrationSettings {
        &self.settings
    }

    /// Finds the best configuration for `engine` on `dataset` without
    /// changing the engine.
    pub fn calibrate(
        &self,
        engine: &EnsembleEngine,
        dataset: &ValidationDataset,
    ) -> Result<CalibrationRun, CalibrationError> {
        let started_at = Utc::now();
        dataset.validate(self.settings.min_per_class)?;
        let grid = self.grid()?;

        let names = engine.analyzer_names();
        tracing::info!(
            "Calibrating {} analyzers on {} texts ({:?}, {:?})",
            names.len(),
            dataset.len(),
            self.settings.strategy,
            self.settings.objective
        );

        let (items, skipped) = prepare(engine, dataset);
        if skipped > 0 {
            tracing::warn!("{} texts produced no usable estimate and were skipped", skipped);
        }
        let ai = items.iter().filter(|i| i.label.is_ai()).count();
        check_counts(ai, items.len() - ai, self.settings.min_per_class)?;

        let outcome = self.search(&names, &items, grid)?;

        let labels: Vec<TextLabel> = items.iter().map(|i| i.label).collect();
        let scores = scores_under(&items, &outcome.weights);
        let report = analytics::analyze(&labels, &scores)?;

        let best = &outcome.best;
        let result = CalibrationResult {
            best_weights: outcome.weights.clone(),
            best_thresholds: Thresholds::new(best.threshold),
            best_f1_score: best.confusion.f1(),
            best_accuracy: best.confusion.accuracy(),
            roc_auc: report.roc_auc,
            pr_auc: report.pr_auc,
            confusion_matrix: best.confusion,
            samples: items.len(),
        };

        let finished_at = Utc::now();
        tracing::info!(
            "Calibration finished: F1 {:.3}, accuracy {:.3}, ROC AUC {:.3}, ai_threshold {:.2} ({} candidates, {} ms)",
            result.best_f1_score,
            result.best_accuracy,
            result.roc_auc,
            result.best_thresholds.ai_threshold,
            outcome.candidates_evaluated,
            (finished_at - started_at).num_milliseconds()
        );

        Ok(CalibrationRun {
            result,
            started_at,
            finished_at,
            candidates_evaluated: outcome.candidates_evaluated,
            items_used: items.len(),
            items_skipped: skipped,
            objective: self.settings.objective,
            strategy: self.settings.strategy,
        })
    }

    /// Calibrates, then installs the result as the engine's active
    /// configuration. On error the engine is left as it was.
    pub fn calibrate_and_apply(
        &self,
        engine: &EnsembleEngine,
        dataset: &ValidationDataset,
    ) -> Result<CalibrationRun, CalibrationError> {
        let run = self.calibrate(engine, dataset)?;
        engine.apply_calibration(run.result.clone());
        Ok(run)
    }

    pub(crate) fn grid(&self) -> Result<Grid, CalibrationError> {
        Ok(Grid {
            weight_units: steps_per_unit(self.settings.weight_step, "weight")?,
            threshold_steps: steps_per_unit(self.settings.threshold_step, "threshold")?,
            min_units: self.settings.min_weight_units,
        })
    }

    pub(crate) fn search(
        &self,
        names: &[&str],
        items: &[PreparedItem],
        grid: Grid,
    ) -> Result<SearchOutcome, CalibrationError> {
        if names.is_empty() {
            return Err(CalibrationError::InvalidGrid("no analyzers to weight".into()));
        }
        if grid.min_units * names.len() > grid.weight_units {
            return Err(CalibrationError::InvalidGrid(format!(
                "a minimum of {} weight units for {} analyzers exceeds the {} available",
                grid.min_units,
                names.len(),
                grid.weight_units
            )));
        }
        let (best, candidates_evaluated) = match self.settings.strategy {
            SearchStrategy::Exhaustive => self.exhaustive(names, items, grid)?,
            SearchStrategy::CoordinateAscent { max_rounds } => {
                self.coordinate_ascent(names, items, grid, max_rounds)
            }
        };
        let weights = weights_from_units(names, &best.units, grid.weight_units);
        Ok(SearchOutcome {
            best,
            weights,
            candidates_evaluated,
        })
    }

    fn exhaustive(
        &self,
        names: &[&str],
        items: &[PreparedItem],
        grid: Grid,
    ) -> Result<(Candidate, usize), CalibrationError> {
        let free = grid.weight_units - grid.min_units * names.len();
        let count = composition_count(free, names.len());
        if count > self.settings.max_candidates as u128 {
            return Err(CalibrationError::InvalidGrid(format!(
                "{} weight candidates exceed the limit of {}; use a coarser weight step",
                count, self.settings.max_candidates
            )));
        }
        let mut candidates = compositions(free, names.len());
        for units in &mut candidates {
            units.iter_mut().for_each(|u| *u += grid.min_units);
        }
        let scored: Vec<Candidate> = candidates
            .into_par_iter()
            .map(|units| self.evaluate(names, items, grid, units))
            .collect();
        let evaluated = scored.len();
        let best = self
            .pick_best(scored)
            .ok_or_else(|| CalibrationError::InvalidGrid("empty weight grid".into()))?;
        Ok((best, evaluated))
    }

    fn coordinate_ascent(
        &self,
        names: &[&str],
        items: &[PreparedItem],
        grid: Grid,
        max_rounds: usize,
    ) -> (Candidate, usize) {
        let mut current = self.evaluate(names, items, grid, even_split(grid.weight_units, names.len()));
        let mut evaluated = 1;

        for round in 0..max_rounds {
            let mut neighbours = Vec::new();
            for from in 0..names.len() {
                if current.units[from] <= grid.min_units {
                    continue;
                }
                for to in 0..names.len() {
                    if to != from {
                        let mut units = current.units.clone();
                        units[from] -= 1;
                        units[to] += 1;
                        neighbours.push(units);
                    }
                }
            }
            let scored: Vec<Candidate> = neighbours
                .into_par_iter()
                .map(|units| self.evaluate(names, items, grid, units))
                .collect();
            evaluated += scored.len();

            match self.pick_best(scored) {
                Some(best) if self.better(&best.confusion, &current.confusion) => current = best,
                _ => {
                    tracing::debug!("Coordinate ascent converged after {} rounds", round);
                    break;
                }
            }
        }
        (current, evaluated)
    }

    /// Scores one weight candidate and picks its best threshold.
    fn evaluate(&self, names: &[&str], items: &[PreparedItem], grid: Grid, units: Vec<usize>) -> Candidate {
        let weights = weights_from_units(names, &units, grid.weight_units);
        let mut scored: Vec<(f64, bool)> = scores_under(items, &weights)
            .into_iter()
            .zip(items)
            .map(|(s, item)| (s, item.label.is_ai()))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        // ai_below[i] = AI items among the i lowest scores
        let mut ai_below = Vec::with_capacity(scored.len() + 1);
        ai_below.push(0usize);
        for (_, is_ai) in &scored {
            ai_below.push(ai_below[ai_below.len() - 1] + usize::from(*is_ai));
        }
        let total_ai = ai_below[scored.len()];
        let total_human = scored.len() - total_ai;

        let mut best: Option<(f64, ConfusionMatrix)> = None;
        for step in 0..=grid.threshold_steps {
            let threshold = step as f64 / grid.threshold_steps as f64;
            let below = scored.partition_point(|(s, _)| *s <= threshold);
            let false_negatives = ai_below[below];
            let true_positives = total_ai - false_negatives;
            let false_positives = (scored.len() - below) - true_positives;
            let confusion = ConfusionMatrix {
                true_positives,
                false_positives,
                true_negatives: total_human - false_positives,
                false_negatives,
            };
            if best
                .as_ref()
                .map_or(true, |(_, b)| self.better(&confusion, b))
            {
                best = Some((threshold, confusion));
            }
        }

        let (threshold, confusion) = best.unwrap_or((0.0, ConfusionMatrix::default()));
        Candidate {
            units,
            threshold,
            confusion,
        }
    }

    /// First strictly best candidate in enumeration order.
    fn pick_best(&self, candidates: Vec<Candidate>) -> Option<Candidate> {
        let mut iter = candidates.into_iter();
        let mut best = iter.next()?;
        for candidate in iter {
            if self.better(&candidate.confusion, &best.confusion) {
                best = candidate;
            }
        }
        Some(best)
    }

    fn better(&self, a: &ConfusionMatrix, b: &ConfusionMatrix) -> bool {
        let (pa, sa, pb, sb) = match self.settings.objective {
            Objective::F1 => (a.f1(), a.accuracy(), b.f1(), b.accuracy()),
            Objective::Accuracy => (a.accuracy(), a.f1(), b.accuracy(), b.f1()),
        };
        pa > pb || (pa == pb && sa > sb)
    }
}

impl Default for CalibrationEngine {
    fn default() -> Self {
        Self::new(CalibrationSettings::default())
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Grid {
    /// Weight resolution: weights are multiples of 1 / weight_units.
    pub weight_units: usize,
    pub threshold_steps: usize,
    /// Floor on every analyzer's units.
    pub min_units: usize,
}

/// Runs the analyzers once per item; items with no usable estimate are dropped.
pub(crate) fn prepare(engine: &EnsembleEngine, dataset: &ValidationDataset) -> (Vec<PreparedItem>, usize) {
    let prepared: Vec<PreparedItem> = dataset
        .items()
        .par_iter()
        .map(|item| PreparedItem {
            outcomes: engine.collect_outcomes(&item.text),
            label: item.label,
        })
        .collect();
    let total = prepared.len();
    let usable: Vec<PreparedItem> = prepared
        .into_iter()
        .filter(|item| item.outcomes.has_usable_estimate())
        .collect();
    let skipped = total - usable.len();
    (usable, skipped)
}

/// Ensemble AI probability per item; items with no weighted survivor score 0.
pub(crate) fn scores_under(items: &[PreparedItem], weights: &WeightVector) -> Vec<f64> {
    items
        .iter()
        .map(|item| weighted_score(&item.outcomes, weights).unwrap_or(0.0))
        .collect()
}

fn steps_per_unit(step: f64, what: &str) -> Result<usize, CalibrationError> {
    if !(step.is_finite() && step > 0.0 && step <= 1.0) {
        return Err(CalibrationError::InvalidGrid(format!(
            "{} step must be in (0, 1], got {}",
            what, step
        )));
    }
    let steps = (1.0 / step).round();
    if (steps * step - 1.0).abs() > 1e-9 {
        return Err(CalibrationError::InvalidGrid(format!(
            "{} step {} does not divide 1 evenly",
            what, step
        )));
    }
    Ok(steps as usize)
}

fn weights_from_units(names: &[&str], units: &[usize], total: usize) -> WeightVector {
    WeightVector::new(
        names
            .iter()
            .zip(units)
            .map(|(name, &u)| (*name, u as f64 / total as f64)),
    )
}

/// Number of ways to split `total` units over `parts` analyzers.
fn composition_count(total: usize, parts: usize) -> u128 {
    if parts == 0 {
        return 0;
    }
    // C(total + parts - 1, parts - 1)
    let n = (total + parts - 1) as u128;
    let k = (parts - 1) as u128;
    let mut count: u128 = 1;
    for i in 0..k {
        count = count.saturating_mul(n - i) / (i + 1);
    }
    count
}

/// All splits of `total` units over `parts` slots, lexicographic order.
fn compositions(total: usize, parts: usize) -> Vec<Vec<usize>> {
    fn fill(remaining: usize, parts: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if parts == 1 {
            current.push(remaining);
            out.push(current.clone());
            current.pop();
            return;
        }
        for k in 0..=remaining {
            current.push(k);
            fill(remaining - k, parts - 1, current, out);
            current.pop();
        }
    }

    let mut out = Vec::new();
    if parts > 0 {
        fill(total, parts, &mut Vec::with_capacity(parts), &mut out);
    }
    out
}

fn even_split(total: usize, parts: usize) -> Vec<usize> {
    (0..parts)
        .map(|i| total / parts + usize::from(i < total % parts))
        .collect()
}
