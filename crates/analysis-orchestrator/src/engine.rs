use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use analysis_core::stats::population_std_dev;
use analysis_core::{
    clamp_unit, AnalysisError, AnalyzerEstimate, CalibrationResult, EnsembleError, EnsembleResult,
    RegistryError, TextAnalyzer, WeightVector,
};
use confidence_metrics::{PredictionUncertainty, UncertaintyEstimator};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use text_analyzers::AnalyzerRegistry;

use crate::config::{ConfigHandle, EngineSettings, EnsembleConfig};

/// Population std of probabilities that maps to zero agreement.
const MAX_DISAGREEMENT_STD: f64 = 0.5;

/// What one analyzer produced for one text.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerOutcome {
    pub analyzer: String,
    pub result: Result<AnalyzerEstimate, AnalysisError>,
}

/// Raw per-analyzer outcomes for one text, before aggregation.
///
/// Analyzers are pure, so the same outcomes can be re-aggregated under any
/// number of hypothetical configurations.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerOutcomes {
    pub outcomes: Vec<AnalyzerOutcome>,
    pub truncated: bool,
}

impl AnalyzerOutcomes {
    /// True when at least one analyzer produced a non-zero-confidence estimate.
    pub fn has_usable_estimate(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(&o.result, Ok(est) if est.confidence > 0.0))
    }
}

/// Ensemble result plus its optional uncertainty annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedResult {
    #[serde(flatten)]
    pub result: EnsembleResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<PredictionUncertainty>,
}

/// Runs every analyzer on a text and combines their estimates.
pub struct EnsembleEngine {
    analyzers: Vec<Arc<dyn TextAnalyzer>>,
    config: ConfigHandle,
    settings: EngineSettings,
    uncertainty: Option<UncertaintyEstimator>,
}

impl EnsembleEngine {
    pub fn new(analyzers: Vec<Arc<dyn TextAnalyzer>>, settings: EngineSettings) -> Self {
        let names: Vec<&str> = analyzers.iter().map(|a| a.name()).collect();
        let config = EnsembleConfig::for_analyzers(&names);
        let uncertainty = settings.uncertainty.clone().map(UncertaintyEstimator::new);
        Self {
            analyzers,
            config: ConfigHandle::new(config),
            settings,
            uncertainty,
        }
    }

    /// All built-in analyzers with default settings.
    pub fn with_defaults() -> Self {
        Self::new(AnalyzerRegistry::builtin().create_every(), EngineSettings::default())
    }

    /// The named analyzers from `registry`; every registered one when `names` is empty.
    pub fn from_registry<S: AsRef<str>>(
        registry: &AnalyzerRegistry,
        names: &[S],
        settings: EngineSettings,
    ) -> Result<Self, RegistryError> {
        let analyzers = if names.is_empty() {
            registry.create_every()
        } else {
            registry.create_all(names)?
        };
        Ok(Self::new(analyzers, settings))
    }

    pub fn analyzer_names(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn config(&self) -> Arc<EnsembleConfig> {
        self.config.snapshot()
    }

    /// Atomically replaces the active configuration.
    pub fn set_config(&self, config: EnsembleConfig) -> Arc<EnsembleConfig> {
        tracing::info!(
            "Ensemble configuration replaced (ai_threshold {:.2}, calibrated: {})",
            config.thresholds.ai_threshold,
            config.is_calibrated()
        );
        self.config.swap(config)
    }

    /// Installs a calibration result as the active configuration.
    pub fn apply_calibration(&self, result: CalibrationResult) -> Arc<EnsembleConfig> {
        self.set_config(EnsembleConfig::from_calibration(result))
    }

    /// Returns to default weights and thresholds.
    pub fn reset_config(&self) -> Arc<EnsembleConfig> {
        let names = self.analyzer_names();
        self.set_config(EnsembleConfig::for_analyzers(&names))
    }

    /// Runs every analyzer concurrently; never fails as a whole.
    pub fn collect_outcomes(&self, text: &str) -> AnalyzerOutcomes {
        let (text, truncated) = bound_input(text, self.settings.max_input_chars);
        let outcomes = self
            .analyzers
            .par_iter()
            .map(|analyzer| run_guarded(analyzer.as_ref(), text))
            .collect();
        AnalyzerOutcomes { outcomes, truncated }
    }

    pub fn analyze(&self, text: &str) -> Result<EnsembleResult, EnsembleError> {
        if self.analyzers.is_empty() {
            return Err(EnsembleError::NoAnalyzers);
        }
        let config = self.config.snapshot();
        let outcomes = self.collect_outcomes(text);
        let result = aggregate(&outcomes, &config)?;
        tracing::debug!(
            "Ensemble verdict {} (ai {:.3}, agreement {:.3}, confidence {:.3})",
            result.classification,
            result.ai_probability,
            result.agreement_score,
            result.weighted_confidence
        );
        Ok(result)
    }

    /// `analyze` followed by the uncertainty annotation, when enabled.
    pub fn analyze_annotated(&self, text: &str) -> Result<AnnotatedResult, EnsembleError> {
        let result = self.analyze(text)?;
        Ok(self.annotate(result))
    }

    /// `analyze_with_timeout` followed by the uncertainty annotation, when enabled.
    pub async fn analyze_annotated_with_timeout(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<AnnotatedResult, EnsembleError> {
        let result = self.analyze_with_timeout(text, timeout).await?;
        Ok(self.annotate(result))
    }

    fn annotate(&self, result: EnsembleResult) -> AnnotatedResult {
        let uncertainty = self
            .uncertainty
            .as_ref()
            .map(|estimator| estimator.prediction_uncertainty(&result));
        AnnotatedResult { result, uncertainty }
    }

    /// Analyzes texts in parallel; results come back in input order.
    pub fn analyze_batch<S>(&self, texts: &[S]) -> Vec<Result<EnsembleResult, EnsembleError>>
    where
        S: AsRef<str> + Sync,
    {
        texts.par_iter().map(|t| self.analyze(t.as_ref())).collect()
    }

    /// Like `analyze`, but stops waiting for analyzers after `timeout`.
    ///
    /// Analyzers run on the blocking pool against one shared deadline. A late
    /// analyzer is recorded as timed out and left out of the aggregate; its
    /// thread is not interrupted.
    pub async fn analyze_with_timeout(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<EnsembleResult, EnsembleError> {
        if self.analyzers.is_empty() {
            return Err(EnsembleError::NoAnalyzers);
        }
        let config = self.config.snapshot();
        let (bounded, truncated) = bound_input(text, self.settings.max_input_chars);
        let shared: Arc<str> = Arc::from(bounded);
        let deadline = tokio::time::Instant::now() + timeout;

        let handles: Vec<_> = self
            .analyzers
            .iter()
            .map(|analyzer| {
                let analyzer = Arc::clone(analyzer);
                let text = Arc::clone(&shared);
                let name = analyzer.name().to_string();
                let handle = tokio::task::spawn_blocking(move || run_guarded(analyzer.as_ref(), &text));
                (name, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let outcome = match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => AnalyzerOutcome {
                    analyzer: name,
                    result: Err(AnalysisError::Failed(format!("analyzer task failed: {}", e))),
                },
                Err(_) => {
                    tracing::warn!("Analyzer {} timed out after {:?}", name, timeout);
                    AnalyzerOutcome {
                        analyzer: name,
                        result: Err(AnalysisError::TimedOut(timeout.as_millis() as u64)),
                    }
                }
            };
            outcomes.push(outcome);
        }

        aggregate(&AnalyzerOutcomes { outcomes, truncated }, &config)
    }
}

/// Combines analyzer outcomes under `config`.
///
/// Each surviving estimate is weighted by configured weight x confidence,
/// renormalized over the survivors. Failed analyzers and analyzers whose
/// effective weight is zero are reported but do not contribute.
pub fn aggregate(
    outcomes: &AnalyzerOutcomes,
    config: &EnsembleConfig,
) -> Result<EnsembleResult, EnsembleError> {
    let mut individual_results = BTreeMap::new();
    let mut failed = BTreeMap::new();
    let mut excluded = Vec::new();

    for outcome in &outcomes.outcomes {
        match &outcome.result {
            Ok(est) => {
                if effective_weight(est, &config.weights).is_none() {
                    excluded.push(outcome.analyzer.clone());
                }
                individual_results.insert(outcome.analyzer.clone(), est.clone());
            }
            Err(e) => {
                failed.insert(outcome.analyzer.clone(), e.clone());
            }
        }
    }

    let survivors = survivors(outcomes, &config.weights);
    let Some((ai_probability, total)) = weighted_probability(&survivors) else {
        return Err(EnsembleError::Unavailable { failed, excluded });
    };

    let aggregation_weights: BTreeMap<String, f64> = survivors
        .iter()
        .map(|(est, w)| (est.analyzer_name.clone(), w / total))
        .collect();
    let weighted_confidence = clamp_unit(
        survivors
            .iter()
            .map(|(est, w)| w / total * est.confidence)
            .sum(),
    );
    let probabilities: Vec<f64> = survivors.iter().map(|(est, _)| est.ai_probability).collect();

    Ok(EnsembleResult {
        classification: config.thresholds.classify(ai_probability),
        ai_probability,
        human_probability: 1.0 - ai_probability,
        agreement_score: agreement(&probabilities),
        weighted_confidence,
        individual_results,
        aggregation_weights,
        failed_analyzers: failed
            .into_iter()
            .map(|(name, e)| (name, e.to_string()))
            .collect(),
        excluded_analyzers: excluded,
        ai_threshold: config.thresholds.ai_threshold,
        human_threshold: config.thresholds.human_threshold(),
        truncated: outcomes.truncated,
        best_thresholds: config.calibration.as_ref().map(|c| c.best_thresholds),
    })
}

/// The aggregate AI probability alone; `None` when nothing survives.
///
/// Computes exactly what `aggregate` reports as `ai_probability`.
pub fn weighted_score(outcomes: &AnalyzerOutcomes, weights: &WeightVector) -> Option<f64> {
    weighted_probability(&survivors(outcomes, weights)).map(|(p, _)| p)
}

fn effective_weight(est: &AnalyzerEstimate, weights: &WeightVector) -> Option<f64> {
    let w = weights.weight(&est.analyzer_name) * est.confidence;
    (w.is_finite() && w > 0.0).then_some(w)
}

fn survivors<'a>(
    outcomes: &'a AnalyzerOutcomes,
    weights: &WeightVector,
) -> Vec<(&'a AnalyzerEstimate, f64)> {
    outcomes
        .outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .filter_map(|est| effective_weight(est, weights).map(|w| (est, w)))
        .collect()
}

fn weighted_probability(survivors: &[(&AnalyzerEstimate, f64)]) -> Option<(f64, f64)> {
    let total: f64 = survivors.iter().map(|(_, w)| w).sum();
    if survivors.is_empty() || total <= 0.0 {
        return None;
    }
    let weighted: f64 = survivors.iter().map(|(est, w)| w * est.ai_probability).sum();
    Some((clamp_unit(weighted / total), total))
}

/// 1 when all probabilities coincide, falling linearly to 0 at a
/// population std of 0.5.
fn agreement(probabilities: &[f64]) -> f64 {
    match probabilities.first() {
        None => 0.0,
        Some(first) if probabilities.iter().all(|p| p == first) => 1.0,
        Some(_) => (1.0 - population_std_dev(probabilities) / MAX_DISAGREEMENT_STD).clamp(0.0, 1.0),
    }
}

fn bound_input(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            tracing::warn!("Input truncated to {} characters", max_chars);
            (&text[..idx], true)
        }
        None => (text, false),
    }
}

fn run_guarded(analyzer: &dyn TextAnalyzer, text: &str) -> AnalyzerOutcome {
    let name = analyzer.name();
    let result = catch_unwind(AssertUnwindSafe(|| analyzer.estimate(text)))
        .unwrap_or_else(|_| Err(AnalysisError::Failed(format!("{} panicked", name))));

    match &result {
        Ok(est) => tracing::debug!(
            "{} -> ai {:.3} (confidence {:.3})",
            name,
            est.ai_probability,
            est.confidence
        ),
        Err(e) if e.is_input() => tracing::debug!("{} rejected input: {}", name, e),
        Err(e) => tracing::warn!("{} analyzer failed: {:?}", name, e),
    }

    AnalyzerOutcome {
        analyzer: name.to_string(),
        result,
    }
}
