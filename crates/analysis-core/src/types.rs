use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Key under which every metric set stores its analyzer confidence.
pub const CONFIDENCE_KEY: &str = "confidence";

/// Default configured weights for the built-in analyzers.
pub const DEFAULT_WEIGHTS: &[(&str, f64)] = &[
    ("lexical", 0.25),
    ("syntactic", 0.25),
    ("semantic", 0.20),
    ("stylistic", 0.15),
    ("ml", 0.15),
];

/// Named numeric features produced by one analyzer for one text.
///
/// Always carries a `confidence` entry in [0, 1]. Values are immutable once
/// built; ordering is stable so serialized output is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet(BTreeMap<String, f64>);

impl MetricSet {
    pub fn new(confidence: f64) -> Self {
        let mut values = BTreeMap::new();
        values.insert(CONFIDENCE_KEY.to_string(), clamp_unit(confidence));
        Self(values)
    }

    /// A metric set that tells the ensemble to ignore this analyzer.
    pub fn unreliable() -> Self {
        Self::new(0.0)
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        if name == CONFIDENCE_KEY {
            self.0.insert(name.to_string(), clamp_unit(value));
        } else {
            let value = if value.is_finite() { value } else { 0.0 };
            self.0.insert(name.to_string(), value);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Metric value, 0.0 when absent.
    pub fn value(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(0.0)
    }

    pub fn confidence(&self) -> f64 {
        self.value(CONFIDENCE_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One analyzer's verdict on one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerEstimate {
    pub analyzer_name: String,
    pub ai_probability: f64,
    pub human_probability: f64,
    pub confidence: f64,
    pub metrics: MetricSet,
}

impl AnalyzerEstimate {
    /// Builds an estimate with `human_probability = 1 - ai_probability` and the
    /// confidence taken from the metric set.
    pub fn new(analyzer_name: &str, ai_probability: f64, metrics: MetricSet) -> Self {
        let ai_probability = clamp_unit(ai_probability);
        Self {
            analyzer_name: analyzer_name.to_string(),
            ai_probability,
            human_probability: 1.0 - ai_probability,
            confidence: metrics.confidence(),
            metrics,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "AI")]
    Ai,
    Human,
    Indeterminate,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Ai => "AI",
            Classification::Human => "Human",
            Classification::Indeterminate => "Indeterminate",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision cut-offs applied to the ensemble's `ai_probability`.
///
/// AI when the probability is strictly above `ai_threshold`; Human when it is
/// strictly below the mirrored cut `1 - ai_threshold`. When the threshold sits
/// below 0.5 the mirror would cross the AI cut, so the band collapses onto the
/// threshold itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub ai_threshold: f64,
}

impl Thresholds {
    pub const DEFAULT_CENTER: f64 = 0.5;
    pub const DEFAULT_BAND: f64 = 0.1;

    pub fn new(ai_threshold: f64) -> Self {
        Self {
            ai_threshold: clamp_unit(ai_threshold),
        }
    }

    pub fn human_threshold(&self) -> f64 {
        if self.ai_threshold >= 0.5 {
            1.0 - self.ai_threshold
        } else {
            self.ai_threshold
        }
    }

    pub fn classify(&self, ai_probability: f64) -> Classification {
        if ai_probability > self.ai_threshold {
            Classification::Ai
        } else if ai_probability < self.human_threshold() {
            Classification::Human
        } else {
            Classification::Indeterminate
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CENTER + Self::DEFAULT_BAND)
    }
}

/// Configured per-analyzer weights, normalized to sum to 1 over their support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector(BTreeMap<String, f64>);

impl WeightVector {
    /// Normalizes the given weights. Negative or non-finite weights count as
    /// zero; an all-zero input stays all-zero.
    pub fn new<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let raw: BTreeMap<String, f64> = weights
            .into_iter()
            .map(|(name, w)| (name.into(), if w.is_finite() && w > 0.0 { w } else { 0.0 }))
            .collect();
        let total: f64 = raw.values().sum();
        if total <= 0.0 {
            return Self(raw);
        }
        Self(raw.into_iter().map(|(k, w)| (k, w / total)).collect())
    }

    pub fn default_weights() -> Self {
        Self::new(DEFAULT_WEIGHTS.iter().map(|(name, w)| (*name, *w)))
    }

    /// Equal weight for every name.
    pub fn uniform<S: AsRef<str>>(names: &[S]) -> Self {
        Self::new(names.iter().map(|n| (n.as_ref().to_string(), 1.0)))
    }

    /// Weight for `name`, 0.0 when absent.
    pub fn weight(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    /// Restricts the vector to `names` and renormalizes over them.
    pub fn renormalized_over<S: AsRef<str>>(&self, names: &[S]) -> Self {
        Self::new(names.iter().map(|n| (n.as_ref().to_string(), self.weight(n.as_ref()))))
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for WeightVector {
    fn default() -> Self {
        Self::default_weights()
    }
}

/// Final output of the ensemble for one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub classification: Classification,
    pub ai_probability: f64,
    pub human_probability: f64,
    pub agreement_score: f64,
    pub weighted_confidence: f64,
    pub individual_results: BTreeMap<String, AnalyzerEstimate>,
    /// Effective weights (configured weight x confidence), renormalized over survivors.
    pub aggregation_weights: BTreeMap<String, f64>,
    pub failed_analyzers: BTreeMap<String, String>,
    /// Analyzers that ran but were left out for zero confidence or zero weight.
    pub excluded_analyzers: Vec<String>,
    pub ai_threshold: f64,
    pub human_threshold: f64,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_thresholds: Option<Thresholds>,
}

impl EnsembleResult {
    /// Estimates that contributed to the aggregate.
    pub fn surviving_estimates(&self) -> impl Iterator<Item = (&AnalyzerEstimate, f64)> {
        self.individual_results.iter().filter_map(|(name, est)| {
            self.aggregation_weights
                .get(name)
                .filter(|w| **w > 0.0)
                .map(|w| (est, *w))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextLabel {
    Ai,
    Human,
}

impl TextLabel {
    pub fn is_ai(&self) -> bool {
        matches!(self, TextLabel::Ai)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextLabel::Ai => "ai",
            TextLabel::Human => "human",
        }
    }
}

impl FromStr for TextLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ai" => Ok(TextLabel::Ai),
            "human" => Ok(TextLabel::Human),
            other => Err(format!("unknown label '{}' (expected 'ai' or 'human')", other)),
        }
    }
}

/// One record of a validation dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledText {
    pub text: String,
    pub label: TextLabel,
}

/// Binary confusion counts with AI as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    /// Counts `(predicted_ai, actually_ai)` pairs.
    pub fn from_predictions<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (bool, bool)>,
    {
        let mut cm = Self::default();
        for (predicted, actual) in pairs {
            match (predicted, actual) {
                (true, true) => cm.true_positives += 1,
                (true, false) => cm.false_positives += 1,
                (false, false) => cm.true_negatives += 1,
                (false, true) => cm.false_negatives += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// Sensitivity / true positive rate.
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn specificity(&self) -> f64 {
        ratio(self.true_negatives, self.true_negatives + self.false_positives)
    }

    pub fn f1(&self) -> f64 {
        self.f_beta(1.0)
    }

    pub fn f_beta(&self, beta: f64) -> f64 {
        let p = self.precision();
        let r = self.recall();
        let b2 = beta * beta;
        if p + r == 0.0 {
            return 0.0;
        }
        (1.0 + b2) * p * r / (b2 * p + r)
    }

    pub fn balanced_accuracy(&self) -> f64 {
        (self.recall() + self.specificity()) / 2.0
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Outcome of a calibration search; becomes the active ensemble configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub best_weights: WeightVector,
    pub best_thresholds: Thresholds,
    pub best_f1_score: f64,
    pub best_accuracy: f64,
    pub roc_auc: f64,
    pub pr_auc: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub samples: usize,
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
