use std::collections::HashMap;

use analysis_core::stats::{coefficient_of_variation, mean, saturate, std_dev};
use analysis_core::{validate_input, AnalysisError, AnalyzerEstimate, MetricSet, TextAnalyzer};

use crate::bounded;
use crate::text::{sentences, words};

const MIN_SENTENCES: usize = 2;

/// Sentence-length regularity and repeated sentence openers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntacticAnalyzer;

impl SyntacticAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl TextAnalyzer for SyntacticAnalyzer {
    fn name(&self) -> &'static str {
        "syntactic"
    }

    fn description(&self) -> &'static str {
        "Sentence length variability and structural repetition"
    }

    fn analyze(&self, text: &str) -> Result<MetricSet, AnalysisError> {
        let text = validate_input(text)?;
        let sentences: Vec<Vec<String>> = sentences(text).into_iter().map(words).collect();
        let count = sentences.len();
        if count < MIN_SENTENCES {
            return Ok(MetricSet::unreliable().with("sentence_count", count as f64));
        }

        let lengths: Vec<f64> = sentences.iter().map(|s| s.len() as f64).collect();
        let min = lengths.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = lengths.iter().cloned().fold(0.0, f64::max);

        let confidence = (0.25 + 0.05 * count as f64).min(0.9);
        Ok(MetricSet::new(confidence)
            .with("sentence_count", count as f64)
            .with("avg_sentence_length", mean(&lengths))
            .with("sentence_length_std", std_dev(&lengths))
            .with("sentence_length_variability", coefficient_of_variation(&lengths))
            .with("min_sentence_length", min)
            .with("max_sentence_length", max)
            .with("opener_repetition", opener_repetition(&sentences)))
    }

    fn predict(&self, metrics: MetricSet) -> AnalyzerEstimate {
        let uniformity = 1.0 - saturate(metrics.value("sentence_length_variability"), 0.5);
        let openers = metrics.value("opener_repetition");
        let p = bounded(0.1 + 0.55 * uniformity + 0.3 * openers);
        AnalyzerEstimate::new(self.name(), p, metrics)
    }
}

/// Fraction of sentences whose first word also opens another sentence.
fn opener_repetition(sentences: &[Vec<String>]) -> f64 {
    let openers: Vec<&str> = sentences
        .iter()
        .filter_map(|s| s.first().map(String::as_str))
        .collect();
    if openers.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for &o in &openers {
        *counts.entry(o).or_insert(0) += 1;
    }
    let shared = openers.iter().filter(|o| counts[*o] > 1).count();
    shared as f64 / openers.len() as f64
}
