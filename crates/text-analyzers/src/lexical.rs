use std::collections::BTreeMap;

use analysis_core::stats::{mean, population_std_dev, saturate};
use analysis_core::{validate_input, AnalysisError, AnalyzerEstimate, MetricSet, TextAnalyzer};

use crate::text::{evidence_confidence, words};
use crate::bounded;

/// Word count at which lexical confidence saturates.
const SATURATION_WORDS: usize = 150;
const MAX_CONFIDENCE: f64 = 0.9;
const LONG_WORD_CHARS: usize = 7;

/// Vocabulary richness and repetition.
///
/// Machine text tends to recycle whole phrases (high repeated-trigram ratio)
/// while rarely stuttering on a single word; people do the opposite.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalAnalyzer;

impl LexicalAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl TextAnalyzer for LexicalAnalyzer {
    fn name(&self) -> &'static str {
        "lexical"
    }

    fn description(&self) -> &'static str {
        "Vocabulary diversity, phrase recycling and word-level repetition"
    }

    fn analyze(&self, text: &str) -> Result<MetricSet, AnalysisError> {
        let text = validate_input(text)?;
        let words = words(text);
        let n = words.len();
        if n == 0 {
            return Ok(MetricSet::unreliable().with("word_count", 0.0));
        }

        let mut freq: BTreeMap<&str, usize> = BTreeMap::new();
        for w in &words {
            *freq.entry(w.as_str()).or_insert(0) += 1;
        }
        let unique = freq.len();
        let hapax = freq.values().filter(|&&c| c == 1).count();

        let counts: Vec<f64> = freq.values().map(|&c| c as f64).collect();
        let mu = mean(&counts);
        let sigma = population_std_dev(&counts);
        let burstiness = if sigma + mu > 0.0 {
            (sigma - mu) / (sigma + mu)
        } else {
            0.0
        };

        let total_chars: usize = words.iter().map(|w| w.chars().count()).sum();
        let long_words = words
            .iter()
            .filter(|w| w.chars().count() > LONG_WORD_CHARS)
            .count();

        let consecutive_repeats = words.windows(2).filter(|p| p[0] == p[1]).count();
        let repeat_rate = consecutive_repeats as f64 / (n.saturating_sub(1).max(1)) as f64 * 100.0;

        Ok(MetricSet::new(evidence_confidence(n, SATURATION_WORDS, MAX_CONFIDENCE))
            .with("word_count", n as f64)
            .with("unique_words", unique as f64)
            .with("type_token_ratio", unique as f64 / n as f64)
            .with("hapax_ratio", hapax as f64 / unique as f64)
            .with("burstiness", burstiness)
            .with("avg_word_length", total_chars as f64 / n as f64)
            .with("long_word_ratio", long_words as f64 / n as f64)
            .with("repeated_trigram_ratio", repeated_trigram_ratio(&words))
            .with("consecutive_repeats", consecutive_repeats as f64)
            .with("consecutive_repeat_rate", repeat_rate))
    }

    fn predict(&self, metrics: MetricSet) -> AnalyzerEstimate {
        let recycling = saturate(metrics.value("repeated_trigram_ratio"), 0.4);
        let stutter = saturate(metrics.value("consecutive_repeat_rate"), 1.0);
        let p = bounded(0.3 + 0.6 * recycling - 0.25 * stutter);
        AnalyzerEstimate::new(self.name(), p, metrics)
    }
}

/// Share of word-trigram occurrences whose trigram appears more than once.
fn repeated_trigram_ratio(words: &[String]) -> f64 {
    if words.len() < 3 {
        return 0.0;
    }
    let mut counts: BTreeMap<(&str, &str, &str), usize> = BTreeMap::new();
    for t in words.windows(3) {
        *counts
            .entry((t[0].as_str(), t[1].as_str(), t[2].as_str()))
            .or_insert(0) += 1;
    }
    let total = words.len() - 2;
    let repeated: usize = counts.values().filter(|&&c| c > 1).sum();
    repeated as f64 / total as f64
}
