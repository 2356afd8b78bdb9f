use std::collections::{BTreeMap, HashSet};

use analysis_core::stats::{mean, saturate, shannon_entropy};
use analysis_core::{validate_input, AnalysisError, AnalyzerEstimate, MetricSet, TextAnalyzer};

use crate::bounded;
use crate::text::{evidence_confidence, words};

const SATURATION_WORDS: usize = 150;
const MAX_CONFIDENCE: f64 = 0.9;

/// Statistical stand-in for a learned detector: entropy and transition
/// predictability of the word and character streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct MlProxyAnalyzer;

impl MlProxyAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl TextAnalyzer for MlProxyAnalyzer {
    fn name(&self) -> &'static str {
        "ml"
    }

    fn description(&self) -> &'static str {
        "Entropy and transition predictability proxy for a learned detector"
    }

    fn analyze(&self, text: &str) -> Result<MetricSet, AnalysisError> {
        let text = validate_input(text)?;
        let words = words(text);
        let n = words.len();
        if n == 0 {
            return Ok(MetricSet::unreliable().with("word_count", 0.0));
        }

        let chars: Vec<char> = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        let mut char_counts: BTreeMap<char, usize> = BTreeMap::new();
        for c in &chars {
            *char_counts.entry(*c).or_insert(0) += 1;
        }
        let char_entropy = if char_counts.len() > 1 {
            shannon_entropy(char_counts.values().copied()) / (char_counts.len() as f64).log2()
        } else {
            0.0
        };

        let mut length_counts: BTreeMap<usize, usize> = BTreeMap::new();
        for w in &words {
            *length_counts.entry(w.chars().count()).or_insert(0) += 1;
        }
        let word_length_entropy = shannon_entropy(length_counts.values().copied());

        let word_transitions = transition_diversity(words.windows(2).map(|p| (&p[0], &p[1])));
        let char_transitions = transition_diversity(chars.windows(2).map(|p| (p[0], p[1])));

        let mut word_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for w in &words {
            *word_counts.entry(w.as_str()).or_insert(0) += 1;
        }
        let max_repeat = word_counts.values().copied().max().unwrap_or(0);

        Ok(MetricSet::new(evidence_confidence(n, SATURATION_WORDS, MAX_CONFIDENCE))
            .with("word_count", n as f64)
            .with("char_entropy", char_entropy)
            .with("word_length_entropy", word_length_entropy)
            .with("word_transition_diversity", word_transitions)
            .with("transition_predictability", 1.0 - word_transitions)
            .with("char_transition_diversity", char_transitions)
            .with(
                "complexity",
                mean(&[char_entropy, word_transitions, char_transitions]),
            )
            .with("max_repeat_ratio", max_repeat as f64 / n as f64))
    }

    fn predict(&self, metrics: MetricSet) -> AnalyzerEstimate {
        let predictability = saturate(metrics.value("transition_predictability"), 0.6);
        let p = bounded(0.1 + 0.85 * predictability);
        AnalyzerEstimate::new(self.name(), p, metrics)
    }
}

/// Unique transitions over total transitions; 1.0 when there are none.
fn transition_diversity<T, I>(pairs: I) -> f64
where
    T: Eq + std::hash::Hash,
    I: Iterator<Item = T>,
{
    let mut total = 0usize;
    let mut seen = HashSet::new();
    for pair in pairs {
        total += 1;
        seen.insert(pair);
    }
    if total == 0 {
        1.0
    } else {
        seen.len() as f64 / total as f64
    }
}
