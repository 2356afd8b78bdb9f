use analysis_core::stats::{mean, saturate, std_dev};
use analysis_core::{validate_input, AnalysisError, AnalyzerEstimate, MetricSet, TextAnalyzer};

use crate::bounded;
use crate::text::{paragraphs, sentences};

const MIN_SENTENCES: usize = 2;
const INNER_PUNCTUATION: &[char] = &[',', ';', ':', '(', ')', '"', '“', '”', '—', '–'];
const QUOTES: &[char] = &['"', '“', '”'];

/// Punctuation habits and capitalization.
#[derive(Debug, Default, Clone, Copy)]
pub struct StylisticAnalyzer;

impl StylisticAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl TextAnalyzer for StylisticAnalyzer {
    fn name(&self) -> &'static str {
        "stylistic"
    }

    fn description(&self) -> &'static str {
        "Punctuation rhythm, expressive marks and capitalization"
    }

    fn analyze(&self, text: &str) -> Result<MetricSet, AnalysisError> {
        let text = validate_input(text)?;
        let sentences = sentences(text);
        let count = sentences.len();
        if count < MIN_SENTENCES {
            return Ok(MetricSet::unreliable().with("sentence_count", count as f64));
        }

        let per_sentence: Vec<f64> = sentences
            .iter()
            .map(|s| s.chars().filter(|c| INNER_PUNCTUATION.contains(c)).count() as f64)
            .collect();

        let exclamations = text.matches('!').count();
        let questions = text.matches('?').count();
        let ellipses = text.matches("...").count() + text.matches('…').count();
        let quotes = text.chars().filter(|c| QUOTES.contains(c)).count();

        let chars = text.chars().filter(|c| !c.is_whitespace()).count().max(1);
        let punctuation = text.chars().filter(|c| c.is_ascii_punctuation()).count();
        let letters = text.chars().filter(|c| c.is_alphabetic()).count().max(1);
        let capitals = text.chars().filter(|c| c.is_uppercase()).count();

        let confidence = (0.2 + 0.05 * count as f64).min(0.85);
        Ok(MetricSet::new(confidence)
            .with("sentence_count", count as f64)
            .with("punctuation_density", punctuation as f64 / chars as f64)
            .with("inner_punctuation_mean", mean(&per_sentence))
            .with("punctuation_variability", std_dev(&per_sentence))
            .with("exclamations", exclamations as f64)
            .with("questions", questions as f64)
            .with("ellipses", ellipses as f64)
            .with("quote_marks", quotes as f64)
            .with(
                "expressive_rate",
                (exclamations + questions + ellipses) as f64 / count as f64,
            )
            .with("capital_ratio", capitals as f64 / letters as f64)
            .with("paragraph_count", paragraphs(text).len() as f64))
    }

    fn predict(&self, metrics: MetricSet) -> AnalyzerEstimate {
        let uniformity = 1.0 - saturate(metrics.value("punctuation_variability"), 1.0);
        let expressive = saturate(metrics.value("expressive_rate"), 0.2);
        let p = bounded(0.2 + 0.6 * uniformity - 0.3 * expressive);
        AnalyzerEstimate::new(self.name(), p, metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_even_punctuation_leans_ai() {
        let text = "First, we plan. Second, we build. Third, we ship.";
        let est = StylisticAnalyzer.estimate(text).unwrap();
        assert_eq!(est.metrics.value("punctuation_variability"), 0.0);
        assert_eq!(est.metrics.value("expressive_rate"), 0.0);
        assert_relative_eq!(est.ai_probability, 0.8, epsilon = 1e-9);
        assert_relative_eq!(est.confidence, 0.35, epsilon = 1e-9);
    }

    #[test]
    fn test_expressive_marks_lean_human() {
        let text = "Wow! Did you see that, the thing, the whole thing? No way... seriously";
        let est = StylisticAnalyzer.estimate(text).unwrap();
        assert_eq!(est.metrics.value("exclamations"), 1.0);
        assert_eq!(est.metrics.value("questions"), 1.0);
        assert_eq!(est.metrics.value("ellipses"), 1.0);
        assert!(est.ai_probability < 0.2);
    }

    #[test]
    fn test_single_sentence_is_unreliable() {
        let m = StylisticAnalyzer.analyze("Nothing to compare against").unwrap();
        assert_eq!(m.confidence(), 0.0);
    }
}
