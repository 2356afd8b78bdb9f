use std::collections::HashSet;

use analysis_core::stats::{mean, saturate, std_dev};
use analysis_core::{validate_input, AnalysisError, AnalyzerEstimate, MetricSet, TextAnalyzer};

use crate::bounded;
use crate::text::{evidence_confidence, is_contraction, sentences, words};

const SATURATION_WORDS: usize = 150;
const MAX_CONFIDENCE: f64 = 0.85;
const CONCEPT_WORD_CHARS: usize = 7;

const FORMAL_CONNECTIVES: &[&str] = &[
    "furthermore", "moreover", "additionally", "consequently", "therefore", "thus",
    "hence", "however", "nevertheless", "nonetheless", "subsequently", "accordingly",
    "notably", "overall", "ultimately", "importantly", "conversely", "similarly",
];

const INFORMAL_MARKERS: &[&str] = &[
    "kinda", "sorta", "gonna", "wanna", "gotta", "yeah", "yep", "nope", "dude", "lol",
    "lmao", "omg", "ok", "okay", "honestly", "literally", "totally", "stuff", "guys",
    "awesome", "cool", "weird", "haha", "hey", "um", "uh", "btw",
];

const FIRST_PERSON: &[&str] = &[
    "i", "me", "my", "mine", "myself", "we", "us", "our", "ours", "ourselves",
];

/// Discourse markers, register and topical flow between sentences.
#[derive(Debug, Default, Clone, Copy)]
pub struct SemanticAnalyzer;

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl TextAnalyzer for SemanticAnalyzer {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn description(&self) -> &'static str {
        "Formal connectives, informal register, personal voice and topical coherence"
    }

    fn analyze(&self, text: &str) -> Result<MetricSet, AnalysisError> {
        let text = validate_input(text)?;
        let words = words(text);
        let n = words.len();
        if n == 0 {
            return Ok(MetricSet::unreliable().with("word_count", 0.0));
        }

        let connectives = count_in(&words, FORMAL_CONNECTIVES);
        let contractions = words.iter().filter(|w| is_contraction(w)).count();
        let colloquial = count_in(&words, INFORMAL_MARKERS);
        let first_person = count_in(&words, FIRST_PERSON);
        let concept_words: HashSet<&str> = words
            .iter()
            .filter(|w| w.chars().count() > CONCEPT_WORD_CHARS)
            .map(String::as_str)
            .collect();
        let concept_count = words
            .iter()
            .filter(|w| w.chars().count() > CONCEPT_WORD_CHARS)
            .count();

        let overlaps = adjacent_overlaps(text);
        let per_100 = |c: usize| c as f64 / n as f64 * 100.0;

        Ok(MetricSet::new(evidence_confidence(n, SATURATION_WORDS, MAX_CONFIDENCE))
            .with("word_count", n as f64)
            .with("connective_rate", per_100(connectives))
            .with("contraction_rate", per_100(contractions))
            .with("informal_rate", per_100(contractions + colloquial))
            .with("first_person_rate", per_100(first_person))
            .with("conceptual_density", concept_count as f64 / n as f64)
            .with(
                "concept_diversity",
                if concept_count > 0 {
                    concept_words.len() as f64 / concept_count as f64
                } else {
                    0.0
                },
            )
            .with("thematic_coherence", mean(&overlaps))
            .with("overlap_variability", std_dev(&overlaps)))
    }

    fn predict(&self, metrics: MetricSet) -> AnalyzerEstimate {
        let formal = saturate(metrics.value("connective_rate"), 2.5);
        let informal = saturate(metrics.value("informal_rate"), 3.0);
        let personal = saturate(metrics.value("first_person_rate"), 4.0);
        let p = bounded(0.4 + 0.45 * formal - 0.3 * informal - 0.15 * personal);
        AnalyzerEstimate::new(self.name(), p, metrics)
    }
}

fn count_in(words: &[String], lexicon: &[&str]) -> usize {
    words.iter().filter(|w| lexicon.contains(&w.as_str())).count()
}

/// Jaccard overlap of the word sets of each pair of adjacent sentences.
fn adjacent_overlaps(text: &str) -> Vec<f64> {
    let sets: Vec<HashSet<String>> = sentences(text)
        .into_iter()
        .map(|s| words(s).into_iter().collect())
        .collect();
    sets.windows(2)
        .map(|pair| {
            let union = pair[0].union(&pair[1]).count();
            if union == 0 {
                0.0
            } else {
                pair[0].intersection(&pair[1]).count() as f64 / union as f64
            }
        })
        .collect()
}
