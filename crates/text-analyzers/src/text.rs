//! Tokenization shared by all analyzers.

use std::sync::LazyLock;

use regex::Regex;

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['’][\p{L}\p{N}]+)*").expect("word pattern is valid")
});

static SENTENCE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?…]+").expect("sentence pattern is valid"));

static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph pattern is valid"));

/// Lower-cased words; `don't` stays one word.
pub fn words(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Sentence bodies (terminal punctuation removed) that contain at least one word.
pub fn sentences(text: &str) -> Vec<&str> {
    SENTENCE_END_RE
        .split(text)
        .map(str::trim)
        .filter(|s| WORD_RE.is_match(s))
        .collect()
}

/// Word count of each sentence.
pub fn sentence_lengths(text: &str) -> Vec<usize> {
    sentences(text)
        .iter()
        .map(|s| WORD_RE.find_iter(s).count())
        .collect()
}

pub fn paragraphs(text: &str) -> Vec<&str> {
    PARAGRAPH_RE
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

pub fn is_contraction(word: &str) -> bool {
    word.contains('\'') || word.contains('’')
}

/// Confidence that grows linearly with evidence up to `cap`.
pub fn evidence_confidence(count: usize, saturation: usize, cap: f64) -> f64 {
    if saturation == 0 {
        return cap;
    }
    cap * (count as f64 / saturation as f64).min(1.0)
}
