//! Feature-family analyzers for AI-text detection.
//!
//! Each analyzer extracts one family of metrics (vocabulary, sentence
//! structure, meaning markers, punctuation style, predictability) and maps
//! them to a local AI probability with a confidence that grows with the
//! amount of evidence in the text.

pub mod lexical;
pub mod ml_proxy;
pub mod registry;
pub mod semantic;
pub mod stylistic;
pub mod syntactic;
pub mod text;

pub use lexical::LexicalAnalyzer;
pub use ml_proxy::MlProxyAnalyzer;
pub use registry::{AnalyzerFactory, AnalyzerRegistry};
pub use semantic::SemanticAnalyzer;
pub use stylistic::StylisticAnalyzer;
pub use syntactic::SyntacticAnalyzer;

/// Bounds applied to every local probability so no single analyzer is certain.
pub(crate) const MIN_PROBABILITY: f64 = 0.02;
pub(crate) const MAX_PROBABILITY: f64 = 0.98;

pub(crate) fn bounded(p: f64) -> f64 {
    p.clamp(MIN_PROBABILITY, MAX_PROBABILITY)
}
