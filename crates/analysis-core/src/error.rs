use std::collections::BTreeMap;

use thiserror::Error;

/// Failure of a single analyzer on a single text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Text is empty after trimming, or otherwise unusable.
    #[error("Input error: {0}")]
    Input(String),

    /// The analyzer raised an unexpected failure.
    #[error("Analysis failed: {0}")]
    Failed(String),

    /// The caller stopped waiting for the analyzer.
    #[error("Analyzer timed out after {0} ms")]
    TimedOut(u64),
}

impl AnalysisError {
    pub fn is_input(&self) -> bool {
        matches!(self, AnalysisError::Input(_))
    }
}

/// Failure of the ensemble as a whole.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnsembleError {
    /// Every analyzer failed, reported zero confidence, or carries zero weight.
    #[error(
        "Ensemble unavailable: no analyzer produced a usable estimate (failed: [{}], excluded: [{}])",
        describe_failures(failed),
        excluded.join(", ")
    )]
    Unavailable {
        failed: BTreeMap<String, AnalysisError>,
        excluded: Vec<String>,
    },

    #[error("Ensemble has no analyzers configured")]
    NoAnalyzers,
}

fn describe_failures(failed: &BTreeMap<String, AnalysisError>) -> String {
    failed
        .iter()
        .map(|(name, err)| format!("{}: {}", name, err))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown analyzer '{name}' (available: {})", available.join(", "))]
    UnknownAnalyzer { name: String, available: Vec<String> },

    #[error("Analyzer '{0}' is already registered")]
    DuplicateAnalyzer(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_message_names_every_analyzer() {
        let mut failed = BTreeMap::new();
        failed.insert("lexical".to_string(), AnalysisError::Input("empty text".into()));
        failed.insert("ml".to_string(), AnalysisError::Failed("boom".into()));
        let err = EnsembleError::Unavailable {
            failed,
            excluded: vec!["syntactic".to_string()],
        };

        let msg = err.to_string();
        assert!(msg.contains("lexical: Input error: empty text"));
        assert!(msg.contains("ml: Analysis failed: boom"));
        assert!(msg.contains("excluded: [syntactic]"));
    }

    #[test]
    fn unknown_analyzer_lists_alternatives() {
        let err = RegistryError::UnknownAnalyzer {
            name: "neural".into(),
            available: vec!["lexical".into(), "ml".into()],
        };
        assert_eq!(
            err.to_string(),
            "Unknown analyzer 'neural' (available: lexical, ml)"
        );
    }
}
