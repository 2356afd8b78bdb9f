use crate::{AnalysisError, AnalyzerEstimate, MetricSet};

/// Contract every detection analyzer fulfils.
///
/// `analyze` extracts features from raw text. `predict` turns those features
/// into a local AI/human estimate and must be a pure function of the metrics.
/// Analyzers that cannot produce a reliable estimate (text too short, no
/// sentences) return a `MetricSet` with confidence 0.0 instead of failing.
pub trait TextAnalyzer: Send + Sync {
    /// Stable identifier used by the registry and in results.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        ""
    }

    fn analyze(&self, text: &str) -> Result<MetricSet, AnalysisError>;

    fn predict(&self, metrics: MetricSet) -> AnalyzerEstimate;

    /// Analyze then predict.
    fn estimate(&self, text: &str) -> Result<AnalyzerEstimate, AnalysisError> {
        let metrics = self.analyze(text)?;
        Ok(self.predict(metrics))
    }
}

/// Rejects text that is empty after trimming.
pub fn validate_input(text: &str) -> Result<&str, AnalysisError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AnalysisError::Input("text is empty".to_string()));
    }
    Ok(trimmed)
}
