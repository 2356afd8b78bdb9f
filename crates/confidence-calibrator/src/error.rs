use std::path::PathBuf;

use analytics::CurveError;
use thiserror::Error;

/// Calibration input failures. The engine keeps its previous
/// configuration whenever one of these is returned.
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Validation dataset not found: {}", path.display())]
    MissingDataset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed validation dataset: {0}")]
    MalformedDataset(String),

    #[error("Not enough labeled examples: {ai} ai / {human} human, need at least {required} of each")]
    InsufficientLabels {
        ai: usize,
        human: usize,
        required: usize,
    },

    #[error("Invalid search grid: {0}")]
    InvalidGrid(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] CurveError),
}
