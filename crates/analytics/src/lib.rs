//! Evaluation of scored predictions against labels: ROC and
//! precision-recall curves, threshold selection, and probability
//! calibration quality.

pub mod calibration_stats;
pub mod roc;

pub use calibration_stats::{calibration_stats, CalibrationStats, ReliabilityBin};
pub use roc::{
    analyze, auc, confusion_at, pr_curve, roc_curve, AucGrade, CurveError, PrPoint, RocPoint,
    RocReport, ScoreSummary, ThresholdChoice,
};
