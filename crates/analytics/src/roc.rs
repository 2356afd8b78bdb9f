//! ROC / PR analysis
//!
//! Every threshold follows the same rule the ensemble uses: a text is
//! predicted AI when its score is strictly above the threshold.

use std::cmp::Ordering;

use analysis_core::stats::{mean, median, std_dev};
use analysis_core::{ConfusionMatrix, TextLabel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurveError {
    #[error("Labels and scores differ in length ({labels} vs {scores})")]
    LengthMismatch { labels: usize, scores: usize },

    #[error("No scored examples")]
    Empty,

    #[error("Only '{0}' examples present; both classes are required")]
    SingleClass(&'static str),

    #[error("Score at index {0} is not a finite number")]
    NonFinite(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub false_positive_rate: f64,
    pub true_positive_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrPoint {
    pub threshold: f64,
    pub recall: f64,
    pub precision: f64,
}

/// A threshold picked by some criterion, with the counts it produces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdChoice {
    pub threshold: f64,
    pub value: f64,
    pub confusion: ConfusionMatrix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AucGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl AucGrade {
    pub fn from_auc(auc: f64) -> Self {
        match auc {
            a if a > 0.9 => AucGrade::Excellent,
            a if a > 0.8 => AucGrade::Good,
            a if a > 0.7 => AucGrade::Fair,
            _ => AucGrade::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AucGrade::Excellent => "Excellent",
            AucGrade::Good => "Good",
            AucGrade::Fair => "Fair",
            AucGrade::Poor => "Poor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl ScoreSummary {
    fn of(scores: &[f64]) -> Self {
        Self {
            count: scores.len(),
            mean: mean(scores),
            std: std_dev(scores),
            min: scores.iter().cloned().fold(f64::INFINITY, f64::min),
            max: scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            median: median(scores),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocReport {
    pub roc_curve: Vec<RocPoint>,
    pub pr_curve: Vec<PrPoint>,
    pub roc_auc: f64,
    pub pr_auc: f64,
    pub auc_grade: AucGrade,
    pub best_f1: ThresholdChoice,
    /// Maximizes true positive rate minus false positive rate.
    pub youden: ThresholdChoice,
    pub ai_scores: ScoreSummary,
    pub human_scores: ScoreSummary,
    /// Mean AI score minus mean human score.
    pub separation: f64,
}

/// Confusion counts at one threshold.
#[derive(Debug, Clone, Copy)]
struct SweepPoint {
    threshold: f64,
    confusion: ConfusionMatrix,
}

/// Walks distinct scores from the highest down. The first point predicts
/// nothing as AI; the last uses a threshold one below the lowest score and
/// predicts everything as AI.
fn sweep(labels: &[TextLabel], scores: &[f64]) -> Result<Vec<SweepPoint>, CurveError> {
    if labels.len() != scores.len() {
        return Err(CurveError::LengthMismatch {
            labels: labels.len(),
            scores: scores.len(),
        });
    }
    if scores.is_empty() {
        return Err(CurveError::Empty);
    }
    if let Some(i) = scores.iter().position(|s| !s.is_finite()) {
        return Err(CurveError::NonFinite(i));
    }
    let positives = labels.iter().filter(|l| l.is_ai()).count();
    let negatives = labels.len() - positives;
    if positives == 0 {
        return Err(CurveError::SingleClass(TextLabel::Human.as_str()));
    }
    if negatives == 0 {
        return Err(CurveError::SingleClass(TextLabel::Ai.as_str()));
    }

    let mut pairs: Vec<(f64, bool)> = scores
        .iter()
        .zip(labels)
        .map(|(s, l)| (*s, l.is_ai()))
        .collect();
    pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    let counts = |tp: usize, fp: usize| ConfusionMatrix {
        true_positives: tp,
        false_positives: fp,
        true_negatives: negatives - fp,
        false_negatives: positives - tp,
    };

    let mut points = vec![SweepPoint {
        threshold: pairs[0].0,
        confusion: counts(0, 0),
    }];
    let (mut tp, mut fp) = (0, 0);
    let mut i = 0;
    while i < pairs.len() {
        let score = pairs[i].0;
        while i < pairs.len() && pairs[i].0 == score {
            if pairs[i].1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let next = if i < pairs.len() { pairs[i].0 } else { score - 1.0 };
        points.push(SweepPoint {
            threshold: next,
            confusion: counts(tp, fp),
        });
    }
    Ok(points)
}

pub fn roc_curve(labels: &[TextLabel], scores: &[f64]) -> Result<Vec<RocPoint>, CurveError> {
    Ok(sweep(labels, scores)?.iter().map(to_roc).collect())
}

/// Precision-recall curve, anchored at recall 0 / precision 1.
pub fn pr_curve(labels: &[TextLabel], scores: &[f64]) -> Result<Vec<PrPoint>, CurveError> {
    Ok(pr_from_sweep(&sweep(labels, scores)?))
}

/// Trapezoidal area under `(x, y)` points ordered by non-decreasing x.
pub fn auc(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0)
        .sum()
}

/// Confusion counts when predicting AI for scores strictly above `threshold`.
pub fn confusion_at(labels: &[TextLabel], scores: &[f64], threshold: f64) -> ConfusionMatrix {
    ConfusionMatrix::from_predictions(
        scores
            .iter()
            .zip(labels)
            .map(|(s, l)| (*s > threshold, l.is_ai())),
    )
}

/// Full ROC/PR report for scored, labeled examples.
pub fn analyze(labels: &[TextLabel], scores: &[f64]) -> Result<RocReport, CurveError> {
    let points = sweep(labels, scores)?;

    let roc_curve: Vec<RocPoint> = points.iter().map(to_roc).collect();
    let roc_xy: Vec<(f64, f64)> = roc_curve
        .iter()
        .map(|p| (p.false_positive_rate, p.true_positive_rate))
        .collect();
    let roc_auc = auc(&roc_xy);

    let pr_curve = pr_from_sweep(&points);
    let pr_xy: Vec<(f64, f64)> = pr_curve.iter().map(|p| (p.recall, p.precision)).collect();
    let pr_auc = auc(&pr_xy);

    let best_f1 = best_by(&points, |cm| cm.f1());
    let youden = best_by(&points, |cm| cm.recall() - (1.0 - cm.specificity()));

    let (ai, human): (Vec<(f64, bool)>, Vec<(f64, bool)>) = scores
        .iter()
        .zip(labels)
        .map(|(s, l)| (*s, l.is_ai()))
        .partition(|(_, is_ai)| *is_ai);
    let ai: Vec<f64> = ai.into_iter().map(|(s, _)| s).collect();
    let human: Vec<f64> = human.into_iter().map(|(s, _)| s).collect();
    let ai_scores = ScoreSummary::of(&ai);
    let human_scores = ScoreSummary::of(&human);

    Ok(RocReport {
        roc_curve,
        pr_curve,
        roc_auc,
        pr_auc,
        auc_grade: AucGrade::from_auc(roc_auc),
        best_f1,
        youden,
        separation: ai_scores.mean - human_scores.mean,
        ai_scores,
        human_scores,
    })
}

fn to_roc(p: &SweepPoint) -> RocPoint {
    RocPoint {
        threshold: p.threshold,
        false_positive_rate: 1.0 - p.confusion.specificity(),
        true_positive_rate: p.confusion.recall(),
    }
}

fn pr_from_sweep(points: &[SweepPoint]) -> Vec<PrPoint> {
    let mut curve = vec![PrPoint {
        threshold: points[0].threshold,
        recall: 0.0,
        precision: 1.0,
    }];
    curve.extend(
        points
            .iter()
            .filter(|p| p.confusion.true_positives + p.confusion.false_positives > 0)
            .map(|p| PrPoint {
                threshold: p.threshold,
                recall: p.confusion.recall(),
                precision: p.confusion.precision(),
            }),
    );
    curve
}

/// Highest-scoring threshold; ties keep the earlier (higher) threshold.
fn best_by<F>(points: &[SweepPoint], metric: F) -> ThresholdChoice
where
    F: Fn(&ConfusionMatrix) -> f64,
{
    let mut best = ThresholdChoice {
        threshold: points[0].threshold,
        value: metric(&points[0].confusion),
        confusion: points[0].confusion,
    };
    for p in &points[1..] {
        let value = metric(&p.confusion);
        if value > best.value {
            best = ThresholdChoice {
                threshold: p.threshold,
                value,
                confusion: p.confusion,
            };
        }
    }
    best
}
