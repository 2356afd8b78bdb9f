use std::io::Write;
use std::sync::{Arc, OnceLock, Weak};

use analysis_core::{
    AnalysisError, AnalyzerEstimate, CalibrationResult, Classification, ConfusionMatrix, LabeledText,
    MetricSet, TextAnalyzer, TextLabel, Thresholds, WeightVector,
};
use analysis_orchestrator::{EngineSettings, EnsembleEngine};
use approx::assert_relative_eq;

use crate::{
    evaluate, CalibrationEngine, CalibrationError, CalibrationSettings, Objective, SearchStrategy,
    ValidationDataset,
};

/// Reads its score straight from the text. The misleading variant votes
/// against it with high confidence.
struct Scripted {
    name: &'static str,
    misleading: bool,
}

impl TextAnalyzer for Scripted {
    fn name(&self) -> &'static str {
        self.name
    }

    fn analyze(&self, text: &str) -> Result<MetricSet, AnalysisError> {
        let value: f64 = text
            .trim()
            .parse()
            .map_err(|_| AnalysisError::Input(format!("not a score: {}", text)))?;
        Ok(MetricSet::new(1.0).with("value", value))
    }

    fn predict(&self, metrics: MetricSet) -> AnalyzerEstimate {
        let value = metrics.value("value");
        let p = match (self.misleading, value > 0.5) {
            (false, _) => value,
            (true, true) => 0.05,
            (true, false) => 0.95,
        };
        AnalyzerEstimate::new(self.name, p, metrics)
    }
}

/// Contributes nothing itself; when wired to an engine it installs a new
/// calibration every time it runs.
struct Reconfiguring {
    engine: Arc<OnceLock<Weak<EnsembleEngine>>>,
}

impl TextAnalyzer for Reconfiguring {
    fn name(&self) -> &'static str {
        "reconfiguring"
    }

    fn analyze(&self, _text: &str) -> Result<MetricSet, AnalysisError> {
        if let Some(engine) = self.engine.get().and_then(Weak::upgrade) {
            engine.apply_calibration(CalibrationResult {
                best_weights: WeightVector::new(vec![("misleading", 1.0)]),
                best_thresholds: Thresholds::new(0.3),
                best_f1_score: 0.0,
                best_accuracy: 0.0,
                roc_auc: 0.5,
                pr_auc: 0.5,
                confusion_matrix: ConfusionMatrix::default(),
                samples: 0,
            });
        }
        Ok(MetricSet::unreliable())
    }

    fn predict(&self, metrics: MetricSet) -> AnalyzerEstimate {
        AnalyzerEstimate::new(self.name(), 0.5, metrics)
    }
}

/// Scripted engine plus a `Reconfiguring` analyzer, optionally wired back to it.
fn reconfiguring_engine(wired: bool) -> Arc<EnsembleEngine> {
    let slot = Arc::new(OnceLock::new());
    let analyzers: Vec<Arc<dyn TextAnalyzer>> = vec![
        Arc::new(Scripted { name: "oracle", misleading: false }),
        Arc::new(Scripted { name: "misleading", misleading: true }),
        Arc::new(Reconfiguring { engine: Arc::clone(&slot) }),
    ];
    let engine = Arc::new(EnsembleEngine::new(analyzers, EngineSettings::default()));
    if wired {
        let _ = slot.set(Arc::downgrade(&engine));
    }
    engine
}

fn scripted_engine() -> EnsembleEngine {
    let analyzers: Vec<Arc<dyn TextAnalyzer>> = vec![
        Arc::new(Scripted { name: "oracle", misleading: false }),
        Arc::new(Scripted { name: "misleading", misleading: true }),
    ];
    EnsembleEngine::new(analyzers, EngineSettings::default())
}

fn item(text: &str, label: TextLabel) -> LabeledText {
    LabeledText {
        text: text.to_string(),
        label,
    }
}

fn scripted_dataset() -> ValidationDataset {
    let mut items: Vec<LabeledText> = ["0.75", "0.8", "0.85", "0.9"]
        .iter()
        .map(|t| item(t, TextLabel::Ai))
        .collect();
    items.extend(["0.1", "0.2", "0.25", "0.3"].iter().map(|t| item(t, TextLabel::Human)));
    ValidationDataset::from_items(items)
}

fn quarter_grid(strategy: SearchStrategy) -> CalibrationSettings {
    CalibrationSettings {
        weight_step: 0.25,
        threshold_step: 0.1,
        min_per_class: 4,
        objective: Objective::F1,
        strategy,
        max_candidates: 1_000,
        min_weight_units: 0,
    }
}

#[test]
fn test_exhaustive_search_finds_first_perfect_split() {
    let engine = scripted_engine();
    let calibrator = CalibrationEngine::new(quarter_grid(SearchStrategy::Exhaustive));
    let run = calibrator.calibrate(&engine, &scripted_dataset()).unwrap();

    // [0,4] [1,3] [2,2] [3,1] [4,0]; [3,1] is the first to separate the classes
    assert_eq!(run.candidates_evaluated, 5);
    let result = &run.result;
    assert_relative_eq!(result.best_weights.weight("oracle"), 0.75);
    assert_relative_eq!(result.best_weights.weight("misleading"), 0.25);
    assert_relative_eq!(result.best_thresholds.ai_threshold, 0.5);
    assert_relative_eq!(result.best_f1_score, 1.0);
    assert_relative_eq!(result.best_accuracy, 1.0);
    assert_relative_eq!(result.roc_auc, 1.0);
    assert_eq!(result.samples, 8);
    assert_eq!(result.confusion_matrix.true_positives, 4);
    assert!(run.finished_at >= run.started_at);
}

#[test]
fn test_coordinate_ascent_climbs_to_same_split() {
    let engine = scripted_engine();
    let strategy = SearchStrategy::CoordinateAscent { max_rounds: 10 };
    let run = CalibrationEngine::new(quarter_grid(strategy))
        .calibrate(&engine, &scripted_dataset())
        .unwrap();

    // start [2,2], round one moves to [3,1], round two finds no strict improvement
    assert_eq!(run.candidates_evaluated, 5);
    assert_relative_eq!(run.result.best_weights.weight("oracle"), 0.75);
    assert_relative_eq!(run.result.best_f1_score, 1.0);
    assert_eq!(run.strategy, strategy);
}

#[test]
fn test_weight_floor_keeps_every_analyzer() {
    let engine = scripted_engine();
    let mut settings = quarter_grid(SearchStrategy::Exhaustive);
    settings.min_weight_units = 1;
    let run = CalibrationEngine::new(settings.clone())
        .calibrate(&engine, &scripted_dataset())
        .unwrap();

    // [1,3] [2,2] [3,1]
    assert_eq!(run.candidates_evaluated, 3);
    assert_relative_eq!(run.result.best_weights.weight("oracle"), 0.75);
    assert_relative_eq!(run.result.best_weights.weight("misleading"), 0.25);

    // start [2,2]; [1,3] and [3,1]; then only [2,2], since misleading is at the floor
    settings.strategy = SearchStrategy::CoordinateAscent { max_rounds: 10 };
    let run = CalibrationEngine::new(settings.clone())
        .calibrate(&engine, &scripted_dataset())
        .unwrap();
    assert_eq!(run.candidates_evaluated, 4);
    assert_relative_eq!(run.result.best_weights.weight("misleading"), 0.25);

    settings.min_weight_units = 3;
    let err = CalibrationEngine::new(settings)
        .calibrate(&engine, &scripted_dataset())
        .unwrap_err();
    assert!(matches!(err, CalibrationError::InvalidGrid(m) if m.contains("minimum")));
}

#[test]
fn test_unusable_items_are_skipped() {
    let engine = scripted_engine();
    let mut items = scripted_dataset().items().to_vec();
    items.push(item("not a number", TextLabel::Human));
    let run = CalibrationEngine::new(quarter_grid(SearchStrategy::Exhaustive))
        .calibrate(&engine, &ValidationDataset::from_items(items))
        .unwrap();
    assert_eq!(run.items_used, 8);
    assert_eq!(run.items_skipped, 1);
}

#[test]
fn test_class_minimum_checked_after_skipping() {
    let engine = scripted_engine();
    let mut items: Vec<LabeledText> = scripted_dataset()
        .items()
        .iter()
        .filter(|i| i.text != "0.3")
        .cloned()
        .collect();
    items.push(item("n/a", TextLabel::Human));
    let before = engine.config();

    let err = CalibrationEngine::new(quarter_grid(SearchStrategy::Exhaustive))
        .calibrate_and_apply(&engine, &ValidationDataset::from_items(items))
        .unwrap_err();
    assert!(matches!(
        err,
        CalibrationError::InsufficientLabels { ai: 4, human: 3, required: 4 }
    ));
    assert_eq!(*engine.config(), *before);
    assert!(!engine.config().is_calibrated());
}

#[test]
fn test_apply_swaps_configuration() {
    let engine = scripted_engine();
    let run = CalibrationEngine::new(quarter_grid(SearchStrategy::Exhaustive))
        .calibrate_and_apply(&engine, &scripted_dataset())
        .unwrap();

    let config = engine.config();
    assert!(config.is_calibrated());
    assert_eq!(config.weights, run.result.best_weights);

    let result = engine.analyze("0.8").unwrap();
    assert_eq!(result.classification, Classification::Ai);
    assert_eq!(result.best_thresholds, Some(run.result.best_thresholds));
}

#[test]
fn test_invalid_grid_is_rejected() {
    let engine = scripted_engine();
    let mut settings = quarter_grid(SearchStrategy::Exhaustive);
    settings.weight_step = 0.3;
    let err = CalibrationEngine::new(settings)
        .calibrate(&engine, &scripted_dataset())
        .unwrap_err();
    assert!(matches!(err, CalibrationError::InvalidGrid(_)));

    let mut settings = quarter_grid(SearchStrategy::Exhaustive);
    settings.weight_step = 0.01;
    settings.max_candidates = 10;
    let err = CalibrationEngine::new(settings)
        .calibrate(&engine, &scripted_dataset())
        .unwrap_err();
    assert!(matches!(err, CalibrationError::InvalidGrid(m) if m.contains("exceed")));
}

#[test]
fn test_cross_validation_is_reproducible() {
    let engine = scripted_engine();
    let mut settings = quarter_grid(SearchStrategy::Exhaustive);
    settings.min_per_class = 2;
    let calibrator = CalibrationEngine::new(settings);
    let dataset = scripted_dataset();

    let first = calibrator.cross_validate(&engine, &dataset, 2, 7).unwrap();
    let second = calibrator.cross_validate(&engine, &dataset, 2, 7).unwrap();
    assert_eq!(first, second);

    assert_eq!(first.folds.len(), 2);
    for fold in &first.folds {
        assert_eq!(fold.train_size, 4);
        assert_eq!(fold.test_size, 4);
        assert!((0.0..=1.0).contains(&fold.f1_score));
    }
    // [3,1] separates every split, so held-out ranking is always perfect
    assert_relative_eq!(first.mean_roc_auc, 1.0);
    assert_relative_eq!(first.std_roc_auc, 0.0);
}

#[test]
fn test_cross_validation_fold_limits() {
    let engine = scripted_engine();
    let calibrator = CalibrationEngine::new(quarter_grid(SearchStrategy::Exhaustive));
    let dataset = scripted_dataset();

    assert!(matches!(
        calibrator.cross_validate(&engine, &dataset, 1, 7),
        Err(CalibrationError::InvalidGrid(_))
    ));
    assert!(matches!(
        calibrator.cross_validate(&engine, &dataset, 5, 7),
        Err(CalibrationError::InsufficientLabels { required: 5, .. })
    ));
}

#[test]
fn test_evaluate_reports_active_configuration() {
    let engine = scripted_engine();
    let report = evaluate(&engine, &scripted_dataset()).unwrap();
    assert_eq!(report.samples, 8);
    assert_eq!(report.unavailable, 0);
    assert!(!report.calibrated);
    assert_relative_eq!(report.ai_threshold, 0.6);
    assert!(report.calibration.is_some());
    assert_eq!(report.reliability.as_ref().unwrap().total_predictions, 8);
    assert_eq!(report.ai_share.as_ref().unwrap().trials, 8);
}

#[test]
fn test_evaluate_uses_one_configuration_snapshot() {
    let steady = reconfiguring_engine(false);
    let swapping = reconfiguring_engine(true);
    let dataset = scripted_dataset();

    let expected = evaluate(&steady, &dataset).unwrap();
    let report = evaluate(&swapping, &dataset).unwrap();

    // the swap did happen, but no text was scored under it
    assert!(swapping.config().is_calibrated());
    assert!(!report.calibrated);
    assert_eq!(report, expected);
}

#[test]
fn test_evaluate_reports_batch_intervals() {
    let engine = scripted_engine();
    let report = evaluate(&engine, &scripted_dataset()).unwrap();

    let wilson = report.ai_share_wilson.as_ref().unwrap();
    assert_eq!(wilson.samples, 8);
    assert!(wilson.lower <= wilson.proportion.unwrap() && wilson.proportion.unwrap() <= wilson.upper);

    let normal = report.mean_probability.as_ref().unwrap();
    assert_relative_eq!(normal.upper - normal.mean, normal.mean - normal.lower, epsilon = 1e-12);

    let bootstrap = report.bootstrap.as_ref().unwrap();
    assert_eq!(bootstrap.original_samples, 8);
    assert_eq!(bootstrap.resamples, 1000);
    assert!(bootstrap.ai_probability.lower <= bootstrap.ai_probability.upper);

    assert_eq!(report, evaluate(&engine, &scripted_dataset()).unwrap());
}

const AI_TEMPLATE: &str = "Furthermore, the framework provides a comprehensive approach to topic {}. \
Moreover, the analysis demonstrates consistent results across every evaluated scenario. \
Additionally, the methodology ensures robust and reliable outcomes for all stakeholders.";

const HUMAN_TEMPLATE: &str = "honestly i can't believe it's day {} already lol. \
we didn't even get to the beach!! my brother's car broke down again, so yeah... whatever";

const SHARED_TEXT: &str = "The meeting is scheduled for Tuesday afternoon in the main office.";

/// 50 AI and 50 human texts; five identical texts carry each label.
fn mixed_dataset() -> ValidationDataset {
    let mut items = Vec::new();
    for i in 0..45 {
        items.push(item(&AI_TEMPLATE.replace("{}", &i.to_string()), TextLabel::Ai));
        items.push(item(&HUMAN_TEMPLATE.replace("{}", &i.to_string()), TextLabel::Human));
    }
    for _ in 0..5 {
        items.push(item(SHARED_TEXT, TextLabel::Ai));
        items.push(item(SHARED_TEXT, TextLabel::Human));
    }
    ValidationDataset::from_items(items)
}

fn coarse_settings() -> CalibrationSettings {
    CalibrationSettings {
        weight_step: 0.25,
        threshold_step: 0.05,
        ..CalibrationSettings::default()
    }
}

#[test]
fn test_builtin_analyzers_on_balanced_dataset() {
    let engine = EnsembleEngine::with_defaults();
    let dataset = mixed_dataset();
    assert_eq!(dataset.counts(), (50, 50));

    let run = CalibrationEngine::new(coarse_settings())
        .calibrate(&engine, &dataset)
        .unwrap();
    let result = &run.result;

    assert!(result.roc_auc > 0.0 && result.roc_auc < 1.0);
    assert!((0.0..=1.0).contains(&result.best_f1_score));
    assert_eq!(run.items_used + run.items_skipped, 100);
    assert_eq!(run.candidates_evaluated, 70);
    assert_relative_eq!(result.best_weights.sum(), 1.0, epsilon = 1e-9);
}

#[test]
fn test_calibration_is_deterministic() {
    let engine = EnsembleEngine::with_defaults();
    let dataset = mixed_dataset();
    let calibrator = CalibrationEngine::new(coarse_settings());

    let first = calibrator.calibrate(&engine, &dataset).unwrap();
    let second = calibrator.calibrate(&engine, &dataset).unwrap();
    assert_eq!(first.result, second.result);
    assert_eq!(first.candidates_evaluated, second.candidates_evaluated);
}

/// Texts with repeated words, varied word lengths and punctuation, so the
/// burstiness and entropy metrics carry real values.
fn metric_heavy_dataset() -> ValidationDataset {
    let mut items = Vec::new();
    for i in 0..12 {
        let ai = format!(
            "{} {} Consequently, the integrated platform {} delivers measurable, repeatable value.",
            AI_TEMPLATE.replace("{}", &i.to_string()),
            AI_TEMPLATE.replace("{}", &(i * 7).to_string()),
            i
        );
        let human = format!(
            "{} ugh, the bus (number {}) was late AGAIN?! whatever... my sister's cat knocked \
over my tea -- twice. so so tired.",
            HUMAN_TEMPLATE.replace("{}", &i.to_string()),
            i + 3
        );
        items.push(item(&ai, TextLabel::Ai));
        items.push(item(&human, TextLabel::Human));
    }
    ValidationDataset::from_items(items)
}

#[test]
fn test_calibration_matches_across_separately_built_engines() {
    let dataset = metric_heavy_dataset();
    let calibrator = CalibrationEngine::new(coarse_settings());

    let first = calibrator.calibrate(&EnsembleEngine::with_defaults(), &dataset).unwrap();
    let sample_text = &dataset.items()[1].text;
    let outcomes = EnsembleEngine::with_defaults().collect_outcomes(sample_text);
    let present = ["burstiness", "char_entropy", "word_length_entropy"]
        .iter()
        .filter(|metric| {
            outcomes
                .outcomes
                .iter()
                .any(|o| matches!(&o.result, Ok(est) if est.metrics.get(metric).is_some()))
        })
        .count();
    assert_eq!(present, 3);

    for _ in 0..3 {
        let again = calibrator.calibrate(&EnsembleEngine::with_defaults(), &dataset).unwrap();
        assert_eq!(again.result, first.result);
        assert_eq!(again.candidates_evaluated, first.candidates_evaluated);
    }
}

#[test]
fn test_calibrate_from_jsonl_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for record in mixed_dataset().items() {
        let line = serde_json::json!({ "text": record.text, "label": record.label });
        writeln!(file, "{}", line).unwrap();
    }

    let dataset = ValidationDataset::load(file.path()).unwrap();
    assert_eq!(dataset.len(), 100);

    let engine = EnsembleEngine::with_defaults();
    let run = CalibrationEngine::new(coarse_settings())
        .calibrate_and_apply(&engine, &dataset)
        .unwrap();
    assert!(engine.config().is_calibrated());
    assert_eq!(engine.config().thresholds, run.result.best_thresholds);
}
