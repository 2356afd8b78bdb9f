//! detector-cli: classify text as AI- or human-written and calibrate the ensemble.
//!
//! Usage:
//!   cargo run -p detector-cli -- analyze essay.txt
//!   cargo run -p detector-cli -- analyze -                      # read stdin
//!   cargo run -p detector-cli -- calibrate labeled.jsonl --output calibration.json
//!   cargo run -p detector-cli -- evaluate labeled.jsonl --calibration calibration.json
//!   cargo run -p detector-cli -- cross-validate labeled.json
//!
//! Settings come from DETECTOR_* environment variables (see config.rs).
//! Results are printed to stdout as JSON.

mod config;

use std::io::Read;
use std::time::Duration;

use analysis_core::CalibrationResult;
use analysis_orchestrator::EnsembleEngine;
use anyhow::{Context, Result};
use confidence_calibrator::{evaluate, CalibrationEngine, ValidationDataset};
use serde::Serialize;
use text_analyzers::AnalyzerRegistry;

use crate::config::DetectorConfig;

const USAGE: &str = "usage: detector-cli <analyze|calibrate|evaluate|cross-validate> <file> \
[--output <file>] [--calibration <file>] [--list-analyzers]";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "detector_cli=info,confidence_calibrator=info,analysis_orchestrator=warn".into()
            }),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let registry = AnalyzerRegistry::builtin();

    if args.iter().any(|a| a == "--list-analyzers") {
        for (name, description) in registry.describe() {
            println!("{:<10} {}", name, description);
        }
        return Ok(());
    }

    let command = args.get(1).map(|s| s.as_str()).unwrap_or("");
    let target = args
        .get(2)
        .filter(|a| !a.starts_with("--"))
        .map(|s| s.as_str());
    let output = flag_value(&args, "--output");
    let calibration_file = flag_value(&args, "--calibration");

    let config = DetectorConfig::from_env()?;
    let engine = EnsembleEngine::from_registry(&registry, &config.analyzers, config.engine_settings())?;
    tracing::info!("Analyzers: {}", engine.analyzer_names().join(", "));

    if let Some(path) = calibration_file {
        let saved: CalibrationResult = serde_json::from_str(
            &std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?,
        )
        .with_context(|| format!("parsing calibration {}", path))?;
        tracing::info!(
            "Loaded calibration from {} (ai_threshold {:.2})",
            path,
            saved.best_thresholds.ai_threshold
        );
        engine.apply_calibration(saved);
    }

    match (command, target) {
        ("analyze", Some(path)) => {
            let text = read_text(path)?;
            let annotated = match config.analysis_timeout_ms {
                Some(ms) => {
                    engine
                        .analyze_annotated_with_timeout(&text, Duration::from_millis(ms))
                        .await?
                }
                None => engine.analyze_annotated(&text)?,
            };
            print_json(&annotated)?;
        }
        ("calibrate", Some(path)) => {
            let dataset = ValidationDataset::load(path)?;
            let calibrator = CalibrationEngine::new(config.calibration_settings());
            let run = calibrator.calibrate_and_apply(&engine, &dataset)?;
            if let Some(out) = output {
                std::fs::write(out, serde_json::to_string_pretty(&run.result)?)
                    .with_context(|| format!("writing {}", out))?;
                tracing::info!("Calibration saved to {}", out);
            }
            print_json(&run)?;
        }
        ("evaluate", Some(path)) => {
            let dataset = ValidationDataset::load(path)?;
            print_json(&evaluate(&engine, &dataset)?)?;
        }
        ("cross-validate", Some(path)) => {
            let dataset = ValidationDataset::load(path)?;
            let calibrator = CalibrationEngine::new(config.calibration_settings());
            let report = calibrator.cross_validate(&engine, &dataset, config.cv_folds, config.seed)?;
            print_json(&report)?;
        }
        _ => anyhow::bail!(USAGE),
    }

    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

/// Reads a file, or stdin when the path is `-`.
fn read_text(path: &str) -> Result<String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
