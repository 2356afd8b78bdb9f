//! Labeled validation data: a JSON array or JSON Lines of
//! `{"text": ..., "label": "ai" | "human"}` records.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use analysis_core::{LabeledText, TextLabel};
use serde::Deserialize;

use crate::error::CalibrationError;

#[derive(Deserialize)]
struct RawRecord {
    text: String,
    label: String,
}

impl RawRecord {
    fn into_labeled(self, position: &str) -> Result<LabeledText, CalibrationError> {
        let label = TextLabel::from_str(&self.label)
            .map_err(|e| CalibrationError::MalformedDataset(format!("{}: {}", position, e)))?;
        Ok(LabeledText {
            text: self.text,
            label,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationDataset {
    items: Vec<LabeledText>,
}

impl ValidationDataset {
    pub fn from_items(items: Vec<LabeledText>) -> Self {
        Self { items }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| CalibrationError::MissingDataset {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset = Self::from_json_str(&content)?;
        tracing::info!(
            "Loaded {} labeled texts from {}",
            dataset.len(),
            path.display()
        );
        Ok(dataset)
    }

    /// Parses a JSON array when the content starts with `[`, JSON Lines otherwise.
    pub fn from_json_str(content: &str) -> Result<Self, CalibrationError> {
        let trimmed = content.trim_start();
        if trimmed.is_empty() {
            return Err(CalibrationError::MalformedDataset("dataset is empty".into()));
        }

        let items = if trimmed.starts_with('[') {
            let records: Vec<RawRecord> = serde_json::from_str(trimmed)
                .map_err(|e| CalibrationError::MalformedDataset(e.to_string()))?;
            records
                .into_iter()
                .enumerate()
                .map(|(i, r)| r.into_labeled(&format!("record {}", i)))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            let mut items = Vec::new();
            for (i, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let position = format!("line {}", i + 1);
                let record: RawRecord = serde_json::from_str(line).map_err(|e| {
                    CalibrationError::MalformedDataset(format!("{}: {}", position, e))
                })?;
                items.push(record.into_labeled(&position)?);
            }
            items
        };

        Ok(Self { items })
    }

    pub fn items(&self) -> &[LabeledText] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `(ai, human)` label counts.
    pub fn counts(&self) -> (usize, usize) {
        let ai = self.items.iter().filter(|i| i.label.is_ai()).count();
        (ai, self.items.len() - ai)
    }

    pub fn validate(&self, min_per_class: usize) -> Result<(), CalibrationError> {
        let (ai, human) = self.counts();
        check_counts(ai, human, min_per_class)
    }
}

pub(crate) fn check_counts(ai: usize, human: usize, required: usize) -> Result<(), CalibrationError> {
    let required = required.max(1);
    if ai < required || human < required {
        return Err(CalibrationError::InsufficientLabels {
            ai,
            human,
            required,
        });
    }
    Ok(())
}
