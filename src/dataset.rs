//! Transformation dataset model and validation.
//!
//! A dataset records one observation batch: some input item (or a set of
//! candidate input items, when the true input was not recorded) consumed to
//! produce output items with counts. The JSON shape matches the browser
//! app's dataset files, camelCase field names included.

use serde::{Deserialize, Serialize};

use crate::error::EstimateError;

/// Where a dataset's observations came from (wiki page, spreadsheet, ...).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Source {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A candidate input item for a dataset.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputItem {
    pub id: String,
}

/// An observed output item with its count.
///
/// Counts are `f64` because ambiguous-input datasets distribute counts
/// fractionally across candidate inputs downstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputItem {
    pub id: String,
    pub count: f64,
}

/// One observed transformation dataset.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    /// Candidate inputs. Absent (or empty) means the input was not recorded
    /// and is treated as uniformly unknown among all indexed items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_items: Option<Vec<InputItem>>,
    /// Observed outputs. Required and non-empty.
    pub items: Vec<OutputItem>,
}

impl Dataset {
    /// Distinct candidate input ids, in first-seen order.
    pub fn input_ids(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        if let Some(inputs) = &self.input_items {
            for item in inputs {
                if !out.contains(&item.id.as_str()) {
                    out.push(item.id.as_str());
                }
            }
        }
        out
    }
}

/// Structural validation shared by every entry point.
///
/// Structural fields are required; there is no record-level skipping — one
/// malformed entry fails the whole call.
pub fn validate_datasets(datasets: &[Dataset]) -> Result<(), EstimateError> {
    if datasets.is_empty() {
        return Err(EstimateError::InvalidInput(
            "no datasets provided".to_string(),
        ));
    }
    for ds in datasets {
        if ds.items.is_empty() {
            return Err(EstimateError::InvalidInput(format!(
                "dataset '{}' has no output items",
                ds.name
            )));
        }
        for item in &ds.items {
            if item.id.is_empty() {
                return Err(EstimateError::InvalidInput(format!(
                    "dataset '{}' has an output item with an empty id",
                    ds.name
                )));
            }
            if !item.count.is_finite() || item.count < 0.0 {
                return Err(EstimateError::InvalidInput(format!(
                    "dataset '{}' output '{}' has a non-finite or negative count",
                    ds.name, item.id
                )));
            }
        }
        if let Some(inputs) = &ds.input_items {
            for input in inputs {
                if input.id.is_empty() {
                    return Err(EstimateError::InvalidInput(format!(
                        "dataset '{}' has an input item with an empty id",
                        ds.name
                    )));
                }
            }
        }
    }
    Ok(())
}
