//! Per-input estimation: one independent weight result per input item.
//!
//! Used when different inputs are known to have structurally different
//! output distributions (one drop table per contract type, for example).
//! Each partition is estimated fully independently; there is no pooling or
//! weight sharing across partitions.

use std::collections::BTreeMap;

use crate::bayes::{infer_weights, BayesOptions, BayesianResult};
use crate::dataset::{validate_datasets, Dataset, InputItem};
use crate::error::EstimateError;
use crate::mle::{estimate_item_weights, MleOptions};

/// Group datasets by distinct input item.
///
/// A dataset listing `M` candidate inputs lands in all `M` partitions,
/// narrowed so that within a partition its counts credit that single input.
/// Datasets with no recorded input cannot be attributed and are left out.
pub fn partition_by_input(
    datasets: &[Dataset],
) -> Result<BTreeMap<String, Vec<Dataset>>, EstimateError> {
    validate_datasets(datasets)?;

    let mut partitions: BTreeMap<String, Vec<Dataset>> = BTreeMap::new();
    for ds in datasets {
        for id in ds.input_ids() {
            let mut narrowed = ds.clone();
            narrowed.input_items = Some(vec![InputItem { id: id.to_string() }]);
            partitions.entry(id.to_string()).or_default().push(narrowed);
        }
    }

    if partitions.is_empty() {
        return Err(EstimateError::InvalidInput(
            "no dataset names an input item to partition by".to_string(),
        ));
    }
    Ok(partitions)
}

/// Group whole datasets by a caller-supplied key (a contract or job label,
/// say). Datasets the key function maps to `None` are left out.
pub fn partition_by_key<F>(
    datasets: &[Dataset],
    key: F,
) -> Result<BTreeMap<String, Vec<Dataset>>, EstimateError>
where
    F: Fn(&Dataset) -> Option<String>,
{
    validate_datasets(datasets)?;

    let mut partitions: BTreeMap<String, Vec<Dataset>> = BTreeMap::new();
    for ds in datasets {
        if let Some(k) = key(ds) {
            partitions.entry(k).or_default().push(ds.clone());
        }
    }

    if partitions.is_empty() {
        return Err(EstimateError::InvalidInput(
            "grouping key matched no dataset".to_string(),
        ));
    }
    Ok(partitions)
}

/// Point weights per input item.
pub fn estimate_weights_per_input(
    datasets: &[Dataset],
    options: &MleOptions,
) -> Result<BTreeMap<String, BTreeMap<String, f64>>, EstimateError> {
    partition_by_input(datasets)?
        .into_iter()
        .map(|(id, group)| estimate_item_weights(&group, options).map(|w| (id, w)))
        .collect()
}

/// Posterior inference per input item.
pub fn infer_weights_per_input(
    datasets: &[Dataset],
    options: &BayesOptions,
) -> Result<BTreeMap<String, BayesianResult>, EstimateError> {
    partition_by_input(datasets)?
        .into_iter()
        .map(|(id, group)| infer_weights(&group, options).map(|r| (id, r)))
        .collect()
}

/// Point weights per caller-defined group.
pub fn estimate_weights_per_group<F>(
    datasets: &[Dataset],
    options: &MleOptions,
    key: F,
) -> Result<BTreeMap<String, BTreeMap<String, f64>>, EstimateError>
where
    F: Fn(&Dataset) -> Option<String>,
{
    partition_by_key(datasets, key)?
        .into_iter()
        .map(|(id, group)| estimate_item_weights(&group, options).map(|w| (id, w)))
        .collect()
}

/// Posterior inference per caller-defined group.
pub fn infer_weights_per_group<F>(
    datasets: &[Dataset],
    options: &BayesOptions,
    key: F,
) -> Result<BTreeMap<String, BayesianResult>, EstimateError>
where
    F: Fn(&Dataset) -> Option<String>,
{
    partition_by_key(datasets, key)?
        .into_iter()
        .map(|(id, group)| infer_weights(&group, options).map(|r| (id, r)))
        .collect()
}
