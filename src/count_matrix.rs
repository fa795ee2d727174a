//! Dense transformation-count matrix built from raw datasets.
//!
//! `counts[(k, j)]` holds the aggregated (possibly fractional) number of
//! observed transformations from input item `k` to output item `j`. Counts
//! are fractional whenever a dataset's true input is ambiguous: a dataset
//! listing `M` candidate inputs credits each candidate row with `count / M`,
//! and a dataset with no recorded input spreads `count / N` across every
//! row. Self-transition cells are filled like any other but never count
//! toward a row's outgoing total — an input does not produce itself as a
//! distinguishable output class.

use std::collections::HashMap;

use nalgebra::DMatrix;

use crate::dataset::{validate_datasets, Dataset};
use crate::error::EstimateError;

/// Insertion-ordered bijection between item ids and dense indices.
///
/// Output items are indexed before input items so that outputs are always
/// present even when never used as inputs, and both estimators share the
/// same ordering.
#[derive(Debug, Clone, Default)]
pub struct ItemIndex {
    ids: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ItemIndex {
    fn insert(&mut self, id: &str) {
        if !self.positions.contains_key(id) {
            self.positions.insert(id.to_string(), self.ids.len());
            self.ids.push(id.to_string());
        }
    }

    pub fn get(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn id_at(&self, idx: usize) -> &str {
        &self.ids[idx]
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Square transformation-count matrix plus the index it is dense over.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    pub counts: DMatrix<f64>,
    pub index: ItemIndex,
}

impl CountMatrix {
    pub fn n(&self) -> usize {
        self.index.len()
    }

    /// Outgoing total for row `k`, excluding the self-transition cell.
    pub fn row_total(&self, k: usize) -> f64 {
        let n = self.n();
        let mut total = 0.0;
        for j in 0..n {
            if j != k {
                total += self.counts[(k, j)];
            }
        }
        total
    }

    /// Observed total for output `m` across all rows, excluding the
    /// self-transition cell.
    pub fn column_total(&self, m: usize) -> f64 {
        let n = self.n();
        let mut total = 0.0;
        for k in 0..n {
            if k != m {
                total += self.counts[(k, m)];
            }
        }
        total
    }

    /// Validation guard shared by the estimators: square shape and an index
    /// that matches the matrix dimension.
    pub(crate) fn check(&self) -> Result<(), EstimateError> {
        let (rows, cols) = self.counts.shape();
        if rows == 0 || cols == 0 {
            return Err(EstimateError::InvalidMatrix(
                "count matrix is empty".to_string(),
            ));
        }
        if rows != cols {
            return Err(EstimateError::InvalidMatrix(format!(
                "count matrix is not square ({rows}x{cols})"
            )));
        }
        if self.index.len() != rows {
            return Err(EstimateError::InvalidMatrix(format!(
                "item index has {} entries for a {rows}x{cols} matrix",
                self.index.len()
            )));
        }
        Ok(())
    }
}

/// Build the dense count matrix for a collection of datasets.
///
/// The item index is built first (all outputs, then all distinct inputs),
/// so by the time counts are filled every id resolves and `N` is final.
pub fn build_count_matrix(datasets: &[Dataset]) -> Result<CountMatrix, EstimateError> {
    validate_datasets(datasets)?;

    let mut index = ItemIndex::default();
    for ds in datasets {
        for item in &ds.items {
            index.insert(&item.id);
        }
    }
    for ds in datasets {
        for id in ds.input_ids() {
            index.insert(id);
        }
    }

    let n = index.len();
    let mut counts = DMatrix::<f64>::zeros(n, n);

    for ds in datasets {
        let input_rows: Vec<usize> = ds
            .input_ids()
            .iter()
            .filter_map(|id| index.get(id))
            .collect();

        if input_rows.is_empty() {
            // Unknown input: uniformly distributed over all indexed items.
            let share = 1.0 / n as f64;
            for item in &ds.items {
                let j = match index.get(&item.id) {
                    Some(j) => j,
                    None => continue,
                };
                let credit = item.count * share;
                for k in 0..n {
                    counts[(k, j)] += credit;
                }
            }
        } else {
            // Any of the M candidates could equally have been the input.
            let share = 1.0 / input_rows.len() as f64;
            for item in &ds.items {
                let j = match index.get(&item.id) {
                    Some(j) => j,
                    None => continue,
                };
                let credit = item.count * share;
                for &k in &input_rows {
                    counts[(k, j)] += credit;
                }
            }
        }
    }

    Ok(CountMatrix { counts, index })
}
