//! Maximum-likelihood weight estimation.
//!
//! Latent scores `theta` (one per indexed item, all starting at zero, i.e. a
//! uniform prior) define weights through a softmax. Each input row `k` with
//! outgoing total `n_k` contributes a multinomial likelihood over the
//! outputs it can produce (everything except itself), and the optimizer runs
//! batch gradient ascent on the total log-likelihood. Items that only ever
//! appear as inputs soak up no observed mass, so their weight decays toward
//! zero as the observed outputs absorb the distribution.
//!
//! Gradient and score updates are clamped to keep the exponentials finite,
//! and a degenerate row normalizer resets the scores to uniform instead of
//! failing the call.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::count_matrix::{build_count_matrix, CountMatrix};
use crate::dataset::Dataset;
use crate::error::EstimateError;

const GRAD_CLAMP: f64 = 100.0;
const THETA_CLAMP: f64 = 50.0;

/// Gradient-ascent configuration.
#[derive(Debug, Clone)]
pub struct MleOptions {
    /// Step size for each gradient-ascent update.
    pub learning_rate: f64,
    /// Number of batch iterations over all input rows.
    pub iterations: usize,
    /// Optional early stop: halt once the Euclidean norm of the gradient
    /// falls below this.
    pub convergence_threshold: Option<f64>,
}

impl Default for MleOptions {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            iterations: 6000,
            convergence_threshold: None,
        }
    }
}

fn validate_options(options: &MleOptions) -> Result<(), EstimateError> {
    if !options.learning_rate.is_finite() || options.learning_rate <= 0.0 {
        return Err(EstimateError::InvalidOptions(format!(
            "learning rate must be positive, got {}",
            options.learning_rate
        )));
    }
    if options.iterations == 0 {
        return Err(EstimateError::InvalidOptions(
            "iterations must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

/// Point weights for every indexed item, in index order.
///
/// Returned weights are non-negative and sum to 1 by construction.
pub fn estimate_weights_from_counts(
    matrix: &CountMatrix,
    options: &MleOptions,
) -> Result<Vec<f64>, EstimateError> {
    validate_options(options)?;
    matrix.check()?;

    let n = matrix.n();
    if n == 1 {
        // No contrast exists to estimate from.
        return Ok(vec![1.0]);
    }

    let row_totals: Vec<f64> = (0..n).map(|k| matrix.row_total(k)).collect();
    let total_outgoing: f64 = row_totals.iter().sum();

    // Per-row terms regroup into column aggregates: summing
    // (counts[k][m] - n_k * p_m) over rows k != m gives
    // col_counts[m] - p_m * off_row_totals[m], with both aggregates fixed
    // across iterations.
    let col_counts: Vec<f64> = (0..n).map(|m| matrix.column_total(m)).collect();
    let off_row_totals: Vec<f64> = (0..n).map(|m| total_outgoing - row_totals[m]).collect();

    let mut theta = vec![0.0_f64; n];
    let mut resets = 0usize;
    let mut iterations_run = 0usize;
    let mut grad_norm = 0.0_f64;

    for _ in 0..options.iterations {
        iterations_run += 1;

        let exp_theta: Vec<f64> = theta.iter().map(|t| t.exp()).collect();
        let total: f64 = exp_theta.iter().sum();

        let mut degenerate = !total.is_finite();
        if !degenerate {
            for k in 0..n {
                if row_totals[k] <= 0.0 {
                    continue;
                }
                let denom = total - exp_theta[k];
                if !denom.is_finite() || denom <= 0.0 {
                    degenerate = true;
                    break;
                }
            }
        }
        if degenerate {
            resets += 1;
            if resets == 1 {
                warn!("degenerate softmax normalizer, resetting scores to uniform");
            }
            theta.iter_mut().for_each(|t| *t = 0.0);
            continue;
        }

        let mut grad = vec![0.0; n];
        for m in 0..n {
            let p = exp_theta[m] / total;
            grad[m] = col_counts[m] - p * off_row_totals[m];
        }

        grad_norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
        if let Some(threshold) = options.convergence_threshold {
            if grad_norm < threshold {
                break;
            }
        }

        for i in 0..n {
            theta[i] += options.learning_rate * grad[i].clamp(-GRAD_CLAMP, GRAD_CLAMP);
            theta[i] = theta[i].clamp(-THETA_CLAMP, THETA_CLAMP);
        }
    }

    debug!(
        iterations_run,
        grad_norm,
        resets,
        "gradient ascent finished"
    );

    Ok(softmax(&theta))
}

/// Compose the count-matrix builder with the optimizer and key the result
/// by item id.
pub fn estimate_item_weights(
    datasets: &[Dataset],
    options: &MleOptions,
) -> Result<BTreeMap<String, f64>, EstimateError> {
    let matrix = build_count_matrix(datasets)?;
    let weights = estimate_weights_from_counts(&matrix, options)?;

    let mut out = BTreeMap::new();
    for (idx, w) in weights.iter().enumerate() {
        out.insert(matrix.index.id_at(idx).to_string(), *w);
    }
    Ok(out)
}

fn softmax(theta: &[f64]) -> Vec<f64> {
    let max = theta.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = theta.iter().map(|t| (t - max).exp()).collect();
    let total: f64 = exp.iter().sum();
    exp.iter().map(|e| e / total).collect()
}
