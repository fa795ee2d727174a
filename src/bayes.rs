//! Bayesian weight inference via Markov-chain sampling.
//!
//! Same generative model as the maximum-likelihood path: each input row
//! produces outputs according to the shared weight vector, with the row's
//! own item excluded from its observable outputs. Instead of a point
//! estimate, the weights carry a symmetric Dirichlet prior represented
//! through independent Gamma latents (`g_i ~ Gamma(alpha, 1)`, weights
//! `w = g / sum(g)`), and the posterior is explored with
//! Metropolis-within-Gibbs: one log-space random-walk proposal per
//! coordinate per sweep, accepted against prior plus multinomial
//! likelihood.
//!
//! The sampler is a deterministic function of the count matrix and the
//! options; the RNG seed is part of the options so runs are reproducible.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use tracing::{debug, warn};

use crate::count_matrix::{build_count_matrix, CountMatrix};
use crate::dataset::Dataset;
use crate::error::EstimateError;
use crate::stats::{compute_statistics, geweke_p, split_r_hat, SummaryStatistics};

const WEIGHT_FLOOR: f64 = 1e-300;
const R_HAT_LIMIT: f64 = 1.10;
const ACCEPTANCE_LOW: f64 = 0.05;
const ACCEPTANCE_HIGH: f64 = 0.90;

/// Chain configuration.
#[derive(Debug, Clone)]
pub struct BayesOptions {
    /// Total sweeps (each sweep proposes one update per coordinate).
    pub chain_length: usize,
    /// Leading sweeps discarded before retention.
    pub burn_in: usize,
    /// Keep every `thin`-th sweep after burn-in.
    pub thin: usize,
    /// Symmetric Dirichlet concentration. 1.0 is flat over the simplex.
    pub prior_concentration: f64,
    /// Standard deviation of the log-space random-walk proposal.
    pub proposal_scale: f64,
    /// Mass of the central credible interval.
    pub credible_mass: f64,
    /// Seed for the proposal/acceptance RNG.
    pub rng_seed: u64,
}

impl Default for BayesOptions {
    fn default() -> Self {
        Self {
            chain_length: 12_000,
            burn_in: 2_000,
            thin: 2,
            prior_concentration: 1.0,
            proposal_scale: 0.25,
            credible_mass: 0.95,
            rng_seed: 1337,
        }
    }
}

fn validate_options(options: &BayesOptions) -> Result<(), EstimateError> {
    if options.chain_length == 0 {
        return Err(EstimateError::InvalidOptions(
            "chain length must be positive".to_string(),
        ));
    }
    if options.burn_in >= options.chain_length {
        return Err(EstimateError::InvalidOptions(format!(
            "burn-in ({}) must be shorter than the chain ({})",
            options.burn_in, options.chain_length
        )));
    }
    if options.thin == 0 {
        return Err(EstimateError::InvalidOptions(
            "thinning interval must be positive".to_string(),
        ));
    }
    if !options.prior_concentration.is_finite() || options.prior_concentration <= 0.0 {
        return Err(EstimateError::InvalidOptions(format!(
            "prior concentration must be positive, got {}",
            options.prior_concentration
        )));
    }
    if !options.proposal_scale.is_finite() || options.proposal_scale <= 0.0 {
        return Err(EstimateError::InvalidOptions(format!(
            "proposal scale must be positive, got {}",
            options.proposal_scale
        )));
    }
    if !(options.credible_mass > 0.0 && options.credible_mass < 1.0) {
        return Err(EstimateError::InvalidOptions(format!(
            "credible mass must lie in (0, 1), got {}",
            options.credible_mass
        )));
    }
    Ok(())
}

/// Chain-level convergence signal. Non-convergence is surfaced here, never
/// raised as an error.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceDiagnostics {
    /// Fraction of proposals accepted over the whole run.
    pub acceptance_rate: f64,
    /// Per-item split-chain potential scale reduction factor; drives the
    /// overall flag together with the acceptance rate.
    pub split_r_hat: BTreeMap<String, f64>,
    /// Per-item Geweke p-value (chain start vs. tail). Reported only: the
    /// underlying z-test assumes independent draws, which a thinned
    /// random-walk chain does not deliver.
    pub geweke_p: BTreeMap<String, f64>,
    pub overall: OverallConvergence,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallConvergence {
    pub converged: bool,
}

/// Echo of the prior/likelihood configuration, for reproducibility.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelAssumptions {
    pub prior: String,
    pub prior_concentration: f64,
    pub likelihood: String,
    pub chain_length: usize,
    pub burn_in: usize,
    pub thin: usize,
    pub proposal_scale: f64,
    pub credible_mass: f64,
    pub rng_seed: u64,
}

/// Full Bayesian inference output. Serializes to the JSON shape the
/// browser app persists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BayesianResult {
    pub posterior_samples: BTreeMap<String, Vec<f64>>,
    pub summary_statistics: BTreeMap<String, SummaryStatistics>,
    pub convergence_diagnostics: ConvergenceDiagnostics,
    pub model_assumptions: ModelAssumptions,
}

fn model_assumptions(options: &BayesOptions) -> ModelAssumptions {
    ModelAssumptions {
        prior: "symmetric Dirichlet (normalized-Gamma representation)".to_string(),
        prior_concentration: options.prior_concentration,
        likelihood: "multinomial output counts per input row, self-transitions excluded"
            .to_string(),
        chain_length: options.chain_length,
        burn_in: options.burn_in,
        thin: options.thin,
        proposal_scale: options.proposal_scale,
        credible_mass: options.credible_mass,
        rng_seed: options.rng_seed,
    }
}

fn retained_len(options: &BayesOptions) -> usize {
    let kept = options.chain_length - options.burn_in;
    kept.div_ceil(options.thin)
}

/// Log prior plus log likelihood for the Gamma latents `g`.
///
/// `col_counts[m]` is the observed total for output `m` across all rows
/// with the diagonal excluded, which is the sufficient statistic for the
/// multinomial terms.
fn log_target(g: &[f64], col_counts: &[f64], alpha: f64) -> f64 {
    let total: f64 = g.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let mut lp = 0.0;
    for &gi in g {
        lp += (alpha - 1.0) * gi.ln() - gi;
    }
    for (m, &c) in col_counts.iter().enumerate() {
        if c > 0.0 {
            lp += c * (g[m] / total).max(WEIGHT_FLOOR).ln();
        }
    }
    lp
}

/// Run the sampler over a prebuilt count matrix.
pub fn infer_weights_from_counts(
    matrix: &CountMatrix,
    options: &BayesOptions,
) -> Result<BayesianResult, EstimateError> {
    validate_options(options)?;
    matrix.check()?;

    let n = matrix.n();
    let kept = retained_len(options);

    if n == 1 {
        // Degenerate universe: the posterior is a point mass at 1.0.
        let id = matrix.index.id_at(0).to_string();
        let mut posterior_samples = BTreeMap::new();
        posterior_samples.insert(id.clone(), vec![1.0; kept]);
        let summary_statistics = compute_statistics(&posterior_samples, options.credible_mass);
        let mut ones = BTreeMap::new();
        ones.insert(id, 1.0);
        return Ok(BayesianResult {
            posterior_samples,
            summary_statistics,
            convergence_diagnostics: ConvergenceDiagnostics {
                acceptance_rate: 1.0,
                split_r_hat: ones.clone(),
                geweke_p: ones,
                overall: OverallConvergence { converged: true },
            },
            model_assumptions: model_assumptions(options),
        });
    }

    let col_counts: Vec<f64> = (0..n).map(|m| matrix.column_total(m)).collect();
    let alpha = options.prior_concentration;

    let step = Normal::new(0.0, options.proposal_scale)
        .map_err(|e| EstimateError::InvalidOptions(format!("proposal scale: {e}")))?;
    let mut rng = StdRng::seed_from_u64(options.rng_seed);

    let mut g = vec![1.0_f64; n];
    let mut log_post = log_target(&g, &col_counts, alpha);

    let mut chains: Vec<Vec<f64>> = vec![Vec::with_capacity(kept); n];
    let mut accepted = 0u64;
    let mut proposed = 0u64;
    let mut resets = 0usize;

    for sweep in 0..options.chain_length {
        if !log_post.is_finite() {
            resets += 1;
            if resets == 1 {
                warn!("non-finite posterior state, resetting chain to uniform");
            }
            g.iter_mut().for_each(|gi| *gi = 1.0);
            log_post = log_target(&g, &col_counts, alpha);
        }

        for i in 0..n {
            proposed += 1;
            let old = g[i];
            let cand = old * step.sample(&mut rng).exp();
            if !cand.is_finite() || cand <= 0.0 {
                continue;
            }
            g[i] = cand;
            let lp_new = log_target(&g, &col_counts, alpha);
            // Lognormal random walk is asymmetric; the Hastings correction
            // is the ratio of the proposed and current coordinate.
            let log_accept = lp_new - log_post + (cand.ln() - old.ln());
            if lp_new.is_finite() && rng.gen::<f64>().ln() < log_accept {
                log_post = lp_new;
                accepted += 1;
            } else {
                g[i] = old;
            }
        }

        if sweep >= options.burn_in && (sweep - options.burn_in) % options.thin == 0 {
            let total: f64 = g.iter().sum();
            for (i, chain) in chains.iter_mut().enumerate() {
                chain.push(g[i] / total);
            }
        }
    }

    let acceptance_rate = if proposed == 0 {
        0.0
    } else {
        accepted as f64 / proposed as f64
    };

    let mut posterior_samples = BTreeMap::new();
    let mut r_hats = BTreeMap::new();
    let mut geweke = BTreeMap::new();
    let mut all_stable = true;
    for (i, chain) in chains.into_iter().enumerate() {
        let id = matrix.index.id_at(i).to_string();
        let r = split_r_hat(&chain);
        if r > R_HAT_LIMIT {
            all_stable = false;
        }
        r_hats.insert(id.clone(), r);
        geweke.insert(id.clone(), geweke_p(&chain));
        posterior_samples.insert(id, chain);
    }

    let converged = all_stable
        && acceptance_rate >= ACCEPTANCE_LOW
        && acceptance_rate <= ACCEPTANCE_HIGH;
    if !converged {
        warn!(acceptance_rate, "chain did not pass convergence checks");
    }
    debug!(acceptance_rate, resets, kept, "sampling finished");

    let summary_statistics = compute_statistics(&posterior_samples, options.credible_mass);

    Ok(BayesianResult {
        posterior_samples,
        summary_statistics,
        convergence_diagnostics: ConvergenceDiagnostics {
            acceptance_rate,
            split_r_hat: r_hats,
            geweke_p: geweke,
            overall: OverallConvergence { converged },
        },
        model_assumptions: model_assumptions(options),
    })
}

/// Compose the count-matrix builder with the sampler.
pub fn infer_weights(
    datasets: &[Dataset],
    options: &BayesOptions,
) -> Result<BayesianResult, EstimateError> {
    let matrix = build_count_matrix(datasets)?;
    infer_weights_from_counts(&matrix, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inconsistent_chain_options_are_rejected() {
        let opts = BayesOptions {
            burn_in: 500,
            chain_length: 500,
            ..BayesOptions::default()
        };
        assert!(validate_options(&opts).is_err());

        let opts = BayesOptions {
            thin: 0,
            ..BayesOptions::default()
        };
        assert!(validate_options(&opts).is_err());

        let opts = BayesOptions {
            credible_mass: 1.0,
            ..BayesOptions::default()
        };
        assert!(validate_options(&opts).is_err());
    }

    #[test]
    fn retained_length_rounds_up() {
        let opts = BayesOptions {
            chain_length: 11,
            burn_in: 4,
            thin: 2,
            ..BayesOptions::default()
        };
        // Sweeps 4, 6, 8, 10 are retained.
        assert_eq!(retained_len(&opts), 4);
    }

    #[test]
    fn log_target_penalizes_unobserved_mass() {
        // Two items, all observations on the first.
        let col_counts = vec![10.0, 0.0];
        let balanced = log_target(&[1.0, 1.0], &col_counts, 1.0);
        let skewed = log_target(&[3.0, 0.5], &col_counts, 1.0);
        assert!(skewed > balanced);
    }
}
