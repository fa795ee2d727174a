//! Posterior summary statistics and chain diagnostics.
//!
//! Pure functions over raw posterior samples. Used inside the Bayesian
//! estimator and standalone when only raw samples were cached and the
//! summaries have to be recomputed.

use std::collections::BTreeMap;
use std::f64::consts::SQRT_2;

use serde::Serialize;
use statrs::function::erf::erf;

const MODE_BINS: usize = 30;
const TINY: f64 = 1e-18;

/// Empirical credible interval from posterior sample quantiles.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CredibleInterval {
    pub lower: f64,
    pub upper: f64,
}

/// Per-item posterior summary.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStatistics {
    /// 50th percentile of the chain.
    pub median: f64,
    /// Highest-density point, approximated by a histogram mode.
    pub map: f64,
    pub credible_interval: CredibleInterval,
}

/// Summarize every item's chain: median, MAP, and the central credible
/// interval holding `credible_mass` of the samples.
pub fn compute_statistics(
    posterior_samples: &BTreeMap<String, Vec<f64>>,
    credible_mass: f64,
) -> BTreeMap<String, SummaryStatistics> {
    let tail = (1.0 - credible_mass.clamp(0.0, 1.0)) / 2.0;
    let mut out = BTreeMap::new();
    for (id, chain) in posterior_samples {
        out.insert(id.clone(), summarize(chain, tail));
    }
    out
}

fn summarize(chain: &[f64], tail: f64) -> SummaryStatistics {
    if chain.is_empty() {
        return SummaryStatistics {
            median: 0.0,
            map: 0.0,
            credible_interval: CredibleInterval {
                lower: 0.0,
                upper: 0.0,
            },
        };
    }
    let mut sorted = chain.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let median = quantile(&sorted, 0.5);
    SummaryStatistics {
        median,
        map: histogram_mode(&sorted, median),
        credible_interval: CredibleInterval {
            lower: quantile(&sorted, tail),
            upper: quantile(&sorted, 1.0 - tail),
        },
    }
}

/// Linear-interpolation quantile over an ascending-sorted slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Mode approximation: midpoint of the fullest fixed-width histogram bin.
/// Falls back to the median when the sample range collapses.
fn histogram_mode(sorted: &[f64], fallback: f64) -> f64 {
    let lo = sorted[0];
    let hi = sorted[sorted.len() - 1];
    let range = hi - lo;
    if range <= TINY {
        return fallback;
    }

    let mut bins = [0usize; MODE_BINS];
    for &v in sorted {
        let mut b = ((v - lo) / range * MODE_BINS as f64) as usize;
        if b >= MODE_BINS {
            b = MODE_BINS - 1;
        }
        bins[b] += 1;
    }

    let mut best = 0;
    for (b, &count) in bins.iter().enumerate() {
        if count > bins[best] {
            best = b;
        }
    }
    lo + (best as f64 + 0.5) / MODE_BINS as f64 * range
}

/// Split-chain potential scale reduction factor.
///
/// Compares the two halves of a single chain; values near 1.0 indicate the
/// halves agree in mean and variance. A constant chain reports 1.0.
pub fn split_r_hat(chain: &[f64]) -> f64 {
    let n = chain.len();
    if n < 4 {
        return 1.0;
    }
    let half = n / 2;
    let a = &chain[..half];
    let b = &chain[n - half..];

    let (mean_a, var_a) = mean_and_var(a);
    let (mean_b, var_b) = mean_and_var(b);

    let w = 0.5 * (var_a + var_b);
    if w <= TINY {
        return 1.0;
    }
    let n_half = half as f64;
    let b_over_n = 0.5 * (mean_a - mean_b).powi(2);
    let var_plus = (n_half - 1.0) / n_half * w + b_over_n;
    (var_plus / w).sqrt()
}

/// Geweke-style two-sided p-value comparing the start of a chain against
/// its tail (first 10% vs. last 50%). Small values flag a drifting chain.
pub fn geweke_p(chain: &[f64]) -> f64 {
    let n = chain.len();
    if n < 20 {
        return 1.0;
    }
    let head = &chain[..(n / 10).max(2)];
    let tail = &chain[n / 2..];

    let (mean_h, var_h) = mean_and_var(head);
    let (mean_t, var_t) = mean_and_var(tail);

    let se2 = var_h / head.len() as f64 + var_t / tail.len() as f64;
    if se2 <= TINY {
        return 1.0;
    }
    let z = (mean_h - mean_t) / se2.sqrt();
    2.0 * (1.0 - normal_cdf(z.abs()))
}

fn mean_and_var(x: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    if x.len() < 2 {
        return (mean, 0.0);
    }
    let var = x
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / (n - 1.0);
    (mean, var)
}

pub(crate) fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / SQRT_2))
}
