#![forbid(unsafe_code)]

//! # dropweights
//!
//! Drop-weight inference for item transformation data.
//!
//! Given observed transformation datasets — an input item (or a set of
//! candidate inputs) consumed to produce output items with counts — the
//! engine infers the latent probability distribution governing which output
//! is produced. A maximum-likelihood estimator returns point weights via
//! gradient ascent on a multinomial log-likelihood; a Bayesian estimator
//! returns a sampled posterior with summary statistics and convergence
//! diagnostics. Both share the same count matrix and item indexing, so
//! their results are directly comparable.
//!
//! The engine performs no I/O and holds no state between calls; loading
//! datasets and persisting results (see [`cache`]) are caller concerns.

pub mod bayes;
pub mod cache;
pub mod count_matrix;
pub mod dataset;
pub mod error;
pub mod mle;
pub mod per_input;
pub mod stats;

pub use bayes::{
    infer_weights, infer_weights_from_counts, BayesOptions, BayesianResult,
    ConvergenceDiagnostics, ModelAssumptions, OverallConvergence,
};
pub use cache::{
    CacheError, CachedWeights, Method, SqliteWeightCache, WeightCache, WeightCacheKey,
};
pub use count_matrix::{build_count_matrix, CountMatrix, ItemIndex};
pub use dataset::{Dataset, InputItem, OutputItem, Source};
pub use error::EstimateError;
pub use mle::{estimate_item_weights, estimate_weights_from_counts, MleOptions};
pub use per_input::{
    estimate_weights_per_group, estimate_weights_per_input, infer_weights_per_group,
    infer_weights_per_input, partition_by_input, partition_by_key,
};
pub use stats::{compute_statistics, CredibleInterval, SummaryStatistics};
