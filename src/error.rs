//! Error taxonomy for the inference engine.
//!
//! Only structural problems are errors. Numerical instability inside an
//! estimator is recovered locally (reset to a uniform state) and surfaced
//! via `tracing`, and a non-converged chain is reported through
//! `ConvergenceDiagnostics`, never raised.

/// Failure modes of the estimators and the count-matrix builder.
#[derive(Debug, thiserror::Error)]
pub enum EstimateError {
    /// Empty dataset collection, or a dataset with missing/malformed
    /// `items`, `inputItems`, `id`, or `count` fields.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Count matrix failed validation before optimization (non-square,
    /// empty, or item-index size mismatch).
    #[error("invalid matrix: {0}")]
    InvalidMatrix(String),

    /// Estimator options failed validation (non-positive learning rate,
    /// zero iterations, inconsistent chain configuration).
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}
