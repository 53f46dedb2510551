//! Error types for composite minimization

use ndarray_linalg::error::LinalgError;
use thiserror::Error;

/// Result type alias using this crate's [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or running a solver
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input detected before any iteration ran, e.g. a
    /// non-positive step or a dimension mismatch.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Backtracking exhausted its attempt budget without satisfying
    /// the sufficient-decrease condition.
    #[error("line search failed after {attempts} attempts (last step {step:e})")]
    LineSearchFailure {
        /// Number of trial steps evaluated
        attempts: usize,
        /// Last trial step size
        step: f64,
    },

    /// An iterate or gradient became NaN or infinite.
    #[error("numerical divergence at iteration {iteration}")]
    NumericalDivergence {
        /// Iteration at which the non-finite value appeared
        iteration: usize,
    },

    /// Failure inside the linear-algebra backend (e.g. SVD)
    #[error(transparent)]
    Linalg(#[from] LinalgError),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
