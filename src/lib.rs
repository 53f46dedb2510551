//! The `ndarray-copt` crate minimizes composite objectives
//! ```math
//! \min_x F(x) = f(x) + g(x)
//! ```
//! over `ndarray` vectors, where $`f`$ is smooth (value and gradient are
//! available) and $`g`$ is possibly non-smooth but has a cheap proximal
//! operator, such as an $`\ell_1`$ penalty, a constraint set, or a trace norm.
//!
//! It includes commonly used first-order methods:
//! - Proximal Gradient Descent (ISTA)
//! - Accelerated Proximal Gradient (FISTA) with adaptive restart
//! - Proximal Coordinate Descent
//! - SAGA and SVRG variance-reduced stochastic gradient
//!
//! together with fixed, backtracking and Barzilai-Borwein step sizes,
//! gradient-mapping convergence checks and optional per-iteration traces.
//! The built-in data terms accept dense `Array2` or sparse
//! [`CscMatrix`](linop::CscMatrix) design matrices.
//!
//! ```
//! # extern crate intel_mkl_src;
//! use ndarray::prelude::*;
//! use ndarray_copt::prelude::*;
//!
//! // Lasso: (1/2n) ||Ax - b||^2 + 0.1 ||x||_1
//! let A = array![[1.0, 0.0], [0.0, 2.0], [1.0, 1.0]];
//! let b = array![1.0, 2.0, 0.0];
//! let objective = Objective::new(LeastSquares::new(A, b).unwrap(), L1::new(0.1).unwrap());
//! let config = Config::<f64>::default().with_tol(1e-8);
//! let result = solve(
//!     &objective,
//!     Array1::zeros(2).view(),
//!     Algorithm::AcceleratedProximalGradient,
//!     &config,
//! )
//! .unwrap();
//! assert!(result.converged);
//! ```
//!
//! Solvers never stop with an error once iterating: line-search failures and
//! numerical divergence are reported through
//! [`OptimizeResult::termination`] with the last finite iterate, and only
//! invalid input is rejected up front with [`Error::InvalidArgument`].
//! Progress is logged through the `log` facade.

#![cfg_attr(all(rustc_nightly, test), feature(test))]
#[cfg(all(rustc_nightly, test))]
extern crate test;

#[cfg(test)]
extern crate intel_mkl_src;

pub mod composite;
pub mod config;
pub mod convergence;
pub mod error;
pub mod linop;
pub mod objective;
pub mod prox;
pub mod result;
pub mod smooth;
pub mod step_size;

pub use composite::{solve, Algorithm};
pub use config::Config;
pub use error::{Error, Result};
pub use objective::Objective;
pub use result::{OptimizeResult, Termination};

/// Everything needed to set up and run a solver
pub mod prelude {
    pub use crate::composite::{
        accelerated_proximal_gradient, coordinate_descent, nop, proximal_gradient, saga, solve,
        svrg, Algorithm,
    };
    pub use crate::config::{Config, CoordinateOrder, Restart, StepSizePolicy};
    pub use crate::error::{Error, Result};
    pub use crate::linop::{CscMatrix, DesignMatrix};
    pub use crate::objective::Objective;
    pub use crate::prox::{
        BoxConstraint, ElasticNet, FnProx, L2Ball, Prox, Simplex, SquaredL2, TraceNorm, Zero, L1,
    };
    pub use crate::result::{OptimizeResult, Termination};
    pub use crate::smooth::{FnFiniteSum, FnSmooth, LeastSquares, Logistic, Smooth};
    pub use crate::step_size::LineSearch;
}
