#![allow(non_snake_case)]

use super::{check_step, Prox, ProxKind};
use crate::error::{Error, Result};
use ndarray::prelude::*;
use ndarray::NdFloat;
use ndarray_linalg::svd::SVD;
use ndarray_linalg::{Lapack, Scalar};

/// Trace (nuclear) norm penalty $`g(X) = \lambda \sum_i \sigma_i(X)`$
///
/// The variable is a matrix of shape `(rows, cols)` stored as a flat vector
/// in row-major order, so it can be optimized by the same vector solvers.
/// The proximal map soft-thresholds the singular values,
/// ```math
/// \mathrm{prox}_{t g}(X) = U \max(\Sigma - \lambda t, 0) V^H
/// ```
/// which costs one SVD per call.
#[derive(Debug, Clone, Copy)]
pub struct TraceNorm<S> {
    lambda: S,
    shape: (usize, usize),
}

impl<S> TraceNorm<S>
where
    S: NdFloat + Lapack + Scalar<Real = S>,
{
    pub fn new(lambda: S, shape: (usize, usize)) -> Result<Self> {
        if !(lambda >= S::zero() && num_traits::Float::is_finite(lambda)) {
            return Err(Error::invalid(format!(
                "trace norm weight must be non-negative, got {}",
                lambda
            )));
        }
        if shape.0 == 0 || shape.1 == 0 {
            return Err(Error::invalid("trace norm needs a non-empty matrix shape"));
        }
        Ok(TraceNorm { lambda, shape })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    fn as_matrix(&self, x: ArrayView1<S>) -> Result<Array2<S>> {
        Array2::from_shape_vec(self.shape, x.to_vec()).map_err(|_| {
            Error::invalid(format!(
                "trace norm expects {} entries for shape {:?}, got {}",
                self.shape.0 * self.shape.1,
                self.shape,
                x.len()
            ))
        })
    }
}

impl<S> Prox<S> for TraceNorm<S>
where
    S: NdFloat + Lapack + Scalar<Real = S>,
{
    fn kind(&self) -> ProxKind {
        ProxKind::Iterative
    }

    fn dim(&self) -> Option<usize> {
        Some(self.shape.0 * self.shape.1)
    }

    /// A failed SVD yields NaN, which solvers report as divergence.
    fn value(&self, x: ArrayView1<S>) -> S {
        let singular = self
            .as_matrix(x)
            .ok()
            .and_then(|X| X.svd(false, false).ok())
            .map(|(_, sigma, _)| sigma);
        match singular {
            Some(sigma) => sigma.sum() * self.lambda,
            None => S::nan(),
        }
    }

    fn prox(&self, x: ArrayView1<S>, step: S) -> Result<Array1<S>> {
        check_step(step)?;
        let X = self.as_matrix(x)?;
        let (u, sigma, vt) = X.svd(true, true)?;
        let (U, Vt) = match (u, vt) {
            (Some(U), Some(Vt)) => (U, Vt),
            _ => return Err(Error::invalid("SVD did not return singular vectors")),
        };
        let k = sigma.len();
        let tau = self.lambda * step;
        let shrunk = sigma.mapv(|v| (v - tau).max(S::zero()));
        let Uk = U.slice(s![.., ..k]);
        let Vtk = Vt.slice(s![..k, ..]);
        let Y = (&Uk * &shrunk).dot(&Vtk);
        Ok(Array1::from_iter(Y.iter().cloned()))
    }
}
