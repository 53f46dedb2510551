#![allow(non_snake_case)]

use super::Smooth;
use crate::error::{Error, Result};
use crate::linop::DesignMatrix;
use ndarray::prelude::*;
use ndarray::{NdFloat, Zip};
use num_traits::Float;

/// Logistic loss for binary classification with labels $`b_i \in \{-1, +1\}`$
///
/// ```math
/// f(x) = \frac1n \sum_{i=1}^n \log\left(1 + e^{-b_i a_i^T x}\right)
/// ```
///
/// The second derivative of $`t \mapsto \log(1 + e^{-t})`$ is bounded by
/// $`\frac14`$, so the Lipschitz constants are those of least squares
/// scaled by a quarter. The design matrix may be dense or sparse, and
/// coordinate descent caches the linear predictions $`Ax`$.
#[derive(Debug, Clone)]
pub struct Logistic<S, M = Array2<S>> {
    A: M,
    b: Array1<S>,
    lipschitz: S,
    column_lipschitz: Array1<S>,
    sample_lipschitz: S,
}

/// $`\log(1 + e^{-t})`$ without overflow for large $`|t|`$
fn log1pexp_neg<S: Float>(t: S) -> S {
    if t > S::zero() {
        (-t).exp().ln_1p()
    } else {
        -t + t.exp().ln_1p()
    }
}

/// Logistic sigmoid $`1 / (1 + e^{-t})`$
fn sigmoid<S: Float>(t: S) -> S {
    if t >= S::zero() {
        S::one() / (S::one() + (-t).exp())
    } else {
        let e = t.exp();
        e / (S::one() + e)
    }
}

impl<S, M> Logistic<S, M>
where
    S: NdFloat,
    M: DesignMatrix<S>,
{
    pub fn new(A: M, b: Array1<S>) -> Result<Self> {
        let (n, p) = A.shape();
        if n == 0 || p == 0 {
            return Err(Error::invalid("logistic loss needs a non-empty design matrix"));
        }
        if b.len() != n {
            return Err(Error::invalid(format!(
                "logistic labels have length {} but the design matrix has {} rows",
                b.len(),
                n
            )));
        }
        if b.iter().any(|&bi| bi != S::one() && bi != -S::one()) {
            return Err(Error::invalid("logistic labels must be -1 or +1"));
        }
        let quarter = S::from(0.25).unwrap();
        let n_inv = S::one() / S::from(n).unwrap();
        let lipschitz = A.norm_squared()? * n_inv * quarter;
        let column_lipschitz = A.column_norms_squared() * (n_inv * quarter);
        let sample_lipschitz = A
            .row_norms_squared()
            .fold(S::zero(), |acc, &v| if v > acc { v } else { acc })
            * quarter;
        Ok(Logistic {
            A,
            b,
            lipschitz,
            column_lipschitz,
            sample_lipschitz,
        })
    }

    pub fn design(&self) -> &M {
        &self.A
    }

    pub fn labels(&self) -> ArrayView1<S> {
        self.b.view()
    }

    /// Derivative of each loss term with respect to its linear prediction $`a_i^T x`$
    fn slopes(&self, predictions: &Array1<S>) -> Array1<S> {
        Zip::from(predictions)
            .and(&self.b)
            .map_collect(|&z, &bi| slope(z, bi))
    }

    fn n_inv(&self) -> S {
        S::one() / S::from(self.b.len()).unwrap()
    }
}

/// $`\frac{d}{dz} \log(1 + e^{-b z}) = -b \sigma(-b z)`$
fn slope<S: Float>(z: S, b: S) -> S {
    -b * sigmoid(-b * z)
}

impl<S, M> Smooth<S> for Logistic<S, M>
where
    S: NdFloat,
    M: DesignMatrix<S>,
{
    fn dim(&self) -> Option<usize> {
        Some(self.A.shape().1)
    }

    fn value(&self, x: ArrayView1<S>) -> S {
        let z = self.A.matvec(x);
        Zip::from(&z)
            .and(&self.b)
            .fold(S::zero(), |acc, &zi, &bi| acc + log1pexp_neg(bi * zi))
            * self.n_inv()
    }

    fn gradient(&self, x: ArrayView1<S>) -> Array1<S> {
        let slopes = self.slopes(&self.A.matvec(x));
        self.A.rmatvec(slopes.view()) * self.n_inv()
    }

    fn value_and_gradient(&self, x: ArrayView1<S>) -> (S, Array1<S>) {
        let z = self.A.matvec(x);
        let n_inv = self.n_inv();
        let value = Zip::from(&z)
            .and(&self.b)
            .fold(S::zero(), |acc, &zi, &bi| acc + log1pexp_neg(bi * zi))
            * n_inv;
        let slopes = self.slopes(&z);
        (value, self.A.rmatvec(slopes.view()) * n_inv)
    }

    fn partial_derivative(&self, x: ArrayView1<S>, j: usize) -> S {
        let z = self.A.matvec(x);
        let b = &self.b;
        self.A.column_dot_with(j, |i| slope(z[i], b[i])) * self.n_inv()
    }

    fn coordinate_cache(&self, x: ArrayView1<S>) -> Option<Array1<S>> {
        Some(self.A.matvec(x))
    }

    fn cached_partial_derivative(&self, predictions: ArrayView1<S>, j: usize) -> Option<S> {
        let b = &self.b;
        Some(self.A.column_dot_with(j, |i| slope(predictions[i], b[i])) * self.n_inv())
    }

    fn update_coordinate_cache(&self, predictions: &mut Array1<S>, j: usize, delta: S) {
        self.A.column_axpy(j, delta, predictions);
    }

    fn lipschitz(&self) -> Option<S> {
        Some(self.lipschitz)
    }

    fn coordinate_lipschitz(&self, j: usize) -> Option<S> {
        self.column_lipschitz.get(j).copied()
    }

    fn hessian_vector_product(&self, x: ArrayView1<S>, v: ArrayView1<S>) -> Option<Array1<S>> {
        let z = self.A.matvec(x);
        let Av = self.A.matvec(v);
        let weighted = Zip::from(&z).and(&Av).map_collect(|&zi, &av| {
            let s = sigmoid(zi);
            s * (S::one() - s) * av
        });
        Some(self.A.rmatvec(weighted.view()) * self.n_inv())
    }

    fn n_samples(&self) -> Option<usize> {
        Some(self.b.len())
    }

    fn sample_gradient(&self, x: ArrayView1<S>, i: usize) -> Option<Array1<S>> {
        let z = self.A.row_dot(i, x);
        Some(self.A.scaled_row(i, slope(z, self.b[i])))
    }

    fn sample_lipschitz(&self) -> Option<S> {
        Some(self.sample_lipschitz)
    }
}
