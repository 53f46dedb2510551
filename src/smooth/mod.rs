//! Smooth terms $`f`$ of a composite objective
//!
//! A smooth term exposes its value and gradient, and optionally the extra
//! structure that specific solvers can exploit:
//! - a global Lipschitz constant $`L`$ of $`\nabla f`$, used to derive a step size,
//! - per-coordinate partial derivatives and Lipschitz constants for
//!   coordinate descent, optionally through a cache (such as the residual
//!   $`Ax - b`$) that is updated in place after each coordinate move,
//! - Hessian-vector products, used to estimate $`L`$ when it is not known,
//! - a finite-sum decomposition $`f = \frac1n \sum_{i=1}^n f_i`$ for the
//!   variance-reduced stochastic methods.
//!
//! For the least squares objective $`f(x) = \frac{1}{2n} \|Ax-b\|_2^2`$, we have
//! $`\nabla^2 f(x) = \frac1n A^HA \preceq \frac1n\sigma_1(A)^2 I`$, and so
//! $`L = \sigma_1(A)^2 / n`$.
//!
//! For more info, see [Lipschitz Continuity on Wikipedia](https://en.wikipedia.org/wiki/Lipschitz_continuity)

mod least_squares;
pub use least_squares::*;
mod logistic;
pub use logistic::*;

use ndarray::prelude::*;
use ndarray::NdFloat;

/// Differentiable term of a composite objective.
///
/// Only [`value`](Smooth::value) and [`gradient`](Smooth::gradient) are
/// required. The optional capabilities default to "not available"; solvers
/// that need one check for it before iterating and fail with
/// [`Error::InvalidArgument`](crate::Error::InvalidArgument) otherwise.
pub trait Smooth<S: NdFloat> {
    /// Number of variables, if fixed by the term.
    fn dim(&self) -> Option<usize> {
        None
    }

    fn value(&self, x: ArrayView1<S>) -> S;

    fn gradient(&self, x: ArrayView1<S>) -> Array1<S>;

    fn value_and_gradient(&self, x: ArrayView1<S>) -> (S, Array1<S>) {
        (self.value(x), self.gradient(x))
    }

    /// Partial derivative $`\partial f / \partial x_j`$.
    ///
    /// The default computes the full gradient; override it when a single
    /// coordinate is cheaper.
    fn partial_derivative(&self, x: ArrayView1<S>, j: usize) -> S {
        self.gradient(x)[j]
    }

    /// Auxiliary vector from which partial derivatives are cheaper than
    /// from `x`, e.g. the linear predictions $`Ax`$ of a data term.
    fn coordinate_cache(&self, _x: ArrayView1<S>) -> Option<Array1<S>> {
        None
    }

    /// Partial derivative $`\partial f / \partial x_j`$ from the cache of the
    /// current point.
    fn cached_partial_derivative(&self, _cache: ArrayView1<S>, _j: usize) -> Option<S> {
        None
    }

    /// Bring the cache up to date after $`x_j`$ moved by `delta`.
    fn update_coordinate_cache(&self, _cache: &mut Array1<S>, _j: usize, _delta: S) {}

    /// Lipschitz constant of $`\nabla f`$.
    fn lipschitz(&self) -> Option<S> {
        None
    }

    /// Lipschitz constant of $`\partial f / \partial x_j`$ along coordinate `j`.
    fn coordinate_lipschitz(&self, _j: usize) -> Option<S> {
        None
    }

    /// Hessian-vector product $`\nabla^2 f(x) v`$.
    fn hessian_vector_product(&self, _x: ArrayView1<S>, _v: ArrayView1<S>) -> Option<Array1<S>> {
        None
    }

    /// Number of terms $`n`$ in a finite-sum decomposition $`f = \frac1n\sum_i f_i`$.
    fn n_samples(&self) -> Option<usize> {
        None
    }

    /// Gradient of the `i`-th term $`f_i`$, for `i <` [`n_samples`](Smooth::n_samples).
    fn sample_gradient(&self, _x: ArrayView1<S>, _i: usize) -> Option<Array1<S>> {
        None
    }

    /// Largest Lipschitz constant among the $`\nabla f_i`$.
    fn sample_lipschitz(&self) -> Option<S> {
        None
    }
}

impl<'a, S: NdFloat, F: Smooth<S>> Smooth<S> for &'a F {
    fn dim(&self) -> Option<usize> {
        (**self).dim()
    }
    fn value(&self, x: ArrayView1<S>) -> S {
        (**self).value(x)
    }
    fn gradient(&self, x: ArrayView1<S>) -> Array1<S> {
        (**self).gradient(x)
    }
    fn value_and_gradient(&self, x: ArrayView1<S>) -> (S, Array1<S>) {
        (**self).value_and_gradient(x)
    }
    fn partial_derivative(&self, x: ArrayView1<S>, j: usize) -> S {
        (**self).partial_derivative(x, j)
    }
    fn coordinate_cache(&self, x: ArrayView1<S>) -> Option<Array1<S>> {
        (**self).coordinate_cache(x)
    }
    fn cached_partial_derivative(&self, cache: ArrayView1<S>, j: usize) -> Option<S> {
        (**self).cached_partial_derivative(cache, j)
    }
    fn update_coordinate_cache(&self, cache: &mut Array1<S>, j: usize, delta: S) {
        (**self).update_coordinate_cache(cache, j, delta)
    }
    fn lipschitz(&self) -> Option<S> {
        (**self).lipschitz()
    }
    fn coordinate_lipschitz(&self, j: usize) -> Option<S> {
        (**self).coordinate_lipschitz(j)
    }
    fn hessian_vector_product(&self, x: ArrayView1<S>, v: ArrayView1<S>) -> Option<Array1<S>> {
        (**self).hessian_vector_product(x, v)
    }
    fn n_samples(&self) -> Option<usize> {
        (**self).n_samples()
    }
    fn sample_gradient(&self, x: ArrayView1<S>, i: usize) -> Option<Array1<S>> {
        (**self).sample_gradient(x, i)
    }
    fn sample_lipschitz(&self) -> Option<S> {
        (**self).sample_lipschitz()
    }
}

/// Smooth term built from a pair of user callables.
///
/// ```
/// use ndarray::prelude::*;
/// use ndarray_copt::smooth::{FnSmooth, Smooth};
///
/// // f(x) = 0.5 (x - 3)^2
/// let f = FnSmooth::new(
///     |x: ArrayView1<f64>| 0.5 * (x[0] - 3.0).powi(2),
///     |x: ArrayView1<f64>| array![x[0] - 3.0],
/// )
/// .with_lipschitz(1.0);
/// assert_eq!(f.value(array![1.0].view()), 2.0);
/// ```
pub struct FnSmooth<S, V, G> {
    value: V,
    gradient: G,
    lipschitz: Option<S>,
    dim: Option<usize>,
}

impl<S, V, G> FnSmooth<S, V, G>
where
    S: NdFloat,
    V: Fn(ArrayView1<S>) -> S,
    G: Fn(ArrayView1<S>) -> Array1<S>,
{
    pub fn new(value: V, gradient: G) -> Self {
        FnSmooth {
            value,
            gradient,
            lipschitz: None,
            dim: None,
        }
    }

    /// Declare the Lipschitz constant of the gradient.
    #[must_use]
    pub fn with_lipschitz(mut self, lipschitz: S) -> Self {
        self.lipschitz = Some(lipschitz);
        self
    }

    /// Declare the number of variables so solvers can validate `x0`.
    #[must_use]
    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = Some(dim);
        self
    }
}

impl<S, V, G> Smooth<S> for FnSmooth<S, V, G>
where
    S: NdFloat,
    V: Fn(ArrayView1<S>) -> S,
    G: Fn(ArrayView1<S>) -> Array1<S>,
{
    fn dim(&self) -> Option<usize> {
        self.dim
    }

    fn value(&self, x: ArrayView1<S>) -> S {
        (self.value)(x)
    }

    fn gradient(&self, x: ArrayView1<S>) -> Array1<S> {
        (self.gradient)(x)
    }

    fn lipschitz(&self) -> Option<S> {
        self.lipschitz
    }
}

/// Finite-sum smooth term $`f = \frac1n\sum_i f_i`$ built from user callables.
///
/// `value` and `gradient` describe the full average, `sample_gradient`
/// returns $`\nabla f_i(x)`$ for a sample index `i < n_samples`.
pub struct FnFiniteSum<S, V, G, Gi> {
    value: V,
    gradient: G,
    sample_gradient: Gi,
    n_samples: usize,
    lipschitz: Option<S>,
    sample_lipschitz: Option<S>,
}

impl<S, V, G, Gi> FnFiniteSum<S, V, G, Gi>
where
    S: NdFloat,
    V: Fn(ArrayView1<S>) -> S,
    G: Fn(ArrayView1<S>) -> Array1<S>,
    Gi: Fn(ArrayView1<S>, usize) -> Array1<S>,
{
    pub fn new(value: V, gradient: G, sample_gradient: Gi, n_samples: usize) -> Self {
        FnFiniteSum {
            value,
            gradient,
            sample_gradient,
            n_samples,
            lipschitz: None,
            sample_lipschitz: None,
        }
    }

    #[must_use]
    pub fn with_lipschitz(mut self, lipschitz: S) -> Self {
        self.lipschitz = Some(lipschitz);
        self
    }

    /// Declare the largest Lipschitz constant among the per-sample gradients.
    #[must_use]
    pub fn with_sample_lipschitz(mut self, lipschitz: S) -> Self {
        self.sample_lipschitz = Some(lipschitz);
        self
    }
}

impl<S, V, G, Gi> Smooth<S> for FnFiniteSum<S, V, G, Gi>
where
    S: NdFloat,
    V: Fn(ArrayView1<S>) -> S,
    G: Fn(ArrayView1<S>) -> Array1<S>,
    Gi: Fn(ArrayView1<S>, usize) -> Array1<S>,
{
    fn value(&self, x: ArrayView1<S>) -> S {
        (self.value)(x)
    }

    fn gradient(&self, x: ArrayView1<S>) -> Array1<S> {
        (self.gradient)(x)
    }

    fn lipschitz(&self) -> Option<S> {
        self.lipschitz
    }

    fn n_samples(&self) -> Option<usize> {
        Some(self.n_samples)
    }

    fn sample_gradient(&self, x: ArrayView1<S>, i: usize) -> Option<Array1<S>> {
        Some((self.sample_gradient)(x, i))
    }

    fn sample_lipschitz(&self) -> Option<S> {
        self.sample_lipschitz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fn_smooth_defaults() {
        let f = FnSmooth::new(
            |x: ArrayView1<f64>| 0.5 * x.dot(&x),
            |x: ArrayView1<f64>| x.to_owned(),
        );
        let x = array![1., -2., 3.];
        let (v, g) = f.value_and_gradient(x.view());
        assert_abs_diff_eq!(v, 7.0);
        assert_abs_diff_eq!(g, x);
        assert_abs_diff_eq!(f.partial_derivative(x.view(), 1), -2.0);
        assert!(f.lipschitz().is_none());
        assert!(f.n_samples().is_none());
        assert!(f.hessian_vector_product(x.view(), x.view()).is_none());
        assert!(f.sample_gradient(x.view(), 0).is_none());
        assert!(f.coordinate_cache(x.view()).is_none());
    }

    #[test]
    fn fn_finite_sum_capabilities() {
        let c = array![1., 3.];
        let f = FnFiniteSum::new(
            |x: ArrayView1<f64>| c.iter().map(|ci| 0.5 * (x[0] - ci).powi(2)).sum::<f64>() / 2.,
            |x: ArrayView1<f64>| array![x[0] - 2.],
            |x: ArrayView1<f64>, i| array![x[0] - c[i]],
            2,
        )
        .with_sample_lipschitz(1.0);
        assert_eq!(f.n_samples(), Some(2));
        assert_abs_diff_eq!(f.sample_gradient(array![0.].view(), 1).unwrap(), array![-3.]);
        assert_eq!(f.sample_lipschitz(), Some(1.0));
        // borrowed terms forward every capability
        let by_ref = &f;
        assert_eq!(by_ref.n_samples(), Some(2));
    }
}
