//! Proximal operators for the non-smooth term $`g`$ of a composite objective
//!
//! The proximal operator of $`g`$ with step $`t > 0`$ is
//! ```math
//! \mathrm{prox}_{t g}(x) = \mathrm{arg}\!\min_u \; g(u) + \frac{1}{2t}\|u - x\|_2^2
//! ```
//! For the indicator of a closed convex set this is the Euclidean
//! projection onto that set, so constrained smooth problems are covered by
//! the same solvers as regularized ones.
//!
//! Operators come in three flavours, see [`ProxKind`]. Separable operators
//! additionally expose a scalar [`prox_coordinate`](Prox::prox_coordinate),
//! which is what coordinate descent applies.

mod indicator;
pub use indicator::*;
mod norms;
pub use norms::*;
mod trace_norm;
pub use trace_norm::*;

use crate::error::{Error, Result};
use ndarray::prelude::*;
use ndarray::NdFloat;

/// How a proximal map is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxKind {
    /// Elementwise closed form, e.g. soft-thresholding
    ClosedForm,
    /// Requires an inner numerical routine, e.g. an SVD
    Iterative,
    /// Euclidean projection onto a convex set
    Indicator,
}

/// Non-smooth, "prox-friendly" term of a composite objective.
///
/// Implementations must be valid proximal maps: single-valued and
/// non-expansive for every `step > 0`. A `step` that is not strictly
/// positive is rejected with [`Error::InvalidArgument`].
pub trait Prox<S: NdFloat> {
    fn kind(&self) -> ProxKind;

    /// Value $`g(x)`$; indicators return $`+\infty`$ outside their set.
    fn value(&self, x: ArrayView1<S>) -> S;

    /// $`\mathrm{prox}_{\mathrm{step}\cdot g}(x)`$
    fn prox(&self, x: ArrayView1<S>, step: S) -> Result<Array1<S>>;

    /// Number of variables, if fixed by the operator.
    fn dim(&self) -> Option<usize> {
        None
    }

    /// Whether $`g(x) = \sum_j g_j(x_j)`$.
    fn is_separable(&self) -> bool {
        false
    }

    /// One-dimensional proximal map of $`g_j`$, for separable operators.
    fn prox_coordinate(&self, _xj: S, _j: usize, _step: S) -> Result<S> {
        Err(Error::invalid(
            "coordinate-wise proximal map requested from a non-separable operator",
        ))
    }
}

impl<'a, S: NdFloat, G: Prox<S>> Prox<S> for &'a G {
    fn kind(&self) -> ProxKind {
        (**self).kind()
    }
    fn value(&self, x: ArrayView1<S>) -> S {
        (**self).value(x)
    }
    fn prox(&self, x: ArrayView1<S>, step: S) -> Result<Array1<S>> {
        (**self).prox(x, step)
    }
    fn dim(&self) -> Option<usize> {
        (**self).dim()
    }
    fn is_separable(&self) -> bool {
        (**self).is_separable()
    }
    fn prox_coordinate(&self, xj: S, j: usize, step: S) -> Result<S> {
        (**self).prox_coordinate(xj, j, step)
    }
}

/// Reject steps that are not strictly positive (including NaN).
pub(crate) fn check_step<S: NdFloat>(step: S) -> Result<()> {
    if step > S::zero() && step.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "proximal step must be positive and finite, got {}",
            step
        )))
    }
}

/// The zero function, whose proximal map is the identity.
///
/// Turns every composite solver into its smooth counterpart.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zero;

impl<S: NdFloat> Prox<S> for Zero {
    fn kind(&self) -> ProxKind {
        ProxKind::ClosedForm
    }

    fn value(&self, _x: ArrayView1<S>) -> S {
        S::zero()
    }

    fn prox(&self, x: ArrayView1<S>, step: S) -> Result<Array1<S>> {
        check_step(step)?;
        Ok(x.to_owned())
    }

    fn is_separable(&self) -> bool {
        true
    }

    fn prox_coordinate(&self, xj: S, _j: usize, step: S) -> Result<S> {
        check_step(step)?;
        Ok(xj)
    }
}

/// Proximal term built from a pair of user callables.
///
/// The step is validated before `prox` is called, so the callable may
/// assume `step > 0`.
pub struct FnProx<V, P> {
    value: V,
    prox: P,
    kind: ProxKind,
}

impl<V, P> FnProx<V, P> {
    pub fn new<S>(value: V, prox: P) -> Self
    where
        S: NdFloat,
        V: Fn(ArrayView1<S>) -> S,
        P: Fn(ArrayView1<S>, S) -> Array1<S>,
    {
        FnProx {
            value,
            prox,
            kind: ProxKind::ClosedForm,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ProxKind) -> Self {
        self.kind = kind;
        self
    }
}

impl<S, V, P> Prox<S> for FnProx<V, P>
where
    S: NdFloat,
    V: Fn(ArrayView1<S>) -> S,
    P: Fn(ArrayView1<S>, S) -> Array1<S>,
{
    fn kind(&self) -> ProxKind {
        self.kind
    }

    fn value(&self, x: ArrayView1<S>) -> S {
        (self.value)(x)
    }

    fn prox(&self, x: ArrayView1<S>, step: S) -> Result<Array1<S>> {
        check_step(step)?;
        Ok((self.prox)(x, step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn zero_is_identity() {
        let x = array![1., -2., 0.5];
        assert_abs_diff_eq!(Zero.prox(x.view(), 3.0).unwrap(), x);
        assert_eq!(Prox::<f64>::value(&Zero, x.view()), 0.0);
        assert_eq!(Prox::<f64>::prox_coordinate(&Zero, 2.0, 0, 1.0).unwrap(), 2.0);
    }

    #[test]
    fn non_positive_step_is_rejected() {
        let x = array![1., -2.];
        for &step in &[0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                Zero.prox(x.view(), step),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn fn_prox_checks_step() {
        let g = FnProx::new(
            |x: ArrayView1<f64>| x.iter().map(|v| v.abs()).sum(),
            |x: ArrayView1<f64>, t: f64| x.mapv(|v| v.signum() * (v.abs() - t).max(0.)),
        );
        assert!(g.prox(array![1.].view(), 0.0).is_err());
        assert_abs_diff_eq!(g.prox(array![3., -0.5].view(), 1.0).unwrap(), array![2., 0.]);
        assert_eq!(g.kind(), ProxKind::ClosedForm);
        assert!(!g.is_separable());
        assert!(g.prox_coordinate(1.0, 0, 1.0).is_err());
    }
}
