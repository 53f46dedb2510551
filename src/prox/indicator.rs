//! Indicator functions of convex sets, whose proximal maps are projections

use super::{check_step, Prox, ProxKind};
use crate::error::{Error, Result};
use ndarray::prelude::*;
use ndarray::NdFloat;
use std::cmp::Ordering;

/// Slack allowed when deciding membership in [`Prox::value`].
fn feasibility_tol<S: NdFloat>(scale: S) -> S {
    S::epsilon().sqrt() * S::one().max(scale.abs())
}

fn indicator<S: NdFloat>(feasible: bool) -> S {
    if feasible {
        S::zero()
    } else {
        S::infinity()
    }
}

/// Box constraint $`\ell \le x_j \le u`$ for every coordinate
#[derive(Debug, Clone, Copy)]
pub struct BoxConstraint<S> {
    lower: S,
    upper: S,
}

impl<S: NdFloat> BoxConstraint<S> {
    /// Either bound may be infinite, but `lower <= upper` must hold.
    pub fn new(lower: S, upper: S) -> Result<Self> {
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(Error::invalid(format!(
                "box constraint needs lower <= upper, got [{}, {}]",
                lower, upper
            )));
        }
        Ok(BoxConstraint { lower, upper })
    }

    /// The non-negative orthant $`x \ge 0`$
    pub fn non_negative() -> Self {
        BoxConstraint {
            lower: S::zero(),
            upper: S::infinity(),
        }
    }

    #[inline]
    fn clip(&self, v: S) -> S {
        v.max(self.lower).min(self.upper)
    }
}

impl<S: NdFloat> Prox<S> for BoxConstraint<S> {
    fn kind(&self) -> ProxKind {
        ProxKind::Indicator
    }

    fn value(&self, x: ArrayView1<S>) -> S {
        let lower = self.lower - feasibility_tol(self.lower);
        let upper = self.upper + feasibility_tol(self.upper);
        let feasible = x.iter().all(|&v| v >= lower && v <= upper);
        indicator(feasible)
    }

    fn prox(&self, x: ArrayView1<S>, step: S) -> Result<Array1<S>> {
        check_step(step)?;
        Ok(x.mapv(|v| self.clip(v)))
    }

    fn is_separable(&self) -> bool {
        true
    }

    fn prox_coordinate(&self, xj: S, _j: usize, step: S) -> Result<S> {
        check_step(step)?;
        Ok(self.clip(xj))
    }
}

/// Scaled probability simplex $`\{x : x \ge 0, \sum_j x_j = r\}`$
///
/// The projection sorts the input once and finds the shift $`\theta`$ with
/// $`\sum_j \max(x_j - \theta, 0) = r`$, in $`O(n \log n)`$, see
/// [\[DSSC08\]](#references).
///
/// References
/// ----------
/// \[DSSC08\]: [ Duchi J, Shalev-Shwartz S, Singer Y, Chandra T,
///             "Efficient Projections onto the l1-Ball for Learning in High Dimensions",
///             ICML 2008 ](https://doi.org/10.1145/1390156.1390191)
#[derive(Debug, Clone, Copy)]
pub struct Simplex<S> {
    radius: S,
}

impl<S: NdFloat> Simplex<S> {
    pub fn new(radius: S) -> Result<Self> {
        if !(radius > S::zero() && radius.is_finite()) {
            return Err(Error::invalid(format!(
                "simplex radius must be positive, got {}",
                radius
            )));
        }
        Ok(Simplex { radius })
    }

    /// The probability simplex, entries summing to one
    pub fn probability() -> Self {
        Simplex { radius: S::one() }
    }

    pub fn radius(&self) -> S {
        self.radius
    }

    fn project(&self, x: ArrayView1<S>) -> Array1<S> {
        let mut sorted = x.to_vec();
        sorted.sort_unstable_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

        let mut cumsum = S::zero();
        let mut theta = S::zero();
        for (k, &v) in sorted.iter().enumerate() {
            cumsum += v;
            let candidate = (cumsum - self.radius) / S::from(k + 1).unwrap();
            // the first entry always qualifies, so theta is always set
            if v - candidate > S::zero() {
                theta = candidate;
            } else {
                break;
            }
        }
        x.mapv(|v| (v - theta).max(S::zero()))
    }
}

impl<S: NdFloat> Prox<S> for Simplex<S> {
    fn kind(&self) -> ProxKind {
        ProxKind::Indicator
    }

    fn value(&self, x: ArrayView1<S>) -> S {
        let tol = feasibility_tol(self.radius) * S::from(x.len().max(1)).unwrap();
        let feasible = x.iter().all(|&v| v >= -tol) && (x.sum() - self.radius).abs() <= tol;
        indicator(feasible)
    }

    fn prox(&self, x: ArrayView1<S>, step: S) -> Result<Array1<S>> {
        check_step(step)?;
        if x.is_empty() {
            return Err(Error::invalid("cannot project an empty vector onto the simplex"));
        }
        Ok(self.project(x))
    }
}

/// Euclidean ball $`\{x : \|x\|_2 \le r\}`$
#[derive(Debug, Clone, Copy)]
pub struct L2Ball<S> {
    radius: S,
}

impl<S: NdFloat> L2Ball<S> {
    pub fn new(radius: S) -> Result<Self> {
        if !(radius >= S::zero() && radius.is_finite()) {
            return Err(Error::invalid(format!(
                "ball radius must be non-negative, got {}",
                radius
            )));
        }
        Ok(L2Ball { radius })
    }
}

impl<S: NdFloat> Prox<S> for L2Ball<S> {
    fn kind(&self) -> ProxKind {
        ProxKind::Indicator
    }

    fn value(&self, x: ArrayView1<S>) -> S {
        let norm = x.dot(&x).sqrt();
        indicator(norm <= self.radius + feasibility_tol(self.radius))
    }

    fn prox(&self, x: ArrayView1<S>, step: S) -> Result<Array1<S>> {
        check_step(step)?;
        let norm = x.dot(&x).sqrt();
        if norm <= self.radius {
            Ok(x.to_owned())
        } else {
            Ok(&x * (self.radius / norm))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray_rand::rand_distr::Normal;
    use ndarray_rand::RandomExt;

    fn assert_on_simplex(u: &Array1<f64>, radius: f64) {
        assert!(u.iter().all(|&v| v >= 0.0), "negative entry in {}", u);
        assert_abs_diff_eq!(u.sum(), radius, epsilon = 1e-12);
    }

    #[test]
    fn box_clips() {
        let g = BoxConstraint::new(0.0, 1.0).unwrap();
        let u = g.prox(array![-1.0, 0.5, 2.0].view(), 1.0).unwrap();
        assert_abs_diff_eq!(u, array![0.0, 0.5, 1.0]);
        assert_eq!(g.value(u.view()), 0.0);
        assert_eq!(g.value(array![1.5].view()), f64::INFINITY);
        assert!(BoxConstraint::new(1.0, 0.0).is_err());
    }

    #[test]
    fn non_negative_orthant() {
        let g = BoxConstraint::non_negative();
        let u = g.prox(array![1.0, -2.0, 3.0, -0.5].view(), 2.0).unwrap();
        assert_abs_diff_eq!(u, array![1.0, 0.0, 3.0, 0.0]);
        assert_eq!(g.prox_coordinate(-4.0, 0, 1.0).unwrap(), 0.0);
    }

    #[test]
    fn simplex_known_projection() {
        let g = Simplex::probability();
        let u = g.prox(array![0.5, 0.5, 0.5].view(), 1.0).unwrap();
        assert_abs_diff_eq!(u, array![1. / 3., 1. / 3., 1. / 3.], epsilon = 1e-12);
        let u = g.prox(array![2.0, 0.0].view(), 1.0).unwrap();
        assert_abs_diff_eq!(u, array![1.0, 0.0]);
    }

    #[test]
    fn simplex_all_negative_input() {
        let g = Simplex::probability();
        let u = g.prox(array![-3.0, -1.0, -2.0].view(), 1.0).unwrap();
        assert_on_simplex(&u, 1.0);
        assert_abs_diff_eq!(u, array![0.0, 1.0, 0.0]);
    }

    #[test]
    fn simplex_feasible_input_is_fixed() {
        let g = Simplex::probability();
        let x = array![0.2, 0.3, 0.5];
        let u = g.prox(x.view(), 1.0).unwrap();
        assert_abs_diff_eq!(u, x, epsilon = 1e-12);
        assert_eq!(g.value(x.view()), 0.0);
        assert_eq!(g.value(array![0.2, 0.2].view()), f64::INFINITY);
    }

    #[test]
    fn simplex_random_inputs() {
        let g = Simplex::new(2.5).unwrap();
        for _ in 0..50 {
            let x = Array::random(17, Normal::new(0., 5.).unwrap());
            let u = g.prox(x.view(), 1.0).unwrap();
            assert_on_simplex(&u, 2.5);
        }
        assert!(Simplex::new(0.0).is_err());
        assert!(g.prox(Array1::<f64>::zeros(0).view(), 1.0).is_err());
    }

    #[test]
    fn ball_scales_outside_points() {
        let g = L2Ball::new(2.0).unwrap();
        let u = g.prox(array![3.0, 4.0].view(), 1.0).unwrap();
        assert_abs_diff_eq!(u, array![1.2, 1.6], epsilon = 1e-12);
        let inside = array![0.5, -0.5];
        assert_abs_diff_eq!(g.prox(inside.view(), 1.0).unwrap(), inside);
        assert_eq!(g.value(array![3.0, 4.0].view()), f64::INFINITY);
    }
}
