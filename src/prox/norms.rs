use super::{check_step, Prox, ProxKind};
use crate::error::{Error, Result};
use ndarray::prelude::*;
use ndarray::NdFloat;

/// Scalar soft-thresholding $`\mathrm{sign}(v)\max(|v| - \tau, 0)`$
#[inline]
pub fn soft_threshold<S: NdFloat>(v: S, tau: S) -> S {
    if v > tau {
        v - tau
    } else if v < -tau {
        v + tau
    } else {
        S::zero()
    }
}

fn check_weight<S: NdFloat>(name: &str, weight: S) -> Result<()> {
    if weight >= S::zero() && weight.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "{} weight must be non-negative and finite, got {}",
            name, weight
        )))
    }
}

/// L1 penalty $`g(x) = \lambda \|x\|_1`$
///
/// The proximal map is soft-thresholding by $`\lambda t`$.
#[derive(Debug, Clone, Copy)]
pub struct L1<S> {
    lambda: S,
}

impl<S: NdFloat> L1<S> {
    pub fn new(lambda: S) -> Result<Self> {
        check_weight("L1", lambda)?;
        Ok(L1 { lambda })
    }

    pub fn lambda(&self) -> S {
        self.lambda
    }
}

impl<S: NdFloat> Prox<S> for L1<S> {
    fn kind(&self) -> ProxKind {
        ProxKind::ClosedForm
    }

    fn value(&self, x: ArrayView1<S>) -> S {
        x.fold(S::zero(), |acc, v| acc + v.abs()) * self.lambda
    }

    fn prox(&self, x: ArrayView1<S>, step: S) -> Result<Array1<S>> {
        check_step(step)?;
        let tau = self.lambda * step;
        Ok(x.mapv(|v| soft_threshold(v, tau)))
    }

    fn is_separable(&self) -> bool {
        true
    }

    fn prox_coordinate(&self, xj: S, _j: usize, step: S) -> Result<S> {
        check_step(step)?;
        Ok(soft_threshold(xj, self.lambda * step))
    }
}

/// Squared L2 penalty $`g(x) = \frac{\lambda}{2}\|x\|_2^2`$
///
/// The proximal map is the shrinkage $`x / (1 + \lambda t)`$.
#[derive(Debug, Clone, Copy)]
pub struct SquaredL2<S> {
    lambda: S,
}

impl<S: NdFloat> SquaredL2<S> {
    pub fn new(lambda: S) -> Result<Self> {
        check_weight("squared L2", lambda)?;
        Ok(SquaredL2 { lambda })
    }

    pub fn lambda(&self) -> S {
        self.lambda
    }
}

impl<S: NdFloat> Prox<S> for SquaredL2<S> {
    fn kind(&self) -> ProxKind {
        ProxKind::ClosedForm
    }

    fn value(&self, x: ArrayView1<S>) -> S {
        x.dot(&x) * self.lambda / S::from(2.).unwrap()
    }

    fn prox(&self, x: ArrayView1<S>, step: S) -> Result<Array1<S>> {
        check_step(step)?;
        Ok(&x / (S::one() + self.lambda * step))
    }

    fn is_separable(&self) -> bool {
        true
    }

    fn prox_coordinate(&self, xj: S, _j: usize, step: S) -> Result<S> {
        check_step(step)?;
        Ok(xj / (S::one() + self.lambda * step))
    }
}

/// Elastic net penalty $`g(x) = \lambda_1 \|x\|_1 + \frac{\lambda_2}{2}\|x\|_2^2`$
#[derive(Debug, Clone, Copy)]
pub struct ElasticNet<S> {
    l1: S,
    l2: S,
}

impl<S: NdFloat> ElasticNet<S> {
    pub fn new(l1: S, l2: S) -> Result<Self> {
        check_weight("elastic net L1", l1)?;
        check_weight("elastic net L2", l2)?;
        Ok(ElasticNet { l1, l2 })
    }

    #[inline]
    fn shrink(&self, v: S, step: S) -> S {
        soft_threshold(v, self.l1 * step) / (S::one() + self.l2 * step)
    }
}

impl<S: NdFloat> Prox<S> for ElasticNet<S> {
    fn kind(&self) -> ProxKind {
        ProxKind::ClosedForm
    }

    fn value(&self, x: ArrayView1<S>) -> S {
        let l1 = x.fold(S::zero(), |acc, v| acc + v.abs());
        l1 * self.l1 + x.dot(&x) * self.l2 / S::from(2.).unwrap()
    }

    fn prox(&self, x: ArrayView1<S>, step: S) -> Result<Array1<S>> {
        check_step(step)?;
        Ok(x.mapv(|v| self.shrink(v, step)))
    }

    fn is_separable(&self) -> bool {
        true
    }

    fn prox_coordinate(&self, xj: S, _j: usize, step: S) -> Result<S> {
        check_step(step)?;
        Ok(self.shrink(xj, step))
    }
}
