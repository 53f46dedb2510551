//! Composite objectives $`F(x) = f(x) + g(x)`$
//!
//! An [`Objective`] pairs a [`Smooth`] term with a [`Prox`] term and checks
//! that a starting point fits both before a solver runs.

use crate::error::{Error, Result};
use crate::prox::Prox;
use crate::smooth::Smooth;
use ndarray::prelude::*;
use ndarray::NdFloat;

/// Composite objective $`F(x) = f(x) + g(x)`$ with smooth `f` and proximal `g`.
///
/// Both terms are held by value; pass references (`&f`, `&g`) to share them
/// between solver calls.
#[derive(Debug, Clone)]
pub struct Objective<F, G> {
    pub smooth: F,
    pub prox: G,
}

impl<F, G> Objective<F, G> {
    pub fn new(smooth: F, prox: G) -> Self {
        Objective { smooth, prox }
    }

    /// $`f(x) + g(x)`$
    pub fn value<S>(&self, x: ArrayView1<S>) -> S
    where
        S: NdFloat,
        F: Smooth<S>,
        G: Prox<S>,
    {
        self.smooth.value(x) + self.prox.value(x)
    }

    /// Reject a starting point that is empty, non-finite, or whose length
    /// disagrees with a dimension declared by either term.
    pub fn validate<S>(&self, x0: ArrayView1<S>) -> Result<()>
    where
        S: NdFloat,
        F: Smooth<S>,
        G: Prox<S>,
    {
        if x0.is_empty() {
            return Err(Error::invalid("starting point is empty"));
        }
        if !x0.iter().all(|v| v.is_finite()) {
            return Err(Error::invalid("starting point has non-finite entries"));
        }
        let n = x0.len();
        if let Some(d) = self.smooth.dim().filter(|&d| d != n) {
            return Err(Error::invalid(format!(
                "starting point has {} entries but the smooth term expects {}",
                n, d
            )));
        }
        if let Some(d) = self.prox.dim().filter(|&d| d != n) {
            return Err(Error::invalid(format!(
                "starting point has {} entries but the proximal term expects {}",
                n, d
            )));
        }
        Ok(())
    }
}
