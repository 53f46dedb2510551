//! Convergence criteria and iteration tracing
//!
//! When $`g`$ is non-smooth, $`\|\nabla f(x)\|`$ says nothing about
//! optimality. The gradient mapping
//! ```math
//! G_t(x) = \frac{1}{t}\left(x - \mathrm{prox}_{t g}(x - t\nabla f(x))\right)
//! ```
//! plays its role: $`G_t(x) = 0`$ exactly when $`x`$ minimizes $`f + g`$.

use crate::config::Config;
use crate::error::Result;
use crate::prox::Prox;
use crate::step_size::forward_backward;
use log::debug;
use ndarray::prelude::*;
use ndarray::{NdFloat, Zip};
use std::time::{Duration, Instant};

/// Snapshot of one iteration, recorded when tracing is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceRecord<S> {
    pub iteration: usize,
    /// Composite objective $`f(x) + g(x)`$
    pub objective: S,
    pub criterion: S,
    pub step_size: S,
    /// Wall-clock time since the solver started
    pub elapsed: Duration,
}

/// Norm of the gradient mapping $`\|G_t(x)\|_2`$.
pub fn gradient_mapping_norm<S, G>(g: &G, x: ArrayView1<S>, grad: ArrayView1<S>, step: S) -> Result<S>
where
    S: NdFloat,
    G: Prox<S>,
{
    let u = forward_backward(g, x, grad, step)?;
    Ok(distance(x, u.view()) / step)
}

/// Norm of the coordinate-wise gradient mapping of a separable `g`, each
/// coordinate using its own step `steps[j]`.
pub fn coordinate_mapping_norm<S, G>(
    g: &G,
    x: ArrayView1<S>,
    grad: ArrayView1<S>,
    steps: ArrayView1<S>,
) -> Result<S>
where
    S: NdFloat,
    G: Prox<S>,
{
    let mut sum = S::zero();
    for (j, ((&xj, &dj), &tj)) in x.iter().zip(grad.iter()).zip(steps.iter()).enumerate() {
        let uj = g.prox_coordinate(xj - tj * dj, j, tj)?;
        let mj = (xj - uj) / tj;
        sum += mj * mj;
    }
    Ok(sum.sqrt())
}

/// $`\|x - y\|_2`$
pub(crate) fn distance<S: NdFloat>(x: ArrayView1<S>, y: ArrayView1<S>) -> S {
    Zip::from(&x)
        .and(&y)
        .fold(S::zero(), |acc, &a, &b| acc + (a - b) * (a - b))
        .sqrt()
}

/// Tracks tolerances, the time budget and the optional trace of one solver call.
#[derive(Debug)]
pub struct Monitor<S> {
    tol: S,
    f_tol: S,
    previous_objective: Option<S>,
    trace: Option<Vec<ConvergenceRecord<S>>>,
    start: Instant,
    max_time: Option<Duration>,
}

impl<S: NdFloat> Monitor<S> {
    pub fn new(config: &Config<S>) -> Self {
        Monitor {
            tol: config.tol,
            f_tol: config.f_tol,
            previous_objective: None,
            trace: if config.trace { Some(Vec::new()) } else { None },
            start: Instant::now(),
            max_time: config.max_time,
        }
    }

    /// Record one check and report whether the solver has converged:
    /// the criterion is at most `tol`, or the relative objective change
    /// since the previous check is at most `f_tol` (when `f_tol > 0`).
    pub fn check(&mut self, iteration: usize, objective: S, criterion: S, step_size: S) -> bool {
        debug!(
            "iteration {:>5}: objective {:e}, criterion {:e}, step {:e}",
            iteration, objective, criterion, step_size
        );
        if let Some(trace) = self.trace.as_mut() {
            trace.push(ConvergenceRecord {
                iteration,
                objective,
                criterion,
                step_size,
                elapsed: self.start.elapsed(),
            });
        }

        let stalled = match self.previous_objective {
            Some(previous) if self.f_tol > S::zero() => {
                let scale = previous.abs().max(objective.abs()).max(S::min_positive_value());
                (previous - objective).abs() <= self.f_tol * scale
            }
            _ => false,
        };
        self.previous_objective = Some(objective);
        criterion <= self.tol || stalled
    }

    pub fn deadline_passed(&self) -> bool {
        self.max_time
            .map_or(false, |budget| self.start.elapsed() >= budget)
    }

    pub fn into_trace(self) -> Option<Vec<ConvergenceRecord<S>>> {
        self.trace
    }
}
