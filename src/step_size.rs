//! Step-size selection and backtracking line search
//!
//! For a composite objective the usual Armijo test along a direction is
//! replaced by a test on the proximal step itself: with
//! $`u = \mathrm{prox}_{t g}(x - t\nabla f(x))`$, a step $`t`$ is accepted when
//! ```math
//! f(u) \leq f(x) + \langle \nabla f(x), u - x \rangle + \frac{1}{2t}\|u - x\|_2^2
//! ```
//! which holds for every $`t \le 1/L`$ and guarantees
//! $`f(u) + g(u) \le f(x) + g(x)`$.

use crate::config::{Config, StepSizePolicy};
use crate::error::{Error, Result};
use crate::linop::power_iteration_start;
use crate::prox::Prox;
use crate::smooth::Smooth;
use log::trace;
use ndarray::prelude::*;
use ndarray::NdFloat;

/// Parameters of the backtracking line search.
#[derive(Debug, Clone)]
pub struct LineSearch<S> {
    /// Factor in (0, 1) applied to a rejected step (default: 0.5).
    pub shrink: S,
    /// Trial steps evaluated before declaring failure (default: 40).
    pub max_attempts: usize,
}

impl Default for LineSearch<f64> {
    fn default() -> Self {
        LineSearch {
            shrink: 0.5,
            max_attempts: 40,
        }
    }
}

impl Default for LineSearch<f32> {
    fn default() -> Self {
        LineSearch {
            shrink: 0.5,
            max_attempts: 40,
        }
    }
}

/// A proximal step that passed the line search (or a fixed step).
#[derive(Debug, Clone)]
pub struct Accepted<S> {
    /// $`u = \mathrm{prox}_{t g}(x - t\nabla f(x))`$
    pub point: Array1<S>,
    /// $`f(u)`$
    pub value: S,
    /// Accepted step $`t`$
    pub step: S,
    /// Trial steps evaluated
    pub attempts: usize,
}

/// One forward-backward step $`\mathrm{prox}_{t g}(x - t\nabla f(x))`$.
pub fn forward_backward<S, G>(
    g: &G,
    x: ArrayView1<S>,
    grad: ArrayView1<S>,
    step: S,
) -> Result<Array1<S>>
where
    S: NdFloat,
    G: Prox<S>,
{
    let mut z = x.to_owned();
    z.scaled_add(-step, &grad);
    g.prox(z.view(), step)
}

impl<S: NdFloat> LineSearch<S> {
    pub fn validate(&self) -> Result<()> {
        if !(self.shrink > S::zero() && self.shrink < S::one()) {
            return Err(Error::invalid(format!(
                "line search shrink factor must lie in (0, 1), got {}",
                self.shrink
            )));
        }
        if self.max_attempts == 0 {
            return Err(Error::invalid("line search needs at least one attempt"));
        }
        Ok(())
    }

    /// Backtrack from the trial step `step` at the point `x` where
    /// $`f(x) =`$ `fx` and $`\nabla f(x) =`$ `grad`.
    ///
    /// Fails with [`Error::LineSearchFailure`] once `max_attempts` trial
    /// steps have been rejected.
    pub fn search<F, G>(
        &self,
        f: &F,
        g: &G,
        x: ArrayView1<S>,
        fx: S,
        grad: ArrayView1<S>,
        step: S,
    ) -> Result<Accepted<S>>
    where
        F: Smooth<S>,
        G: Prox<S>,
    {
        let two = S::from(2.).unwrap();
        // rounding slack
        let slack = S::epsilon() * S::one().max(fx.abs());
        let mut step = step;
        for attempt in 1..=self.max_attempts {
            let point = forward_backward(g, x, grad, step)?;
            let value = f.value(point.view());
            let d = &point - &x;
            let bound = fx + grad.dot(&d) + d.dot(&d) / (two * step);
            trace!(
                "line search attempt {}: step {:e}, f(u) {:e}, bound {:e}",
                attempt,
                step,
                value,
                bound
            );
            if value <= bound + slack {
                return Ok(Accepted {
                    point,
                    value,
                    step,
                    attempts: attempt,
                });
            }
            if attempt < self.max_attempts {
                step = step * self.shrink;
            }
        }
        Err(Error::LineSearchFailure {
            attempts: self.max_attempts,
            step: step.to_f64().unwrap_or(f64::NAN),
        })
    }
}

/// Barzilai-Borwein step $`\langle s, s \rangle / \langle s, y \rangle`$ from an
/// iterate difference `s` and gradient difference `y`, when it is positive
/// and finite.
pub fn barzilai_borwein<S: NdFloat>(s: ArrayView1<S>, y: ArrayView1<S>) -> Option<S> {
    let sy = s.dot(&y);
    let ss = s.dot(&s);
    let step = ss / sy;
    if sy > S::zero() && step > S::zero() && step.is_finite() {
        Some(step)
    } else {
        None
    }
}

/// Estimate the Lipschitz constant of $`\nabla f`$ near `x` by power
/// iteration on Hessian-vector products, started from a fixed pseudo-random
/// direction.
pub fn estimate_lipschitz<S, F>(f: &F, x: ArrayView1<S>, maxiter: usize) -> Option<S>
where
    S: NdFloat,
    F: Smooth<S>,
{
    let n = x.len();
    if n == 0 {
        return None;
    }
    let mut v = power_iteration_start::<S>(n);
    let mut estimate = S::zero();
    for _ in 0..maxiter {
        let w = f.hessian_vector_product(x, v.view())?;
        let norm = w.dot(&w).sqrt();
        if !(norm > S::zero() && norm.is_finite()) {
            break;
        }
        let previous = estimate;
        estimate = norm;
        v = w / norm;
        if (estimate - previous).abs() <= S::from(1e-6).unwrap() * estimate {
            break;
        }
    }
    if estimate > S::zero() {
        Some(estimate)
    } else {
        None
    }
}

/// Starting step for the full-gradient methods.
///
/// Uses `config.initial_step` when set, then $`1/L`$ from the declared
/// Lipschitz constant. Backtracking policies may also start from a
/// Hessian-vector estimate of $`L`$, or from 1 as a last resort; a fixed
/// step without either piece of information is an error.
pub fn initial_step<S, F>(f: &F, x0: ArrayView1<S>, config: &Config<S>) -> Result<S>
where
    S: NdFloat,
    F: Smooth<S>,
{
    if let Some(step) = config.initial_step {
        return Ok(step);
    }
    if let Some(lipschitz) = f.lipschitz().filter(|&l| l > S::zero() && l.is_finite()) {
        return Ok(S::one() / lipschitz);
    }
    match config.step_size_policy {
        StepSizePolicy::Fixed => Err(Error::invalid(
            "a fixed step needs `initial_step` or a smooth term with a known Lipschitz constant",
        )),
        _ => Ok(estimate_lipschitz(f, x0, 50).map_or(S::one(), |l| S::one() / l)),
    }
}

/// Per-iteration step-size state for the full-gradient methods.
#[derive(Debug, Clone)]
pub struct StepSizeController<S> {
    policy: StepSizePolicy,
    line_search: LineSearch<S>,
    step: S,
}

impl<S: NdFloat> StepSizeController<S> {
    pub fn new(policy: StepSizePolicy, line_search: LineSearch<S>, step: S) -> Self {
        StepSizeController {
            policy,
            line_search,
            step,
        }
    }

    /// Current (last accepted or next trial) step.
    pub fn step(&self) -> S {
        self.step
    }

    /// Take one proximal gradient step from `x` under the configured policy.
    pub fn advance<F, G>(
        &mut self,
        f: &F,
        g: &G,
        x: ArrayView1<S>,
        fx: S,
        grad: ArrayView1<S>,
    ) -> Result<Accepted<S>>
    where
        F: Smooth<S>,
        G: Prox<S>,
    {
        match self.policy {
            StepSizePolicy::Fixed => {
                let point = forward_backward(g, x, grad, self.step)?;
                let value = f.value(point.view());
                Ok(Accepted {
                    point,
                    value,
                    step: self.step,
                    attempts: 1,
                })
            }
            StepSizePolicy::Backtracking | StepSizePolicy::BarzilaiBorwein => {
                let accepted = self.line_search.search(f, g, x, fx, grad, self.step)?;
                self.step = accepted.step;
                Ok(accepted)
            }
        }
    }

    /// Feed the latest iterate and gradient differences; only the
    /// Barzilai-Borwein policy reseeds its trial step from them.
    pub fn observe(&mut self, s: ArrayView1<S>, y: ArrayView1<S>) {
        if self.policy == StepSizePolicy::BarzilaiBorwein {
            if let Some(step) = barzilai_borwein(s, y) {
                self.step = step;
            }
        }
    }
}
