#![allow(non_snake_case)]

use super::{commit_full_batch, drive, rng_from, IterateState, Method};
use crate::config::{Config, StepSizePolicy};
use crate::error::{Error, Result};
use crate::objective::Objective;
use crate::prox::Prox;
use crate::result::OptimizeResult;
use crate::smooth::Smooth;
use log::debug;
use ndarray::prelude::*;
use ndarray::NdFloat;
use rand::rngs::StdRng;
use rand::Rng;

/// Per-sample gradient memory of SAGA
///
/// Row `i` of the table holds the last gradient of $`f_i`$ that was seen,
/// and `average` is kept equal to the mean of the rows. All rows start at
/// zero. For any table state, drawing `i` uniformly,
/// ```math
/// v = \nabla f_i(x) - \phi_i + \frac1n \sum_j \phi_j
/// ```
/// is an unbiased estimate of $`\nabla f(x)`$.
#[derive(Debug, Clone)]
pub struct SagaMemory<S> {
    table: Array2<S>,
    average: Array1<S>,
}

impl<S: NdFloat> SagaMemory<S> {
    pub fn new(n_samples: usize, dim: usize) -> Self {
        SagaMemory {
            table: Array2::zeros((n_samples, dim)),
            average: Array1::zeros(dim),
        }
    }

    pub fn n_samples(&self) -> usize {
        self.table.nrows()
    }

    /// Stored gradient of sample `i`
    pub fn entry(&self, i: usize) -> ArrayView1<S> {
        self.table.row(i)
    }

    /// Running mean of the stored gradients
    pub fn average(&self) -> ArrayView1<S> {
        self.average.view()
    }

    /// Mean of the stored gradients, recomputed from the table
    pub fn table_mean(&self) -> Array1<S> {
        match self.n_samples() {
            0 => Array1::zeros(self.average.len()),
            n => self.table.sum_axis(Axis(0)) / S::from(n).unwrap(),
        }
    }

    /// Variance-reduced estimate from the fresh gradient of sample `i`
    pub fn estimate(&self, i: usize, fresh: ArrayView1<S>) -> Array1<S> {
        &fresh - &self.table.row(i) + &self.average
    }

    /// Replace the stored gradient of sample `i` and update the average.
    pub fn update(&mut self, i: usize, fresh: ArrayView1<S>) {
        let n = S::from(self.n_samples()).unwrap();
        let delta = &fresh - &self.table.row(i);
        self.average.scaled_add(S::one() / n, &delta);
        self.table.row_mut(i).assign(&fresh);
    }
}

/// SAGA: proximal stochastic gradient with per-sample gradient memory
///
/// Algorithm
/// ---------
/// For $`f = \frac1n \sum_i f_i`$, each inner step draws $`i`$ uniformly and
/// ```math
/// \begin{aligned}
/// v &= \nabla f_i(x) - \phi_i + \frac1n \sum_j \phi_j, \qquad \phi_i \leftarrow \nabla f_i(x) \\
/// x &\leftarrow \mathrm{prox}_{t g}(x - t v)
/// \end{aligned}
/// ```
/// One iteration is an epoch of `n` inner steps, followed by a full-batch
/// gradient-mapping norm as criterion. The step is `config.initial_step`,
/// or $`1/(3 L_{\max})`$ from the largest per-sample Lipschitz constant; the
/// line-search policy is not used.
///
/// Parameters
/// ----------
/// - __objective:__ finite-sum smooth term $`f`$ and proximal term $`g`$
/// - __x0:__        initial guess
/// - __config:__    step, seed, tolerances and limits
/// - __callback:__  User-defined function to be evaluated with two arguments (x,iter).
///                   It is evaluated at (x0,0) and then after each epoch.
///                   If it returns True, the function terminates early.
///
/// References
/// ----------
/// [DBL14] Defazio, A., Bach, F., & Lacoste-Julien, S. (2014). SAGA: A fast
/// incremental gradient method with support for non-strongly convex
/// composite objectives. Advances in neural information processing
/// systems, 27.
pub fn saga<S, F, G>(
    objective: &Objective<F, G>,
    x0: ArrayView1<S>,
    config: &Config<S>,
    callback: impl FnMut(ArrayView1<S>, usize) -> bool,
) -> Result<OptimizeResult<S>>
where
    S: NdFloat,
    F: Smooth<S>,
    G: Prox<S>,
{
    config.validate()?;
    objective.validate(x0)?;
    let n = finite_sum_size(&objective.smooth, x0, "SAGA")?;
    let step = stochastic_step(&objective.smooth, config)?;
    let method = Saga {
        objective,
        memory: SagaMemory::new(n, x0.len()),
        rng: rng_from(config.seed),
        step,
    };
    drive(method, x0, config, callback)
}

/// Number of terms of a finite-sum smooth term, required by the stochastic
/// methods together with per-sample gradients.
pub(super) fn finite_sum_size<S, F>(f: &F, x0: ArrayView1<S>, method: &str) -> Result<usize>
where
    S: NdFloat,
    F: Smooth<S>,
{
    match f.n_samples() {
        Some(n) if n > 0 => {
            sample_gradient(f, x0, 0, method)?;
            Ok(n)
        }
        _ => Err(Error::invalid(format!(
            "{} needs a finite-sum smooth term with at least one sample",
            method
        ))),
    }
}

/// $`\nabla f_i(x)`$, or `InvalidArgument` when the term does not provide it.
pub(super) fn sample_gradient<S, F>(
    f: &F,
    x: ArrayView1<S>,
    i: usize,
    method: &str,
) -> Result<Array1<S>>
where
    S: NdFloat,
    F: Smooth<S>,
{
    f.sample_gradient(x, i).ok_or_else(|| {
        Error::invalid(format!(
            "{} needs per-sample gradients from the smooth term",
            method
        ))
    })
}

/// Constant step of the stochastic methods.
pub(super) fn stochastic_step<S, F>(f: &F, config: &Config<S>) -> Result<S>
where
    S: NdFloat,
    F: Smooth<S>,
{
    if config.step_size_policy != StepSizePolicy::Fixed {
        debug!(
            "stochastic solvers use a constant step, ignoring {:?}",
            config.step_size_policy
        );
    }
    if let Some(step) = config.initial_step {
        return Ok(step);
    }
    match f.sample_lipschitz() {
        Some(l) if l > S::zero() && l.is_finite() => Ok(S::one() / (S::from(3.).unwrap() * l)),
        _ => Err(Error::invalid(
            "stochastic solvers need `initial_step` or per-sample Lipschitz constants",
        )),
    }
}

struct Saga<'a, S, F, G> {
    objective: &'a Objective<F, G>,
    memory: SagaMemory<S>,
    rng: StdRng,
    step: S,
}

impl<'a, S, F, G> Method<S> for Saga<'a, S, F, G>
where
    S: NdFloat,
    F: Smooth<S>,
    G: Prox<S>,
{
    fn initialize(&mut self, state: &mut IterateState<S>) -> Result<()> {
        let x = state.x.clone();
        commit_full_batch(self.objective, state, x, self.step)?;
        Ok(())
    }

    fn iterate(&mut self, state: &mut IterateState<S>) -> Result<()> {
        let (f, g) = (&self.objective.smooth, &self.objective.prox);
        let n = self.memory.n_samples();
        let mut x = state.x.clone();
        for _ in 0..n {
            let i = self.rng.gen_range(0..n);
            let fresh = sample_gradient(f, x.view(), i, "SAGA")?;
            let v = self.memory.estimate(i, fresh.view());
            self.memory.update(i, fresh.view());
            x.scaled_add(-self.step, &v);
            x = g.prox(x.view(), self.step)?;
        }
        commit_full_batch(self.objective, state, x, self.step)?;
        Ok(())
    }
}
