//! Solvers for composite objectives $`\min_x f(x) + g(x)`$
//!
//! Every method is available as a free function taking the
//! [`Objective`], a starting point, a [`Config`] and a user callback
//! `(x, iter) -> bool`. The callback is evaluated at `(x0, 0)` and then after
//! each iteration; if it returns `true` the solver stops with
//! [`Termination::Interrupted`]. [`solve`] dispatches on an [`Algorithm`]
//! without a callback.
//!
//! One iteration is one update of the full iterate for the proximal gradient
//! family, and one pass over all coordinates (coordinate descent) or over
//! all samples (SAGA, SVRG) otherwise.

mod cd;
pub use cd::*;
mod fista;
pub use fista::*;
mod pgd;
pub use pgd::*;
mod saga;
pub use saga::*;
mod svrg;
pub use svrg::*;

use crate::config::Config;
use crate::convergence::{gradient_mapping_norm, Monitor};
use crate::error::{Error, Result};
use crate::objective::Objective;
use crate::prox::Prox;
use crate::result::{OptimizeResult, Termination};
use crate::smooth::Smooth;
use log::warn;
use ndarray::prelude::*;
use ndarray::NdFloat;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Solver family selected by [`solve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// See [`proximal_gradient`]
    ProximalGradient,
    /// See [`accelerated_proximal_gradient`]
    AcceleratedProximalGradient,
    /// See [`coordinate_descent`]
    CoordinateDescent,
    /// See [`saga`]
    Saga,
    /// See [`svrg`]; `epoch_length` inner steps per snapshot (default: one
    /// per sample).
    Svrg { epoch_length: Option<usize> },
}

/// Minimize `objective` from `x0` with the chosen algorithm.
///
/// ```
/// # extern crate intel_mkl_src;
/// use ndarray::prelude::*;
/// use ndarray_copt::prelude::*;
///
/// // 0.5 (x - 3)^2 + |x|
/// let f = LeastSquares::new(array![[1.0]], array![3.0]).unwrap();
/// let objective = Objective::new(f, L1::new(1.0).unwrap());
/// let config = Config::<f64>::default().with_fixed_step(1.0);
/// let result = solve(&objective, array![0.0].view(), Algorithm::ProximalGradient, &config).unwrap();
/// assert!(result.converged);
/// assert_eq!(result.x, array![2.0]);
/// ```
pub fn solve<S, F, G>(
    objective: &Objective<F, G>,
    x0: ArrayView1<S>,
    algorithm: Algorithm,
    config: &Config<S>,
) -> Result<OptimizeResult<S>>
where
    S: NdFloat,
    F: Smooth<S>,
    G: Prox<S>,
{
    match algorithm {
        Algorithm::ProximalGradient => proximal_gradient(objective, x0, config, nop),
        Algorithm::AcceleratedProximalGradient => {
            accelerated_proximal_gradient(objective, x0, config, nop)
        }
        Algorithm::CoordinateDescent => coordinate_descent(objective, x0, config, nop),
        Algorithm::Saga => saga(objective, x0, config, nop),
        Algorithm::Svrg { epoch_length } => svrg(objective, x0, epoch_length, config, nop),
    }
}

/// Callback that never stops the solver
pub fn nop<S>(_x: ArrayView1<S>, _iter: usize) -> bool {
    false
}

/// Mutable state shared by every solver loop, owned by one call.
#[derive(Debug, Clone)]
pub struct IterateState<S> {
    pub x: Array1<S>,
    /// Composite objective at `x`
    pub objective: S,
    /// Convergence criterion from the latest check
    pub criterion: S,
    /// Step size used by the latest update
    pub step: S,
    /// Index of the iteration in progress (0 during initialization)
    pub iteration: usize,
}

impl<S: NdFloat> IterateState<S> {
    fn new(x0: ArrayView1<S>) -> Self {
        IterateState {
            x: x0.to_owned(),
            objective: S::nan(),
            criterion: S::infinity(),
            step: S::zero(),
            iteration: 0,
        }
    }
}

/// One algorithm family plugged into [`drive`].
///
/// Implementations must only write a new `x` into the state once it has
/// been checked to be finite, so a failed iteration leaves the last good
/// iterate in place.
pub(crate) trait Method<S: NdFloat> {
    /// Fill in objective, criterion and step at the starting point.
    fn initialize(&mut self, state: &mut IterateState<S>) -> Result<()>;

    /// Perform iteration `state.iteration` and refresh objective, criterion
    /// and step.
    fn iterate(&mut self, state: &mut IterateState<S>) -> Result<()>;
}

/// Shared loop: initialization, deadline, convergence checks, callback and
/// the mapping of mid-solve failures onto the result.
pub(crate) fn drive<S, M>(
    mut method: M,
    x0: ArrayView1<S>,
    config: &Config<S>,
    mut callback: impl FnMut(ArrayView1<S>, usize) -> bool,
) -> Result<OptimizeResult<S>>
where
    S: NdFloat,
    M: Method<S>,
{
    let mut monitor = Monitor::new(config);
    let mut state = IterateState::new(x0);
    let termination = run(
        &mut method,
        &mut state,
        &mut monitor,
        config.max_iter,
        &mut callback,
    )?;

    let iterations = match termination {
        Termination::LineSearchFailed { .. } | Termination::NumericalDivergence => {
            state.iteration.saturating_sub(1)
        }
        _ => state.iteration,
    };
    Ok(OptimizeResult {
        x: state.x,
        objective: state.objective,
        criterion: state.criterion,
        converged: termination == Termination::Converged,
        iterations,
        termination,
        trace: monitor.into_trace(),
    })
}

fn run<S, M>(
    method: &mut M,
    state: &mut IterateState<S>,
    monitor: &mut Monitor<S>,
    max_iter: usize,
    callback: &mut impl FnMut(ArrayView1<S>, usize) -> bool,
) -> Result<Termination>
where
    S: NdFloat,
    M: Method<S>,
{
    if let Some(termination) = failure(method.initialize(state), 0)? {
        return Ok(termination);
    }
    if monitor.check(0, state.objective, state.criterion, state.step) {
        return Ok(Termination::Converged);
    }
    if callback(state.x.view(), 0) {
        return Ok(Termination::Interrupted);
    }
    for iter in 1..=max_iter {
        if monitor.deadline_passed() {
            return Ok(Termination::DeadlineReached);
        }
        state.iteration = iter;
        if let Some(termination) = failure(method.iterate(state), iter)? {
            return Ok(termination);
        }
        if monitor.check(iter, state.objective, state.criterion, state.step) {
            return Ok(Termination::Converged);
        }
        if callback(state.x.view(), iter) {
            return Ok(Termination::Interrupted);
        }
    }
    Ok(Termination::MaxIterations)
}

/// Turn the terminal mid-solve errors into a termination reason and pass
/// every other error through.
fn failure(outcome: Result<()>, iteration: usize) -> Result<Option<Termination>> {
    match outcome {
        Ok(()) => Ok(None),
        Err(Error::LineSearchFailure { attempts, step }) => {
            warn!(
                "line search failed at iteration {} after {} attempts (last step {:e})",
                iteration, attempts, step
            );
            Ok(Some(Termination::LineSearchFailed { attempts, step }))
        }
        Err(Error::NumericalDivergence { iteration }) => {
            warn!("non-finite iterate or gradient at iteration {}", iteration);
            Ok(Some(Termination::NumericalDivergence))
        }
        Err(e) => Err(e),
    }
}

/// Fail with [`Error::NumericalDivergence`] unless the point, its smooth
/// value and gradient are finite.
pub(crate) fn ensure_finite<S: NdFloat>(
    x: ArrayView1<S>,
    value: S,
    grad: ArrayView1<S>,
    iteration: usize,
) -> Result<()> {
    let finite = value.is_finite()
        && x.iter().all(|v| v.is_finite())
        && grad.iter().all(|v| v.is_finite());
    if finite {
        Ok(())
    } else {
        Err(Error::NumericalDivergence { iteration })
    }
}

/// Composite objective at a point whose smooth value is already known.
/// NaN (e.g. a failed SVD inside the proximal term) counts as divergence.
pub(crate) fn composite_value<S, G>(g: &G, x: ArrayView1<S>, fx: S, iteration: usize) -> Result<S>
where
    S: NdFloat,
    G: Prox<S>,
{
    let value = fx + g.value(x);
    if value.is_nan() {
        Err(Error::NumericalDivergence { iteration })
    } else {
        Ok(value)
    }
}

/// Move to `x` after a full-batch evaluation, with the gradient-mapping norm
/// at `step` as criterion. Returns $`\nabla f(x)`$.
pub(crate) fn commit_full_batch<S, F, G>(
    objective: &Objective<F, G>,
    state: &mut IterateState<S>,
    x: Array1<S>,
    step: S,
) -> Result<Array1<S>>
where
    S: NdFloat,
    F: Smooth<S>,
    G: Prox<S>,
{
    let (f, g) = (&objective.smooth, &objective.prox);
    let (fx, grad) = f.value_and_gradient(x.view());
    ensure_finite(x.view(), fx, grad.view(), state.iteration)?;
    let objective = composite_value(g, x.view(), fx, state.iteration)?;
    state.criterion = gradient_mapping_norm(g, x.view(), grad.view(), step)?;
    state.objective = objective;
    state.step = step;
    state.x = x;
    Ok(grad)
}

pub(crate) fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
