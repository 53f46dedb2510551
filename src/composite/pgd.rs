use super::{composite_value, drive, ensure_finite, IterateState, Method};
use crate::config::Config;
use crate::convergence::{distance, gradient_mapping_norm};
use crate::error::Result;
use crate::objective::Objective;
use crate::prox::Prox;
use crate::result::OptimizeResult;
use crate::smooth::Smooth;
use crate::step_size::{initial_step, StepSizeController};
use ndarray::prelude::*;
use ndarray::NdFloat;

/// Proximal Gradient Descent (ISTA)
///
/// Algorithm
/// ---------
/// ```math
/// x_{k+1} = \mathrm{prox}_{t_k g}\left(x_k - t_k \nabla f(x_k)\right)
/// ```
/// with $`t_k`$ chosen by the configured
/// [`StepSizePolicy`](crate::config::StepSizePolicy). With a fixed step
/// $`t \le 1/L`$ or backtracking, the objective sequence is non-increasing.
/// Stops once the gradient-mapping norm $`\|x_k - x_{k+1}\|_2 / t_k`$ drops
/// below `config.tol`.
///
/// Parameters
/// ----------
/// - __objective:__ smooth term $`f`$ and proximal term $`g`$
/// - __x0:__        initial guess
/// - __config:__    step-size policy, tolerances and limits
/// - __callback:__  User-defined function to be evaluated with two arguments (x,iter).
///                   It is evaluated at (x0,0) and then after each iteration.
///                   If it returns True, the function terminates early.
///
/// References
/// ----------
/// [BT09] Beck, A., & Teboulle, M. (2009). A fast iterative
/// shrinkage-thresholding algorithm for linear inverse problems.
/// SIAM journal on imaging sciences, 2(1), 183-202.
pub fn proximal_gradient<S, F, G>(
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
    let step = initial_step(&objective.smooth, x0, config)?;
    let method = ProximalGradient {
        objective,
        controller: StepSizeController::new(
            config.step_size_policy,
            config.line_search.clone(),
            step,
        ),
        fx: S::nan(),
        grad: Array1::zeros(x0.len()),
    };
    drive(method, x0, config, callback)
}

struct ProximalGradient<'a, S, F, G> {
    objective: &'a Objective<F, G>,
    controller: StepSizeController<S>,
    // f and its gradient at the current iterate
    fx: S,
    grad: Array1<S>,
}

impl<'a, S, F, G> Method<S> for ProximalGradient<'a, S, F, G>
where
    S: NdFloat,
    F: Smooth<S>,
    G: Prox<S>,
{
    fn initialize(&mut self, state: &mut IterateState<S>) -> Result<()> {
        let (f, g) = (&self.objective.smooth, &self.objective.prox);
        let (fx, grad) = f.value_and_gradient(state.x.view());
        ensure_finite(state.x.view(), fx, grad.view(), 0)?;
        state.step = self.controller.step();
        state.objective = fx + g.value(state.x.view());
        state.criterion = gradient_mapping_norm(g, state.x.view(), grad.view(), state.step)?;
        self.fx = fx;
        self.grad = grad;
        Ok(())
    }

    fn iterate(&mut self, state: &mut IterateState<S>) -> Result<()> {
        let (f, g) = (&self.objective.smooth, &self.objective.prox);
        let accepted = self.controller.advance(
            f,
            g,
            state.x.view(),
            self.fx,
            self.grad.view(),
        )?;
        let grad = f.gradient(accepted.point.view());
        ensure_finite(
            accepted.point.view(),
            accepted.value,
            grad.view(),
            state.iteration,
        )?;
        let objective = composite_value(g, accepted.point.view(), accepted.value, state.iteration)?;

        let s = &accepted.point - &state.x;
        let y = &grad - &self.grad;
        self.controller.observe(s.view(), y.view());

        state.criterion = distance(state.x.view(), accepted.point.view()) / accepted.step;
        state.step = accepted.step;
        state.objective = objective;
        state.x = accepted.point;
        self.fx = accepted.value;
        self.grad = grad;
        Ok(())
    }
}
