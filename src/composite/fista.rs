#![allow(non_snake_case)]

use super::{composite_value, drive, ensure_finite, IterateState, Method};
use crate::config::{Config, Restart};
use crate::convergence::{distance, gradient_mapping_norm};
use crate::error::Result;
use crate::objective::Objective;
use crate::prox::Prox;
use crate::result::OptimizeResult;
use crate::smooth::Smooth;
use crate::step_size::{initial_step, StepSizeController};
use ndarray::prelude::*;
use ndarray::NdFloat;

/// Fast Iterative Shrinking/Thresholding Algorithm with adaptive restart
///
/// Algorithm
/// ---------
/// ```math
/// \begin{aligned}
/// x_{k+1} &= \mathrm{prox}_{t_k g}\left(y_k - t_k \nabla f(y_k)\right) \\
/// \theta_{k+1} &= \frac{1 + \sqrt{1 + 4\theta_k^2}}{2} \\
/// y_{k+1} &= x_{k+1} + \frac{\theta_k - 1}{\theta_{k+1}} (x_{k+1} - x_k)
/// \end{aligned}
/// ```
/// starting from $`y_0 = x_0`$, $`\theta_0 = 1`$. The step $`t_k`$ comes
/// from the configured policy, with the line search run at $`y_k`$.
///
/// Momentum is reset ($`\theta \leftarrow 1`$, $`y_{k+1} = x_{k+1}`$)
/// according to `config.restart`:
/// - [`Restart::FunctionValue`] when $`F(x_{k+1}) > F(x_k)`$,
/// - [`Restart::Gradient`] when
///   $`\langle y_k - x_{k+1}, x_{k+1} - x_k \rangle > 0`$.
///
/// The criterion is the gradient-mapping norm at the extrapolated point,
/// $`\|y_k - x_{k+1}\|_2 / t_k`$.
///
/// Parameters
/// ----------
/// - __objective:__ smooth term $`f`$ and proximal term $`g`$
/// - __x0:__        initial guess
/// - __config:__    step-size policy, restart rule, tolerances and limits
/// - __callback:__  User-defined function to be evaluated with two arguments (x,iter).
///                   It is evaluated at (x0,0) and then after each iteration.
///                   If it returns True, the function terminates early.
///
/// References
/// ----------
/// [BT09] Beck, A., & Teboulle, M. (2009). A fast iterative
/// shrinkage-thresholding algorithm for linear inverse problems.
/// SIAM journal on imaging sciences, 2(1), 183-202.
///
/// [OC15] O’Donoghue, B., & Candes, E. (2015). Adaptive restart for
/// accelerated gradient schemes. Foundations of computational
/// mathematics, 15(3), 715-732.
pub fn accelerated_proximal_gradient<S, F, G>(
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
    let method = Fista {
        objective,
        controller: StepSizeController::new(
            config.step_size_policy,
            config.line_search.clone(),
            step,
        ),
        restart: config.restart,
        y: x0.to_owned(),
        theta: S::one(),
        previous: None,
    };
    drive(method, x0, config, callback)
}

struct Fista<'a, S, F, G> {
    objective: &'a Objective<F, G>,
    controller: StepSizeController<S>,
    restart: Restart,
    // extrapolated point
    y: Array1<S>,
    theta: S,
    // last extrapolated point and its gradient
    previous: Option<(Array1<S>, Array1<S>)>,
}

impl<'a, S, F, G> Method<S> for Fista<'a, S, F, G>
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
        Ok(())
    }

    fn iterate(&mut self, state: &mut IterateState<S>) -> Result<()> {
        let (f, g) = (&self.objective.smooth, &self.objective.prox);
        let iter = state.iteration;
        let two = S::from(2.).unwrap();
        let four = S::from(4.).unwrap();

        let (fy, grad_y) = f.value_and_gradient(self.y.view());
        ensure_finite(self.y.view(), fy, grad_y.view(), iter)?;
        if let Some((y_old, grad_old)) = &self.previous {
            self.controller
                .observe((&self.y - y_old).view(), (&grad_y - grad_old).view());
        }

        let accepted = self
            .controller
            .advance(f, g, self.y.view(), fy, grad_y.view())?;
        let x = accepted.point;
        ensure_finite(x.view(), accepted.value, grad_y.view(), iter)?;
        let objective = composite_value(g, x.view(), accepted.value, iter)?;

        let restart = match self.restart {
            Restart::None => false,
            Restart::FunctionValue => objective > state.objective,
            Restart::Gradient => (&self.y - &x).dot(&(&x - &state.x)) > S::zero(),
        };
        let y_next = if restart {
            self.theta = S::one();
            x.clone()
        } else {
            let theta_old = self.theta;
            self.theta = (S::one() + (four * theta_old.powi(2) + S::one()).sqrt()) / two;
            let beta = (theta_old - S::one()) / self.theta; // "nesterov" momentum
            &x + &((&x - &state.x) * beta)
        };

        state.criterion = distance(self.y.view(), x.view()) / accepted.step;
        state.step = accepted.step;
        state.objective = objective;
        state.x = x;
        let y_old = std::mem::replace(&mut self.y, y_next);
        self.previous = Some((y_old, grad_y));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::{nop, proximal_gradient};
    use crate::prox::{ElasticNet, L1};
    use crate::smooth::LeastSquares;
    use approx::assert_abs_diff_eq;
    use ndarray_rand::rand::rngs::StdRng;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Normal;
    use ndarray_rand::RandomExt;

    fn lasso_problem(seed: u64) -> LeastSquares<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let A = Array2::random_using((50, 30), Normal::new(0., 1.).unwrap(), &mut rng);
        let b = Array1::random_using(50, Normal::new(0., 1.).unwrap(), &mut rng);
        LeastSquares::new(A, b).unwrap()
    }

    #[test]
    fn matches_proximal_gradient_in_fewer_iterations() {
        let f = lasso_problem(42);
        let objective = Objective::new(&f, L1::new(0.05).unwrap());
        let x0 = Array1::zeros(30);
        let config = Config::<f64>::default().with_max_iter(20_000).with_tol(1e-8);
        let pg = proximal_gradient(&objective, x0.view(), &config, nop).unwrap();
        let apg = accelerated_proximal_gradient(&objective, x0.view(), &config, nop).unwrap();
        assert!(pg.converged && apg.converged);
        assert_abs_diff_eq!(pg.x, apg.x, epsilon = 1e-5);
        assert_abs_diff_eq!(pg.objective, apg.objective, epsilon = 1e-9);
        assert!(
            apg.iterations < pg.iterations,
            "apg {} vs pg {}",
            apg.iterations,
            pg.iterations
        );
    }

    #[test]
    fn restart_rules_reach_same_minimizer() {
        let f = lasso_problem(7);
        let objective = Objective::new(&f, ElasticNet::new(0.05, 0.1).unwrap());
        let x0 = Array1::zeros(30);
        let reference = proximal_gradient(
            &objective,
            x0.view(),
            &Config::<f64>::default().with_max_iter(20_000).with_tol(1e-9),
            nop,
        )
        .unwrap();
        for &restart in &[Restart::None, Restart::FunctionValue, Restart::Gradient] {
            let config = Config::<f64>::default()
                .with_max_iter(20_000)
                .with_tol(1e-9)
                .with_restart(restart);
            let result = accelerated_proximal_gradient(&objective, x0.view(), &config, nop).unwrap();
            assert!(result.converged, "{:?}", restart);
            assert_abs_diff_eq!(result.x, reference.x, epsilon = 1e-6);
        }
    }

    #[test]
    fn function_value_restart_ends_at_best_objective() {
        let f = lasso_problem(3);
        let step = 1.0 / f.lipschitz().unwrap();
        let objective = Objective::new(&f, L1::new(0.05).unwrap());
        let config = Config::<f64>::default()
            .with_fixed_step(step)
            .with_restart(Restart::FunctionValue)
            .with_max_iter(300)
            .with_trace(true);
        let result =
            accelerated_proximal_gradient(&objective, Array1::zeros(30).view(), &config, nop)
                .unwrap();
        let trace = result.trace.unwrap();
        let best = trace
            .iter()
            .map(|r| r.objective)
            .fold(f64::INFINITY, f64::min);
        assert_abs_diff_eq!(best, result.objective, epsilon = 1e-8);
    }
}

#[cfg(all(rustc_nightly, test))]
mod benches {
    use super::*;
    use crate::composite::nop;
    use crate::prox::L1;
    use crate::smooth::LeastSquares;
    use ndarray_rand::rand::rngs::StdRng;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Normal;
    use ndarray_rand::RandomExt;
    use test::Bencher;

    #[bench]
    fn lasso_200x100(bench: &mut Bencher) {
        let mut rng = StdRng::seed_from_u64(0);
        let A = Array2::random_using((200, 100), Normal::new(0., 1.).unwrap(), &mut rng);
        let b = Array1::random_using(200, Normal::new(0., 1.).unwrap(), &mut rng);
        let f = LeastSquares::new(A, b).unwrap();
        let objective = Objective::new(&f, L1::new(0.1).unwrap());
        let x0 = Array1::zeros(100);
        let config = Config::<f64>::default().with_max_iter(100).with_tol(0.0);
        bench.iter(|| accelerated_proximal_gradient(&objective, x0.view(), &config, nop));
    }
}
