use super::{composite_value, drive, ensure_finite, rng_from, IterateState, Method};
use crate::config::{Config, CoordinateOrder};
use crate::convergence::coordinate_mapping_norm;
use crate::error::{Error, Result};
use crate::objective::Objective;
use crate::prox::Prox;
use crate::result::OptimizeResult;
use crate::smooth::Smooth;
use ndarray::prelude::*;
use ndarray::NdFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// Proximal Coordinate Descent for separable $`g`$
///
/// Algorithm
/// ---------
/// For each selected coordinate $`j`$,
/// ```math
/// x_j \leftarrow \mathrm{prox}_{t_j g_j}\left(x_j - t_j \partial_j f(x)\right),
/// \qquad t_j = 1 / L_j
/// ```
/// where $`L_j`$ is the coordinate Lipschitz constant of the smooth term.
/// One iteration is a pass of `n` coordinate updates, visited in
/// `config.coordinate_order`. The coordinate-wise gradient-mapping norm is
/// evaluated once per pass.
///
/// Smooth terms that provide a coordinate cache (the residual of a least
/// squares term, the predictions of a logistic term) are updated in place
/// after each move, so a pass costs about as much as one gradient.
///
/// When the smooth term has no coordinate Lipschitz constants, every
/// coordinate uses `config.initial_step`, or $`1/L`$ from the global
/// constant. A coordinate with $`L_j = 0`$ does not influence $`f`$ and is
/// updated with a unit step. The line-search policy is not used.
///
/// Parameters
/// ----------
/// - __objective:__ smooth term $`f`$ and a separable proximal term $`g`$
/// - __x0:__        initial guess
/// - __config:__    coordinate order, seed, tolerances and limits
/// - __callback:__  User-defined function to be evaluated with two arguments (x,iter).
///                   It is evaluated at (x0,0) and then after each pass.
///                   If it returns True, the function terminates early.
///
/// References
/// ----------
/// [RT14] Richtárik, P., & Takáč, M. (2014). Iteration complexity of
/// randomized block-coordinate descent methods for minimizing a composite
/// function. Mathematical Programming, 144(1), 1-38.
pub fn coordinate_descent<S, F, G>(
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
    if !objective.prox.is_separable() {
        return Err(Error::invalid(
            "coordinate descent needs a separable proximal term",
        ));
    }
    let steps = coordinate_steps(&objective.smooth, x0.len(), config)?;
    let method = CoordinateDescent {
        objective,
        order: config.coordinate_order,
        rng: rng_from(config.seed),
        mean_step: steps.sum() / S::from(steps.len()).unwrap(),
        steps,
    };
    drive(method, x0, config, callback)
}

/// Per-coordinate steps $`1/L_j`$, with the fallbacks described on
/// [`coordinate_descent`].
fn coordinate_steps<S, F>(f: &F, n: usize, config: &Config<S>) -> Result<Array1<S>>
where
    S: NdFloat,
    F: Smooth<S>,
{
    let fallback = config.initial_step.or_else(|| {
        f.lipschitz()
            .filter(|&l| l > S::zero() && l.is_finite())
            .map(|l| S::one() / l)
    });
    (0..n)
        .map(|j| match f.coordinate_lipschitz(j) {
            Some(l) if l > S::zero() && l.is_finite() => Ok(S::one() / l),
            Some(l) if l == S::zero() => Ok(S::one()),
            Some(l) => Err(Error::invalid(format!(
                "coordinate {} has invalid Lipschitz constant {}",
                j, l
            ))),
            None => fallback.ok_or_else(|| {
                Error::invalid(
                    "coordinate descent needs coordinate Lipschitz constants, \
                     a global Lipschitz constant, or `initial_step`",
                )
            }),
        })
        .collect()
}

struct CoordinateDescent<'a, S, F, G> {
    objective: &'a Objective<F, G>,
    order: CoordinateOrder,
    rng: StdRng,
    steps: Array1<S>,
    mean_step: S,
}

impl<'a, S, F, G> CoordinateDescent<'a, S, F, G> {
    fn pass_order(&mut self, n: usize) -> Vec<usize> {
        match self.order {
            CoordinateOrder::Cyclic => (0..n).collect(),
            CoordinateOrder::Random => (0..n).map(|_| self.rng.gen_range(0..n)).collect(),
            CoordinateOrder::Shuffle => {
                let mut order: Vec<usize> = (0..n).collect();
                order.shuffle(&mut self.rng);
                order
            }
        }
    }
}

impl<'a, S, F, G> CoordinateDescent<'a, S, F, G>
where
    S: NdFloat,
    F: Smooth<S>,
    G: Prox<S>,
{
    fn evaluate(&self, state: &mut IterateState<S>, x: Array1<S>) -> Result<()> {
        let (f, g) = (&self.objective.smooth, &self.objective.prox);
        let (fx, grad) = f.value_and_gradient(x.view());
        ensure_finite(x.view(), fx, grad.view(), state.iteration)?;
        let objective = composite_value(g, x.view(), fx, state.iteration)?;
        state.criterion = coordinate_mapping_norm(g, x.view(), grad.view(), self.steps.view())?;
        state.objective = objective;
        state.step = self.mean_step;
        state.x = x;
        Ok(())
    }
}

impl<'a, S, F, G> Method<S> for CoordinateDescent<'a, S, F, G>
where
    S: NdFloat,
    F: Smooth<S>,
    G: Prox<S>,
{
    fn initialize(&mut self, state: &mut IterateState<S>) -> Result<()> {
        let x = state.x.clone();
        self.evaluate(state, x)
    }

    fn iterate(&mut self, state: &mut IterateState<S>) -> Result<()> {
        let order = self.pass_order(state.x.len());
        let (f, g) = (&self.objective.smooth, &self.objective.prox);
        let mut x = state.x.clone();
        let mut cache = f.coordinate_cache(x.view());
        for j in order {
            let t = self.steps[j];
            let d = cache
                .as_ref()
                .and_then(|c| f.cached_partial_derivative(c.view(), j))
                .unwrap_or_else(|| f.partial_derivative(x.view(), j));
            let old = x[j];
            x[j] = g.prox_coordinate(old - t * d, j, t)?;
            if let Some(c) = cache.as_mut() {
                if x[j] != old {
                    f.update_coordinate_cache(c, j, x[j] - old);
                }
            }
        }
        self.evaluate(state, x)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::composite::{accelerated_proximal_gradient, nop};
    use crate::linop::CscMatrix;
    use crate::prox::{BoxConstraint, ElasticNet, Simplex, L1};
    use crate::smooth::{FnSmooth, LeastSquares, Logistic};
    use approx::assert_abs_diff_eq;
    use ndarray_rand::rand::rngs::StdRng;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Normal;
    use ndarray_rand::RandomExt;
    use std::cell::Cell;

    fn problem(seed: u64, n: usize, p: usize) -> LeastSquares<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let A = Array2::random_using((n, p), Normal::new(0., 1.).unwrap(), &mut rng);
        let b = Array1::random_using(n, Normal::new(0., 1.).unwrap(), &mut rng);
        LeastSquares::new(A, b).unwrap()
    }

    #[test]
    fn cyclic_random_and_shuffled_orders_agree() {
        let f = problem(1, 40, 12);
        let objective = Objective::new(&f, L1::new(0.1).unwrap());
        let x0 = Array1::zeros(12);
        let base = Config::<f64>::default()
            .with_max_iter(5000)
            .with_tol(1e-9)
            .with_seed(17);
        let mut solutions = Vec::new();
        for &order in &[
            CoordinateOrder::Cyclic,
            CoordinateOrder::Random,
            CoordinateOrder::Shuffle,
        ] {
            let config = base.clone().with_coordinate_order(order);
            let result = coordinate_descent(&objective, x0.view(), &config, nop).unwrap();
            assert!(result.converged, "{:?}", order);
            solutions.push(result.x);
        }
        assert_abs_diff_eq!(solutions[0], solutions[1], epsilon = 1e-6);
        assert_abs_diff_eq!(solutions[0], solutions[2], epsilon = 1e-6);

        let apg = accelerated_proximal_gradient(&objective, x0.view(), &base, nop).unwrap();
        assert_abs_diff_eq!(solutions[0], apg.x, epsilon = 1e-6);
    }

    #[test]
    fn seeded_random_order_is_reproducible() {
        let f = problem(2, 20, 6);
        let objective = Objective::new(&f, ElasticNet::new(0.05, 0.05).unwrap());
        let config = Config::<f64>::default()
            .with_coordinate_order(CoordinateOrder::Random)
            .with_seed(99)
            .with_max_iter(7)
            .with_tol(0.0);
        let x0 = Array1::zeros(6);
        let first = coordinate_descent(&objective, x0.view(), &config, nop).unwrap();
        let second = coordinate_descent(&objective, x0.view(), &config, nop).unwrap();
        assert_eq!(first.x, second.x);
        assert_eq!(first.iterations, 7);
    }

    #[test]
    fn box_constrained_logistic() {
        let A = array![[1.0, 2.0], [-1.0, 0.5], [0.3, -2.0], [2.0, 1.0]];
        let b = array![1.0, -1.0, -1.0, 1.0];
        let f = Logistic::new(A, b).unwrap();
        let objective = Objective::new(&f, BoxConstraint::new(-1.0, 1.0).unwrap());
        let config = Config::<f64>::default().with_max_iter(10_000).with_tol(1e-8);
        let cd = coordinate_descent(&objective, array![0.0, 0.0].view(), &config, nop).unwrap();
        let apg =
            accelerated_proximal_gradient(&objective, array![0.0, 0.0].view(), &config, nop)
                .unwrap();
        assert!(cd.converged);
        assert!(cd.x.iter().all(|v| v.abs() <= 1.0));
        assert_abs_diff_eq!(cd.x, apg.x, epsilon = 1e-5);
    }

    #[test]
    fn falls_back_to_global_step() {
        // f(x) = ||x - 1||^2 without coordinate constants
        let f = FnSmooth::new(
            |x: ArrayView1<f64>| x.mapv(|v| (v - 1.0).powi(2)).sum(),
            |x: ArrayView1<f64>| x.mapv(|v| 2.0 * (v - 1.0)),
        );
        let objective = Objective::new(f, BoxConstraint::non_negative());
        let x0 = array![5.0, -2.0];
        assert!(matches!(
            coordinate_descent(&objective, x0.view(), &Config::<f64>::default(), nop),
            Err(Error::InvalidArgument(_))
        ));
        let config = Config::<f64>::default().with_initial_step(0.5);
        let result = coordinate_descent(&objective, x0.view(), &config, nop).unwrap();
        assert!(result.converged);
        assert_eq!(result.x, array![1.0, 1.0]);
        assert_eq!(result.iterations, 1);
    }

    /// Forwards to a least squares term and counts full partial derivatives.
    struct CountingPartials<'a> {
        inner: &'a LeastSquares<f64, CscMatrix<f64>>,
        calls: Cell<usize>,
    }

    impl<'a> Smooth<f64> for CountingPartials<'a> {
        fn dim(&self) -> Option<usize> {
            self.inner.dim()
        }
        fn value(&self, x: ArrayView1<f64>) -> f64 {
            self.inner.value(x)
        }
        fn gradient(&self, x: ArrayView1<f64>) -> Array1<f64> {
            self.inner.gradient(x)
        }
        fn partial_derivative(&self, x: ArrayView1<f64>, j: usize) -> f64 {
            self.calls.set(self.calls.get() + 1);
            self.inner.partial_derivative(x, j)
        }
        fn coordinate_cache(&self, x: ArrayView1<f64>) -> Option<Array1<f64>> {
            self.inner.coordinate_cache(x)
        }
        fn cached_partial_derivative(&self, cache: ArrayView1<f64>, j: usize) -> Option<f64> {
            self.inner.cached_partial_derivative(cache, j)
        }
        fn update_coordinate_cache(&self, cache: &mut Array1<f64>, j: usize, delta: f64) {
            self.inner.update_coordinate_cache(cache, j, delta)
        }
        fn coordinate_lipschitz(&self, j: usize) -> Option<f64> {
            self.inner.coordinate_lipschitz(j)
        }
    }

    #[test]
    fn sparse_lasso_uses_cached_residual() {
        let mut rng = StdRng::seed_from_u64(5);
        let dense = Array2::random_using((30, 8), Normal::new(0., 1.).unwrap(), &mut rng)
            .mapv(|v: f64| if v.abs() < 0.8 { 0.0 } else { v });
        let b = Array1::random_using(30, Normal::new(0., 1.).unwrap(), &mut rng);
        let sparse = LeastSquares::new(CscMatrix::from_dense(dense.view()), b.clone()).unwrap();
        let counting = CountingPartials {
            inner: &sparse,
            calls: Cell::new(0),
        };
        let config = Config::<f64>::default().with_max_iter(5000).with_tol(1e-10);
        let x0 = Array1::zeros(8);

        let objective = Objective::new(&counting, L1::new(0.05).unwrap());
        let result = coordinate_descent(&objective, x0.view(), &config, nop).unwrap();
        assert!(result.converged);
        assert_eq!(counting.calls.get(), 0);

        let f = LeastSquares::new(dense, b).unwrap();
        let reference = Objective::new(&f, L1::new(0.05).unwrap());
        let expected = coordinate_descent(&reference, x0.view(), &config, nop).unwrap();
        assert_abs_diff_eq!(result.x, expected.x, epsilon = 1e-8);
    }

    #[test]
    fn rejects_non_separable_regularizer() {
        let f = problem(3, 10, 4);
        let objective = Objective::new(&f, Simplex::probability());
        assert!(matches!(
            coordinate_descent(&objective, Array1::zeros(4).view(), &Config::<f64>::default(), nop),
            Err(Error::InvalidArgument(_))
        ));
    }
}
