//! Solver configuration

use crate::error::{Error, Result};
use crate::step_size::LineSearch;
use ndarray::NdFloat;
use std::time::Duration;

/// How the step size is chosen each iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSizePolicy {
    /// A constant step, valid when it does not exceed $`1/L`$.
    Fixed,
    /// Shrink a trial step until the composite sufficient-decrease
    /// condition holds; the accepted step seeds the next trial.
    Backtracking,
    /// Backtracking whose trial step is the Barzilai-Borwein ratio
    /// $`\langle s, s \rangle / \langle s, y \rangle`$ of consecutive
    /// iterate and gradient differences.
    BarzilaiBorwein,
}

/// Order in which coordinate descent visits coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateOrder {
    /// `0, 1, ..., n-1` on every pass
    Cyclic,
    /// `n` independent uniform draws per pass
    Random,
    /// A fresh random permutation on every pass
    Shuffle,
}

/// Momentum restart rule for the accelerated method, see
/// [\[OC15\]](../composite/fn.accelerated_proximal_gradient.html#references)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restart {
    /// Plain FISTA momentum
    None,
    /// Reset momentum whenever the composite objective increases.
    FunctionValue,
    /// Reset momentum whenever the momentum direction makes an obtuse
    /// angle with the gradient mapping.
    Gradient,
}

/// Configuration shared by all solvers.
///
/// Iteration limits count full passes for coordinate descent and for the
/// stochastic methods.
#[derive(Debug, Clone)]
pub struct Config<S> {
    pub step_size_policy: StepSizePolicy,
    /// Starting (or, for [`StepSizePolicy::Fixed`], constant) step. When
    /// `None`, the step is derived from the smooth term's Lipschitz
    /// information.
    pub initial_step: Option<S>,
    /// Maximum number of iterations (default: 500).
    pub max_iter: usize,
    /// Criterion tolerance (default: 1e-6, 1e-4 for `f32`).
    pub tol: S,
    /// Relative objective change tolerance between consecutive checks
    /// (default: 0, disabled).
    pub f_tol: S,
    /// Record a [`ConvergenceRecord`](crate::convergence::ConvergenceRecord)
    /// per iteration.
    pub trace: bool,
    pub coordinate_order: CoordinateOrder,
    pub line_search: LineSearch<S>,
    pub restart: Restart,
    /// Seed for coordinate and sample selection; `None` draws from entropy.
    pub seed: Option<u64>,
    /// Wall-clock budget checked before every iteration.
    pub max_time: Option<Duration>,
}

impl Default for Config<f64> {
    fn default() -> Self {
        Config {
            step_size_policy: StepSizePolicy::Backtracking,
            initial_step: None,
            max_iter: 500,
            tol: 1e-6,
            f_tol: 0.0,
            trace: false,
            coordinate_order: CoordinateOrder::Cyclic,
            line_search: LineSearch::default(),
            restart: Restart::FunctionValue,
            seed: None,
            max_time: None,
        }
    }
}

impl Default for Config<f32> {
    fn default() -> Self {
        Config {
            step_size_policy: StepSizePolicy::Backtracking,
            initial_step: None,
            max_iter: 500,
            tol: 1e-4,
            f_tol: 0.0,
            trace: false,
            coordinate_order: CoordinateOrder::Cyclic,
            line_search: LineSearch::default(),
            restart: Restart::FunctionValue,
            seed: None,
            max_time: None,
        }
    }
}

impl<S: NdFloat> Config<S> {
    #[must_use]
    pub fn with_step_size_policy(mut self, policy: StepSizePolicy) -> Self {
        self.step_size_policy = policy;
        self
    }

    /// Use a constant step, shorthand for [`StepSizePolicy::Fixed`] plus
    /// [`with_initial_step`](Config::with_initial_step).
    #[must_use]
    pub fn with_fixed_step(mut self, step: S) -> Self {
        self.step_size_policy = StepSizePolicy::Fixed;
        self.initial_step = Some(step);
        self
    }

    #[must_use]
    pub fn with_initial_step(mut self, step: S) -> Self {
        self.initial_step = Some(step);
        self
    }

    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    #[must_use]
    pub fn with_tol(mut self, tol: S) -> Self {
        self.tol = tol;
        self
    }

    #[must_use]
    pub fn with_f_tol(mut self, f_tol: S) -> Self {
        self.f_tol = f_tol;
        self
    }

    #[must_use]
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    #[must_use]
    pub fn with_coordinate_order(mut self, order: CoordinateOrder) -> Self {
        self.coordinate_order = order;
        self
    }

    #[must_use]
    pub fn with_line_search(mut self, line_search: LineSearch<S>) -> Self {
        self.line_search = line_search;
        self
    }

    #[must_use]
    pub fn with_restart(mut self, restart: Restart) -> Self {
        self.restart = restart;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// Check parameter ranges; called by every solver before iterating.
    pub fn validate(&self) -> Result<()> {
        if !(self.tol >= S::zero() && self.tol.is_finite()) {
            return Err(Error::invalid(format!(
                "tolerance must be non-negative, got {}",
                self.tol
            )));
        }
        if !(self.f_tol >= S::zero() && self.f_tol.is_finite()) {
            return Err(Error::invalid(format!(
                "objective tolerance must be non-negative, got {}",
                self.f_tol
            )));
        }
        if let Some(step) = self.initial_step {
            if !(step > S::zero() && step.is_finite()) {
                return Err(Error::invalid(format!(
                    "initial step must be positive and finite, got {}",
                    step
                )));
            }
        }
        self.line_search.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::<f64>::default().validate().is_ok());
        assert!(Config::<f32>::default().validate().is_ok());
        let config = Config::<f64>::default();
        assert_eq!(config.step_size_policy, StepSizePolicy::Backtracking);
        assert_eq!(config.coordinate_order, CoordinateOrder::Cyclic);
        assert_eq!(config.tol, 1e-6);
    }

    #[test]
    fn builder_sets_fields() {
        let config = Config::<f64>::default()
            .with_fixed_step(0.25)
            .with_max_iter(10)
            .with_trace(true)
            .with_seed(7)
            .with_restart(Restart::Gradient);
        assert_eq!(config.step_size_policy, StepSizePolicy::Fixed);
        assert_eq!(config.initial_step, Some(0.25));
        assert_eq!(config.max_iter, 10);
        assert!(config.trace);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.restart, Restart::Gradient);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(Config::<f64>::default().with_tol(-1.0).validate().is_err());
        assert!(Config::<f64>::default().with_f_tol(f64::NAN).validate().is_err());
        assert!(Config::<f64>::default().with_fixed_step(0.0).validate().is_err());
        assert!(Config::<f64>::default()
            .with_line_search(LineSearch {
                shrink: 1.5,
                max_attempts: 10
            })
            .validate()
            .is_err());
    }
}
