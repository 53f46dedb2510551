//! Solver results and termination reasons

use crate::convergence::ConvergenceRecord;
use crate::error::Error;
use ndarray::prelude::*;
use std::fmt;

/// Outcome of one solver call.
///
/// Every termination, including failures detected mid-solve, produces a
/// result so the last iterate is never lost. Callers should inspect
/// [`converged`](OptimizeResult::converged) rather than rely on errors for
/// normal termination.
#[derive(Debug, Clone)]
pub struct OptimizeResult<S> {
    /// Final iterate (the last finite one on divergence).
    pub x: Array1<S>,
    /// Composite objective $`f(x) + g(x)`$ at `x`.
    pub objective: S,
    /// Last convergence criterion, e.g. the gradient-mapping norm.
    pub criterion: S,
    pub converged: bool,
    /// Completed iterations (passes over the data for coordinate and
    /// stochastic methods). A failed iteration is not counted.
    pub iterations: usize,
    pub termination: Termination,
    /// Per-iteration records when tracing was enabled.
    pub trace: Option<Vec<ConvergenceRecord<S>>>,
}

impl<S> OptimizeResult<S> {
    /// The error matching a failed termination, if any.
    pub fn error(&self) -> Option<Error> {
        match self.termination {
            Termination::LineSearchFailed { attempts, step } => {
                Some(Error::LineSearchFailure { attempts, step })
            }
            Termination::NumericalDivergence => Some(Error::NumericalDivergence {
                iteration: self.iterations + 1,
            }),
            _ => None,
        }
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Termination {
    /// Criterion or relative objective change fell below tolerance.
    Converged,
    /// Reached `max_iter`; a normal, non-converged termination.
    MaxIterations,
    /// Backtracking exhausted its attempt budget.
    LineSearchFailed {
        attempts: usize,
        step: f64,
    },
    /// An iterate, gradient or objective value became NaN or infinite.
    NumericalDivergence,
    /// The user callback asked to stop.
    Interrupted,
    /// The configured time budget ran out.
    DeadlineReached,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Converged => write!(f, "converged"),
            Termination::MaxIterations => write!(f, "maximum iterations reached"),
            Termination::LineSearchFailed { attempts, .. } => {
                write!(f, "line search failed after {} attempts", attempts)
            }
            Termination::NumericalDivergence => write!(f, "numerical divergence"),
            Termination::Interrupted => write!(f, "interrupted by callback"),
            Termination::DeadlineReached => write!(f, "time limit reached"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(termination: Termination) -> OptimizeResult<f64> {
        OptimizeResult {
            x: array![1.0],
            objective: 0.5,
            criterion: 1e-3,
            converged: false,
            iterations: 7,
            termination,
            trace: None,
        }
    }

    #[test]
    fn failures_map_to_errors() {
        assert!(matches!(
            result(Termination::LineSearchFailed { attempts: 4, step: 0.125 }).error(),
            Some(Error::LineSearchFailure { attempts: 4, .. })
        ));
        assert!(matches!(
            result(Termination::NumericalDivergence).error(),
            Some(Error::NumericalDivergence { iteration: 8 })
        ));
        assert!(result(Termination::MaxIterations).error().is_none());
        assert!(result(Termination::Interrupted).error().is_none());
    }

    #[test]
    fn termination_messages() {
        assert_eq!(Termination::MaxIterations.to_string(), "maximum iterations reached");
        assert_eq!(
            Termination::LineSearchFailed { attempts: 3, step: 0.1 }.to_string(),
            "line search failed after 3 attempts"
        );
    }
}
