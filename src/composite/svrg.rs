use super::saga::{finite_sum_size, sample_gradient, stochastic_step};
use super::{commit_full_batch, drive, rng_from, IterateState, Method};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::objective::Objective;
use crate::prox::Prox;
use crate::result::OptimizeResult;
use crate::smooth::Smooth;
use ndarray::prelude::*;
use ndarray::NdFloat;
use rand::rngs::StdRng;
use rand::Rng;

/// Proximal SVRG: stochastic gradient with periodic full-gradient snapshots
///
/// Algorithm
/// ---------
/// Each iteration takes a snapshot $`\tilde x = x`$ with full gradient
/// $`\mu = \nabla f(\tilde x)`$, then runs `epoch_length` inner steps
/// ```math
/// \begin{aligned}
/// v &= \nabla f_i(x) - \nabla f_i(\tilde x) + \mu \\
/// x &\leftarrow \mathrm{prox}_{t g}(x - t v)
/// \end{aligned}
/// ```
/// with $`i`$ drawn uniformly. `epoch_length` defaults to the number of
/// samples, so that one iteration is one pass. The criterion is the
/// full-batch gradient-mapping norm after each epoch. The step follows the
/// same rule as [`saga`](super::saga).
///
/// Parameters
/// ----------
/// - __objective:__    finite-sum smooth term $`f`$ and proximal term $`g`$
/// - __x0:__           initial guess
/// - __epoch_length:__ inner steps per snapshot
/// - __config:__       step, seed, tolerances and limits
/// - __callback:__     User-defined function to be evaluated with two arguments (x,iter).
///                      It is evaluated at (x0,0) and then after each epoch.
///                      If it returns True, the function terminates early.
///
/// References
/// ----------
/// [XZ14] Xiao, L., & Zhang, T. (2014). A proximal stochastic gradient
/// method with progressive variance reduction. SIAM Journal on
/// Optimization, 24(4), 2057-2075.
pub fn svrg<S, F, G>(
    objective: &Objective<F, G>,
    x0: ArrayView1<S>,
    epoch_length: Option<usize>,
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
    let n = finite_sum_size(&objective.smooth, x0, "SVRG")?;
    let epoch_length = epoch_length.unwrap_or(n);
    if epoch_length == 0 {
        return Err(Error::invalid("SVRG epoch length must be positive"));
    }
    let step = stochastic_step(&objective.smooth, config)?;
    let method = Svrg {
        objective,
        n_samples: n,
        epoch_length,
        rng: rng_from(config.seed),
        step,
        full_gradient: Array1::zeros(x0.len()),
    };
    drive(method, x0, config, callback)
}

struct Svrg<'a, S, F, G> {
    objective: &'a Objective<F, G>,
    n_samples: usize,
    epoch_length: usize,
    rng: StdRng,
    step: S,
    // gradient at the current iterate, which is the next snapshot
    full_gradient: Array1<S>,
}

impl<'a, S, F, G> Method<S> for Svrg<'a, S, F, G>
where
    S: NdFloat,
    F: Smooth<S>,
    G: Prox<S>,
{
    fn initialize(&mut self, state: &mut IterateState<S>) -> Result<()> {
        let x = state.x.clone();
        self.full_gradient = commit_full_batch(self.objective, state, x, self.step)?;
        Ok(())
    }

    fn iterate(&mut self, state: &mut IterateState<S>) -> Result<()> {
        let (f, g) = (&self.objective.smooth, &self.objective.prox);
        let snapshot = state.x.view();
        let mut x = state.x.clone();
        for _ in 0..self.epoch_length {
            let i = self.rng.gen_range(0..self.n_samples);
            let v = sample_gradient(f, x.view(), i, "SVRG")?
                - sample_gradient(f, snapshot, i, "SVRG")?
                + &self.full_gradient;
            x.scaled_add(-self.step, &v);
            x = g.prox(x.view(), self.step)?;
        }
        self.full_gradient = commit_full_batch(self.objective, state, x, self.step)?;
        Ok(())
    }
}
