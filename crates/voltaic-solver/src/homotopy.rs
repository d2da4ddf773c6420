//! Parameter-space continuation around an inner solver.

use nalgebra::DVector;

use crate::error::Result;
use crate::NonlinearSolver;

/// Default cap on inner solve attempts per continuation.
pub const DEFAULT_MAX_STEPS: usize = 2000;

/// Retries failed solves by walking the parameters along a straight line.
///
/// When the inner solver fails at `p_target`, the wrapper interpolates
/// between the inner solver's current origin `p_start` and the target,
/// p(a) = (1−a)·p_start + a·p_target, and bisects on a: a successful
/// intermediate solve advances the inner origin (so the next attempt starts
/// from a closer converged point) and the step restarts at the full target;
/// a failure halves the step back toward the last success.
///
/// The search gives up when a collapses to zero (no representable progress
/// from the origin) or after [`DEFAULT_MAX_STEPS`] inner attempts; either
/// way the wrapper leaves the inner solver's state describing the requested
/// target point, so `has_converged` and `origin` read the same as for a bare
/// failed solve.
pub struct HomotopySolver<S> {
    inner: S,
    max_steps: usize,
    p_start: DVector<f64>,
    p_step: DVector<f64>,
}

impl<S: NonlinearSolver> HomotopySolver<S> {
    /// Wrap an inner solver.
    pub fn new(inner: S) -> Self {
        let param_dim = inner.origin().0.len();
        Self {
            inner,
            max_steps: DEFAULT_MAX_STEPS,
            p_start: DVector::zeros(param_dim),
            p_step: DVector::zeros(param_dim),
        }
    }

    /// Cap the number of inner solve attempts per continuation.
    pub fn set_max_steps(&mut self, max_steps: usize) {
        self.max_steps = max_steps;
    }

    /// The wrapped solver.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwrap the inner solver.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn continue_toward(&mut self, p_target: &DVector<f64>) {
        self.p_start.copy_from(self.inner.origin().0);
        let mut best_a = 0.0_f64;
        let mut a = 0.5_f64;
        let mut attempts = 0_usize;

        while best_a < 1.0 && a > 0.0 {
            if attempts >= self.max_steps {
                // One last direct attempt, so the convergence flag and the
                // origin always describe the requested point.
                self.inner.solve(p_target);
                break;
            }
            attempts += 1;

            // p(a) = (1 - a)·p_start + a·p_target; at a = 1 this is exactly
            // the target, with no roundoff.
            self.p_step.copy_from(&self.p_start);
            self.p_step.axpy(a, p_target, 1.0 - a);
            self.inner.solve(&self.p_step);

            if self.inner.has_converged() {
                best_a = a;
                a = 1.0;
            } else {
                a = 0.5 * (a + best_a);
            }
        }

        if !self.inner.has_converged() {
            log::warn!(
                "homotopy continuation gave up after {} attempts ({:.0}% of the way)",
                attempts,
                best_a * 100.0
            );
        }
    }
}

impl<S: NonlinearSolver> NonlinearSolver for HomotopySolver<S> {
    fn solve(&mut self, p: &DVector<f64>) -> &DVector<f64> {
        self.inner.solve(p);
        if !self.inner.has_converged() {
            self.continue_toward(p);
        }
        self.inner.solution()
    }

    fn solution(&self) -> &DVector<f64> {
        self.inner.solution()
    }

    fn has_converged(&self) -> bool {
        self.inner.has_converged()
    }

    fn needed_iterations(&self) -> usize {
        self.inner.needed_iterations()
    }

    fn set_tolerance(&mut self, tol: f64) {
        self.inner.set_tolerance(tol);
    }

    fn set_origin(&mut self, p: &DVector<f64>, z: &DVector<f64>) -> Result<()> {
        self.inner.set_origin(p, z)
    }

    fn origin(&self) -> (&DVector<f64>, &DVector<f64>) {
        self.inner.origin()
    }
}
