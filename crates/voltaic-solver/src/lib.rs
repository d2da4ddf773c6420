//! Nonlinear solvers for per-sample circuit simulation.
//!
//! This crate solves parameter-dependent systems F(p, z) = 0 where the
//! parameters p move a little on every call, typically one solve per audio
//! sample in a discrete-time circuit simulation. A single Newton iteration is
//! the easy part; the crate is really about the layers that keep the
//! *repeated* solve fast and robust when a good initial guess decides
//! convergence:
//!
//! - [`NewtonSolver`] - Newton iteration on a [`voltaic_core::Oracle`], with
//!   the initial guess extrapolated to first order from the last converged
//!   operating point.
//! - [`HomotopySolver`] - when the inner solver fails, walks the parameters
//!   along a straight line from the last known-good point and bisects the
//!   step.
//! - [`CachingSolver`] - remembers every expensive converged solve and seeds
//!   the inner solver from the nearest stored operating point, found through
//!   a k-d tree.
//!
//! All three implement [`NonlinearSolver`], so the wrappers compose in any
//! order around any inner solver, with static dispatch on the hot path.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::dvector;
//! use voltaic_devices::{Diode, DiodeClipper};
//! use voltaic_solver::{CachingSolver, HomotopySolver, NewtonSolver, NonlinearSolver};
//!
//! // A diode clipper driven through 2.2 kΩ; v = 0 solves the zero-input
//! // stage exactly, which seeds the solver's operating point.
//! let clipper = DiodeClipper::new(Diode::default(), 2.2e3);
//! let newton = NewtonSolver::new(clipper, &dvector![0.0], &dvector![0.0]).unwrap();
//! let mut solver = CachingSolver::new(HomotopySolver::new(newton));
//!
//! for sample in 0..64 {
//!     let vin = 3.0 * (sample as f64 / 64.0 * std::f64::consts::TAU).sin();
//!     let v = solver.solve(&dvector![vin]);
//!     assert!(v[0].abs() < vin.abs().max(1.0));
//! }
//! assert!(solver.has_converged());
//! ```

pub mod cache;
pub mod error;
pub mod homotopy;
pub mod kdtree;
pub mod linear;
pub mod newton;

use nalgebra::DVector;

pub use cache::{CachingSolver, DEFAULT_ITERATION_GATE};
pub use error::{Error, Result};
pub use homotopy::{HomotopySolver, DEFAULT_MAX_STEPS};
pub use kdtree::{Candidate, KdTree};
pub use linear::DenseLu;
pub use newton::{NewtonSolver, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE};

/// The capability set shared by every solver layer.
///
/// A solver holds one remembered operating point (the *origin*) and solves
/// F(p, z) = 0 for the z belonging to a requested p. Solving never fails and
/// never panics on solver-internal trouble: the returned iterate is the best
/// available, and [`has_converged`](NonlinearSolver::has_converged) says
/// whether it actually satisfies the tolerance. After a failed solve the
/// origin is untouched, so the solver stays usable.
///
/// Returned vector references point into solver-owned storage that the next
/// `solve` overwrites; callers copy what they need to keep. All methods
/// expect `p` of the oracle's parameter dimension and `z` of its unknown
/// dimension, and panic on mismatched lengths.
pub trait NonlinearSolver {
    /// Solve F(p, ·) = 0, returning the final iterate.
    fn solve(&mut self, p: &DVector<f64>) -> &DVector<f64>;

    /// The iterate produced by the most recent solve.
    fn solution(&self) -> &DVector<f64>;

    /// Whether the most recent solve met the tolerance.
    fn has_converged(&self) -> bool;

    /// Iterations spent in the most recent solve (for wrappers, the inner
    /// solver's most recent attempt).
    fn needed_iterations(&self) -> usize;

    /// Set the convergence threshold on ‖F(p, z)‖².
    fn set_tolerance(&mut self, tol: f64);

    /// Force a new extrapolation origin, re-evaluating the oracle and
    /// refactoring its Jacobian there.
    ///
    /// Fails if the evaluation is non-finite or the Jacobian is singular,
    /// leaving the previous origin in place.
    fn set_origin(&mut self, p: &DVector<f64>, z: &DVector<f64>) -> Result<()>;

    /// The current extrapolation origin (p, z).
    fn origin(&self) -> (&DVector<f64>, &DVector<f64>);
}
