//! Newton iteration with a warm-started initial guess.

use nalgebra::{DMatrix, DVector};
use voltaic_core::Oracle;

use crate::error::{Error, Result};
use crate::linear::DenseLu;
use crate::NonlinearSolver;

/// Default iteration budget per solve.
pub const DEFAULT_MAX_ITERATIONS: usize = 500;

/// Default convergence threshold on ‖r‖².
pub const DEFAULT_TOLERANCE: f64 = 1e-20;

/// Newton solver for F(p, z) = 0 with first-order extrapolation of the
/// initial guess from the last converged operating point.
///
/// The solver remembers the last point it converged at (parameters, solution,
/// the parameter Jacobian, and the LU factors of the Jacobian) and predicts
/// the next initial iterate from the implicit-function theorem:
///
///   z₀ = last_z − J⁻¹·Jp·(p − last_p)
///
/// With parameters that move a little per call (one audio sample at a time),
/// the prediction usually lands inside the quadratic convergence basin and
/// the iteration finishes in one or two steps.
///
/// A solve never fails: non-finite oracle output, a singular Jacobian, or an
/// exhausted iteration budget all end the iteration early with the current
/// iterate as the result and [`has_converged`](NonlinearSolver::has_converged)
/// reporting `false`. In every failure case the remembered operating point is
/// left exactly as it was, so a later call from a better starting point can
/// recover.
pub struct NewtonSolver<O: Oracle> {
    oracle: O,
    z: DVector<f64>,
    last_p: DVector<f64>,
    last_z: DVector<f64>,
    last_jp: DMatrix<f64>,
    last_lu: DenseLu,
    tol: f64,
    max_iterations: usize,
    iterations: usize,
    converged: bool,
}

impl<O: Oracle> NewtonSolver<O> {
    /// Create a solver seeded with an operating point.
    ///
    /// `initial_z` must solve F(initial_p, ·) = 0, or at least be close
    /// enough that the first solve converges. The oracle is evaluated once
    /// here; a non-finite evaluation or a singular Jacobian at the seed point
    /// is a construction error.
    pub fn new(mut oracle: O, initial_p: &DVector<f64>, initial_z: &DVector<f64>) -> Result<Self> {
        oracle.evaluate(initial_p, initial_z);
        if !outputs_are_finite(&oracle) {
            return Err(Error::NonFiniteEvaluation);
        }
        let last_lu = DenseLu::factor(oracle.jacobian())?;
        let last_jp = oracle.param_jacobian().clone_owned();

        Ok(Self {
            z: initial_z.clone_owned(),
            last_p: initial_p.clone_owned(),
            last_z: initial_z.clone_owned(),
            last_jp,
            last_lu,
            tol: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            iterations: 0,
            converged: true,
            oracle,
        })
    }

    /// Set the per-solve iteration budget.
    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations;
    }

    /// The oracle this solver owns.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }
}

impl<O: Oracle> NonlinearSolver for NewtonSolver<O> {
    fn solve(&mut self, p: &DVector<f64>) -> &DVector<f64> {
        self.converged = false;
        self.iterations = 0;

        // Warm start: z0 = last_z - J⁻¹·Jp·(p - last_p). The factors are
        // valid by construction, so a refused solve only costs the
        // extrapolation, not the call.
        let dp = p - &self.last_p;
        self.z.copy_from(&self.last_z);
        if let Ok(dz) = self.last_lu.solve(&(&self.last_jp * &dp)) {
            self.z -= dz;
        }

        for iteration in 1..=self.max_iterations {
            self.iterations = iteration;
            self.oracle.evaluate(p, &self.z);

            if !outputs_are_finite(&self.oracle) {
                log::debug!("newton: non-finite evaluation at iteration {}", iteration);
                return &self.z;
            }

            // Factor before the convergence test: a converged point becomes
            // the next extrapolation origin and needs valid factors.
            let lu = match DenseLu::factor(self.oracle.jacobian()) {
                Ok(lu) => lu,
                Err(_) => {
                    log::debug!("newton: singular Jacobian at iteration {}", iteration);
                    return &self.z;
                }
            };

            if self.oracle.residual().norm_squared() < self.tol {
                self.converged = true;
                self.last_p.copy_from(p);
                self.last_z.copy_from(&self.z);
                self.last_jp.copy_from(self.oracle.param_jacobian());
                self.last_lu = lu;
                break;
            }

            match lu.solve(self.oracle.residual()) {
                Ok(dz) => self.z -= dz,
                Err(_) => return &self.z,
            }
        }

        &self.z
    }

    fn solution(&self) -> &DVector<f64> {
        &self.z
    }

    fn has_converged(&self) -> bool {
        self.converged
    }

    fn needed_iterations(&self) -> usize {
        self.iterations
    }

    fn set_tolerance(&mut self, tol: f64) {
        self.tol = tol;
    }

    fn set_origin(&mut self, p: &DVector<f64>, z: &DVector<f64>) -> Result<()> {
        self.oracle.evaluate(p, z);
        if !outputs_are_finite(&self.oracle) {
            return Err(Error::NonFiniteEvaluation);
        }
        let lu = DenseLu::factor(self.oracle.jacobian())?;

        self.last_p.copy_from(p);
        self.last_z.copy_from(z);
        self.last_jp.copy_from(self.oracle.param_jacobian());
        self.last_lu = lu;
        Ok(())
    }

    fn origin(&self) -> (&DVector<f64>, &DVector<f64>) {
        (&self.last_p, &self.last_z)
    }
}

fn outputs_are_finite<O: Oracle>(oracle: &O) -> bool {
    oracle.residual().iter().all(|v| v.is_finite())
        && oracle.jacobian().iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};
    use voltaic_core::OracleBuffers;
    use voltaic_devices::AffineNetwork;

    /// F(p, z) = z³ - p, mildly nonlinear with a well-behaved Jacobian away
    /// from z = 0.
    struct CubeDrive {
        buffers: OracleBuffers,
    }

    impl CubeDrive {
        fn new() -> Self {
            Self {
                buffers: OracleBuffers::new(1, 1),
            }
        }
    }

    impl Oracle for CubeDrive {
        fn dim(&self) -> usize {
            1
        }

        fn param_dim(&self) -> usize {
            1
        }

        fn evaluate(&mut self, p: &DVector<f64>, z: &DVector<f64>) {
            self.buffers.residual_mut()[0] = z[0] * z[0] * z[0] - p[0];
            self.buffers.jacobian_mut()[(0, 0)] = 3.0 * z[0] * z[0];
            self.buffers.param_jacobian_mut()[(0, 0)] = -1.0;
        }

        fn residual(&self) -> &DVector<f64> {
            self.buffers.residual()
        }

        fn jacobian(&self) -> &DMatrix<f64> {
            self.buffers.jacobian()
        }

        fn param_jacobian(&self) -> &DMatrix<f64> {
            self.buffers.param_jacobian()
        }
    }

    /// F(p, z) = z - p inside |p| ≤ 1, NaN outside (a model leaving its
    /// validity domain).
    struct PoisonDrive {
        buffers: OracleBuffers,
    }

    impl PoisonDrive {
        fn new() -> Self {
            Self {
                buffers: OracleBuffers::new(1, 1),
            }
        }
    }

    impl Oracle for PoisonDrive {
        fn dim(&self) -> usize {
            1
        }

        fn param_dim(&self) -> usize {
            1
        }

        fn evaluate(&mut self, p: &DVector<f64>, z: &DVector<f64>) {
            if p[0].abs() > 1.0 {
                self.buffers.residual_mut()[0] = f64::NAN;
            } else {
                self.buffers.residual_mut()[0] = z[0] - p[0];
            }
            self.buffers.jacobian_mut()[(0, 0)] = 1.0;
            self.buffers.param_jacobian_mut()[(0, 0)] = -1.0;
        }

        fn residual(&self) -> &DVector<f64> {
            self.buffers.residual()
        }

        fn jacobian(&self) -> &DMatrix<f64> {
            self.buffers.jacobian()
        }

        fn param_jacobian(&self) -> &DMatrix<f64> {
            self.buffers.param_jacobian()
        }
    }

    /// F(p, z) = z - p with a Jacobian that goes singular at p = 13.
    struct SingularDrive {
        buffers: OracleBuffers,
    }

    impl SingularDrive {
        fn new() -> Self {
            Self {
                buffers: OracleBuffers::new(1, 1),
            }
        }
    }

    impl Oracle for SingularDrive {
        fn dim(&self) -> usize {
            1
        }

        fn param_dim(&self) -> usize {
            1
        }

        fn evaluate(&mut self, p: &DVector<f64>, z: &DVector<f64>) {
            self.buffers.residual_mut()[0] = z[0] - p[0];
            self.buffers.jacobian_mut()[(0, 0)] = if p[0] == 13.0 { 0.0 } else { 1.0 };
            self.buffers.param_jacobian_mut()[(0, 0)] = -1.0;
        }

        fn residual(&self) -> &DVector<f64> {
            self.buffers.residual()
        }

        fn jacobian(&self) -> &DMatrix<f64> {
            self.buffers.jacobian()
        }

        fn param_jacobian(&self) -> &DMatrix<f64> {
            self.buffers.param_jacobian()
        }
    }

    fn diagonal_network() -> AffineNetwork {
        AffineNetwork::new(
            dmatrix![2.0, 0.0; 0.0, 3.0],
            dmatrix![1.0, 0.0; 0.0, 1.0],
            dvector![0.0, 0.0],
        )
        .unwrap()
    }

    #[test]
    fn test_linear_system_converges_in_one_step() {
        let net = diagonal_network();
        let mut solver = NewtonSolver::new(net, &dvector![0.0, 0.0], &dvector![0.0, 0.0]).unwrap();

        let z = solver.solve(&dvector![4.0, 9.0]).clone();

        assert_eq!(z, dvector![-2.0, -3.0]);
        assert!(solver.has_converged());
        assert_eq!(solver.needed_iterations(), 1);
    }

    #[test]
    fn test_converged_solve_installs_origin() {
        let net = diagonal_network();
        let mut solver = NewtonSolver::new(net, &dvector![0.0, 0.0], &dvector![0.0, 0.0]).unwrap();

        let z = solver.solve(&dvector![4.0, 9.0]).clone();
        let (origin_p, origin_z) = solver.origin();

        assert_eq!(origin_p, &dvector![4.0, 9.0]);
        assert_eq!(origin_z, &z);
    }

    #[test]
    fn test_one_step_from_a_forced_origin() {
        let net = diagonal_network();
        let mut solver = NewtonSolver::new(net, &dvector![0.0, 0.0], &dvector![0.0, 0.0]).unwrap();

        // The linear prediction is exact no matter where the origin sits.
        solver
            .set_origin(&dvector![4.0, 9.0], &dvector![-2.0, -3.0])
            .unwrap();
        solver.solve(&dvector![-6.0, 3.0]);

        assert!(solver.has_converged());
        assert_eq!(solver.needed_iterations(), 1);
        assert_eq!(solver.solution(), &dvector![3.0, -1.0]);
    }

    #[test]
    fn test_nonlinear_convergence() {
        let mut solver = NewtonSolver::new(CubeDrive::new(), &dvector![1.0], &dvector![1.0]).unwrap();

        let z = solver.solve(&dvector![27.0]).clone();

        assert!(solver.has_converged());
        assert!((z[0] - 3.0).abs() < 1e-9, "z = {}", z[0]);
        assert!(solver.needed_iterations() > 1);
    }

    #[test]
    fn test_non_finite_evaluation_preserves_origin() {
        let mut solver = NewtonSolver::new(PoisonDrive::new(), &dvector![0.0], &dvector![0.0]).unwrap();

        solver.solve(&dvector![0.5]);
        assert!(solver.has_converged());

        let origin_p = solver.origin().0.clone();
        let origin_z = solver.origin().1.clone();

        solver.solve(&dvector![5.0]);

        assert!(!solver.has_converged());
        assert_eq!(solver.needed_iterations(), 1);
        assert_eq!(solver.origin().0, &origin_p);
        assert_eq!(solver.origin().1, &origin_z);
    }

    #[test]
    fn test_singular_jacobian_preserves_origin() {
        let mut solver =
            NewtonSolver::new(SingularDrive::new(), &dvector![0.0], &dvector![0.0]).unwrap();

        solver.solve(&dvector![13.0]);

        assert!(!solver.has_converged());
        assert_eq!(solver.origin().0, &dvector![0.0]);
        assert_eq!(solver.origin().1, &dvector![0.0]);
    }

    #[test]
    fn test_iteration_budget_exhaustion() {
        let mut solver = NewtonSolver::new(CubeDrive::new(), &dvector![1.0], &dvector![1.0]).unwrap();
        solver.set_max_iterations(2);

        solver.solve(&dvector![1e9]);

        assert!(!solver.has_converged());
        assert_eq!(solver.needed_iterations(), 2);
        assert_eq!(solver.origin().0, &dvector![1.0]);
    }

    #[test]
    fn test_loose_tolerance_accepts_coarse_iterates() {
        let mut solver = NewtonSolver::new(CubeDrive::new(), &dvector![1.0], &dvector![1.0]).unwrap();
        solver.set_tolerance(1e-2);

        let z = solver.solve(&dvector![27.0]).clone();

        assert!(solver.has_converged());
        // The accepted iterate satisfies the loose bound, and becomes the origin.
        assert!((z[0].powi(3) - 27.0).powi(2) < 1e-2);
        assert_eq!(solver.origin().0, &dvector![27.0]);
        assert_eq!(solver.origin().1, &z);
    }

    #[test]
    fn test_rejects_singular_seed() {
        let result = NewtonSolver::new(SingularDrive::new(), &dvector![13.0], &dvector![13.0]);
        assert!(matches!(result, Err(Error::SingularMatrix)));
    }

    #[test]
    fn test_rejects_non_finite_seed() {
        let result = NewtonSolver::new(PoisonDrive::new(), &dvector![2.0], &dvector![2.0]);
        assert!(matches!(result, Err(Error::NonFiniteEvaluation)));
    }
}
