//! The residual/Jacobian oracle contract.
//!
//! An oracle evaluates a parametric nonlinear system F(p, z) together with its
//! two Jacobians. Solvers drive the oracle; the oracle owns the output
//! buffers and overwrites them on every evaluation.

use nalgebra::{DMatrix, DVector};

/// A parametric residual/Jacobian evaluator for a system F(p, z) = 0.
///
/// `p` is the parameter vector (length P, typically the circuit inputs for
/// one sample) and `z` is the unknown vector (length N). A single call to
/// [`evaluate`](Oracle::evaluate) fully populates all three output buffers:
///
/// - the residual r = F(p, z), length N,
/// - the Jacobian J = ∂F/∂z, shape N×N,
/// - the parameter Jacobian Jp = ∂F/∂p, shape N×P.
///
/// Evaluation must be pure with respect to `p` and `z`: calling `evaluate`
/// twice with the same arguments writes the same outputs. Non-finite outputs
/// are a legitimate signal (the solver treats them as "out of the model's
/// domain"), not an error.
///
/// The accessors return references into oracle-owned storage that is
/// overwritten by the next evaluation, so callers must copy anything they
/// want to keep across calls.
pub trait Oracle {
    /// Number of unknowns N.
    fn dim(&self) -> usize;

    /// Number of parameters P.
    fn param_dim(&self) -> usize;

    /// Evaluate the system at (p, z), overwriting all output buffers.
    fn evaluate(&mut self, p: &DVector<f64>, z: &DVector<f64>);

    /// Residual r = F(p, z) from the most recent evaluation.
    fn residual(&self) -> &DVector<f64>;

    /// Jacobian J = ∂F/∂z from the most recent evaluation.
    fn jacobian(&self) -> &DMatrix<f64>;

    /// Parameter Jacobian Jp = ∂F/∂p from the most recent evaluation.
    fn param_jacobian(&self) -> &DMatrix<f64>;
}

/// Owned output storage for an [`Oracle`] implementation.
///
/// Implementors embed one of these, write into the `*_mut` views inside
/// `evaluate`, and delegate the trait accessors to the shared views. All
/// allocation happens here, once, at construction.
#[derive(Debug, Clone)]
pub struct OracleBuffers {
    residual: DVector<f64>,
    jacobian: DMatrix<f64>,
    param_jacobian: DMatrix<f64>,
}

impl OracleBuffers {
    /// Allocate zeroed buffers for a system with N unknowns and P parameters.
    pub fn new(dim: usize, param_dim: usize) -> Self {
        Self {
            residual: DVector::zeros(dim),
            jacobian: DMatrix::zeros(dim, dim),
            param_jacobian: DMatrix::zeros(dim, param_dim),
        }
    }

    /// Number of unknowns N.
    pub fn dim(&self) -> usize {
        self.residual.len()
    }

    /// Number of parameters P.
    pub fn param_dim(&self) -> usize {
        self.param_jacobian.ncols()
    }

    /// Residual vector r.
    pub fn residual(&self) -> &DVector<f64> {
        &self.residual
    }

    /// Mutable residual vector r.
    pub fn residual_mut(&mut self) -> &mut DVector<f64> {
        &mut self.residual
    }

    /// Jacobian matrix J.
    pub fn jacobian(&self) -> &DMatrix<f64> {
        &self.jacobian
    }

    /// Mutable Jacobian matrix J.
    pub fn jacobian_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.jacobian
    }

    /// Parameter Jacobian matrix Jp.
    pub fn param_jacobian(&self) -> &DMatrix<f64> {
        &self.param_jacobian
    }

    /// Mutable parameter Jacobian matrix Jp.
    pub fn param_jacobian_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.param_jacobian
    }
}
