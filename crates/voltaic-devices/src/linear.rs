//! Affine reference network.

use nalgebra::{DMatrix, DVector};
use voltaic_core::{Error, Oracle, OracleBuffers, Result};

/// A purely linear network: F(p, z) = A·z + B·p + c.
///
/// The Jacobians are the constant matrices A and B, so a single Newton step
/// from any iterate lands exactly on the solution z = -A⁻¹(B·p + c). Useful
/// as a reference oracle and for circuits whose nonlinear devices have been
/// linearized away.
#[derive(Debug, Clone)]
pub struct AffineNetwork {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    c: DVector<f64>,
    buffers: OracleBuffers,
}

impl AffineNetwork {
    /// Create a network from its coefficient matrices.
    ///
    /// `a` must be square N×N, `b` must be N×P, and `c` must have length N.
    pub fn new(a: DMatrix<f64>, b: DMatrix<f64>, c: DVector<f64>) -> Result<Self> {
        if a.nrows() != a.ncols() {
            return Err(Error::DimensionMismatch {
                expected: a.nrows(),
                actual: a.ncols(),
            });
        }
        if b.nrows() != a.nrows() {
            return Err(Error::DimensionMismatch {
                expected: a.nrows(),
                actual: b.nrows(),
            });
        }
        if c.len() != a.nrows() {
            return Err(Error::DimensionMismatch {
                expected: a.nrows(),
                actual: c.len(),
            });
        }

        let buffers = OracleBuffers::new(a.nrows(), b.ncols());
        Ok(Self { a, b, c, buffers })
    }
}

impl Oracle for AffineNetwork {
    fn dim(&self) -> usize {
        self.a.nrows()
    }

    fn param_dim(&self) -> usize {
        self.b.ncols()
    }

    fn evaluate(&mut self, p: &DVector<f64>, z: &DVector<f64>) {
        let r = self.buffers.residual_mut();
        r.gemv(1.0, &self.a, z, 0.0);
        r.gemv(1.0, &self.b, p, 1.0);
        *r += &self.c;

        self.buffers.jacobian_mut().copy_from(&self.a);
        self.buffers.param_jacobian_mut().copy_from(&self.b);
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
