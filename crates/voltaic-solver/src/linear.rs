//! Dense linear system solving.

use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn};

use crate::error::{Error, Result};

/// A partial-pivoting LU factorization of a square real matrix.
///
/// Thin wrapper around nalgebra's LU that reports a singular factor as a
/// typed error at factorization time and keeps the factors around for
/// repeated right-hand sides. The Newton solver stores one of these per
/// operating point so the warm-start prediction is a single triangular
/// solve.
#[derive(Debug, Clone)]
pub struct DenseLu {
    lu: LU<f64, Dyn, Dyn>,
}

impl DenseLu {
    /// Factor a square matrix.
    ///
    /// Returns [`Error::SingularMatrix`] on a zero pivot; callers treat that
    /// as a solver failure signal, not a fault.
    pub fn factor(matrix: &DMatrix<f64>) -> Result<Self> {
        if matrix.nrows() != matrix.ncols() {
            return Err(Error::DimensionMismatch {
                expected: matrix.nrows(),
                actual: matrix.ncols(),
            });
        }

        let lu = matrix.clone().lu();
        if !lu.is_invertible() {
            return Err(Error::SingularMatrix);
        }
        Ok(Self { lu })
    }

    /// Solve A·x = b for the factored A.
    pub fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>> {
        self.lu.solve(rhs).ok_or(Error::SingularMatrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn test_factor_and_solve() {
        // 2x + y = 5
        // x + 3y = 6
        // Solution: x = 1.8, y = 1.4
        let a = dmatrix![2.0, 1.0; 1.0, 3.0];
        let lu = DenseLu::factor(&a).unwrap();

        let x = lu.solve(&dvector![5.0, 6.0]).unwrap();
        assert!((x[0] - 1.8).abs() < 1e-10);
        assert!((x[1] - 1.4).abs() < 1e-10);

        // Same factors, different right-hand side.
        let y = lu.solve(&dvector![2.0, 1.0]).unwrap();
        assert!((a[(0, 0)] * y[0] + a[(0, 1)] * y[1] - 2.0).abs() < 1e-12);
        assert!((a[(1, 0)] * y[0] + a[(1, 1)] * y[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_matrix() {
        let a = dmatrix![1.0, 2.0; 2.0, 4.0]; // Singular (row 2 = 2 * row 1)

        let result = DenseLu::factor(&a);
        assert!(matches!(result, Err(Error::SingularMatrix)));
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = DMatrix::<f64>::zeros(2, 3);

        let result = DenseLu::factor(&a);
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }
}
