//! Core contracts for the Voltaic nonlinear solver stack.
//!
//! This crate defines the single external contract the solver stack is built
//! on: the [`Oracle`], a parametric residual/Jacobian evaluator for a system
//! F(p, z) = 0. In a circuit simulator the oracle is produced by modified
//! nodal analysis of the nonlinear subcircuit; here only the evaluation
//! interface is defined, so any source of residuals and Jacobians plugs in.
//!
//! # Writing an oracle
//!
//! Implementations embed an [`OracleBuffers`] for their output storage and
//! fill it inside `evaluate`:
//!
//! ```rust
//! use nalgebra::{DMatrix, DVector};
//! use voltaic_core::{Oracle, OracleBuffers};
//!
//! /// F(p, z) = z² - p, one unknown, one parameter.
//! struct SquareRoot {
//!     buffers: OracleBuffers,
//! }
//!
//! impl Oracle for SquareRoot {
//!     fn dim(&self) -> usize { 1 }
//!     fn param_dim(&self) -> usize { 1 }
//!
//!     fn evaluate(&mut self, p: &DVector<f64>, z: &DVector<f64>) {
//!         self.buffers.residual_mut()[0] = z[0] * z[0] - p[0];
//!         self.buffers.jacobian_mut()[(0, 0)] = 2.0 * z[0];
//!         self.buffers.param_jacobian_mut()[(0, 0)] = -1.0;
//!     }
//!
//!     fn residual(&self) -> &DVector<f64> { self.buffers.residual() }
//!     fn jacobian(&self) -> &DMatrix<f64> { self.buffers.jacobian() }
//!     fn param_jacobian(&self) -> &DMatrix<f64> { self.buffers.param_jacobian() }
//! }
//!
//! let mut oracle = SquareRoot { buffers: OracleBuffers::new(1, 1) };
//! oracle.evaluate(&DVector::from_element(1, 4.0), &DVector::from_element(1, 2.0));
//! assert_eq!(oracle.residual()[0], 0.0);
//! ```
//!
//! The oracle owns its buffers and overwrites them on every evaluation;
//! callers copy anything they need to keep. Non-finite outputs are a valid
//! way for a model to signal "outside my domain"; solvers turn them into a
//! non-converged result rather than an error.

pub mod error;
pub mod oracle;

pub use error::{Error, Result};
pub use oracle::{Oracle, OracleBuffers};
