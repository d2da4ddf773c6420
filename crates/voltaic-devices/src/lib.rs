//! Device oracles for the Voltaic solver stack.
//!
//! Each device here implements [`voltaic_core::Oracle`]: it evaluates a
//! residual F(p, z) and both Jacobians into its own buffers. The models are
//! deliberately small. A Shockley [`Diode`] with an overflow-safe exponential
//! and the symmetric [`DiodeClipper`] stage built from it cover the stiff
//! exponential case the solver stack exists for, and the [`AffineNetwork`]
//! reference system pins down exact linear behavior.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::dvector;
//! use voltaic_core::Oracle;
//! use voltaic_devices::{Diode, DiodeClipper};
//!
//! let mut clipper = DiodeClipper::new(Diode::default(), 2.2e3);
//!
//! // v = 0 solves the zero-input clipper exactly.
//! clipper.evaluate(&dvector![0.0], &dvector![0.0]);
//! assert_eq!(clipper.residual()[0], 0.0);
//! ```

pub mod diode;
pub mod linear;

pub use diode::{Diode, DiodeClipper, DiodeParams, exp_lin, thermal_voltage, LEAKAGE_CONDUCTANCE};
pub use linear::AffineNetwork;
