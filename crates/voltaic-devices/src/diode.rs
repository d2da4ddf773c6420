//! Diode device models using the Shockley equation.

use nalgebra::{DMatrix, DVector};
use voltaic_core::{Oracle, OracleBuffers};

/// Exponent above which [`exp_lin`] switches to its tangent-line extension.
const EXP_LIN_MAX: f64 = 40.0;

/// Minimum conductance reported by diode evaluation.
///
/// Even in cutoff, real junctions leak (Icbo ≈ 1-100 nA for silicon), so a
/// floor of 1e-12 S keeps the Jacobian nonsingular without adding measurable
/// phantom current.
pub const LEAKAGE_CONDUCTANCE: f64 = 1e-12;

/// Thermal voltage at a given temperature.
pub fn thermal_voltage(temp_k: f64) -> f64 {
    const K_BOLTZMANN: f64 = 1.380649e-23;
    const Q_ELECTRON: f64 = 1.602176634e-19;
    K_BOLTZMANN * temp_k / Q_ELECTRON
}

/// Overflow-safe exponential, returning `(value, derivative)`.
///
/// Beyond `x = 40` the exponential is replaced by its tangent line, which is
/// C¹-continuous at the seam. Junction models evaluated at a wild Newton
/// iterate then produce a large finite residual with a large finite slope
/// instead of infinity, and the iteration walks back into range on its own.
/// Solutions with exponents inside the seam are unaffected.
pub fn exp_lin(x: f64) -> (f64, f64) {
    if x > EXP_LIN_MAX {
        let e = EXP_LIN_MAX.exp();
        (e * (1.0 + (x - EXP_LIN_MAX)), e)
    } else {
        let e = x.exp();
        (e, e)
    }
}

/// Diode model parameters.
#[derive(Debug, Clone)]
pub struct DiodeParams {
    /// Saturation current (A). Default: 1e-14.
    pub is: f64,
    /// Emission coefficient. Default: 1.0.
    pub n: f64,
    /// Thermal voltage (V). Default: Vt at 300.15 K (≈ 25.85 mV).
    pub vt: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self {
            is: 1e-14,
            n: 1.0,
            vt: thermal_voltage(300.15),
        }
    }
}

/// A Shockley diode.
#[derive(Debug, Clone, Default)]
pub struct Diode {
    /// Model parameters.
    pub params: DiodeParams,
}

impl Diode {
    /// Create a diode with the given parameters.
    pub fn new(params: DiodeParams) -> Self {
        Self { params }
    }

    /// Evaluate diode current and conductance at a junction voltage.
    ///
    /// Returns (current, conductance) where:
    /// - current = Is * (exp(Vd / (n * Vt)) - 1)
    /// - conductance = dI/dV = Is / (n * Vt) * exp(Vd / (n * Vt))
    ///
    /// The exponential is evaluated through [`exp_lin`] and the conductance
    /// is floored at [`LEAKAGE_CONDUCTANCE`].
    pub fn current(&self, vd: f64) -> (f64, f64) {
        let nvt = self.params.n * self.params.vt;
        let (e, de) = exp_lin(vd / nvt);
        let id = self.params.is * (e - 1.0);
        let gd = (self.params.is * de / nvt).max(LEAKAGE_CONDUCTANCE);
        (id, gd)
    }
}

/// Antiparallel diode pair fed through a series resistor.
///
/// The classic symmetric clipping stage: an input voltage drives the diode
/// pair through a resistance R, and the single unknown is the junction
/// voltage v. The system is
///
///   F(vin, v) = (v - vin) / R + Id(v) - Id(-v) = 0
///
/// with one parameter (vin) and one unknown (v), making it the canonical
/// per-sample workload for the solver stack.
#[derive(Debug, Clone)]
pub struct DiodeClipper {
    diode: Diode,
    conductance: f64,
    buffers: OracleBuffers,
}

impl DiodeClipper {
    /// Create a clipper stage from a diode model and a series resistance.
    pub fn new(diode: Diode, resistance: f64) -> Self {
        Self {
            diode,
            conductance: 1.0 / resistance,
            buffers: OracleBuffers::new(1, 1),
        }
    }
}

impl Oracle for DiodeClipper {
    fn dim(&self) -> usize {
        1
    }

    fn param_dim(&self) -> usize {
        1
    }

    fn evaluate(&mut self, p: &DVector<f64>, z: &DVector<f64>) {
        let vin = p[0];
        let v = z[0];
        let (i_fwd, g_fwd) = self.diode.current(v);
        let (i_rev, g_rev) = self.diode.current(-v);
        let g = self.conductance;

        self.buffers.residual_mut()[0] = (v - vin) * g + i_fwd - i_rev;
        self.buffers.jacobian_mut()[(0, 0)] = g + g_fwd + g_rev;
        self.buffers.param_jacobian_mut()[(0, 0)] = -g;
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
