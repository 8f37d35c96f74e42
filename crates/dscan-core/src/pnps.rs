//! Parametrised nonlinear-process spectrum (PNPS) forward model.
//!
//! A d-scan varies the insertion $z$ of a dispersive element and records
//! the spectrum of a nonlinear process driven by the dispersed pulse.
//! The model chain for one scan position is
//!
//! $$ \tilde{E}_z(\omega) = M_z(\omega)\,\tilde{E}(\omega), \quad
//!    A_z(t) = \mathcal{F}^{-1}[\tilde{E}_z], \quad
//!    s_z(t) = f(A_z(t)), \quad
//!    S_z(\omega) = \mathcal{F}[s_z] $$
//!
//! with the mask $M_z(\omega) = e^{i z \kappa(\omega)}$ given by the
//! material's dispersion law and $f$ the collinear process nonlinearity.
//! The simulated trace row is $|S_z(\omega)|^2$ on the signal's absolute
//! frequency axis, which sits at a harmonic of the carrier.

use std::str::FromStr;

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use dscan_materials::Material;

use crate::error::RetrievalError;
use crate::grid::{FourierTransform, SpectralGrid};

/// The nonlinear process generating the scan signal.
///
/// For a single collinear beam the polarisation-gating, self-diffraction,
/// and cross-polarised-wave signals all reduce to $A^2 A^*$; they differ
/// only in the experimental geometry the trace was taken with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NonlinearProcess {
    Shg,
    Thg,
    Pg,
    Sd,
    Xpw,
}

impl NonlinearProcess {
    /// Harmonic of the carrier the signal spectrum is centred on.
    pub fn carrier_multiplier(&self) -> f64 {
        match self {
            NonlinearProcess::Shg => 2.0,
            NonlinearProcess::Thg => 3.0,
            NonlinearProcess::Pg | NonlinearProcess::Sd | NonlinearProcess::Xpw => 1.0,
        }
    }

    /// Time-domain signal $f(A)$.
    pub fn signal(&self, a: &Array1<Complex64>) -> Array1<Complex64> {
        match self {
            NonlinearProcess::Shg => a.mapv(|x| x * x),
            NonlinearProcess::Thg => a.mapv(|x| x * x * x),
            NonlinearProcess::Pg | NonlinearProcess::Sd | NonlinearProcess::Xpw => {
                a.mapv(|x| x * x * x.conj())
            }
        }
    }

    /// Back-propagate a signal-domain residual `b` through the
    /// nonlinearity at operating point `a`: the Wirtinger gradient
    /// $b\,\overline{\partial f/\partial A} + \bar{b}\,\partial f/\partial A^*$.
    pub fn gradient(&self, a: &Array1<Complex64>, b: &Array1<Complex64>) -> Array1<Complex64> {
        match self {
            NonlinearProcess::Shg => Array1::from_iter(
                a.iter().zip(b).map(|(&x, &g)| 2.0 * g * x.conj()),
            ),
            NonlinearProcess::Thg => Array1::from_iter(
                a.iter()
                    .zip(b)
                    .map(|(&x, &g)| 3.0 * g * (x * x).conj()),
            ),
            NonlinearProcess::Pg | NonlinearProcess::Sd | NonlinearProcess::Xpw => {
                Array1::from_iter(a.iter().zip(b).map(|(&x, &g)| {
                    2.0 * x.norm_sqr() * g + x * x * g.conj()
                }))
            }
        }
    }
}

impl std::fmt::Display for NonlinearProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NonlinearProcess::Shg => "shg",
            NonlinearProcess::Thg => "thg",
            NonlinearProcess::Pg => "pg",
            NonlinearProcess::Sd => "sd",
            NonlinearProcess::Xpw => "xpw",
        };
        f.write_str(name)
    }
}

impl FromStr for NonlinearProcess {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shg" => Ok(NonlinearProcess::Shg),
            "thg" => Ok(NonlinearProcess::Thg),
            "pg" => Ok(NonlinearProcess::Pg),
            "sd" => Ok(NonlinearProcess::Sd),
            "xpw" => Ok(NonlinearProcess::Xpw),
            other => Err(RetrievalError::Configuration(format!(
                "unknown nonlinear process '{other}'; valid: shg, thg, pg, sd, xpw"
            ))),
        }
    }
}

impl TryFrom<String> for NonlinearProcess {
    type Error = RetrievalError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NonlinearProcess> for String {
    fn from(p: NonlinearProcess) -> Self {
        p.to_string()
    }
}

/// Intermediate fields of one forward simulation, kept for the
/// retriever's gradient step.
#[derive(Debug, Clone)]
pub struct SimulatedSignal {
    /// Dispersed time-domain field $A_z(t)$.
    pub time_field: Array1<Complex64>,
    /// Signal spectrum $S_z(\omega)$.
    pub signal_spectrum: Array1<Complex64>,
}

impl SimulatedSignal {
    pub fn intensity(&self) -> Array1<f64> {
        self.signal_spectrum.mapv(|c| c.norm_sqr())
    }
}

/// The d-scan forward model for one (process, material) pair on a grid.
#[derive(Debug, Clone)]
pub struct DscanModel {
    ft: FourierTransform,
    process: NonlinearProcess,
    material: Material,
    /// Dispersive wavenumber at each absolute grid frequency (rad/m).
    kappa: Array1<f64>,
}

impl DscanModel {
    pub fn new(ft: FourierTransform, process: NonlinearProcess, material: Material) -> Self {
        let kappa = ft.grid().omega().mapv(|w| material.dispersive_wavenumber(w));
        Self {
            ft,
            process,
            material,
            kappa,
        }
    }

    pub fn grid(&self) -> &SpectralGrid {
        self.ft.grid()
    }

    pub fn transform(&self) -> &FourierTransform {
        &self.ft
    }

    pub fn process(&self) -> NonlinearProcess {
        self.process
    }

    pub fn material(&self) -> Material {
        self.material
    }

    /// Absolute frequency axis of the signal spectrum: the grid detuning
    /// shifted to the process harmonic of the carrier.
    pub fn process_frequencies(&self) -> Array1<f64> {
        let shift = self.process.carrier_multiplier() * self.grid().carrier();
        self.grid().detuning().mapv(|w| w + shift)
    }

    /// Phase mask $M_z(\omega) = e^{i z \kappa(\omega)}$ for insertion `z` (m).
    pub fn mask(&self, insertion_m: f64) -> Array1<Complex64> {
        self.kappa
            .mapv(|k| Complex64::from_polar(1.0, insertion_m * k))
    }

    /// Forward-simulate one scan position with a precomputed mask.
    pub fn simulate_masked(
        &self,
        spectrum: &Array1<Complex64>,
        mask: &Array1<Complex64>,
    ) -> SimulatedSignal {
        let dispersed: Array1<Complex64> = spectrum * mask;
        let time_field = self
            .ft
            .backward(dispersed.as_slice().expect("contiguous spectrum"));
        let signal = self.process.signal(&time_field);
        let signal_spectrum = self
            .ft
            .forward(signal.as_slice().expect("contiguous signal"));
        SimulatedSignal {
            time_field,
            signal_spectrum,
        }
    }

    /// Forward-simulate one scan position at insertion `z` (m).
    pub fn simulate(&self, spectrum: &Array1<Complex64>, insertion_m: f64) -> SimulatedSignal {
        self.simulate_masked(spectrum, &self.mask(insertion_m))
    }

    /// Simulate the full trace over a parameter axis. Rows are
    /// independent and evaluated in parallel; the output ordering is
    /// fixed by the axis, so the result is deterministic.
    pub fn trace(&self, spectrum: &Array1<Complex64>, parameter: &Array1<f64>) -> Array2<f64> {
        let n = self.grid().len();
        let rows: Vec<Array1<f64>> = parameter
            .to_vec()
            .par_iter()
            .map(|&z| self.simulate(spectrum, z).intensity())
            .collect();

        let mut out = Array2::zeros((parameter.len(), n));
        for (i, row) in rows.into_iter().enumerate() {
            out.row_mut(i).assign(&row);
        }
        out
    }
}
