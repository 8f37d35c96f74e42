//! Iterative phase retrieval.
//!
//! The [`Retriever`](copra::Retriever) drives the PNPS forward model
//! against a preprocessed measured trace until the candidate spectrum
//! reproduces it. The implementation is the COPRA local iteration
//! (Geib et al., *Optica* **6**, 495, 2019): per-slice magnitude
//! projection followed by a gradient step back through the forward
//! model.

pub mod copra;

use ndarray::{Array1, Array2};
use num_complex::Complex64;

pub use copra::Retriever;

/// Tunable retrieval parameters with the conventional defaults.
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Terminate when the trace error changes by less than this between
    /// iterations.
    pub tolerance: f64,
    /// Peak magnitude (rad) of the random smooth spectral phase seeding
    /// the initial guess.
    pub phase_max: f64,
    /// RNG seed for the initial guess; retrieval is deterministic given
    /// the seed.
    pub seed: u64,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            tolerance: 1e-5,
            phase_max: 0.1,
            seed: 0,
        }
    }
}

/// Converged (or best-so-far) output of a retrieval run.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// Final candidate spectrum.
    pub spectrum: Array1<Complex64>,
    /// Trace error per iteration.
    pub errors: Vec<f64>,
    /// Iterations actually run.
    pub iterations: usize,
    /// Whether the tolerance criterion triggered before the iteration
    /// cap. A non-converged result is still usable; the caller decides
    /// acceptability.
    pub converged: bool,
    /// Scan-parameter axis the trace was retrieved over (m of insertion).
    pub parameter: Array1<f64>,
    /// Per-parameter retrieved spectra: row `i` is the final spectrum
    /// under the forward model's mask at `parameter[i]`.
    pub parameter_spectra: Array2<Complex64>,
}

impl RetrievalResult {
    /// Smallest error seen across the run.
    pub fn final_error(&self) -> f64 {
        self.errors
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }
}
