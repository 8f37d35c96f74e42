//! COPRA local iteration for d-scan traces.
//!
//! Each sweep visits every scan position once. At position $m$ the
//! measured magnitude replaces the simulated one while the model phase
//! is kept,
//!
//! $$ S'_m(\omega) = \sqrt{T^{meas}_m(\omega) / \mu}\;
//!    \frac{S_m(\omega)}{|S_m(\omega)|}, $$
//!
//! and the residual $S_m - S'_m$ is back-propagated through the forward
//! model to a spectral-domain gradient, applied with the step
//! $\gamma_m = Z_m / \lVert g_m \rVert^2$. The scale $\mu$ is the
//! least-squares optimum between the measured and simulated traces, so
//! an absolute-calibration mismatch cannot drive the retrieval apart.
//! A sweep that raises the trace error is discarded (the candidate
//! resets to the best seen) and the step damping halves.

use log::debug;
use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::RetrievalError;
use crate::numeric::{best_scale, gaussian_smooth};
use crate::pnps::DscanModel;
use crate::pulse::Pulse;
use crate::types::MeasurementTrace;

use super::{RetrievalOptions, RetrievalResult};

const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

/// The COPRA phase retriever for one forward model.
pub struct Retriever<'a> {
    model: &'a DscanModel,
    options: RetrievalOptions,
}

impl<'a> Retriever<'a> {
    pub fn new(model: &'a DscanModel, options: RetrievalOptions) -> Result<Self, RetrievalError> {
        if options.max_iterations == 0 {
            return Err(RetrievalError::Configuration(
                "max_iterations must be at least 1".into(),
            ));
        }
        if options.tolerance < 0.0 || options.phase_max < 0.0 {
            return Err(RetrievalError::Configuration(
                "tolerance and phase_max must be non-negative".into(),
            ));
        }
        Ok(Self { model, options })
    }

    /// Initial candidate: the Fourier-limited amplitude perturbed by a
    /// random smooth spectral phase of bounded peak magnitude. Seeding
    /// away from the exact trivial solution validates genuine
    /// convergence.
    pub fn initial_guess(&self, fourier_limit: &Pulse) -> Array1<Complex64> {
        let n = fourier_limit.spectrum.len();
        let mut rng = StdRng::seed_from_u64(self.options.seed);
        let noise: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let smooth = gaussian_smooth(&noise, n as f64 / 64.0);
        let peak = smooth.iter().fold(0.0_f64, |a, &v| a.max(v.abs()));
        let scale = if peak > 0.0 {
            self.options.phase_max / peak
        } else {
            0.0
        };
        Array1::from_iter(
            fourier_limit
                .spectrum
                .iter()
                .zip(&smooth)
                .map(|(&amp, &phi)| amp * Complex64::from_polar(1.0, scale * phi)),
        )
    }

    /// Run the retrieval against a preprocessed measured trace.
    ///
    /// The trace must live on the model's process frequency axis. An
    /// all-zero trace fails fast; reaching the iteration cap without
    /// meeting the tolerance is reported through
    /// [`RetrievalResult::converged`], not an error.
    pub fn retrieve(
        &self,
        measured: &MeasurementTrace,
        initial: &Array1<Complex64>,
    ) -> Result<RetrievalResult, RetrievalError> {
        let n = self.model.grid().len();
        if measured.axis.len() != n {
            return Err(RetrievalError::ShapeMismatch(format!(
                "trace has {} spectral samples but the grid has {}",
                measured.axis.len(),
                n
            )));
        }
        if initial.len() != n {
            return Err(RetrievalError::ShapeMismatch(format!(
                "initial spectrum has {} samples but the grid has {}",
                initial.len(),
                n
            )));
        }
        let trace_peak = measured.peak();
        if trace_peak <= 0.0 {
            return Err(RetrievalError::DegenerateData(
                "measured trace is all zero; nothing to retrieve".into(),
            ));
        }

        let masks: Vec<Array1<Complex64>> = measured
            .parameter
            .iter()
            .map(|&z| self.model.mask(z))
            .collect();

        let mut spectrum = initial.clone();
        let mut best = spectrum.clone();
        let mut best_error = f64::INFINITY;
        let mut best_mu = 1.0;
        let mut errors = Vec::with_capacity(self.options.max_iterations);
        let mut damping = 1.0;
        let mut converged = false;
        let mut previous: Option<f64> = None;
        let mut iterations = 0;

        for iteration in 0..self.options.max_iterations {
            let simulated = self.simulate_trace(&masks, &spectrum);
            let (error, mut mu) = trace_error(&measured.intensity, &simulated, trace_peak);
            errors.push(error);
            iterations = iteration + 1;
            debug!("iteration {iterations}: trace error {error:.3e}");

            if error < best_error {
                best_error = error;
                best_mu = mu;
                best.assign(&spectrum);
            } else {
                // Discard the ascending step and try again more gently.
                spectrum.assign(&best);
                mu = best_mu;
                damping *= 0.5;
            }

            if let Some(prev) = previous {
                if (prev - error).abs() < self.options.tolerance {
                    converged = true;
                    break;
                }
            }
            previous = Some(error);

            self.sweep(&mut spectrum, measured, &masks, mu, damping);
        }

        let mut parameter_spectra = Array2::zeros((masks.len(), n));
        for (i, mask) in masks.iter().enumerate() {
            parameter_spectra.row_mut(i).assign(&(&best * mask));
        }

        Ok(RetrievalResult {
            spectrum: best,
            errors,
            iterations,
            converged,
            parameter: measured.parameter.clone(),
            parameter_spectra,
        })
    }

    fn simulate_trace(
        &self,
        masks: &[Array1<Complex64>],
        spectrum: &Array1<Complex64>,
    ) -> Array2<f64> {
        let n = self.model.grid().len();
        let mut out = Array2::zeros((masks.len(), n));
        for (mask, mut row) in masks.iter().zip(out.rows_mut()) {
            row.assign(&self.model.simulate_masked(spectrum, mask).intensity());
        }
        out
    }

    /// One projection/gradient pass over all scan positions.
    fn sweep(
        &self,
        spectrum: &mut Array1<Complex64>,
        measured: &MeasurementTrace,
        masks: &[Array1<Complex64>],
        mu: f64,
        damping: f64,
    ) {
        let grid = self.model.grid();
        let dt = grid.dt();
        let dw = grid.dw();
        // Adjoints of the grid's transform pair differ from the inverse
        // transforms only by these scalars.
        let adj_forward = TWO_PI * dt / dw;
        let adj_backward = dw / (TWO_PI * dt);
        let process = self.model.process();
        let ft = self.model.transform();

        for (m, mask) in masks.iter().enumerate() {
            let sim = self.model.simulate_masked(spectrum, mask);
            let signal = &sim.signal_spectrum;

            // Magnitude projection onto the measured slice.
            let mut residual = Array1::<Complex64>::zeros(signal.len());
            let mut distance = 0.0;
            for (j, &s) in signal.iter().enumerate() {
                let target = (measured.intensity[[m, j]].max(0.0) / mu).sqrt();
                let norm = s.norm();
                let projected = if norm > 0.0 {
                    s * (target / norm)
                } else {
                    Complex64::from(target)
                };
                let d = s - projected;
                distance += d.norm_sqr();
                residual[j] = d;
            }
            if distance <= 0.0 {
                continue;
            }

            // Back-propagate: signal spectrum -> signal time -> field
            // time -> candidate spectrum (through the conjugate mask).
            let residual_t = ft
                .backward(residual.as_slice().expect("contiguous residual"))
                .mapv(|c| c * adj_forward);
            let gradient_t = process.gradient(&sim.time_field, &residual_t);
            let gradient_w = ft
                .forward(gradient_t.as_slice().expect("contiguous gradient"))
                .mapv(|c| c * adj_backward);

            let mut norm_sq = 0.0;
            let mut gradient = Array1::<Complex64>::zeros(signal.len());
            for (j, (&g, msk)) in gradient_w.iter().zip(mask).enumerate() {
                let gj = msk.conj() * g;
                norm_sq += gj.norm_sqr();
                gradient[j] = gj;
            }
            if norm_sq <= 0.0 {
                continue;
            }

            let step = damping * distance / norm_sq;
            for (s, &g) in spectrum.iter_mut().zip(&gradient) {
                *s -= step * g;
            }
        }
    }
}

/// Scale-optimal normalised trace error
/// $R = \sqrt{\sum (T^{meas} - \mu T^{sim})^2 / (MN)} / \max T^{meas}$.
///
/// A simulated trace with zero energy makes the optimal scale undefined;
/// `best_scale` recovers with $\mu = 1$ and the error stays finite.
fn trace_error(measured: &Array2<f64>, simulated: &Array2<f64>, peak: f64) -> (f64, f64) {
    let sim = simulated.as_slice().expect("contiguous trace");
    let meas = measured.as_slice().expect("contiguous trace");
    let mu = best_scale(sim, meas);
    // A non-positive scale (simulation orthogonal to the measurement)
    // would poison the magnitude projection; recover with unity.
    let mu = if mu > 0.0 { mu } else { 1.0 };
    let sum_sq: f64 = meas
        .iter()
        .zip(sim)
        .map(|(&t, &s)| {
            let d = t - mu * s;
            d * d
        })
        .sum();
    let r = (sum_sq / meas.len() as f64).sqrt() / peak;
    (r, mu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{FourierTransform, SpectralGrid};
    use crate::pnps::NonlinearProcess;
    use dscan_materials::Material;
    use ndarray::Array1;

    fn model() -> DscanModel {
        let grid = SpectralGrid::new(250e-9, 800e-9, 128).unwrap();
        DscanModel::new(
            FourierTransform::new(grid),
            NonlinearProcess::Shg,
            Material::Bk7,
        )
    }

    #[test]
    fn test_zero_trace_fails_before_iterating() {
        let model = model();
        let trace = MeasurementTrace::new(
            ndarray::Array2::zeros((4, 128)),
            Array1::linspace(0.0, 3e-3, 4),
            model.process_frequencies(),
        )
        .unwrap();
        let retriever = Retriever::new(&model, RetrievalOptions::default()).unwrap();
        let initial = Array1::from_elem(128, Complex64::from(1.0));
        let err = retriever.retrieve(&trace, &initial);
        assert!(matches!(err, Err(RetrievalError::DegenerateData(_))));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let model = model();
        assert!(Retriever::new(
            &model,
            RetrievalOptions {
                max_iterations: 0,
                ..Default::default()
            }
        )
        .is_err());
        assert!(Retriever::new(
            &model,
            RetrievalOptions {
                phase_max: -1.0,
                ..Default::default()
            }
        )
        .is_err());
    }

    #[test]
    fn test_initial_guess_is_deterministic_and_bounded() {
        let model = model();
        let retriever = Retriever::new(&model, RetrievalOptions::default()).unwrap();
        let mut ftl = Pulse::new(model.transform().clone());
        ftl.spectrum = model
            .grid()
            .detuning()
            .mapv(|w| Complex64::from((-w * w / (2.0 * 1e14 * 1e14)).exp()));

        let a = retriever.initial_guess(&ftl);
        let b = retriever.initial_guess(&ftl);
        assert_eq!(a, b);

        for (guess, reference) in a.iter().zip(ftl.spectrum.iter()) {
            // Amplitude untouched, phase bounded by phase_max.
            assert!((guess.norm() - reference.norm()).abs() < 1e-12);
            assert!(guess.arg().abs() <= 0.1 + 1e-12);
        }
    }

    #[test]
    fn test_trace_error_scale_invariance() {
        let meas = ndarray::array![[0.0, 1.0, 4.0], [2.0, 0.5, 0.0]];
        let sim = meas.mapv(|v| v / 3.0);
        let (r, mu) = trace_error(&meas, &sim, 4.0);
        assert!((mu - 3.0).abs() < 1e-12);
        assert!(r < 1e-12);
    }
}
