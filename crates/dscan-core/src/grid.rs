//! Paired frequency/time sampling grids and the Fourier transform
//! between them.
//!
//! The retrieval works on an angular-frequency detuning axis
//! $\omega_n = w_0 + n\,\Delta\omega$ centred on zero and the matching
//! time axis $t_k = (k - N/2)\,\Delta t$ with
//! $\Delta t = 2\pi / (N \Delta\omega)$. With that pairing the transforms
//!
//! $$ S_n = \Delta t \sum_k E_k\, e^{-i \omega_n t_k}, \qquad
//!    E_k = \frac{\Delta\omega}{2\pi} \sum_n S_n\, e^{+i \omega_n t_k} $$
//!
//! are exact inverses of each other. Every pulse and trace in a retrieval
//! run shares one grid; the sampling is fixed for the run's lifetime.

use std::sync::Arc;

use ndarray::Array1;
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use dscan_materials::material::SPEED_OF_LIGHT;

use crate::error::RetrievalError;

const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

/// Uniform angular-frequency grid with its derived time axis.
#[derive(Debug, Clone, Copy)]
pub struct SpectralGrid {
    n: usize,
    dw: f64,
    w0: f64,
    dt: f64,
    center_wavelength: f64,
    carrier: f64,
}

impl SpectralGrid {
    /// Build a grid spanning `bandwidth_m` of wavelength around
    /// `center_wavelength_m` with `points` samples.
    ///
    /// The wavelength span converts to angular frequency via
    /// $\Delta\omega = \Delta\lambda \cdot 2\pi c / \lambda_0^2$; the
    /// step is rounded to an integer number of rad/s (sub-rad/s grids
    /// keep the exact step).
    pub fn new(
        bandwidth_m: f64,
        center_wavelength_m: f64,
        points: usize,
    ) -> Result<Self, RetrievalError> {
        if points < 2 {
            return Err(RetrievalError::GridTooSmall(points));
        }
        if bandwidth_m <= 0.0 || center_wavelength_m <= 0.0 {
            return Err(RetrievalError::InvalidGridSpan {
                bandwidth: bandwidth_m,
                center: center_wavelength_m,
            });
        }

        let carrier = TWO_PI * SPEED_OF_LIGHT / center_wavelength_m;
        let delta_omega =
            bandwidth_m * TWO_PI * SPEED_OF_LIGHT / (center_wavelength_m * center_wavelength_m);
        let raw_dw = delta_omega / (points - 1) as f64;
        let dw = if raw_dw.round() > 0.0 { raw_dw.round() } else { raw_dw };
        let dt = TWO_PI / (points as f64 * dw);

        Ok(Self {
            n: points,
            dw,
            w0: -delta_omega / 2.0,
            dt,
            center_wavelength: center_wavelength_m,
            carrier,
        })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Frequency step (rad/s).
    pub fn dw(&self) -> f64 {
        self.dw
    }

    /// Time step (s).
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Centre (carrier) wavelength (m).
    pub fn center_wavelength(&self) -> f64 {
        self.center_wavelength
    }

    /// Carrier angular frequency $\omega_0 = 2\pi c/\lambda_0$ (rad/s).
    pub fn carrier(&self) -> f64 {
        self.carrier
    }

    /// Detuning of sample `i` from the carrier (rad/s).
    pub fn detuning_at(&self, i: usize) -> f64 {
        self.w0 + i as f64 * self.dw
    }

    /// Time of sample `k` (s), centred so `t = 0` falls at index `N/2`.
    pub fn time_at(&self, k: usize) -> f64 {
        (k as f64 - (self.n / 2) as f64) * self.dt
    }

    /// Detuning axis (rad/s).
    pub fn detuning(&self) -> Array1<f64> {
        Array1::from_iter((0..self.n).map(|i| self.detuning_at(i)))
    }

    /// Absolute angular-frequency axis, detuning plus carrier (rad/s).
    pub fn omega(&self) -> Array1<f64> {
        Array1::from_iter((0..self.n).map(|i| self.carrier + self.detuning_at(i)))
    }

    /// Time axis (s).
    pub fn times(&self) -> Array1<f64> {
        Array1::from_iter((0..self.n).map(|k| self.time_at(k)))
    }
}

/// Cached FFT plans and phase ramps implementing the grid's transform
/// convention on centred axes.
#[derive(Clone)]
pub struct FourierTransform {
    grid: SpectralGrid,
    plan_fwd: Arc<dyn Fft<f64>>,
    plan_inv: Arc<dyn Fft<f64>>,
    /// $e^{-i w_0 t_k}$ applied before the forward FFT.
    ramp_t: Vec<Complex64>,
    /// $e^{-i n \Delta\omega t_0}$ applied after the forward FFT.
    ramp_w: Vec<Complex64>,
}

impl FourierTransform {
    pub fn new(grid: SpectralGrid) -> Self {
        let mut planner = FftPlanner::new();
        let plan_fwd = planner.plan_fft_forward(grid.len());
        let plan_inv = planner.plan_fft_inverse(grid.len());

        let t0 = grid.time_at(0);
        let ramp_t = (0..grid.len())
            .map(|k| Complex64::from_polar(1.0, -grid.w0 * grid.time_at(k)))
            .collect();
        let ramp_w = (0..grid.len())
            .map(|n| Complex64::from_polar(1.0, -(n as f64) * grid.dw() * t0))
            .collect();

        Self {
            grid,
            plan_fwd,
            plan_inv,
            ramp_t,
            ramp_w,
        }
    }

    pub fn grid(&self) -> &SpectralGrid {
        &self.grid
    }

    /// Time → frequency: $S_n = \Delta t \sum_k E_k e^{-i \omega_n t_k}$.
    pub fn forward(&self, field: &[Complex64]) -> Array1<Complex64> {
        let mut buf: Vec<Complex64> = field
            .iter()
            .zip(&self.ramp_t)
            .map(|(x, r)| x * r)
            .collect();
        self.plan_fwd.process(&mut buf);
        let dt = self.grid.dt();
        Array1::from_iter(
            buf.iter()
                .zip(&self.ramp_w)
                .map(|(x, r)| x * r * dt),
        )
    }

    /// Frequency → time: $E_k = \frac{\Delta\omega}{2\pi} \sum_n S_n e^{+i \omega_n t_k}$.
    pub fn backward(&self, spectrum: &[Complex64]) -> Array1<Complex64> {
        let mut buf: Vec<Complex64> = spectrum
            .iter()
            .zip(&self.ramp_w)
            .map(|(x, r)| x * r.conj())
            .collect();
        self.plan_inv.process(&mut buf);
        let scale = self.grid.dw() / TWO_PI;
        Array1::from_iter(
            buf.iter()
                .zip(&self.ramp_t)
                .map(|(x, r)| x * r.conj() * scale),
        )
    }
}

impl std::fmt::Debug for FourierTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FourierTransform")
            .field("grid", &self.grid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fourier_sampling_identity() {
        for &(bandwidth, center, points) in &[
            (950e-9, 490e-9, 3000),
            (250e-9, 800e-9, 256),
            (100e-9, 1030e-9, 2usize),
            (50e-9, 400e-9, 17),
        ] {
            let grid = SpectralGrid::new(bandwidth, center, points).unwrap();
            assert_relative_eq!(
                grid.dt() * grid.dw() * points as f64,
                2.0 * std::f64::consts::PI,
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn test_invalid_grids_rejected() {
        assert!(matches!(
            SpectralGrid::new(950e-9, 490e-9, 1),
            Err(RetrievalError::GridTooSmall(1))
        ));
        assert!(SpectralGrid::new(-1e-9, 490e-9, 100).is_err());
        assert!(SpectralGrid::new(950e-9, 0.0, 100).is_err());
    }

    #[test]
    fn test_round_trip_identity() {
        let grid = SpectralGrid::new(250e-9, 800e-9, 128).unwrap();
        let ft = FourierTransform::new(grid);

        // A chirped Gaussian exercises both quadrants of the phase ramps.
        let field: Vec<Complex64> = grid
            .times()
            .iter()
            .map(|&t| {
                let envelope = (-t * t / (2.0 * 20e-15 * 20e-15)).exp();
                Complex64::from_polar(envelope, 1e28 * t * t)
            })
            .collect();

        let spectrum = ft.forward(&field);
        let back = ft.backward(spectrum.as_slice().unwrap());

        let peak = field.iter().map(|c| c.norm()).fold(0.0, f64::max);
        for (a, b) in field.iter().zip(back.iter()) {
            assert!((a - b).norm() < 1e-10 * peak);
        }
    }

    #[test]
    fn test_centered_gaussian_has_centered_spectrum() {
        let grid = SpectralGrid::new(250e-9, 800e-9, 256).unwrap();
        let ft = FourierTransform::new(grid);
        let field: Vec<Complex64> = grid
            .times()
            .iter()
            .map(|&t| Complex64::from((-t * t / (2.0 * 15e-15 * 15e-15)).exp()))
            .collect();
        let spectrum = ft.forward(&field);
        let imax = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(i, _)| i)
            .unwrap();
        // Transform-limited pulse at t = 0 peaks at zero detuning.
        assert!((imax as isize - (grid.len() / 2) as isize).abs() <= 1);
    }
}
