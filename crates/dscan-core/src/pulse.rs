//! Complex spectral field of a pulse on a shared grid.
//!
//! The spectrum is the owned quantity; the time-domain field is always
//! derived by the grid's backward transform, so the two can never drift
//! out of step.

use ndarray::Array1;
use num_complex::Complex64;

use dscan_materials::material::SPEED_OF_LIGHT;

use crate::error::RetrievalError;
use crate::grid::FourierTransform;
use crate::numeric::interp1;

/// A pulse as a complex spectral amplitude over a [`SpectralGrid`](crate::grid::SpectralGrid).
#[derive(Debug, Clone)]
pub struct Pulse {
    ft: FourierTransform,
    pub spectrum: Array1<Complex64>,
}

impl Pulse {
    /// A pulse with zero spectral amplitude.
    pub fn new(ft: FourierTransform) -> Self {
        let n = ft.grid().len();
        Self {
            ft,
            spectrum: Array1::zeros(n),
        }
    }

    /// Build the Fourier-limited pulse from a measured spectrum given as
    /// intensity per wavelength.
    ///
    /// The intensity is converted to a per-frequency density with the
    /// $\lambda^2$ Jacobian, square-rooted into an amplitude, and
    /// interpolated onto the grid's absolute frequency axis with zero
    /// fill; the spectral phase is flat. `wavelength_m` must be
    /// ascending.
    pub fn from_wavelength_spectrum(
        ft: FourierTransform,
        wavelength_m: &[f64],
        intensity: &[f64],
    ) -> Result<Self, RetrievalError> {
        if wavelength_m.len() != intensity.len() || wavelength_m.is_empty() {
            return Err(RetrievalError::ShapeMismatch(format!(
                "{} wavelengths vs {} intensities",
                wavelength_m.len(),
                intensity.len()
            )));
        }

        // Wavelength-ascending becomes frequency-descending; reverse while
        // applying the Jacobian.
        let m = wavelength_m.len();
        let mut omega = Vec::with_capacity(m);
        let mut amplitude = Vec::with_capacity(m);
        for j in (0..m).rev() {
            let lam = wavelength_m[j];
            omega.push(2.0 * std::f64::consts::PI * SPEED_OF_LIGHT / lam);
            amplitude.push((intensity[j].max(0.0) * lam * lam).sqrt());
        }

        let spectrum: Array1<Complex64> = ft
            .grid()
            .omega()
            .iter()
            .map(|&w| Complex64::from(interp1(&omega, &amplitude, w, 0.0)))
            .collect();

        if spectrum.iter().all(|c| c.norm_sqr() == 0.0) {
            return Err(RetrievalError::DegenerateData(
                "fundamental spectrum carries no energy on the retrieval grid".into(),
            ));
        }

        Ok(Self { ft, spectrum })
    }

    pub fn transform(&self) -> &FourierTransform {
        &self.ft
    }

    /// Time-domain field, recomputed from the spectrum on demand.
    pub fn field(&self) -> Array1<Complex64> {
        self.ft.backward(self.spectrum.as_slice().expect("contiguous spectrum"))
    }

    pub fn temporal_intensity(&self) -> Array1<f64> {
        self.field().mapv(|c| c.norm_sqr())
    }

    pub fn spectral_intensity(&self) -> Array1<f64> {
        self.spectrum.mapv(|c| c.norm_sqr())
    }

    pub fn spectral_phase(&self) -> Array1<f64> {
        self.spectrum.mapv(|c| c.arg())
    }

    /// Full width at half maximum of the temporal intensity (s).
    ///
    /// Sub-sample accuracy comes from linear interpolation on a grid
    /// refined by `oversampling` (the conventional choice is 100).
    /// Returns `None` for profiles without two half-maximum crossings.
    pub fn fwhm(&self, oversampling: usize) -> Option<f64> {
        let intensity = self.temporal_intensity();
        fwhm_of_profile(
            intensity.as_slice().expect("contiguous intensity"),
            self.ft.grid().dt(),
            oversampling,
        )
    }
}

/// FWHM of a sampled intensity profile with step `dt`, refined by linear
/// interpolation to `dt / oversampling`.
///
/// `None` when the profile is non-positive or lacks a falling edge on
/// either side of its peak.
pub fn fwhm_of_profile(intensity: &[f64], dt: f64, oversampling: usize) -> Option<f64> {
    let n = intensity.len();
    if n < 3 {
        return None;
    }
    let oversampling = oversampling.max(1);

    // Resample by linear interpolation.
    let fine_len = (n - 1) * oversampling + 1;
    let fine: Vec<f64> = (0..fine_len)
        .map(|i| {
            let pos = i as f64 / oversampling as f64;
            let k = (pos.floor() as usize).min(n - 2);
            let frac = pos - k as f64;
            intensity[k] + frac * (intensity[k + 1] - intensity[k])
        })
        .collect();

    let (imax, &vmax) = fine
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    if vmax <= 0.0 {
        return None;
    }
    let half = vmax / 2.0;

    let left = (0..imax).rev().find(|&k| fine[k] < half)?;
    let right = (imax + 1..fine_len).find(|&k| fine[k] < half)?;

    let dt_fine = dt / oversampling as f64;
    Some((right - left - 1) as f64 * dt_fine)
}
