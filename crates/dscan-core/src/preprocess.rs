//! Measurement cleanup: background subtraction, cropping, axis
//! conversion, and resampling onto the retrieval grid.
//!
//! The pipeline is strictly ordered and never mutates its inputs. The
//! fundamental spectrum and the scan trace are cleaned independently on
//! their own wavelength windows; the cleaned scan is then interpolated
//! onto the forward model's process frequency axis, which is the form
//! the retriever consumes.

use ndarray::{Array1, Array2};

use dscan_materials::material::SPEED_OF_LIGHT;
use dscan_materials::Material;

use crate::error::RetrievalError;
use crate::numeric::{gaussian_blur, interp1, polyfit_linear};
use crate::types::MeasurementTrace;

/// Preprocessing parameters with the conventional defaults.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    /// Wavelength window for the fundamental spectrum (m), exclusive bounds.
    pub fundamental_window: (f64, f64),
    /// Wavelength window for the scan trace (m), exclusive bounds.
    pub scan_window: (f64, f64),
    /// Leading samples averaged for the DC offset estimate.
    pub dc_samples: usize,
    /// Samples taken from each spectral edge for the linear background fit.
    pub edge_samples: usize,
    /// Fundamental intensities below this fraction of the peak are
    /// clamped to zero after normalisation.
    pub noise_floor: f64,
    /// Leading frequency columns used to estimate the trace dark level.
    pub dark_samples: usize,
    /// Intensity assigned outside the measured range when resampling.
    pub dark_level: f64,
    /// Gaussian blur width in pixels applied to the raw trace (0 = off).
    pub blur_sigma: f64,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            fundamental_window: (400e-9, 600e-9),
            scan_window: (200e-9, 300e-9),
            dc_samples: 7,
            edge_samples: 15,
            noise_floor: 0.0025,
            dark_samples: 10,
            dark_level: 0.0,
            blur_sigma: 0.0,
        }
    }
}

/// The cleaned fundamental spectrum and its intensity-weighted centre.
#[derive(Debug, Clone)]
pub struct CleanFundamental {
    pub wavelength: Array1<f64>,
    pub intensity: Array1<f64>,
    pub center_wavelength: f64,
}

impl Preprocessor {
    /// Clean a raw fundamental spectrum.
    ///
    /// Order: DC offset from the first [`dc_samples`](Self::dc_samples)
    /// samples, wavelength crop, centre-wavelength estimate, linear
    /// edge-background removal, unit-peak normalisation, noise-floor
    /// clamp.
    pub fn clean_fundamental(
        &self,
        wavelength_m: &[f64],
        intensity: &[f64],
    ) -> Result<CleanFundamental, RetrievalError> {
        if wavelength_m.len() != intensity.len() || wavelength_m.is_empty() {
            return Err(RetrievalError::ShapeMismatch(format!(
                "{} wavelengths vs {} intensities",
                wavelength_m.len(),
                intensity.len()
            )));
        }

        let dc = if self.dc_samples > 0 {
            let k = self.dc_samples.min(intensity.len());
            intensity[..k].iter().sum::<f64>() / k as f64
        } else {
            0.0
        };

        let (low, high) = self.fundamental_window;
        let mut wl = Vec::new();
        let mut spec = Vec::new();
        for (&lam, &i) in wavelength_m.iter().zip(intensity) {
            if lam > low && lam < high {
                wl.push(lam);
                spec.push(i - dc);
            }
        }
        if wl.is_empty() {
            return Err(RetrievalError::EmptyWindow { low, high });
        }

        let total: f64 = spec.iter().sum();
        if total <= 0.0 {
            return Err(RetrievalError::DegenerateData(
                "fundamental spectrum has no energy after background subtraction".into(),
            ));
        }
        let center_wavelength =
            wl.iter().zip(&spec).map(|(&l, &i)| l * i).sum::<f64>() / total;

        subtract_edge_background(&wl, &mut spec, self.edge_samples);

        let peak = spec.iter().fold(f64::MIN, |a, &v| a.max(v));
        if peak <= 0.0 {
            return Err(RetrievalError::DegenerateData(
                "fundamental spectrum has no positive peak".into(),
            ));
        }
        for v in &mut spec {
            *v /= peak;
            if *v < self.noise_floor {
                *v = 0.0;
            }
        }

        Ok(CleanFundamental {
            wavelength: Array1::from(wl),
            intensity: Array1::from(spec),
            center_wavelength,
        })
    }

    /// First cleanup stage of a raw scan trace (stage position axis,
    /// wavelength axis).
    ///
    /// Order: unit global peak, optional Gaussian blur, wavelength crop,
    /// per-row linear edge-background removal, stage-to-insertion axis
    /// conversion `coefficient(wedge) · (position − min)`.
    pub fn clean_scan(
        &self,
        raw: &MeasurementTrace,
        material: Material,
        wedge_angle_deg: f64,
    ) -> Result<MeasurementTrace, RetrievalError> {
        let peak = raw.peak();
        if peak <= 0.0 {
            return Err(RetrievalError::DegenerateData(
                "scan trace has no energy".into(),
            ));
        }
        let mut intensity = raw.intensity.mapv(|v| v / peak);
        if self.blur_sigma > 0.0 {
            intensity = gaussian_blur(&intensity, self.blur_sigma);
        }

        let (low, high) = self.scan_window;
        let keep: Vec<usize> = raw
            .axis
            .iter()
            .enumerate()
            .filter(|(_, &lam)| lam > low && lam < high)
            .map(|(j, _)| j)
            .collect();
        if keep.is_empty() {
            return Err(RetrievalError::EmptyWindow { low, high });
        }

        let wl: Vec<f64> = keep.iter().map(|&j| raw.axis[j]).collect();
        let mut cropped = Array2::zeros((raw.parameter.len(), keep.len()));
        for (i, mut row) in cropped.rows_mut().into_iter().enumerate() {
            let mut values: Vec<f64> = keep.iter().map(|&j| intensity[[i, j]]).collect();
            subtract_edge_background(&wl, &mut values, self.edge_samples);
            row.assign(&Array1::from(values));
        }

        let min_pos = raw.parameter.iter().copied().fold(f64::INFINITY, f64::min);
        let coefficient = material.coefficient(wedge_angle_deg);
        let insertion = raw.parameter.mapv(|p| coefficient * (p - min_pos));

        MeasurementTrace::new(cropped, insertion, Array1::from(wl))
    }

    /// Second stage: interpolate a cleaned scan onto the model's process
    /// frequency axis.
    ///
    /// The dark level estimated from the first
    /// [`dark_samples`](Self::dark_samples) wavelength columns is
    /// subtracted, wavelengths convert to angular frequency with the
    /// $\lambda^2$ density Jacobian, samples outside the measured range
    /// take [`dark_level`](Self::dark_level), and the result is clamped
    /// non-negative and renormalised to unit peak.
    pub fn resample(
        &self,
        clean: &MeasurementTrace,
        process_frequencies: &Array1<f64>,
    ) -> Result<MeasurementTrace, RetrievalError> {
        let n_axis = clean.axis.len();
        let dark = if self.dark_samples > 0 {
            let k = self.dark_samples.min(n_axis);
            clean.intensity.slice(ndarray::s![.., ..k]).mean().unwrap_or(0.0)
        } else {
            0.0
        };

        // Wavelength-ascending is frequency-descending; build ascending
        // frequency rows with the per-frequency density conversion.
        let omega: Vec<f64> = (0..n_axis)
            .rev()
            .map(|j| 2.0 * std::f64::consts::PI * SPEED_OF_LIGHT / clean.axis[j])
            .collect();

        let mut resampled = Array2::zeros((clean.parameter.len(), process_frequencies.len()));
        for (i, mut out_row) in resampled.rows_mut().into_iter().enumerate() {
            let values: Vec<f64> = (0..n_axis)
                .rev()
                .map(|j| {
                    let lam = clean.axis[j];
                    (clean.intensity[[i, j]] - dark).max(0.0) * lam * lam
                })
                .collect();
            let row: Vec<f64> = process_frequencies
                .iter()
                .map(|&w| interp1(&omega, &values, w, self.dark_level))
                .collect();
            out_row.assign(&Array1::from(row));
        }

        let peak = resampled.iter().fold(0.0_f64, |a, &v| a.max(v));
        if peak <= 0.0 {
            return Err(RetrievalError::DegenerateData(
                "scan trace has no energy on the retrieval grid; check the wavelength windows"
                    .into(),
            ));
        }
        resampled.mapv_inplace(|v| (v / peak).max(0.0));

        MeasurementTrace::new(
            resampled,
            clean.parameter.clone(),
            process_frequencies.clone(),
        )
    }
}

/// Fit a first-degree polynomial to `edge_samples` points at both ends
/// of the spectrum and subtract it from the full row. Removes a slowly
/// varying detector offset without assuming a flat baseline.
fn subtract_edge_background(wavelength: &[f64], values: &mut [f64], edge_samples: usize) {
    let n = values.len();
    let k = edge_samples.min(n / 2);
    if k == 0 {
        return;
    }
    let mut xs = Vec::with_capacity(2 * k);
    let mut ys = Vec::with_capacity(2 * k);
    for j in 0..k {
        xs.push(wavelength[j]);
        ys.push(values[j]);
    }
    for j in n - k..n {
        xs.push(wavelength[j]);
        ys.push(values[j]);
    }
    let (slope, intercept) = polyfit_linear(&xs, &ys);
    for (v, &lam) in values.iter_mut().zip(wavelength) {
        *v -= slope * lam + intercept;
    }
}
