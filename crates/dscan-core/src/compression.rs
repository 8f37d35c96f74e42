//! Post-retrieval search for the best-compressed scan position.
//!
//! Every scan position has a retrieved field (the converged spectrum
//! under that position's mask). Rolling each temporal profile so its
//! peak sits at the centre sample makes the positions visually
//! comparable; the position with the smallest defined FWHM is the
//! optimal compression point.

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::error::RetrievalError;
use crate::grid::FourierTransform;
use crate::numeric::{best_scale, interp1, nrms, roll};
use crate::pulse::fwhm_of_profile;
use crate::retriever::RetrievalResult;

use dscan_materials::material::SPEED_OF_LIGHT;

/// Duration-vs-position report built from a retrieval result.
#[derive(Debug, Clone)]
pub struct CompressionReport {
    /// Scan-parameter axis (m of insertion).
    pub parameter: Array1<f64>,
    /// Pulse duration at each position (s); `None` where the profile
    /// had no defined FWHM.
    pub fwhm: Vec<Option<f64>>,
    /// Peak-centred temporal intensity per position, shape
    /// `(parameter.len(), grid.len())`.
    pub profiles: Array2<f64>,
    /// Selected position index.
    pub optimal_index: usize,
    /// Selected position (m of insertion).
    pub optimal_parameter: f64,
    /// Duration at the selected position, when defined.
    pub optimal_fwhm: Option<f64>,
}

/// Build the compression report.
///
/// With `target` unset, the index with the minimum defined FWHM wins
/// (ties break to the lowest index); positions with an undefined FWHM
/// are excluded, not fatal. With `target` set, the nearest axis index is
/// selected instead of searching.
pub fn compression_search(
    ft: &FourierTransform,
    result: &RetrievalResult,
    target: Option<f64>,
    oversampling: usize,
) -> Result<CompressionReport, RetrievalError> {
    let n = ft.grid().len();
    let dt = ft.grid().dt();
    let mid = n / 2;
    let positions = result.parameter.len();
    if positions == 0 {
        return Err(RetrievalError::DegenerateData(
            "retrieval result has no scan positions".into(),
        ));
    }

    let mut profiles = Array2::zeros((positions, n));
    let mut fwhm = Vec::with_capacity(positions);
    for i in 0..positions {
        let spectrum: Vec<Complex64> = result.parameter_spectra.row(i).to_vec();
        let field = ft.backward(&spectrum);
        let profile: Vec<f64> = field.iter().map(|c| c.norm_sqr()).collect();

        let imax = profile
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap_or(0);
        let centred = roll(&profile, mid as isize - imax as isize);

        fwhm.push(fwhm_of_profile(&centred, dt, oversampling));
        profiles.row_mut(i).assign(&Array1::from(centred));
    }

    let optimal_index = match target {
        Some(t) => {
            let mut idx = 0;
            let mut dist = f64::INFINITY;
            for (i, &p) in result.parameter.iter().enumerate() {
                if (p - t).abs() < dist {
                    dist = (p - t).abs();
                    idx = i;
                }
            }
            idx
        }
        None => {
            let mut idx = None;
            let mut shortest = f64::INFINITY;
            for (i, duration) in fwhm.iter().enumerate() {
                if let Some(d) = duration {
                    if *d < shortest {
                        shortest = *d;
                        idx = Some(i);
                    }
                }
            }
            idx.ok_or_else(|| {
                RetrievalError::DegenerateData(
                    "no scan position has a defined pulse duration".into(),
                )
            })?
        }
    };

    Ok(CompressionReport {
        parameter: result.parameter.clone(),
        optimal_parameter: result.parameter[optimal_index],
        optimal_fwhm: fwhm[optimal_index],
        fwhm,
        profiles,
        optimal_index,
    })
}

/// Normalised RMS difference between the retrieved spectrum and the
/// measured fundamental, after optimal amplitude scaling.
///
/// The retrieved spectral intensity is interpolated onto the measured
/// wavelength axis (undoing the per-frequency density Jacobian) before
/// the comparison; the returned value is a goodness-of-fit diagnostic,
/// not part of the optimisation.
pub fn spectrum_fit_error(
    ft: &FourierTransform,
    spectrum: &Array1<Complex64>,
    wavelength_m: &[f64],
    measured: &[f64],
) -> f64 {
    let omega = ft.grid().omega().to_vec();
    let intensity: Vec<f64> = spectrum.iter().map(|c| c.norm_sqr()).collect();

    let retrieved: Vec<f64> = wavelength_m
        .iter()
        .map(|&lam| {
            let w = 2.0 * std::f64::consts::PI * SPEED_OF_LIGHT / lam;
            interp1(&omega, &intensity, w, 0.0) / (lam * lam)
        })
        .collect();

    let scaled: Vec<f64> = {
        let scale = best_scale(measured, &retrieved);
        measured.iter().map(|&v| v * scale).collect()
    };
    nrms(&scaled, &retrieved)
}
