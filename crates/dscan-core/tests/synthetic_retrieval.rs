//! End-to-end retrieval of a synthetic chirped pulse from a noise-free
//! SHG d-scan trace.
//!
//! A Gaussian spectrum with a known quadratic spectral phase is pushed
//! through the forward model over a BK7 insertion axis; the retriever
//! must recover the pulse up to the known ambiguities (constant and
//! linear spectral phase), and the compression search must locate the
//! insertion that compensates the chirp.

use ndarray::Array1;
use num_complex::Complex64;

use dscan_core::compression::{compression_search, spectrum_fit_error};
use dscan_core::grid::{FourierTransform, SpectralGrid};
use dscan_core::numeric::{best_scale, nrms};
use dscan_core::pnps::{DscanModel, NonlinearProcess};
use dscan_core::pulse::Pulse;
use dscan_core::retriever::{RetrievalOptions, Retriever};
use dscan_core::types::MeasurementTrace;
use dscan_materials::Material;

const SIGMA_W: f64 = 1.1e14; // rad/s
const GDD: f64 = -1.2e-26; // s², compensated by ~2.7 mm of BK7

fn setup() -> (FourierTransform, DscanModel) {
    // Wide bandwidth for fine time sampling, enough points that the
    // quadratic phase advances by well under π between samples.
    let grid = SpectralGrid::new(1600e-9, 800e-9, 1024).unwrap();
    let ft = FourierTransform::new(grid);
    let model = DscanModel::new(ft.clone(), NonlinearProcess::Shg, Material::Bk7);
    (ft, model)
}

fn true_spectrum(grid: &SpectralGrid) -> Array1<Complex64> {
    grid.detuning().mapv(|w| {
        let amplitude = (-w * w / (2.0 * SIGMA_W * SIGMA_W)).exp();
        Complex64::from_polar(amplitude, 0.5 * GDD * w * w)
    })
}

/// Weighted group-delay-dispersion estimate from the second phase
/// difference, insensitive to the constant/linear phase ambiguities.
fn estimate_gdd(spectrum: &Array1<Complex64>, dw: f64) -> f64 {
    let peak = spectrum.iter().map(|c| c.norm_sqr()).fold(0.0, f64::max);
    let mut num = 0.0;
    let mut den = 0.0;
    for i in 1..spectrum.len() - 1 {
        let weight = spectrum[i].norm_sqr();
        if weight < 0.1 * peak {
            continue;
        }
        let curvature =
            (spectrum[i + 1] * spectrum[i - 1] * spectrum[i].conj() * spectrum[i].conj()).arg();
        num += weight * curvature;
        den += weight;
    }
    num / den / (dw * dw)
}

#[test]
fn test_retrieves_chirped_pulse_from_noise_free_trace() {
    let (ft, model) = setup();
    let grid = *ft.grid();
    let truth = true_spectrum(&grid);

    let insertion = Array1::linspace(0.0, 5e-3, 32);
    let measured = MeasurementTrace::new(
        model.trace(&truth, &insertion),
        insertion.clone(),
        model.process_frequencies(),
    )
    .unwrap();

    // Fourier limit of the measured spectrum seeds the retrieval.
    let mut ftl = Pulse::new(ft.clone());
    ftl.spectrum = truth.mapv(|c| Complex64::from(c.norm()));
    let ftl_duration = ftl.fwhm(100).unwrap();

    let options = RetrievalOptions {
        max_iterations: 80,
        tolerance: 1e-8,
        phase_max: 0.1,
        seed: 7,
    };
    let retriever = Retriever::new(&model, options).unwrap();
    let initial = retriever.initial_guess(&ftl);
    let result = retriever.retrieve(&measured, &initial).unwrap();

    // Noise-free traces retrieve essentially exactly.
    assert!(
        result.final_error() < 2e-3,
        "trace error stayed at {:.3e}",
        result.final_error()
    );
    assert!(!result.errors.is_empty());

    // Retrieved spectral intensity matches the fundamental.
    let retrieved_intensity: Vec<f64> = result.spectrum.iter().map(|c| c.norm_sqr()).collect();
    let true_intensity: Vec<f64> = truth.iter().map(|c| c.norm_sqr()).collect();
    let scale = best_scale(&retrieved_intensity, &true_intensity);
    let scaled: Vec<f64> = retrieved_intensity.iter().map(|v| v * scale).collect();
    assert!(
        nrms(&scaled, &true_intensity) < 0.05,
        "spectral intensity mismatch {:.3e}",
        nrms(&scaled, &true_intensity)
    );

    // The quadratic phase is recovered up to the constant/linear
    // ambiguities.
    let gdd = estimate_gdd(&result.spectrum, grid.dw());
    assert!(
        (gdd - GDD).abs() < 0.2 * GDD.abs(),
        "retrieved GDD {gdd:.3e} vs injected {GDD:.3e}"
    );

    // Compression search: the optimum compensates the chirp with the
    // expected BK7 insertion (|GDD| / k'' with k'' ≈ 44.6 fs²/mm) and
    // reaches the Fourier limit.
    let report = compression_search(&ft, &result, None, 100).unwrap();
    let expected_insertion = 2.69e-3;
    assert!(
        (report.optimal_parameter - expected_insertion).abs() < 0.4e-3,
        "optimal insertion {:.3e}",
        report.optimal_parameter
    );
    let shortest = report.optimal_fwhm.unwrap();
    assert!(
        (shortest - ftl_duration).abs() < 0.07 * ftl_duration,
        "shortest duration {:.3e} vs Fourier limit {:.3e}",
        shortest,
        ftl_duration
    );

    // At zero insertion the retrieved duration matches the chirped
    // input's duration.
    let mut chirped = Pulse::new(ft.clone());
    chirped.spectrum = truth.clone();
    let true_duration = chirped.fwhm(100).unwrap();
    let retrieved_duration = report.fwhm[0].unwrap();
    assert!(
        (retrieved_duration - true_duration).abs() < 0.07 * true_duration,
        "zero-insertion duration {:.3e} vs true {:.3e}",
        retrieved_duration,
        true_duration
    );
}

#[test]
fn test_error_history_is_recorded_and_bounded() {
    let (ft, model) = setup();
    let grid = *ft.grid();
    let truth = true_spectrum(&grid);

    let insertion = Array1::linspace(0.0, 5e-3, 16);
    let measured = MeasurementTrace::new(
        model.trace(&truth, &insertion),
        insertion,
        model.process_frequencies(),
    )
    .unwrap();

    let mut ftl = Pulse::new(ft);
    ftl.spectrum = truth.mapv(|c| Complex64::from(c.norm()));

    let options = RetrievalOptions {
        max_iterations: 12,
        tolerance: 0.0,
        ..Default::default()
    };
    let retriever = Retriever::new(&model, options).unwrap();
    let initial = retriever.initial_guess(&ftl);
    let result = retriever.retrieve(&measured, &initial).unwrap();

    assert_eq!(result.errors.len(), 12);
    assert_eq!(result.iterations, 12);
    // Best-so-far is returned: the reported error is the history minimum.
    let min = result.errors.iter().copied().fold(f64::INFINITY, f64::min);
    assert_eq!(result.final_error(), min);
    // With zero tolerance the run uses the full budget and reports
    // non-convergence; the result is still usable.
    assert!(!result.converged);
}

#[test]
fn test_spectrum_fit_diagnostic_on_retrieved_result() {
    let (ft, model) = setup();
    let grid = *ft.grid();
    let truth = true_spectrum(&grid);

    // Express the true spectrum as a wavelength-sampled measurement.
    let wavelengths: Vec<f64> = (0..400).map(|i| 700e-9 + i as f64 * 0.5e-9).collect();
    let omega = grid.omega().to_vec();
    let intensity: Vec<f64> = truth.iter().map(|c| c.norm_sqr()).collect();
    let measured: Vec<f64> = wavelengths
        .iter()
        .map(|&lam| {
            let w = 2.0 * std::f64::consts::PI * 2.99792458e8 / lam;
            dscan_core::numeric::interp1(&omega, &intensity, w, 0.0) / (lam * lam)
        })
        .collect();

    let insertion = Array1::linspace(0.0, 5e-3, 16);
    let trace = MeasurementTrace::new(
        model.trace(&truth, &insertion),
        insertion,
        model.process_frequencies(),
    )
    .unwrap();

    let mut ftl = Pulse::new(ft.clone());
    ftl.spectrum = truth.mapv(|c| Complex64::from(c.norm()));
    let retriever = Retriever::new(
        &model,
        RetrievalOptions {
            max_iterations: 40,
            ..Default::default()
        },
    )
    .unwrap();
    let initial = retriever.initial_guess(&ftl);
    let result = retriever.retrieve(&trace, &initial).unwrap();

    let err = spectrum_fit_error(&ft, &result.spectrum, &wavelengths, &measured);
    assert!(err < 0.05, "spectrum fit error {err:.3e}");
}
