//! Retrieval runner: ties together loaders, preprocessing, the forward
//! model, the retriever, and the report writers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use dscan_core::compression::{compression_search, spectrum_fit_error, CompressionReport};
use dscan_core::grid::{FourierTransform, SpectralGrid};
use dscan_core::pnps::DscanModel;
use dscan_core::preprocess::Preprocessor;
use dscan_core::pulse::Pulse;
use dscan_core::retriever::{RetrievalOptions, RetrievalResult, Retriever};

use crate::config::JobConfig;
use crate::loader;

const FWHM_OVERSAMPLING: usize = 100;

/// Scalar results of a run, for the JSON summary and the log.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub center_wavelength_nm: f64,
    pub time_step_fs: f64,
    pub fourier_limit_fs: Option<f64>,
    pub iterations: usize,
    pub converged: bool,
    pub trace_error: f64,
    pub trace_errors: Vec<f64>,
    pub rms_spectrum_error: f64,
    pub optimal_stage_position_mm: f64,
    pub optimal_insertion_mm: f64,
    pub optimal_fwhm_fs: Option<f64>,
}

/// Run a full retrieval from a parsed job configuration.
pub fn run_retrieval(job: &JobConfig, output_override: Option<PathBuf>) -> Result<RunSummary> {
    let (fund_wavelength, fund_intensity) =
        loader::load_fundamental(Path::new(&job.input.fundamental))?;
    let raw_scan = loader::load_scan(Path::new(&job.input.scan))?;

    let preprocessor = Preprocessor {
        fundamental_window: (
            job.windows.fundamental_nm[0] * 1e-9,
            job.windows.fundamental_nm[1] * 1e-9,
        ),
        scan_window: (job.windows.scan_nm[0] * 1e-9, job.windows.scan_nm[1] * 1e-9),
        blur_sigma: job.retrieval.blur_sigma,
        ..Default::default()
    };

    let fundamental = preprocessor.clean_fundamental(&fund_wavelength, &fund_intensity)?;
    info!(
        "Fundamental center wavelength: {:.1} nm",
        fundamental.center_wavelength * 1e9
    );

    let grid = SpectralGrid::new(
        job.grid.bandwidth_nm * 1e-9,
        fundamental.center_wavelength,
        job.grid.points,
    )?;
    let ft = FourierTransform::new(grid);
    info!("Time step = {:.2} fs", grid.dt() * 1e15);

    let ftl_pulse = Pulse::from_wavelength_spectrum(
        ft.clone(),
        fundamental.wavelength.as_slice().expect("contiguous"),
        fundamental.intensity.as_slice().expect("contiguous"),
    )?;
    let fourier_limit = ftl_pulse.fwhm(FWHM_OVERSAMPLING);
    match fourier_limit {
        Some(ftl) => info!("Fourier Transform Limit (FTL): {:.1} fs", ftl * 1e15),
        None => warn!("Fourier limit undefined: fundamental has no peaked profile"),
    }

    let material = job.retrieval.material;
    let model = DscanModel::new(ft.clone(), job.retrieval.process, material);

    let clean_scan = preprocessor.clean_scan(&raw_scan, material, job.retrieval.wedge_angle_deg)?;
    let trace = preprocessor.resample(&clean_scan, &model.process_frequencies())?;

    let retriever = Retriever::new(
        &model,
        RetrievalOptions {
            max_iterations: job.retrieval.max_iterations,
            tolerance: job.retrieval.tolerance,
            phase_max: job.retrieval.phase_max,
            seed: job.retrieval.seed,
        },
    )?;
    let initial = retriever.initial_guess(&ftl_pulse);
    let result = retriever.retrieve(&trace, &initial)?;
    info!(
        "Retrieval {} after {} iterations, trace error {:.3e}",
        if result.converged {
            "converged"
        } else {
            "stopped at the iteration cap"
        },
        result.iterations,
        result.final_error()
    );

    // The stage axis is recoverable from the insertion axis through the
    // material coefficient; targets are given in stage millimetres.
    let coefficient = material.coefficient(job.retrieval.wedge_angle_deg);
    let min_position = raw_scan
        .parameter
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    let target_insertion = job
        .compression
        .target_position_mm
        .map(|mm| coefficient * (mm * 1e-3 - min_position));

    let report = compression_search(&ft, &result, target_insertion, FWHM_OVERSAMPLING)?;
    let optimal_stage_mm = (min_position + report.optimal_parameter / coefficient) * 1e3;
    match report.optimal_fwhm {
        Some(fwhm) => info!(
            "Shortest pulse: {:.1} fs at stage position {:.3} mm",
            fwhm * 1e15,
            optimal_stage_mm
        ),
        None => warn!(
            "No defined duration at the selected stage position {:.3} mm",
            optimal_stage_mm
        ),
    }

    let rms_spectrum_error = spectrum_fit_error(
        &ft,
        &result.spectrum,
        fundamental.wavelength.as_slice().expect("contiguous"),
        fundamental.intensity.as_slice().expect("contiguous"),
    );
    info!("RMS spectrum error: {:.4}", rms_spectrum_error);

    let summary = RunSummary {
        center_wavelength_nm: fundamental.center_wavelength * 1e9,
        time_step_fs: grid.dt() * 1e15,
        fourier_limit_fs: fourier_limit.map(|f| f * 1e15),
        iterations: result.iterations,
        converged: result.converged,
        trace_error: result.final_error(),
        trace_errors: result.errors.clone(),
        rms_spectrum_error,
        optimal_stage_position_mm: optimal_stage_mm,
        optimal_insertion_mm: report.optimal_parameter * 1e3,
        optimal_fwhm_fs: report.optimal_fwhm.map(|f| f * 1e15),
    };

    let out_dir = output_override.unwrap_or_else(|| PathBuf::from(&job.output.directory));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    write_fwhm_csv(
        &report,
        min_position,
        coefficient,
        &out_dir.join("fwhm_vs_position.csv"),
    )?;
    write_profiles_csv(&ft, &report, &out_dir.join("temporal_profiles.csv"))?;
    write_spectrum_csv(&ft, &result, &out_dir.join("retrieved_spectrum.csv"))?;
    if job.output.save_json {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(out_dir.join("retrieval.json"), json)?;
    }

    Ok(summary)
}

/// Duration versus scan position with a metadata header.
fn write_fwhm_csv(
    report: &CompressionReport,
    min_position: f64,
    coefficient: f64,
    path: &Path,
) -> Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(path)?;
    writeln!(file, "# d-scan retrieval — duration vs scan position")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "#")?;
    writeln!(file, "stage_position_mm,insertion_mm,fwhm_fs")?;
    for (i, fwhm) in report.fwhm.iter().enumerate() {
        let insertion = report.parameter[i];
        let stage_mm = (min_position + insertion / coefficient) * 1e3;
        match fwhm {
            Some(f) => writeln!(file, "{:.4},{:.4},{:.4}", stage_mm, insertion * 1e3, f * 1e15)?,
            None => writeln!(file, "{:.4},{:.4},nan", stage_mm, insertion * 1e3)?,
        }
    }
    info!("Duration curve written to: {}", path.display());
    Ok(())
}

/// Peak-centred temporal profiles, one column per scan position.
fn write_profiles_csv(
    ft: &FourierTransform,
    report: &CompressionReport,
    path: &Path,
) -> Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(path)?;
    writeln!(file, "# d-scan retrieval — temporal profile vs insertion")?;
    writeln!(
        file,
        "# columns: time_fs then one profile per insertion (mm): {}",
        report
            .parameter
            .iter()
            .map(|z| format!("{:.4}", z * 1e3))
            .collect::<Vec<_>>()
            .join(",")
    )?;
    let times = ft.grid().times();
    for (k, &t) in times.iter().enumerate() {
        let row = report
            .profiles
            .column(k)
            .iter()
            .map(|v| format!("{:.6e}", v))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(file, "{:.4},{}", t * 1e15, row)?;
    }
    info!("Temporal profiles written to: {}", path.display());
    Ok(())
}

/// Retrieved spectral intensity and phase on the grid's frequency axis.
fn write_spectrum_csv(
    ft: &FourierTransform,
    result: &RetrievalResult,
    path: &Path,
) -> Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(path)?;
    writeln!(file, "# d-scan retrieval — retrieved fundamental spectrum")?;
    writeln!(file, "#")?;
    writeln!(file, "omega_rad_per_s,intensity,phase_rad")?;
    for (&w, c) in ft.grid().omega().iter().zip(result.spectrum.iter()) {
        writeln!(file, "{:.6e},{:.6e},{:.6e}", w, c.norm_sqr(), c.arg())?;
    }
    info!("Retrieved spectrum written to: {}", path.display());
    Ok(())
}
