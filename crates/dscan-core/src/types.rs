//! Shared data containers for the retrieval pipeline.

use ndarray::{Array1, Array2};

use crate::error::RetrievalError;

/// A 2D scan measurement: intensity versus (scan parameter, spectral axis).
///
/// The same container carries both lifecycle stages of a trace. Raw
/// traces use instrument units (stage position, wavelength); preprocessed
/// traces use physical insertion and the retrieval grid's process
/// frequency axis. The stages are distinct snapshots; preprocessing
/// builds a new trace rather than mutating its input.
#[derive(Debug, Clone)]
pub struct MeasurementTrace {
    /// Intensity samples, shape `(parameter.len(), axis.len())`.
    pub intensity: Array2<f64>,
    /// Scan-parameter axis (stage position or insertion, m).
    pub parameter: Array1<f64>,
    /// Spectral axis (wavelength or angular frequency).
    pub axis: Array1<f64>,
}

impl MeasurementTrace {
    pub fn new(
        intensity: Array2<f64>,
        parameter: Array1<f64>,
        axis: Array1<f64>,
    ) -> Result<Self, RetrievalError> {
        if intensity.nrows() != parameter.len() || intensity.ncols() != axis.len() {
            return Err(RetrievalError::ShapeMismatch(format!(
                "trace is {}x{} but axes are {} parameters x {} spectral samples",
                intensity.nrows(),
                intensity.ncols(),
                parameter.len(),
                axis.len()
            )));
        }
        Ok(Self {
            intensity,
            parameter,
            axis,
        })
    }

    /// Largest intensity sample.
    pub fn peak(&self) -> f64 {
        self.intensity.iter().fold(0.0_f64, |acc, &v| acc.max(v))
    }
}
