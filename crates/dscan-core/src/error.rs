//! Error taxonomy for the retrieval pipeline.
//!
//! Configuration problems (bad grid, bad options) and data problems
//! (degenerate spectra, empty crop windows) fail fast before any
//! iteration starts. Numeric degeneracies inside the loop (undefined
//! pulse duration at one scan position, a vanishing scale factor) are
//! recovered locally and never surface as errors; non-convergence is
//! reported through [`RetrievalResult::converged`](crate::retriever::RetrievalResult)
//! rather than an error, leaving acceptability to the caller.

use thiserror::Error;

/// Errors raised by grid construction, preprocessing, and retrieval.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Invalid grid: need at least 2 points, got {0}")]
    GridTooSmall(usize),

    #[error("Invalid grid: bandwidth {bandwidth:.3e} m and centre wavelength {center:.3e} m must both be positive")]
    InvalidGridSpan { bandwidth: f64, center: f64 },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Wavelength window [{low:.3e}, {high:.3e}] m leaves no samples")]
    EmptyWindow { low: f64, high: f64 },

    #[error("Degenerate data: {0}")]
    DegenerateData(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
}
