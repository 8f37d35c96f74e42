//! # D-scan Core
//!
//! The numerical backbone of the d-scan pulse-characterisation pipeline.
//! This crate reconstructs the complex temporal/spectral shape of an
//! ultrashort pulse from a measured fundamental spectrum and a 2D
//! dispersion-scan trace.
//!
//! ## Pipeline
//!
//! Raw spectrum + raw trace → [`preprocess`] → preprocessed trace;
//! [`grid`] + cleaned fundamental → Fourier-limited [`pulse`];
//! pulse + material + process → [`pnps`] forward model; the
//! [`retriever`] drives the model against the measured trace, and
//! [`compression`] turns the per-position result into the final
//! duration-vs-insertion report.
//!
//! ## Modules
//!
//! - [`grid`] — Frequency/time sampling axes and the transform pair.
//! - [`pulse`] — Complex spectral field, FWHM, Fourier limit.
//! - [`types`] — Measurement trace container.
//! - [`preprocess`] — Background subtraction, cropping, resampling.
//! - [`pnps`] — Parametrised nonlinear-process forward model.
//! - [`retriever`] — COPRA alternating-projection optimiser.
//! - [`compression`] — Shortest-duration search and fit diagnostics.
//! - [`numeric`] — Interpolation, fits, smoothing, error norms.

pub mod compression;
pub mod error;
pub mod grid;
pub mod numeric;
pub mod pnps;
pub mod preprocess;
pub mod pulse;
pub mod retriever;
pub mod types;

pub use error::RetrievalError;
