//! # D-scan Materials
//!
//! Dispersive-element models for the d-scan retrieval pipeline. A scan
//! varies the insertion of a known dispersive element; these models supply
//! the two quantities the rest of the pipeline needs:
//!
//! - the **stage coefficient** converting raw stage displacement into
//!   effective physical insertion ([`Material::coefficient`]), and
//! - the **dispersive wavenumber** $\kappa(\omega)$, the spectral phase
//!   accrued per metre of insertion ([`Material::dispersive_wavenumber`]).
//!
//! ## Available elements
//!
//! | Identifier | Variant | Dispersion law |
//! |-----------|---------|----------------|
//! | `FS` | [`Material::FusedSilica`] | Sellmeier (Malitson 1965) |
//! | `BK7` | [`Material::Bk7`] | Sellmeier (SCHOTT N-BK7) |
//! | `grating-a` | [`Material::GratingA`] | Treacy pair, 600 mm⁻¹ at 15° |
//! | `grating-b` | [`Material::GratingB`] | Treacy pair, 1200 mm⁻¹ at 30° |

pub mod grating;
pub mod material;
pub mod sellmeier;

pub use material::{Material, MaterialError};
