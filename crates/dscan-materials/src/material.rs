//! The dispersive-element tag and its pure per-variant behaviour.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grating::{GRATING_A, GRATING_B};
use crate::sellmeier::{BK7, FUSED_SILICA};

/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: f64 = 2.99792458e8;

/// Errors from material selection.
#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("Unknown material '{0}'. Valid identifiers: FS, BK7, grating-a, grating-b")]
    Unknown(String),
}

/// The dispersive element inserted during the scan.
///
/// Glass wedges insert bulk material; grating pairs vary their separation.
/// Both reduce to a phase $z\,\kappa(\omega)$ linear in the physical
/// insertion $z$, so a single tag covers the forward model's needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Material {
    FusedSilica,
    Bk7,
    GratingA,
    GratingB,
}

impl Material {
    /// Conversion coefficient from raw stage displacement to effective
    /// physical insertion.
    ///
    /// Grating pairs have a fixed geometry factor of 4 (double pass
    /// through both gratings), independent of the wedge angle. For glass
    /// wedges the stage moves the wedge transversely; a displacement $x$
    /// inserts $x \tan\theta \cos(\theta/2)$ of glass for wedge angle
    /// $\theta$ (given in degrees).
    pub fn coefficient(&self, wedge_angle_deg: f64) -> f64 {
        match self {
            Material::GratingA | Material::GratingB => 4.0,
            Material::FusedSilica | Material::Bk7 => {
                let theta = wedge_angle_deg.to_radians();
                theta.tan() * (theta / 2.0).cos()
            }
        }
    }

    /// Spectral phase per metre of insertion at angular frequency `omega`.
    ///
    /// For glass this is the material wavenumber $k(\omega) = n(\omega)\,
    /// \omega/c$; for grating pairs the Treacy pair phase per unit
    /// separation. Total and linear-in-$\omega$ parts only shift and delay
    /// the pulse; the retrieval is sensitive to the curvature.
    pub fn dispersive_wavenumber(&self, omega: f64) -> f64 {
        match self {
            Material::FusedSilica | Material::Bk7 => {
                if omega <= 0.0 {
                    return 0.0;
                }
                let sellmeier = match self {
                    Material::FusedSilica => FUSED_SILICA,
                    _ => BK7,
                };
                let wavelength = 2.0 * std::f64::consts::PI * SPEED_OF_LIGHT / omega;
                sellmeier.refractive_index(wavelength) * omega / SPEED_OF_LIGHT
            }
            Material::GratingA => GRATING_A.dispersive_wavenumber(omega),
            Material::GratingB => GRATING_B.dispersive_wavenumber(omega),
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Material::FusedSilica => "FS",
            Material::Bk7 => "BK7",
            Material::GratingA => "grating-a",
            Material::GratingB => "grating-b",
        };
        f.write_str(name)
    }
}

impl FromStr for Material {
    type Err = MaterialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fs" | "fused-silica" => Ok(Material::FusedSilica),
            "bk7" => Ok(Material::Bk7),
            "grating-a" | "gratinga" => Ok(Material::GratingA),
            "grating-b" | "gratingb" => Ok(Material::GratingB),
            other => Err(MaterialError::Unknown(other.to_string())),
        }
    }
}

impl TryFrom<String> for Material {
    type Error = MaterialError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Material> for String {
    fn from(m: Material) -> Self {
        m.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_grating_coefficient_is_constant() {
        for angle in [0.0, 4.0, 8.0, 45.0] {
            assert_eq!(Material::GratingA.coefficient(angle), 4.0);
            assert_eq!(Material::GratingB.coefficient(angle), 4.0);
        }
    }

    #[test]
    fn test_wedge_coefficient() {
        assert_eq!(Material::Bk7.coefficient(0.0), 0.0);
        // tan(8°)·cos(4°)
        let expected = 8.0_f64.to_radians().tan() * 4.0_f64.to_radians().cos();
        assert_abs_diff_eq!(Material::FusedSilica.coefficient(8.0), expected, epsilon = 1e-15);
    }

    #[test]
    fn test_glass_wavenumber_matches_sellmeier() {
        let omega = 2.0 * std::f64::consts::PI * SPEED_OF_LIGHT / 800e-9;
        let k = Material::Bk7.dispersive_wavenumber(omega);
        let n = k * SPEED_OF_LIGHT / omega;
        assert_abs_diff_eq!(n, 1.5108, epsilon = 1e-3);
    }

    #[test]
    fn test_parse_round_trip() {
        for m in [
            Material::FusedSilica,
            Material::Bk7,
            Material::GratingA,
            Material::GratingB,
        ] {
            let parsed: Material = m.to_string().parse().unwrap();
            assert_eq!(parsed, m);
        }
        assert!("quartz".parse::<Material>().is_err());
    }
}
