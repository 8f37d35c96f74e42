//! Grating-pair dispersion.
//!
//! A parallel grating pair in first diffraction order imposes the Treacy
//! spectral phase. Per metre of normal grating separation the phase is
//!
//! $$ \kappa(\omega) = -\frac{2\omega}{c}
//!    \sqrt{1 - \left(\frac{2\pi c}{\omega d} - \sin\theta_i\right)^2} $$
//!
//! where $d$ is the groove spacing and $\theta_i$ the incidence angle.
//! Frequencies whose first order is evanescent (negative radicand) pick up
//! no propagating phase and the radicand is clamped to zero; the measured
//! spectrum carries no energy there.

use crate::material::SPEED_OF_LIGHT;

/// A parallel grating pair in first order.
#[derive(Debug, Clone, Copy)]
pub struct GratingPair {
    /// Groove density (lines per metre).
    groove_density: f64,
    /// Incidence angle (degrees).
    incidence_deg: f64,
}

/// 600 mm⁻¹ pair at 15° incidence.
pub const GRATING_A: GratingPair = GratingPair {
    groove_density: 600e3,
    incidence_deg: 15.0,
};

/// 1200 mm⁻¹ pair at 30° incidence.
pub const GRATING_B: GratingPair = GratingPair {
    groove_density: 1200e3,
    incidence_deg: 30.0,
};

impl GratingPair {
    /// Spectral phase per metre of normal separation at angular frequency
    /// `omega` (rad/s). Returns 0 for non-positive frequencies and for
    /// evanescent orders.
    pub fn dispersive_wavenumber(&self, omega: f64) -> f64 {
        if omega <= 0.0 {
            return 0.0;
        }
        let d = 1.0 / self.groove_density;
        let sin_i = self.incidence_deg.to_radians().sin();
        let sin_diff = 2.0 * std::f64::consts::PI * SPEED_OF_LIGHT / (omega * d) - sin_i;
        let radicand = (1.0 - sin_diff * sin_diff).max(0.0);
        -2.0 * omega / SPEED_OF_LIGHT * radicand.sqrt()
    }
}
