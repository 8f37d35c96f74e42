//! TOML configuration deserialisation for retrieval jobs.
//!
//! Every tunable the pipeline takes is a named field with a default
//! matching the conventional values; `dscan validate` checks a file
//! before any computation starts.

use serde::Deserialize;

use dscan_core::pnps::NonlinearProcess;
use dscan_materials::Material;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub windows: WindowConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Input data files.
#[derive(Debug, Deserialize)]
pub struct InputConfig {
    /// Two-column (wavelength nm, intensity) fundamental spectrum.
    pub fundamental: String,
    /// Scan matrix: first row stage positions (mm), first column
    /// wavelengths (nm).
    pub scan: String,
}

/// Retrieval grid parameters.
#[derive(Debug, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_grid_points")]
    pub points: usize,
    /// Wavelength bandwidth around the fundamental centre (nm).
    #[serde(default = "default_bandwidth_nm")]
    pub bandwidth_nm: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            points: default_grid_points(),
            bandwidth_nm: default_bandwidth_nm(),
        }
    }
}

fn default_grid_points() -> usize {
    3000
}
fn default_bandwidth_nm() -> f64 {
    950.0
}

/// Wavelength crop windows (nm).
#[derive(Debug, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_fundamental_window")]
    pub fundamental_nm: [f64; 2],
    #[serde(default = "default_scan_window")]
    pub scan_nm: [f64; 2],
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            fundamental_nm: default_fundamental_window(),
            scan_nm: default_scan_window(),
        }
    }
}

fn default_fundamental_window() -> [f64; 2] {
    [400.0, 600.0]
}
fn default_scan_window() -> [f64; 2] {
    [200.0, 300.0]
}

/// Retrieval parameters.
#[derive(Debug, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_material")]
    pub material: Material,
    #[serde(default = "default_process")]
    pub process: NonlinearProcess,
    /// Wedge angle (degrees); ignored for grating pairs.
    #[serde(default = "default_wedge_angle")]
    pub wedge_angle_deg: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_phase_max")]
    pub phase_max: f64,
    #[serde(default)]
    pub seed: u64,
    /// Gaussian blur applied to the raw trace (pixels; 0 = off).
    #[serde(default)]
    pub blur_sigma: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            material: default_material(),
            process: default_process(),
            wedge_angle_deg: default_wedge_angle(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            phase_max: default_phase_max(),
            seed: 0,
            blur_sigma: 0.0,
        }
    }
}

fn default_material() -> Material {
    Material::Bk7
}
fn default_process() -> NonlinearProcess {
    NonlinearProcess::Shg
}
fn default_wedge_angle() -> f64 {
    8.0
}
fn default_max_iterations() -> usize {
    30
}
fn default_tolerance() -> f64 {
    1e-5
}
fn default_phase_max() -> f64 {
    0.1
}

/// Compression-search options.
#[derive(Debug, Default, Deserialize)]
pub struct CompressionConfig {
    /// Report at this stage position (mm) instead of searching for the
    /// shortest duration.
    #[serde(default)]
    pub target_position_mm: Option<f64>,
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to also save the run summary as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_json: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}

impl JobConfig {
    /// Check field consistency before any computation starts.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.grid.points < 2 {
            anyhow::bail!("grid.points must be at least 2, got {}", self.grid.points);
        }
        if self.grid.bandwidth_nm <= 0.0 {
            anyhow::bail!("grid.bandwidth_nm must be positive");
        }
        for (name, window) in [
            ("windows.fundamental_nm", self.windows.fundamental_nm),
            ("windows.scan_nm", self.windows.scan_nm),
        ] {
            if window[0] >= window[1] || window[0] <= 0.0 {
                anyhow::bail!("{name} must be an increasing positive range, got {window:?}");
            }
        }
        if self.retrieval.max_iterations == 0 {
            anyhow::bail!("retrieval.max_iterations must be at least 1");
        }
        if self.retrieval.tolerance < 0.0 || self.retrieval.phase_max < 0.0 {
            anyhow::bail!("retrieval.tolerance and retrieval.phase_max must be non-negative");
        }
        if self.retrieval.blur_sigma < 0.0 {
            anyhow::bail!("retrieval.blur_sigma must be non-negative");
        }
        // A zero wedge angle makes the stage-to-insertion coefficient
        // vanish for glass wedges; gratings ignore it.
        if self.retrieval.material.coefficient(self.retrieval.wedge_angle_deg) <= 0.0 {
            anyhow::bail!(
                "retrieval.wedge_angle_deg = {} gives a non-positive insertion coefficient for material {}",
                self.retrieval.wedge_angle_deg,
                self.retrieval.material
            );
        }
        Ok(())
    }
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: JobConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: JobConfig = toml::from_str(
            r#"
            [input]
            fundamental = "fund.dat"
            scan = "scan.dat"
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.grid.points, 3000);
        assert_eq!(config.retrieval.material, Material::Bk7);
        assert_eq!(config.retrieval.process, NonlinearProcess::Shg);
        assert_eq!(config.windows.scan_nm, [200.0, 300.0]);
        assert!(config.compression.target_position_mm.is_none());
    }

    #[test]
    fn test_invalid_fields_rejected() {
        let config: JobConfig = toml::from_str(
            r#"
            [input]
            fundamental = "fund.dat"
            scan = "scan.dat"
            [windows]
            fundamental_nm = [600.0, 400.0]
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let unknown_material: Result<JobConfig, _> = toml::from_str(
            r#"
            [input]
            fundamental = "fund.dat"
            scan = "scan.dat"
            [retrieval]
            material = "quartz"
            "#,
        );
        assert!(unknown_material.is_err());
    }
}
