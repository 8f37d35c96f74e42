//! Loaders for the measurement file formats.
//!
//! Two whitespace-separated numeric tables, as the acquisition side
//! writes them:
//!
//! - fundamental: two columns, wavelength (nm) and intensity;
//! - scan: a matrix whose first row holds stage positions in mm (first
//!   cell unused), whose first column holds wavelengths in nm, and whose
//!   remaining block holds intensity samples.
//!
//! Unit conversion to metres happens here, at the boundary; everything
//! downstream is SI.

use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array1, Array2};

use dscan_core::types::MeasurementTrace;

/// Parse a whitespace-separated numeric table, skipping blank lines and
/// `#` comments. `nan` cells are accepted (the scan header uses one).
fn parse_table(path: &Path) -> Result<Vec<Vec<f64>>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut rows = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row: Result<Vec<f64>> = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>().with_context(|| {
                    format!("{}:{}: bad number '{}'", path.display(), lineno + 1, tok)
                })
            })
            .collect();
        rows.push(row?);
    }
    if rows.is_empty() {
        anyhow::bail!("{} contains no data rows", path.display());
    }
    let width = rows[0].len();
    if let Some(bad) = rows.iter().position(|r| r.len() != width) {
        anyhow::bail!(
            "{} is ragged: row {} has {} columns, expected {}",
            path.display(),
            bad + 1,
            rows[bad].len(),
            width
        );
    }
    Ok(rows)
}

/// Load a fundamental spectrum as `(wavelength_m, intensity)`.
pub fn load_fundamental(path: &Path) -> Result<(Vec<f64>, Vec<f64>)> {
    let rows = parse_table(path)?;
    if rows[0].len() != 2 {
        anyhow::bail!(
            "{}: expected 2 columns (wavelength nm, intensity), got {}",
            path.display(),
            rows[0].len()
        );
    }
    let wavelength: Vec<f64> = rows.iter().map(|r| r[0] * 1e-9).collect();
    let intensity: Vec<f64> = rows.iter().map(|r| r[1]).collect();
    Ok((wavelength, intensity))
}

/// Load a raw scan trace. The stored block is (wavelength row, position
/// column); the returned trace is transposed to (position, wavelength)
/// with axes in metres.
pub fn load_scan(path: &Path) -> Result<MeasurementTrace> {
    let rows = parse_table(path)?;
    if rows.len() < 2 || rows[0].len() < 2 {
        anyhow::bail!(
            "{}: scan matrix needs a position row and a wavelength column",
            path.display()
        );
    }

    let positions: Vec<f64> = rows[0][1..].iter().map(|&p| p * 1e-3).collect();
    let wavelengths: Vec<f64> = rows[1..].iter().map(|r| r[0] * 1e-9).collect();

    let mut intensity = Array2::zeros((positions.len(), wavelengths.len()));
    for (j, row) in rows[1..].iter().enumerate() {
        for (i, &value) in row[1..].iter().enumerate() {
            intensity[[i, j]] = value;
        }
    }

    MeasurementTrace::new(
        intensity,
        Array1::from(positions),
        Array1::from(wavelengths),
    )
    .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_fundamental() {
        let file = write_file("# comment\n450.0 10.0\n451.0 12.5\n\n452.0 11.0\n");
        let (wl, intensity) = load_fundamental(file.path()).unwrap();
        assert_eq!(wl.len(), 3);
        assert!((wl[0] - 450e-9).abs() < 1e-18);
        assert_eq!(intensity[1], 12.5);
    }

    #[test]
    fn test_load_scan_transposes() {
        // 2 positions, 3 wavelengths.
        let file = write_file(
            "nan 0.1 0.2\n\
             240.0 1.0 4.0\n\
             250.0 2.0 5.0\n\
             260.0 3.0 6.0\n",
        );
        let trace = load_scan(file.path()).unwrap();
        assert_eq!(trace.parameter.len(), 2);
        assert_eq!(trace.axis.len(), 3);
        assert!((trace.parameter[1] - 0.2e-3).abs() < 1e-12);
        assert!((trace.axis[2] - 260e-9).abs() < 1e-18);
        // Row 0 is the first position across wavelengths.
        assert_eq!(trace.intensity[[0, 0]], 1.0);
        assert_eq!(trace.intensity[[0, 2]], 3.0);
        assert_eq!(trace.intensity[[1, 1]], 5.0);
    }

    #[test]
    fn test_ragged_table_rejected() {
        let file = write_file("1.0 2.0\n3.0\n");
        assert!(parse_table(file.path()).is_err());
    }
}
