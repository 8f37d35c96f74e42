//! Small numeric building blocks shared across the pipeline.
//!
//! Linear interpolation, degree-1 least squares, Gaussian smoothing, the
//! optimal scale factor between two intensity sets, and the normalised
//! RMS difference. All pure functions over immutable inputs.

use ndarray::{Array1, Array2};

/// Linearly interpolate `(xs, ys)` at `x`. `xs` must be ascending;
/// queries outside the data range return `fill`.
pub fn interp1(xs: &[f64], ys: &[f64], x: f64, fill: f64) -> f64 {
    let n = xs.len();
    if n == 0 || x < xs[0] || x > xs[n - 1] {
        return fill;
    }
    if n == 1 {
        return ys[0];
    }
    // Binary search for the enclosing interval.
    let mut lo = 0;
    let mut hi = n - 1;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if xs[mid] > x {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    let h = xs[hi] - xs[lo];
    if h == 0.0 {
        return ys[lo];
    }
    let frac = (x - xs[lo]) / h;
    ys[lo] + frac * (ys[hi] - ys[lo])
}

/// Least-squares fit of `y = slope·x + intercept`.
pub fn polyfit_linear(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    if xs.is_empty() {
        return (0.0, 0.0);
    }
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        num += (x - mean_x) * (y - mean_y);
        den += (x - mean_x) * (x - mean_x);
    }
    let slope = if den > 0.0 { num / den } else { 0.0 };
    (slope, mean_y - slope * mean_x)
}

/// Scale `s` minimising $\lVert s\,a - b \rVert^2$.
///
/// Returns 1 when `a` carries no energy, so a vanishing denominator is
/// recovered rather than propagated as NaN.
pub fn best_scale(a: &[f64], b: &[f64]) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        num += x * y;
        den += x * x;
    }
    if den > 0.0 {
        num / den
    } else {
        1.0
    }
}

/// Root-mean-square difference between `a` and `b`, normalised by the
/// peak magnitude of `b`.
pub fn nrms(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = a.iter().zip(b).map(|(&x, &y)| (x - y) * (x - y)).sum();
    let rms = (sum_sq / a.len() as f64).sqrt();
    let peak = b.iter().fold(0.0_f64, |acc, &y| acc.max(y.abs()));
    if peak > 0.0 {
        rms / peak
    } else {
        rms
    }
}

/// Circularly shift `v` so element `i` moves to `(i + shift) mod n`.
pub fn roll<T: Clone>(v: &[T], shift: isize) -> Vec<T> {
    let n = v.len();
    if n == 0 {
        return Vec::new();
    }
    let shift = shift.rem_euclid(n as isize) as usize;
    let mut out = Vec::with_capacity(n);
    out.extend_from_slice(&v[n - shift..]);
    out.extend_from_slice(&v[..n - shift]);
    out
}

/// Normalised Gaussian kernel truncated at 4σ.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (4.0 * sigma).ceil() as usize;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Convolve with reflected boundary handling.
fn convolve_reflect(data: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = data.len() as isize;
    let radius = (kernel.len() / 2) as isize;
    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(j, &k)| {
                    let mut idx = i + j as isize - radius;
                    // Reflect about the edges (a b c | c b a).
                    if idx < 0 {
                        idx = -idx - 1;
                    }
                    if idx >= n {
                        idx = 2 * n - idx - 1;
                    }
                    k * data[idx.clamp(0, n - 1) as usize]
                })
                .sum()
        })
        .collect()
}

/// Smooth a 1D signal with a Gaussian of width `sigma` samples.
pub fn gaussian_smooth(data: &[f64], sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 || data.is_empty() {
        return data.to_vec();
    }
    convolve_reflect(data, &gaussian_kernel(sigma))
}

/// Separable 2D Gaussian blur with width `sigma` pixels on both axes.
pub fn gaussian_blur(data: &Array2<f64>, sigma: f64) -> Array2<f64> {
    if sigma <= 0.0 {
        return data.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let (rows, cols) = data.dim();
    let mut out = data.clone();
    for mut row in out.rows_mut() {
        let smoothed = convolve_reflect(row.as_slice().unwrap(), &kernel);
        row.assign(&Array1::from(smoothed));
    }
    for j in 0..cols {
        let col: Vec<f64> = (0..rows).map(|i| out[[i, j]]).collect();
        let smoothed = convolve_reflect(&col, &kernel);
        for (i, v) in smoothed.into_iter().enumerate() {
            out[[i, j]] = v;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_interp1_passes_through_and_fills() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [0.0, 10.0, 0.0];
        assert_abs_diff_eq!(interp1(&xs, &ys, 0.5, -1.0), 5.0);
        assert_abs_diff_eq!(interp1(&xs, &ys, 1.0, -1.0), 10.0);
        assert_abs_diff_eq!(interp1(&xs, &ys, 3.0, -1.0), -1.0);
    }

    #[test]
    fn test_polyfit_recovers_line() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x - 7.0).collect();
        let (slope, intercept) = polyfit_linear(&xs, &ys);
        assert_abs_diff_eq!(slope, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(intercept, -7.0, epsilon = 1e-10);
    }

    #[test]
    fn test_best_scale_and_nrms() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 4.0, 6.0];
        assert_abs_diff_eq!(best_scale(&a, &b), 2.0, epsilon = 1e-12);
        let scaled: Vec<f64> = a.iter().map(|x| x * 2.0).collect();
        assert_abs_diff_eq!(nrms(&scaled, &b), 0.0, epsilon = 1e-12);
        // Zero-energy input recovers scale 1 instead of dividing by zero.
        assert_eq!(best_scale(&[0.0, 0.0], &b), 1.0);
    }

    #[test]
    fn test_roll_matches_numpy_semantics() {
        let v = [1, 2, 3, 4, 5];
        assert_eq!(roll(&v, 2), vec![4, 5, 1, 2, 3]);
        assert_eq!(roll(&v, -1), vec![2, 3, 4, 5, 1]);
        assert_eq!(roll(&v, 0), v.to_vec());
    }

    #[test]
    fn test_gaussian_smooth_preserves_mass() {
        let mut data = vec![0.0; 64];
        data[32] = 1.0;
        let smoothed = gaussian_smooth(&data, 2.0);
        let sum: f64 = smoothed.iter().sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-9);
        assert!(smoothed[32] < 1.0 && smoothed[30] > 0.0);
    }
}
