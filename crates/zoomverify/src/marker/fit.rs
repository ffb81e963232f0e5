//! Algebraic least-squares circle fit (Kåsa).

use nalgebra::{DMatrix, DVector};

use super::Circle;

/// Fit a circle to boundary points.
///
/// Solves `x² + y² + D x + E y + F = 0` in a centroid-shifted, scaled frame
/// and converts back. Returns the circle and the RMS radial residual (pixels).
///
/// Requires at least 3 non-collinear points.
pub fn fit_circle_lsq(points: &[[f64; 2]]) -> Option<(Circle, f64)> {
    let n = points.len();
    if n < 3 {
        return None;
    }

    let (mean_x, mean_y, scale) = normalization_params(points);

    let mut a = DMatrix::<f64>::zeros(n, 3);
    let mut b = DVector::<f64>::zeros(n);
    for (i, &[px, py]) in points.iter().enumerate() {
        let x = (px - mean_x) * scale;
        let y = (py - mean_y) * scale;
        a[(i, 0)] = x;
        a[(i, 1)] = y;
        a[(i, 2)] = 1.0;
        b[i] = -(x * x + y * y);
    }

    let svd = a.svd(true, true);
    let sv_max = svd.singular_values.max();
    if sv_max <= 0.0 || svd.singular_values.min() / sv_max < 1e-10 {
        // Collinear or repeated points.
        return None;
    }
    let sol = svd.solve(&b, 1e-12).ok()?;
    let (d, e, f) = (sol[0], sol[1], sol[2]);

    let cx_n = -d / 2.0;
    let cy_n = -e / 2.0;
    let r_sq = cx_n * cx_n + cy_n * cy_n - f;
    if !r_sq.is_finite() || r_sq <= 0.0 {
        return None;
    }

    let circle = Circle {
        x: cx_n / scale + mean_x,
        y: cy_n / scale + mean_y,
        radius: r_sq.sqrt() / scale,
    };
    if !(circle.x.is_finite() && circle.y.is_finite() && circle.radius.is_finite()) {
        return None;
    }

    Some((circle, rms_radial_residual(&circle, points)))
}

/// RMS of `|p - c| - r` over the points.
pub(crate) fn rms_radial_residual(circle: &Circle, points: &[[f64; 2]]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = points
        .iter()
        .map(|&[x, y]| {
            let d = (x - circle.x).hypot(y - circle.y) - circle.radius;
            d * d
        })
        .sum();
    (sum_sq / points.len() as f64).sqrt()
}

/// Returns (mean_x, mean_y, scale) so that the mean distance from the
/// centroid becomes √2.
fn normalization_params(points: &[[f64; 2]]) -> (f64, f64, f64) {
    let n = points.len() as f64;
    let mean_x: f64 = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let mean_y: f64 = points.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = points
        .iter()
        .map(|p| (p[0] - mean_x).hypot(p[1] - mean_y))
        .sum::<f64>()
        / n;

    let scale = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    (mean_x, mean_y, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::prelude::*;

    fn sample_circle(c: &Circle, n: usize) -> Vec<[f64; 2]> {
        (0..n)
            .map(|i| {
                let t = 2.0 * std::f64::consts::PI * (i as f64) / (n as f64);
                [c.x + c.radius * t.cos(), c.y + c.radius * t.sin()]
            })
            .collect()
    }

    #[test]
    fn exact_points_recover_circle() {
        let truth = Circle::new(320.5, 241.25, 57.0);
        let pts = sample_circle(&truth, 64);
        let (fit, rms) = fit_circle_lsq(&pts).expect("fit");
        assert_relative_eq!(fit.x, truth.x, epsilon = 1e-8);
        assert_relative_eq!(fit.y, truth.y, epsilon = 1e-8);
        assert_relative_eq!(fit.radius, truth.radius, epsilon = 1e-8);
        assert!(rms < 1e-8);
    }

    #[test]
    fn noisy_points_stay_close() {
        let truth = Circle::new(100.0, 80.0, 30.0);
        let mut rng = StdRng::seed_from_u64(7);
        let pts: Vec<[f64; 2]> = sample_circle(&truth, 200)
            .into_iter()
            .map(|[x, y]| [x + rng.gen_range(-0.5..0.5), y + rng.gen_range(-0.5..0.5)])
            .collect();
        let (fit, rms) = fit_circle_lsq(&pts).expect("fit");
        assert_relative_eq!(fit.x, truth.x, epsilon = 0.2);
        assert_relative_eq!(fit.y, truth.y, epsilon = 0.2);
        assert_relative_eq!(fit.radius, truth.radius, epsilon = 0.2);
        assert!(rms < 0.5);
    }

    #[test]
    fn too_few_or_collinear_points_fail() {
        assert!(fit_circle_lsq(&[[0.0, 0.0], [1.0, 1.0]]).is_none());
        let line: Vec<[f64; 2]> = (0..10).map(|i| [i as f64, 2.0 * i as f64]).collect();
        assert!(fit_circle_lsq(&line).is_none());
    }
}
