//! PNG charts of a verification run.
//!
//! Charts carry no text; axis ranges are logged at debug level instead.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::error::{Result, ZoomError};
use crate::report::ZoomVerification;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const MARGIN: f64 = 40.0;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);
const SERIES: Rgb<u8> = Rgb([31, 119, 180]);
const LIMIT: Rgb<u8> = Rgb([214, 39, 40]);

/// Maps data coordinates onto the plot area of a canvas.
struct Frame {
    x: [f64; 2],
    y: [f64; 2],
}

impl Frame {
    fn fit(xs: impl Iterator<Item = f64>, ys: impl Iterator<Item = f64>) -> Self {
        Self {
            x: padded_range(xs),
            y: padded_range(ys),
        }
    }

    fn to_px(&self, x: f64, y: f64) -> (f32, f32) {
        let w = WIDTH as f64 - 2.0 * MARGIN;
        let h = HEIGHT as f64 - 2.0 * MARGIN;
        let px = MARGIN + (x - self.x[0]) / (self.x[1] - self.x[0]) * w;
        let py = HEIGHT as f64 - MARGIN - (y - self.y[0]) / (self.y[1] - self.y[0]) * h;
        (px as f32, py as f32)
    }

    fn canvas(&self) -> RgbImage {
        let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
        if self.y[0] < 0.0 && self.y[1] > 0.0 {
            let a = self.to_px(self.x[0], 0.0);
            let b = self.to_px(self.x[1], 0.0);
            draw_line_segment_mut(&mut img, a, b, GRID);
        }
        let origin = self.to_px(self.x[0], self.y[0]);
        draw_line_segment_mut(&mut img, origin, self.to_px(self.x[1], self.y[0]), AXIS);
        draw_line_segment_mut(&mut img, origin, self.to_px(self.x[0], self.y[1]), AXIS);
        img
    }

    /// Non-finite points are skipped and break the line.
    fn polyline(&self, img: &mut RgbImage, pts: &[(f64, f64)], color: Rgb<u8>, markers: bool) {
        let finite = |p: &(f64, f64)| p.0.is_finite() && p.1.is_finite();
        for w in pts.windows(2).filter(|w| finite(&w[0]) && finite(&w[1])) {
            let a = self.to_px(w[0].0, w[0].1);
            let b = self.to_px(w[1].0, w[1].1);
            draw_line_segment_mut(img, a, b, color);
        }
        if markers {
            for &(x, y) in pts.iter().filter(|p| finite(p)) {
                let (px, py) = self.to_px(x, y);
                draw_filled_circle_mut(img, (px.round() as i32, py.round() as i32), 3, color);
            }
        }
    }
}

/// Data range widened by 5% on each side; degenerate ranges become ±1.
fn padded_range(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return [-1.0, 1.0];
    }
    let span = hi - lo;
    if span <= f64::EPSILON {
        return [lo - 1.0, hi + 1.0];
    }
    [lo - 0.05 * span, hi + 0.05 * span]
}

/// Per-frame series, with an optional tolerance band drawn as `±limit`.
pub fn plot_variation(
    frames: &[usize],
    values: &[f64],
    limits: Option<&[f64]>,
) -> Result<RgbImage> {
    if frames.len() != values.len() {
        return Err(ZoomError::LengthMismatch {
            what: "values",
            expected: frames.len(),
            got: values.len(),
        });
    }
    if let Some(l) = limits {
        if l.len() != frames.len() {
            return Err(ZoomError::LengthMismatch {
                what: "limits",
                expected: frames.len(),
                got: l.len(),
            });
        }
    }

    let xs = frames.iter().map(|&f| f as f64);
    let band = limits.unwrap_or(&[]);
    let ys = values
        .iter()
        .copied()
        .chain(band.iter().copied())
        .chain(band.iter().map(|l| -l));
    let frame = Frame::fit(xs.clone(), ys);
    tracing::debug!("variation plot x {:?} y {:?}", frame.x, frame.y);

    let mut img = frame.canvas();
    if let Some(l) = limits {
        let upper: Vec<(f64, f64)> =
            frames.iter().zip(l).map(|(&f, &t)| (f as f64, t)).collect();
        let lower: Vec<(f64, f64)> = upper.iter().map(|&(x, t)| (x, -t)).collect();
        frame.polyline(&mut img, &upper, LIMIT, false);
        frame.polyline(&mut img, &lower, LIMIT, false);
    }
    let pts: Vec<(f64, f64)> = xs.zip(values.iter().copied()).collect();
    frame.polyline(&mut img, &pts, SERIES, true);
    Ok(img)
}

/// Marker offset `(dx, dy)` path over the sweep, plus the image center.
pub fn plot_offset_trajectory(offsets_xy: &[[f64; 2]]) -> RgbImage {
    let xs = offsets_xy.iter().map(|o| o[0]).chain(std::iter::once(0.0));
    // Image y grows downward; flip so the chart matches the capture.
    let ys = offsets_xy.iter().map(|o| -o[1]).chain(std::iter::once(0.0));
    let frame = Frame::fit(xs, ys);
    tracing::debug!("offset plot x {:?} y {:?}", frame.x, frame.y);

    let mut img = frame.canvas();
    let (cx, cy) = frame.to_px(0.0, 0.0);
    draw_filled_circle_mut(&mut img, (cx.round() as i32, cy.round() as i32), 4, LIMIT);
    let pts: Vec<(f64, f64)> = offsets_xy.iter().map(|o| (o[0], -o[1])).collect();
    frame.polyline(&mut img, &pts, SERIES, true);
    img
}

/// Write `<stem>_variations.png`, `<stem>_relative.png` and
/// `<stem>_offset_trajectory.png`. Returns the written paths.
pub fn write_plots(verification: &ZoomVerification, stem: &Path) -> Result<Vec<PathBuf>> {
    let frames: Vec<usize> = verification.frames.iter().map(|f| f.index).collect();
    let z_var: Vec<f64> = verification.frames.iter().map(|f| f.z_variation).collect();
    let rel_var: Vec<f64> = verification.frames.iter().map(|f| f.rel_variation).collect();
    let tols: Vec<f64> = verification.frames.iter().map(|f| f.radius_tol).collect();
    let offsets: Vec<[f64; 2]> = verification.frames.iter().map(|f| f.offset_xy).collect();

    let outputs = [
        ("variations", plot_variation(&frames, &z_var, None)?),
        ("relative", plot_variation(&frames, &rel_var, Some(tols.as_slice()))?),
        ("offset_trajectory", plot_offset_trajectory(&offsets)),
    ];

    let mut written = Vec::with_capacity(outputs.len());
    for (suffix, img) in outputs {
        let path = suffixed(stem, suffix);
        img.save(&path).map_err(|e| ZoomError::image(&path, e))?;
        tracing::info!("wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

fn suffixed(stem: &Path, suffix: &str) -> PathBuf {
    let name = stem
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.with_file_name(format!("{name}_{suffix}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_range_handles_degenerate_input() {
        assert_eq!(padded_range(std::iter::empty()), [-1.0, 1.0]);
        assert_eq!(padded_range([2.0, 2.0].into_iter()), [1.0, 3.0]);
        let r = padded_range([0.0, 10.0].into_iter());
        assert!((r[0] + 0.5).abs() < 1e-12 && (r[1] - 10.5).abs() < 1e-12);
    }

    #[test]
    fn variation_plot_draws_series_and_band() {
        let img = plot_variation(&[0, 1, 2], &[0.0, 0.02, -0.01], Some(&[0.1, 0.1, 0.1][..]))
            .expect("plot");
        assert_eq!(img.dimensions(), (WIDTH, HEIGHT));
        assert!(img.pixels().any(|p| *p == SERIES));
        assert!(img.pixels().any(|p| *p == LIMIT));
    }

    #[test]
    fn variation_plot_rejects_mismatched_lengths() {
        assert!(matches!(
            plot_variation(&[0, 1], &[0.0], None),
            Err(ZoomError::LengthMismatch { what: "values", .. })
        ));
    }

    #[test]
    fn offset_plot_marks_center() {
        let img = plot_offset_trajectory(&[[10.0, 5.0], [20.0, 10.0]]);
        assert!(img.pixels().any(|p| *p == LIMIT));
        assert!(img.pixels().any(|p| *p == SERIES));
    }

    #[test]
    fn non_finite_values_are_skipped() {
        let values = [f64::NAN, f64::NEG_INFINITY, 0.05, 0.02];
        let img = plot_variation(&[0, 1, 2, 3], &values, None).expect("plot");
        assert!(img.pixels().any(|p| *p == SERIES));
        let img = plot_offset_trajectory(&[[f64::NAN, 1.0], [5.0, 5.0], [f64::INFINITY, 0.0]]);
        assert!(img.pixels().any(|p| *p == SERIES));
    }

    #[test]
    fn suffix_keeps_directory() {
        let p = suffixed(Path::new("out/run1"), "relative");
        assert_eq!(p, PathBuf::from("out/run1_relative.png"));
    }
}
