//! Chart-circle detection.
//!
//! Binarizes the capture with Otsu's threshold, traces the outer contours of
//! marker-colored regions and keeps those that look like filled circles:
//! large enough for the zoom level, round (area close to `π r²`) and with a
//! square bounding box. The accepted circle closest to the image center is the
//! zoom reference.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use serde::{Deserialize, Serialize};

use super::fit::fit_circle_lsq;
use super::{image_center, Circle, MarkerDetector, MarkerObservation};
use crate::error::{Result, ZoomError};
use crate::zoom::ZOOM_MAX_THRESH;

/// Fill color of the reference circles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerColor {
    Dark,
    Light,
}

/// Circle detector parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleDetectConfig {
    /// Minimum contour area as a fraction of the image area at 1x zoom.
    /// Scaled by `zoom²` and `fov_ratio` per capture.
    pub min_area_ratio: f64,
    /// Minimum number of contour points.
    pub min_circle_pts: usize,
    /// Relative tolerance between bounding-box width and height.
    pub aspect_rtol: f64,
    /// Relative tolerance of `π r² / area` around 1.
    pub circlish_rtol: f64,
    /// Fill color of the chart circles.
    pub color: MarkerColor,
    /// Field of view of the sub camera over the logical camera's.
    pub fov_ratio: f64,
    /// Minimum zoom ratio supported by the camera.
    pub min_zoom_ratio: f64,
    /// Zoom ratio (relative to `min_zoom_ratio`) beyond which a missing
    /// circle is expected rather than an error.
    pub zoom_max_thresh: f64,
    /// Maximum RMS residual (px) for the least-squares center refinement.
    pub max_fit_rms_px: f64,
}

impl Default for CircleDetectConfig {
    fn default() -> Self {
        Self {
            min_area_ratio: 0.00013,
            min_circle_pts: 25,
            aspect_rtol: 0.15,
            circlish_rtol: 0.05,
            color: MarkerColor::Dark,
            fov_ratio: 1.0,
            min_zoom_ratio: 1.0,
            zoom_max_thresh: ZOOM_MAX_THRESH,
            max_fit_rms_px: 1.0,
        }
    }
}

/// A contour accepted as a circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleCandidate {
    pub circle: Circle,
    /// `π r² / area`; 1.0 for a perfect disc.
    pub circlish: f64,
    /// Region area in pixels.
    pub area: f64,
    /// RMS residual of the least-squares refinement, if it was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit_rms_px: Option<f64>,
}

/// Shape summary of one traced contour.
#[derive(Debug, Clone, Copy)]
struct ContourShape {
    width: f64,
    height: f64,
    ctx: f64,
    cty: f64,
    area: f64,
}

/// Dark/light chart-circle detector.
///
/// # Examples
///
/// ```no_run
/// use zoomverify::{CircleDetector, MarkerDetector};
///
/// let gray = image::open("capture.png").unwrap().to_luma8();
/// let detector = CircleDetector::default();
/// if let Some(marker) = detector.locate(&gray, 2.0).unwrap() {
///     println!("marker size {:.1}px", marker.size());
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CircleDetector {
    config: CircleDetectConfig,
}

impl CircleDetector {
    pub fn new(config: CircleDetectConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CircleDetectConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CircleDetectConfig {
        &mut self.config
    }

    /// All circle candidates in the image, in contour order.
    pub fn find_circles(&self, gray: &GrayImage, zoom_ratio: f64) -> Vec<CircleCandidate> {
        let (w, h) = gray.dimensions();
        if w < 4 || h < 4 {
            return Vec::new();
        }
        let cfg = &self.config;
        let min_area =
            cfg.min_area_ratio * w as f64 * h as f64 * zoom_ratio * zoom_ratio * cfg.fov_ratio;

        let level = imageproc::contrast::otsu_level(gray);
        let mask = marker_mask(gray, level, cfg.color);
        let contours: Vec<Contour<i32>> = find_contours(&mask);

        tracing::debug!(
            "otsu level {}, {} contours, min area {:.0}, min pts {}",
            level,
            contours.len(),
            min_area,
            cfg.min_circle_pts
        );

        let mut out = Vec::new();
        for contour in contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer)
        {
            if contour.points.len() < cfg.min_circle_pts {
                continue;
            }
            let Some(shape) = contour_shape(contour) else {
                continue;
            };
            if shape.area <= min_area {
                continue;
            }

            let radius = (shape.width + shape.height) / 4.0;
            let circlish = std::f64::consts::PI * radius * radius / shape.area;
            let cx = shape.ctx.round() as i64;
            let cy = shape.cty.round() as i64;
            let center_is_marker = cx >= 0
                && cy >= 0
                && (cx as u32) < w
                && (cy as u32) < h
                && mask.get_pixel(cx as u32, cy as u32)[0] > 0;

            tracing::trace!(
                "contour area {:.0}, pts {}, WxH {}x{}, circlish {:.3}",
                shape.area,
                contour.points.len(),
                shape.width,
                shape.height,
                circlish
            );

            if !(center_is_marker
                && is_close(1.0, circlish, cfg.circlish_rtol, 0.0)
                && is_close(shape.width, shape.height, cfg.aspect_rtol, 0.0))
            {
                continue;
            }

            let mut circle = Circle::new(shape.ctx, shape.cty, radius);
            let mut fit_rms_px = None;
            let pts: Vec<[f64; 2]> = contour
                .points
                .iter()
                .map(|p| [p.x as f64, p.y as f64])
                .collect();
            if let Some((fitted, rms)) = fit_circle_lsq(&pts) {
                let shift = (fitted.x - circle.x).hypot(fitted.y - circle.y);
                if rms <= cfg.max_fit_rms_px && shift <= 0.1 * radius {
                    circle.x = fitted.x;
                    circle.y = fitted.y;
                    fit_rms_px = Some(rms);
                }
            }

            out.push(CircleCandidate {
                circle,
                circlish,
                area: shape.area,
                fit_rms_px,
            });
        }
        out
    }

    /// Circle closest to the image center.
    ///
    /// Returns `Ok(None)` when no circle is found and the zoom is beyond
    /// `zoom_max_thresh`, or when the chosen circle is cropped by the frame.
    pub fn find_center_circle(&self, gray: &GrayImage, zoom_ratio: f64) -> Result<Option<Circle>> {
        let size = [gray.width(), gray.height()];
        let candidates = self.find_circles(gray, zoom_ratio);

        if candidates.is_empty() {
            let relative_zoom = zoom_ratio / self.config.min_zoom_ratio;
            if relative_zoom >= self.config.zoom_max_thresh {
                tracing::debug!(
                    "no circle detected, zoom {:.2} exceeds threshold {:.1}",
                    relative_zoom,
                    self.config.zoom_max_thresh
                );
                return Ok(None);
            }
            return Err(ZoomError::MarkerNotFound {
                zoom_ratio: relative_zoom,
                threshold: self.config.zoom_max_thresh,
            });
        }
        tracing::debug!("{} circles found", candidates.len());

        let [ix, iy] = image_center(size);
        let best = candidates
            .iter()
            .map(|c| c.circle)
            .min_by(|a, b| {
                let da = (a.x - ix).hypot(a.y - iy);
                let db = (b.x - ix).hypot(b.y - iy);
                da.total_cmp(&db)
            })
            .ok_or(ZoomError::MarkerCountMismatch {
                expected: 1,
                found: 0,
            })?;

        if best.is_cropped(size) {
            tracing::debug!("zoom {:.2} is too large, circle cropped", zoom_ratio);
            return Ok(None);
        }
        Ok(Some(best))
    }

    /// All candidates, failing unless at least `expected` were found.
    pub fn locate_expected(
        &self,
        gray: &GrayImage,
        zoom_ratio: f64,
        expected: usize,
    ) -> Result<Vec<CircleCandidate>> {
        let found = self.find_circles(gray, zoom_ratio);
        if found.len() < expected {
            return Err(ZoomError::MarkerCountMismatch {
                expected,
                found: found.len(),
            });
        }
        Ok(found)
    }
}

impl MarkerDetector for CircleDetector {
    fn locate(&self, image: &GrayImage, zoom_ratio: f64) -> Result<Option<MarkerObservation>> {
        Ok(self
            .find_center_circle(image, zoom_ratio)?
            .map(MarkerObservation::Circle))
    }
}

/// `math.isclose` semantics: `|a - b| <= max(rtol * max(|a|, |b|), atol)`.
pub(crate) fn is_close(a: f64, b: f64, rtol: f64, atol: f64) -> bool {
    (a - b).abs() <= (rtol * a.abs().max(b.abs())).max(atol)
}

/// 255 where the pixel has the marker color after Otsu binarization.
fn marker_mask(gray: &GrayImage, level: u8, color: MarkerColor) -> GrayImage {
    let mut mask = GrayImage::new(gray.width(), gray.height());
    for (src, dst) in gray.pixels().zip(mask.pixels_mut()) {
        let is_light = src[0] > level;
        let on = match color {
            MarkerColor::Dark => !is_light,
            MarkerColor::Light => is_light,
        };
        dst[0] = if on { 255 } else { 0 };
    }
    mask
}

fn contour_shape(contour: &Contour<i32>) -> Option<ContourShape> {
    let first = contour.points.first()?;
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
    for p in &contour.points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }

    // Shoelace area and polygon centroid of the traced pixel centers.
    let n = contour.points.len();
    let mut a2 = 0.0;
    let mut cx6 = 0.0;
    let mut cy6 = 0.0;
    for i in 0..n {
        let p = contour.points[i];
        let q = contour.points[(i + 1) % n];
        let (px, py, qx, qy) = (p.x as f64, p.y as f64, q.x as f64, q.y as f64);
        let cross = px * qy - qx * py;
        a2 += cross;
        cx6 += (px + qx) * cross;
        cy6 += (py + qy) * cross;
    }
    let poly_area = 0.5 * a2.abs();
    let (ctx, cty) = if a2.abs() > 1e-9 {
        (cx6 / (3.0 * a2), cy6 / (3.0 * a2))
    } else {
        let sx: f64 = contour.points.iter().map(|p| p.x as f64).sum();
        let sy: f64 = contour.points.iter().map(|p| p.y as f64).sum();
        (sx / n as f64, sy / n as f64)
    };

    // Pick's theorem: pixels covered = interior + boundary = A + B/2 + 1.
    let area = poly_area + n as f64 / 2.0 + 1.0;

    Some(ContourShape {
        width: (max_x - min_x + 1) as f64,
        height: (max_y - min_y + 1) as f64,
        ctx,
        cty,
        area,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{draw_circles_image, draw_square_image};
    use approx::assert_abs_diff_eq;

    #[test]
    fn finds_single_dark_circle() {
        let img = draw_circles_image(640, 480, &[Circle::new(320.0, 240.0, 60.0)], 20, 230);
        let det = CircleDetector::default();
        let circles = det.find_circles(&img, 1.0);
        assert_eq!(circles.len(), 1);
        let c = circles[0].circle;
        assert_abs_diff_eq!(c.x, 320.0, epsilon = 1.0);
        assert_abs_diff_eq!(c.y, 240.0, epsilon = 1.0);
        assert_abs_diff_eq!(c.radius, 60.0, epsilon = 1.5);
    }

    #[test]
    fn picks_circle_closest_to_center() {
        let img = draw_circles_image(
            640,
            480,
            &[
                Circle::new(120.0, 120.0, 50.0),
                Circle::new(350.0, 250.0, 50.0),
                Circle::new(520.0, 360.0, 50.0),
            ],
            20,
            230,
        );
        let det = CircleDetector::default();
        let c = det
            .find_center_circle(&img, 1.0)
            .expect("no error")
            .expect("circle");
        assert_abs_diff_eq!(c.x, 350.0, epsilon = 1.0);
        assert_abs_diff_eq!(c.y, 250.0, epsilon = 1.0);
    }

    #[test]
    fn rejects_squares() {
        let img = draw_square_image(640, 480, [320.0, 240.0], 60.0, 20, 230);
        let det = CircleDetector::default();
        assert!(det.find_circles(&img, 1.0).is_empty());
    }

    #[test]
    fn missing_circle_is_error_below_threshold() {
        let img = GrayImage::from_pixel(320, 240, image::Luma([200]));
        let det = CircleDetector::default();
        let err = det.find_center_circle(&img, 2.0).expect_err("must fail");
        assert!(matches!(err, ZoomError::MarkerNotFound { .. }));
    }

    #[test]
    fn missing_circle_is_skip_beyond_threshold() {
        let img = GrayImage::from_pixel(320, 240, image::Luma([200]));
        let det = CircleDetector::default();
        let res = det.find_center_circle(&img, 9.5).expect("no error");
        assert!(res.is_none());
    }

    #[test]
    fn cropped_center_circle_is_skip() {
        let img = draw_circles_image(200, 200, &[Circle::new(100.0, 100.0, 99.5)], 20, 230);
        let det = CircleDetector::default();
        assert!(det.find_center_circle(&img, 1.0).expect("no error").is_none());
    }

    #[test]
    fn light_circles_need_light_color() {
        let img = draw_circles_image(640, 480, &[Circle::new(320.0, 240.0, 60.0)], 230, 20);
        let dark = CircleDetector::default();
        assert!(dark.find_circles(&img, 1.0).is_empty());

        let mut light = CircleDetector::default();
        light.config_mut().color = MarkerColor::Light;
        assert_eq!(light.find_circles(&img, 1.0).len(), 1);
    }

    #[test]
    fn expected_count_is_enforced() {
        let img = draw_circles_image(640, 480, &[Circle::new(320.0, 240.0, 60.0)], 20, 230);
        let det = CircleDetector::default();
        assert_eq!(det.locate_expected(&img, 1.0, 1).expect("one").len(), 1);
        let err = det.locate_expected(&img, 1.0, 2).expect_err("two");
        assert!(matches!(
            err,
            ZoomError::MarkerCountMismatch {
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn is_close_matches_python_semantics() {
        assert!(is_close(1.0, 1.05, 0.05, 0.0));
        assert!(!is_close(1.0, 1.2, 0.1, 0.0));
        assert!(is_close(0.0, 5.0, 0.1, 10.0));
    }
}
