//! Overlay of the detection result on a capture.

use std::path::Path;

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_circle_mut, draw_line_segment_mut};

use crate::error::{Result, ZoomError};
use crate::marker::{aruco_center, image_center, MarkerObservation};

const CENTER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// RGB copy of `gray` with the image center and the marker drawn on top.
pub fn annotate_capture(gray: &GrayImage, marker: Option<&MarkerObservation>) -> RgbImage {
    let mut rgb = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });
    let [ix, iy] = image_center([gray.width(), gray.height()]);
    draw_cross_mut(&mut rgb, CENTER_COLOR, ix as i32, iy as i32);

    match marker {
        Some(MarkerObservation::Circle(c)) => {
            let center = (c.x.round() as i32, c.y.round() as i32);
            draw_hollow_circle_mut(&mut rgb, center, c.radius.round() as i32, MARKER_COLOR);
            draw_cross_mut(&mut rgb, MARKER_COLOR, center.0, center.1);
        }
        Some(MarkerObservation::Aruco { corners, .. }) => {
            for i in 0..4 {
                let a = corners[i];
                let b = corners[(i + 1) % 4];
                draw_line_segment_mut(
                    &mut rgb,
                    (a[0] as f32, a[1] as f32),
                    (b[0] as f32, b[1] as f32),
                    MARKER_COLOR,
                );
            }
            let [cx, cy] = aruco_center(corners);
            draw_cross_mut(&mut rgb, MARKER_COLOR, cx.round() as i32, cy.round() as i32);
        }
        None => {}
    }
    rgb
}

/// Annotate and write to `path`; the format follows the extension.
pub fn save_annotated(
    gray: &GrayImage,
    marker: Option<&MarkerObservation>,
    path: &Path,
) -> Result<()> {
    annotate_capture(gray, marker)
        .save(path)
        .map_err(|e| ZoomError::image(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Circle;

    #[test]
    fn draws_center_and_circle() {
        let gray = GrayImage::from_pixel(100, 80, image::Luma([128]));
        let marker = MarkerObservation::Circle(Circle::new(30.0, 40.0, 10.0));
        let rgb = annotate_capture(&gray, Some(&marker));
        assert_eq!(rgb.dimensions(), (100, 80));
        assert_eq!(*rgb.get_pixel(50, 40), CENTER_COLOR);
        assert_eq!(*rgb.get_pixel(40, 40), MARKER_COLOR);
        assert_eq!(*rgb.get_pixel(5, 5), Rgb([128, 128, 128]));
    }

    #[test]
    fn draws_aruco_outline() {
        let gray = GrayImage::from_pixel(100, 80, image::Luma([0]));
        let marker = MarkerObservation::Aruco {
            id: 3,
            corners: [[10.0, 10.0], [30.0, 10.0], [30.0, 30.0], [10.0, 30.0]],
        };
        let rgb = annotate_capture(&gray, Some(&marker));
        assert_eq!(*rgb.get_pixel(20, 10), MARKER_COLOR);
        assert_eq!(*rgb.get_pixel(10, 20), MARKER_COLOR);
    }
}
