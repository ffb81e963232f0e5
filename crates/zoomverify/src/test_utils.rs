//! Synthetic chart images for unit tests and benches.

use image::{GrayImage, Luma};

use crate::marker::Circle;

/// Render filled discs on a flat background.
///
/// A pixel belongs to a disc when its center lies within `radius` of the disc
/// center.
pub fn draw_circles_image(w: u32, h: u32, circles: &[Circle], fg: u8, bg: u8) -> GrayImage {
    let mut img = GrayImage::from_pixel(w, h, Luma([bg]));
    for c in circles {
        let x0 = (c.x - c.radius).floor().max(0.0) as u32;
        let y0 = (c.y - c.radius).floor().max(0.0) as u32;
        let x1 = ((c.x + c.radius).ceil() as u32).min(w.saturating_sub(1));
        let y1 = ((c.y + c.radius).ceil() as u32).min(h.saturating_sub(1));
        for y in y0..=y1 {
            for x in x0..=x1 {
                let d = (x as f64 - c.x).hypot(y as f64 - c.y);
                if d <= c.radius {
                    img.put_pixel(x, y, Luma([fg]));
                }
            }
        }
    }
    img
}

/// Render one filled axis-aligned square of side `2 * half`.
pub fn draw_square_image(w: u32, h: u32, center: [f64; 2], half: f64, fg: u8, bg: u8) -> GrayImage {
    let mut img = GrayImage::from_pixel(w, h, Luma([bg]));
    for y in 0..h {
        for x in 0..w {
            if (x as f64 - center[0]).abs() <= half && (y as f64 - center[1]).abs() <= half {
                img.put_pixel(x, y, Luma([fg]));
            }
        }
    }
    img
}

/// Render the chart as seen at `zoom` relative to a 1x view.
///
/// Every 1x circle is scaled about the image center, so both radius and
/// offset grow linearly with zoom.
pub fn draw_zoomed_chart(w: u32, h: u32, circles_1x: &[Circle], zoom: f64) -> GrayImage {
    let cx = (w / 2) as f64;
    let cy = (h / 2) as f64;
    let zoomed: Vec<Circle> = circles_1x
        .iter()
        .map(|c| Circle::new(cx + (c.x - cx) * zoom, cy + (c.y - cy) * zoom, c.radius * zoom))
        .collect();
    draw_circles_image(w, h, &zoomed, 20, 230)
}
