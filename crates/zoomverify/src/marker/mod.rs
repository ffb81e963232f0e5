//! Reference-marker geometry and detection.
//!
//! A zoom capture is reduced to one [`MarkerObservation`]: either a dark chart
//! circle found by [`CircleDetector`], or an ArUco tag whose corners come from
//! an external tag detector. Both expose a center and a linear size, which is
//! all the zoom verifier needs.

mod aruco;
mod circle;
mod fit;

pub use aruco::{select_shared_aruco_marker, ArucoDetection, SharedMarker};
pub use circle::{CircleCandidate, CircleDetectConfig, CircleDetector, MarkerColor};
pub(crate) use circle::is_close;
pub use fit::fit_circle_lsq;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Circle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// Center x (pixels).
    pub x: f64,
    /// Center y (pixels).
    pub y: f64,
    /// Radius (pixels).
    pub radius: f64,
}

impl Circle {
    pub fn new(x: f64, y: f64, radius: f64) -> Self {
        Self { x, y, radius }
    }

    /// `[center_x, center_y, radius]`.
    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.radius]
    }

    /// Whether any part of the circle falls outside a `size = [w, h]` image.
    pub fn is_cropped(&self, size: [u32; 2]) -> bool {
        let max_x = size[0].saturating_sub(1) as f64;
        let max_y = size[1].saturating_sub(1) as f64;
        self.x - self.radius < 0.0
            || self.x + self.radius > max_x
            || self.y - self.radius < 0.0
            || self.y + self.radius > max_y
    }
}

impl From<[f64; 3]> for Circle {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// ArUco tag corners, clockwise from top-left.
pub type ArucoCorners = [[f64; 2]; 4];

/// Center of an ArUco tag (mean of its corners).
pub fn aruco_center(corners: &ArucoCorners) -> [f64; 2] {
    let sx: f64 = corners.iter().map(|c| c[0]).sum();
    let sy: f64 = corners.iter().map(|c| c[1]).sum();
    [sx / 4.0, sy / 4.0]
}

/// Mean side length of an ArUco tag.
pub fn aruco_side_length(corners: &ArucoCorners) -> f64 {
    (0..4)
        .map(|i| {
            let a = corners[i];
            let b = corners[(i + 1) % 4];
            (b[0] - a[0]).hypot(b[1] - a[1])
        })
        .sum::<f64>()
        / 4.0
}

/// Integer image center `(w / 2, h / 2)`, matching how charts are centered on
/// the sensor grid.
pub fn image_center(size: [u32; 2]) -> [f64; 2] {
    [(size[0] / 2) as f64, (size[1] / 2) as f64]
}

/// One detected reference marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkerObservation {
    Circle(Circle),
    Aruco { id: i32, corners: ArucoCorners },
}

impl MarkerObservation {
    /// Marker center in pixels.
    pub fn center(&self) -> [f64; 2] {
        match self {
            Self::Circle(c) => [c.x, c.y],
            Self::Aruco { corners, .. } => aruco_center(corners),
        }
    }

    /// Linear marker size: radius for circles, mean side length for tags.
    pub fn size(&self) -> f64 {
        match self {
            Self::Circle(c) => c.radius,
            Self::Aruco { corners, .. } => aruco_side_length(corners),
        }
    }

    /// Signed `(dx, dy)` from the image center to the marker center.
    pub fn offset_xy(&self, size: [u32; 2]) -> [f64; 2] {
        let [cx, cy] = self.center();
        let [ix, iy] = image_center(size);
        [cx - ix, cy - iy]
    }

    /// Euclidean distance from the image center to the marker center.
    pub fn offset(&self, size: [u32; 2]) -> f64 {
        let [dx, dy] = self.offset_xy(size);
        dx.hypot(dy)
    }

    pub fn circle(&self) -> Option<Circle> {
        match self {
            Self::Circle(c) => Some(*c),
            Self::Aruco { .. } => None,
        }
    }
}

impl From<Circle> for MarkerObservation {
    fn from(c: Circle) -> Self {
        Self::Circle(c)
    }
}

/// Locates the reference marker in a capture.
///
/// `Ok(None)` means the marker is legitimately out of view (zoom beyond the
/// detector's range or marker cropped); the capture loop stops there.
/// `Err` means the marker should have been visible.
pub trait MarkerDetector {
    fn locate(&self, image: &GrayImage, zoom_ratio: f64) -> Result<Option<MarkerObservation>>;
}
