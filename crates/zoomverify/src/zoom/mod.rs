//! Zoom-ratio verification.
//!
//! A zoom sweep is a sequence of [`ZoomTestData`], one per capture. The
//! verifier checks that marker size grows with the reported zoom ratio and
//! that the marker offset from the image center scales the same way between
//! lens switches of a logical multi-camera.

mod anchor;
mod collect;
mod config;
mod params;
mod verify;

pub use collect::{collect_zoom_test_data, Capture};
pub use config::{SizeBaseline, VerifyConfig};
pub use params::{preview_zoom_params, PreviewZoomParams};
pub use verify::{verify_preview_zoom_results, verify_zoom_data, verify_zoom_results};

use serde::{Deserialize, Serialize};

use crate::marker::{Circle, MarkerObservation};

/// Zoom ratio (over the minimum) beyond which the chart circle may leave the
/// field of view.
pub const ZOOM_MAX_THRESH: f64 = 9.0;
/// Relative tolerance on the tested zoom range.
pub const ZOOM_RTOL: f64 = 0.01;
/// Relative tolerance between requested and reported preview zoom.
pub const PRV_Z_RTOL: f64 = 0.02;
/// Preferred zoom ratio of the size reference capture.
pub const PREFERRED_BASE_ZOOM_RATIO: f64 = 1.0;
pub const PREFERRED_BASE_ZOOM_RATIO_RTOL: f64 = 0.1;
/// Absolute offset tolerance in pixels.
pub const OFFSET_ATOL_PX: f64 = 10.0;
/// Absolute slack for offset monotonicity within one camera segment.
pub const OFFSET_MONOTONICITY_ATOL_PX: f64 = 20.0;

/// Measurements of one zoom capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomTestData {
    /// Zoom ratio reported in the capture result.
    pub result_zoom: f64,
    /// Detected reference marker.
    pub marker: MarkerObservation,
    /// Relative tolerance for the size ratio check.
    pub radius_tol: f64,
    /// Relative tolerance for the offset check.
    pub offset_tol: f64,
    /// Focal length of the active lens; a change marks a camera switch.
    pub focal_length: f64,
    /// Active physical camera of a logical multi-camera, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_id: Option<String>,
}

impl ZoomTestData {
    pub fn new(
        result_zoom: f64,
        marker: impl Into<MarkerObservation>,
        radius_tol: f64,
        offset_tol: f64,
        focal_length: f64,
    ) -> Self {
        Self {
            result_zoom,
            marker: marker.into(),
            radius_tol,
            offset_tol,
            focal_length,
            physical_id: None,
        }
    }

    pub fn with_physical_id(mut self, id: impl Into<String>) -> Self {
        self.physical_id = Some(id.into());
        self
    }

    /// Detected circle, when the marker is a chart circle.
    pub fn circle(&self) -> Option<Circle> {
        self.marker.circle()
    }
}

impl std::fmt::Display for ZoomTestData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "result_zoom: {:.2}, ", self.result_zoom)?;
        match &self.marker {
            MarkerObservation::Circle(c) => {
                write!(f, "circle: [{:.2}, {:.2}, {:.2}], ", c.x, c.y, c.radius)?
            }
            MarkerObservation::Aruco { id, corners } => {
                write!(f, "aruco_id: {id}, aruco_corners: [")?;
                for (i, c) in corners.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "({:.2}, {:.2})", c[0], c[1])?;
                }
                write!(f, "], ")?
            }
        }
        write!(
            f,
            "radius_tol: {:.2}, offset_tol: {:.2}, focal_length: {:.2}, physical_id: {}",
            self.radius_tol,
            self.offset_tol,
            self.focal_length,
            self.physical_id.as_deref().unwrap_or("None")
        )
    }
}
