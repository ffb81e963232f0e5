//! zoomverify — camera zoom-ratio verification from chart captures.
//!
//! A zoom sweep captures a chart at a series of zoom ratios. For each capture
//! a reference marker (dark chart circle or ArUco tag) is located and reduced
//! to a center and a linear size. The sweep passes when:
//!
//! 1. **Size** – marker size over the base capture matches the reported zoom
//!    ratio over the base zoom, within the lens' radius tolerance.
//! 2. **Offset** – marker distance from the image center, scaled back to the
//!    zoom at which the current lens took over, stays constant.
//! 3. **Range** – the sweep spans the expected zoom range.
//!
//! Tolerances depend on whether each lens can focus at the rig's chart
//! distance; see [`ToleranceTable`].
//!
//! # Public API
//! - [`CircleDetector`] / [`MarkerDetector`] to locate markers
//! - [`select_shared_aruco_marker`] for externally detected ArUco tags
//! - [`verify_zoom_data`], [`verify_zoom_results`], [`verify_preview_zoom_results`]
//! - [`ZoomVerification`] with per-frame records, failures and statistics

mod error;
pub mod annotate;
pub mod marker;
pub mod plot;
mod report;
mod tolerance;
pub mod zoom;

#[cfg(test)]
mod test_utils;

pub use error::{Result, ZoomError};
pub use marker::{
    select_shared_aruco_marker, ArucoCorners, ArucoDetection, Circle, CircleCandidate,
    CircleDetectConfig, CircleDetector, MarkerColor, MarkerDetector, MarkerObservation,
    SharedMarker,
};
pub use report::{Failure, FrameRecord, OffsetCheck, VariationStats, ZoomVerification};
pub use tolerance::{
    PhysicalCamera, ToleranceConfig, ToleranceEntry, TolerancePair, ToleranceTable,
};
pub use zoom::{
    collect_zoom_test_data, preview_zoom_params, verify_preview_zoom_results, verify_zoom_data,
    verify_zoom_results, Capture, PreviewZoomParams, SizeBaseline, VerifyConfig, ZoomTestData,
};
