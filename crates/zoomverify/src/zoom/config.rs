use serde::{Deserialize, Serialize};

use super::{
    OFFSET_ATOL_PX, OFFSET_MONOTONICITY_ATOL_PX, PREFERRED_BASE_ZOOM_RATIO,
    PREFERRED_BASE_ZOOM_RATIO_RTOL, PRV_Z_RTOL, ZOOM_MAX_THRESH, ZOOM_RTOL,
};

/// Which capture the size ratio of a frame is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeBaseline {
    /// One base for the whole sweep: the preferred ~1x capture.
    #[default]
    Global,
    /// The base moves to the first capture of every lens segment.
    PerCamera,
}

/// Zoom verification parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Absolute offset tolerance (pixels).
    pub offset_atol_px: f64,
    /// Relative tolerance on the tested zoom range.
    pub zoom_rtol: f64,
    /// Relative tolerance on preview zoom endpoints.
    pub preview_zoom_rtol: f64,
    /// Zoom preferred for the size base when the sweep starts below it.
    pub preferred_base_zoom: f64,
    pub preferred_base_zoom_rtol: f64,
    /// Upper bound on the tested zoom range (over the minimum).
    pub zoom_max_thresh: f64,
    /// Check that offsets within a lens segment move in one direction.
    pub check_offset_monotonicity: bool,
    pub monotonicity_atol_px: f64,
    pub size_baseline: SizeBaseline,
    /// Minimum number of distinct physical cameras seen; 0 disables the check.
    pub min_cameras_tested: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            offset_atol_px: OFFSET_ATOL_PX,
            zoom_rtol: ZOOM_RTOL,
            preview_zoom_rtol: PRV_Z_RTOL,
            preferred_base_zoom: PREFERRED_BASE_ZOOM_RATIO,
            preferred_base_zoom_rtol: PREFERRED_BASE_ZOOM_RATIO_RTOL,
            zoom_max_thresh: ZOOM_MAX_THRESH,
            check_offset_monotonicity: true,
            monotonicity_atol_px: OFFSET_MONOTONICITY_ATOL_PX,
            size_baseline: SizeBaseline::Global,
            min_cameras_tested: 0,
        }
    }
}

impl VerifyConfig {
    /// Load from JSON; missing fields take their defaults.
    pub fn from_json_file(path: &std::path::Path) -> crate::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: VerifyConfig =
            serde_json::from_str(r#"{"size_baseline":"per_camera","min_cameras_tested":2}"#)
                .expect("parse");
        assert_eq!(cfg.size_baseline, SizeBaseline::PerCamera);
        assert_eq!(cfg.min_cameras_tested, 2);
        assert_eq!(cfg.offset_atol_px, OFFSET_ATOL_PX);
        assert!(cfg.check_offset_monotonicity);
    }
}
