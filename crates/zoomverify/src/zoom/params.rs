use serde::{Deserialize, Serialize};

use super::ZOOM_MAX_THRESH;
use crate::error::{Result, ZoomError};

/// Zoom sweep for a smooth preview zoom test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreviewZoomParams {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl PreviewZoomParams {
    /// Requested zoom ratios from `min` to `max` inclusive.
    pub fn ratios(&self) -> Vec<f64> {
        if self.step <= 0.0 {
            return vec![self.min];
        }
        let n = ((self.max - self.min) / self.step).round() as usize;
        (0..=n).map(|i| self.min + i as f64 * self.step).collect()
    }
}

/// Derive the preview sweep from the camera zoom range.
///
/// The maximum is capped at `ZOOM_MAX_THRESH * min` so the chart circle stays
/// in view.
pub fn preview_zoom_params(zoom_range: [f64; 2], steps: usize) -> Result<PreviewZoomParams> {
    if steps < 2 {
        return Err(ZoomError::invalid("steps", steps));
    }
    let [min, max] = zoom_range;
    if !(min > 0.0) || !(max >= min) {
        return Err(ZoomError::invalid("zoom_range", format!("{zoom_range:?}")));
    }
    let max = max.min(ZOOM_MAX_THRESH * min);
    let step = (max - min) / (steps - 1) as f64;
    tracing::debug!(
        "zoom range {:?}: z_min = {}, z_max = {}, z_step = {}",
        zoom_range,
        min,
        max,
        step
    );
    Ok(PreviewZoomParams { min, max, step })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn step_spans_range() {
        let p = preview_zoom_params([1.0, 5.0], 5).expect("params");
        assert_relative_eq!(p.max, 5.0);
        assert_relative_eq!(p.step, 1.0);
        assert_eq!(p.ratios().len(), 5);
    }

    #[test]
    fn max_is_capped() {
        let p = preview_zoom_params([0.5, 10.0], 11).expect("params");
        assert_relative_eq!(p.max, 4.5);
        assert_relative_eq!(p.step, 0.4);
        let r = p.ratios();
        assert_relative_eq!(r[r.len() - 1], 4.5, epsilon = 1e-9);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(preview_zoom_params([1.0, 5.0], 1).is_err());
        assert!(preview_zoom_params([0.0, 5.0], 3).is_err());
        assert!(preview_zoom_params([3.0, 2.0], 3).is_err());
    }
}
