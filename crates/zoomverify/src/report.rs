//! Verification outcome and its JSON form.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Result of the offset check for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OffsetCheck {
    /// The frame anchors a lens segment; nothing to compare against.
    Anchor,
    /// Offset scaled back to the anchor zoom and compared with the anchor's.
    Checked {
        anchor_offset: f64,
        relative_offset: f64,
        ok: bool,
    },
}

impl OffsetCheck {
    pub fn is_ok(&self) -> bool {
        match self {
            OffsetCheck::Anchor => true,
            OffsetCheck::Checked { ok, .. } => *ok,
        }
    }
}

/// Per-frame measurements and check results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub index: usize,
    pub result_zoom: f64,
    pub focal_length: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_id: Option<String>,
    /// Radius for circles, side length for ArUco tags (pixels).
    pub marker_size: f64,
    pub offset_xy: [f64; 2],
    pub offset: f64,
    /// Zoom ratio over the size base.
    pub z_ratio: f64,
    /// Marker size ratio over the size base.
    pub size_ratio: f64,
    /// `z_ratio - size_ratio`.
    pub z_variation: f64,
    /// `|z_variation| / max(|z_ratio|, |size_ratio|)`.
    pub rel_variation: f64,
    pub radius_tol: f64,
    pub offset_tol: f64,
    pub size_ok: bool,
    pub offset_check: OffsetCheck,
}

impl FrameRecord {
    pub fn passed(&self) -> bool {
        self.size_ok && self.offset_check.is_ok()
    }
}

/// One violated check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    Size {
        frame: usize,
        result_zoom: f64,
        z_ratio: f64,
        size_ratio: f64,
        rtol: f64,
    },
    Offset {
        frame: usize,
        result_zoom: f64,
        anchor_offset: f64,
        relative_offset: f64,
        rtol: f64,
        atol: f64,
    },
    /// Offsets within one lens segment change direction.
    OffsetNotMonotonic { frames: Vec<usize>, offsets: Vec<f64> },
    /// Tested zoom range does not span the expected range.
    ZoomRange { tested: f64, expected: f64, rtol: f64 },
    /// Largest preview zoom matches none of the accepted endpoints.
    PreviewZoomMax {
        tested: f64,
        accepted: Vec<f64>,
        rtol: f64,
    },
    PreviewZoomMin { tested: f64, expected: f64, rtol: f64 },
    TooFewCameras { expected: usize, found: usize },
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Size {
                frame,
                result_zoom,
                z_ratio,
                size_ratio,
                rtol,
            } => write!(
                f,
                "frame {frame} (zoom {result_zoom:.2}): size ratio {size_ratio:.4} \
                 differs from zoom ratio {z_ratio:.4}, RTOL: {rtol}"
            ),
            Failure::Offset {
                frame,
                result_zoom,
                anchor_offset,
                relative_offset,
                rtol,
                atol,
            } => write!(
                f,
                "frame {frame} (zoom {result_zoom:.2}): relative offset {relative_offset:.4} \
                 differs from anchor offset {anchor_offset:.4}, RTOL: {rtol}, ATOL: {atol}"
            ),
            Failure::OffsetNotMonotonic { frames, offsets } => {
                write!(f, "offsets of frames {frames:?} are not monotonic: [")?;
                for (i, o) in offsets.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{o:.2}")?;
                }
                write!(f, "]")
            }
            Failure::ZoomRange {
                tested,
                expected,
                rtol,
            } => write!(
                f,
                "tested zoom range {tested:.4} differs from expected {expected:.4}, RTOL: {rtol}"
            ),
            Failure::PreviewZoomMax {
                tested,
                accepted,
                rtol,
            } => write!(
                f,
                "max preview zoom {tested:.4} matches none of {accepted:?}, RTOL: {rtol}"
            ),
            Failure::PreviewZoomMin {
                tested,
                expected,
                rtol,
            } => write!(
                f,
                "min preview zoom {tested:.4} differs from {expected:.4}, RTOL: {rtol}"
            ),
            Failure::TooFewCameras { expected, found } => write!(
                f,
                "{found} physical cameras tested, expected at least {expected}"
            ),
        }
    }
}

/// Summary statistics of the size-vs-zoom variation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VariationStats {
    pub max_rel_variation: f64,
    /// Zoom of the frame with the largest relative variation.
    pub max_rel_variation_zoom: f64,
    pub rms_z_variation: f64,
    pub rms_rel_variation: f64,
}

impl VariationStats {
    pub fn from_frames(frames: &[FrameRecord]) -> Self {
        let Some(worst) = frames
            .iter()
            .max_by(|a, b| a.rel_variation.total_cmp(&b.rel_variation))
        else {
            return Self::default();
        };
        let n = frames.len() as f64;
        let rms = |f: fn(&FrameRecord) -> f64| -> f64 {
            (frames.iter().map(|r| f(r).powi(2)).sum::<f64>() / n).sqrt()
        };
        Self {
            max_rel_variation: worst.rel_variation,
            max_rel_variation_zoom: worst.result_zoom,
            rms_z_variation: rms(|r: &FrameRecord| r.z_variation),
            rms_rel_variation: rms(|r: &FrameRecord| r.rel_variation),
        }
    }
}

/// Outcome of a zoom verification run.
///
/// `passed` is true exactly when `failures` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomVerification {
    pub passed: bool,
    /// Image size `[w, h]` the offsets refer to.
    pub image_size: [u32; 2],
    /// Index of the frame used as the (global) size base.
    pub base_frame: usize,
    pub base_zoom: f64,
    pub base_size: f64,
    /// Distinct physical cameras seen.
    pub cameras_tested: usize,
    pub frames: Vec<FrameRecord>,
    pub failures: Vec<Failure>,
    pub stats: VariationStats,
}

impl ZoomVerification {
    /// Prepend failures found before the per-frame checks.
    pub(crate) fn with_precheck(mut self, mut failures: Vec<Failure>) -> Self {
        if failures.is_empty() {
            return self;
        }
        failures.append(&mut self.failures);
        self.failures = failures;
        self.passed = false;
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
