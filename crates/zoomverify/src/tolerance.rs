//! Per-focal-length tolerances derived from the test rig and camera optics.
//!
//! A lens that cannot focus at the chart distance sees a blurrier, less
//! stable marker, so its size and offset tolerances are loosened.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZoomError};
use crate::marker::is_close;

/// Radius and offset relative tolerances used for one focal length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TolerancePair {
    pub radius_rtol: f64,
    pub offset_rtol: f64,
}

impl TolerancePair {
    pub const TIGHT: Self = Self {
        radius_rtol: 0.10,
        offset_rtol: 0.15,
    };
    pub const LOOSE: Self = Self {
        radius_rtol: 0.15,
        offset_rtol: 0.30,
    };
}

impl Default for TolerancePair {
    fn default() -> Self {
        Self::TIGHT
    }
}

/// Tolerance selection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    /// Used when the lens can focus on the chart.
    pub tight: TolerancePair,
    /// Used when the minimum focus distance is beyond the chart.
    pub loose: TolerancePair,
    /// Fraction of the chart distance the focus distance must stay under.
    pub min_focus_dist_tol: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            tight: TolerancePair::TIGHT,
            loose: TolerancePair::LOOSE,
            min_focus_dist_tol: 0.8,
        }
    }
}

impl ToleranceConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Pick the pair for a lens with minimum focus distance `min_fd`
    /// (diopters) and a chart at `chart_distance_m` meters.
    ///
    /// Returns the pair and whether it is the loosened one.
    pub fn select(&self, min_fd: f64, chart_distance_m: f64) -> (TolerancePair, bool) {
        let fixed_focus = is_close(min_fd, 0.0, 1e-6, 0.0);
        if fixed_focus || 1.0 / min_fd < chart_distance_m * self.min_focus_dist_tol {
            (self.tight, false)
        } else {
            (self.loose, true)
        }
    }
}

/// Optics of one physical camera behind a logical multi-camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalCamera {
    pub id: String,
    /// Whether the camera supports YUV output and can be tested.
    #[serde(default = "default_true")]
    pub backward_compatible: bool,
    /// Minimum focus distance in diopters; 0 for fixed focus.
    pub min_focus_distance: f64,
    pub focal_lengths: Vec<f64>,
    /// Supported YUV output sizes `[w, h]`.
    #[serde(default)]
    pub yuv_sizes: Vec<[u32; 2]>,
}

fn default_true() -> bool {
    true
}

/// Tolerance assigned to one focal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceEntry {
    pub focal_length: f64,
    pub camera_id: String,
    pub tolerance: TolerancePair,
    pub loosened: bool,
}

/// Focal length to tolerance mapping plus the capture size all tested
/// cameras support.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToleranceTable {
    pub entries: Vec<ToleranceEntry>,
    /// Largest YUV size common to all included cameras.
    pub common_size: Option<[u32; 2]>,
    /// Used for focal lengths missing from `entries`.
    #[serde(default)]
    pub fallback: TolerancePair,
}

/// Relative tolerance for matching a reported focal length to a table key.
const FOCAL_LENGTH_RTOL: f64 = 1e-3;

impl ToleranceTable {
    /// Build the table for the backward-compatible cameras of a logical
    /// camera placed `chart_distance_cm` from the chart.
    pub fn build(
        cameras: &[PhysicalCamera],
        chart_distance_cm: f64,
        config: &ToleranceConfig,
    ) -> Result<Self> {
        if !chart_distance_cm.is_finite() || chart_distance_cm == 0.0 {
            return Err(ZoomError::invalid("chart_distance_cm", chart_distance_cm));
        }
        let chart_distance_m = chart_distance_cm.abs() / 100.0;

        let supported: Vec<&PhysicalCamera> =
            cameras.iter().filter(|c| c.backward_compatible).collect();
        if supported.is_empty() {
            return Err(ZoomError::NoSupportedCameras);
        }

        let mut table = Self {
            fallback: config.tight,
            ..Self::default()
        };
        for cam in &supported {
            tracing::debug!("cam[{}] yuv sizes: {:?}", cam.id, cam.yuv_sizes);
            for &fl in &cam.focal_lengths {
                let (tolerance, loosened) = config.select(cam.min_focus_distance, chart_distance_m);
                tracing::debug!(
                    "cam[{}] min_fd: {:.3} (diopters), fl: {:.2}",
                    cam.id,
                    cam.min_focus_distance,
                    fl
                );
                if loosened {
                    tracing::debug!(
                        "loosening RTOL for cam[{}]: min focus distance too large",
                        cam.id
                    );
                }
                table.insert(ToleranceEntry {
                    focal_length: fl,
                    camera_id: cam.id.clone(),
                    tolerance,
                    loosened,
                });
            }
        }

        table.common_size = largest_common_size(&supported);
        tracing::debug!("common size: {:?}", table.common_size);
        Ok(table)
    }

    /// Same pair for every focal length, for cameras that are not logical
    /// multi-cameras.
    pub fn uniform(focal_lengths: &[f64], tolerance: TolerancePair) -> Self {
        let mut table = Self {
            fallback: tolerance,
            ..Self::default()
        };
        for &fl in focal_lengths {
            table.insert(ToleranceEntry {
                focal_length: fl,
                camera_id: String::new(),
                tolerance,
                loosened: false,
            });
        }
        table
    }

    /// Later cameras overwrite earlier ones sharing a focal length.
    fn insert(&mut self, entry: ToleranceEntry) {
        match self.position(entry.focal_length) {
            Some(i) => self.entries[i] = entry,
            None => self.entries.push(entry),
        }
    }

    fn position(&self, focal_length: f64) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| is_close(e.focal_length, focal_length, FOCAL_LENGTH_RTOL, 0.0))
    }

    pub fn get(&self, focal_length: f64) -> Option<TolerancePair> {
        self.position(focal_length).map(|i| self.entries[i].tolerance)
    }

    /// Tolerance for `focal_length`, or the fallback pair if it is unknown.
    pub fn lookup(&self, focal_length: f64) -> TolerancePair {
        self.get(focal_length).unwrap_or_else(|| {
            tracing::debug!("focal length {:.2} not in table, using fallback", focal_length);
            self.fallback
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Lexicographically largest `[w, h]` shared by all cameras.
fn largest_common_size(cameras: &[&PhysicalCamera]) -> Option<[u32; 2]> {
    let (first, rest) = cameras.split_first()?;
    let mut common: BTreeSet<[u32; 2]> = first.yuv_sizes.iter().copied().collect();
    for cam in rest {
        let sizes: BTreeSet<[u32; 2]> = cam.yuv_sizes.iter().copied().collect();
        common.retain(|s| sizes.contains(s));
    }
    common.last().copied()
}
