//! Shared ArUco marker selection across a zoom sweep.
//!
//! Tag detection itself happens upstream; this module only decides which tag
//! to follow. The followed tag must be visible in every capture, and among
//! those the one that stays closest to the image center on average is chosen
//! so it survives the narrowest field of view.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{ArucoCorners, MarkerObservation};
use crate::error::{Result, ZoomError};

/// One tag reported by an ArUco detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArucoDetection {
    pub id: i32,
    pub corners: ArucoCorners,
}

impl ArucoDetection {
    pub fn observation(&self) -> MarkerObservation {
        MarkerObservation::Aruco {
            id: self.id,
            corners: self.corners,
        }
    }
}

/// Tag chosen by [`select_shared_aruco_marker`] with one observation per capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedMarker {
    pub id: i32,
    /// Mean offset from the image center over all captures (pixels).
    pub mean_offset: f64,
    pub observations: Vec<MarkerObservation>,
}

/// Pick the tag visible in all captures that is closest to the image center
/// on average. Ties go to the lower ID.
pub fn select_shared_aruco_marker(
    detections: &[Vec<ArucoDetection>],
    size: [u32; 2],
) -> Result<SharedMarker> {
    let Some(first) = detections.first() else {
        return Err(ZoomError::NoSharedMarker { captures: 0 });
    };

    let mut shared: BTreeSet<i32> = first.iter().map(|d| d.id).collect();
    for capture in &detections[1..] {
        let ids: BTreeSet<i32> = capture.iter().map(|d| d.id).collect();
        shared.retain(|id| ids.contains(id));
    }

    let mut best: Option<(i32, f64)> = None;
    for &id in &shared {
        let mean = mean_offset(id, detections, size);
        tracing::trace!("shared aruco id {} mean offset {:.1}", id, mean);
        if best.map_or(true, |(_, b)| mean < b) {
            best = Some((id, mean));
        }
    }
    let Some((id, mean_offset)) = best else {
        return Err(ZoomError::NoSharedMarker {
            captures: detections.len(),
        });
    };
    tracing::debug!("using shared aruco id {}", id);

    let observations = detections
        .iter()
        .filter_map(|capture| find(capture, id).map(ArucoDetection::observation))
        .collect();

    Ok(SharedMarker {
        id,
        mean_offset,
        observations,
    })
}

fn find(capture: &[ArucoDetection], id: i32) -> Option<&ArucoDetection> {
    capture.iter().find(|d| d.id == id)
}

fn mean_offset(id: i32, detections: &[Vec<ArucoDetection>], size: [u32; 2]) -> f64 {
    let offsets: Vec<f64> = detections
        .iter()
        .filter_map(|capture| find(capture, id))
        .map(|d| d.observation().offset(size))
        .collect();
    if offsets.is_empty() {
        return f64::INFINITY;
    }
    offsets.iter().sum::<f64>() / offsets.len() as f64
}
