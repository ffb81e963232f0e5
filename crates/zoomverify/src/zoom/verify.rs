//! Size and offset checks over a zoom sweep.

use std::collections::BTreeSet;

use tracing::{debug, error, info};

use super::anchor::{Anchor, AnchorStep};
use super::{SizeBaseline, VerifyConfig, ZoomTestData};
use crate::error::{Result, ZoomError};
use crate::marker::is_close;
use crate::report::{Failure, FrameRecord, OffsetCheck, VariationStats, ZoomVerification};

/// Verify that marker size and offset follow the reported zoom ratios.
///
/// Every frame is checked even after a failure, so the returned
/// [`ZoomVerification`] lists all violations. Fails with
/// [`ZoomError::EmptyTestData`] on an empty sweep.
pub fn verify_zoom_data(
    test_data: &[ZoomTestData],
    size: [u32; 2],
    config: &VerifyConfig,
) -> Result<ZoomVerification> {
    if test_data.is_empty() {
        return Err(ZoomError::EmptyTestData);
    }
    for (i, d) in test_data.iter().enumerate() {
        let size = d.marker.size();
        if !(size.is_finite() && size > 0.0) {
            let value = format!("{size} at frame {i}");
            return Err(ZoomError::invalid("marker size", value));
        }
        if !(d.result_zoom.is_finite() && d.result_zoom > 0.0) {
            let value = format!("{} at frame {i}", d.result_zoom);
            return Err(ZoomError::invalid("result_zoom", value));
        }
    }
    let mut failures = Vec::new();

    let ids: BTreeSet<Option<&str>> = test_data.iter().map(|d| d.physical_id.as_deref()).collect();
    let cameras_tested = ids.len();
    if cameras_tested < config.min_cameras_tested {
        let f = Failure::TooFewCameras {
            expected: config.min_cameras_tested,
            found: cameras_tested,
        };
        error!("{f}; found IDs: {ids:?}");
        failures.push(f);
    }

    let base_frame = size_base_index(test_data, config);
    let mut base_zoom = test_data[base_frame].result_zoom;
    let mut base_size = test_data[base_frame].marker.size();
    let (global_zoom, global_size) = (base_zoom, base_size);
    debug!("z_0: {:.3}, size_0: {:.3}", base_zoom, base_size);

    let mut anchor = Anchor::default();
    let mut segment: Vec<(usize, f64)> = Vec::new();
    let mut frames = Vec::with_capacity(test_data.len());

    for (i, data) in test_data.iter().enumerate() {
        debug!("frame {i} {{{data}}}");
        let offset_xy = data.marker.offset_xy(size);
        let offset = offset_xy[0].hypot(offset_xy[1]);

        let step = anchor.observe(
            data.result_zoom,
            offset,
            data.focal_length,
            data.physical_id.as_deref(),
        );

        if let AnchorStep::Reanchored { switched: true } = step {
            if config.size_baseline == SizeBaseline::PerCamera {
                base_zoom = data.result_zoom;
                base_size = data.marker.size();
            }
            debug!(
                "camera switch at frame {i} to {}: zoom {:.2}, offset init {:.1}",
                anchor.physical_id().unwrap_or("?"),
                data.result_zoom,
                offset
            );
            if config.check_offset_monotonicity && !segment.is_empty() {
                debug!("offsets while transitioning: {:?}", segment);
                if let Some(f) = check_monotonic(&segment, config.monotonicity_atol_px) {
                    error!("{f}");
                    failures.push(f);
                }
            }
            segment.clear();
        }

        // Size ratio against the current base.
        let size_now = data.marker.size();
        let z_ratio = data.result_zoom / base_zoom;
        let size_ratio = size_now / base_size;
        let z_variation = z_ratio - size_ratio;
        let rel_variation = z_variation.abs() / z_ratio.abs().max(size_ratio.abs());
        let size_ok = is_close(z_ratio, size_ratio, data.radius_tol, 0.0);
        if size_ok {
            debug!(
                "{i} size ratio: result({:.3}/{:.3}): {:.3}, marker({:.3}/{:.3}): {:.3}, RTOL: {}",
                data.result_zoom,
                base_zoom,
                z_ratio,
                size_now,
                base_size,
                size_ratio,
                data.radius_tol
            );
        } else {
            let f = Failure::Size {
                frame: i,
                result_zoom: data.result_zoom,
                z_ratio,
                size_ratio,
                rtol: data.radius_tol,
            };
            error!("{f}");
            failures.push(f);
        }

        // Offset scaled back to the anchor zoom.
        let offset_check = match step {
            AnchorStep::Reanchored { .. } => OffsetCheck::Anchor,
            AnchorStep::Continue {
                zoom: anchor_zoom,
                offset: anchor_offset,
            } => {
                segment.push((i, offset));
                let relative_offset = offset / (data.result_zoom / anchor_zoom);
                let ok = is_close(
                    anchor_offset,
                    relative_offset,
                    data.offset_tol,
                    config.offset_atol_px,
                );
                if ok {
                    debug!(
                        "{i} zoom: {:.2}, offset init: {:.1}, offset rel: {:.1}, dist: {:.1}",
                        data.result_zoom,
                        anchor_offset,
                        relative_offset,
                        offset
                    );
                } else {
                    let f = Failure::Offset {
                        frame: i,
                        result_zoom: data.result_zoom,
                        anchor_offset,
                        relative_offset,
                        rtol: data.offset_tol,
                        atol: config.offset_atol_px,
                    };
                    error!("{f}");
                    failures.push(f);
                }
                OffsetCheck::Checked {
                    anchor_offset,
                    relative_offset,
                    ok,
                }
            }
        };

        frames.push(FrameRecord {
            index: i,
            result_zoom: data.result_zoom,
            focal_length: data.focal_length,
            physical_id: data.physical_id.clone(),
            marker_size: size_now,
            offset_xy,
            offset,
            z_ratio,
            size_ratio,
            z_variation,
            rel_variation,
            radius_tol: data.radius_tol,
            offset_tol: data.offset_tol,
            size_ok,
            offset_check,
        });
    }

    let stats = VariationStats::from_frames(&frames);
    info!(
        "max_rel_variation: {:.4} at zoom {:.2}, rms_z_variation: {:.4}, rms_rel_variation: {:.4}",
        stats.max_rel_variation,
        stats.max_rel_variation_zoom,
        stats.rms_z_variation,
        stats.rms_rel_variation
    );

    Ok(ZoomVerification {
        passed: failures.is_empty(),
        image_size: size,
        base_frame,
        base_zoom: global_zoom,
        base_size: global_size,
        cameras_tested,
        frames,
        failures,
        stats,
    })
}

/// Check that the sweep spans `min(zoom_max_thresh, z_max / z_min)`, then
/// run [`verify_zoom_data`].
pub fn verify_zoom_results(
    test_data: &[ZoomTestData],
    size: [u32; 2],
    z_max: f64,
    z_min: f64,
    config: &VerifyConfig,
) -> Result<ZoomVerification> {
    let (lo, hi) = zoom_extent(test_data)?;
    if !(z_min > 0.0) {
        return Err(ZoomError::invalid("z_min", z_min));
    }
    let expected = config.zoom_max_thresh.min(z_max / z_min);
    let tested = hi / lo;
    debug!("tested zoom range {:.2} vs expected {:.2}", tested, expected);

    let mut pre = Vec::new();
    if !is_close(tested, expected, config.zoom_rtol, 0.0) {
        let f = Failure::ZoomRange {
            tested,
            expected,
            rtol: config.zoom_rtol,
        };
        error!("{f}");
        pre.push(f);
    }
    Ok(verify_zoom_data(test_data, size, config)?.with_precheck(pre))
}

/// Check the preview sweep endpoints, then run [`verify_zoom_data`].
///
/// The largest result zoom may match either `z_max` or `z_max - z_step`
/// since the last step can be dropped when the marker leaves the view.
pub fn verify_preview_zoom_results(
    test_data: &[ZoomTestData],
    size: [u32; 2],
    z_max: f64,
    z_min: f64,
    z_step: f64,
    config: &VerifyConfig,
) -> Result<ZoomVerification> {
    let (lo, hi) = zoom_extent(test_data)?;
    let rtol = config.preview_zoom_rtol;
    debug!("capture result: min zoom: {:.2} vs max zoom: {:.2}", lo, hi);

    let mut pre = Vec::new();
    let accepted = [z_max, z_max - z_step];
    if accepted.iter().any(|&z| is_close(hi, z, rtol, 0.0)) {
        debug!(
            "results_z_max = {:.2} is close to z_max = {:.2} or z_max-step = {:.2}",
            hi, accepted[0], accepted[1]
        );
    } else {
        let f = Failure::PreviewZoomMax {
            tested: hi,
            accepted: accepted.to_vec(),
            rtol,
        };
        error!("{f}");
        pre.push(f);
    }
    if !is_close(lo, z_min, rtol, 0.0) {
        let f = Failure::PreviewZoomMin {
            tested: lo,
            expected: z_min,
            rtol,
        };
        error!("{f}");
        pre.push(f);
    }
    Ok(verify_zoom_data(test_data, size, config)?.with_precheck(pre))
}

/// First capture, or the first capture at the preferred base zoom when the
/// sweep starts below it.
fn size_base_index(test_data: &[ZoomTestData], config: &VerifyConfig) -> usize {
    let preferred = config.preferred_base_zoom;
    if test_data[0].result_zoom >= preferred {
        return 0;
    }
    test_data
        .iter()
        .position(|d| {
            d.result_zoom >= preferred
                && is_close(d.result_zoom, preferred, config.preferred_base_zoom_rtol, 0.0)
        })
        .unwrap_or(0)
}

fn zoom_extent(test_data: &[ZoomTestData]) -> Result<(f64, f64)> {
    if test_data.is_empty() {
        return Err(ZoomError::EmptyTestData);
    }
    Ok(test_data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
        (lo.min(d.result_zoom), hi.max(d.result_zoom))
    }))
}

/// `None` when the offsets are non-decreasing or non-increasing within `atol`.
fn check_monotonic(segment: &[(usize, f64)], atol: f64) -> Option<Failure> {
    let increasing = segment.windows(2).all(|w| w[0].1 < w[1].1 + atol);
    let decreasing = segment.windows(2).all(|w| w[0].1 > w[1].1 - atol);
    if increasing || decreasing {
        return None;
    }
    Some(Failure::OffsetNotMonotonic {
        frames: segment.iter().map(|s| s.0).collect(),
        offsets: segment.iter().map(|s| s.1).collect(),
    })
}
