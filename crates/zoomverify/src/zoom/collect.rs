use std::borrow::Borrow;

use image::GrayImage;

use super::ZoomTestData;
use crate::error::Result;
use crate::marker::MarkerDetector;
use crate::tolerance::ToleranceTable;

/// One capture of a zoom sweep with its result metadata.
#[derive(Debug, Clone)]
pub struct Capture {
    pub image: GrayImage,
    /// Zoom ratio requested for the capture; detection is scaled by it.
    pub requested_zoom: f64,
    /// Zoom ratio reported by the capture result.
    pub result_zoom: f64,
    pub focal_length: f64,
    pub physical_id: Option<String>,
}

/// Run `detector` over a sweep and assemble the verifier input.
///
/// Stops at the first capture whose marker is out of view and returns what
/// was collected so far, so entry `i` of the result belongs to capture `i`.
/// Detection errors abort the sweep. Captures may be passed by value or by
/// reference.
pub fn collect_zoom_test_data<D, I, C>(
    captures: I,
    detector: &D,
    tolerances: &ToleranceTable,
) -> Result<Vec<ZoomTestData>>
where
    D: MarkerDetector + ?Sized,
    I: IntoIterator<Item = C>,
    C: Borrow<Capture>,
{
    let mut out = Vec::new();
    for (i, cap) in captures.into_iter().enumerate() {
        let cap = cap.borrow();
        let Some(marker) = detector.locate(&cap.image, cap.requested_zoom)? else {
            tracing::info!(
                "marker out of view at zoom {:.2} (capture {}), stopping sweep",
                cap.requested_zoom,
                i
            );
            break;
        };
        let tol = tolerances.lookup(cap.focal_length);
        let data = ZoomTestData {
            result_zoom: cap.result_zoom,
            marker,
            radius_tol: tol.radius_rtol,
            offset_tol: tol.offset_rtol,
            focal_length: cap.focal_length,
            physical_id: cap.physical_id.clone(),
        };
        tracing::debug!("capture {i}: {data}");
        out.push(data);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZoomError;
    use crate::marker::{Circle, CircleDetector};
    use crate::test_utils::draw_zoomed_chart;
    use crate::report::Failure;
    use crate::tolerance::TolerancePair;
    use crate::zoom::{verify_zoom_results, VerifyConfig};

    fn capture(zoom: f64, fl: f64) -> Capture {
        let chart = [Circle::new(350.0, 255.0, 40.0)];
        Capture {
            image: draw_zoomed_chart(640, 480, &chart, zoom),
            requested_zoom: zoom,
            result_zoom: zoom,
            focal_length: fl,
            physical_id: None,
        }
    }

    fn capture_on(zoom: f64, id: &str) -> Capture {
        Capture {
            physical_id: Some(id.to_string()),
            ..capture(zoom, 4.0)
        }
    }

    #[test]
    fn collects_until_marker_leaves_view() {
        // At 9x the circle (r = 360) no longer fits in the frame.
        let caps: Vec<Capture> = [1.0, 2.0, 3.0, 9.0, 10.0]
            .into_iter()
            .map(|z| capture(z, 4.0))
            .collect();
        let tols = ToleranceTable::uniform(&[4.0], TolerancePair::LOOSE);
        let data =
            collect_zoom_test_data(caps, &CircleDetector::default(), &tols).expect("collect");
        assert_eq!(data.len(), 3);
        assert_eq!(data[2].radius_tol, TolerancePair::LOOSE.radius_rtol);
        assert!((data[1].marker.size() - 80.0).abs() < 2.0);
    }

    #[test]
    fn blank_capture_below_threshold_is_error() {
        let blank = Capture {
            image: GrayImage::from_pixel(640, 480, image::Luma([200])),
            ..capture(2.0, 4.0)
        };
        let err = collect_zoom_test_data(
            vec![capture(1.0, 4.0), blank],
            &CircleDetector::default(),
            &ToleranceTable::default(),
        )
        .expect_err("must fail");
        assert!(matches!(err, ZoomError::MarkerNotFound { .. }));
        assert!(err.is_marker_miss());
    }

    #[test]
    fn borrowed_captures_stay_aligned_with_results() {
        let caps = vec![
            capture_on(1.0, "0"),
            capture_on(2.0, "1"),
            capture_on(9.0, "1"),
        ];
        let tols = ToleranceTable::default();
        let data =
            collect_zoom_test_data(&caps, &CircleDetector::default(), &tols).expect("collect");
        assert_eq!(data.len(), 2);
        for (cap, d) in caps.iter().zip(&data) {
            assert_eq!(d.result_zoom, cap.result_zoom);
            assert_eq!(d.physical_id, cap.physical_id);
        }
        // Captures are still owned by the caller, e.g. for annotation.
        assert!(data.get(2).is_none());
        assert_eq!(caps[2].image.dimensions(), (640, 480));
    }

    fn chart_sweep(zooms: &[f64], reported: impl Fn(f64) -> f64) -> Vec<Capture> {
        let chart = [
            Circle::new(335.0, 250.0, 40.0),
            Circle::new(160.0, 120.0, 40.0),
            Circle::new(480.0, 360.0, 40.0),
        ];
        zooms
            .iter()
            .map(|&z| Capture {
                image: draw_zoomed_chart(640, 480, &chart, z),
                requested_zoom: z,
                result_zoom: reported(z),
                focal_length: 4.38,
                physical_id: Some("0".to_owned()),
            })
            .collect()
    }

    #[test]
    fn synthetic_sweep_passes_end_to_end() {
        let zooms = [1.0, 1.5, 2.0, 2.5, 3.0];
        let tols = ToleranceTable::uniform(&[4.38], TolerancePair::TIGHT);
        let caps = chart_sweep(&zooms, |z| z);
        let data = collect_zoom_test_data(caps, &CircleDetector::default(), &tols)
            .expect("collect");
        assert_eq!(data.len(), zooms.len());

        let v = verify_zoom_results(&data, [640, 480], 3.0, 1.0, &VerifyConfig::default())
            .expect("verify");
        assert!(v.passed, "{:#?}", v.failures);
        assert!(v.stats.max_rel_variation < 0.03);
        assert!(v.to_json().expect("json").contains("\"passed\": true"));
    }

    #[test]
    fn misreported_zoom_is_caught() {
        let zooms = [1.0, 1.5, 2.0, 2.5, 3.0];
        // Reports 20% more zoom than it applies at the long end.
        let caps = chart_sweep(&zooms, |z| if z >= 2.5 { z * 1.2 } else { z });
        let tols = ToleranceTable::uniform(&[4.38], TolerancePair::TIGHT);
        let data = collect_zoom_test_data(caps, &CircleDetector::default(), &tols)
            .expect("collect");

        let v = verify_zoom_results(&data, [640, 480], 3.6, 1.0, &VerifyConfig::default())
            .expect("verify");
        assert!(!v.passed);
        let size_failures = v
            .failures
            .iter()
            .filter(|f| matches!(f, Failure::Size { .. }))
            .count();
        assert_eq!(size_failures, 2);
    }
}
