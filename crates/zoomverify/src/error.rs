//! Error type shared by detection, tolerance and verification stages.

use thiserror::Error;

/// Result alias for zoomverify operations.
pub type Result<T> = std::result::Result<T, ZoomError>;

/// Errors raised while detecting markers or preparing zoom test data.
///
/// Tolerance violations are not errors: they are reported through
/// [`ZoomVerification`](crate::ZoomVerification).
#[derive(Debug, Error)]
pub enum ZoomError {
    /// No marker was found although the zoom ratio is within detector range.
    #[error(
        "no circle detected at zoom ratio {zoom_ratio:.2} (threshold {threshold:.1}); \
         check chart placement and lighting"
    )]
    MarkerNotFound { zoom_ratio: f64, threshold: f64 },

    /// Fewer markers were found than the caller required.
    #[error("expected at least {expected} markers, found {found}")]
    MarkerCountMismatch { expected: usize, found: usize },

    /// No ArUco ID is visible in every capture.
    #[error("no shared ArUco marker found across {captures} captures")]
    NoSharedMarker { captures: usize },

    /// Per-capture inputs do not line up.
    #[error("length mismatch: {what} has {got} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Verification was asked to run on an empty capture sequence.
    #[error("no zoom test data to verify")]
    EmptyTestData,

    /// No backward-compatible physical camera could be used to build tolerances.
    #[error("no supported physical cameras in tolerance input")]
    NoSupportedCameras,

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value}")]
    InvalidParameter { name: &'static str, value: String },

    /// Image could not be read or written.
    #[error("image I/O failed for {path}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ZoomError {
    pub(crate) fn invalid(name: &'static str, value: impl ToString) -> Self {
        Self::InvalidParameter {
            name,
            value: value.to_string(),
        }
    }

    pub(crate) fn image(path: &std::path::Path, source: image::ImageError) -> Self {
        Self::Image {
            path: path.display().to_string(),
            source,
        }
    }

    /// Whether the error means "marker out of view" rather than a broken setup.
    pub fn is_marker_miss(&self) -> bool {
        matches!(
            self,
            Self::MarkerNotFound { .. } | Self::MarkerCountMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_not_found_message_mentions_zoom() {
        let err = ZoomError::MarkerNotFound {
            zoom_ratio: 3.25,
            threshold: 9.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("3.25"));
        assert!(msg.contains("9.0"));
        assert!(err.is_marker_miss());
    }

    #[test]
    fn invalid_parameter_formats_value() {
        let err = ZoomError::invalid("steps", 1);
        assert_eq!(err.to_string(), "invalid parameter: steps = 1");
        assert!(!err.is_marker_miss());
    }
}
