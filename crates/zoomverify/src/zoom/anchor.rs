//! Offset reference state for one lens segment.

/// Offset reference of the current lens segment.
///
/// Every capture whose focal length differs from the anchored one starts a
/// new segment and becomes its anchor.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) enum Anchor {
    #[default]
    Unanchored,
    Anchored {
        zoom: f64,
        offset: f64,
        focal_length: f64,
        physical_id: Option<String>,
    },
}

/// Outcome of feeding one capture to [`Anchor::observe`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AnchorStep {
    /// The capture starts a new segment. `switched` is false for the very
    /// first capture.
    Reanchored { switched: bool },
    /// The capture continues the segment anchored at `zoom` / `offset`.
    Continue { zoom: f64, offset: f64 },
}

impl Anchor {
    pub(crate) fn observe(
        &mut self,
        zoom: f64,
        offset: f64,
        focal_length: f64,
        physical_id: Option<&str>,
    ) -> AnchorStep {
        let switched = match self {
            Anchor::Unanchored => false,
            Anchor::Anchored {
                focal_length: anchored_fl,
                zoom: anchor_zoom,
                offset: anchor_offset,
                ..
            } => {
                // Exact comparison: focal lengths are reported constants.
                if *anchored_fl == focal_length {
                    return AnchorStep::Continue {
                        zoom: *anchor_zoom,
                        offset: *anchor_offset,
                    };
                }
                true
            }
        };
        *self = Anchor::Anchored {
            zoom,
            offset,
            focal_length,
            physical_id: physical_id.map(str::to_owned),
        };
        AnchorStep::Reanchored { switched }
    }

    pub(crate) fn physical_id(&self) -> Option<&str> {
        match self {
            Anchor::Unanchored => None,
            Anchor::Anchored { physical_id, .. } => physical_id.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_capture_anchors_without_switch() {
        let mut a = Anchor::default();
        assert_eq!(
            a.observe(1.0, 5.0, 4.0, Some("0")),
            AnchorStep::Reanchored { switched: false }
        );
        assert_eq!(a.physical_id(), Some("0"));
    }

    #[test]
    fn same_focal_length_continues_and_switch_reanchors() {
        let mut a = Anchor::default();
        a.observe(1.0, 5.0, 4.0, None);
        assert_eq!(
            a.observe(2.0, 10.0, 4.0, None),
            AnchorStep::Continue {
                zoom: 1.0,
                offset: 5.0
            }
        );
        assert_eq!(
            a.observe(3.0, 2.0, 12.0, Some("2")),
            AnchorStep::Reanchored { switched: true }
        );
        assert_eq!(
            a.observe(4.0, 3.0, 12.0, None),
            AnchorStep::Continue {
                zoom: 3.0,
                offset: 2.0
            }
        );
    }
}
