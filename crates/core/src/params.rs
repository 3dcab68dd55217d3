//! Layout reconstruction parameters.
//!
//! Contains LayoutParams for controlling clustering, grouping, pairing
//! and repair behavior.

/// Parameters for layout reconstruction.
///
/// All thresholds are empirically tuned against real screenshots; the
/// defaults reproduce the reference values. Distances are in pixels of
/// the detection coordinate space, angles in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutParams {
    /// Neighborhood radius for clustering non-text elements by center
    /// position (center_column / center_row).
    pub nontext_position_eps: f64,

    /// Neighborhood radius for clustering non-text elements by area.
    /// Icons and buttons recur with near-identical size, so area is a
    /// repetition signal for them.
    pub nontext_area_eps: f64,

    /// Neighborhood radius for clustering text elements by edge
    /// position (row_min / column_min). Text bbox size varies with
    /// string length and is not clustered.
    pub text_position_eps: f64,

    /// Radius for clustering the consecutive gaps of a non-text group
    /// when validating its spacing.
    pub nontext_gap_eps: f64,

    /// Radius for clustering the consecutive gaps of a text group.
    /// Text line spacing is less precise, so the radius is larger.
    pub text_gap_eps: f64,

    /// Two connecting lines agree when their angles differ by less
    /// than this.
    pub angle_tolerance: f64,

    /// Two connecting distances agree when their ratio stays under
    /// this factor...
    pub distance_ratio: f64,

    /// ...or their absolute difference stays under this many pixels.
    pub distance_tolerance: f64,

    /// Fraction of connecting lines that must mutually agree for two
    /// groups to pair.
    pub match_threshold: f64,

    /// Largest allowed cardinality ratio between two pairing groups.
    pub max_cardinality_ratio: usize,

    /// A 2-element group is dissolved when the larger member's area
    /// exceeds this multiple of the smaller's...
    pub two_member_area_ratio: f64,

    /// ...and the absolute area difference also exceeds this.
    pub two_member_area_diff: f64,

    /// Ratio tolerance when comparing the pairwise center-distance
    /// multisets of two containers' children.
    pub connection_ratio: f64,

    /// An unpaired 2-element group is dissolved when an ungrouped
    /// element overlaps its union box by this fraction of the
    /// element's own area.
    pub interleave_overlap: f64,

    /// A candidate absorbs into a deficient list item when its overlap
    /// with the projected region reaches this fraction of the
    /// candidate's area.
    pub repair_overlap: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            nontext_position_eps: 10.0,
            nontext_area_eps: 500.0,
            text_position_eps: 10.0,
            nontext_gap_eps: 4.0,
            text_gap_eps: 8.0,
            angle_tolerance: 10.0,
            distance_ratio: 1.2,
            distance_tolerance: 10.0,
            match_threshold: 0.7,
            max_cardinality_ratio: 3,
            two_member_area_ratio: 2.2,
            two_member_area_diff: 500.0,
            connection_ratio: 1.5,
            interleave_overlap: 0.7,
            repair_overlap: 0.5,
        }
    }
}

impl LayoutParams {
    /// Gap clustering radius for the given element kind.
    pub fn gap_eps(&self, is_text: bool) -> f64 {
        if is_text {
            self.text_gap_eps
        } else {
            self.nontext_gap_eps
        }
    }
}
