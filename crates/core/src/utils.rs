//! Geometric primitives shared by every pipeline stage.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in image pixel coordinates.
///
/// Rows grow downwards, columns grow rightwards, matching the
/// detection engines' output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub column_min: f64,
    pub row_min: f64,
    pub column_max: f64,
    pub row_max: f64,
}

impl Rect {
    pub fn new(column_min: f64, row_min: f64, column_max: f64, row_max: f64) -> Self {
        Self {
            column_min,
            row_min,
            column_max,
            row_max,
        }
    }

    pub fn width(&self) -> f64 {
        self.column_max - self.column_min
    }

    pub fn height(&self) -> f64 {
        self.row_max - self.row_min
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center_column(&self) -> f64 {
        (self.column_min + self.column_max) / 2.0
    }

    pub fn center_row(&self) -> f64 {
        (self.row_min + self.row_max) / 2.0
    }

    /// Smallest rectangle covering both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            column_min: self.column_min.min(other.column_min),
            row_min: self.row_min.min(other.row_min),
            column_max: self.column_max.max(other.column_max),
            row_max: self.row_max.max(other.row_max),
        }
    }

    /// Area of the intersection, 0 when the rectangles are disjoint.
    pub fn intersection_area(&self, other: &Rect) -> f64 {
        let w = self.column_max.min(other.column_max) - self.column_min.max(other.column_min);
        let h = self.row_max.min(other.row_max) - self.row_min.max(other.row_min);
        if w > 0.0 && h > 0.0 { w * h } else { 0.0 }
    }

    /// Translate so that the top-left corner lands on `(column, row)`.
    pub fn anchored_at(&self, column: f64, row: f64) -> Rect {
        Rect {
            column_min: column,
            row_min: row,
            column_max: column + self.width(),
            row_max: row + self.height(),
        }
    }
}

/// Union bounding box of a non-empty sequence of rectangles.
pub fn bound_of(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
    rects.into_iter().reduce(|a, b| a.union(&b))
}

/// Direction along which repetition and spacing are measured: `h` is a
/// left-to-right sequence, `v` a top-to-bottom one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alignment {
    #[serde(rename = "h")]
    Horizontal,
    #[serde(rename = "v")]
    Vertical,
}

impl Alignment {
    pub fn perpendicular(self) -> Alignment {
        match self {
            Alignment::Horizontal => Alignment::Vertical,
            Alignment::Vertical => Alignment::Horizontal,
        }
    }

    /// Leading edge of a box along this axis (top for `v`, left for `h`).
    pub fn leading(self, rect: &Rect) -> f64 {
        match self {
            Alignment::Horizontal => rect.column_min,
            Alignment::Vertical => rect.row_min,
        }
    }

    /// Trailing edge of a box along this axis.
    pub fn trailing(self, rect: &Rect) -> f64 {
        match self {
            Alignment::Horizontal => rect.column_max,
            Alignment::Vertical => rect.row_max,
        }
    }

    /// Center coordinate of a box along this axis.
    pub fn center(self, rect: &Rect) -> f64 {
        match self {
            Alignment::Horizontal => rect.center_column(),
            Alignment::Vertical => rect.center_row(),
        }
    }

    /// Extent of a box across this axis (height for `h`, width for `v`).
    pub fn cross_extent(self, rect: &Rect) -> f64 {
        match self {
            Alignment::Horizontal => rect.height(),
            Alignment::Vertical => rect.width(),
        }
    }
}

/// Where the connecting line between two boxes is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    TopLeft,
    Center,
}

/// Angle in degrees of the line connecting two boxes, normalized into
/// (-90, 90] so that parallel connections compare regardless of the
/// traversal direction.
pub fn connection_angle(a: &Rect, b: &Rect, anchor: Anchor) -> f64 {
    let (dr, dc) = match anchor {
        Anchor::TopLeft => (a.row_min - b.row_min, a.column_min - b.column_min),
        Anchor::Center => (
            a.center_row() - b.center_row(),
            a.center_column() - b.center_column(),
        ),
    };
    let mut angle = dr.atan2(dc).to_degrees();
    if angle < 0.0 {
        angle += 180.0;
    }
    if angle > 90.0 {
        angle -= 180.0;
    }
    angle
}

/// Gap between two boxes along one axis. Boxes overlapping on that
/// axis yield 0.
pub fn axis_gap(a: &Rect, b: &Rect, axis: Alignment) -> f64 {
    let lead = axis.leading(a).max(axis.leading(b));
    let trail = axis.trailing(a).min(axis.trailing(b));
    (lead - trail).max(0.0)
}

/// Gap between two boxes measured across the given alignment axis
/// (vertical gap for `h`-aligned sequences, horizontal gap for `v`).
pub fn perpendicular_gap(a: &Rect, b: &Rect, alignment: Alignment) -> f64 {
    axis_gap(a, b, alignment.perpendicular())
}

/// Euclidean distance between box centers.
pub fn center_distance(a: &Rect, b: &Rect) -> f64 {
    let dc = a.center_column() - b.center_column();
    let dr = a.center_row() - b.center_row();
    (dc * dc + dr * dr).sqrt()
}
