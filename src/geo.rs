//! Geometric primitives in page space (origin top-left, y grows downward).
//!
//! Everything downstream of ingestion works with [`Rect`] only. Upstream extractors hand us
//! boxes in several shapes (`x/y/width/height`, `[x0, y0, x1, y1]` word tuples, four-corner
//! quads); [`Geometry`] accepts all of them once, at deserialization time.

use serde::{Deserialize, Deserializer, Serialize};

/// A 2D point in page space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle. Width and height are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Create a rectangle from position and size. Negative sizes are clamped to zero.
    ///
    /// ```
    /// use spanlight::geo::Rect;
    ///
    /// let rect = Rect::new(10.0, 20.0, 100.0, -5.0);
    /// assert_eq!(rect.width, 100.0);
    /// assert_eq!(rect.height, 0.0);
    /// ```
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// Create a rectangle from two opposite corners, in any order.
    ///
    /// ```
    /// use spanlight::geo::Rect;
    ///
    /// let rect = Rect::from_points(110.0, 70.0, 10.0, 20.0);
    /// assert_eq!(rect.x, 10.0);
    /// assert_eq!(rect.y, 20.0);
    /// assert_eq!(rect.width, 100.0);
    /// assert_eq!(rect.height, 50.0);
    /// ```
    pub fn from_points(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        let (left, right) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        let (top, bottom) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_points(
            self.left().min(other.left()),
            self.top().min(other.top()),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Length of the overlap of the two vertical extents.
    pub fn vertical_overlap(&self, other: &Rect) -> f32 {
        (self.bottom().min(other.bottom()) - self.top().max(other.top())).max(0.0)
    }
}

/// Bounding box of a sequence of rectangles, `None` when empty.
pub fn union_all<'a, I>(rects: I) -> Option<Rect>
where
    I: IntoIterator<Item = &'a Rect>,
{
    rects.into_iter().fold(None, |acc, r| match acc {
        None => Some(*r),
        Some(u) => Some(u.union(r)),
    })
}

/// Merge consecutive rectangles that sit on the same visual line into one box per line.
///
/// Two neighbours share a line when their vertical extents overlap by at least half of the
/// smaller height and the second one does not start left of the first.
pub fn merge_into_lines(rects: &[Rect]) -> Vec<Rect> {
    let mut lines: Vec<Rect> = Vec::new();
    let mut previous: Option<Rect> = None;

    for rect in rects {
        match (lines.last_mut(), previous) {
            (Some(line), Some(prev)) if same_line(&prev, rect) => *line = line.union(rect),
            _ => lines.push(*rect),
        }
        previous = Some(*rect);
    }

    lines
}

fn same_line(prev: &Rect, next: &Rect) -> bool {
    let min_height = prev.height.min(next.height);
    if min_height <= 0.0 {
        return (prev.center_y() - next.center_y()).abs() < f32::EPSILON && next.x >= prev.x;
    }
    prev.vertical_overlap(next) >= min_height * 0.5 && next.x >= prev.x
}

/// Four-corner quadrilateral as produced by extractors that support rotated text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub ul: Point,
    pub ur: Point,
    pub ll: Point,
    pub lr: Point,
}

impl Quad {
    /// Axis-aligned bounding rectangle of the four corners.
    pub fn to_rect(&self) -> Rect {
        let xs = [self.ul.x, self.ur.x, self.ll.x, self.lr.x];
        let ys = [self.ul.y, self.ur.y, self.ll.y, self.lr.y];
        let min = |v: &[f32; 4]| v.iter().copied().fold(f32::INFINITY, f32::min);
        let max = |v: &[f32; 4]| v.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        Rect::from_points(min(&xs), min(&ys), max(&xs), max(&ys))
    }
}

/// Any geometry shape accepted from an upstream extractor.
///
/// `Corners` comes first: a derived struct also accepts a sequence, so `[x0, y0, x1, y1]`
/// would otherwise be read as `x/y/width/height`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Geometry {
    Corners([f32; 4]),
    Rect(Rect),
    Quad(Quad),
}

impl From<Geometry> for Rect {
    fn from(geometry: Geometry) -> Self {
        match geometry {
            Geometry::Rect(r) => Rect::new(r.x, r.y, r.width, r.height),
            Geometry::Quad(q) => q.to_rect(),
            Geometry::Corners([x0, y0, x1, y1]) => Rect::from_points(x0, y0, x1, y1),
        }
    }
}

/// Serde adapter: deserialize any [`Geometry`] straight into a [`Rect`].
pub fn deserialize_geometry<'de, D>(deserializer: D) -> Result<Rect, D::Error>
where
    D: Deserializer<'de>,
{
    Geometry::deserialize(deserializer).map(Rect::from)
}

/// Page dimensions used for clamping synthesized geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBounds {
    pub width: f32,
    pub height: f32,
}

impl PageBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Bounds covering every rectangle, anchored at the origin.
    pub fn covering<'a, I>(rects: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Rect>,
    {
        union_all(rects).map(|u| Self::new(u.right().max(0.0), u.bottom().max(0.0)))
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}
