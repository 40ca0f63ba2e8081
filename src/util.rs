//! Geometry helpers shared by the capture engine.
//!
//! This module provides:
//! - Desktop-coordinate points and rectangles
//! - Rectangle intersection, union and subtraction
//! - Parsing of `x,y WxH` geometry strings (the format `grim`/`slurp` use)

use std::fmt;

// ============================================================================
// Points
// ============================================================================

/// A point in desktop (or buffer-local) pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this point relative to `origin`.
    pub fn relative_to(self, origin: Point) -> Point {
        Point::new(self.x - origin.x, self.y - origin.y)
    }
}

// ============================================================================
// Rectangles
// ============================================================================

/// Axis-aligned rectangle in desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Creates a new rectangle. Width/height must be positive.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Option<Self> {
        if width <= 0 || height <= 0 {
            None
        } else {
            Some(Self {
                x,
                y,
                width,
                height,
            })
        }
    }

    /// Builds a rectangle from min/max bounds (inclusive min, exclusive max).
    pub fn from_min_max(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Option<Self> {
        let width = max_x - min_x;
        let height = max_y - min_y;
        Self::new(min_x, min_y, width, height)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Returns true if rectangle has a positive area.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Overlapping area of two rectangles, if any.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        Rect::from_min_max(
            self.x.max(other.x),
            self.y.max(other.y),
            self.right().min(other.right()),
            self.bottom().min(other.bottom()),
        )
    }

    /// Returns a rectangle that covers both input rectangles.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
            width: self.right().max(other.right()) - self.x.min(other.x),
            height: self.bottom().max(other.bottom()) - self.y.min(other.y),
        }
    }

    /// Removes `other` from this rectangle.
    ///
    /// The remainder is returned as up to four disjoint bands: a full-width
    /// strip above and below the cut, and the left/right pieces beside it.
    pub fn subtract(&self, other: &Rect) -> Vec<Rect> {
        let Some(cut) = self.intersect(other) else {
            return vec![*self];
        };

        let pieces = [
            Rect::from_min_max(self.x, self.y, self.right(), cut.y),
            Rect::from_min_max(self.x, cut.bottom(), self.right(), self.bottom()),
            Rect::from_min_max(self.x, cut.y, cut.x, cut.bottom()),
            Rect::from_min_max(cut.right(), cut.y, self.right(), cut.bottom()),
        ];
        pieces.into_iter().flatten().collect()
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Bounding box of all rectangles in `rects`, or `None` when empty.
pub fn bounding_box(rects: &[Rect]) -> Option<Rect> {
    let (first, rest) = rects.split_first()?;
    Some(rest.iter().fold(*first, |acc, rect| acc.union(rect)))
}

/// Subtracts every rectangle in `holes` from `base` and returns what is left.
pub fn subtract_all(base: Rect, holes: &[Rect]) -> Vec<Rect> {
    let mut region = vec![base];
    for hole in holes {
        region = region
            .iter()
            .flat_map(|piece| piece.subtract(hole))
            .collect();
        if region.is_empty() {
            break;
        }
    }
    region
}

/// Parses a `x,y WxH` geometry string.
pub fn parse_geometry(input: &str) -> Option<Rect> {
    let (position, size) = input.trim().split_once(' ')?;
    let (x, y) = position.split_once(',')?;
    let (width, height) = size.trim().split_once('x')?;
    Rect::new(
        x.trim().parse().ok()?,
        y.trim().parse().ok()?,
        width.trim().parse().ok()?,
        height.trim().parse().ok()?,
    )
}
