//! Geometry helpers layered over `kurbo`.
//!
//! `kurbo::{Point, Rect, Size, Vec2}` are the value types used everywhere.
//! This module adds the few operations the editor needs that kurbo does not
//! spell out: Chebyshev threshold checks, rectangle deltas, edge insets, and
//! the compass `Direction` set used by resize handles.

use kurbo::{Point, Rect, Size, Vec2};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// True once `p` is farther than `threshold` from `origin` on either axis.
pub fn chebyshev_exceeds(origin: Point, p: Point, threshold: f64) -> bool {
    (p.x - origin.x).abs() > threshold || (p.y - origin.y).abs() > threshold
}

/// Move a rectangle's origin by `delta`, keeping its size.
pub fn rect_translate(r: Rect, delta: Vec2) -> Rect {
    r + delta
}

/// Apply a move delta and a size delta (`x, y, w, h` semantics).
///
/// The result is not normalized: a size delta larger than the size leaves
/// a negative width or height, so callers can detect and reject it.
pub fn rect_transform(r: Rect, move_delta: Vec2, size_delta: Size) -> Rect {
    let origin = r.origin() + move_delta;
    let size = r.size() + size_delta;
    Rect::new(origin.x, origin.y, origin.x + size.width, origin.y + size.height)
}

/// Union of all rectangles, or `None` for an empty iterator.
pub fn rect_union_all(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
    rects.into_iter().reduce(|acc, r| acc.union(r))
}

/// Component-wise clamp of a size between `min` and `max`.
pub fn clamp_size(s: Size, min: Size, max: Size) -> Size {
    Size::new(
        s.width.max(min.width).min(max.width),
        s.height.max(min.height).min(max.height),
    )
}

/// Edge insets, e.g. the autoexpose band along a viewport border.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Insets {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl Insets {
    pub const fn uniform(v: f64) -> Self {
        Self {
            top: v,
            left: v,
            bottom: v,
            right: v,
        }
    }

    /// Shrink `r` by these insets.
    pub fn shrink(&self, r: Rect) -> Rect {
        Rect::new(
            r.x0 + self.left,
            r.y0 + self.top,
            (r.x1 - self.right).max(r.x0 + self.left),
            (r.y1 - self.bottom).max(r.y0 + self.top),
        )
    }
}

// ─── Compass directions ──────────────────────────────────────────────────

/// A combinable set of compass directions (N/S/E/W).
///
/// Flags are independent: `NORTH | EAST` is the north-east corner.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Direction(u8);

impl Direction {
    pub const NONE: Direction = Direction(0);
    pub const NORTH: Direction = Direction(1);
    pub const SOUTH: Direction = Direction(4);
    pub const WEST: Direction = Direction(8);
    pub const EAST: Direction = Direction(16);
    pub const NORTH_EAST: Direction = Direction(1 | 16);
    pub const NORTH_WEST: Direction = Direction(1 | 8);
    pub const SOUTH_EAST: Direction = Direction(4 | 16);
    pub const SOUTH_WEST: Direction = Direction(4 | 8);

    /// The eight handle positions in clockwise order from north-west.
    pub const HANDLES: [Direction; 8] = [
        Direction::NORTH_WEST,
        Direction::NORTH,
        Direction::NORTH_EAST,
        Direction::EAST,
        Direction::SOUTH_EAST,
        Direction::SOUTH,
        Direction::SOUTH_WEST,
        Direction::WEST,
    ];

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Direction) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Point on `r` that a handle for this direction sits on.
    pub fn anchor_on(self, r: Rect) -> Point {
        let x = if self.contains(Self::WEST) {
            r.x0
        } else if self.contains(Self::EAST) {
            r.x1
        } else {
            r.center().x
        };
        let y = if self.contains(Self::NORTH) {
            r.y0
        } else if self.contains(Self::SOUTH) {
            r.y1
        } else {
            r.center().y
        };
        Point::new(x, y)
    }

    /// CSS resize cursor name for this direction.
    pub fn cursor_name(self) -> &'static str {
        match self {
            Self::NORTH => "n-resize",
            Self::SOUTH => "s-resize",
            Self::EAST => "e-resize",
            Self::WEST => "w-resize",
            Self::NORTH_EAST => "ne-resize",
            Self::NORTH_WEST => "nw-resize",
            Self::SOUTH_EAST => "se-resize",
            Self::SOUTH_WEST => "sw-resize",
            _ => "default",
        }
    }
}

impl BitOr for Direction {
    type Output = Direction;
    fn bitor(self, rhs: Direction) -> Direction {
        Direction(self.0 | rhs.0)
    }
}

impl BitOrAssign for Direction {
    fn bitor_assign(&mut self, rhs: Direction) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Direction {
    type Output = Direction;
    fn bitand(self, rhs: Direction) -> Direction {
        Direction(self.0 & rhs.0)
    }
}

impl fmt::Debug for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for (flag, name) in [
            (Self::NORTH, "N"),
            (Self::SOUTH, "S"),
            (Self::EAST, "E"),
            (Self::WEST, "W"),
        ] {
            if self.contains(flag) {
                parts.push(name);
            }
        }
        if parts.is_empty() {
            f.write_str("Direction(NONE)")
        } else {
            write!(f, "Direction({})", parts.join("|"))
        }
    }
}
