//! Snapping drag results onto a grid.

use dg_core::Direction;
use kurbo::{Point, Rect, Size, Vec2};

use crate::config::EditorConfig;

pub trait SnapToHelper {
    /// Correction that puts the origin of `r` on the grid.
    fn snap_move(&self, r: Rect) -> Vec2;

    /// Correction `(move, size)` that puts the edges of `r` named by
    /// `direction` on the grid, leaving the others where they are.
    fn snap_resize(&self, r: Rect, direction: Direction) -> (Vec2, Size);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapToGrid {
    spacing: f64,
    origin: Point,
}

impl SnapToGrid {
    pub fn new(spacing: f64) -> Self {
        Self {
            spacing,
            origin: Point::ORIGIN,
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: Point) -> Self {
        self.origin = origin;
        self
    }

    /// The configured grid, if snapping is enabled.
    pub fn from_config(config: &EditorConfig) -> Option<Self> {
        config.grid.filter(|s| *s > 0.0).map(Self::new)
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    fn correction(&self, v: f64, origin: f64) -> f64 {
        ((v - origin) / self.spacing).round() * self.spacing + origin - v
    }
}

impl SnapToHelper for SnapToGrid {
    fn snap_move(&self, r: Rect) -> Vec2 {
        Vec2::new(self.correction(r.x0, self.origin.x), self.correction(r.y0, self.origin.y))
    }

    fn snap_resize(&self, r: Rect, direction: Direction) -> (Vec2, Size) {
        let mut moved = Vec2::ZERO;
        let mut sized = Size::ZERO;
        if direction.contains(Direction::WEST) {
            let c = self.correction(r.x0, self.origin.x);
            moved.x = c;
            sized.width -= c;
        } else if direction.contains(Direction::EAST) {
            sized.width += self.correction(r.x1, self.origin.x);
        }
        if direction.contains(Direction::NORTH) {
            let c = self.correction(r.y0, self.origin.y);
            moved.y = c;
            sized.height -= c;
        } else if direction.contains(Direction::SOUTH) {
            sized.height += self.correction(r.y1, self.origin.y);
        }
        (moved, sized)
    }
}
