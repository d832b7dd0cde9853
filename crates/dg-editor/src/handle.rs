//! Selection handles: the move outline and the resize knobs.

use dg_core::Direction;
use dg_render::{FigureId, FigureTree};
use kurbo::Point;

use crate::controller::ControllerId;
use crate::tool::{Cursor, MoveTracker, ResizeTracker, Tool};

/// Width of the band along a move outline that grabs the pointer.
pub const MOVE_HANDLE_BAND: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Move,
    Resize(Direction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    pub owner: ControllerId,
    pub kind: HandleKind,
    pub figure: FigureId,
}

impl Handle {
    pub fn drag_tracker(&self) -> Box<dyn Tool> {
        match self.kind {
            HandleKind::Move => Box::new(MoveTracker::new(self.owner)),
            HandleKind::Resize(direction) => Box::new(ResizeTracker::new(self.owner, direction)),
        }
    }

    pub fn cursor(&self) -> Cursor {
        match self.kind {
            HandleKind::Move => Cursor::Move,
            HandleKind::Resize(direction) => Cursor::Resize(direction),
        }
    }

    /// Where keyboard traversal parks the pointer for this handle.
    pub fn accessible_location(&self, figures: &FigureTree) -> Point {
        figures.resolved_bounds(self.figure).center()
    }

    pub fn contains(&self, figures: &FigureTree, p: Point) -> bool {
        let bounds = figures.resolved_bounds(self.figure);
        if !bounds.contains(p) {
            return false;
        }
        match self.kind {
            HandleKind::Resize(_) => true,
            // Only the border band; the interior belongs to the owner.
            HandleKind::Move => !bounds.inflate(-MOVE_HANDLE_BAND, -MOVE_HANDLE_BAND).contains(p),
        }
    }
}

/// Live handles of a viewer, in creation order (later ones on top).
#[derive(Debug, Default)]
pub struct HandleRegistry {
    handles: Vec<Handle>,
}

impl HandleRegistry {
    pub fn add(&mut self, handle: Handle) {
        self.handles.push(handle);
    }

    pub fn remove(&mut self, figure: FigureId) -> Option<Handle> {
        let pos = self.handles.iter().position(|h| h.figure == figure)?;
        Some(self.handles.remove(pos))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Handle> {
        self.handles.iter()
    }

    pub fn for_owner(&self, owner: ControllerId) -> impl Iterator<Item = &Handle> {
        self.handles.iter().filter(move |h| h.owner == owner)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Topmost handle containing `p`.
    pub fn find_at(&self, figures: &FigureTree, p: Point) -> Option<Handle> {
        self.handles
            .iter()
            .rev()
            .find(|h| figures.get(h.figure).is_some_and(|f| f.visible) && h.contains(figures, p))
            .copied()
    }
}
