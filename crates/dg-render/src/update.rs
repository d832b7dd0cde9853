//! Coalescing update manager.
//!
//! Invalidations and dirty regions accumulate while a handler runs; the
//! host flushes them once on the next tick. However many figures were
//! touched in one synchronous handler, the flush happens once and
//! validation always precedes damage computation.

use crate::figure::FigureId;
use kurbo::Rect;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct UpdateManager {
    invalid: Vec<FigureId>,
    invalid_set: HashSet<FigureId>,
    dirty: Vec<Rect>,
    queued: bool,
}

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UpdateReport {
    /// Figures that were invalid when the flush started.
    pub invalid: usize,
    /// Anchored figures whose bounds were re-derived.
    pub validated: usize,
    /// Coalesced region to repaint, clipped to the viewport.
    pub damage: Option<Rect>,
}

impl UpdateManager {
    /// Mark a figure as needing validation and queue a flush.
    pub fn invalidate(&mut self, id: FigureId) {
        if self.invalid_set.insert(id) {
            self.invalid.push(id);
        }
        self.queued = true;
    }

    /// Mark a region as needing repaint and queue a flush.
    pub fn add_dirty(&mut self, r: Rect) {
        if r.area() > 0.0 {
            self.dirty.push(r);
        }
        self.queued = true;
    }

    /// Drop a removed figure from the pending set.
    pub fn forget(&mut self, id: FigureId) {
        if self.invalid_set.remove(&id) {
            self.invalid.retain(|i| *i != id);
        }
    }

    /// Whether a flush is pending.
    pub fn is_queued(&self) -> bool {
        self.queued
    }

    /// Drain pending work and clear the queued flag.
    pub fn take(&mut self) -> (Vec<FigureId>, Vec<Rect>) {
        self.queued = false;
        self.invalid_set.clear();
        (
            std::mem::take(&mut self.invalid),
            std::mem::take(&mut self.dirty),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::figure::{Figure, FigureKind, FigureTree};
    use kurbo::{Rect, Size};

    #[test]
    fn many_invalidations_coalesce_into_one_flush() {
        let mut t = FigureTree::new(Size::new(500.0, 500.0));
        let layer = t.primary_layer();
        let a = t.add(layer, Figure::new(FigureKind::Rect, Rect::new(0.0, 0.0, 10.0, 10.0)), None);
        let b = t.add(layer, Figure::new(FigureKind::Rect, Rect::new(100.0, 100.0, 110.0, 110.0)), None);
        t.perform_update();

        t.set_bounds(a, Rect::new(5.0, 5.0, 15.0, 15.0));
        t.set_bounds(a, Rect::new(6.0, 6.0, 16.0, 16.0));
        t.set_bounds(b, Rect::new(200.0, 200.0, 210.0, 210.0));
        assert!(t.update_manager().is_queued());

        let report = t.perform_update();
        assert_eq!(report.invalid, 2);
        assert_eq!(report.damage, Some(Rect::new(0.0, 0.0, 210.0, 210.0)));
        assert!(!t.update_manager().is_queued());

        // Nothing pending: the second flush is empty.
        assert_eq!(t.perform_update().damage, None);
    }

    #[test]
    fn anchored_figures_follow_owner_before_damage() {
        use crate::figure::Anchor;
        use dg_core::geometry::Direction;

        let mut t = FigureTree::new(Size::new(500.0, 500.0));
        let owner = t.add(
            t.primary_layer(),
            Figure::new(FigureKind::Rect, Rect::new(10.0, 10.0, 110.0, 60.0)),
            None,
        );
        let knob = t.add(
            t.handle_layer(),
            Figure::new(FigureKind::Handle, Rect::ZERO).anchored(Anchor::Knob {
                owner,
                direction: Direction::SOUTH_EAST,
                size: 6.0,
            }),
            None,
        );
        let report = t.perform_update();
        assert_eq!(report.validated, 1);
        assert_eq!(t.absolute_bounds(knob), Rect::new(107.0, 57.0, 113.0, 63.0));

        t.set_bounds(owner, Rect::new(10.0, 10.0, 210.0, 60.0));
        t.perform_update();
        assert_eq!(t.absolute_bounds(knob), Rect::new(207.0, 57.0, 213.0, 63.0));
    }
}
