//! Hit testing: point → figure lookup.
//!
//! Walks the figure tree front-to-back (last painted = topmost) looking for
//! the deepest figure under a point. Callers steer the search with two
//! predicates: `accept` decides whether a figure may be returned, `prune`
//! removes a whole subtree from consideration (e.g. the figures being
//! dragged, so a drop can never land on itself).

use crate::figure::{FigureId, FigureKind, FigureTree};
use kurbo::{Point, Rect};

impl FigureTree {
    /// Topmost accepted figure at absolute point `p`, searching the whole tree.
    pub fn find_figure_at<A, P>(&self, p: Point, accept: A, prune: P) -> Option<FigureId>
    where
        A: Fn(FigureId) -> bool,
        P: Fn(FigureId) -> bool,
    {
        self.find_figure_in(self.root(), p, &accept, &prune)
    }

    /// Topmost accepted figure at absolute point `p` under `layer` only.
    pub fn find_figure_in<A, P>(&self, layer: FigureId, p: Point, accept: &A, prune: &P) -> Option<FigureId>
    where
        A: Fn(FigureId) -> bool,
        P: Fn(FigureId) -> bool,
    {
        // The root has no parent; its own client space is the scrolled one.
        let local = self.point_to_relative(self.parent(layer).unwrap_or(layer), p);
        self.search(layer, local, accept, prune)
    }

    /// `p` is expressed in the parent's client space of `id`.
    fn search<A, P>(&self, id: FigureId, p: Point, accept: &A, prune: &P) -> Option<FigureId>
    where
        A: Fn(FigureId) -> bool,
        P: Fn(FigureId) -> bool,
    {
        let fig = self.get(id)?;
        if !fig.visible || prune(id) {
            return None;
        }
        let is_layer = fig.kind == FigureKind::Layer;
        if !is_layer && !fig.bounds.contains(p) {
            return None;
        }
        let child_p = p - fig.bounds.origin().to_vec2();
        // Children in reverse (topmost first)
        for child in fig.children().iter().rev() {
            if let Some(hit) = self.search(*child, child_p, accept, prune) {
                return Some(hit);
            }
        }
        if !is_layer && accept(id) {
            return Some(id);
        }
        None
    }

    /// All accepted figures under `layer` whose absolute bounds intersect `r`.
    /// Used for marquee selection.
    pub fn find_figures_in_rect<A>(&self, layer: FigureId, r: Rect, accept: A) -> Vec<FigureId>
    where
        A: Fn(FigureId) -> bool,
    {
        let mut out = Vec::new();
        self.collect_intersecting(layer, r, &accept, &mut out);
        out
    }

    fn collect_intersecting<A>(&self, id: FigureId, r: Rect, accept: &A, out: &mut Vec<FigureId>)
    where
        A: Fn(FigureId) -> bool,
    {
        let Some(fig) = self.get(id) else {
            return;
        };
        if !fig.visible {
            return;
        }
        if fig.kind != FigureKind::Layer && accept(id) {
            let overlap = self.absolute_bounds(id).intersect(r);
            if overlap.width() > 0.0 && overlap.height() > 0.0 {
                out.push(id);
            }
        }
        for child in fig.children() {
            self.collect_intersecting(*child, r, accept, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::figure::{Figure, FigureKind, FigureTree};
    use kurbo::{Point, Rect, Size};

    fn scene() -> (FigureTree, crate::FigureId, crate::FigureId, crate::FigureId) {
        let mut t = FigureTree::new(Size::new(800.0, 600.0));
        let layer = t.primary_layer();
        let back = t.add(layer, Figure::new(FigureKind::Group, Rect::new(0.0, 0.0, 300.0, 300.0)), None);
        let inner = t.add(back, Figure::new(FigureKind::Rect, Rect::new(10.0, 10.0, 60.0, 60.0)), None);
        let front = t.add(layer, Figure::new(FigureKind::Rect, Rect::new(40.0, 40.0, 100.0, 100.0)), None);
        (t, back, inner, front)
    }

    #[test]
    fn topmost_figure_wins() {
        let (t, _, _, front) = scene();
        assert_eq!(t.find_figure_at(Point::new(50.0, 50.0), |_| true, |_| false), Some(front));
    }

    #[test]
    fn deepest_figure_under_point() {
        let (t, _, inner, _) = scene();
        assert_eq!(t.find_figure_at(Point::new(15.0, 15.0), |_| true, |_| false), Some(inner));
    }

    #[test]
    fn pruned_subtree_is_skipped() {
        let (t, back, inner, front) = scene();
        let hit = t.find_figure_at(Point::new(50.0, 50.0), |_| true, |f| f == front);
        assert_eq!(hit, Some(inner));
        let hit = t.find_figure_at(Point::new(15.0, 15.0), |_| true, |f| f == back);
        assert_eq!(hit, None);
    }

    #[test]
    fn rejected_figures_fall_through_to_ancestors() {
        let (t, back, inner, _) = scene();
        let hit = t.find_figure_at(Point::new(15.0, 15.0), |f| f != inner, |_| false);
        assert_eq!(hit, Some(back));
    }

    #[test]
    fn marquee_collects_intersections() {
        let (t, _, inner, front) = scene();
        let layer = t.primary_layer();
        let mut hits = t.find_figures_in_rect(layer, Rect::new(55.0, 55.0, 70.0, 70.0), |_| true);
        hits.sort();
        let mut expected = vec![t.parent(inner).unwrap(), inner, front];
        expected.sort();
        assert_eq!(hits, expected);
    }
}
