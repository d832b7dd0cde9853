//! Layered figure tree.
//!
//! Figures live in a `StableGraph` arena so ids stay valid across removals.
//! Each figure keeps its own ordered child list and parent link; the graph
//! is used purely as stable storage.
//!
//! Coordinates: a figure's `bounds` are expressed in its parent's client
//! space. A figure's client space has its origin at the figure's top-left.
//! The root's client space is the scrolled viewport, so "absolute"
//! coordinates are viewport (screen) coordinates.

use crate::update::{UpdateManager, UpdateReport};
use dg_core::geometry::Direction;
use kurbo::{Point, Rect, Size, Vec2};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use smallvec::SmallVec;

/// Stable handle to a figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FigureId(NodeIndex);

/// What a figure draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FigureKind {
    /// Transparent, unbounded container (root and layers).
    Layer,
    Rect,
    Ellipse,
    Group,
    /// Selection handle (move outline or resize knob).
    Handle,
    /// Translucent drag/resize preview.
    Ghost,
    /// Rubber-band selection rectangle.
    Marquee,
    /// Hover / drop-target highlight.
    Highlight,
}

/// Where an anchored figure derives its bounds from during validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    /// Follows the owner's absolute bounds, grown by `outset`.
    Outline { owner: FigureId, outset: f64 },
    /// A `size`×`size` square centred on the owner's `direction` point.
    Knob {
        owner: FigureId,
        direction: Direction,
        size: f64,
    },
}

impl Anchor {
    pub fn owner(&self) -> FigureId {
        match self {
            Anchor::Outline { owner, .. } | Anchor::Knob { owner, .. } => *owner,
        }
    }

    fn resolve(&self, owner_abs: Rect) -> Rect {
        match *self {
            Anchor::Outline { outset, .. } => owner_abs.inflate(outset, outset),
            Anchor::Knob {
                direction, size, ..
            } => {
                let c = direction.anchor_on(owner_abs);
                Rect::from_center_size(c, Size::new(size, size))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Figure {
    pub kind: FigureKind,
    /// Bounds in the parent's client space.
    pub bounds: Rect,
    pub visible: bool,
    pub label: String,
    /// Visual emphasis (selected shapes, accepting drop targets).
    pub emphasized: bool,
    pub anchor: Option<Anchor>,
    parent: Option<FigureId>,
    children: SmallVec<[FigureId; 4]>,
}

impl Figure {
    pub fn new(kind: FigureKind, bounds: Rect) -> Self {
        Self {
            kind,
            bounds,
            visible: true,
            label: String::new(),
            emphasized: false,
            anchor: None,
            parent: None,
            children: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn anchored(mut self, anchor: Anchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn parent(&self) -> Option<FigureId> {
        self.parent
    }

    pub fn children(&self) -> &[FigureId] {
        &self.children
    }
}

/// The figure tree of one viewer.
pub struct FigureTree {
    graph: StableGraph<Figure, ()>,
    root: FigureId,
    primary: FigureId,
    handles: FigureId,
    feedback: FigureId,
    scroll: Vec2,
    viewport: Size,
    updates: UpdateManager,
}

impl FigureTree {
    /// Create a tree with the three standard layers, bottom to top:
    /// primary, handles, feedback.
    pub fn new(viewport: Size) -> Self {
        let mut graph = StableGraph::new();
        let root = FigureId(graph.add_node(Figure::new(FigureKind::Layer, Rect::ZERO)));
        let mut tree = Self {
            graph,
            root,
            primary: root,
            handles: root,
            feedback: root,
            scroll: Vec2::ZERO,
            viewport,
            updates: UpdateManager::default(),
        };
        tree.primary = tree.add(root, Figure::new(FigureKind::Layer, Rect::ZERO), None);
        tree.handles = tree.add(root, Figure::new(FigureKind::Layer, Rect::ZERO), None);
        tree.feedback = tree.add(root, Figure::new(FigureKind::Layer, Rect::ZERO), None);
        tree
    }

    pub fn root(&self) -> FigureId {
        self.root
    }

    pub fn primary_layer(&self) -> FigureId {
        self.primary
    }

    pub fn handle_layer(&self) -> FigureId {
        self.handles
    }

    pub fn feedback_layer(&self) -> FigureId {
        self.feedback
    }

    pub fn contains(&self, id: FigureId) -> bool {
        self.graph.contains_node(id.0)
    }

    pub fn get(&self, id: FigureId) -> Option<&Figure> {
        self.graph.node_weight(id.0)
    }

    /// Mutable access. Geometry changes should go through `set_bounds`
    /// so the update manager hears about them.
    pub fn get_mut(&mut self, id: FigureId) -> Option<&mut Figure> {
        if self.graph.contains_node(id.0) {
            self.updates.invalidate(id);
        }
        self.graph.node_weight_mut(id.0)
    }

    pub fn parent(&self, id: FigureId) -> Option<FigureId> {
        self.get(id).and_then(|f| f.parent)
    }

    pub fn children(&self, id: FigureId) -> &[FigureId] {
        self.get(id).map(|f| f.children()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    // ─── Structure ───────────────────────────────────────────────────────

    /// Add `figure` under `parent` at `index` (appended when `None`).
    pub fn add(&mut self, parent: FigureId, mut figure: Figure, index: Option<usize>) -> FigureId {
        figure.parent = Some(parent);
        if let Some(anchor) = figure.anchor
            && self.contains(anchor.owner())
        {
            let abs = anchor.resolve(self.absolute_bounds(anchor.owner()));
            figure.bounds = self.translate_to_relative(parent, abs);
        }
        let id = FigureId(self.graph.add_node(figure));
        if let Some(p) = self.graph.node_weight_mut(parent.0) {
            let at = index.unwrap_or(p.children.len()).min(p.children.len());
            p.children.insert(at, id);
        }
        self.updates.invalidate(id);
        if let Some(abs) = self.try_absolute_bounds(id) {
            self.updates.add_dirty(abs);
        }
        id
    }

    /// Remove `id` and its subtree. Removing a layer or the root is ignored.
    pub fn remove(&mut self, id: FigureId) {
        if [self.root, self.primary, self.handles, self.feedback].contains(&id) {
            log::warn!("refusing to remove a layer figure");
            return;
        }
        if let Some(abs) = self.try_absolute_bounds(id) {
            self.updates.add_dirty(abs);
        }
        if let Some(parent) = self.parent(id)
            && let Some(p) = self.graph.node_weight_mut(parent.0)
        {
            p.children.retain(|c| *c != id);
        }
        let mut stack = vec![id];
        while let Some(fig) = stack.pop() {
            if let Some(removed) = self.graph.remove_node(fig.0) {
                stack.extend(removed.children.iter().copied());
            }
            self.updates.forget(fig);
        }
    }

    /// Move `child` to position `index` among its siblings.
    pub fn reorder(&mut self, child: FigureId, index: usize) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        if let Some(p) = self.graph.node_weight_mut(parent.0) {
            p.children.retain(|c| *c != child);
            let at = index.min(p.children.len());
            p.children.insert(at, child);
        }
        self.updates.invalidate(child);
        if let Some(abs) = self.try_absolute_bounds(child) {
            self.updates.add_dirty(abs);
        }
    }

    /// Move `child` under `new_parent` (e.g. feedback figures changing layer).
    pub fn reparent(&mut self, child: FigureId, new_parent: FigureId, index: Option<usize>) {
        if let Some(old) = self.parent(child)
            && let Some(p) = self.graph.node_weight_mut(old.0)
        {
            p.children.retain(|c| *c != child);
        }
        if let Some(p) = self.graph.node_weight_mut(new_parent.0) {
            let at = index.unwrap_or(p.children.len()).min(p.children.len());
            p.children.insert(at, child);
        }
        if let Some(f) = self.graph.node_weight_mut(child.0) {
            f.parent = Some(new_parent);
        }
        self.updates.invalidate(child);
    }

    /// True if `ancestor` is `id` or contains it.
    pub fn is_ancestor_or_self(&self, ancestor: FigureId, id: FigureId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.parent(c);
        }
        false
    }

    // ─── Geometry ────────────────────────────────────────────────────────

    pub fn bounds(&self, id: FigureId) -> Rect {
        self.get(id).map(|f| f.bounds).unwrap_or(Rect::ZERO)
    }

    pub fn set_bounds(&mut self, id: FigureId, bounds: Rect) {
        let Some(old_abs) = self.try_absolute_bounds(id) else {
            return;
        };
        if let Some(f) = self.graph.node_weight_mut(id.0) {
            if f.bounds == bounds {
                return;
            }
            f.bounds = bounds;
        }
        self.updates.add_dirty(old_abs);
        self.updates.invalidate(id);
    }

    /// Origin of `id`'s client space in absolute coordinates.
    pub fn client_origin(&self, id: FigureId) -> Point {
        let mut origin = -self.scroll;
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == self.root {
                break;
            }
            if let Some(f) = self.get(c) {
                origin += f.bounds.origin().to_vec2();
                cur = f.parent;
            } else {
                break;
            }
        }
        origin.to_point()
    }

    /// Translate `r` from `id`'s client space into absolute coordinates.
    pub fn translate_to_absolute(&self, id: FigureId, r: Rect) -> Rect {
        r + self.client_origin(id).to_vec2()
    }

    /// Translate absolute `r` into `id`'s client space.
    pub fn translate_to_relative(&self, id: FigureId, r: Rect) -> Rect {
        r - self.client_origin(id).to_vec2()
    }

    /// Translate `r` from `id`'s client space into its parent's client space.
    pub fn translate_to_parent(&self, id: FigureId, r: Rect) -> Rect {
        r + self.bounds(id).origin().to_vec2()
    }

    pub fn point_to_relative(&self, id: FigureId, p: Point) -> Point {
        p - self.client_origin(id).to_vec2()
    }

    fn try_absolute_bounds(&self, id: FigureId) -> Option<Rect> {
        let f = self.get(id)?;
        let parent = f.parent?;
        Some(self.translate_to_absolute(parent, f.bounds))
    }

    /// Bounds of `id` in absolute coordinates.
    pub fn absolute_bounds(&self, id: FigureId) -> Rect {
        self.try_absolute_bounds(id).unwrap_or(Rect::ZERO)
    }

    /// Absolute bounds of `id`, re-deriving anchored figures from their
    /// owner's current geometry instead of the last validated layout.
    pub fn resolved_bounds(&self, id: FigureId) -> Rect {
        match self.get(id).and_then(|f| f.anchor) {
            Some(anchor) if self.contains(anchor.owner()) => {
                anchor.resolve(self.absolute_bounds(anchor.owner()))
            }
            _ => self.absolute_bounds(id),
        }
    }

    /// Place `id` so that its absolute bounds equal `abs`.
    pub fn set_absolute_bounds(&mut self, id: FigureId, abs: Rect) {
        if let Some(parent) = self.parent(id) {
            let rel = self.translate_to_relative(parent, abs);
            self.set_bounds(id, rel);
        }
    }

    // ─── Viewport ────────────────────────────────────────────────────────

    pub fn scroll(&self) -> Vec2 {
        self.scroll
    }

    pub fn viewport_size(&self) -> Size {
        self.viewport
    }

    pub fn set_viewport_size(&mut self, size: Size) {
        self.viewport = size;
        self.updates.add_dirty(Rect::from_origin_size(Point::ORIGIN, size));
    }

    /// Visible area in absolute coordinates.
    pub fn viewport_rect(&self) -> Rect {
        Rect::from_origin_size(Point::ORIGIN, self.viewport)
    }

    /// Union of all primary-layer content in content (unscrolled) coordinates.
    pub fn content_bounds(&self) -> Rect {
        dg_core::geometry::rect_union_all(
            self.children(self.primary)
                .iter()
                .flat_map(|c| self.children(*c).iter().chain(std::iter::once(c)))
                .map(|c| self.absolute_bounds(*c) + self.scroll),
        )
        .unwrap_or(Rect::ZERO)
    }

    /// Scroll by `delta`, clamped so content stays reachable.
    /// Returns the delta actually applied.
    pub fn scroll_by(&mut self, delta: Vec2) -> Vec2 {
        let content = self.content_bounds();
        let max_x = (content.x1 - self.viewport.width).max(0.0);
        let max_y = (content.y1 - self.viewport.height).max(0.0);
        let min_x = content.x0.min(0.0);
        let min_y = content.y0.min(0.0);
        let target = Vec2::new(
            (self.scroll.x + delta.x).clamp(min_x, max_x),
            (self.scroll.y + delta.y).clamp(min_y, max_y),
        );
        let applied = target - self.scroll;
        if applied != Vec2::ZERO {
            self.scroll = target;
            let full = self.viewport_rect();
            self.updates.add_dirty(full);
            self.invalidate_anchored();
        }
        applied
    }

    // ─── Updates ─────────────────────────────────────────────────────────

    pub fn update_manager(&self) -> &UpdateManager {
        &self.updates
    }

    pub fn invalidate(&mut self, id: FigureId) {
        self.updates.invalidate(id);
    }

    fn invalidate_anchored(&mut self) {
        let anchored: Vec<FigureId> = self
            .graph
            .node_indices()
            .filter(|i| self.graph[*i].anchor.is_some())
            .map(FigureId)
            .collect();
        for id in anchored {
            self.updates.invalidate(id);
        }
    }

    /// Flush pending work: validate invalid figures first (anchored figures
    /// re-derive their bounds from their owners), then coalesce the damage.
    pub fn perform_update(&mut self) -> UpdateReport {
        let (invalid, mut dirty) = self.updates.take();
        if invalid.is_empty() && dirty.is_empty() {
            return UpdateReport::default();
        }
        let anchored: Vec<(FigureId, Anchor)> = self
            .graph
            .node_indices()
            .filter_map(|i| self.graph[i].anchor.map(|a| (FigureId(i), a)))
            .collect();
        let mut validated = 0;
        for (fig, anchor) in anchored {
            let owner = anchor.owner();
            let stale = invalid
                .iter()
                .any(|i| *i == fig || self.is_ancestor_or_self(*i, owner));
            if !stale || !self.contains(owner) {
                continue;
            }
            let abs = anchor.resolve(self.absolute_bounds(owner));
            if let Some(parent) = self.parent(fig) {
                let rel = self.translate_to_relative(parent, abs);
                if let Some(f) = self.graph.node_weight_mut(fig.0) {
                    f.bounds = rel;
                }
            }
            dirty.push(abs);
            validated += 1;
        }
        for id in &invalid {
            if let Some(abs) = self.try_absolute_bounds(*id) {
                dirty.push(abs);
            }
        }
        let damage = dg_core::geometry::rect_union_all(dirty)
            .map(|d| d.intersect(self.viewport_rect()))
            .filter(|d| d.area() > 0.0);
        log::trace!(
            "update flush: {} invalid, {validated} anchored re-laid, damage {damage:?}",
            invalid.len()
        );
        UpdateReport {
            invalid: invalid.len(),
            validated,
            damage,
        }
    }

    /// Visible figures in paint order with their absolute bounds.
    pub fn paint_list(&self) -> Vec<(FigureId, Rect)> {
        let mut out = Vec::new();
        self.collect_paint(self.root, &mut out);
        out
    }

    fn collect_paint(&self, id: FigureId, out: &mut Vec<(FigureId, Rect)>) {
        let Some(f) = self.get(id) else {
            return;
        };
        if !f.visible {
            return;
        }
        if f.kind != FigureKind::Layer {
            out.push((id, self.absolute_bounds(id)));
        }
        for c in f.children.iter() {
            self.collect_paint(*c, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (FigureTree, FigureId, FigureId) {
        let mut t = FigureTree::new(Size::new(400.0, 300.0));
        let group = t.add(
            t.primary_layer(),
            Figure::new(FigureKind::Group, Rect::new(50.0, 40.0, 250.0, 240.0)),
            None,
        );
        let child = t.add(
            group,
            Figure::new(FigureKind::Rect, Rect::new(10.0, 10.0, 60.0, 40.0)),
            None,
        );
        (t, group, child)
    }

    #[test]
    fn absolute_bounds_accumulate_parent_origins() {
        let (t, _, child) = tree();
        assert_eq!(t.absolute_bounds(child), Rect::new(60.0, 50.0, 110.0, 80.0));
    }

    #[test]
    fn relative_and_absolute_are_inverse() {
        let (t, group, _) = tree();
        let abs = Rect::new(100.0, 100.0, 120.0, 130.0);
        let rel = t.translate_to_relative(group, abs);
        assert_eq!(rel, Rect::new(50.0, 60.0, 70.0, 90.0));
        assert_eq!(t.translate_to_absolute(group, rel), abs);
        assert_eq!(t.translate_to_parent(group, rel), Rect::new(100.0, 100.0, 120.0, 130.0));
    }

    #[test]
    fn scrolling_shifts_absolute_coordinates() {
        let mut t = FigureTree::new(Size::new(100.0, 100.0));
        let big = t.add(
            t.primary_layer(),
            Figure::new(FigureKind::Rect, Rect::new(0.0, 0.0, 500.0, 500.0)),
            None,
        );
        let applied = t.scroll_by(Vec2::new(30.0, 1000.0));
        assert_eq!(applied, Vec2::new(30.0, 400.0));
        assert_eq!(t.absolute_bounds(big).origin(), Point::new(-30.0, -400.0));
    }

    #[test]
    fn remove_drops_subtree() {
        let (mut t, group, child) = tree();
        t.remove(group);
        assert!(!t.contains(child));
        assert!(t.children(t.primary_layer()).is_empty());
    }

    #[test]
    fn reorder_moves_sibling() {
        let (mut t, group, child) = tree();
        let other = t.add(group, Figure::new(FigureKind::Rect, Rect::ZERO), None);
        t.reorder(other, 0);
        assert_eq!(t.children(group), &[other, child]);
    }

    #[test]
    fn layers_cannot_be_removed() {
        let (mut t, _, _) = tree();
        let layer = t.feedback_layer();
        t.remove(layer);
        assert!(t.contains(layer));
    }
}
