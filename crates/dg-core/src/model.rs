//! Diagram data model.
//!
//! A diagram is a containment tree of shapes stored in a `StableDiGraph`.
//! Edges point parent → child; the visual order of children is kept in an
//! explicit per-parent list so that reordering never touches the graph.
//! Shape bounds are relative to the parent's origin.
//!
//! The model is shared between controllers, abilities and commands through
//! a [`DiagramHandle`]; nothing in the editor owns it outright.

use crate::error::DiagramError;
use crate::id::ModelId;
use kurbo::{Point, Rect, Vec2};
use petgraph::Direction as EdgeDirection;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared, single-threaded handle to a diagram.
pub type DiagramHandle = Rc<RefCell<Diagram>>;

/// The visual kind of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Root,
    Rect,
    Ellipse,
    /// A container whose children are laid out freely inside it.
    Group,
}

impl ShapeKind {
    /// Whether this kind accepts children.
    pub fn is_container(self) -> bool {
        matches!(self, ShapeKind::Root | ShapeKind::Group)
    }
}

/// A node of the diagram.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub id: ModelId,
    pub kind: ShapeKind,
    /// Bounds relative to the parent's origin.
    pub bounds: Rect,
    pub label: String,
}

impl Shape {
    pub fn new(id: ModelId, kind: ShapeKind, bounds: Rect) -> Self {
        Self {
            id,
            kind,
            bounds,
            label: String::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// The diagram: a containment tree of shapes.
#[derive(Debug, Clone)]
pub struct Diagram {
    graph: StableDiGraph<Shape, ()>,
    root: NodeIndex,
    id_index: HashMap<ModelId, NodeIndex>,
    /// Explicit child order per parent.
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,
    /// Bumped on every mutation.
    revision: u64,
}

impl Default for Diagram {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagram {
    /// Create an empty diagram with a root shape.
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let root_id = ModelId::intern("root");
        let root = graph.add_node(Shape::new(root_id, ShapeKind::Root, Rect::ZERO));
        let mut id_index = HashMap::new();
        id_index.insert(root_id, root);
        Self {
            graph,
            root,
            id_index,
            child_order: HashMap::new(),
            revision: 0,
        }
    }

    /// Wrap into a shared handle.
    pub fn into_handle(self) -> DiagramHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn root(&self) -> ModelId {
        self.graph[self.root].id
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.id_index.contains_key(&id)
    }

    pub fn shape(&self, id: ModelId) -> Option<&Shape> {
        self.id_index.get(&id).map(|idx| &self.graph[*idx])
    }

    fn index(&self, id: ModelId) -> Result<NodeIndex, DiagramError> {
        self.id_index
            .get(&id)
            .copied()
            .ok_or(DiagramError::UnknownModel(id))
    }

    /// Number of shapes, root included (detached shapes count too).
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() <= 1
    }

    // ─── Tree queries ────────────────────────────────────────────────────

    /// Ordered children of `id`. Unknown ids have no children.
    pub fn children(&self, id: ModelId) -> Vec<ModelId> {
        self.id_index
            .get(&id)
            .and_then(|idx| self.child_order.get(idx))
            .map(|order| order.iter().map(|c| self.graph[*c].id).collect())
            .unwrap_or_default()
    }

    pub fn parent_of(&self, id: ModelId) -> Option<ModelId> {
        let idx = *self.id_index.get(&id)?;
        self.graph
            .neighbors_directed(idx, EdgeDirection::Incoming)
            .next()
            .map(|p| self.graph[p].id)
    }

    pub fn index_in_parent(&self, id: ModelId) -> Option<usize> {
        let idx = *self.id_index.get(&id)?;
        let parent = self
            .graph
            .neighbors_directed(idx, EdgeDirection::Incoming)
            .next()?;
        self.child_order.get(&parent)?.iter().position(|c| *c == idx)
    }

    /// True if `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: ModelId, id: ModelId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.parent_of(c);
        }
        false
    }

    pub fn bounds(&self, id: ModelId) -> Option<Rect> {
        self.shape(id).map(|s| s.bounds)
    }

    /// Origin of `id`'s coordinate space in diagram coordinates
    /// (the sum of all ancestor origins, excluding `id` itself).
    pub fn absolute_origin(&self, id: ModelId) -> Point {
        let mut origin = Vec2::ZERO;
        let mut cur = self.parent_of(id);
        while let Some(p) = cur {
            if let Some(b) = self.bounds(p) {
                origin += b.origin().to_vec2();
            }
            cur = self.parent_of(p);
        }
        origin.to_point()
    }

    // ─── Mutations ───────────────────────────────────────────────────────

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Add a new shape as the last child of `parent`.
    pub fn add_shape(&mut self, parent: ModelId, shape: Shape) -> Result<ModelId, DiagramError> {
        let parent_idx = self.index(parent)?;
        if self.id_index.contains_key(&shape.id) {
            return Err(DiagramError::DuplicateModel(shape.id));
        }
        let id = shape.id;
        let idx = self.graph.add_node(shape);
        self.graph.add_edge(parent_idx, idx, ());
        self.id_index.insert(id, idx);
        self.child_order.entry(parent_idx).or_default().push(idx);
        self.touch();
        Ok(id)
    }

    /// Attach a detached shape under `parent` at `index` (clamped).
    pub fn insert_child(
        &mut self,
        parent: ModelId,
        child: ModelId,
        index: Option<usize>,
    ) -> Result<(), DiagramError> {
        let parent_idx = self.index(parent)?;
        let child_idx = self.index(child)?;
        if child_idx == self.root {
            return Err(DiagramError::RootImmutable);
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(DiagramError::Cycle { parent, child });
        }
        if self.parent_of(child).is_some() {
            self.detach(child)?;
        }
        self.graph.add_edge(parent_idx, child_idx, ());
        let order = self.child_order.entry(parent_idx).or_default();
        let at = index.unwrap_or(order.len()).min(order.len());
        order.insert(at, child_idx);
        self.touch();
        Ok(())
    }

    /// Detach `child` from its parent, keeping the subtree in the diagram.
    /// Returns the former parent and index.
    pub fn detach(&mut self, child: ModelId) -> Result<Option<(ModelId, usize)>, DiagramError> {
        let child_idx = self.index(child)?;
        if child_idx == self.root {
            return Err(DiagramError::RootImmutable);
        }
        let Some(parent_idx) = self
            .graph
            .neighbors_directed(child_idx, EdgeDirection::Incoming)
            .next()
        else {
            return Ok(None);
        };
        if let Some(edge) = self.graph.find_edge(parent_idx, child_idx) {
            self.graph.remove_edge(edge);
        }
        let mut index = 0;
        if let Some(order) = self.child_order.get_mut(&parent_idx)
            && let Some(pos) = order.iter().position(|c| *c == child_idx)
        {
            order.remove(pos);
            index = pos;
        }
        self.touch();
        Ok(Some((self.graph[parent_idx].id, index)))
    }

    /// Remove `id` and its whole subtree from the diagram.
    pub fn remove_subtree(&mut self, id: ModelId) -> Result<(), DiagramError> {
        self.detach(id)?;
        let mut stack = vec![self.index(id)?];
        while let Some(idx) = stack.pop() {
            if let Some(order) = self.child_order.remove(&idx) {
                stack.extend(order);
            }
            if let Some(shape) = self.graph.remove_node(idx) {
                self.id_index.remove(&shape.id);
            }
        }
        self.touch();
        Ok(())
    }

    pub fn set_bounds(&mut self, id: ModelId, bounds: Rect) -> Result<(), DiagramError> {
        let idx = self.index(id)?;
        self.graph[idx].bounds = bounds;
        self.touch();
        Ok(())
    }

    pub fn set_label(&mut self, id: ModelId, label: &str) -> Result<(), DiagramError> {
        let idx = self.index(id)?;
        self.graph[idx].label = label.to_string();
        self.touch();
        Ok(())
    }

    /// Deep-copy `source` (with fresh ids) as the last child of `parent`,
    /// placing the copy at `bounds`. Returns the id of the copy's root.
    pub fn deep_clone(
        &mut self,
        source: ModelId,
        parent: ModelId,
        bounds: Rect,
    ) -> Result<ModelId, DiagramError> {
        let original = self.shape(source).cloned().ok_or(DiagramError::UnknownModel(source))?;
        if self.is_ancestor_or_self(source, parent) {
            return Err(DiagramError::Cycle { parent, child: source });
        }
        let copy_id = ModelId::with_prefix(&format!("{}_copy", original.id.as_str()));
        let copy = Shape {
            id: copy_id,
            bounds,
            ..original
        };
        self.add_shape(parent, copy)?;
        for child in self.children(source) {
            let child_bounds = self.bounds(child).unwrap_or_default();
            self.deep_clone(child, copy_id, child_bounds)?;
        }
        Ok(copy_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Diagram {
        let mut d = Diagram::new();
        let root = d.root();
        let group = ModelId::intern("m_group");
        d.add_shape(
            root,
            Shape::new(group, ShapeKind::Group, Rect::new(100.0, 100.0, 300.0, 300.0)),
        )
        .unwrap();
        for (name, x) in [("m_a", 10.0), ("m_b", 60.0)] {
            d.add_shape(
                group,
                Shape::new(
                    ModelId::intern(name),
                    ShapeKind::Rect,
                    Rect::new(x, 10.0, x + 40.0, 40.0),
                ),
            )
            .unwrap();
        }
        d
    }

    #[test]
    fn children_keep_insertion_order() {
        let d = sample();
        assert_eq!(
            d.children(ModelId::intern("m_group")),
            vec![ModelId::intern("m_a"), ModelId::intern("m_b")]
        );
        assert_eq!(d.parent_of(ModelId::intern("m_b")), Some(ModelId::intern("m_group")));
        assert_eq!(d.index_in_parent(ModelId::intern("m_b")), Some(1));
    }

    #[test]
    fn detach_and_reinsert_reorders() {
        let mut d = sample();
        let b = ModelId::intern("m_b");
        let group = ModelId::intern("m_group");
        assert_eq!(d.detach(b).unwrap(), Some((group, 1)));
        assert_eq!(d.parent_of(b), None);
        d.insert_child(group, b, Some(0)).unwrap();
        assert_eq!(d.children(group), vec![b, ModelId::intern("m_a")]);
    }

    #[test]
    fn insert_rejects_cycles() {
        let mut d = sample();
        let group = ModelId::intern("m_group");
        let a = ModelId::intern("m_a");
        assert!(matches!(
            d.insert_child(a, group, None),
            Err(DiagramError::Cycle { .. })
        ));
    }

    #[test]
    fn absolute_origin_sums_ancestors() {
        let d = sample();
        assert_eq!(
            d.absolute_origin(ModelId::intern("m_a")),
            Point::new(100.0, 100.0)
        );
    }

    #[test]
    fn deep_clone_copies_subtree() {
        let mut d = sample();
        let root = d.root();
        let copy = d
            .deep_clone(ModelId::intern("m_group"), root, Rect::new(0.0, 0.0, 200.0, 200.0))
            .unwrap();
        assert_eq!(d.children(copy).len(), 2);
        assert_eq!(d.children(root).len(), 2);
        assert_eq!(d.bounds(copy), Some(Rect::new(0.0, 0.0, 200.0, 200.0)));
    }

    #[test]
    fn remove_subtree_drops_descendants() {
        let mut d = sample();
        d.remove_subtree(ModelId::intern("m_group")).unwrap();
        assert!(!d.contains(ModelId::intern("m_a")));
        assert!(d.children(d.root()).is_empty());
    }

    #[test]
    fn mutations_bump_revision() {
        let mut d = sample();
        let before = d.revision();
        d.set_bounds(ModelId::intern("m_a"), Rect::ZERO).unwrap();
        assert!(d.revision() > before);
    }
}
