//! Reversible diagram mutations. Each command records what it replaced
//! during `execute` and restores exactly that in `undo`.

use std::fmt;

use dg_core::{DiagramError, DiagramHandle, ModelId};
use kurbo::Rect;

use crate::command::Command;

/// Shared diagram reference that prints as its revision, not its contents.
#[derive(Clone)]
pub struct ModelRef(pub DiagramHandle);

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(d) => write!(f, "Diagram(rev {})", d.revision()),
            Err(_) => f.write_str("Diagram(<borrowed>)"),
        }
    }
}

fn report(what: &str, result: Result<(), DiagramError>) {
    if let Err(err) = result {
        log::warn!("{what}: {err}");
    }
}

fn valid_bounds(r: Rect) -> bool {
    r.is_finite() && r.width() >= 0.0 && r.height() >= 0.0
}

// ─── Set bounds ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SetBoundsCommand {
    diagram: ModelRef,
    id: ModelId,
    bounds: Rect,
    previous: Option<Rect>,
    label: &'static str,
}

impl SetBoundsCommand {
    pub fn new(diagram: DiagramHandle, id: ModelId, bounds: Rect) -> Self {
        Self {
            diagram: ModelRef(diagram),
            id,
            bounds,
            previous: None,
            label: "Set bounds",
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }
}

impl Command for SetBoundsCommand {
    fn label(&self) -> Option<&str> {
        Some(self.label)
    }

    fn can_execute(&self) -> bool {
        let d = self.diagram.0.borrow();
        d.contains(self.id) && self.id != d.root() && valid_bounds(self.bounds)
    }

    fn execute(&mut self) {
        let mut d = self.diagram.0.borrow_mut();
        self.previous = d.bounds(self.id);
        report("set bounds", d.set_bounds(self.id, self.bounds));
    }

    fn undo(&mut self) {
        if let Some(previous) = self.previous {
            report("restore bounds", self.diagram.0.borrow_mut().set_bounds(self.id, previous));
        }
    }
}

// ─── Orphan ──────────────────────────────────────────────────────────────

/// Detach a child from its parent; undo puts it back at the same index.
#[derive(Debug)]
pub struct OrphanChildCommand {
    diagram: ModelRef,
    id: ModelId,
    former: Option<(ModelId, usize)>,
}

impl OrphanChildCommand {
    pub fn new(diagram: DiagramHandle, id: ModelId) -> Self {
        Self {
            diagram: ModelRef(diagram),
            id,
            former: None,
        }
    }
}

impl Command for OrphanChildCommand {
    fn label(&self) -> Option<&str> {
        Some("Orphan")
    }

    fn can_execute(&self) -> bool {
        let d = self.diagram.0.borrow();
        self.id != d.root() && d.parent_of(self.id).is_some()
    }

    fn execute(&mut self) {
        match self.diagram.0.borrow_mut().detach(self.id) {
            Ok(former) => self.former = former,
            Err(err) => log::warn!("orphan {}: {err}", self.id),
        }
    }

    fn undo(&mut self) {
        if let Some((parent, index)) = self.former {
            report(
                "re-attach orphan",
                self.diagram.0.borrow_mut().insert_child(parent, self.id, Some(index)),
            );
        }
    }
}

// ─── Add ─────────────────────────────────────────────────────────────────

/// Put `id` under `host` (last) at `bounds`, detaching it from wherever it
/// was.
#[derive(Debug)]
pub struct AddChildCommand {
    diagram: ModelRef,
    host: ModelId,
    id: ModelId,
    bounds: Rect,
    previous_bounds: Option<Rect>,
    previous_parent: Option<(ModelId, usize)>,
}

impl AddChildCommand {
    pub fn new(diagram: DiagramHandle, host: ModelId, id: ModelId, bounds: Rect) -> Self {
        Self {
            diagram: ModelRef(diagram),
            host,
            id,
            bounds,
            previous_bounds: None,
            previous_parent: None,
        }
    }
}

impl Command for AddChildCommand {
    fn label(&self) -> Option<&str> {
        Some("Add")
    }

    fn can_execute(&self) -> bool {
        let d = self.diagram.0.borrow();
        let host_accepts = d.shape(self.host).is_some_and(|s| s.kind.is_container());
        host_accepts
            && d.contains(self.id)
            && self.id != d.root()
            && !d.is_ancestor_or_self(self.id, self.host)
            && valid_bounds(self.bounds)
    }

    fn execute(&mut self) {
        let mut d = self.diagram.0.borrow_mut();
        self.previous_bounds = d.bounds(self.id);
        self.previous_parent = d.parent_of(self.id).zip(d.index_in_parent(self.id));
        report("add child", d.insert_child(self.host, self.id, None));
        report("place child", d.set_bounds(self.id, self.bounds));
    }

    fn undo(&mut self) {
        let mut d = self.diagram.0.borrow_mut();
        match self.previous_parent {
            Some((parent, index)) => report("restore parent", d.insert_child(parent, self.id, Some(index))),
            None => report("detach added child", d.detach(self.id).map(|_| ())),
        }
        if let Some(previous) = self.previous_bounds {
            report("restore bounds", d.set_bounds(self.id, previous));
        }
    }
}

// ─── Clone ───────────────────────────────────────────────────────────────

/// Deep-copy each source under `host` at its requested bounds.
#[derive(Debug)]
pub struct CloneCommand {
    diagram: ModelRef,
    host: ModelId,
    sources: Vec<(ModelId, Rect)>,
    created: Vec<ModelId>,
}

impl CloneCommand {
    pub fn new(diagram: DiagramHandle, host: ModelId, sources: Vec<(ModelId, Rect)>) -> Self {
        Self {
            diagram: ModelRef(diagram),
            host,
            sources,
            created: Vec::new(),
        }
    }

    /// Ids of the copies made by the last execution.
    pub fn created(&self) -> &[ModelId] {
        &self.created
    }
}

impl Command for CloneCommand {
    fn label(&self) -> Option<&str> {
        Some("Clone")
    }

    fn can_execute(&self) -> bool {
        let d = self.diagram.0.borrow();
        !self.sources.is_empty()
            && d.shape(self.host).is_some_and(|s| s.kind.is_container())
            && self.sources.iter().all(|(src, bounds)| {
                d.contains(*src)
                    && *src != d.root()
                    && !d.is_ancestor_or_self(*src, self.host)
                    && valid_bounds(*bounds)
            })
    }

    fn execute(&mut self) {
        let mut d = self.diagram.0.borrow_mut();
        self.created.clear();
        for (src, bounds) in &self.sources {
            match d.deep_clone(*src, self.host, *bounds) {
                Ok(copy) => self.created.push(copy),
                Err(err) => log::warn!("clone {src}: {err}"),
            }
        }
    }

    fn undo(&mut self) {
        let mut d = self.diagram.0.borrow_mut();
        for copy in self.created.drain(..).rev() {
            report("remove clone", d.remove_subtree(copy));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_core::{Diagram, Shape, ShapeKind};
    use pretty_assertions::assert_eq;

    fn fixture() -> (DiagramHandle, ModelId, ModelId, ModelId) {
        let mut d = Diagram::new();
        let root = d.root();
        let group = d
            .add_shape(root, Shape::new(ModelId::intern("cmd_group"), ShapeKind::Group, Rect::new(0.0, 0.0, 200.0, 200.0)))
            .unwrap();
        let a = d
            .add_shape(root, Shape::new(ModelId::intern("cmd_a"), ShapeKind::Rect, Rect::new(300.0, 0.0, 350.0, 50.0)))
            .unwrap();
        let b = d
            .add_shape(root, Shape::new(ModelId::intern("cmd_b"), ShapeKind::Rect, Rect::new(400.0, 0.0, 450.0, 50.0)))
            .unwrap();
        (d.into_handle(), group, a, b)
    }

    #[test]
    fn set_bounds_undoes_to_previous() {
        let (h, _, a, _) = fixture();
        let mut cmd = SetBoundsCommand::new(h.clone(), a, Rect::new(1.0, 2.0, 11.0, 12.0));
        assert!(cmd.can_execute());
        cmd.execute();
        assert_eq!(h.borrow().bounds(a), Some(Rect::new(1.0, 2.0, 11.0, 12.0)));
        cmd.undo();
        assert_eq!(h.borrow().bounds(a), Some(Rect::new(300.0, 0.0, 350.0, 50.0)));
    }

    #[test]
    fn negative_size_is_rejected() {
        let (h, _, a, _) = fixture();
        let cmd = SetBoundsCommand::new(h, a, Rect::new(10.0, 10.0, 5.0, 20.0));
        assert!(!cmd.can_execute());
    }

    #[test]
    fn orphan_then_add_reparents_and_undo_restores_order() {
        let (h, group, a, b) = fixture();
        let root = h.borrow().root();
        let mut orphan = OrphanChildCommand::new(h.clone(), a);
        let mut add = AddChildCommand::new(h.clone(), group, a, Rect::new(5.0, 5.0, 55.0, 55.0));
        orphan.execute();
        assert!(add.can_execute());
        add.execute();
        assert_eq!(h.borrow().parent_of(a), Some(group));
        assert_eq!(h.borrow().children(root), vec![group, b]);

        add.undo();
        orphan.undo();
        assert_eq!(h.borrow().children(root), vec![group, a, b]);
        assert_eq!(h.borrow().bounds(a), Some(Rect::new(300.0, 0.0, 350.0, 50.0)));
    }

    #[test]
    fn add_into_non_container_or_own_subtree_is_rejected() {
        let (h, group, a, _) = fixture();
        assert!(!AddChildCommand::new(h.clone(), a, group, Rect::ZERO).can_execute());
        assert!(!AddChildCommand::new(h, group, group, Rect::ZERO).can_execute());
    }

    #[test]
    fn clone_creates_copies_and_undo_removes_them() {
        let (h, group, a, _) = fixture();
        let mut cmd = CloneCommand::new(h.clone(), group, vec![(a, Rect::new(10.0, 10.0, 60.0, 60.0))]);
        assert!(cmd.can_execute());
        cmd.execute();
        let copies = cmd.created().to_vec();
        assert_eq!(copies.len(), 1);
        assert_eq!(h.borrow().children(group), copies);
        assert_eq!(h.borrow().bounds(copies[0]), Some(Rect::new(10.0, 10.0, 60.0, 60.0)));
        cmd.undo();
        assert!(h.borrow().children(group).is_empty());
        assert!(!h.borrow().contains(copies[0]));
    }
}
