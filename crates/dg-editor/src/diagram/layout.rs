use dg_core::{DiagramHandle, ModelId};
use kurbo::Rect;

use super::commands::{AddChildCommand, CloneCommand, ModelRef, OrphanChildCommand, SetBoundsCommand};
use crate::ability::{ConstraintPolicy, LayoutPolicy};
use crate::command::Command;

/// Free-form layout over a [`dg_core::Diagram`]: a child's constraint is
/// simply its bounds in the host's client space.
#[derive(Debug, Clone)]
pub struct DiagramLayoutPolicy {
    diagram: ModelRef,
}

impl DiagramLayoutPolicy {
    pub fn new(diagram: DiagramHandle) -> Self {
        Self {
            diagram: ModelRef(diagram),
        }
    }

    fn handle(&self) -> DiagramHandle {
        self.diagram.0.clone()
    }
}

impl LayoutPolicy for DiagramLayoutPolicy {
    fn add_command(&self, host: ModelId, child: ModelId, constraint: Rect) -> Option<Box<dyn Command>> {
        Some(Box::new(AddChildCommand::new(self.handle(), host, child, constraint)))
    }

    fn clone_command(&self, host: ModelId, children: Vec<(ModelId, Rect)>) -> Option<Box<dyn Command>> {
        Some(Box::new(CloneCommand::new(self.handle(), host, children)))
    }

    fn orphan_command(&self, host: ModelId, child: ModelId) -> Option<Box<dyn Command>> {
        // Only the actual parent may release a child.
        let parent = self.diagram.0.borrow().parent_of(child);
        (parent == Some(host)).then(|| Box::new(OrphanChildCommand::new(self.handle(), child)) as Box<dyn Command>)
    }
}

impl ConstraintPolicy for DiagramLayoutPolicy {
    fn change_constraint_command(&self, child: ModelId, constraint: Rect) -> Option<Box<dyn Command>> {
        Some(Box::new(SetBoundsCommand::new(self.handle(), child, constraint)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_core::{Diagram, Shape, ShapeKind};

    #[test]
    fn orphan_is_refused_by_a_foreign_host() {
        let mut d = Diagram::new();
        let root = d.root();
        let group = d
            .add_shape(root, Shape::new(ModelId::intern("lay_group"), ShapeKind::Group, Rect::new(0.0, 0.0, 100.0, 100.0)))
            .unwrap();
        let leaf = d
            .add_shape(root, Shape::new(ModelId::intern("lay_leaf"), ShapeKind::Rect, Rect::new(0.0, 0.0, 10.0, 10.0)))
            .unwrap();
        let policy = DiagramLayoutPolicy::new(d.into_handle());
        assert!(policy.orphan_command(group, leaf).is_none());
        assert!(policy.orphan_command(root, leaf).is_some_and(|c| c.can_execute()));
    }

    #[test]
    fn constraint_change_is_a_bounds_change() {
        let mut d = Diagram::new();
        let root = d.root();
        let leaf = d
            .add_shape(root, Shape::new(ModelId::intern("lay_leaf2"), ShapeKind::Rect, Rect::new(0.0, 0.0, 10.0, 10.0)))
            .unwrap();
        let handle = d.into_handle();
        let policy = DiagramLayoutPolicy::new(handle.clone());
        let mut cmd = policy
            .change_constraint_command(leaf, Rect::new(5.0, 5.0, 25.0, 15.0))
            .unwrap();
        cmd.execute();
        assert_eq!(handle.borrow().bounds(leaf), Some(Rect::new(5.0, 5.0, 25.0, 15.0)));
    }
}
