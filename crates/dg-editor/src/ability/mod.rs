//! Abilities: pluggable editing behaviour installed on controllers.
//!
//! Every method has a no-op default so an ability only overrides the
//! capabilities it contributes. Tools never talk to abilities directly;
//! they go through the [`Viewer`](crate::viewer::Viewer), which iterates a
//! controller's abilities in installation order.

mod layout;
mod movable;
mod selectable;

pub use layout::{ConstrainedLayoutAbility, ConstraintPolicy, LayoutAbility, LayoutPolicy};
pub use movable::{MovableAbility, ResizableAbility};
pub use selectable::SelectableAbility;

use dg_core::ModelId;
use dg_render::{FigureId, FigureTree};

use crate::command::Command;
use crate::config::EditorConfig;
use crate::controller::{ControllerId, SelectionState};
use crate::handle::HandleRegistry;
use crate::request::Request;
use crate::viewer::Viewer;

/// Slot an ability occupies on its controller. One ability per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbilityRole {
    /// Model-level behaviour of the controller itself.
    Component,
    /// Child management that is independent of layout.
    Container,
    /// Placement of children (move, resize, add, clone, orphan).
    Layout,
    /// Dragging and resizing the host; owns the selection handles.
    PrimaryDrag,
    /// Hover and selection emphasis.
    SelectionFeedback,
    DirectEdit,
}

/// Read-only view handed to command/target queries.
pub struct AbilityContext<'a> {
    pub viewer: &'a Viewer,
    pub host: ControllerId,
}

impl AbilityContext<'_> {
    pub fn model(&self) -> Option<ModelId> {
        self.viewer.model_of(self.host)
    }

    pub fn parent(&self) -> Option<ControllerId> {
        self.viewer.parent_of(self.host)
    }

    pub fn figure(&self) -> Option<FigureId> {
        self.viewer.figure_of(self.host)
    }

    pub fn figures(&self) -> &FigureTree {
        self.viewer.figures()
    }
}

/// Mutable view handed to feedback and lifecycle hooks.
pub struct FeedbackContext<'a> {
    pub figures: &'a mut FigureTree,
    pub handles: &'a mut HandleRegistry,
    pub config: &'a EditorConfig,
    pub host: ControllerId,
    pub host_figure: Option<FigureId>,
}

impl FeedbackContext<'_> {
    /// Remove a transient figure if it is still present.
    pub fn discard(&mut self, fig: Option<FigureId>) {
        if let Some(f) = fig
            && self.figures.contains(f)
        {
            self.figures.remove(f);
        }
    }
}

pub trait Ability {
    fn name(&self) -> &'static str;

    fn activate(&mut self, _cx: &mut FeedbackContext<'_>) {}

    /// Must leave no figures behind.
    fn deactivate(&mut self, _cx: &mut FeedbackContext<'_>) {}

    fn understands(&self, _req: &Request, _cx: &AbilityContext<'_>) -> bool {
        false
    }

    fn get_command(&self, _req: &Request, _cx: &AbilityContext<'_>) -> Option<Box<dyn Command>> {
        None
    }

    fn get_target(&self, _req: &Request, _cx: &AbilityContext<'_>) -> Option<ControllerId> {
        None
    }

    fn show_source_feedback(&mut self, _req: &Request, _cx: &mut FeedbackContext<'_>) {}

    fn erase_source_feedback(&mut self, _req: &Request, _cx: &mut FeedbackContext<'_>) {}

    fn show_target_feedback(&mut self, _req: &Request, _cx: &mut FeedbackContext<'_>) {}

    fn erase_target_feedback(&mut self, _req: &Request, _cx: &mut FeedbackContext<'_>) {}

    fn selection_changed(&mut self, _state: SelectionState, _cx: &mut FeedbackContext<'_>) {}
}

/// An installed ability plus its activation bit, so activate/deactivate
/// calls always pair up.
pub(crate) struct AbilitySlot {
    pub(crate) role: AbilityRole,
    pub(crate) ability: Box<dyn Ability>,
    pub(crate) active: bool,
}

impl AbilitySlot {
    pub(crate) fn new(role: AbilityRole, ability: Box<dyn Ability>) -> Self {
        Self {
            role,
            ability,
            active: false,
        }
    }

    pub(crate) fn activate(&mut self, cx: &mut FeedbackContext<'_>) {
        if !self.active {
            self.active = true;
            self.ability.activate(cx);
        }
    }

    pub(crate) fn deactivate(&mut self, cx: &mut FeedbackContext<'_>) {
        if self.active {
            self.active = false;
            self.ability.deactivate(cx);
        }
    }
}
