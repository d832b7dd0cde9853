//! Binding of the editor core to [`dg_core::Diagram`]: the controller
//! factory, its delegates, the layout policy and the model commands.

mod commands;
mod layout;

pub use commands::{AddChildCommand, CloneCommand, ModelRef, OrphanChildCommand, SetBoundsCommand};
pub use layout::DiagramLayoutPolicy;

use std::cell::RefCell;
use std::rc::Rc;

use dg_core::{DiagramHandle, ModelId, ShapeKind};
use dg_render::{Figure, FigureId, FigureKind, FigureTree};
use kurbo::Rect;

use crate::ability::{
    Ability, AbilityRole, ConstrainedLayoutAbility, ResizableAbility, SelectableAbility,
};
use crate::controller::{Controller, ControllerDelegate, ControllerFactory, ControllerId};
use crate::request::{Request, RequestKind};
use crate::tool::{MarqueeTracker, MoveTracker, SelectTracker, Tool};

/// Requests performed directly on models (open, direct edit), oldest first.
pub type PerformedLog = Rc<RefCell<Vec<(ModelId, RequestKind)>>>;

#[derive(Clone)]
struct Shared {
    diagram: DiagramHandle,
    read_only: bool,
    performed: PerformedLog,
}

impl Shared {
    fn children(&self, model: ModelId) -> Vec<ModelId> {
        self.diagram.borrow().children(model)
    }

    fn record(&self, model: ModelId, req: &Request) {
        log::debug!("{} performed on {model:?}", req.kind);
        self.performed.borrow_mut().push((model, req.kind));
    }

    fn layout(&self) -> Box<dyn Ability> {
        Box::new(ConstrainedLayoutAbility::new(DiagramLayoutPolicy::new(self.diagram.clone())))
    }
}

/// Creates a controller per diagram shape: the root becomes the contents
/// layer, every other shape a selectable, resizable figure.
pub struct DiagramControllerFactory {
    shared: Shared,
}

impl DiagramControllerFactory {
    pub fn new(diagram: DiagramHandle) -> Self {
        Self {
            shared: Shared {
                diagram,
                read_only: false,
                performed: PerformedLog::default(),
            },
        }
    }

    /// Shapes can be selected but not moved, resized or dropped onto.
    pub fn read_only(diagram: DiagramHandle) -> Self {
        let mut factory = Self::new(diagram);
        factory.shared.read_only = true;
        factory
    }

    pub fn performed(&self) -> PerformedLog {
        self.shared.performed.clone()
    }
}

impl ControllerFactory for DiagramControllerFactory {
    fn create(&self, parent: Option<ControllerId>, model: ModelId) -> Controller {
        let shared = self.shared.clone();
        let is_root = parent.is_none() || shared.diagram.borrow().root() == model;
        if is_root {
            Controller::new(model, Box::new(RootDelegate { shared }))
        } else {
            Controller::new(model, Box::new(ShapeDelegate { shared }))
        }
    }
}

struct RootDelegate {
    shared: Shared,
}

impl ControllerDelegate for RootDelegate {
    fn create_figure(&self, _model: ModelId) -> Figure {
        Figure::new(FigureKind::Layer, Rect::ZERO)
    }

    fn model_children(&self, model: ModelId) -> Vec<ModelId> {
        self.shared.children(model)
    }

    fn create_abilities(&self, _model: ModelId) -> Vec<(AbilityRole, Box<dyn Ability>)> {
        if self.shared.read_only {
            Vec::new()
        } else {
            vec![(AbilityRole::Layout, self.shared.layout())]
        }
    }

    fn drag_tracker(&self, _id: ControllerId, _req: &Request) -> Option<Box<dyn Tool>> {
        Some(Box::new(MarqueeTracker::new()))
    }

    fn perform_request(&self, model: ModelId, req: &Request) {
        self.shared.record(model, req);
    }
}

struct ShapeDelegate {
    shared: Shared,
}

fn figure_kind(kind: ShapeKind) -> FigureKind {
    match kind {
        ShapeKind::Root => FigureKind::Layer,
        ShapeKind::Rect => FigureKind::Rect,
        ShapeKind::Ellipse => FigureKind::Ellipse,
        ShapeKind::Group => FigureKind::Group,
    }
}

impl ControllerDelegate for ShapeDelegate {
    fn create_figure(&self, model: ModelId) -> Figure {
        let diagram = self.shared.diagram.borrow();
        let Some(shape) = diagram.shape(model) else {
            log::warn!("no shape for {model:?}");
            return Figure::new(FigureKind::Rect, Rect::ZERO);
        };
        let mut figure = Figure::new(figure_kind(shape.kind), shape.bounds);
        figure.label = shape.label.clone();
        figure
    }

    fn model_children(&self, model: ModelId) -> Vec<ModelId> {
        let is_container = self
            .shared
            .diagram
            .borrow()
            .shape(model)
            .is_some_and(|s| s.kind.is_container());
        if is_container {
            self.shared.children(model)
        } else {
            Vec::new()
        }
    }

    fn create_abilities(&self, model: ModelId) -> Vec<(AbilityRole, Box<dyn Ability>)> {
        let mut abilities: Vec<(AbilityRole, Box<dyn Ability>)> =
            vec![(AbilityRole::SelectionFeedback, Box::new(SelectableAbility::new()))];
        if self.shared.read_only {
            return abilities;
        }
        abilities.push((AbilityRole::PrimaryDrag, Box::new(ResizableAbility::new())));
        let is_container = self
            .shared
            .diagram
            .borrow()
            .shape(model)
            .is_some_and(|s| s.kind.is_container());
        if is_container {
            abilities.push((AbilityRole::Layout, self.shared.layout()));
        }
        abilities
    }

    fn refresh_visuals(&self, model: ModelId, figure: FigureId, figures: &mut FigureTree) {
        let diagram = self.shared.diagram.borrow();
        let Some(shape) = diagram.shape(model) else {
            return;
        };
        figures.set_bounds(figure, shape.bounds);
        if let Some(f) = figures.get_mut(figure)
            && f.label != shape.label
        {
            f.label = shape.label.clone();
        }
        figures.invalidate(figure);
    }

    fn drag_tracker(&self, id: ControllerId, _req: &Request) -> Option<Box<dyn Tool>> {
        if self.shared.read_only {
            Some(Box::new(SelectTracker::new(id)))
        } else {
            Some(Box::new(MoveTracker::new(id)))
        }
    }

    fn perform_request(&self, model: ModelId, req: &Request) {
        self.shared.record(model, req);
    }
}
