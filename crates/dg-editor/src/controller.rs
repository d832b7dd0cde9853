//! Controllers: the tree that binds model objects to figures.
//!
//! Controllers live in their viewer's arena and are addressed by
//! [`ControllerId`]. Everything that needs more than one controller at a
//! time (the lifecycle, reconciliation against the model, activation) is
//! implemented on [`Viewer`] below, so parent and child can be reached
//! through one mutable borrow.

use std::collections::HashMap;
use std::fmt;

use dg_core::ModelId;
use dg_render::{Figure, FigureId, FigureTree};
use petgraph::graph::NodeIndex;
use smallvec::SmallVec;

use crate::ability::{Ability, AbilityRole, AbilitySlot, FeedbackContext};
use crate::request::Request;
use crate::tool::Tool;
use crate::viewer::Viewer;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControllerId(pub(crate) NodeIndex);

impl fmt::Debug for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0.index())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SelectionState {
    #[default]
    None,
    Selected,
    Primary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    ChildAdded { child: ControllerId, index: usize },
    RemovingChild { child: ControllerId, index: usize },
    Activated,
    Deactivated,
    SelectionChanged(SelectionState),
}

/// Model-specific behaviour of a controller.
pub trait ControllerDelegate {
    fn create_figure(&self, model: ModelId) -> Figure;

    /// Ordered model children that should get child controllers.
    fn model_children(&self, _model: ModelId) -> Vec<ModelId> {
        Vec::new()
    }

    fn create_abilities(&self, _model: ModelId) -> Vec<(AbilityRole, Box<dyn Ability>)> {
        Vec::new()
    }

    /// Push model state into the figure.
    fn refresh_visuals(&self, _model: ModelId, _figure: FigureId, _figures: &mut FigureTree) {}

    fn drag_tracker(&self, id: ControllerId, _req: &Request) -> Option<Box<dyn Tool>> {
        Some(Box::new(crate::tool::SelectTracker::new(id)))
    }

    /// Handle requests that are performed rather than turned into commands
    /// (open, direct edit).
    fn perform_request(&self, _model: ModelId, _req: &Request) {}

    fn is_selectable(&self) -> bool {
        true
    }
}

/// Creates the controller for a model object.
pub trait ControllerFactory {
    fn create(&self, parent: Option<ControllerId>, model: ModelId) -> Controller;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Flags(u8);

impl Flags {
    const ACTIVE: u8 = 1;
    const REGISTERED: u8 = 2;

    fn get(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    fn set(&mut self, flag: u8, on: bool) {
        if on {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }
}

/// Handle returned by [`Viewer::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

type EventListener = Box<dyn FnMut(ControllerId, &ControllerEvent)>;

#[derive(Default)]
struct Emitter {
    listeners: Vec<(u64, EventListener)>,
    next: u64,
}

impl Emitter {
    fn add(&mut self, f: EventListener) -> Subscription {
        self.next += 1;
        self.listeners.push((self.next, f));
        Subscription(self.next)
    }

    fn remove(&mut self, sub: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != sub.0);
        self.listeners.len() != before
    }

    fn emit(&mut self, id: ControllerId, event: &ControllerEvent) {
        for (_, listener) in &mut self.listeners {
            listener(id, event);
        }
    }
}

pub struct Controller {
    pub(crate) model: ModelId,
    pub(crate) parent: Option<ControllerId>,
    pub(crate) children: Vec<ControllerId>,
    pub(crate) abilities: SmallVec<[AbilitySlot; 4]>,
    pub(crate) figure: Option<FigureId>,
    pub(crate) selection: SelectionState,
    pub(crate) delegate: Box<dyn ControllerDelegate>,
    flags: Flags,
    events: Emitter,
}

impl Controller {
    pub fn new(model: ModelId, delegate: Box<dyn ControllerDelegate>) -> Self {
        Self {
            model,
            parent: None,
            children: Vec::new(),
            abilities: SmallVec::new(),
            figure: None,
            selection: SelectionState::None,
            delegate,
            flags: Flags::default(),
            events: Emitter::default(),
        }
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn parent(&self) -> Option<ControllerId> {
        self.parent
    }

    pub fn children(&self) -> &[ControllerId] {
        &self.children
    }

    pub fn figure(&self) -> Option<FigureId> {
        self.figure
    }

    pub fn selection(&self) -> SelectionState {
        self.selection
    }

    pub fn is_active(&self) -> bool {
        self.flags.get(Flags::ACTIVE)
    }

    pub fn is_registered(&self) -> bool {
        self.flags.get(Flags::REGISTERED)
    }

    pub fn is_selectable(&self) -> bool {
        self.delegate.is_selectable()
    }

    pub fn delegate(&self) -> &dyn ControllerDelegate {
        self.delegate.as_ref()
    }

    pub fn ability(&self, role: AbilityRole) -> Option<&dyn Ability> {
        self.abilities
            .iter()
            .find(|s| s.role == role)
            .map(|s| s.ability.as_ref())
    }

    pub fn ability_roles(&self) -> impl Iterator<Item = AbilityRole> + '_ {
        self.abilities.iter().map(|s| s.role)
    }
}

// ─── Lifecycle ───────────────────────────────────────────────────────────

impl Viewer {
    /// Run `f` over every ability slot of `id` with a feedback context.
    pub(crate) fn with_abilities(
        &mut self,
        id: ControllerId,
        mut f: impl FnMut(&mut AbilitySlot, &mut FeedbackContext<'_>),
    ) {
        let (controllers, figures, handles, config) = self.split_mut();
        let Some(c) = controllers.node_weight_mut(id.0) else {
            return;
        };
        let mut cx = FeedbackContext {
            figures,
            handles,
            config,
            host: id,
            host_figure: c.figure,
        };
        for slot in c.abilities.iter_mut() {
            f(slot, &mut cx);
        }
    }

    pub(crate) fn emit(&mut self, id: ControllerId, event: ControllerEvent) {
        if let Some(c) = self.controller_mut(id) {
            c.events.emit(id, &event);
        }
    }

    pub fn subscribe(
        &mut self,
        id: ControllerId,
        f: impl FnMut(ControllerId, &ControllerEvent) + 'static,
    ) -> Option<Subscription> {
        self.controller_mut(id).map(|c| c.events.add(Box::new(f)))
    }

    pub fn unsubscribe(&mut self, id: ControllerId, sub: Subscription) -> bool {
        self.controller_mut(id).is_some_and(|c| c.events.remove(sub))
    }

    /// Install `ability` under `role`, replacing (and deactivating) any
    /// previous occupant. Activated immediately when the host is active.
    pub fn install_ability(&mut self, id: ControllerId, role: AbilityRole, ability: Box<dyn Ability>) {
        let (controllers, figures, handles, config) = self.split_mut();
        let Some(c) = controllers.node_weight_mut(id.0) else {
            return;
        };
        let mut cx = FeedbackContext {
            figures,
            handles,
            config,
            host: id,
            host_figure: c.figure,
        };
        let pos = match c.abilities.iter().position(|s| s.role == role) {
            Some(pos) => {
                c.abilities[pos].deactivate(&mut cx);
                log::debug!("{id:?}: replacing {:?} ability {}", role, c.abilities[pos].ability.name());
                c.abilities[pos] = AbilitySlot::new(role, ability);
                pos
            }
            None => {
                c.abilities.push(AbilitySlot::new(role, ability));
                c.abilities.len() - 1
            }
        };
        if c.flags.get(Flags::ACTIVE) {
            c.abilities[pos].activate(&mut cx);
        }
    }

    pub fn remove_ability(&mut self, id: ControllerId, role: AbilityRole) -> Option<Box<dyn Ability>> {
        let (controllers, figures, handles, config) = self.split_mut();
        let c = controllers.node_weight_mut(id.0)?;
        let pos = c.abilities.iter().position(|s| s.role == role)?;
        let mut slot = c.abilities.remove(pos);
        let mut cx = FeedbackContext {
            figures,
            handles,
            config,
            host: id,
            host_figure: c.figure,
        };
        slot.deactivate(&mut cx);
        Some(slot.ability)
    }

    /// Activate `id`, its abilities, then its children.
    pub fn activate(&mut self, id: ControllerId) {
        let Some(c) = self.controller_mut(id) else {
            return;
        };
        if c.is_active() {
            return;
        }
        c.flags.set(Flags::ACTIVE, true);
        self.with_abilities(id, |slot, cx| slot.activate(cx));
        for child in self.children_of(id) {
            self.activate(child);
        }
        self.emit(id, ControllerEvent::Activated);
    }

    /// Deactivate children first, then `id`'s abilities.
    pub fn deactivate(&mut self, id: ControllerId) {
        if !self.is_active(id) {
            return;
        }
        for child in self.children_of(id) {
            self.deactivate(child);
        }
        self.with_abilities(id, |slot, cx| slot.deactivate(cx));
        if let Some(c) = self.controller_mut(id) {
            c.flags.set(Flags::ACTIVE, false);
        }
        self.emit(id, ControllerEvent::Deactivated);
    }

    /// Register, create abilities, recurse, refresh.
    pub(crate) fn add_notify(&mut self, id: ControllerId) {
        self.register(id);
        let created = match self.controller(id) {
            Some(c) => c.delegate.create_abilities(c.model),
            None => return,
        };
        for (role, ability) in created {
            self.install_ability(id, role, ability);
        }
        for child in self.children_of(id) {
            self.add_notify(child);
        }
        self.refresh(id);
    }

    /// Deselect, recurse, unregister.
    pub(crate) fn remove_notify(&mut self, id: ControllerId) {
        if self.selection_state(id) != SelectionState::None {
            self.deselect(id);
        }
        for child in self.children_of(id) {
            self.remove_notify(child);
        }
        self.unregister(id);
    }

    /// Insert a new child controller at `index` under `parent`.
    pub(crate) fn add_child(&mut self, parent: ControllerId, mut child: Controller, index: usize) -> ControllerId {
        child.parent = Some(parent);
        let id = self.insert_controller(child);
        let at = match self.controller_mut(parent) {
            Some(p) => {
                let at = index.min(p.children.len());
                p.children.insert(at, id);
                at
            }
            None => 0,
        };
        self.add_child_visual(parent, id, at);
        self.add_notify(id);
        if self.is_active(parent) {
            self.activate(id);
        }
        self.emit(parent, ControllerEvent::ChildAdded { child: id, index: at });
        id
    }

    /// Tear down and detach the child at position `index`.
    pub(crate) fn remove_child(&mut self, parent: ControllerId, index: usize) {
        let Some(child) = self.child_at(parent, index) else {
            return;
        };
        self.emit(parent, ControllerEvent::RemovingChild { child, index });
        if self.is_active(child) {
            self.deactivate(child);
        }
        self.remove_notify(child);
        if let Some(fig) = self.figure_of(child) {
            self.figures_mut().remove(fig);
        }
        if let Some(c) = self.controller_mut(child) {
            c.parent = None;
            c.figure = None;
        }
        if let Some(p) = self.controller_mut(parent) {
            p.children.remove(index);
        }
        self.free_subtree(child);
    }

    /// Move the child at position `from` to position `to`.
    pub(crate) fn reorder_child(&mut self, parent: ControllerId, from: usize, to: usize) {
        let Some(p) = self.controller_mut(parent) else {
            return;
        };
        if from >= p.children.len() {
            return;
        }
        let child = p.children.remove(from);
        let at = to.min(p.children.len());
        p.children.insert(at, child);
        if let Some(fig) = self.figure_of(child) {
            self.figures_mut().reorder(fig, at);
        }
    }

    fn child_at(&self, parent: ControllerId, index: usize) -> Option<ControllerId> {
        self.controller(parent)?.children.get(index).copied()
    }

    fn add_child_visual(&mut self, parent: ControllerId, child: ControllerId, index: usize) {
        let Some(parent_fig) = self.figure_of(parent) else {
            return;
        };
        let Some(c) = self.controller(child) else {
            return;
        };
        let figure = c.delegate.create_figure(c.model);
        let fid = self.figures_mut().add(parent_fig, figure, Some(index));
        if let Some(c) = self.controller_mut(child) {
            c.figure = Some(fid);
        }
    }

    pub fn refresh(&mut self, id: ControllerId) {
        self.refresh_visuals(id);
        self.refresh_children(id);
    }

    pub fn refresh_visuals(&mut self, id: ControllerId) {
        let (controllers, figures, _, _) = self.split_mut();
        if let Some(c) = controllers.node_weight(id.0)
            && let Some(fig) = c.figure
        {
            c.delegate.refresh_visuals(c.model, fig, figures);
        }
    }

    /// Reconcile child controllers against the model's children: reuse by
    /// model identity, reorder in place, create what is missing, drop the
    /// leftovers.
    pub fn refresh_children(&mut self, id: ControllerId) {
        let Some(c) = self.controller(id) else {
            return;
        };
        let wanted = c.delegate.model_children(c.model);
        let by_model: HashMap<ModelId, ControllerId> = c
            .children
            .iter()
            .filter_map(|child| Some((self.model_of(*child)?, *child)))
            .collect();

        for (i, model) in wanted.iter().copied().enumerate() {
            let here = self.child_at(id, i);
            if here.and_then(|c| self.model_of(c)) == Some(model) {
                continue;
            }
            // Positions before `i` are settled, so a reusable controller sits after it.
            let found = by_model.get(&model).and_then(|existing| {
                self.controller(id)?
                    .children
                    .iter()
                    .skip(i + 1)
                    .position(|c| c == existing)
                    .map(|offset| i + 1 + offset)
            });
            match found {
                Some(from) => self.reorder_child(id, from, i),
                None => {
                    let child = self.factory().create(Some(id), model);
                    self.add_child(id, child, i);
                }
            }
        }

        // Leftovers are whatever sits past the wanted list; drop them last first.
        let len = self.controller(id).map_or(0, |c| c.children.len());
        for index in (wanted.len()..len).rev() {
            self.remove_child(id, index);
        }
    }

    fn register(&mut self, id: ControllerId) {
        let Some(c) = self.controller_mut(id) else {
            return;
        };
        c.flags.set(Flags::REGISTERED, true);
        let (model, figure) = (c.model, c.figure);
        self.register_model(model, id);
        if let Some(fig) = figure {
            self.register_figure(fig, id);
        }
    }

    fn unregister(&mut self, id: ControllerId) {
        let Some(c) = self.controller_mut(id) else {
            return;
        };
        c.flags.set(Flags::REGISTERED, false);
        let (model, figure) = (c.model, c.figure);
        self.unregister_model(model, id);
        if let Some(fig) = figure {
            self.unregister_figure(fig);
        }
    }
}
