//! The graphical viewer: one controller tree bound to one figure tree.

use std::collections::{HashMap, HashSet};

use dg_core::ModelId;
use dg_render::{FigureId, FigureTree};
use kurbo::{Point, Rect, Size, Vec2};
use petgraph::stable_graph::StableGraph;

use crate::ability::{AbilityContext, FeedbackContext};
use crate::command::{Command, CompoundCommand};
use crate::config::EditorConfig;
use crate::controller::{Controller, ControllerEvent, ControllerFactory, ControllerId, SelectionState};
use crate::handle::{Handle, HandleRegistry};
use crate::key_handler::KeyHandler;
use crate::request::{Request, RequestKind};
use crate::selection::SelectionModel;
use crate::tool::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(pub usize);

pub struct Viewer {
    controllers: StableGraph<Controller, ()>,
    figures: FigureTree,
    handles: HandleRegistry,
    selection: SelectionModel,
    by_model: HashMap<ModelId, ControllerId>,
    by_figure: HashMap<FigureId, ControllerId>,
    contents: Option<ControllerId>,
    factory: Box<dyn ControllerFactory>,
    key_handler: KeyHandler,
    config: EditorConfig,
}

impl Viewer {
    pub fn new(factory: Box<dyn ControllerFactory>, viewport: Size, config: EditorConfig) -> Self {
        Self {
            controllers: StableGraph::new(),
            figures: FigureTree::new(viewport),
            handles: HandleRegistry::default(),
            selection: SelectionModel::default(),
            by_model: HashMap::new(),
            by_figure: HashMap::new(),
            contents: None,
            factory,
            key_handler: KeyHandler::default(),
            config,
        }
    }

    pub(crate) fn split_mut(
        &mut self,
    ) -> (
        &mut StableGraph<Controller, ()>,
        &mut FigureTree,
        &mut HandleRegistry,
        &EditorConfig,
    ) {
        (&mut self.controllers, &mut self.figures, &mut self.handles, &self.config)
    }

    pub fn factory(&self) -> &dyn ControllerFactory {
        self.factory.as_ref()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn key_handler(&self) -> &KeyHandler {
        &self.key_handler
    }

    pub fn set_key_handler(&mut self, key_handler: KeyHandler) {
        self.key_handler = key_handler;
    }

    pub fn figures(&self) -> &FigureTree {
        &self.figures
    }

    pub fn figures_mut(&mut self) -> &mut FigureTree {
        &mut self.figures
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    pub fn set_viewport_size(&mut self, size: Size) {
        self.figures.set_viewport_size(size);
    }

    // ─── Controller arena ────────────────────────────────────────────────

    pub fn controller(&self, id: ControllerId) -> Option<&Controller> {
        self.controllers.node_weight(id.0)
    }

    pub(crate) fn controller_mut(&mut self, id: ControllerId) -> Option<&mut Controller> {
        self.controllers.node_weight_mut(id.0)
    }

    pub(crate) fn insert_controller(&mut self, controller: Controller) -> ControllerId {
        ControllerId(self.controllers.add_node(controller))
    }

    /// Drop `id` and its descendants from the arena.
    pub(crate) fn free_subtree(&mut self, id: ControllerId) {
        let mut stack = vec![id];
        while let Some(c) = stack.pop() {
            if let Some(removed) = self.controllers.remove_node(c.0) {
                stack.extend(removed.children);
            }
        }
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.node_count()
    }

    pub fn contents(&self) -> Option<ControllerId> {
        self.contents
    }

    /// Replace the contents controller with one created for `model`.
    pub fn set_contents(&mut self, model: ModelId) -> ControllerId {
        if let Some(old) = self.contents.take() {
            self.deactivate(old);
            self.remove_notify(old);
            if let Some(fig) = self.figure_of(old) {
                self.figures.remove(fig);
            }
            self.free_subtree(old);
        }
        let controller = self.factory.create(None, model);
        let figure = controller.delegate.create_figure(model);
        let layer = self.figures.primary_layer();
        let fig = self.figures.add(layer, figure, None);
        let id = self.insert_controller(controller);
        if let Some(c) = self.controller_mut(id) {
            c.figure = Some(fig);
        }
        self.contents = Some(id);
        self.add_notify(id);
        self.activate(id);
        log::debug!("contents set to {model:?} ({} controllers)", self.controller_count());
        id
    }

    pub fn model_of(&self, id: ControllerId) -> Option<ModelId> {
        self.controller(id).map(|c| c.model)
    }

    pub fn parent_of(&self, id: ControllerId) -> Option<ControllerId> {
        self.controller(id)?.parent
    }

    pub fn children_of(&self, id: ControllerId) -> Vec<ControllerId> {
        self.controller(id).map(|c| c.children.clone()).unwrap_or_default()
    }

    pub fn figure_of(&self, id: ControllerId) -> Option<FigureId> {
        self.controller(id)?.figure
    }

    pub fn is_active(&self, id: ControllerId) -> bool {
        self.controller(id).is_some_and(|c| c.is_active())
    }

    pub fn selection_state(&self, id: ControllerId) -> SelectionState {
        self.controller(id).map(|c| c.selection).unwrap_or_default()
    }

    /// True if `ancestor` is `id` or one of its parents.
    pub fn is_ancestor_or_self(&self, ancestor: ControllerId, id: ControllerId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.parent_of(c);
        }
        false
    }

    pub fn controller_for_model(&self, model: ModelId) -> Option<ControllerId> {
        self.by_model.get(&model).copied()
    }

    pub fn controller_for_figure(&self, figure: FigureId) -> Option<ControllerId> {
        self.by_figure.get(&figure).copied()
    }

    pub(crate) fn register_model(&mut self, model: ModelId, id: ControllerId) {
        self.by_model.insert(model, id);
    }

    pub(crate) fn unregister_model(&mut self, model: ModelId, id: ControllerId) {
        if self.by_model.get(&model) == Some(&id) {
            self.by_model.remove(&model);
        }
    }

    pub(crate) fn register_figure(&mut self, figure: FigureId, id: ControllerId) {
        self.by_figure.insert(figure, id);
    }

    pub(crate) fn unregister_figure(&mut self, figure: FigureId) {
        self.by_figure.remove(&figure);
    }

    /// Re-sync every controller with the model, top down.
    pub fn refresh_all(&mut self) {
        let Some(root) = self.contents else {
            return;
        };
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            self.refresh(id);
            stack.extend(self.children_of(id).into_iter().rev());
        }
    }

    // ─── Hit testing ─────────────────────────────────────────────────────

    pub fn find_object_at(&self, p: Point) -> Option<ControllerId> {
        self.find_object_at_except(p, &[], |_| true)
    }

    /// Deepest controller under `p` that passes `conditional`, skipping the
    /// figures of `exclusions` and their descendants. Falls back to the
    /// contents controller.
    pub fn find_object_at_except(
        &self,
        p: Point,
        exclusions: &[ControllerId],
        conditional: impl Fn(ControllerId) -> bool,
    ) -> Option<ControllerId> {
        let excluded: HashSet<FigureId> = exclusions.iter().filter_map(|c| self.figure_of(*c)).collect();
        let accept = |fig: FigureId| self.by_figure.get(&fig).is_some_and(|c| conditional(*c));
        let prune = |fig: FigureId| excluded.contains(&fig);
        self.figures
            .find_figure_in(self.figures.primary_layer(), p, &accept, &prune)
            .and_then(|fig| self.controller_for_figure(fig))
            .or_else(|| self.contents.filter(|c| !exclusions.contains(c) && conditional(*c)))
    }

    pub fn find_handle_at(&self, p: Point) -> Option<Handle> {
        self.handles.find_at(&self.figures, p)
    }

    pub fn handles_of(&self, owner: ControllerId) -> Vec<Handle> {
        self.handles.for_owner(owner).copied().collect()
    }

    /// Controllers (below the contents) whose figures intersect `r`.
    pub fn find_controllers_in_rect(&self, r: Rect) -> Vec<ControllerId> {
        let layer = self.figures.primary_layer();
        self.figures
            .find_figures_in_rect(layer, r, |fig| self.by_figure.contains_key(&fig))
            .into_iter()
            .filter_map(|fig| self.controller_for_figure(fig))
            .filter(|c| Some(*c) != self.contents)
            .collect()
    }

    /// Scroll just enough to bring `id`'s figure into view.
    pub fn reveal(&mut self, id: ControllerId) {
        let Some(fig) = self.figure_of(id) else {
            return;
        };
        let abs = self.figures.absolute_bounds(fig);
        let vp = self.figures.viewport_rect();
        let axis = |lo: f64, hi: f64, vlo: f64, vhi: f64| {
            if lo < vlo {
                lo - vlo
            } else if hi > vhi {
                (hi - vhi).min(lo - vlo)
            } else {
                0.0
            }
        };
        let delta = Vec2::new(axis(abs.x0, abs.x1, vp.x0, vp.x1), axis(abs.y0, abs.y1, vp.y0, vp.y1));
        if delta != Vec2::ZERO {
            self.figures.scroll_by(delta);
        }
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn selected(&self) -> &[ControllerId] {
        self.selection.items()
    }

    pub fn primary_selection(&self) -> Option<ControllerId> {
        self.selection.primary()
    }

    pub fn is_selectable(&self, id: ControllerId) -> bool {
        self.controller(id).is_some_and(|c| c.is_active() && c.is_selectable())
    }

    fn set_selection_state(&mut self, id: ControllerId, state: SelectionState) {
        let Some(c) = self.controller_mut(id) else {
            return;
        };
        if c.selection == state {
            return;
        }
        c.selection = state;
        self.with_abilities(id, |slot, cx| {
            if slot.active {
                slot.ability.selection_changed(state, cx);
            }
        });
        self.emit(id, ControllerEvent::SelectionChanged(state));
    }

    /// Replace the selection with `id` alone.
    pub fn select(&mut self, id: ControllerId) {
        if self.selection.items() == [id] {
            return;
        }
        self.deselect_all();
        self.append_selection(id);
    }

    /// Add `id` as the new primary selection.
    pub fn append_selection(&mut self, id: ControllerId) {
        if !self.is_selectable(id) {
            return;
        }
        if let Some(previous) = self.selection.append(id)
            && previous != id
        {
            self.set_selection_state(previous, SelectionState::Selected);
        }
        self.set_selection_state(id, SelectionState::Primary);
    }

    pub fn deselect(&mut self, id: ControllerId) {
        if !self.selection.remove(id) {
            return;
        }
        self.set_selection_state(id, SelectionState::None);
        if let Some(primary) = self.selection.primary() {
            self.set_selection_state(primary, SelectionState::Primary);
        }
    }

    pub fn deselect_all(&mut self) {
        for id in self.selection.clear() {
            self.set_selection_state(id, SelectionState::None);
        }
    }

    pub fn set_selection(&mut self, ids: &[ControllerId]) {
        self.deselect_all();
        for id in ids {
            self.append_selection(*id);
        }
    }

    /// Select every top-level child of the contents.
    pub fn select_all(&mut self) {
        let Some(contents) = self.contents else {
            return;
        };
        let children = self.children_of(contents);
        self.set_selection(&children);
    }

    // ─── Requests ────────────────────────────────────────────────────────

    fn ability_context(&self, host: ControllerId) -> AbilityContext<'_> {
        AbilityContext { viewer: self, host }
    }

    pub fn understands(&self, id: ControllerId, req: &Request) -> bool {
        let Some(c) = self.controller(id) else {
            return false;
        };
        let cx = self.ability_context(id);
        c.abilities.iter().any(|s| s.ability.understands(req, &cx))
    }

    /// Every ability's contribution, merged. `None` when no ability
    /// contributes.
    pub fn get_command(&self, id: ControllerId, req: &Request) -> Option<Box<dyn Command>> {
        let c = self.controller(id)?;
        let cx = self.ability_context(id);
        let mut compound = CompoundCommand::new();
        for slot in &c.abilities {
            compound.add(slot.ability.get_command(req, &cx));
        }
        (!compound.is_empty()).then(|| compound.unwrap())
    }

    /// First ability answer wins; selectable controllers target themselves
    /// for selection requests when no ability answers.
    pub fn get_target(&self, id: ControllerId, req: &Request) -> Option<ControllerId> {
        let c = self.controller(id)?;
        let cx = self.ability_context(id);
        c.abilities
            .iter()
            .find_map(|s| s.ability.get_target(req, &cx))
            .or_else(|| {
                let selection = matches!(req.kind, RequestKind::Selection | RequestKind::SelectionHover);
                (selection && c.is_selectable()).then_some(id)
            })
    }

    fn feedback(
        &mut self,
        id: ControllerId,
        req: &Request,
        f: impl Fn(&mut dyn crate::ability::Ability, &Request, &mut FeedbackContext<'_>),
    ) {
        if !self.is_active(id) {
            return;
        }
        self.with_abilities(id, |slot, cx| {
            if slot.active {
                f(slot.ability.as_mut(), req, cx);
            }
        });
    }

    pub fn show_source_feedback(&mut self, id: ControllerId, req: &Request) {
        self.feedback(id, req, |a, r, cx| a.show_source_feedback(r, cx));
    }

    pub fn erase_source_feedback(&mut self, id: ControllerId, req: &Request) {
        self.feedback(id, req, |a, r, cx| a.erase_source_feedback(r, cx));
    }

    pub fn show_target_feedback(&mut self, id: ControllerId, req: &Request) {
        self.feedback(id, req, |a, r, cx| a.show_target_feedback(r, cx));
    }

    pub fn erase_target_feedback(&mut self, id: ControllerId, req: &Request) {
        self.feedback(id, req, |a, r, cx| a.erase_target_feedback(r, cx));
    }

    /// Requests that act directly instead of producing a command.
    pub fn perform_request(&self, id: ControllerId, req: &Request) {
        if let Some(c) = self.controller(id) {
            log::debug!("{id:?}: perform {}", req.kind);
            c.delegate.perform_request(c.model, req);
        }
    }

    pub fn drag_tracker(&self, id: ControllerId, req: &Request) -> Option<Box<dyn Tool>> {
        self.controller(id)?.delegate.drag_tracker(id, req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::DiagramControllerFactory;
    use crate::handle::HandleKind;
    use dg_core::{Diagram, DiagramHandle, Direction, Shape, ShapeKind};
    use pretty_assertions::assert_eq;

    struct Fixture {
        handle: DiagramHandle,
        viewer: Viewer,
        group: ModelId,
        inner: ModelId,
        loose: ModelId,
    }

    fn fixture() -> Fixture {
        let mut d = Diagram::new();
        let root = d.root();
        let group = d
            .add_shape(root, Shape::new(ModelId::intern("group"), ShapeKind::Group, Rect::new(100.0, 100.0, 300.0, 300.0)))
            .unwrap();
        let inner = d
            .add_shape(group, Shape::new(ModelId::intern("inner"), ShapeKind::Rect, Rect::new(20.0, 20.0, 70.0, 70.0)))
            .unwrap();
        let loose = d
            .add_shape(root, Shape::new(ModelId::intern("loose"), ShapeKind::Rect, Rect::new(400.0, 100.0, 450.0, 150.0)))
            .unwrap();
        let handle = d.into_handle();
        let mut viewer = Viewer::new(
            Box::new(DiagramControllerFactory::new(handle.clone())),
            Size::new(600.0, 400.0),
            EditorConfig::default(),
        );
        viewer.set_contents(root);
        Fixture {
            handle,
            viewer,
            group,
            inner,
            loose,
        }
    }

    #[test]
    fn hit_testing_finds_deepest_and_honours_exclusions() {
        let f = fixture();
        let v = &f.viewer;
        let group = v.controller_for_model(f.group).unwrap();
        let inner = v.controller_for_model(f.inner).unwrap();
        let contents = v.contents().unwrap();

        assert_eq!(v.find_object_at(Point::new(130.0, 130.0)), Some(inner));
        assert_eq!(v.find_object_at(Point::new(250.0, 250.0)), Some(group));
        assert_eq!(v.find_object_at(Point::new(5.0, 5.0)), Some(contents));
        assert_eq!(v.find_object_at_except(Point::new(130.0, 130.0), &[inner], |_| true), Some(group));
        assert_eq!(v.find_object_at_except(Point::new(130.0, 130.0), &[group], |_| true), Some(contents));
        assert_eq!(v.find_object_at_except(Point::new(130.0, 130.0), &[], |c| c != inner), Some(group));
    }

    #[test]
    fn hit_testing_follows_scroll() {
        let mut f = fixture();
        let applied = f.viewer.figures_mut().scroll_by(Vec2::new(0.0, 40.0));
        assert_eq!(applied, Vec2::ZERO, "content fits; nothing to scroll");
        f.viewer.set_viewport_size(Size::new(200.0, 200.0));
        let applied = f.viewer.figures_mut().scroll_by(Vec2::new(50.0, 0.0));
        assert_eq!(applied, Vec2::new(50.0, 0.0));
        let loose = f.viewer.controller_for_model(f.loose).unwrap();
        assert_eq!(f.viewer.find_object_at(Point::new(360.0, 120.0)), Some(loose));
    }

    #[test]
    fn selection_tracks_primary() {
        let mut f = fixture();
        let group = f.viewer.controller_for_model(f.group).unwrap();
        let loose = f.viewer.controller_for_model(f.loose).unwrap();

        f.viewer.select(group);
        f.viewer.append_selection(loose);
        assert_eq!(f.viewer.selected(), &[group, loose]);
        assert_eq!(f.viewer.selection_state(group), SelectionState::Selected);
        assert_eq!(f.viewer.selection_state(loose), SelectionState::Primary);

        f.viewer.deselect(loose);
        assert_eq!(f.viewer.selection_state(group), SelectionState::Primary);
        assert_eq!(f.viewer.selection_state(loose), SelectionState::None);

        f.viewer.select_all();
        assert_eq!(f.viewer.selected(), &[group, loose]);
        f.viewer.deselect_all();
        assert!(f.viewer.selected().is_empty());
        assert!(f.viewer.handles().is_empty());
    }

    #[test]
    fn selected_shape_gets_outline_and_eight_knobs() {
        let mut f = fixture();
        let loose = f.viewer.controller_for_model(f.loose).unwrap();
        f.viewer.select(loose);
        let kinds: Vec<HandleKind> = f.viewer.handles_of(loose).iter().map(|h| h.kind).collect();
        assert_eq!(kinds.len(), 9);
        assert_eq!(kinds[0], HandleKind::Move);
        assert!(kinds.contains(&HandleKind::Resize(Direction::SOUTH_EAST)));

        // The south-east knob sits on the corner; the outline only on its rim.
        let se = f.viewer.find_handle_at(Point::new(450.0, 150.0)).unwrap();
        assert_eq!(se.kind, HandleKind::Resize(Direction::SOUTH_EAST));
        let rim = f.viewer.find_handle_at(Point::new(410.0, 100.0)).unwrap();
        assert_eq!(rim.kind, HandleKind::Move);
        assert_eq!(f.viewer.find_handle_at(Point::new(425.0, 125.0)), None);
    }

    #[test]
    fn move_request_is_forwarded_to_the_parent_layout() {
        let f = fixture();
        let v = &f.viewer;
        let inner = v.controller_for_model(f.inner).unwrap();
        let mut req = Request::new(RequestKind::Move).with_controllers(vec![inner]);
        req.move_delta = Vec2::new(10.0, 5.0);

        let mut cmd = v.get_command(inner, &req).expect("movable shapes answer REQ_MOVE");
        assert!(cmd.can_execute());
        cmd.execute();
        assert_eq!(f.handle.borrow().bounds(f.inner), Some(Rect::new(30.0, 25.0, 80.0, 75.0)));
    }

    #[test]
    fn containers_target_drops_and_leaves_do_not() {
        let f = fixture();
        let v = &f.viewer;
        let group = v.controller_for_model(f.group).unwrap();
        let loose = v.controller_for_model(f.loose).unwrap();
        let req = Request::new(RequestKind::Add);
        assert_eq!(v.get_target(group, &req), Some(group));
        assert_eq!(v.get_target(loose, &req), None);
        assert_eq!(v.get_target(loose, &Request::new(RequestKind::Selection)), Some(loose));
        assert!(v.get_command(loose, &Request::new(RequestKind::Open)).is_none());
    }

    #[test]
    fn reveal_scrolls_minimally() {
        let mut f = fixture();
        f.viewer.set_viewport_size(Size::new(200.0, 200.0));
        let loose = f.viewer.controller_for_model(f.loose).unwrap();
        f.viewer.reveal(loose);
        assert_eq!(f.viewer.figures().scroll(), Vec2::new(250.0, 0.0));
    }
}
