use dg_core::{rect_translate, rect_union_all};
use kurbo::{Point, Rect, Size, Vec2};

use super::targeting::{self, Targeting, TargetingTool};
use super::{Cursor, EditContext, SourceSelection, Tool, ToolCore, ToolState, base};
use crate::command::{Command, CompoundCommand, unexecutable};
use crate::controller::ControllerId;
use crate::input::KeyEvent;
use crate::request::{Request, RequestKind};
use crate::snap::{SnapToGrid, SnapToHelper};

/// Drags the selection: moves within the same parent, reparents onto a
/// new container, or clones with ALT held.
#[derive(Debug)]
pub struct MoveTracker {
    core: ToolCore,
    targeting: Targeting,
    selection: SourceSelection,
    clone_active: bool,
    showing_source_feedback: bool,
    source_rect: Option<Rect>,
    compound_rect: Option<Rect>,
    source_relative_start: Option<Vec2>,
    snap: Option<SnapToGrid>,
}

impl MoveTracker {
    pub fn new(source: ControllerId) -> Self {
        Self {
            core: ToolCore::new().with_default_cursor(Cursor::Move),
            targeting: Targeting::new(Request::new(RequestKind::Move)),
            selection: SourceSelection::new(source),
            clone_active: false,
            showing_source_feedback: false,
            source_rect: None,
            compound_rect: None,
            source_relative_start: None,
            snap: None,
        }
    }

    pub fn source(&self) -> ControllerId {
        self.selection.source()
    }

    pub fn is_clone_active(&self) -> bool {
        self.clone_active
    }

    /// Union of the dragged figures' absolute bounds at drag start.
    pub fn compound_source_rect(&self) -> Option<Rect> {
        self.compound_rect
    }

    /// True when the drop stays under the source's current parent.
    fn is_move(&self, cx: &EditContext<'_>) -> bool {
        let target = self.targeting.target();
        target.is_some() && cx.viewer.parent_of(self.source()) == target
    }

    fn command_kind(&self, cx: &EditContext<'_>) -> RequestKind {
        if self.clone_active {
            RequestKind::Clone
        } else if self.is_move(cx) {
            RequestKind::Move
        } else {
            RequestKind::Add
        }
    }

    fn set_clone_active(&mut self, on: bool, cx: &mut EditContext<'_>) {
        if self.clone_active == on {
            return;
        }
        self.erase_source_feedback(cx);
        TargetingTool::erase_target_feedback(self, cx);
        self.clone_active = on;
    }

    fn capture_source_dimensions(&mut self, cx: &EditContext<'_>) {
        let ops = base::operation_set(self, cx);
        let viewer = &*cx.viewer;
        let figures = viewer.figures();
        self.compound_rect = rect_union_all(
            ops.iter()
                .filter_map(|c| viewer.figure_of(*c))
                .map(|f| figures.absolute_bounds(f)),
        );
        if let Some(fig) = viewer.figure_of(self.source()) {
            let r = figures.absolute_bounds(fig);
            self.source_rect = Some(r);
            self.source_relative_start = Some(self.core.start_location() - r.origin());
        }
    }

    /// Keep the start point glued to the source figure when the viewport
    /// scrolls under the pointer.
    fn repair_start_location(&mut self, cx: &EditContext<'_>) {
        let (Some(rel), Some(fig)) = (self.source_relative_start, cx.viewer.figure_of(self.source())) else {
            return;
        };
        let origin = cx.viewer.figures().absolute_bounds(fig).origin();
        let shift = (origin + rel) - self.core.start_location();
        if shift == Vec2::ZERO {
            return;
        }
        self.core.set_start_location(origin + rel);
        self.source_rect = self.source_rect.map(|r| rect_translate(r, shift));
        self.compound_rect = self.compound_rect.map(|r| rect_translate(r, shift));
    }

    fn show_source_feedback(&mut self, cx: &mut EditContext<'_>) {
        let req = self.targeting.request().clone();
        for op in base::operation_set(self, cx) {
            cx.viewer.show_source_feedback(op, &req);
        }
        self.showing_source_feedback = true;
    }

    fn erase_source_feedback(&mut self, cx: &mut EditContext<'_>) {
        if !self.showing_source_feedback {
            return;
        }
        self.showing_source_feedback = false;
        let req = self.targeting.request().clone();
        for op in base::operation_set(self, cx) {
            cx.viewer.erase_source_feedback(op, &req);
        }
    }

    /// Recompute request, target, feedback and command for the current
    /// pointer position.
    fn update_drag(&mut self, cx: &mut EditContext<'_>) {
        let alt = self.core.input.alt();
        self.set_clone_active(alt, cx);
        self.update_target_request(cx);
        if targeting::update_target_under_mouse(self, cx) {
            self.update_target_request(cx);
        }
        TargetingTool::show_target_feedback(self, cx);
        self.show_source_feedback(cx);
        let command = self.command(cx);
        self.set_current_command(command);
    }

    fn perform_drag(&mut self, cx: &mut EditContext<'_>) {
        self.erase_source_feedback(cx);
        TargetingTool::erase_target_feedback(self, cx);
        targeting::unlock_target(self);
        base::execute_current_command(self, cx);
    }

    fn begin_accessible_drag(&mut self, cx: &mut EditContext<'_>) {
        let location = self.core.location();
        self.core.set_start_location(location);
        self.capture_source_dimensions(cx);
    }
}

/// SHIFT-constrained move: near-diagonal gestures lock to 45°, using the
/// larger component for both axes; everything else locks to the dominant
/// axis.
pub(crate) fn constrain_move_delta(d: Vec2) -> Vec2 {
    if d == Vec2::ZERO {
        return d;
    }
    let ratio = if d.x == 0.0 { f64::INFINITY } else { (d.y / d.x).abs() };
    if ratio > 0.5 && ratio < 1.5 {
        let m = d.x.abs().max(d.y.abs());
        Vec2::new(m.copysign(d.x), m.copysign(d.y))
    } else if d.x.abs() > d.y.abs() {
        Vec2::new(d.x, 0.0)
    } else {
        Vec2::new(0.0, d.y)
    }
}

impl TargetingTool for MoveTracker {
    fn targeting(&self) -> &Targeting {
        &self.targeting
    }

    fn targeting_mut(&mut self) -> &mut Targeting {
        &mut self.targeting
    }

    fn create_target_request(&self) -> Request {
        Request::new(RequestKind::Move)
    }

    fn update_target_request(&mut self, cx: &mut EditContext<'_>) {
        self.repair_start_location(cx);
        let ops = base::operation_set(self, cx);
        let kind = self.command_kind(cx);
        let input = self.core.input;
        let mut delta = self.core.drag_delta();
        if input.shift() {
            delta = constrain_move_delta(delta);
        }
        if !input.meta()
            && let (Some(grid), Some(src)) = (self.snap, self.source_rect)
        {
            // Grid lines are fixed in content space.
            let origin = (-cx.viewer.figures().scroll()).to_point();
            delta += grid.with_origin(origin).snap_move(rect_translate(src, delta));
        }

        let req = self.targeting.request_mut();
        req.kind = kind;
        req.controllers = ops;
        req.location = Some(input.location);
        req.modifiers = input.modifiers;
        req.constrained = input.shift();
        req.snap_enabled = !input.meta();
        req.move_delta = delta;
        req.size_delta = Size::ZERO;
    }

    fn create_exclusion_set(&self, cx: &EditContext<'_>) -> Vec<ControllerId> {
        match &self.core.operation_set {
            Some(set) => set.clone(),
            None => self.create_operation_set(cx),
        }
    }

    fn on_autoexpose(&mut self, cx: &mut EditContext<'_>) {
        self.update_drag(cx);
    }
}

impl Tool for MoveTracker {
    fn core(&self) -> &ToolCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ToolCore {
        &mut self.core
    }

    fn name(&self) -> &'static str {
        "move-tracker"
    }

    fn activate(&mut self, cx: &mut EditContext<'_>) {
        base::activate(self, cx);
        self.snap = SnapToGrid::from_config(cx.config);
    }

    fn deactivate(&mut self, cx: &mut EditContext<'_>) {
        self.erase_source_feedback(cx);
        targeting::reset(self, cx);
        base::deactivate(self, cx);
        self.clone_active = false;
        self.source_rect = None;
        self.compound_rect = None;
        self.source_relative_start = None;
    }

    fn create_operation_set(&self, cx: &EditContext<'_>) -> Vec<ControllerId> {
        let viewer = &*cx.viewer;
        let selected = viewer.selected();
        let query = Request::new(RequestKind::Move);
        selected
            .iter()
            .copied()
            .filter(|c| {
                !selected
                    .iter()
                    .any(|other| other != c && viewer.is_ancestor_or_self(*other, *c))
            })
            .filter(|c| viewer.understands(*c, &query))
            .collect()
    }

    fn on_button_down(&mut self, button: u8, cx: &mut EditContext<'_>) -> bool {
        if (button == 1 || button == 3) && self.core.is_in_state(ToolState::Initial) {
            self.selection.on_press(&self.core.input, cx.viewer);
        }
        if button != 1 {
            // A right press that opens the gesture is a plain click; any
            // extra button later spoils the drag until all buttons are up.
            let opening = self.core.is_in_state(ToolState::Initial);
            self.core.set_state(ToolState::Invalid);
            if button == 3 && opening {
                self.core.set_state(ToolState::Terminal);
            }
            self.on_invalid_input(cx);
        } else {
            self.core.state_transition(ToolState::Initial, ToolState::Drag);
        }
        true
    }

    fn on_button_up(&mut self, button: u8, cx: &mut EditContext<'_>) -> bool {
        if base::finish_invalid(&mut self.core) {
            return true;
        }
        if self
            .core
            .state_transition(ToolState::DragInProgress, ToolState::Terminal)
        {
            self.perform_drag(cx);
            return true;
        }
        if !self.core.is_in_state(ToolState::Drag) {
            return false;
        }
        self.selection.finish_click(button, &self.core.input, cx.viewer);
        self.core.set_state(ToolState::Terminal);
        true
    }

    fn on_double_click(&mut self, button: u8, cx: &mut EditContext<'_>) -> bool {
        if button == 1 {
            self.selection.perform_open(&self.core.input, cx.viewer);
        }
        true
    }

    fn on_drag_started(&mut self, cx: &mut EditContext<'_>) -> bool {
        if !self
            .core
            .state_transition(ToolState::Drag, ToolState::DragInProgress)
        {
            return false;
        }
        self.capture_source_dimensions(cx);
        true
    }

    fn on_drag_in_progress(&mut self, cx: &mut EditContext<'_>) -> bool {
        if self
            .core
            .is_in_state(ToolState::DragInProgress | ToolState::AccessibleDragInProgress)
        {
            self.update_drag(cx);
            if self.core.is_in_state(ToolState::DragInProgress) {
                targeting::update_autoexpose(self, cx);
            }
        }
        true
    }

    fn on_key_down(&mut self, ev: &KeyEvent, cx: &mut EditContext<'_>) -> bool {
        if let Some(dir) = ev.arrow()
            && self.core.is_in_state(
                ToolState::Initial | ToolState::AccessibleDrag | ToolState::AccessibleDragInProgress,
            )
        {
            let step = self.core.accessible_step_increment();
            if self
                .core
                .state_transition(ToolState::Initial | ToolState::AccessibleDrag, ToolState::AccessibleDragInProgress)
            {
                self.begin_accessible_drag(cx);
            }
            self.core.input.location += dir * step;
            self.on_drag_in_progress(cx);
            return true;
        }
        if ev.is_modifier()
            && self
                .core
                .is_in_state(ToolState::DragInProgress | ToolState::AccessibleDragInProgress)
        {
            self.on_drag_in_progress(cx);
            return true;
        }
        base::on_key_down(self, ev, cx)
    }

    fn on_key_up(&mut self, ev: &KeyEvent, cx: &mut EditContext<'_>) -> bool {
        if ev.arrow().is_some() && self.core.is_in_state(ToolState::AccessibleDragInProgress) {
            self.core.accessible_step_reset();
            return true;
        }
        if ev.is_modifier()
            && self
                .core
                .is_in_state(ToolState::DragInProgress | ToolState::AccessibleDragInProgress)
        {
            self.on_drag_in_progress(cx);
            return true;
        }
        false
    }

    fn on_invalid_input(&mut self, cx: &mut EditContext<'_>) -> bool {
        self.erase_source_feedback(cx);
        TargetingTool::erase_target_feedback(self, cx);
        self.set_current_command(Some(unexecutable()));
        true
    }

    fn autoexpose_tick(&mut self, cx: &mut EditContext<'_>) -> bool {
        targeting::autoexpose_step(self, cx)
    }

    fn commit_drag(&mut self, cx: &mut EditContext<'_>) {
        self.perform_drag(cx);
        self.core.set_state(ToolState::Terminal);
    }

    /// Clone: clone on the target. Same parent: move each dragged
    /// controller. Otherwise: orphan each, then add to the target. No
    /// target rejects the drop.
    fn command(&self, cx: &EditContext<'_>) -> Option<Box<dyn Command>> {
        let req = self.targeting.request();
        let ops = req.controllers.clone();
        let is_move = self.is_move(cx);
        let (kind, label) = if self.clone_active {
            (RequestKind::Clone, "Clone")
        } else if is_move {
            (RequestKind::Move, "Move")
        } else {
            (RequestKind::Orphan, "Reparent")
        };
        let mut compound = CompoundCommand::with_label(label);

        if !self.clone_active {
            let source_req = req.retagged(kind);
            for op in &ops {
                compound.add(cx.viewer.get_command(*op, &source_req));
            }
        }
        if !is_move || self.clone_active {
            let add_kind = if self.clone_active { RequestKind::Clone } else { RequestKind::Add };
            match self.targeting.target() {
                Some(target) => compound.add(cx.viewer.get_command(target, &req.retagged(add_kind))),
                None => compound.push(unexecutable()),
            }
        }
        Some(compound.unwrap())
    }

    fn calculate_cursor(&self) -> Option<Cursor> {
        if self.core.is_in_state(ToolState::Terminal) {
            return None;
        }
        if self
            .core
            .is_in_state(ToolState::Initial | ToolState::Drag | ToolState::AccessibleDrag)
        {
            return Some(self.core.default_cursor);
        }
        match self.core.current_command() {
            Some(cmd) if cmd.can_execute() => Some(if self.clone_active { Cursor::Copy } else { Cursor::Move }),
            _ => Some(self.core.disabled_cursor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constrained_delta_locks_axis_or_diagonal() {
        assert_eq!(constrain_move_delta(Vec2::new(10.0, 2.0)), Vec2::new(10.0, 0.0));
        assert_eq!(constrain_move_delta(Vec2::new(1.0, -10.0)), Vec2::new(0.0, -10.0));
        assert_eq!(constrain_move_delta(Vec2::new(10.0, 8.0)), Vec2::new(10.0, 10.0));
        assert_eq!(constrain_move_delta(Vec2::new(-10.0, 12.0)), Vec2::new(-12.0, 12.0));
        assert_eq!(constrain_move_delta(Vec2::new(0.0, 0.0)), Vec2::ZERO);
    }

    #[test]
    fn fresh_tracker_has_move_request_and_no_target() {
        let t = MoveTracker::new(ControllerId(petgraph::graph::NodeIndex::new(3)));
        assert_eq!(t.targeting().request().kind, RequestKind::Move);
        assert_eq!(t.targeting().target(), None);
        assert_eq!(t.source_rect, None);
        assert!(!t.is_clone_active());
        assert_eq!(t.core().location(), Point::ORIGIN);
    }
}
