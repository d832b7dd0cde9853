use super::targeting::{self, Targeting, TargetingTool};
use super::{Cursor, EditContext, Tool, ToolCore, ToolState, base};
use crate::controller::ControllerId;
use crate::input::{KeyEvent, MouseEvent, WheelEvent};
use crate::key_handler::{self, KeyAction};
use crate::request::{Request, RequestKind};

/// The default tool. Hovers and selects on its own and hands every press
/// to a drag tracker: the handle's under the pointer, or the one the
/// target controller provides.
///
/// Keyboard: `.`/`,` walk the handles of the primary selection, `>` moves
/// to the next selected controller, arrows then drag the current handle
/// and Enter commits. Other keys go through the viewer's
/// [`KeyHandler`](crate::KeyHandler).
pub struct SelectionTool {
    core: ToolCore,
    targeting: Targeting,
    drag_tracker: Option<Box<dyn Tool>>,
    hover: Option<ControllerId>,
    hover_cursor: Option<Cursor>,
    traverse: Option<(ControllerId, usize)>,
}

impl std::fmt::Debug for SelectionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionTool")
            .field("core", &self.core)
            .field("target", &self.targeting.target())
            .field("drag_tracker", &self.drag_tracker.as_ref().map(|t| t.name()))
            .field("traverse", &self.traverse)
            .finish()
    }
}

impl Default for SelectionTool {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionTool {
    pub fn new() -> Self {
        Self {
            core: ToolCore::new(),
            targeting: Targeting::new(Request::new(RequestKind::Selection)),
            drag_tracker: None,
            hover: None,
            hover_cursor: None,
            traverse: None,
        }
    }

    pub fn drag_tracker(&self) -> Option<&dyn Tool> {
        self.drag_tracker.as_deref()
    }

    /// Controller whose hover feedback is showing.
    pub fn hover(&self) -> Option<ControllerId> {
        self.hover
    }

    /// Handle owner and index while traversing handles from the keyboard.
    pub fn traversal(&self) -> Option<(ControllerId, usize)> {
        self.traverse
    }

    fn set_drag_tracker(&mut self, tracker: Option<Box<dyn Tool>>, cx: &mut EditContext<'_>) {
        if let Some(mut old) = self.drag_tracker.take() {
            old.deactivate(cx);
        }
        if let Some(mut tracker) = tracker {
            log::debug!("selection-tool: drag tracker {}", tracker.name());
            tracker.activate(cx);
            self.drag_tracker = Some(tracker);
        }
    }

    fn reset_hover(&mut self, cx: &mut EditContext<'_>) {
        TargetingTool::erase_target_feedback(self, cx);
    }

    fn update_hover_cursor(&mut self, cx: &EditContext<'_>) {
        self.hover_cursor = cx.viewer.find_handle_at(self.core.location()).map(|h| h.cursor());
        self.refresh_cursor();
    }

    fn hover_at_pointer(&mut self, cx: &mut EditContext<'_>) {
        self.update_target_request(cx);
        targeting::update_target_under_mouse(self, cx);
        TargetingTool::show_target_feedback(self, cx);
        self.update_hover_cursor(cx);
    }

    fn end_traversal(&mut self) {
        self.traverse = None;
        self.hover_cursor = None;
        self.core.set_state(ToolState::Initial);
        self.refresh_cursor();
    }

    /// Park on handle `index` (wrapping) of `owner`. False if it has none.
    fn traverse_to(&mut self, owner: ControllerId, index: isize, cx: &mut EditContext<'_>) -> bool {
        let handles = cx.viewer.handles_of(owner);
        if handles.is_empty() {
            return false;
        }
        let i = index.rem_euclid(handles.len() as isize) as usize;
        let handle = handles[i];
        self.traverse = Some((owner, i));
        self.core.input.location = handle.accessible_location(cx.viewer.figures());
        self.hover_cursor = Some(handle.cursor());
        self.core.set_state(ToolState::TraverseHandle);
        self.refresh_cursor();
        true
    }

    fn traverse_step(&mut self, step: isize, cx: &mut EditContext<'_>) -> bool {
        match self.traverse {
            Some((owner, i)) => self.traverse_to(owner, i as isize + step, cx),
            None => match cx.viewer.primary_selection() {
                Some(owner) => self.traverse_to(owner, if step < 0 { -1 } else { 0 }, cx),
                None => false,
            },
        }
    }

    fn traverse_next_owner(&mut self, cx: &mut EditContext<'_>) -> bool {
        let selected = cx.viewer.selected().to_vec();
        if selected.is_empty() {
            return false;
        }
        let start = self
            .traverse
            .and_then(|(owner, _)| selected.iter().position(|c| *c == owner))
            .map_or(0, |i| i + 1);
        (0..selected.len())
            .map(|k| selected[(start + k) % selected.len()])
            .any(|owner| self.traverse_to(owner, 0, cx))
    }

    /// Start a keyboard drag on the current handle and hand it `ev`.
    fn begin_handle_drag(&mut self, ev: &KeyEvent, cx: &mut EditContext<'_>) -> bool {
        let Some((owner, i)) = self.traverse else {
            return false;
        };
        let Some(handle) = cx.viewer.handles_of(owner).get(i).copied() else {
            self.end_traversal();
            return false;
        };
        self.set_drag_tracker(Some(handle.drag_tracker()), cx);
        self.core.set_state(ToolState::AccessibleDragInProgress);
        let location = self.core.location();
        if let Some(tracker) = self.drag_tracker.as_mut() {
            tracker.core_mut().input.location = location;
            tracker.key_down(ev, cx);
        }
        true
    }

    fn run_key_action(&mut self, action: KeyAction, cx: &mut EditContext<'_>) -> bool {
        match action {
            KeyAction::Undo => base::with_listener_detached(self, cx, |stack| {
                let can = stack.can_undo();
                stack.undo();
                can
            }),
            KeyAction::Redo => base::with_listener_detached(self, cx, |stack| {
                let can = stack.can_redo();
                stack.redo();
                can
            }),
            other => key_handler::apply_selection_action(other, cx.viewer),
        }
    }
}

impl TargetingTool for SelectionTool {
    fn targeting(&self) -> &Targeting {
        &self.targeting
    }

    fn targeting_mut(&mut self) -> &mut Targeting {
        &mut self.targeting
    }

    fn create_target_request(&self) -> Request {
        Request::new(RequestKind::Selection)
    }

    /// Hover feedback only, and only while idle.
    fn show_target_feedback(&mut self, cx: &mut EditContext<'_>) {
        if !self.core.is_in_state(ToolState::Initial) {
            return;
        }
        let target = self.targeting.target();
        if target == self.hover {
            return;
        }
        self.reset_hover(cx);
        if let Some(target) = target {
            let req = self.targeting.request().retagged(RequestKind::SelectionHover);
            cx.viewer.show_target_feedback(target, &req);
            self.hover = Some(target);
        }
    }

    fn erase_target_feedback(&mut self, cx: &mut EditContext<'_>) {
        if let Some(hover) = self.hover.take() {
            let req = self.targeting.request().retagged(RequestKind::SelectionHover);
            cx.viewer.erase_target_feedback(hover, &req);
        }
    }
}

impl Tool for SelectionTool {
    fn core(&self) -> &ToolCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ToolCore {
        &mut self.core
    }

    fn name(&self) -> &'static str {
        "selection-tool"
    }

    fn deactivate(&mut self, cx: &mut EditContext<'_>) {
        self.set_drag_tracker(None, cx);
        self.reset_hover(cx);
        targeting::reset(self, cx);
        self.traverse = None;
        self.hover_cursor = None;
        base::deactivate(self, cx);
    }

    // The tracker sees a press after this tool has picked it, and every
    // other event before this tool does.

    fn mouse_down(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        base::mouse_down(self, ev, cx);
        if let Some(tracker) = self.drag_tracker.as_mut() {
            tracker.mouse_down(ev, cx);
        }
    }

    fn mouse_up(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        if let Some(tracker) = self.drag_tracker.as_mut() {
            tracker.mouse_up(ev, cx);
        }
        base::mouse_up(self, ev, cx);
    }

    fn mouse_move(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        if let Some(tracker) = self.drag_tracker.as_mut() {
            tracker.mouse_move(ev, cx);
        }
        base::mouse_move(self, ev, cx);
    }

    fn double_click(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        if let Some(tracker) = self.drag_tracker.as_mut() {
            tracker.double_click(ev, cx);
        }
        base::double_click(self, ev, cx);
    }

    fn wheel(&mut self, ev: &WheelEvent, cx: &mut EditContext<'_>) {
        if let Some(tracker) = self.drag_tracker.as_mut() {
            tracker.wheel(ev, cx);
        }
        base::wheel(self, ev, cx);
    }

    fn key_down(&mut self, ev: &KeyEvent, cx: &mut EditContext<'_>) {
        if let Some(tracker) = self.drag_tracker.as_mut() {
            tracker.key_down(ev, cx);
        }
        base::key_down(self, ev, cx);
    }

    fn key_up(&mut self, ev: &KeyEvent, cx: &mut EditContext<'_>) {
        if let Some(tracker) = self.drag_tracker.as_mut() {
            tracker.key_up(ev, cx);
        }
        base::key_up(self, ev, cx);
    }

    fn viewer_exited(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        if let Some(tracker) = self.drag_tracker.as_mut() {
            tracker.viewer_exited(ev, cx);
        }
        base::viewer_exited(self, ev, cx);
    }

    fn native_drag_started(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        if let Some(tracker) = self.drag_tracker.as_mut() {
            tracker.native_drag_started(ev, cx);
        }
        base::native_drag_started(self, ev, cx);
    }

    fn native_drag_finished(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        if let Some(tracker) = self.drag_tracker.as_mut() {
            tracker.native_drag_finished(ev, cx);
        }
        base::native_drag_finished(self, ev, cx);
    }

    fn autoexpose_tick(&mut self, cx: &mut EditContext<'_>) -> bool {
        self.drag_tracker
            .as_mut()
            .is_some_and(|tracker| tracker.autoexpose_tick(cx))
    }

    fn on_button_down(&mut self, button: u8, cx: &mut EditContext<'_>) -> bool {
        if !self.core.state_transition(ToolState::Initial, ToolState::Drag) {
            self.reset_hover(cx);
            return true;
        }
        self.reset_hover(cx);
        self.traverse = None;
        self.set_drag_tracker(None, cx);

        if let Some(handle) = cx.viewer.find_handle_at(self.core.location()) {
            self.set_drag_tracker(Some(handle.drag_tracker()), cx);
            return true;
        }

        self.update_target_request(cx);
        self.targeting.request_mut().last_button = button;
        targeting::update_target_under_mouse(self, cx);
        let Some(target) = self.targeting.target() else {
            return false;
        };
        let tracker = cx.viewer.drag_tracker(target, self.targeting.request());
        targeting::lock_target(self, Some(target), cx);
        self.set_drag_tracker(tracker, cx);
        true
    }

    fn on_button_up(&mut self, _button: u8, cx: &mut EditContext<'_>) -> bool {
        if self.core.input.any_button_down() {
            return false;
        }
        self.set_drag_tracker(None, cx);
        self.core.set_state(ToolState::Initial);
        targeting::unlock_target(self);
        self.hover_at_pointer(cx);
        true
    }

    fn on_move(&mut self, cx: &mut EditContext<'_>) -> bool {
        if self.core.is_in_state(ToolState::TraverseHandle) {
            self.end_traversal();
        }
        if !self.core.is_in_state(ToolState::Initial) {
            return false;
        }
        self.hover_at_pointer(cx);
        true
    }

    fn on_wheel(&mut self, ev: &WheelEvent, cx: &mut EditContext<'_>) -> bool {
        if !self.core.is_in_state(ToolState::Initial) {
            return false;
        }
        let applied = cx.viewer.figures_mut().scroll_by(ev.delta);
        if applied != kurbo::Vec2::ZERO {
            self.hover_at_pointer(cx);
        }
        true
    }

    fn on_double_click(&mut self, _button: u8, cx: &mut EditContext<'_>) -> bool {
        if self.drag_tracker.is_some() {
            return false;
        }
        self.update_target_request(cx);
        targeting::update_target_under_mouse(self, cx);
        let Some(target) = self.targeting.target() else {
            return false;
        };
        let req = Request::new(RequestKind::Open).at(self.core.location());
        cx.viewer.perform_request(target, &req);
        true
    }

    fn on_key_down(&mut self, ev: &KeyEvent, cx: &mut EditContext<'_>) -> bool {
        self.reset_hover(cx);

        if self.core.is_in_state(ToolState::AccessibleDragInProgress) {
            if ev.is_enter() {
                if let Some(tracker) = self.drag_tracker.as_mut() {
                    tracker.commit_drag(cx);
                }
                self.set_drag_tracker(None, cx);
                self.traverse = None;
                self.hover_cursor = None;
                self.core.set_state(ToolState::Initial);
                self.refresh_cursor();
                return true;
            }
            if ev.is_escape() {
                return base::on_key_down(self, ev, cx);
            }
            // Arrows and modifiers belong to the tracker.
            return true;
        }

        if self.core.is_in_state(ToolState::TraverseHandle) {
            if ev.arrow().is_some() {
                return self.begin_handle_drag(ev, cx);
            }
            match ev.key.as_str() {
                "." => return self.traverse_step(1, cx),
                "," => return self.traverse_step(-1, cx),
                ">" => return self.traverse_next_owner(cx),
                _ => {}
            }
            if ev.is_escape() {
                self.end_traversal();
                return true;
            }
            return false;
        }

        if self.core.is_in_state(ToolState::Initial) {
            let traversed = match ev.key.as_str() {
                "." => Some(self.traverse_step(1, cx)),
                "," => Some(self.traverse_step(-1, cx)),
                ">" => Some(self.traverse_next_owner(cx)),
                _ => None,
            };
            if let Some(handled) = traversed {
                return handled;
            }
            if let Some(action) = cx.viewer.key_handler().resolve(ev) {
                log::debug!("selection-tool: key {:?} -> {action:?}", ev.key);
                self.run_key_action(action, cx);
                return true;
            }
        }
        base::on_key_down(self, ev, cx)
    }

    fn on_focus_lost(&mut self, cx: &mut EditContext<'_>) -> bool {
        self.reset_hover(cx);
        if self.drag_tracker.is_none() && self.core.is_in_state(ToolState::Initial) {
            return false;
        }
        log::debug!("selection-tool: focus lost, aborting gesture");
        self.set_drag_tracker(None, cx);
        targeting::unlock_target(self);
        self.traverse = None;
        self.hover_cursor = None;
        self.core.set_state(ToolState::Initial);
        self.refresh_cursor();
        true
    }

    fn on_viewer_exited(&mut self, cx: &mut EditContext<'_>) -> bool {
        if !self.core.is_in_state(ToolState::Initial) || self.targeting.is_locked() {
            return false;
        }
        self.reset_hover(cx);
        targeting::set_target(self, None, cx);
        self.hover_cursor = None;
        self.refresh_cursor();
        true
    }

    /// A running tracker answers for the stack itself.
    fn on_command_stack_changed(&mut self, cx: &mut EditContext<'_>) -> bool {
        if self.drag_tracker.is_some() {
            return false;
        }
        base::on_command_stack_changed(self, cx)
    }

    fn calculate_cursor(&self) -> Option<Cursor> {
        if self.core.is_in_state(ToolState::Terminal) {
            return None;
        }
        Some(self.hover_cursor.unwrap_or(self.core.default_cursor))
    }

    fn cursor(&self) -> Option<Cursor> {
        self.drag_tracker
            .as_ref()
            .and_then(|tracker| tracker.cursor())
            .or(self.core.cursor())
    }
}
