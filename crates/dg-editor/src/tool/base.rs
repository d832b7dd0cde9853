//! Default behaviour of every [`Tool`]: raw input bookkeeping and the
//! drag threshold, then dispatch to the hooks.

use crate::command_stack::CommandStack;
use crate::controller::ControllerId;
use crate::input::{InputEvent, KeyEvent, MouseEvent, WheelEvent, button_mask};

use super::{Cursor, EditContext, Tool, ToolState};

pub fn activate<T: Tool + ?Sized>(tool: &mut T, cx: &mut EditContext<'_>) {
    let core = tool.core_mut();
    core.active = true;
    core.state = ToolState::Initial;
    core.threshold = cx.config.drag_threshold;
    core.accessible_step_max = cx.config.accessible_step_max;
    core.past_threshold = false;
    core.accessible_step = 0;
    core.operation_set = None;
    core.current_command = None;
    core.viewer = Some(cx.viewer_id);
    core.stack_changed.set(false);
    core.attach_listener(cx.stack);
    tool.refresh_cursor();
    log::debug!("activated {}", tool.name());
}

pub fn deactivate<T: Tool + ?Sized>(tool: &mut T, cx: &mut EditContext<'_>) {
    tool.set_current_command(None);
    let core = tool.core_mut();
    core.active = false;
    core.state = ToolState::Terminal;
    core.operation_set = None;
    core.input = Default::default();
    core.cursor = None;
    core.detach_listener(cx.stack);
    log::debug!("deactivated {}", tool.name());
}

/// Run the stack-change hook if a command ran since the last event.
fn poll_command_stack<T: Tool + ?Sized>(tool: &mut T, cx: &mut EditContext<'_>) {
    if tool.core().take_stack_changed() {
        tool.on_command_stack_changed(cx);
    }
}

fn enter<T: Tool + ?Sized>(tool: &mut T, cx: &mut EditContext<'_>) -> bool {
    if !tool.core().is_active() {
        return false;
    }
    tool.core_mut().viewer = Some(cx.viewer_id);
    poll_command_stack(tool, cx);
    true
}

pub fn mouse_down<T: Tool + ?Sized>(tool: &mut T, ev: &MouseEvent, cx: &mut EditContext<'_>) {
    if !enter(tool, cx) {
        return;
    }
    let core = tool.core_mut();
    if !core.input.any_button_down() {
        core.past_threshold = false;
        core.start_location = ev.location;
    }
    core.input.set_mouse(ev);
    core.input.set_button(ev.button, true);
    tool.on_button_down(ev.button, cx);
}

pub fn mouse_up<T: Tool + ?Sized>(tool: &mut T, ev: &MouseEvent, cx: &mut EditContext<'_>) {
    if !enter(tool, cx) {
        return;
    }
    let core = tool.core_mut();
    core.input.set_mouse(ev);
    core.input.set_button(ev.button, false);
    tool.on_button_up(ev.button, cx);
}

pub fn mouse_move<T: Tool + ?Sized>(tool: &mut T, ev: &MouseEvent, cx: &mut EditContext<'_>) {
    if !enter(tool, cx) {
        return;
    }
    // A release outside the canvas never reaches us; the next move
    // reports the button as up.
    for button in 1..=3 {
        let core = tool.core_mut();
        if core.input.is_button_down(button) && ev.buttons & button_mask(button) == 0 {
            log::trace!("{}: synthesizing missed release of button {button}", tool.name());
            let core = tool.core_mut();
            core.input.set_mouse(ev);
            core.input.set_button(button, false);
            tool.on_button_up(button, cx);
        }
    }
    tool.core_mut().input.set_mouse(ev);
    if tool.core().input.any_button_down() {
        let was_past = tool.core().past_threshold;
        tool.on_drag(cx);
        if tool.core_mut().moved_past_threshold() {
            if !was_past {
                tool.on_drag_started(cx);
            }
            tool.on_drag_in_progress(cx);
        }
    } else {
        tool.on_move(cx);
    }
}

pub fn double_click<T: Tool + ?Sized>(tool: &mut T, ev: &MouseEvent, cx: &mut EditContext<'_>) {
    if !enter(tool, cx) {
        return;
    }
    tool.core_mut().input.set_mouse(ev);
    tool.on_double_click(ev.button, cx);
}

pub fn wheel<T: Tool + ?Sized>(tool: &mut T, ev: &WheelEvent, cx: &mut EditContext<'_>) {
    if !enter(tool, cx) {
        return;
    }
    let core = tool.core_mut();
    core.input.location = ev.location;
    core.input.modifiers = ev.modifiers;
    tool.on_wheel(ev, cx);
}

pub fn key_down<T: Tool + ?Sized>(tool: &mut T, ev: &KeyEvent, cx: &mut EditContext<'_>) {
    if !enter(tool, cx) {
        return;
    }
    tool.core_mut().input.modifiers = ev.modifiers;
    tool.on_key_down(ev, cx);
}

pub fn key_up<T: Tool + ?Sized>(tool: &mut T, ev: &KeyEvent, cx: &mut EditContext<'_>) {
    if !enter(tool, cx) {
        return;
    }
    tool.core_mut().input.modifiers = ev.modifiers;
    tool.on_key_up(ev, cx);
}

pub fn focus_lost<T: Tool + ?Sized>(tool: &mut T, cx: &mut EditContext<'_>) {
    if enter(tool, cx) {
        tool.on_focus_lost(cx);
    }
}

pub fn viewer_entered<T: Tool + ?Sized>(tool: &mut T, ev: &MouseEvent, cx: &mut EditContext<'_>) {
    if enter(tool, cx) {
        tool.core_mut().input.set_mouse(ev);
        tool.on_viewer_entered(cx);
    }
}

pub fn viewer_exited<T: Tool + ?Sized>(tool: &mut T, ev: &MouseEvent, cx: &mut EditContext<'_>) {
    if enter(tool, cx) {
        tool.core_mut().input.set_mouse(ev);
        tool.on_viewer_exited(cx);
    }
}

pub fn native_drag_started<T: Tool + ?Sized>(tool: &mut T, ev: &MouseEvent, cx: &mut EditContext<'_>) {
    if enter(tool, cx) {
        tool.core_mut().input.set_mouse(ev);
        tool.on_native_drag_started(cx);
    }
}

pub fn native_drag_finished<T: Tool + ?Sized>(tool: &mut T, ev: &MouseEvent, cx: &mut EditContext<'_>) {
    if enter(tool, cx) {
        tool.core_mut().input.set_mouse(ev);
        tool.on_native_drag_finished(cx);
    }
}

/// Route one raw event to the matching entry point.
pub fn dispatch(tool: &mut dyn Tool, event: &InputEvent, cx: &mut EditContext<'_>) {
    log::trace!("{} <- {}", tool.name(), event.name());
    match event {
        InputEvent::MouseDown(ev) => tool.mouse_down(ev, cx),
        InputEvent::MouseUp(ev) => tool.mouse_up(ev, cx),
        InputEvent::MouseMove(ev) => tool.mouse_move(ev, cx),
        InputEvent::DoubleClick(ev) => tool.double_click(ev, cx),
        InputEvent::Wheel(ev) => tool.wheel(ev, cx),
        InputEvent::KeyDown(ev) => tool.key_down(ev, cx),
        InputEvent::KeyUp(ev) => tool.key_up(ev, cx),
        InputEvent::FocusLost => tool.focus_lost(cx),
        InputEvent::ViewerEntered(ev) => tool.viewer_entered(ev, cx),
        InputEvent::ViewerExited(ev) => tool.viewer_exited(ev, cx),
        InputEvent::NativeDragStarted(ev) => tool.native_drag_started(ev, cx),
        InputEvent::NativeDragFinished(ev) => tool.native_drag_finished(ev, cx),
    }
}

// ─── Default hooks ───────────────────────────────────────────────────────

/// ESC aborts: the domain reloads its default tool.
pub fn on_key_down<T: Tool + ?Sized>(tool: &mut T, ev: &KeyEvent, cx: &mut EditContext<'_>) -> bool {
    if ev.is_escape() {
        log::debug!("{}: aborted", tool.name());
        cx.load_default_tool = true;
        return true;
    }
    false
}

pub fn on_focus_lost<T: Tool + ?Sized>(tool: &mut T, cx: &mut EditContext<'_>) -> bool {
    let dragging = ToolState::Drag
        | ToolState::DragInProgress
        | ToolState::AccessibleDrag
        | ToolState::AccessibleDragInProgress;
    if tool.core().is_in_state(dragging) {
        log::debug!("{}: focus lost mid-drag", tool.name());
        cx.load_default_tool = true;
        return true;
    }
    false
}

/// A command ran underneath a gesture: the gesture's assumptions are gone.
pub fn on_command_stack_changed<T: Tool + ?Sized>(tool: &mut T, cx: &mut EditContext<'_>) -> bool {
    let core = tool.core_mut();
    if core.is_in_state(ToolState::Initial) {
        return false;
    }
    if core.input.is_button_down(1) {
        core.set_state(ToolState::Invalid);
    } else {
        core.set_state(ToolState::Initial);
    }
    tool.on_invalid_input(cx);
    true
}

pub fn calculate_cursor(core: &super::ToolCore) -> Option<Cursor> {
    if core.is_in_state(ToolState::Terminal) {
        return None;
    }
    match core.current_command() {
        Some(cmd) if cmd.can_execute() => Some(core.default_cursor),
        _ => Some(core.disabled_cursor),
    }
}

// ─── Helpers for implementations ─────────────────────────────────────────

/// An invalidated gesture ends once every button is up. Returns whether the
/// tool was invalid, in which case the release must not complete anything.
pub fn finish_invalid(core: &mut super::ToolCore) -> bool {
    if !core.is_in_state(ToolState::Invalid) {
        return false;
    }
    if !core.input.any_button_down() {
        core.set_state(ToolState::Terminal);
    }
    true
}

/// The cached operation set, created on first use.
pub fn operation_set<T: Tool + ?Sized>(tool: &mut T, cx: &EditContext<'_>) -> Vec<ControllerId> {
    if let Some(set) = &tool.core().operation_set {
        return set.clone();
    }
    let set = tool.create_operation_set(cx);
    tool.core_mut().operation_set = Some(set.clone());
    set
}

/// Run `f` against the stack without the tool hearing about it.
pub fn with_listener_detached<T: Tool + ?Sized, R>(
    tool: &mut T,
    cx: &mut EditContext<'_>,
    f: impl FnOnce(&mut CommandStack) -> R,
) -> R {
    tool.core_mut().detach_listener(cx.stack);
    let result = f(cx.stack);
    if tool.core().is_active() {
        tool.core_mut().attach_listener(cx.stack);
    }
    result
}

/// Execute the current command, if it can run.
pub fn execute_current_command<T: Tool + ?Sized>(tool: &mut T, cx: &mut EditContext<'_>) {
    let Some(command) = tool.core_mut().take_current_command() else {
        return;
    };
    if !command.can_execute() {
        log::debug!("{}: dropping non-executable command", tool.name());
        tool.refresh_cursor();
        return;
    }
    log::debug!("{}: executing {:?}", tool.name(), command.label().unwrap_or("<unlabeled>"));
    with_listener_detached(tool, cx, |stack| stack.execute(command));
    tool.refresh_cursor();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{StateMask, ToolCore};

    #[test]
    fn state_transition_is_test_and_set() {
        let mut core = ToolCore::new();
        assert!(!core.state_transition(ToolState::Drag, ToolState::DragInProgress));
        assert!(core.state_transition(ToolState::Initial | ToolState::Drag, ToolState::Drag));
        assert_eq!(core.state(), ToolState::Drag);
        assert!(core.is_in_state(StateMask::from(ToolState::Drag)));
    }

    #[test]
    fn threshold_is_chebyshev_and_latches() {
        let mut core = ToolCore::new();
        core.set_start_location(kurbo::Point::new(100.0, 100.0));
        core.input.location = kurbo::Point::new(104.0, 104.0);
        assert!(!core.moved_past_threshold());
        core.input.location = kurbo::Point::new(106.0, 100.0);
        assert!(core.moved_past_threshold());
        core.input.location = kurbo::Point::new(100.0, 100.0);
        assert!(core.moved_past_threshold());
    }

    #[test]
    fn invalid_gesture_ends_only_once_every_button_is_up() {
        let mut core = ToolCore::new();
        assert!(!finish_invalid(&mut core));
        core.set_state(ToolState::Invalid);
        core.input.set_button(1, true);
        assert!(finish_invalid(&mut core));
        assert_eq!(core.state(), ToolState::Invalid);
        core.input.set_button(1, false);
        assert!(finish_invalid(&mut core));
        assert_eq!(core.state(), ToolState::Terminal);
    }

    #[test]
    fn accessible_steps_double_up_to_max() {
        let mut core = ToolCore::new();
        let steps: Vec<f64> = (0..5).map(|_| core.accessible_step_increment()).collect();
        assert_eq!(steps, vec![1.0, 2.0, 4.0, 8.0, 8.0]);
        core.accessible_step_reset();
        assert_eq!(core.accessible_step_increment(), 1.0);
    }
}
