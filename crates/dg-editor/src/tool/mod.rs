//! Tools: state machines that turn raw input into requests and commands.
//!
//! The [`Tool`] trait carries the raw entry points (`mouse_down`, ...) and
//! the overridable hooks (`on_button_down`, ...). Entry points default to
//! the template functions in [`base`], which update the shared
//! [`ToolCore`] and then call the hooks; an override that needs the
//! default behaviour calls the `base` function directly.

pub mod base;
mod marquee;
mod move_tracker;
mod non_target;
mod select_tracker;
mod selection_tool;
pub mod targeting;

pub use marquee::MarqueeTracker;
pub use move_tracker::MoveTracker;
pub use non_target::{NonTargetTracker, ResizeDrag, ResizeTracker, SourceDrag};
pub use select_tracker::{SelectTracker, SourceSelection};
pub use selection_tool::SelectionTool;
pub use targeting::{Targeting, TargetingTool, ViewportAutoexposeHelper};

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::ops::BitOr;
use std::rc::Rc;

use dg_core::Direction;
use kurbo::{Point, Vec2};

use crate::command::Command;
use crate::command_stack::{CommandStack, ListenerId};
use crate::config::EditorConfig;
use crate::controller::ControllerId;
use crate::domain::Deferred;
use crate::input::{Input, KeyEvent, MouseEvent, WheelEvent};
use crate::viewer::{Viewer, ViewerId};

// ─── States ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ToolState {
    Initial = 1,
    Drag = 1 << 1,
    DragInProgress = 1 << 2,
    Invalid = 1 << 3,
    AccessibleDrag = 1 << 4,
    AccessibleDragInProgress = 1 << 5,
    TraverseHandle = 1 << 6,
    Terminal = 1 << 30,
}

impl ToolState {
    pub const fn bit(self) -> u32 {
        self as u32
    }
}

/// A set of [`ToolState`]s, built with `|`.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct StateMask(u32);

impl StateMask {
    pub const fn contains(self, state: ToolState) -> bool {
        self.0 & state.bit() != 0
    }
}

impl From<ToolState> for StateMask {
    fn from(s: ToolState) -> Self {
        StateMask(s.bit())
    }
}

impl BitOr for ToolState {
    type Output = StateMask;
    fn bitor(self, rhs: ToolState) -> StateMask {
        StateMask(self.bit() | rhs.bit())
    }
}

impl BitOr<ToolState> for StateMask {
    type Output = StateMask;
    fn bitor(self, rhs: ToolState) -> StateMask {
        StateMask(self.0 | rhs.bit())
    }
}

impl fmt::Debug for StateMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let all = [
            ToolState::Initial,
            ToolState::Drag,
            ToolState::DragInProgress,
            ToolState::Invalid,
            ToolState::AccessibleDrag,
            ToolState::AccessibleDragInProgress,
            ToolState::TraverseHandle,
            ToolState::Terminal,
        ];
        f.debug_set().entries(all.iter().filter(|s| self.contains(**s))).finish()
    }
}

// ─── Cursors ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Default,
    Move,
    Copy,
    NotAllowed,
    Crosshair,
    Resize(Direction),
}

impl Cursor {
    pub fn css_name(self) -> &'static str {
        match self {
            Cursor::Default => "default",
            Cursor::Move => "move",
            Cursor::Copy => "copy",
            Cursor::NotAllowed => "not-allowed",
            Cursor::Crosshair => "crosshair",
            Cursor::Resize(d) => d.cursor_name(),
        }
    }
}

// ─── Edit context ────────────────────────────────────────────────────────

/// Everything a tool may touch while handling one event.
pub struct EditContext<'a> {
    pub viewer_id: ViewerId,
    pub viewer: &'a mut Viewer,
    pub stack: &'a mut CommandStack,
    pub deferred: &'a mut VecDeque<Deferred>,
    pub config: &'a EditorConfig,
    /// Set by a tool that is done (or aborted) and wants the domain to
    /// reload its default tool after the current event.
    pub load_default_tool: bool,
}

impl<'a> EditContext<'a> {
    pub fn new(
        viewer_id: ViewerId,
        viewer: &'a mut Viewer,
        stack: &'a mut CommandStack,
        deferred: &'a mut VecDeque<Deferred>,
        config: &'a EditorConfig,
    ) -> Self {
        Self {
            viewer_id,
            viewer,
            stack,
            deferred,
            config,
            load_default_tool: false,
        }
    }

    /// Queue deferred work once.
    pub fn defer(&mut self, task: Deferred) {
        if !self.deferred.contains(&task) {
            self.deferred.push_back(task);
        }
    }
}

// ─── Shared tool state ───────────────────────────────────────────────────

pub struct ToolCore {
    state: ToolState,
    active: bool,
    pub input: Input,
    start_location: Point,
    past_threshold: bool,
    threshold: f64,
    current_command: Option<Box<dyn Command>>,
    cursor: Option<Cursor>,
    pub default_cursor: Cursor,
    pub disabled_cursor: Cursor,
    viewer: Option<ViewerId>,
    operation_set: Option<Vec<ControllerId>>,
    stack_listener: Option<ListenerId>,
    stack_changed: Rc<Cell<bool>>,
    accessible_step: u32,
    accessible_step_max: u32,
}

impl fmt::Debug for ToolCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolCore")
            .field("state", &self.state)
            .field("active", &self.active)
            .field("input", &self.input)
            .field("start_location", &self.start_location)
            .field("command", &self.current_command)
            .finish_non_exhaustive()
    }
}

impl Default for ToolCore {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCore {
    pub fn new() -> Self {
        Self {
            state: ToolState::Initial,
            active: false,
            input: Input::default(),
            start_location: Point::ORIGIN,
            past_threshold: false,
            threshold: EditorConfig::default().drag_threshold,
            current_command: None,
            cursor: None,
            default_cursor: Cursor::Default,
            disabled_cursor: Cursor::NotAllowed,
            viewer: None,
            operation_set: None,
            stack_listener: None,
            stack_changed: Rc::new(Cell::new(false)),
            accessible_step: 0,
            accessible_step_max: EditorConfig::default().accessible_step_max,
        }
    }

    #[must_use]
    pub fn with_default_cursor(mut self, cursor: Cursor) -> Self {
        self.default_cursor = cursor;
        self
    }

    pub fn state(&self) -> ToolState {
        self.state
    }

    pub fn set_state(&mut self, state: ToolState) {
        if self.state != state {
            log::trace!("tool state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    pub fn is_in_state(&self, mask: impl Into<StateMask>) -> bool {
        mask.into().contains(self.state)
    }

    /// Move to `to` if the current state is in `from`.
    pub fn state_transition(&mut self, from: impl Into<StateMask>, to: ToolState) -> bool {
        if self.is_in_state(from) {
            self.set_state(to);
            true
        } else {
            false
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn location(&self) -> Point {
        self.input.location
    }

    pub fn start_location(&self) -> Point {
        self.start_location
    }

    pub fn set_start_location(&mut self, p: Point) {
        self.start_location = p;
    }

    pub fn drag_delta(&self) -> Vec2 {
        self.input.location - self.start_location
    }

    /// Latches once the pointer has left the threshold box around the
    /// start location.
    pub fn moved_past_threshold(&mut self) -> bool {
        if !self.past_threshold
            && dg_core::chebyshev_exceeds(self.start_location, self.input.location, self.threshold)
        {
            self.past_threshold = true;
        }
        self.past_threshold
    }

    pub fn past_threshold(&self) -> bool {
        self.past_threshold
    }

    pub fn current_command(&self) -> Option<&dyn Command> {
        self.current_command.as_deref()
    }

    pub fn take_current_command(&mut self) -> Option<Box<dyn Command>> {
        self.current_command.take()
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    pub fn viewer(&self) -> Option<ViewerId> {
        self.viewer
    }

    pub fn set_viewer(&mut self, viewer: ViewerId) {
        self.viewer = Some(viewer);
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Next keyboard-drag increment: 1, 2, 4, ... up to the configured max.
    pub fn accessible_step_increment(&mut self) -> f64 {
        self.accessible_step = if self.accessible_step == 0 {
            1
        } else {
            (self.accessible_step * 2).min(self.accessible_step_max.max(1))
        };
        f64::from(self.accessible_step)
    }

    pub fn accessible_step_reset(&mut self) {
        self.accessible_step = 0;
    }

    pub(crate) fn attach_listener(&mut self, stack: &mut CommandStack) {
        if self.stack_listener.is_some() {
            return;
        }
        let flag = self.stack_changed.clone();
        self.stack_listener = Some(stack.add_listener(move |ev| {
            if ev.is_post() {
                flag.set(true);
            }
        }));
    }

    pub(crate) fn detach_listener(&mut self, stack: &mut CommandStack) {
        if let Some(id) = self.stack_listener.take() {
            stack.remove_listener(id);
        }
    }

    pub(crate) fn take_stack_changed(&self) -> bool {
        self.stack_changed.replace(false)
    }
}

// ─── The trait ───────────────────────────────────────────────────────────

pub trait Tool {
    fn core(&self) -> &ToolCore;
    fn core_mut(&mut self) -> &mut ToolCore;
    fn name(&self) -> &'static str;

    fn activate(&mut self, cx: &mut EditContext<'_>) {
        base::activate(self, cx);
    }

    fn deactivate(&mut self, cx: &mut EditContext<'_>) {
        base::deactivate(self, cx);
    }

    // Raw entry points.

    fn mouse_down(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        base::mouse_down(self, ev, cx);
    }

    fn mouse_up(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        base::mouse_up(self, ev, cx);
    }

    fn mouse_move(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        base::mouse_move(self, ev, cx);
    }

    fn double_click(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        base::double_click(self, ev, cx);
    }

    fn wheel(&mut self, ev: &WheelEvent, cx: &mut EditContext<'_>) {
        base::wheel(self, ev, cx);
    }

    fn key_down(&mut self, ev: &KeyEvent, cx: &mut EditContext<'_>) {
        base::key_down(self, ev, cx);
    }

    fn key_up(&mut self, ev: &KeyEvent, cx: &mut EditContext<'_>) {
        base::key_up(self, ev, cx);
    }

    fn focus_lost(&mut self, cx: &mut EditContext<'_>) {
        base::focus_lost(self, cx);
    }

    fn viewer_entered(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        base::viewer_entered(self, ev, cx);
    }

    fn viewer_exited(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        base::viewer_exited(self, ev, cx);
    }

    fn native_drag_started(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        base::native_drag_started(self, ev, cx);
    }

    fn native_drag_finished(&mut self, ev: &MouseEvent, cx: &mut EditContext<'_>) {
        base::native_drag_finished(self, ev, cx);
    }

    /// Deferred autoexpose step. Returns true while more steps are wanted.
    fn autoexpose_tick(&mut self, _cx: &mut EditContext<'_>) -> bool {
        false
    }

    /// Finish a keyboard drag as if the button had been released.
    fn commit_drag(&mut self, _cx: &mut EditContext<'_>) {}

    // Hooks. Returning true means the event was handled.

    fn on_button_down(&mut self, _button: u8, _cx: &mut EditContext<'_>) -> bool {
        false
    }

    fn on_button_up(&mut self, _button: u8, _cx: &mut EditContext<'_>) -> bool {
        false
    }

    fn on_move(&mut self, _cx: &mut EditContext<'_>) -> bool {
        false
    }

    /// Every move with a button held, before the threshold check.
    fn on_drag(&mut self, _cx: &mut EditContext<'_>) -> bool {
        false
    }

    /// Once per gesture, when the pointer first passes the threshold.
    fn on_drag_started(&mut self, _cx: &mut EditContext<'_>) -> bool {
        self.core_mut()
            .state_transition(ToolState::Drag, ToolState::DragInProgress)
    }

    fn on_drag_in_progress(&mut self, _cx: &mut EditContext<'_>) -> bool {
        false
    }

    fn on_double_click(&mut self, _button: u8, _cx: &mut EditContext<'_>) -> bool {
        false
    }

    fn on_wheel(&mut self, _ev: &WheelEvent, _cx: &mut EditContext<'_>) -> bool {
        false
    }

    fn on_key_down(&mut self, ev: &KeyEvent, cx: &mut EditContext<'_>) -> bool {
        base::on_key_down(self, ev, cx)
    }

    fn on_key_up(&mut self, _ev: &KeyEvent, _cx: &mut EditContext<'_>) -> bool {
        false
    }

    fn on_focus_lost(&mut self, cx: &mut EditContext<'_>) -> bool {
        base::on_focus_lost(self, cx)
    }

    fn on_viewer_entered(&mut self, _cx: &mut EditContext<'_>) -> bool {
        false
    }

    fn on_viewer_exited(&mut self, _cx: &mut EditContext<'_>) -> bool {
        false
    }

    fn on_native_drag_started(&mut self, _cx: &mut EditContext<'_>) -> bool {
        false
    }

    fn on_native_drag_finished(&mut self, _cx: &mut EditContext<'_>) -> bool {
        false
    }

    fn on_invalid_input(&mut self, _cx: &mut EditContext<'_>) -> bool {
        false
    }

    fn on_command_stack_changed(&mut self, cx: &mut EditContext<'_>) -> bool {
        base::on_command_stack_changed(self, cx)
    }

    // Commands and cursor.

    /// The command the current gesture would execute.
    fn command(&self, _cx: &EditContext<'_>) -> Option<Box<dyn Command>> {
        None
    }

    /// The controllers this tool operates on. Cached per gesture by
    /// [`base::operation_set`].
    fn create_operation_set(&self, cx: &EditContext<'_>) -> Vec<ControllerId> {
        cx.viewer.selected().to_vec()
    }

    fn calculate_cursor(&self) -> Option<Cursor> {
        base::calculate_cursor(self.core())
    }

    fn cursor(&self) -> Option<Cursor> {
        self.core().cursor
    }

    fn set_current_command(&mut self, command: Option<Box<dyn Command>>) {
        self.core_mut().current_command = command;
        self.refresh_cursor();
    }

    fn refresh_cursor(&mut self) {
        let cursor = self.calculate_cursor();
        self.core_mut().cursor = cursor;
    }
}
