//! Drag trackers that act on their source only and never look for a drop
//! target. [`ResizeTracker`] is the stock instance.

use std::fmt;

use dg_core::{Direction, clamp_size, rect_transform};
use kurbo::{Rect, Size, Vec2};

use super::{Cursor, EditContext, Tool, ToolCore, ToolState, base};
use crate::command::{Command, CompoundCommand, unexecutable};
use crate::controller::ControllerId;
use crate::input::{Input, KeyEvent};
use crate::request::{Request, RequestKind};
use crate::snap::{SnapToGrid, SnapToHelper};

/// What a [`NonTargetTracker`] does with the pointer delta.
pub trait SourceDrag: fmt::Debug {
    fn name(&self) -> &'static str;
    fn label(&self) -> &'static str;
    fn request_kind(&self) -> RequestKind;
    fn default_cursor(&self) -> Cursor;

    /// Snapshot whatever the gesture measures against; called once when
    /// the drag (pointer or keyboard) really starts.
    fn begin(&mut self, cx: &EditContext<'_>);

    /// Fill the drag-specific part of the request from the current input.
    fn update_request(&self, req: &mut Request, core: &ToolCore, cx: &EditContext<'_>);
}

#[derive(Debug)]
pub struct NonTargetTracker<D: SourceDrag> {
    core: ToolCore,
    owner: ControllerId,
    drag: D,
    request: Request,
    showing_feedback: bool,
}

pub type ResizeTracker = NonTargetTracker<ResizeDrag>;

impl ResizeTracker {
    pub fn new(owner: ControllerId, direction: Direction) -> Self {
        Self::with_drag(owner, ResizeDrag::new(owner, direction))
    }

    pub fn direction(&self) -> Direction {
        self.drag.direction
    }
}

impl<D: SourceDrag> NonTargetTracker<D> {
    pub fn with_drag(owner: ControllerId, drag: D) -> Self {
        Self {
            core: ToolCore::new().with_default_cursor(drag.default_cursor()),
            owner,
            request: Request::new(drag.request_kind()),
            drag,
            showing_feedback: false,
        }
    }

    pub fn owner(&self) -> ControllerId {
        self.owner
    }

    pub fn drag(&self) -> &D {
        &self.drag
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    fn update_source_request(&mut self, cx: &EditContext<'_>) {
        let ops = base::operation_set(self, cx);
        let input = self.core.input;
        self.request.controllers = ops;
        self.request.location = Some(input.location);
        self.request.modifiers = input.modifiers;
        self.drag.update_request(&mut self.request, &self.core, cx);
    }

    fn show_source_feedback(&mut self, cx: &mut EditContext<'_>) {
        for op in base::operation_set(self, cx) {
            cx.viewer.show_source_feedback(op, &self.request);
        }
        self.showing_feedback = true;
    }

    fn erase_source_feedback(&mut self, cx: &mut EditContext<'_>) {
        if !self.showing_feedback {
            return;
        }
        self.showing_feedback = false;
        for op in base::operation_set(self, cx) {
            cx.viewer.erase_source_feedback(op, &self.request);
        }
    }

    fn update_drag(&mut self, cx: &mut EditContext<'_>) {
        self.update_source_request(cx);
        self.show_source_feedback(cx);
        let command = self.command(cx);
        self.set_current_command(command);
    }

    fn perform_drag(&mut self, cx: &mut EditContext<'_>) {
        self.erase_source_feedback(cx);
        base::execute_current_command(self, cx);
    }

    fn in_drag(&self) -> bool {
        self.core
            .is_in_state(ToolState::DragInProgress | ToolState::AccessibleDragInProgress)
    }
}

impl<D: SourceDrag> Tool for NonTargetTracker<D> {
    fn core(&self) -> &ToolCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ToolCore {
        &mut self.core
    }

    fn name(&self) -> &'static str {
        self.drag.name()
    }

    fn deactivate(&mut self, cx: &mut EditContext<'_>) {
        self.erase_source_feedback(cx);
        base::deactivate(self, cx);
    }

    fn create_operation_set(&self, cx: &EditContext<'_>) -> Vec<ControllerId> {
        let query = Request::new(self.drag.request_kind());
        cx.viewer
            .selected()
            .iter()
            .copied()
            .filter(|c| cx.viewer.understands(*c, &query))
            .collect()
    }

    fn on_button_down(&mut self, button: u8, cx: &mut EditContext<'_>) -> bool {
        if button != 1 {
            self.core.set_state(ToolState::Invalid);
            self.on_invalid_input(cx);
        } else {
            self.core.state_transition(ToolState::Initial, ToolState::Drag);
        }
        true
    }

    fn on_button_up(&mut self, _button: u8, cx: &mut EditContext<'_>) -> bool {
        if base::finish_invalid(&mut self.core) {
            return true;
        }
        if self
            .core
            .state_transition(ToolState::DragInProgress, ToolState::Terminal)
        {
            self.perform_drag(cx);
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
        self.drag.begin(cx);
        true
    }

    fn on_drag_in_progress(&mut self, cx: &mut EditContext<'_>) -> bool {
        if self.in_drag() {
            self.update_drag(cx);
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
                let location = self.core.location();
                self.core.set_start_location(location);
                self.drag.begin(cx);
            }
            self.core.input.location += dir * step;
            self.on_drag_in_progress(cx);
            return true;
        }
        if ev.is_modifier() && self.in_drag() {
            self.update_drag(cx);
            return true;
        }
        base::on_key_down(self, ev, cx)
    }

    fn on_key_up(&mut self, ev: &KeyEvent, cx: &mut EditContext<'_>) -> bool {
        if ev.arrow().is_some() && self.core.is_in_state(ToolState::AccessibleDragInProgress) {
            self.core.accessible_step_reset();
            return true;
        }
        if ev.is_modifier() && self.in_drag() {
            self.update_drag(cx);
            return true;
        }
        false
    }

    fn on_invalid_input(&mut self, cx: &mut EditContext<'_>) -> bool {
        self.erase_source_feedback(cx);
        self.set_current_command(Some(unexecutable()));
        true
    }

    fn commit_drag(&mut self, cx: &mut EditContext<'_>) {
        self.perform_drag(cx);
        self.core.set_state(ToolState::Terminal);
    }

    fn command(&self, cx: &EditContext<'_>) -> Option<Box<dyn Command>> {
        let mut compound = CompoundCommand::with_label(self.drag.label());
        for op in &self.request.controllers {
            compound.add(cx.viewer.get_command(*op, &self.request));
        }
        Some(compound.unwrap())
    }

    fn calculate_cursor(&self) -> Option<Cursor> {
        if self
            .core
            .is_in_state(ToolState::Initial | ToolState::Drag | ToolState::AccessibleDrag)
        {
            return Some(self.core.default_cursor);
        }
        base::calculate_cursor(&self.core)
    }
}

// ─── Resize ──────────────────────────────────────────────────────────────

/// Resizes the selection by dragging one of the owner's knobs.
///
/// The delta is snapped first, then aspect-constrained (SHIFT), then
/// mirrored for a centred resize (CTRL), and finally corrected so the
/// owner stays within `EditorConfig::{min_size, max_size}`.
#[derive(Debug, Clone)]
pub struct ResizeDrag {
    owner: ControllerId,
    direction: Direction,
    original: Option<Rect>,
    snap: Option<SnapToGrid>,
    min_size: Size,
    max_size: Size,
}

impl ResizeDrag {
    pub fn new(owner: ControllerId, direction: Direction) -> Self {
        Self {
            owner,
            direction,
            original: None,
            snap: None,
            min_size: Size::ZERO,
            max_size: Size::new(f64::INFINITY, f64::INFINITY),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Owner bounds (absolute) at the start of the gesture.
    pub fn original(&self) -> Option<Rect> {
        self.original
    }

    fn snapped_delta(&self, original: Rect, delta: Vec2, input: &Input, cx: &EditContext<'_>) -> Vec2 {
        let Some(grid) = self.snap.filter(|_| !input.meta()) else {
            return delta;
        };
        let origin = (-cx.viewer.figures().scroll()).to_point();
        let (moved, sized) = resize_deltas(delta, self.direction, false);
        let proposed = rect_transform(original, moved, sized);
        let (fix_move, fix_size) = grid.with_origin(origin).snap_resize(proposed, self.direction);
        let mut delta = delta;
        if self.direction.contains(Direction::WEST) {
            delta.x += fix_move.x;
        } else if self.direction.contains(Direction::EAST) {
            delta.x += fix_size.width;
        }
        if self.direction.contains(Direction::NORTH) {
            delta.y += fix_move.y;
        } else if self.direction.contains(Direction::SOUTH) {
            delta.y += fix_size.height;
        }
        delta
    }
}

impl SourceDrag for ResizeDrag {
    fn name(&self) -> &'static str {
        "resize-tracker"
    }

    fn label(&self) -> &'static str {
        "Resize"
    }

    fn request_kind(&self) -> RequestKind {
        RequestKind::Resize
    }

    fn default_cursor(&self) -> Cursor {
        Cursor::Resize(self.direction)
    }

    fn begin(&mut self, cx: &EditContext<'_>) {
        self.original = cx
            .viewer
            .figure_of(self.owner)
            .map(|fig| cx.viewer.figures().absolute_bounds(fig));
        self.snap = SnapToGrid::from_config(cx.config);
        self.min_size = cx.config.min_size;
        self.max_size = cx.config.max_size;
    }

    fn update_request(&self, req: &mut Request, core: &ToolCore, cx: &EditContext<'_>) {
        let input = core.input;
        let centered = input.ctrl();
        let constrained = input.shift();
        req.kind = RequestKind::Resize;
        req.direction = self.direction;
        req.centered = centered;
        req.constrained = constrained;
        req.snap_enabled = !input.meta();

        let Some(original) = self.original else {
            req.move_delta = Vec2::ZERO;
            req.size_delta = Size::ZERO;
            return;
        };
        let mut delta = self.snapped_delta(original, core.drag_delta(), &input, cx);
        if constrained {
            delta = constrain_resize_delta(delta, original.size(), self.direction);
        }
        let (moved, sized) = resize_deltas(delta, self.direction, centered);

        // Signed: dragging past the anchored edge gives a negative size.
        let proposed = original.size() + sized;
        let (moved, sized) = clamp_resize(
            proposed,
            (moved, sized),
            self.direction,
            centered,
            self.min_size,
            self.max_size,
        );
        req.move_delta = moved;
        req.size_delta = sized;
    }
}

/// Keep the original aspect ratio while dragging a corner; the axis that
/// leads the gesture drives the other.
pub(crate) fn constrain_resize_delta(d: Vec2, original: Size, direction: Direction) -> Vec2 {
    let ratio = if original.width != 0.0 && original.height != 0.0 {
        original.height / original.width
    } else {
        1.0
    };
    let (mut dx, mut dy) = (d.x, d.y);
    if direction == Direction::SOUTH_EAST {
        if dy > dx * ratio {
            dx = dy / ratio;
        } else {
            dy = dx * ratio;
        }
    } else if direction == Direction::NORTH_WEST {
        if dy < dx * ratio {
            dx = dy / ratio;
        } else {
            dy = dx * ratio;
        }
    } else if direction == Direction::NORTH_EAST {
        if -dy > dx * ratio {
            dx = -(dy / ratio);
        } else {
            dy = -(dx * ratio);
        }
    } else if direction == Direction::SOUTH_WEST {
        if -dy < dx * ratio {
            dx = -(dy / ratio);
        } else {
            dy = -(dx * ratio);
        }
    }
    Vec2::new(dx, dy)
}

/// Split a pointer delta into `(move, size)` deltas for the edges named by
/// `direction`. Centred resizes move the opposite edge by the same amount.
pub(crate) fn resize_deltas(d: Vec2, direction: Direction, centered: bool) -> (Vec2, Size) {
    let mut moved = Vec2::ZERO;
    let mut sized = Size::ZERO;
    if direction.contains(Direction::NORTH) {
        if centered {
            sized.height -= d.y;
        }
        moved.y += d.y;
        sized.height -= d.y;
    }
    if direction.contains(Direction::SOUTH) {
        if centered {
            moved.y -= d.y;
            sized.height += d.y;
        }
        sized.height += d.y;
    }
    if direction.contains(Direction::WEST) {
        if centered {
            sized.width -= d.x;
        }
        moved.x += d.x;
        sized.width -= d.x;
    }
    if direction.contains(Direction::EAST) {
        if centered {
            moved.x -= d.x;
            sized.width += d.x;
        }
        sized.width += d.x;
    }
    (moved, sized)
}

/// Correct `(move, size)` so the resulting size lies within `[min, max]`.
/// The anchored edge stays put; a centred resize gives back half on
/// each side.
pub(crate) fn clamp_resize(
    proposed: Size,
    (mut moved, mut sized): (Vec2, Size),
    direction: Direction,
    centered: bool,
    min: Size,
    max: Size,
) -> (Vec2, Size) {
    let clamped = clamp_size(proposed, min, max);
    let dw = clamped.width - proposed.width;
    let dh = clamped.height - proposed.height;
    if dw != 0.0 && (direction.contains(Direction::WEST) || direction.contains(Direction::EAST)) {
        sized.width += dw;
        if centered {
            moved.x -= dw / 2.0;
        } else if direction.contains(Direction::WEST) {
            moved.x -= dw;
        }
    }
    if dh != 0.0 && (direction.contains(Direction::NORTH) || direction.contains(Direction::SOUTH)) {
        sized.height += dh;
        if centered {
            moved.y -= dh / 2.0;
        } else if direction.contains(Direction::NORTH) {
            moved.y -= dh;
        }
    }
    (moved, sized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const R: Rect = Rect::new(0.0, 0.0, 100.0, 50.0);

    #[test]
    fn edges_move_or_grow_independently() {
        let d = Vec2::new(10.0, 5.0);
        assert_eq!(
            resize_deltas(d, Direction::NORTH, false),
            (Vec2::new(0.0, 5.0), Size::new(0.0, -5.0))
        );
        assert_eq!(
            resize_deltas(d, Direction::SOUTH, false),
            (Vec2::ZERO, Size::new(0.0, 5.0))
        );
        assert_eq!(
            resize_deltas(d, Direction::NORTH_EAST, false),
            (Vec2::new(0.0, 5.0), Size::new(10.0, -5.0))
        );
        assert_eq!(
            resize_deltas(d, Direction::WEST, false),
            (Vec2::new(10.0, 0.0), Size::new(-10.0, 0.0))
        );
    }

    #[test]
    fn centered_mirrors_onto_the_anchor_side() {
        let (moved, sized) = resize_deltas(Vec2::new(20.0, 10.0), Direction::SOUTH_EAST, true);
        assert_eq!(moved, Vec2::new(-20.0, -10.0));
        assert_eq!(sized, Size::new(40.0, 20.0));
        assert_eq!(rect_transform(R, moved, sized).center(), R.center());
    }

    #[test]
    fn constrained_corners_keep_aspect() {
        let s = R.size();
        // Width leads on SE.
        assert_eq!(constrain_resize_delta(Vec2::new(20.0, 3.0), s, Direction::SOUTH_EAST), Vec2::new(20.0, 10.0));
        // Height leads on SE.
        assert_eq!(constrain_resize_delta(Vec2::new(4.0, 10.0), s, Direction::SOUTH_EAST), Vec2::new(20.0, 10.0));
        assert_eq!(constrain_resize_delta(Vec2::new(-20.0, -3.0), s, Direction::NORTH_WEST), Vec2::new(-20.0, -10.0));
        assert_eq!(constrain_resize_delta(Vec2::new(20.0, -3.0), s, Direction::NORTH_EAST), Vec2::new(20.0, -10.0));
        assert_eq!(constrain_resize_delta(Vec2::new(-20.0, 3.0), s, Direction::SOUTH_WEST), Vec2::new(-20.0, 10.0));
        // Edges are left alone.
        assert_eq!(constrain_resize_delta(Vec2::new(7.0, 3.0), s, Direction::EAST), Vec2::new(7.0, 3.0));
    }

    #[test]
    fn centered_and_constrained_together() {
        let d = constrain_resize_delta(Vec2::new(20.0, 10.0), R.size(), Direction::SOUTH_EAST);
        let (moved, sized) = resize_deltas(d, Direction::SOUTH_EAST, true);
        assert_eq!(moved, Vec2::new(-20.0, -10.0));
        assert_eq!(sized, Size::new(40.0, 20.0));
        let out = rect_transform(R, moved, sized);
        assert_eq!(out.width() / out.height(), 2.0);
    }

    #[test]
    fn clamp_keeps_anchor_edge() {
        // Dragging the west edge 150px right would leave width -50.
        let deltas = resize_deltas(Vec2::new(150.0, 0.0), Direction::WEST, false);
        let proposed = rect_transform(R, deltas.0, deltas.1).size();
        let (moved, sized) = clamp_resize(
            proposed,
            deltas,
            Direction::WEST,
            false,
            Size::new(10.0, 10.0),
            Size::new(f64::INFINITY, f64::INFINITY),
        );
        let out = rect_transform(R, moved, sized);
        assert_eq!(out, Rect::new(90.0, 0.0, 100.0, 50.0));
    }

    #[test]
    fn clamp_centered_gives_back_half_per_side() {
        let deltas = resize_deltas(Vec2::new(100.0, 0.0), Direction::EAST, true);
        let proposed = rect_transform(R, deltas.0, deltas.1).size();
        let (moved, sized) = clamp_resize(
            proposed,
            deltas,
            Direction::EAST,
            true,
            Size::ZERO,
            Size::new(200.0, 200.0),
        );
        let out = rect_transform(R, moved, sized);
        assert_eq!(out, Rect::new(-50.0, 0.0, 150.0, 50.0));
    }
}
