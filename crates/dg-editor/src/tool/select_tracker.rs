use crate::controller::{ControllerId, SelectionState};
use crate::input::Input;
use crate::request::{Request, RequestKind};
use crate::viewer::Viewer;

use super::{Cursor, EditContext, Tool, ToolCore, ToolState, base};

/// Click-selection of one source controller, shared by the trackers that
/// start on a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSelection {
    source: ControllerId,
    direct_edit: bool,
    performed: bool,
}

impl SourceSelection {
    pub fn new(source: ControllerId) -> Self {
        Self {
            source,
            direct_edit: false,
            performed: false,
        }
    }

    pub fn source(&self) -> ControllerId {
        self.source
    }

    /// On press: an unselected source is selected right away; pressing an
    /// already selected source without modifiers arms direct edit instead.
    pub fn on_press(&mut self, input: &Input, viewer: &mut Viewer) {
        if viewer.selection_state(self.source) == SelectionState::None {
            self.perform(input, viewer);
        } else if !input.modifiers.any() {
            self.direct_edit = true;
        }
    }

    /// Apply the click to the selection, once per gesture.
    pub fn perform(&mut self, input: &Input, viewer: &mut Viewer) {
        if self.performed {
            return;
        }
        self.performed = true;
        let source = self.source;
        if input.ctrl() {
            if viewer.selection_state(source) == SelectionState::None {
                viewer.append_selection(source);
            } else {
                viewer.deselect(source);
            }
        } else if input.shift() {
            viewer.append_selection(source);
        } else {
            viewer.select(source);
        }
    }

    pub fn is_direct_edit_armed(&self) -> bool {
        self.direct_edit
    }

    pub fn perform_direct_edit(&self, input: &Input, viewer: &Viewer) {
        let req = Request::new(RequestKind::DirectEdit).at(input.location);
        viewer.perform_request(self.source, &req);
    }

    pub fn perform_open(&self, input: &Input, viewer: &Viewer) {
        let req = Request::new(RequestKind::Open).at(input.location);
        viewer.perform_request(self.source, &req);
    }

    /// Release of a click that never became a drag.
    pub(crate) fn finish_click(&mut self, button: u8, input: &Input, viewer: &mut Viewer) {
        self.perform(input, viewer);
        if self.direct_edit {
            self.perform_direct_edit(input, viewer);
        }
        if button == 1 && viewer.selection_state(self.source) != SelectionState::None {
            viewer.reveal(self.source);
        }
    }
}

/// Tracker for controllers that can be selected but not dragged.
#[derive(Debug)]
pub struct SelectTracker {
    core: ToolCore,
    selection: SourceSelection,
}

impl SelectTracker {
    pub fn new(source: ControllerId) -> Self {
        Self {
            core: ToolCore::new(),
            selection: SourceSelection::new(source),
        }
    }

    pub fn source(&self) -> ControllerId {
        self.selection.source()
    }
}

impl Tool for SelectTracker {
    fn core(&self) -> &ToolCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ToolCore {
        &mut self.core
    }

    fn name(&self) -> &'static str {
        "select-tracker"
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
