use dg_render::{Figure, FigureId, FigureKind};
use kurbo::Rect;

use super::{Cursor, EditContext, Tool, ToolCore, ToolState, base};

/// Rubber-band selection, started by pressing on empty canvas.
///
/// SHIFT or CTRL at press time adds to the selection; otherwise the press
/// clears it.
#[derive(Debug)]
pub struct MarqueeTracker {
    core: ToolCore,
    append: bool,
    marquee: Option<FigureId>,
}

impl Default for MarqueeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MarqueeTracker {
    pub fn new() -> Self {
        Self {
            core: ToolCore::new().with_default_cursor(Cursor::Crosshair),
            append: false,
            marquee: None,
        }
    }

    /// Current marquee in absolute coordinates.
    pub fn marquee_rect(&self) -> Rect {
        Rect::from_points(self.core.start_location(), self.core.location())
    }

    fn show_marquee(&mut self, cx: &mut EditContext<'_>) {
        let abs = self.marquee_rect();
        let figures = cx.viewer.figures_mut();
        match self.marquee {
            Some(fig) => figures.set_absolute_bounds(fig, abs),
            None => {
                let layer = figures.feedback_layer();
                let rel = figures.translate_to_relative(layer, abs);
                self.marquee = Some(figures.add(layer, Figure::new(FigureKind::Marquee, rel), None));
            }
        }
    }

    fn erase_marquee(&mut self, cx: &mut EditContext<'_>) {
        if let Some(fig) = self.marquee.take() {
            cx.viewer.figures_mut().remove(fig);
        }
    }

    fn perform_marquee_selection(&mut self, cx: &mut EditContext<'_>) {
        let viewer = &mut *cx.viewer;
        let found: Vec<_> = viewer
            .find_controllers_in_rect(self.marquee_rect())
            .into_iter()
            .filter(|c| viewer.is_selectable(*c))
            .collect();
        log::debug!("marquee-tracker: {} controllers", found.len());
        if self.append {
            for c in found {
                viewer.append_selection(c);
            }
        } else {
            viewer.set_selection(&found);
        }
    }
}

impl Tool for MarqueeTracker {
    fn core(&self) -> &ToolCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ToolCore {
        &mut self.core
    }

    fn name(&self) -> &'static str {
        "marquee-tracker"
    }

    fn deactivate(&mut self, cx: &mut EditContext<'_>) {
        self.erase_marquee(cx);
        base::deactivate(self, cx);
    }

    fn on_button_down(&mut self, button: u8, cx: &mut EditContext<'_>) -> bool {
        if button != 1 {
            self.core.set_state(ToolState::Invalid);
            self.on_invalid_input(cx);
            return true;
        }
        if self.core.state_transition(ToolState::Initial, ToolState::Drag) {
            let input = self.core.input;
            self.append = input.shift() || input.ctrl();
            if !self.append {
                cx.viewer.deselect_all();
            }
        }
        true
    }

    fn on_drag_started(&mut self, _cx: &mut EditContext<'_>) -> bool {
        self.core
            .state_transition(ToolState::Drag, ToolState::DragInProgress)
    }

    fn on_drag_in_progress(&mut self, cx: &mut EditContext<'_>) -> bool {
        if self.core.is_in_state(ToolState::DragInProgress) {
            self.show_marquee(cx);
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
            self.erase_marquee(cx);
            self.perform_marquee_selection(cx);
        } else {
            self.core.state_transition(ToolState::Drag, ToolState::Terminal);
        }
        true
    }

    fn on_invalid_input(&mut self, cx: &mut EditContext<'_>) -> bool {
        self.erase_marquee(cx);
        true
    }

    fn calculate_cursor(&self) -> Option<Cursor> {
        if self.core.is_in_state(ToolState::Terminal) {
            return None;
        }
        Some(self.core.default_cursor)
    }
}
