use dg_render::{Anchor, Figure, FigureId, FigureKind};

use super::{Ability, AbilityContext, FeedbackContext};
use crate::controller::SelectionState;
use crate::request::{Request, RequestKind};

const HOVER_OUTSET: f64 = 2.0;

/// Hover highlight and selection emphasis on the host figure.
#[derive(Debug, Default)]
pub struct SelectableAbility {
    hover: Option<FigureId>,
}

impl SelectableAbility {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ability for SelectableAbility {
    fn name(&self) -> &'static str {
        "selectable"
    }

    fn deactivate(&mut self, cx: &mut FeedbackContext<'_>) {
        cx.discard(self.hover.take());
    }

    fn understands(&self, req: &Request, _cx: &AbilityContext<'_>) -> bool {
        matches!(req.kind, RequestKind::Selection | RequestKind::SelectionHover)
    }

    fn show_target_feedback(&mut self, req: &Request, cx: &mut FeedbackContext<'_>) {
        if req.kind != RequestKind::SelectionHover || self.hover.is_some() {
            return;
        }
        let Some(owner) = cx.host_figure else {
            return;
        };
        let layer = cx.figures.feedback_layer();
        let fig = Figure::new(FigureKind::Highlight, kurbo::Rect::ZERO).anchored(Anchor::Outline {
            owner,
            outset: HOVER_OUTSET,
        });
        self.hover = Some(cx.figures.add(layer, fig, None));
    }

    fn erase_target_feedback(&mut self, req: &Request, cx: &mut FeedbackContext<'_>) {
        if req.kind == RequestKind::SelectionHover {
            cx.discard(self.hover.take());
        }
    }

    fn selection_changed(&mut self, state: SelectionState, cx: &mut FeedbackContext<'_>) {
        let Some(fig) = cx.host_figure else {
            return;
        };
        if let Some(f) = cx.figures.get_mut(fig) {
            f.emphasized = state != SelectionState::None;
        }
        cx.figures.invalidate(fig);
    }
}
