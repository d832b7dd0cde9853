use dg_core::Direction;
use dg_render::{Anchor, Figure, FigureId, FigureKind};
use kurbo::Rect;

use super::{Ability, AbilityContext, FeedbackContext};
use crate::command::Command;
use crate::controller::SelectionState;
use crate::handle::{Handle, HandleKind};
use crate::request::{Request, RequestKind};

/// Outset of the move outline around its owner.
const OUTLINE_OUTSET: f64 = 1.0;

/// Lets the host be dragged: a move outline while selected, a ghost while
/// dragging, and move/orphan/align requests forwarded to the parent's
/// layout as their `*_CHILDREN` counterparts.
#[derive(Debug, Default)]
pub struct MovableAbility {
    handles: Vec<FigureId>,
    ghost: Option<FigureId>,
    resize: bool,
}

impl MovableAbility {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_handles(&mut self, primary: bool, cx: &mut FeedbackContext<'_>) {
        let Some(owner) = cx.host_figure else {
            return;
        };
        let layer = cx.figures.handle_layer();
        let outline = Figure::new(FigureKind::Handle, Rect::ZERO).anchored(Anchor::Outline {
            owner,
            outset: OUTLINE_OUTSET,
        });
        let figure = cx.figures.add(layer, outline, None);
        cx.handles.add(Handle {
            owner: cx.host,
            kind: HandleKind::Move,
            figure,
        });
        self.handles.push(figure);

        if !self.resize {
            return;
        }
        for direction in Direction::HANDLES {
            let mut knob = Figure::new(FigureKind::Handle, Rect::ZERO).anchored(Anchor::Knob {
                owner,
                direction,
                size: cx.config.handle_size,
            });
            knob.emphasized = primary;
            let figure = cx.figures.add(layer, knob, None);
            cx.handles.add(Handle {
                owner: cx.host,
                kind: HandleKind::Resize(direction),
                figure,
            });
            self.handles.push(figure);
        }
    }

    fn remove_handles(&mut self, cx: &mut FeedbackContext<'_>) {
        for figure in self.handles.drain(..) {
            cx.handles.remove(figure);
            cx.discard(Some(figure));
        }
    }

    fn show_ghost(&mut self, req: &Request, cx: &mut FeedbackContext<'_>) {
        let Some(owner) = cx.host_figure else {
            return;
        };
        let abs = req.transformed_rect(cx.figures.absolute_bounds(owner));
        let layer = cx.figures.feedback_layer();
        let rel = cx.figures.translate_to_relative(layer, abs);
        match self.ghost {
            Some(g) if cx.figures.contains(g) => cx.figures.set_bounds(g, rel),
            _ => self.ghost = Some(cx.figures.add(layer, Figure::new(FigureKind::Ghost, rel), None)),
        }
    }

    fn drags(&self, kind: RequestKind) -> bool {
        matches!(kind, RequestKind::Move | RequestKind::Add | RequestKind::Clone)
            || (self.resize && kind == RequestKind::Resize)
    }
}

impl Ability for MovableAbility {
    fn name(&self) -> &'static str {
        if self.resize { "resizable" } else { "movable" }
    }

    fn deactivate(&mut self, cx: &mut FeedbackContext<'_>) {
        self.remove_handles(cx);
        cx.discard(self.ghost.take());
    }

    fn understands(&self, req: &Request, _cx: &AbilityContext<'_>) -> bool {
        match req.kind {
            RequestKind::Move
            | RequestKind::Add
            | RequestKind::Clone
            | RequestKind::Orphan
            | RequestKind::Align => true,
            RequestKind::Resize => self.resize,
            _ => false,
        }
    }

    fn get_command(&self, req: &Request, cx: &AbilityContext<'_>) -> Option<Box<dyn Command>> {
        let kind = match req.kind {
            RequestKind::Move => RequestKind::MoveChildren,
            RequestKind::Orphan => RequestKind::OrphanChildren,
            RequestKind::Align => RequestKind::AlignChildren,
            RequestKind::Resize if self.resize => RequestKind::ResizeChildren,
            _ => return None,
        };
        let parent = cx.parent()?;
        let forwarded = req.retagged(kind).with_controllers(vec![cx.host]);
        cx.viewer.get_command(parent, &forwarded)
    }

    fn show_source_feedback(&mut self, req: &Request, cx: &mut FeedbackContext<'_>) {
        if self.drags(req.kind) {
            self.show_ghost(req, cx);
        }
    }

    fn erase_source_feedback(&mut self, req: &Request, cx: &mut FeedbackContext<'_>) {
        if self.drags(req.kind) {
            cx.discard(self.ghost.take());
        }
    }

    fn selection_changed(&mut self, state: SelectionState, cx: &mut FeedbackContext<'_>) {
        match state {
            SelectionState::None => self.remove_handles(cx),
            SelectionState::Selected | SelectionState::Primary => {
                // Knob emphasis follows primary-ness, so rebuild.
                self.remove_handles(cx);
                self.add_handles(state == SelectionState::Primary, cx);
            }
        }
    }
}

/// [`MovableAbility`] plus eight resize knobs and resize forwarding.
#[derive(Debug)]
pub struct ResizableAbility {
    inner: MovableAbility,
}

impl ResizableAbility {
    pub fn new() -> Self {
        Self {
            inner: MovableAbility {
                resize: true,
                ..MovableAbility::default()
            },
        }
    }
}

impl Default for ResizableAbility {
    fn default() -> Self {
        Self::new()
    }
}

impl Ability for ResizableAbility {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn deactivate(&mut self, cx: &mut FeedbackContext<'_>) {
        self.inner.deactivate(cx);
    }

    fn understands(&self, req: &Request, cx: &AbilityContext<'_>) -> bool {
        self.inner.understands(req, cx)
    }

    fn get_command(&self, req: &Request, cx: &AbilityContext<'_>) -> Option<Box<dyn Command>> {
        self.inner.get_command(req, cx)
    }

    fn show_source_feedback(&mut self, req: &Request, cx: &mut FeedbackContext<'_>) {
        self.inner.show_source_feedback(req, cx);
    }

    fn erase_source_feedback(&mut self, req: &Request, cx: &mut FeedbackContext<'_>) {
        self.inner.erase_source_feedback(req, cx);
    }

    fn selection_changed(&mut self, state: SelectionState, cx: &mut FeedbackContext<'_>) {
        self.inner.selection_changed(state, cx);
    }
}
