use dg_core::ModelId;
use dg_render::{Anchor, Figure, FigureId, FigureKind};
use kurbo::Rect;

use super::{Ability, AbilityContext, FeedbackContext};
use crate::command::{Command, CompoundCommand};
use crate::controller::ControllerId;
use crate::request::{Request, RequestKind};

/// Model-side commands a layout ability hands out. Constraints are
/// rectangles in the host's client space.
pub trait LayoutPolicy {
    fn add_command(&self, host: ModelId, child: ModelId, constraint: Rect) -> Option<Box<dyn Command>>;

    fn clone_command(&self, host: ModelId, children: Vec<(ModelId, Rect)>) -> Option<Box<dyn Command>>;

    fn orphan_command(&self, host: ModelId, child: ModelId) -> Option<Box<dyn Command>>;

    fn create_command(&self, _host: ModelId, _req: &Request) -> Option<Box<dyn Command>> {
        None
    }
}

/// A layout whose children carry explicit bounds.
pub trait ConstraintPolicy: LayoutPolicy {
    fn change_constraint_command(&self, child: ModelId, constraint: Rect) -> Option<Box<dyn Command>>;
}

/// Makes the host a drop target: it accepts add/clone/move/create
/// requests, highlights itself while targeted, and releases orphans.
pub struct LayoutAbility<P> {
    policy: P,
    highlight: Option<FigureId>,
}

impl<P: LayoutPolicy> LayoutAbility<P> {
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            highlight: None,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Where `child` lands in the host's client space once `req` applies.
    fn constraint_for(req: &Request, child: ControllerId, cx: &AbilityContext<'_>) -> Option<Rect> {
        let child_fig = cx.viewer.figure_of(child)?;
        let host_fig = cx.figure()?;
        let figures = cx.figures();
        let moved = req.transformed_rect(figures.absolute_bounds(child_fig));
        Some(figures.translate_to_relative(host_fig, moved))
    }

    /// One command per request controller, merged.
    pub(crate) fn per_child(
        req: &Request,
        cx: &AbilityContext<'_>,
        f: impl Fn(ModelId, Rect) -> Option<Box<dyn Command>>,
    ) -> Option<Box<dyn Command>> {
        if req.controllers.is_empty() {
            return None;
        }
        let mut compound = CompoundCommand::new();
        for &child in &req.controllers {
            let Some(model) = cx.viewer.model_of(child) else {
                continue;
            };
            let Some(constraint) = Self::constraint_for(req, child, cx) else {
                continue;
            };
            compound.add(f(model, constraint));
        }
        Some(compound.unwrap())
    }

    fn targets(kind: RequestKind) -> bool {
        matches!(
            kind,
            RequestKind::Add | RequestKind::Clone | RequestKind::Move | RequestKind::Create
        )
    }
}

impl<P: LayoutPolicy> Ability for LayoutAbility<P> {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn deactivate(&mut self, cx: &mut FeedbackContext<'_>) {
        cx.discard(self.highlight.take());
    }

    fn understands(&self, req: &Request, _cx: &AbilityContext<'_>) -> bool {
        Self::targets(req.kind) || req.kind == RequestKind::OrphanChildren
    }

    fn get_command(&self, req: &Request, cx: &AbilityContext<'_>) -> Option<Box<dyn Command>> {
        let host = cx.model()?;
        match req.kind {
            RequestKind::Add => Self::per_child(req, cx, |child, rect| self.policy.add_command(host, child, rect)),
            RequestKind::Clone => {
                let children: Vec<(ModelId, Rect)> = req
                    .controllers
                    .iter()
                    .filter_map(|&c| Some((cx.viewer.model_of(c)?, Self::constraint_for(req, c, cx)?)))
                    .collect();
                if children.is_empty() {
                    return None;
                }
                self.policy.clone_command(host, children)
            }
            RequestKind::OrphanChildren => {
                let mut compound = CompoundCommand::new();
                for &child in &req.controllers {
                    if let Some(model) = cx.viewer.model_of(child) {
                        compound.add(self.policy.orphan_command(host, model));
                    }
                }
                (!compound.is_empty()).then(|| compound.unwrap())
            }
            RequestKind::Create => self.policy.create_command(host, req),
            _ => None,
        }
    }

    fn get_target(&self, req: &Request, cx: &AbilityContext<'_>) -> Option<ControllerId> {
        Self::targets(req.kind).then_some(cx.host)
    }

    fn show_target_feedback(&mut self, req: &Request, cx: &mut FeedbackContext<'_>) {
        if !Self::targets(req.kind) || self.highlight.is_some() {
            return;
        }
        let Some(owner) = cx.host_figure else {
            return;
        };
        let layer = cx.figures.feedback_layer();
        let mut fig = Figure::new(FigureKind::Highlight, Rect::ZERO)
            .anchored(Anchor::Outline { owner, outset: 0.0 });
        fig.emphasized = true;
        self.highlight = Some(cx.figures.add(layer, fig, None));
    }

    fn erase_target_feedback(&mut self, req: &Request, cx: &mut FeedbackContext<'_>) {
        if Self::targets(req.kind) {
            cx.discard(self.highlight.take());
        }
    }
}

/// [`LayoutAbility`] for containers whose children carry explicit bounds:
/// moving, resizing and aligning children become constraint changes.
pub struct ConstrainedLayoutAbility<P> {
    inner: LayoutAbility<P>,
}

impl<P: ConstraintPolicy> ConstrainedLayoutAbility<P> {
    pub fn new(policy: P) -> Self {
        Self {
            inner: LayoutAbility::new(policy),
        }
    }

    pub fn policy(&self) -> &P {
        self.inner.policy()
    }
}

impl<P: ConstraintPolicy> Ability for ConstrainedLayoutAbility<P> {
    fn name(&self) -> &'static str {
        "constrained-layout"
    }

    fn deactivate(&mut self, cx: &mut FeedbackContext<'_>) {
        self.inner.deactivate(cx);
    }

    fn understands(&self, req: &Request, cx: &AbilityContext<'_>) -> bool {
        matches!(
            req.kind,
            RequestKind::MoveChildren | RequestKind::ResizeChildren | RequestKind::AlignChildren
        ) || self.inner.understands(req, cx)
    }

    fn get_command(&self, req: &Request, cx: &AbilityContext<'_>) -> Option<Box<dyn Command>> {
        match req.kind {
            RequestKind::MoveChildren | RequestKind::ResizeChildren | RequestKind::AlignChildren => {
                let policy = self.inner.policy();
                LayoutAbility::<P>::per_child(req, cx, |child, rect| {
                    policy.change_constraint_command(child, rect)
                })
            }
            _ => self.inner.get_command(req, cx),
        }
    }

    fn get_target(&self, req: &Request, cx: &AbilityContext<'_>) -> Option<ControllerId> {
        self.inner.get_target(req, cx)
    }

    fn show_target_feedback(&mut self, req: &Request, cx: &mut FeedbackContext<'_>) {
        self.inner.show_target_feedback(req, cx);
    }

    fn erase_target_feedback(&mut self, req: &Request, cx: &mut FeedbackContext<'_>) {
        self.inner.erase_target_feedback(req, cx);
    }
}
