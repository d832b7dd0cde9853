//! Target tracking shared by tools that drop onto something: the target
//! controller under the pointer, its request, target feedback, and
//! viewport autoexpose.

use dg_core::Insets;
use dg_render::FigureTree;
use kurbo::{Point, Rect, Vec2};

use super::{EditContext, Tool};
use crate::config::EditorConfig;
use crate::controller::ControllerId;
use crate::domain::Deferred;
use crate::request::Request;
use crate::viewer::Viewer;

#[derive(Debug)]
pub struct Targeting {
    target: Option<ControllerId>,
    request: Request,
    locked: bool,
    showing_feedback: bool,
    exclusions: Option<Vec<ControllerId>>,
    autoexpose: Option<ViewportAutoexposeHelper>,
}

impl Targeting {
    pub fn new(request: Request) -> Self {
        Self {
            target: None,
            request,
            locked: false,
            showing_feedback: false,
            exclusions: None,
            autoexpose: None,
        }
    }

    pub fn target(&self) -> Option<ControllerId> {
        self.target
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_autoexposing(&self) -> bool {
        self.autoexpose.is_some()
    }
}

pub trait TargetingTool: Tool {
    fn targeting(&self) -> &Targeting;
    fn targeting_mut(&mut self) -> &mut Targeting;

    fn create_target_request(&self) -> Request;

    /// Sync the target request with the current input.
    fn update_target_request(&mut self, _cx: &mut EditContext<'_>) {
        let input = self.core().input;
        let req = self.targeting_mut().request_mut();
        req.location = Some(input.location);
        req.modifiers = input.modifiers;
    }

    /// Controllers the target search must skip.
    fn create_exclusion_set(&self, _cx: &EditContext<'_>) -> Vec<ControllerId> {
        Vec::new()
    }

    fn on_enter_target(&mut self, cx: &mut EditContext<'_>) {
        self.update_target_request(cx);
        self.show_target_feedback(cx);
    }

    fn on_leave_target(&mut self, cx: &mut EditContext<'_>) {
        self.erase_target_feedback(cx);
    }

    /// The viewport scrolled under a stationary pointer.
    fn on_autoexpose(&mut self, _cx: &mut EditContext<'_>) {}

    fn show_target_feedback(&mut self, cx: &mut EditContext<'_>) {
        show_target_feedback(self, cx);
    }

    fn erase_target_feedback(&mut self, cx: &mut EditContext<'_>) {
        erase_target_feedback(self, cx);
    }
}

pub fn show_target_feedback<T: TargetingTool + ?Sized>(tool: &mut T, cx: &mut EditContext<'_>) {
    let t = tool.targeting_mut();
    if let Some(target) = t.target {
        cx.viewer.show_target_feedback(target, &t.request);
    }
    t.showing_feedback = true;
}

pub fn erase_target_feedback<T: TargetingTool + ?Sized>(tool: &mut T, cx: &mut EditContext<'_>) {
    let t = tool.targeting_mut();
    if !t.showing_feedback {
        return;
    }
    t.showing_feedback = false;
    if let Some(target) = t.target {
        cx.viewer.erase_target_feedback(target, &t.request);
    }
}

pub fn exclusion_set<T: TargetingTool + ?Sized>(tool: &mut T, cx: &EditContext<'_>) -> Vec<ControllerId> {
    if let Some(set) = &tool.targeting().exclusions {
        return set.clone();
    }
    let set = tool.create_exclusion_set(cx);
    tool.targeting_mut().exclusions = Some(set.clone());
    set
}

pub fn set_target<T: TargetingTool + ?Sized>(
    tool: &mut T,
    target: Option<ControllerId>,
    cx: &mut EditContext<'_>,
) {
    if tool.targeting().target == target {
        return;
    }
    if tool.targeting().target.is_some() {
        tool.on_leave_target(cx);
    }
    log::trace!("{}: target {:?} -> {:?}", tool.name(), tool.targeting().target, target);
    tool.targeting_mut().target = target;
    tool.on_enter_target(cx);
}

/// Re-resolve the target under the pointer. Returns true if it changed.
pub fn update_target_under_mouse<T: TargetingTool + ?Sized>(tool: &mut T, cx: &mut EditContext<'_>) -> bool {
    if tool.targeting().locked {
        return false;
    }
    let location = tool.core().location();
    let exclusions = exclusion_set(tool, cx);
    let target = {
        let viewer: &Viewer = cx.viewer;
        let req = tool.targeting().request();
        viewer
            .find_object_at_except(location, &exclusions, |c| viewer.get_target(c, req).is_some())
            .and_then(|c| viewer.get_target(c, req))
    };
    let changed = target != tool.targeting().target;
    set_target(tool, target, cx);
    changed
}

/// Pin the target until [`unlock_target`]; `None` just unlocks.
pub fn lock_target<T: TargetingTool + ?Sized>(
    tool: &mut T,
    target: Option<ControllerId>,
    cx: &mut EditContext<'_>,
) {
    let Some(target) = target else {
        unlock_target(tool);
        return;
    };
    tool.targeting_mut().locked = true;
    set_target(tool, Some(target), cx);
}

pub fn unlock_target<T: TargetingTool + ?Sized>(tool: &mut T) {
    tool.targeting_mut().locked = false;
}

/// Forget target, request and autoexpose state (on deactivation).
pub fn reset<T: TargetingTool + ?Sized>(tool: &mut T, cx: &mut EditContext<'_>) {
    tool.erase_target_feedback(cx);
    let fresh = tool.create_target_request();
    let t = tool.targeting_mut();
    t.target = None;
    t.request = fresh;
    t.locked = false;
    t.exclusions = None;
    t.autoexpose = None;
}

/// Start autoexposing if the pointer sits in the viewport's edge band.
pub fn update_autoexpose<T: TargetingTool + ?Sized>(tool: &mut T, cx: &mut EditContext<'_>) {
    if tool.targeting().autoexpose.is_some() {
        return;
    }
    let helper = ViewportAutoexposeHelper::from_config(cx.config);
    if helper.detect(cx.viewer.figures().viewport_rect(), tool.core().location()) {
        log::trace!("{}: autoexpose armed", tool.name());
        tool.targeting_mut().autoexpose = Some(helper);
        cx.defer(Deferred::Autoexpose(cx.viewer_id));
    }
}

/// One deferred autoexpose step. Re-queues itself while scrolling happens.
pub fn autoexpose_step<T: TargetingTool + ?Sized>(tool: &mut T, cx: &mut EditContext<'_>) -> bool {
    let Some(helper) = tool.targeting().autoexpose else {
        return false;
    };
    let location = tool.core().location();
    if helper.step(cx.viewer.figures_mut(), location) {
        tool.on_autoexpose(cx);
        cx.defer(Deferred::Autoexpose(cx.viewer_id));
        true
    } else {
        tool.targeting_mut().autoexpose = None;
        false
    }
}

/// Scrolls the viewport while the pointer rests within `insets` of its
/// edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportAutoexposeHelper {
    insets: Insets,
    step: f64,
}

impl ViewportAutoexposeHelper {
    pub fn new(inset: f64, step: f64) -> Self {
        Self {
            insets: Insets::uniform(inset),
            step,
        }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.autoexpose_insets, config.autoexpose_step)
    }

    pub fn detect(&self, viewport: Rect, p: Point) -> bool {
        viewport.contains(p) && !self.insets.shrink(viewport).contains(p)
    }

    /// Scroll one step towards the edges `p` is near. False once nothing
    /// moved (pointer left the band, or the content edge was reached).
    pub fn step(&self, figures: &mut FigureTree, p: Point) -> bool {
        let viewport = figures.viewport_rect();
        if !self.detect(viewport, p) {
            return false;
        }
        let inner = self.insets.shrink(viewport);
        let axis = |v: f64, lo: f64, hi: f64| {
            if v < lo {
                -self.step
            } else if v >= hi {
                self.step
            } else {
                0.0
            }
        };
        let delta = Vec2::new(axis(p.x, inner.x0, inner.x1), axis(p.y, inner.y0, inner.y1));
        figures.scroll_by(delta) != Vec2::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_render::{Figure, FigureKind};
    use kurbo::Size;

    #[test]
    fn detects_only_the_edge_band() {
        let h = ViewportAutoexposeHelper::new(18.0, 10.0);
        let vp = Rect::new(0.0, 0.0, 400.0, 300.0);
        assert!(h.detect(vp, Point::new(395.0, 150.0)));
        assert!(h.detect(vp, Point::new(5.0, 5.0)));
        assert!(!h.detect(vp, Point::new(200.0, 150.0)));
        assert!(!h.detect(vp, Point::new(450.0, 150.0)));
    }

    #[test]
    fn steps_until_content_edge() {
        let mut figures = FigureTree::new(Size::new(400.0, 300.0));
        let layer = figures.primary_layer();
        figures.add(layer, Figure::new(FigureKind::Rect, Rect::new(0.0, 0.0, 425.0, 100.0)), None);
        let h = ViewportAutoexposeHelper::new(18.0, 10.0);
        let p = Point::new(395.0, 150.0);
        assert!(h.step(&mut figures, p));
        assert!(h.step(&mut figures, p));
        assert!(h.step(&mut figures, p));
        assert_eq!(figures.scroll(), Vec2::new(25.0, 0.0));
        assert!(!h.step(&mut figures, p));
    }
}
