//! The edit domain: one command stack, the viewers editing through it, and
//! the active tool.

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use dg_render::UpdateReport;
use kurbo::Size;

use crate::command_stack::CommandStack;
use crate::config::EditorConfig;
use crate::controller::ControllerFactory;
use crate::error::EditorError;
use crate::input::InputEvent;
use crate::tool::{Cursor, EditContext, SelectionTool, Tool, base};
use crate::viewer::{Viewer, ViewerId};

/// Zero-delay work queued by tools and run by [`Domain::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    Autoexpose(ViewerId),
}

pub struct Domain {
    stack: CommandStack,
    viewers: Vec<Viewer>,
    default_tool: Box<dyn Tool>,
    override_tool: Option<Box<dyn Tool>>,
    deferred: VecDeque<Deferred>,
    config: EditorConfig,
    stack_changed: Rc<Cell<bool>>,
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("stack", &self.stack)
            .field("viewers", &self.viewers.len())
            .field("active_tool", &self.active_tool().name())
            .field("deferred", &self.deferred)
            .finish_non_exhaustive()
    }
}

impl Default for Domain {
    fn default() -> Self {
        Self::new()
    }
}

impl Domain {
    pub fn new() -> Self {
        Self::with_config(EditorConfig::default())
    }

    pub fn with_config(config: EditorConfig) -> Self {
        let mut stack = CommandStack::with_undo_limit(config.undo_limit);
        let stack_changed = Rc::new(Cell::new(false));
        let flag = stack_changed.clone();
        stack.add_listener(move |ev| {
            if ev.is_post() {
                flag.set(true);
            }
        });
        Self {
            stack,
            viewers: Vec::new(),
            default_tool: Box::new(SelectionTool::new()),
            override_tool: None,
            deferred: VecDeque::new(),
            config,
            stack_changed,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    // ─── Viewers ─────────────────────────────────────────────────────────

    /// Register a viewer. The first one also activates the default tool.
    pub fn add_viewer(&mut self, viewer: Viewer) -> ViewerId {
        let id = ViewerId(self.viewers.len());
        self.viewers.push(viewer);
        if self.viewers.len() == 1 {
            self.activate_tool();
        }
        id
    }

    /// Build and register a viewer that shares this domain's config.
    pub fn create_viewer(&mut self, factory: Box<dyn ControllerFactory>, viewport: Size) -> ViewerId {
        let viewer = Viewer::new(factory, viewport, self.config.clone());
        self.add_viewer(viewer)
    }

    pub fn viewer(&self, id: ViewerId) -> Option<&Viewer> {
        self.viewers.get(id.0)
    }

    pub fn viewer_mut(&mut self, id: ViewerId) -> Option<&mut Viewer> {
        self.viewers.get_mut(id.0)
    }

    pub fn viewer_ids(&self) -> impl Iterator<Item = ViewerId> + '_ {
        (0..self.viewers.len()).map(ViewerId)
    }

    // ─── Command stack ───────────────────────────────────────────────────

    pub fn command_stack(&self) -> &CommandStack {
        &self.stack
    }

    pub fn command_stack_mut(&mut self) -> &mut CommandStack {
        &mut self.stack
    }

    pub fn undo(&mut self) {
        self.stack.undo();
        self.refresh_if_changed();
    }

    pub fn redo(&mut self) {
        self.stack.redo();
        self.refresh_if_changed();
    }

    // ─── Tools ───────────────────────────────────────────────────────────

    pub fn active_tool(&self) -> &dyn Tool {
        match &self.override_tool {
            Some(tool) => tool.as_ref(),
            None => self.default_tool.as_ref(),
        }
    }

    /// Replace the active tool until the next [`load_default_tool`].
    ///
    /// [`load_default_tool`]: Self::load_default_tool
    pub fn set_active_tool(&mut self, tool: Box<dyn Tool>) {
        self.deactivate_tool();
        log::debug!("active tool: {}", tool.name());
        self.override_tool = Some(tool);
        self.activate_tool();
    }

    /// Drop any override and restart the default tool from scratch.
    pub fn load_default_tool(&mut self) {
        self.deactivate_tool();
        self.override_tool = None;
        self.activate_tool();
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.active_tool().cursor()
    }

    fn tool_viewer(&self) -> Option<ViewerId> {
        self.active_tool()
            .core()
            .viewer()
            .filter(|v| v.0 < self.viewers.len())
            .or_else(|| (!self.viewers.is_empty()).then_some(ViewerId(0)))
    }

    fn activate_tool(&mut self) {
        if let Some(viewer) = self.tool_viewer() {
            self.run_tool(viewer, |tool, cx| tool.activate(cx));
        }
    }

    fn deactivate_tool(&mut self) {
        if let Some(viewer) = self.tool_viewer() {
            self.run_tool(viewer, |tool, cx| tool.deactivate(cx));
        }
    }

    /// Run `f` against the active tool with an edit context for `viewer`.
    /// Returns `f`'s result and whether the tool asked to be reloaded.
    fn with_tool<R>(
        &mut self,
        viewer: ViewerId,
        f: impl FnOnce(&mut dyn Tool, &mut EditContext<'_>) -> R,
    ) -> Result<(R, bool), EditorError> {
        let Self {
            stack,
            viewers,
            default_tool,
            override_tool,
            deferred,
            config,
            ..
        } = self;
        let v = viewers.get_mut(viewer.0).ok_or(EditorError::UnknownViewer(viewer))?;
        let tool: &mut dyn Tool = match override_tool {
            Some(tool) => tool.as_mut(),
            None => default_tool.as_mut(),
        };
        let mut cx = EditContext::new(viewer, v, stack, deferred, config);
        let result = f(tool, &mut cx);
        Ok((result, cx.load_default_tool))
    }

    fn run_tool(&mut self, viewer: ViewerId, f: impl FnOnce(&mut dyn Tool, &mut EditContext<'_>)) {
        if let Err(err) = self.with_tool(viewer, f) {
            log::warn!("{err}");
        }
    }

    // ─── Events ──────────────────────────────────────────────────────────

    /// Feed one raw input event from `viewer` to the active tool.
    pub fn receive_event(&mut self, viewer: ViewerId, event: InputEvent) -> Result<(), EditorError> {
        let ((), reload) = self.with_tool(viewer, |tool, cx| base::dispatch(tool, &event, cx))?;
        if reload {
            self.load_default_tool();
        }
        self.refresh_if_changed();
        Ok(())
    }

    /// Rebuild every viewer's controllers after the model changed.
    fn refresh_if_changed(&mut self) {
        if self.stack_changed.replace(false) {
            log::trace!("command stack changed; refreshing {} viewer(s)", self.viewers.len());
            for viewer in &mut self.viewers {
                viewer.refresh_all();
            }
        }
    }

    pub fn has_pending_work(&self) -> bool {
        !self.deferred.is_empty()
            || self
                .viewers
                .iter()
                .any(|v| v.figures().update_manager().is_queued())
    }

    /// Run the work queued since the last tick: one step of every pending
    /// deferred task, then a repaint flush for each viewer that needs one.
    pub fn tick(&mut self) -> Vec<(ViewerId, UpdateReport)> {
        let pending: Vec<Deferred> = self.deferred.drain(..).collect();
        for task in pending {
            log::trace!("running {task:?}");
            match task {
                Deferred::Autoexpose(viewer) => {
                    self.run_tool(viewer, |tool, cx| {
                        tool.autoexpose_tick(cx);
                    });
                }
            }
        }
        self.refresh_if_changed();
        self.viewers
            .iter_mut()
            .enumerate()
            .filter(|(_, v)| v.figures().update_manager().is_queued())
            .map(|(i, v)| (ViewerId(i), v.figures_mut().perform_update()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{KeyEvent, MouseEvent};
    use kurbo::Point;

    #[test]
    fn default_tool_is_the_selection_tool() {
        let domain = Domain::new();
        assert_eq!(domain.active_tool().name(), "selection-tool");
        assert!(!domain.has_pending_work());
    }

    #[test]
    fn events_for_unknown_viewers_are_errors() {
        let mut domain = Domain::new();
        let ev = InputEvent::MouseMove(MouseEvent::moved(Point::new(1.0, 1.0), 0));
        assert!(matches!(
            domain.receive_event(ViewerId(3), ev),
            Err(EditorError::UnknownViewer(ViewerId(3)))
        ));
        let esc = InputEvent::KeyDown(KeyEvent::new("Escape"));
        assert!(domain.receive_event(ViewerId(0), esc).is_err());
    }

    #[test]
    fn undo_on_empty_stack_is_a_no_op() {
        let mut domain = Domain::new();
        domain.undo();
        domain.redo();
        assert_eq!(domain.command_stack().undo_depth(), 0);
        assert!(domain.tick().is_empty());
    }
}
