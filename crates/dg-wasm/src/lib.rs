//! WASM bridge for DG: exposes the diagram editor to JavaScript.
//!
//! The host page owns a `<canvas>`, forwards DOM pointer, keyboard, wheel
//! and focus events to [`DiagramEditor`], schedules [`DiagramEditor::tick`]
//! with a zero-delay timer whenever a handler reports pending work, and
//! calls [`DiagramEditor::render`] after each tick.

#[cfg(target_arch = "wasm32")]
mod console;
mod render2d;

use dg_core::{Diagram, DiagramHandle};
use dg_editor::diagram::DiagramControllerFactory;
use dg_editor::{
    Domain, EditorConfig, EditorError, InputEvent, KeyEvent, Modifiers, MouseEvent, ViewerId,
    WheelEvent,
};
use kurbo::{Point, Size, Vec2};
use wasm_bindgen::prelude::*;
use web_sys::CanvasRenderingContext2d;

/// The WASM-facing editor.
///
/// Holds one edit domain with a single viewer over a shared diagram. All
/// interaction from the page goes through this struct.
#[wasm_bindgen]
pub struct DiagramEditor {
    domain: Domain,
    viewer: ViewerId,
    diagram: DiagramHandle,
    width: f64,
    height: f64,
    /// `false` = light (default), `true` = dark.
    dark_mode: bool,
}

#[wasm_bindgen]
impl DiagramEditor {
    /// Create an editor for `doc_json`, optionally with an editor config.
    #[wasm_bindgen(constructor)]
    pub fn new(
        width: f64,
        height: f64,
        doc_json: &str,
        config_json: Option<String>,
    ) -> Result<DiagramEditor, JsValue> {
        console_error_panic_hook_setup();
        #[cfg(target_arch = "wasm32")]
        console::init();
        Self::build(width, height, doc_json, config_json.as_deref()).map_err(to_js)
    }

    // ─── Document ────────────────────────────────────────────────────────

    /// Replace the diagram. Clears undo history and selection.
    pub fn set_document(&mut self, doc_json: &str) -> Result<(), JsValue> {
        self.load_document(doc_json).map_err(to_js)
    }

    /// Current diagram as JSON.
    pub fn get_document(&self) -> Result<String, JsValue> {
        self.diagram.borrow().to_json().map_err(|e| to_js(e.into()))
    }

    pub fn undo(&mut self) -> bool {
        self.domain.undo();
        self.domain.has_pending_work()
    }

    pub fn redo(&mut self) -> bool {
        self.domain.redo();
        self.domain.has_pending_work()
    }

    pub fn can_undo(&self) -> bool {
        self.domain.command_stack().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.domain.command_stack().can_redo()
    }

    /// Whether the diagram changed since the last `mark_saved`.
    pub fn is_dirty(&self) -> bool {
        self.domain.command_stack().is_dirty()
    }

    pub fn mark_saved(&mut self) {
        self.domain.command_stack_mut().mark_save_location();
    }

    // ─── Event transmitter ───────────────────────────────────────────────
    //
    // `button` and `buttons` are the raw DOM `MouseEvent` fields. Every
    // handler returns whether deferred work is pending, i.e. whether the
    // page should schedule a `tick`.

    #[allow(clippy::too_many_arguments)]
    pub fn pointer_down(
        &mut self,
        x: f64,
        y: f64,
        button: i16,
        shift: bool,
        ctrl: bool,
        alt: bool,
        meta: bool,
    ) -> Result<bool, JsValue> {
        let ev = MouseEvent::press(Point::new(x, y), dom_button(button))
            .with_modifiers(modifiers(shift, ctrl, alt, meta));
        self.send(InputEvent::MouseDown(ev))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn pointer_move(
        &mut self,
        x: f64,
        y: f64,
        buttons: u16,
        shift: bool,
        ctrl: bool,
        alt: bool,
        meta: bool,
    ) -> Result<bool, JsValue> {
        let ev = MouseEvent::moved(Point::new(x, y), dom_buttons(buttons))
            .with_modifiers(modifiers(shift, ctrl, alt, meta));
        self.send(InputEvent::MouseMove(ev))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn pointer_up(
        &mut self,
        x: f64,
        y: f64,
        button: i16,
        shift: bool,
        ctrl: bool,
        alt: bool,
        meta: bool,
    ) -> Result<bool, JsValue> {
        let ev = MouseEvent::release(Point::new(x, y), dom_button(button))
            .with_modifiers(modifiers(shift, ctrl, alt, meta));
        self.send(InputEvent::MouseUp(ev))
    }

    pub fn double_click(&mut self, x: f64, y: f64, shift: bool, ctrl: bool, alt: bool, meta: bool) -> Result<bool, JsValue> {
        let ev = MouseEvent::press(Point::new(x, y), 1).with_modifiers(modifiers(shift, ctrl, alt, meta));
        self.send(InputEvent::DoubleClick(ev))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn wheel(
        &mut self,
        x: f64,
        y: f64,
        dx: f64,
        dy: f64,
        shift: bool,
        ctrl: bool,
        alt: bool,
        meta: bool,
    ) -> Result<bool, JsValue> {
        let ev = WheelEvent {
            location: Point::new(x, y),
            delta: Vec2::new(dx, dy),
            modifiers: modifiers(shift, ctrl, alt, meta),
        };
        self.send(InputEvent::Wheel(ev))
    }

    /// `key` is the DOM `KeyboardEvent.key` value.
    pub fn key_down(&mut self, key: &str, shift: bool, ctrl: bool, alt: bool, meta: bool) -> Result<bool, JsValue> {
        let ev = KeyEvent::new(key).with_modifiers(modifiers(shift, ctrl, alt, meta));
        self.send(InputEvent::KeyDown(ev))
    }

    pub fn key_up(&mut self, key: &str, shift: bool, ctrl: bool, alt: bool, meta: bool) -> Result<bool, JsValue> {
        let ev = KeyEvent::new(key).with_modifiers(modifiers(shift, ctrl, alt, meta));
        self.send(InputEvent::KeyUp(ev))
    }

    pub fn focus_lost(&mut self) -> Result<bool, JsValue> {
        self.send(InputEvent::FocusLost)
    }

    pub fn pointer_enter(&mut self, x: f64, y: f64, buttons: u16) -> Result<bool, JsValue> {
        let ev = MouseEvent::moved(Point::new(x, y), dom_buttons(buttons));
        self.send(InputEvent::ViewerEntered(ev))
    }

    pub fn pointer_leave(&mut self, x: f64, y: f64, buttons: u16) -> Result<bool, JsValue> {
        let ev = MouseEvent::moved(Point::new(x, y), dom_buttons(buttons));
        self.send(InputEvent::ViewerExited(ev))
    }

    // ─── Loop ────────────────────────────────────────────────────────────

    /// Run deferred work. Returns `true` if more is queued.
    pub fn tick(&mut self) -> bool {
        let reports = self.domain.tick();
        for (viewer, report) in &reports {
            log::trace!(
                "{viewer:?}: validated {} figure(s), damage {:?}",
                report.validated,
                report.damage
            );
        }
        self.domain.has_pending_work()
    }

    pub fn has_pending_work(&self) -> bool {
        self.domain.has_pending_work()
    }

    // ─── View ────────────────────────────────────────────────────────────

    /// Paint the figure tree to a Canvas2D context.
    pub fn render(&self, ctx: &CanvasRenderingContext2d) {
        let theme = if self.dark_mode {
            render2d::CanvasTheme::dark()
        } else {
            render2d::CanvasTheme::light()
        };
        if let Some(viewer) = self.domain.viewer(self.viewer) {
            render2d::render_figures(ctx, viewer.figures(), self.width, self.height, &theme);
        }
    }

    /// CSS cursor for the active tool.
    pub fn cursor(&self) -> String {
        self.cursor_name().to_string()
    }

    /// Model ids of the selected shapes as a JSON array, primary last.
    pub fn selected_ids(&self) -> String {
        serde_json::to_string(&self.selected_model_ids()).unwrap_or_else(|_| "[]".to_string())
    }

    /// Resize the canvas viewport.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        if let Some(viewer) = self.domain.viewer_mut(self.viewer) {
            viewer.set_viewport_size(Size::new(width, height));
        }
    }

    pub fn set_theme(&mut self, dark: bool) {
        self.dark_mode = dark;
    }
}

// ─── Internal API (no JsValue, usable off-wasm) ──────────────────────────

impl DiagramEditor {
    fn build(width: f64, height: f64, doc_json: &str, config_json: Option<&str>) -> Result<Self, EditorError> {
        let config = match config_json {
            Some(json) => EditorConfig::from_json(json)?,
            None => EditorConfig::default(),
        };
        let diagram = Diagram::from_json(doc_json)?.into_handle();
        let mut domain = Domain::with_config(config);
        let factory = DiagramControllerFactory::new(diagram.clone());
        let viewer = domain.create_viewer(Box::new(factory), Size::new(width, height));
        let root = diagram.borrow().root();
        domain
            .viewer_mut(viewer)
            .ok_or(EditorError::UnknownViewer(viewer))?
            .set_contents(root);
        log::info!("editor ready: {} shape(s), {width}x{height}", diagram.borrow().len());
        Ok(Self {
            domain,
            viewer,
            diagram,
            width,
            height,
            dark_mode: false,
        })
    }

    fn load_document(&mut self, doc_json: &str) -> Result<(), EditorError> {
        let next = Diagram::from_json(doc_json)?;
        let root = next.root();
        // Trackers may hold controllers of the old contents.
        self.domain.load_default_tool();
        self.domain.command_stack_mut().flush();
        *self.diagram.borrow_mut() = next;
        self.domain
            .viewer_mut(self.viewer)
            .ok_or(EditorError::UnknownViewer(self.viewer))?
            .set_contents(root);
        Ok(())
    }

    fn dispatch(&mut self, event: InputEvent) -> Result<bool, EditorError> {
        log::trace!("dom event {}", event.name());
        self.domain.receive_event(self.viewer, event)?;
        Ok(self.domain.has_pending_work())
    }

    fn send(&mut self, event: InputEvent) -> Result<bool, JsValue> {
        self.dispatch(event).map_err(to_js)
    }

    fn cursor_name(&self) -> &'static str {
        self.domain.cursor().map_or("default", |c| c.css_name())
    }

    fn selected_model_ids(&self) -> Vec<String> {
        let Some(viewer) = self.domain.viewer(self.viewer) else {
            return Vec::new();
        };
        viewer
            .selected()
            .iter()
            .filter_map(|c| viewer.model_of(*c))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

fn to_js(err: EditorError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn modifiers(shift: bool, ctrl: bool, alt: bool, meta: bool) -> Modifiers {
    Modifiers { shift, ctrl, alt, meta }
}

/// DOM `MouseEvent.button` (0 left, 1 middle, 2 right) to editor numbering.
fn dom_button(button: i16) -> u8 {
    match button {
        0..=4 => button as u8 + 1,
        _ => 0,
    }
}

/// DOM `MouseEvent.buttons` mask to the editor mask. The DOM puts right
/// at bit 1 and middle at bit 2; the editor orders them by button number.
fn dom_buttons(buttons: u16) -> u8 {
    let bit = |n: u16| buttons & (1 << n) != 0;
    let mut mask = 0u8;
    if bit(0) {
        mask |= 1;
    }
    if bit(2) {
        mask |= 1 << 1;
    }
    if bit(1) {
        mask |= 1 << 2;
    }
    if bit(3) {
        mask |= 1 << 3;
    }
    if bit(4) {
        mask |= 1 << 4;
    }
    mask
}

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("DG WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"{ "id": "root", "kind": "root", "children": [
        { "id": "a", "kind": "rect", "x": 100, "y": 100, "w": 100, "h": 50, "label": "A" },
        { "id": "b", "kind": "ellipse", "x": 300, "y": 100, "w": 60, "h": 40 }
    ] }"#;

    fn editor() -> DiagramEditor {
        DiagramEditor::build(800.0, 600.0, DOC, None).unwrap()
    }

    fn press(ed: &mut DiagramEditor, x: f64, y: f64) {
        ed.dispatch(InputEvent::MouseDown(MouseEvent::press(Point::new(x, y), 1)))
            .unwrap();
    }

    fn drag(ed: &mut DiagramEditor, x: f64, y: f64) {
        ed.dispatch(InputEvent::MouseMove(MouseEvent::moved(Point::new(x, y), 1)))
            .unwrap();
    }

    fn release(ed: &mut DiagramEditor, x: f64, y: f64) {
        ed.dispatch(InputEvent::MouseUp(MouseEvent::release(Point::new(x, y), 1)))
            .unwrap();
    }

    #[test]
    fn dom_buttons_map_to_editor_numbering() {
        assert_eq!(dom_button(0), 1);
        assert_eq!(dom_button(1), 2);
        assert_eq!(dom_button(2), 3);
        assert_eq!(dom_button(-1), 0);
        // left + right held
        assert_eq!(dom_buttons(0b011), 0b101);
        // middle only
        assert_eq!(dom_buttons(0b100), 0b010);
        assert_eq!(dom_buttons(0), 0);
    }

    #[test]
    fn click_selects_and_reports_ids() {
        let mut ed = editor();
        press(&mut ed, 150.0, 125.0);
        release(&mut ed, 150.0, 125.0);
        assert_eq!(ed.selected_model_ids(), vec!["a".to_string()]);
    }

    #[test]
    fn drag_moves_and_document_round_trips() {
        let mut ed = editor();
        press(&mut ed, 150.0, 125.0);
        drag(&mut ed, 170.0, 145.0);
        drag(&mut ed, 190.0, 165.0);
        release(&mut ed, 190.0, 165.0);

        assert!(ed.domain.command_stack().can_undo());
        let json = ed.diagram.borrow().to_json().unwrap();
        let reloaded = Diagram::from_json(&json).unwrap();
        let a = dg_core::ModelId::intern("a");
        assert_eq!(reloaded.bounds(a), Some(kurbo::Rect::new(140.0, 140.0, 240.0, 190.0)));

        ed.domain.undo();
        assert_eq!(
            ed.diagram.borrow().bounds(a),
            Some(kurbo::Rect::new(100.0, 100.0, 200.0, 150.0))
        );
    }

    #[test]
    fn set_document_clears_history() {
        let mut ed = editor();
        press(&mut ed, 150.0, 125.0);
        drag(&mut ed, 190.0, 165.0);
        drag(&mut ed, 200.0, 175.0);
        release(&mut ed, 200.0, 175.0);
        assert!(ed.domain.command_stack().can_undo());

        ed.load_document(r#"{ "id": "root", "kind": "root", "children": [] }"#)
            .unwrap();
        assert!(!ed.domain.command_stack().can_undo());
        assert!(ed.selected_model_ids().is_empty());
        assert_eq!(ed.diagram.borrow().len(), 1);
    }

    #[test]
    fn bad_inputs_are_errors() {
        assert!(DiagramEditor::build(10.0, 10.0, "not json", None).is_err());
        assert!(matches!(
            DiagramEditor::build(10.0, 10.0, DOC, Some("{ \"drag_threshold\": \"x\" }")),
            Err(EditorError::Config(_))
        ));
    }

    #[test]
    fn hover_cursor_follows_the_tool() {
        let mut ed = editor();
        assert_eq!(ed.cursor_name(), "default");
        ed.dispatch(InputEvent::MouseMove(MouseEvent::moved(Point::new(150.0, 125.0), 0)))
            .unwrap();
        let name = ed.cursor_name();
        assert!(!name.is_empty());
    }
}
