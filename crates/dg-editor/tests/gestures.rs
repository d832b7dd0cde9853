//! Integration tests: whole pointer and keyboard gestures driven through
//! the domain, checked against the diagram model.

use dg_core::{Diagram, DiagramHandle, Direction, ModelId};
use dg_editor::diagram::{DiagramControllerFactory, PerformedLog, SetBoundsCommand};
use dg_editor::input::button_mask;
use dg_editor::{
    ControllerId, Cursor, Domain, InputEvent, KeyEvent, Modifiers, MouseEvent, RequestKind, Tool, ViewerId,
};
use kurbo::{Point, Rect, Size, Vec2};
use pretty_assertions::assert_eq;

struct Board {
    domain: Domain,
    viewer: ViewerId,
    diagram: DiagramHandle,
    performed: PerformedLog,
}

fn board_with(read_only: bool) -> Board {
    let _ = env_logger::builder().is_test(true).try_init();
    let diagram = Diagram::from_json(include_str!("fixtures/board.json"))
        .unwrap()
        .into_handle();
    let factory = if read_only {
        DiagramControllerFactory::read_only(diagram.clone())
    } else {
        DiagramControllerFactory::new(diagram.clone())
    };
    let performed = factory.performed();
    let mut domain = Domain::new();
    let viewer = domain.create_viewer(Box::new(factory), Size::new(800.0, 600.0));
    let root = diagram.borrow().root();
    domain.viewer_mut(viewer).unwrap().set_contents(root);
    Board {
        domain,
        viewer,
        diagram,
        performed,
    }
}

fn board() -> Board {
    board_with(false)
}

fn id(name: &str) -> ModelId {
    ModelId::intern(name)
}

impl Board {
    fn send(&mut self, event: InputEvent) {
        self.domain.receive_event(self.viewer, event).unwrap();
    }

    fn press(&mut self, x: f64, y: f64, modifiers: Modifiers) {
        self.send(InputEvent::MouseDown(
            MouseEvent::press(Point::new(x, y), 1).with_modifiers(modifiers),
        ));
    }

    fn drag(&mut self, x: f64, y: f64, modifiers: Modifiers) {
        self.send(InputEvent::MouseMove(
            MouseEvent::moved(Point::new(x, y), 1).with_modifiers(modifiers),
        ));
    }

    fn hover(&mut self, x: f64, y: f64) {
        self.send(InputEvent::MouseMove(MouseEvent::moved(Point::new(x, y), 0)));
    }

    fn release(&mut self, x: f64, y: f64, modifiers: Modifiers) {
        self.send(InputEvent::MouseUp(
            MouseEvent::release(Point::new(x, y), 1).with_modifiers(modifiers),
        ));
    }

    fn click(&mut self, x: f64, y: f64) {
        self.press(x, y, Modifiers::NONE);
        self.release(x, y, Modifiers::NONE);
    }

    fn tap(&mut self, key: &str, modifiers: Modifiers) {
        self.send(InputEvent::KeyDown(KeyEvent::new(key).with_modifiers(modifiers)));
        self.send(InputEvent::KeyUp(KeyEvent::new(key).with_modifiers(modifiers)));
    }

    fn bounds(&self, name: &str) -> Option<Rect> {
        self.diagram.borrow().bounds(id(name))
    }

    fn controller(&self, name: &str) -> ControllerId {
        self.domain
            .viewer(self.viewer)
            .unwrap()
            .controller_for_model(id(name))
            .unwrap()
    }

    fn selected(&self) -> Vec<ControllerId> {
        let mut selected = self.domain.viewer(self.viewer).unwrap().selected().to_vec();
        selected.sort();
        selected
    }
}

// ─── Click and threshold ────────────────────────────────────────────────

#[test]
fn jitter_below_threshold_is_a_click() {
    let mut b = board();
    b.press(450.0, 125.0, Modifiers::NONE);
    b.drag(453.0, 128.0, Modifiers::NONE);
    b.release(453.0, 128.0, Modifiers::NONE);

    assert_eq!(b.bounds("box"), Some(Rect::new(400.0, 100.0, 500.0, 150.0)));
    assert_eq!(b.domain.command_stack().undo_depth(), 0);
    assert_eq!(b.selected(), vec![b.controller("box")]);
}

#[test]
fn hovering_a_resize_knob_shows_its_cursor() {
    let mut b = board();
    b.click(450.0, 125.0);
    b.hover(500.0, 150.0);
    assert_eq!(b.domain.cursor(), Some(Cursor::Resize(Direction::SOUTH_EAST)));
    b.hover(700.0, 500.0);
    assert_eq!(b.domain.cursor(), Some(Cursor::Default));
}

#[test]
fn ctrl_click_toggles_and_shift_click_appends() {
    let mut b = board();
    b.click(450.0, 125.0);
    b.press(430.0, 320.0, Modifiers::SHIFT);
    b.release(430.0, 320.0, Modifiers::SHIFT);
    let mut both = vec![b.controller("box"), b.controller("note")];
    both.sort();
    assert_eq!(b.selected(), both);

    b.press(450.0, 125.0, Modifiers::CTRL);
    b.release(450.0, 125.0, Modifiers::CTRL);
    assert_eq!(b.selected(), vec![b.controller("note")]);

    b.press(450.0, 125.0, Modifiers::CTRL);
    b.release(450.0, 125.0, Modifiers::CTRL);
    assert_eq!(b.selected(), both);
    assert_eq!(b.domain.command_stack().undo_depth(), 0);
}

#[test]
fn right_click_selects_like_a_plain_click() {
    let mut b = board();
    b.click(450.0, 125.0);
    b.send(InputEvent::MouseDown(MouseEvent::press(Point::new(430.0, 320.0), 3)));
    b.send(InputEvent::MouseUp(MouseEvent::release(Point::new(430.0, 320.0), 3)));
    assert_eq!(b.selected(), vec![b.controller("note")]);
}

// ─── Move tracker ───────────────────────────────────────────────────────

#[test]
fn drag_moves_within_the_same_parent() {
    let mut b = board();
    b.press(450.0, 125.0, Modifiers::NONE);
    b.drag(470.0, 135.0, Modifiers::NONE);
    b.drag(480.0, 140.0, Modifiers::NONE);
    b.release(480.0, 140.0, Modifiers::NONE);

    assert_eq!(b.bounds("box"), Some(Rect::new(430.0, 115.0, 530.0, 165.0)));
    let root = b.diagram.borrow().root();
    assert_eq!(b.diagram.borrow().parent_of(id("box")), Some(root));
    assert!(b.domain.command_stack().can_undo());
}

#[test]
fn shift_drag_locks_to_the_dominant_axis() {
    let mut b = board();
    b.press(450.0, 125.0, Modifiers::NONE);
    b.drag(500.0, 135.0, Modifiers::SHIFT);
    b.release(500.0, 135.0, Modifiers::SHIFT);
    assert_eq!(b.bounds("box"), Some(Rect::new(450.0, 100.0, 550.0, 150.0)));
}

#[test]
fn drop_onto_a_group_reparents_and_undo_restores() {
    let mut b = board();
    b.press(450.0, 125.0, Modifiers::NONE);
    b.drag(300.0, 140.0, Modifiers::NONE);
    b.drag(250.0, 150.0, Modifiers::NONE);
    b.release(250.0, 150.0, Modifiers::NONE);

    {
        let d = b.diagram.borrow();
        assert_eq!(d.parent_of(id("box")), Some(id("lane")));
        assert_eq!(d.children(id("lane")), vec![id("task"), id("box")]);
        assert_eq!(d.bounds(id("box")), Some(Rect::new(180.0, 105.0, 280.0, 155.0)));
    }
    // The controller tree followed the model.
    let lane = b.controller("lane");
    let boxed = b.controller("box");
    assert_eq!(b.domain.viewer(b.viewer).unwrap().parent_of(boxed), Some(lane));

    b.domain.undo();
    let d = b.diagram.borrow();
    assert_eq!(d.children(d.root()), vec![id("lane"), id("box"), id("note"), id("far")]);
    assert_eq!(d.bounds(id("box")), Some(Rect::new(400.0, 100.0, 500.0, 150.0)));
}

#[test]
fn alt_drag_clones_into_the_drop_target() {
    let mut b = board();
    b.press(450.0, 125.0, Modifiers::NONE);
    b.drag(450.0, 400.0, Modifiers::ALT);
    b.drag(450.0, 425.0, Modifiers::ALT);
    b.release(450.0, 425.0, Modifiers::ALT);

    let d = b.diagram.borrow();
    let children = d.children(d.root());
    assert_eq!(children.len(), 5);
    let copy = *children.last().unwrap();
    assert!(copy.as_str().starts_with("box_copy"));
    assert_eq!(d.bounds(copy), Some(Rect::new(400.0, 400.0, 500.0, 450.0)));
    assert_eq!(d.shape(copy).unwrap().label, "Box");
    assert_eq!(d.bounds(id("box")), Some(Rect::new(400.0, 100.0, 500.0, 150.0)));
}

#[test]
fn escape_aborts_a_drag_without_a_command() {
    let mut b = board();
    b.press(450.0, 125.0, Modifiers::NONE);
    b.drag(480.0, 140.0, Modifiers::NONE);
    b.send(InputEvent::KeyDown(KeyEvent::new("Escape")));
    b.release(480.0, 140.0, Modifiers::NONE);

    assert_eq!(b.bounds("box"), Some(Rect::new(400.0, 100.0, 500.0, 150.0)));
    assert_eq!(b.domain.command_stack().undo_depth(), 0);
    assert_eq!(b.domain.active_tool().name(), "selection-tool");
}

#[test]
fn second_button_spoils_the_drag_until_every_button_is_up() {
    let mut b = board();
    b.press(450.0, 125.0, Modifiers::NONE);
    b.drag(480.0, 140.0, Modifiers::NONE);
    let both = button_mask(1) | button_mask(3);
    b.send(InputEvent::MouseDown(MouseEvent {
        buttons: both,
        ..MouseEvent::press(Point::new(480.0, 140.0), 3)
    }));
    b.send(InputEvent::MouseUp(MouseEvent {
        buttons: button_mask(1),
        ..MouseEvent::release(Point::new(480.0, 140.0), 3)
    }));
    // Still held: the drag stays dead rather than resuming.
    b.drag(500.0, 160.0, Modifiers::NONE);
    b.release(500.0, 160.0, Modifiers::NONE);

    assert_eq!(b.bounds("box"), Some(Rect::new(400.0, 100.0, 500.0, 150.0)));
    assert_eq!(b.domain.command_stack().undo_depth(), 0);
    assert_eq!(b.domain.active_tool().name(), "selection-tool");

    // The next gesture starts clean.
    b.press(450.0, 125.0, Modifiers::NONE);
    b.drag(470.0, 135.0, Modifiers::NONE);
    b.release(470.0, 135.0, Modifiers::NONE);
    assert_eq!(b.bounds("box"), Some(Rect::new(420.0, 110.0, 520.0, 160.0)));
}

#[test]
fn release_outside_the_canvas_is_recovered_on_the_next_move() {
    let mut b = board();
    b.press(450.0, 125.0, Modifiers::NONE);
    b.drag(480.0, 140.0, Modifiers::NONE);
    // No MouseUp arrives; the next move reports no buttons.
    b.hover(480.0, 140.0);

    assert_eq!(b.bounds("box"), Some(Rect::new(430.0, 115.0, 530.0, 165.0)));
    assert_eq!(b.domain.command_stack().undo_depth(), 1);

    b.hover(600.0, 400.0);
    b.release(600.0, 400.0, Modifiers::NONE);
    assert_eq!(b.bounds("box"), Some(Rect::new(430.0, 115.0, 530.0, 165.0)));
    assert_eq!(b.domain.command_stack().undo_depth(), 1);
}

#[test]
fn losing_focus_mid_drag_aborts_the_gesture() {
    let mut b = board();
    b.press(450.0, 125.0, Modifiers::NONE);
    b.drag(480.0, 140.0, Modifiers::NONE);
    b.send(InputEvent::FocusLost);
    b.release(480.0, 140.0, Modifiers::NONE);

    assert_eq!(b.bounds("box"), Some(Rect::new(400.0, 100.0, 500.0, 150.0)));
    assert_eq!(b.domain.command_stack().undo_depth(), 0);

    b.click(430.0, 320.0);
    assert_eq!(b.selected(), vec![b.controller("note")]);
}

#[test]
fn a_command_run_underneath_a_drag_invalidates_it() {
    let mut b = board();
    b.press(450.0, 125.0, Modifiers::NONE);
    b.drag(480.0, 140.0, Modifiers::NONE);

    let moved_note = Rect::new(420.0, 320.0, 480.0, 360.0);
    b.domain
        .command_stack_mut()
        .execute(Box::new(SetBoundsCommand::new(b.diagram.clone(), id("note"), moved_note)));

    b.drag(500.0, 160.0, Modifiers::NONE);
    b.release(500.0, 160.0, Modifiers::NONE);

    assert_eq!(b.bounds("box"), Some(Rect::new(400.0, 100.0, 500.0, 150.0)));
    assert_eq!(b.bounds("note"), Some(moved_note));
    assert_eq!(b.domain.command_stack().undo_depth(), 1);
}

#[test]
fn dragging_a_group_over_its_own_child_keeps_it_in_place_in_the_tree() {
    let mut b = board();
    // Inside the lane, clear of the task.
    b.press(25.0, 25.0, Modifiers::NONE);
    b.drag(40.0, 35.0, Modifiers::NONE);
    // Over the task, which moves along with the lane.
    b.drag(60.0, 50.0, Modifiers::NONE);
    b.release(60.0, 50.0, Modifiers::NONE);

    let d = b.diagram.borrow();
    assert_eq!(d.parent_of(id("lane")), Some(d.root()));
    assert_eq!(d.children(id("lane")), vec![id("task")]);
    assert_eq!(d.bounds(id("lane")), Some(Rect::new(55.0, 45.0, 355.0, 245.0)));
    assert_eq!(d.bounds(id("task")), Some(Rect::new(10.0, 10.0, 90.0, 50.0)));
}

// ─── Undo / redo ────────────────────────────────────────────────────────

#[test]
fn keyboard_undo_and_redo_follow_a_move() {
    let mut b = board();
    b.press(450.0, 125.0, Modifiers::NONE);
    b.drag(470.0, 145.0, Modifiers::NONE);
    b.release(470.0, 145.0, Modifiers::NONE);
    let moved = Rect::new(420.0, 120.0, 520.0, 170.0);
    assert_eq!(b.bounds("box"), Some(moved));

    b.tap("z", Modifiers::CTRL);
    assert_eq!(b.bounds("box"), Some(Rect::new(400.0, 100.0, 500.0, 150.0)));
    assert!(b.domain.command_stack().can_redo());

    b.tap("z", Modifiers::CTRL.with(Modifiers::SHIFT));
    assert_eq!(b.bounds("box"), Some(moved));
}

// ─── Resize tracker ─────────────────────────────────────────────────────

#[test]
fn south_east_knob_resizes_from_the_corner() {
    let mut b = board();
    b.click(450.0, 125.0);
    b.press(500.0, 150.0, Modifiers::NONE);
    b.drag(530.0, 170.0, Modifiers::NONE);
    b.release(530.0, 170.0, Modifiers::NONE);
    assert_eq!(b.bounds("box"), Some(Rect::new(400.0, 100.0, 530.0, 170.0)));
}

#[test]
fn west_knob_dragged_past_the_east_edge_stops_at_min_size() {
    let mut b = board();
    b.click(450.0, 125.0);
    b.press(400.0, 125.0, Modifiers::NONE);
    b.drag(560.0, 125.0, Modifiers::NONE);
    b.release(560.0, 125.0, Modifiers::NONE);
    // The east edge stays anchored; the shape never flips.
    assert_eq!(b.bounds("box"), Some(Rect::new(499.0, 100.0, 500.0, 150.0)));
}

#[test]
fn centred_constrained_resize_keeps_aspect_around_the_centre() {
    let mut b = board();
    let both = Modifiers::CTRL.with(Modifiers::SHIFT);
    b.click(450.0, 125.0);
    b.press(500.0, 150.0, both);
    b.drag(520.0, 160.0, both);
    b.release(520.0, 160.0, both);

    let r = b.bounds("box").unwrap();
    assert_eq!(r, Rect::new(380.0, 90.0, 520.0, 160.0));
    assert_eq!(r.center(), Point::new(450.0, 125.0));
    assert_eq!(r.width() / r.height(), 2.0);
}

// ─── Marquee ────────────────────────────────────────────────────────────

#[test]
fn marquee_selects_enclosed_shapes() {
    let mut b = board();
    b.click(40.0, 40.0);
    b.press(700.0, 500.0, Modifiers::NONE);
    b.drag(600.0, 400.0, Modifiers::NONE);
    b.drag(380.0, 80.0, Modifiers::NONE);
    b.release(380.0, 80.0, Modifiers::NONE);

    let mut expected = vec![b.controller("box"), b.controller("note")];
    expected.sort();
    assert_eq!(b.selected(), expected);
    assert_eq!(b.domain.command_stack().undo_depth(), 0);
}

// ─── Autoexpose ─────────────────────────────────────────────────────────

#[test]
fn dragging_into_the_edge_band_scrolls_on_tick() {
    let mut b = board();
    b.press(450.0, 125.0, Modifiers::NONE);
    b.drag(790.0, 300.0, Modifiers::NONE);
    assert!(b.domain.has_pending_work());

    b.domain.tick();
    let scroll = b.domain.viewer(b.viewer).unwrap().figures().scroll();
    assert_eq!(scroll, Vec2::new(10.0, 0.0));

    b.release(790.0, 300.0, Modifiers::NONE);
    // The scrolled distance is added to the drop.
    assert_eq!(b.bounds("box"), Some(Rect::new(750.0, 275.0, 850.0, 325.0)));
}

// ─── Select tracker ─────────────────────────────────────────────────────

#[test]
fn read_only_click_selects_then_direct_edits() {
    let mut b = board_with(true);
    b.click(450.0, 125.0);
    assert_eq!(b.selected(), vec![b.controller("box")]);
    assert!(b.performed.borrow().is_empty());

    b.click(450.0, 125.0);
    b.send(InputEvent::DoubleClick(MouseEvent::press(Point::new(450.0, 125.0), 1)));
    assert_eq!(
        b.performed.borrow().as_slice(),
        &[(id("box"), RequestKind::DirectEdit), (id("box"), RequestKind::Open)]
    );
}

#[test]
fn read_only_drag_changes_nothing() {
    let mut b = board_with(true);
    b.press(450.0, 125.0, Modifiers::NONE);
    b.drag(520.0, 200.0, Modifiers::NONE);
    b.release(520.0, 200.0, Modifiers::NONE);
    assert_eq!(b.bounds("box"), Some(Rect::new(400.0, 100.0, 500.0, 150.0)));
    assert_eq!(b.domain.command_stack().undo_depth(), 0);
}

// ─── Keyboard ───────────────────────────────────────────────────────────

#[test]
fn handle_traversal_then_arrows_move_the_selection() {
    let mut b = board();
    b.click(450.0, 125.0);
    b.tap(".", Modifiers::NONE);
    b.tap("ArrowRight", Modifiers::NONE);
    b.tap("ArrowRight", Modifiers::NONE);
    b.tap("Enter", Modifiers::NONE);

    assert_eq!(b.bounds("box"), Some(Rect::new(402.0, 100.0, 502.0, 150.0)));
    assert_eq!(b.domain.command_stack().undo_depth(), 1);
}

#[test]
fn arrow_keys_walk_siblings_when_idle() {
    let mut b = board();
    b.click(450.0, 125.0);
    b.tap("ArrowRight", Modifiers::NONE);
    assert_eq!(b.selected(), vec![b.controller("note")]);
    b.tap("Escape", Modifiers::NONE);
    assert!(b.selected().is_empty());
}
