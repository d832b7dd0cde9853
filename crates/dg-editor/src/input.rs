//! Raw input events and the per-tool input snapshot.
//!
//! Mouse buttons are numbered 1 (left), 2 (middle), 3 (right). The
//! `buttons` field of a mouse event is the bitmask of buttons held *after*
//! the event, with button `n` at bit `n - 1`.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Modifier keys held during an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ..Self::NONE
    };
    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        ..Self::NONE
    };
    pub const ALT: Modifiers = Modifiers {
        alt: true,
        ..Self::NONE
    };
    pub const META: Modifiers = Modifiers {
        meta: true,
        ..Self::NONE
    };

    pub fn any(self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }

    #[must_use]
    pub fn with(self, other: Modifiers) -> Modifiers {
        Modifiers {
            shift: self.shift || other.shift,
            ctrl: self.ctrl || other.ctrl,
            alt: self.alt || other.alt,
            meta: self.meta || other.meta,
        }
    }
}

/// Bit for mouse button `button` (1-based) in a `buttons` mask.
pub const fn button_mask(button: u8) -> u8 {
    if button == 0 || button > 8 {
        0
    } else {
        1 << (button - 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseEvent {
    /// Viewer (absolute) coordinates.
    pub location: Point,
    /// The button that changed; 0 for plain moves.
    pub button: u8,
    pub buttons: u8,
    pub modifiers: Modifiers,
}

impl MouseEvent {
    pub fn new(location: Point) -> Self {
        Self {
            location,
            button: 0,
            buttons: 0,
            modifiers: Modifiers::NONE,
        }
    }

    /// A press of `button`; the mask includes it.
    pub fn press(location: Point, button: u8) -> Self {
        Self {
            button,
            buttons: button_mask(button),
            ..Self::new(location)
        }
    }

    /// A release of `button`; the mask no longer includes it.
    pub fn release(location: Point, button: u8) -> Self {
        Self {
            button,
            ..Self::new(location)
        }
    }

    /// A move with `buttons` held.
    pub fn moved(location: Point, buttons: u8) -> Self {
        Self {
            buttons,
            ..Self::new(location)
        }
    }

    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    /// `KeyboardEvent.key` value, e.g. `"Escape"`, `"ArrowLeft"`, `"."`.
    pub key: String,
    /// Modifier state after the event.
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::NONE,
        }
    }

    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn is_escape(&self) -> bool {
        self.key == "Escape"
    }

    pub fn is_enter(&self) -> bool {
        self.key == "Enter"
    }

    /// Unit vector for arrow keys.
    pub fn arrow(&self) -> Option<Vec2> {
        match self.key.as_str() {
            "ArrowUp" => Some(Vec2::new(0.0, -1.0)),
            "ArrowDown" => Some(Vec2::new(0.0, 1.0)),
            "ArrowLeft" => Some(Vec2::new(-1.0, 0.0)),
            "ArrowRight" => Some(Vec2::new(1.0, 0.0)),
            _ => None,
        }
    }

    pub fn is_modifier(&self) -> bool {
        matches!(self.key.as_str(), "Shift" | "Control" | "Alt" | "Meta")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelEvent {
    pub location: Point,
    pub delta: Vec2,
    pub modifiers: Modifiers,
}

/// Everything a viewer can forward to the domain.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    MouseDown(MouseEvent),
    MouseUp(MouseEvent),
    MouseMove(MouseEvent),
    DoubleClick(MouseEvent),
    Wheel(WheelEvent),
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    FocusLost,
    ViewerEntered(MouseEvent),
    ViewerExited(MouseEvent),
    NativeDragStarted(MouseEvent),
    NativeDragFinished(MouseEvent),
}

impl InputEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InputEvent::MouseDown(_) => "mouse_down",
            InputEvent::MouseUp(_) => "mouse_up",
            InputEvent::MouseMove(_) => "mouse_move",
            InputEvent::DoubleClick(_) => "double_click",
            InputEvent::Wheel(_) => "wheel",
            InputEvent::KeyDown(_) => "key_down",
            InputEvent::KeyUp(_) => "key_up",
            InputEvent::FocusLost => "focus_lost",
            InputEvent::ViewerEntered(_) => "viewer_entered",
            InputEvent::ViewerExited(_) => "viewer_exited",
            InputEvent::NativeDragStarted(_) => "native_drag_started",
            InputEvent::NativeDragFinished(_) => "native_drag_finished",
        }
    }
}

/// A tool's view of the input devices, updated before each hook runs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Input {
    pub location: Point,
    pub buttons: u8,
    pub modifiers: Modifiers,
}

impl Input {
    pub fn set_mouse(&mut self, ev: &MouseEvent) {
        self.location = ev.location;
        self.modifiers = ev.modifiers;
    }

    pub fn set_button(&mut self, button: u8, down: bool) {
        if down {
            self.buttons |= button_mask(button);
        } else {
            self.buttons &= !button_mask(button);
        }
    }

    pub fn is_button_down(&self, button: u8) -> bool {
        self.buttons & button_mask(button) != 0
    }

    pub fn any_button_down(&self) -> bool {
        self.buttons != 0
    }

    pub fn shift(&self) -> bool {
        self.modifiers.shift
    }

    pub fn ctrl(&self) -> bool {
        self.modifiers.ctrl
    }

    pub fn alt(&self) -> bool {
        self.modifiers.alt
    }

    pub fn meta(&self) -> bool {
        self.modifiers.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_bits() {
        assert_eq!(button_mask(1), 1);
        assert_eq!(button_mask(3), 4);
        assert_eq!(button_mask(0), 0);
        let mut input = Input::default();
        input.set_button(1, true);
        input.set_button(3, true);
        input.set_button(1, false);
        assert!(!input.is_button_down(1));
        assert!(input.is_button_down(3));
    }

    #[test]
    fn press_includes_button_release_clears_it() {
        assert_eq!(MouseEvent::press(Point::ZERO, 2).buttons, 2);
        assert_eq!(MouseEvent::release(Point::ZERO, 2).buttons, 0);
    }

    #[test]
    fn arrows_are_unit_steps() {
        assert_eq!(KeyEvent::new("ArrowLeft").arrow(), Some(Vec2::new(-1.0, 0.0)));
        assert_eq!(KeyEvent::new("x").arrow(), None);
    }
}
