//! Keyboard bindings that apply while no drag is in progress.
//!
//! Maps key + modifier combos to [`KeyAction`]s. Custom bindings are
//! checked before the built-in table, so hosts can rebind or add keys.

use crate::controller::ControllerId;
use crate::input::{KeyEvent, Modifiers};
use crate::viewer::Viewer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Undo,
    Redo,
    SelectAll,
    Deselect,
    /// Next sibling of the primary selection.
    SelectNext,
    SelectPrevious,
    SelectParent,
    SelectFirstChild,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    key: String,
    modifiers: Modifiers,
    action: KeyAction,
}

#[derive(Debug, Clone, Default)]
pub struct KeyHandler {
    bindings: Vec<Binding>,
}

impl KeyHandler {
    /// Bind `key` (a `KeyboardEvent.key` value) with exactly `modifiers`.
    pub fn bind(&mut self, key: impl Into<String>, modifiers: Modifiers, action: KeyAction) {
        let key = key.into();
        self.bindings.retain(|b| !(b.key == key && b.modifiers == modifiers));
        self.bindings.push(Binding { key, modifiers, action });
    }

    pub fn resolve(&self, ev: &KeyEvent) -> Option<KeyAction> {
        self.bindings
            .iter()
            .find(|b| b.key == ev.key && b.modifiers == ev.modifiers)
            .map(|b| b.action)
            .or_else(|| Self::builtin(&ev.key, ev.modifiers))
    }

    /// Platform-neutral defaults: `ctrl` and `meta` both act as command.
    fn builtin(key: &str, m: Modifiers) -> Option<KeyAction> {
        let cmd = m.ctrl || m.meta;

        if cmd && m.shift {
            return match key {
                "z" | "Z" => Some(KeyAction::Redo),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" | "Z" => Some(KeyAction::Undo),
                "y" | "Y" => Some(KeyAction::Redo),
                "a" | "A" => Some(KeyAction::SelectAll),
                _ => None,
            };
        }

        if m.alt {
            return match key {
                "ArrowUp" => Some(KeyAction::SelectParent),
                "ArrowDown" => Some(KeyAction::SelectFirstChild),
                _ => None,
            };
        }

        if m.shift {
            return None;
        }

        match key {
            "ArrowRight" | "ArrowDown" => Some(KeyAction::SelectNext),
            "ArrowLeft" | "ArrowUp" => Some(KeyAction::SelectPrevious),
            "Escape" => Some(KeyAction::Deselect),
            _ => None,
        }
    }
}

/// Apply a selection action. Returns false for actions that need the
/// command stack (undo, redo) and for navigation with nowhere to go.
pub fn apply_selection_action(action: KeyAction, viewer: &mut Viewer) -> bool {
    let target = match action {
        KeyAction::Undo | KeyAction::Redo => return false,
        KeyAction::SelectAll => {
            viewer.select_all();
            return true;
        }
        KeyAction::Deselect => {
            let had = !viewer.selected().is_empty();
            viewer.deselect_all();
            return had;
        }
        KeyAction::SelectNext => sibling(viewer, 1),
        KeyAction::SelectPrevious => sibling(viewer, -1),
        KeyAction::SelectParent => viewer
            .primary_selection()
            .and_then(|p| viewer.parent_of(p))
            .filter(|p| Some(*p) != viewer.contents()),
        KeyAction::SelectFirstChild => viewer
            .primary_selection()
            .and_then(|p| viewer.children_of(p).into_iter().find(|c| viewer.is_selectable(*c))),
    };
    let Some(target) = target.filter(|t| viewer.is_selectable(*t)) else {
        return false;
    };
    viewer.select(target);
    viewer.reveal(target);
    true
}

fn sibling(viewer: &Viewer, step: isize) -> Option<ControllerId> {
    let Some(primary) = viewer.primary_selection() else {
        let contents = viewer.contents()?;
        return viewer.children_of(contents).into_iter().find(|c| viewer.is_selectable(*c));
    };
    let siblings: Vec<ControllerId> = viewer
        .children_of(viewer.parent_of(primary)?)
        .into_iter()
        .filter(|c| viewer.is_selectable(*c))
        .collect();
    let pos = siblings.iter().position(|c| *c == primary)? as isize;
    let next = pos + step;
    (0..siblings.len() as isize).contains(&next).then(|| siblings[next as usize])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str, m: Modifiers) -> KeyEvent {
        KeyEvent::new(k).with_modifiers(m)
    }

    #[test]
    fn builtin_table() {
        let h = KeyHandler::default();
        assert_eq!(h.resolve(&key("z", Modifiers::CTRL)), Some(KeyAction::Undo));
        assert_eq!(h.resolve(&key("z", Modifiers::META)), Some(KeyAction::Undo));
        assert_eq!(h.resolve(&key("Z", Modifiers::CTRL.with(Modifiers::SHIFT))), Some(KeyAction::Redo));
        assert_eq!(h.resolve(&key("a", Modifiers::META)), Some(KeyAction::SelectAll));
        assert_eq!(h.resolve(&key("ArrowUp", Modifiers::ALT)), Some(KeyAction::SelectParent));
        assert_eq!(h.resolve(&key("ArrowRight", Modifiers::NONE)), Some(KeyAction::SelectNext));
        assert_eq!(h.resolve(&key("q", Modifiers::NONE)), None);
    }

    #[test]
    fn custom_binding_wins() {
        let mut h = KeyHandler::default();
        h.bind("ArrowRight", Modifiers::NONE, KeyAction::SelectFirstChild);
        h.bind("u", Modifiers::NONE, KeyAction::Undo);
        assert_eq!(h.resolve(&key("ArrowRight", Modifiers::NONE)), Some(KeyAction::SelectFirstChild));
        assert_eq!(h.resolve(&key("u", Modifiers::NONE)), Some(KeyAction::Undo));
        assert_eq!(h.resolve(&key("u", Modifiers::SHIFT)), None);
    }
}
