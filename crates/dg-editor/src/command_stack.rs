//! Undo/redo ledger.
//!
//! Executed commands are pushed onto the undo stack; undo moves them to
//! the redo stack and back. Executing a new command always discards the
//! redo history. An optional undo limit evicts (and disposes) the oldest
//! entries. The save location marks the undo depth at which the document
//! was last saved; the stack is dirty whenever the depth differs.
//!
//! Listeners hear about every transition through [`CommandStackEvent`]s.
//! Post notifications are delivered even if the command panics.

use std::collections::VecDeque;
use std::fmt;
use std::ops::BitOr;
use std::panic::{self, AssertUnwindSafe};

use crate::command::Command;

/// Event state bits delivered to stack listeners.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackEventState(u8);

impl StackEventState {
    pub const PRE_EXECUTE: Self = Self(1);
    pub const PRE_REDO: Self = Self(2);
    pub const PRE_UNDO: Self = Self(4);
    pub const POST_EXECUTE: Self = Self(8);
    pub const POST_REDO: Self = Self(16);
    pub const POST_UNDO: Self = Self(32);
    /// Generic change with no command attached (save mark, flush).
    pub const CHANGED: Self = Self(64);

    pub const PRE_MASK: Self = Self(1 | 2 | 4);
    pub const POST_MASK: Self = Self(8 | 16 | 32 | 64);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn intersects(self, mask: Self) -> bool {
        self.0 & mask.0 != 0
    }
}

impl BitOr for StackEventState {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for StackEventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::PRE_EXECUTE => "PRE_EXECUTE",
            Self::PRE_REDO => "PRE_REDO",
            Self::PRE_UNDO => "PRE_UNDO",
            Self::POST_EXECUTE => "POST_EXECUTE",
            Self::POST_REDO => "POST_REDO",
            Self::POST_UNDO => "POST_UNDO",
            Self::CHANGED => "CHANGED",
            _ => return write!(f, "StackEventState({:#04x})", self.0),
        };
        f.write_str(name)
    }
}

/// Notification delivered to stack listeners.
pub struct CommandStackEvent<'a> {
    pub state: StackEventState,
    pub command: Option<&'a dyn Command>,
}

impl CommandStackEvent<'_> {
    pub fn is_pre(&self) -> bool {
        self.state.intersects(StackEventState::PRE_MASK)
    }

    pub fn is_post(&self) -> bool {
        self.state.intersects(StackEventState::POST_MASK)
    }
}

/// Token returned by [`CommandStack::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&CommandStackEvent<'_>)>;

/// Save location value meaning "never clean again".
const INVALID_SAVE: i64 = -1;

pub struct CommandStack {
    /// Oldest first; eviction pops from the front.
    undoable: VecDeque<Box<dyn Command>>,
    redoable: Vec<Box<dyn Command>>,
    undo_limit: usize,
    save_location: i64,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandStack")
            .field("undoable", &self.undoable)
            .field("redoable", &self.redoable)
            .field("undo_limit", &self.undo_limit)
            .field("save_location", &self.save_location)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl CommandStack {
    pub fn new() -> Self {
        Self {
            undoable: VecDeque::new(),
            redoable: Vec::new(),
            undo_limit: 0,
            save_location: 0,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn with_undo_limit(limit: usize) -> Self {
        Self {
            undo_limit: limit,
            ..Self::new()
        }
    }

    pub fn undo_limit(&self) -> usize {
        self.undo_limit
    }

    /// 0 means unlimited. Takes effect on the next execute.
    pub fn set_undo_limit(&mut self, limit: usize) {
        self.undo_limit = limit;
    }

    // ─── Listeners ───────────────────────────────────────────────────────

    pub fn add_listener(&mut self, f: impl FnMut(&CommandStackEvent<'_>) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(f)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, state: StackEventState, command: Option<&dyn Command>) {
        let event = CommandStackEvent { state, command };
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    // ─── Operations ──────────────────────────────────────────────────────

    /// Execute `command` and record it. Commands that cannot execute are
    /// dropped silently.
    pub fn execute(&mut self, mut command: Box<dyn Command>) {
        if !command.can_execute() {
            log::trace!("not executing {:?}: cannot execute", command.label());
            return;
        }
        self.flush_redo();
        self.notify(StackEventState::PRE_EXECUTE, Some(command.as_ref()));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| command.execute()));
        if outcome.is_ok() {
            log::debug!("executed {}", command.label().unwrap_or("command"));
            if self.undo_limit > 0 {
                while self.undoable.len() >= self.undo_limit {
                    let Some(mut evicted) = self.undoable.pop_front() else {
                        break;
                    };
                    evicted.dispose();
                    if self.save_location > INVALID_SAVE {
                        self.save_location -= 1;
                    }
                }
            }
            // The save point was somewhere in the flushed redo history.
            if self.save_location > self.undoable.len() as i64 {
                self.save_location = INVALID_SAVE;
            }
            self.undoable.push_back(command);
            self.notify_post(StackEventState::POST_EXECUTE);
        } else {
            self.notify(StackEventState::POST_EXECUTE, Some(command.as_ref()));
        }
        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }
    }

    /// Undo the most recent command. Does nothing when [`can_undo`] is false.
    ///
    /// [`can_undo`]: Self::can_undo
    pub fn undo(&mut self) {
        if !self.can_undo() {
            log::warn!("undo requested with nothing undoable");
            return;
        }
        let Some(mut command) = self.undoable.pop_back() else {
            return;
        };
        self.notify(StackEventState::PRE_UNDO, Some(command.as_ref()));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| command.undo()));
        log::debug!("undid {}", command.label().unwrap_or("command"));
        match outcome {
            Ok(()) => {
                self.redoable.push(command);
                self.notify_post_redoable(StackEventState::POST_UNDO);
            }
            Err(payload) => {
                self.notify(StackEventState::POST_UNDO, Some(command.as_ref()));
                panic::resume_unwind(payload);
            }
        }
    }

    /// Redo the most recently undone command; no-op when there is none.
    pub fn redo(&mut self) {
        let Some(mut command) = self.redoable.pop() else {
            log::warn!("redo requested with nothing redoable");
            return;
        };
        self.notify(StackEventState::PRE_REDO, Some(command.as_ref()));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| command.redo()));
        log::debug!("redid {}", command.label().unwrap_or("command"));
        match outcome {
            Ok(()) => {
                self.undoable.push_back(command);
                self.notify_post(StackEventState::POST_REDO);
            }
            Err(payload) => {
                self.notify(StackEventState::POST_REDO, Some(command.as_ref()));
                panic::resume_unwind(payload);
            }
        }
    }

    /// Post notification for the command now on top of the undo stack.
    fn notify_post(&mut self, state: StackEventState) {
        let Self {
            undoable,
            listeners,
            ..
        } = self;
        let event = CommandStackEvent {
            state,
            command: undoable.back().map(|c| c.as_ref()),
        };
        for (_, listener) in listeners.iter_mut() {
            listener(&event);
        }
    }

    /// Post notification for the command now on top of the redo stack.
    fn notify_post_redoable(&mut self, state: StackEventState) {
        let Self {
            redoable,
            listeners,
            ..
        } = self;
        let event = CommandStackEvent {
            state,
            command: redoable.last().map(|c| c.as_ref()),
        };
        for (_, listener) in listeners.iter_mut() {
            listener(&event);
        }
    }

    pub fn can_undo(&self) -> bool {
        self.undoable.back().is_some_and(|c| c.can_undo())
    }

    pub fn can_redo(&self) -> bool {
        !self.redoable.is_empty()
    }

    pub fn undo_command(&self) -> Option<&dyn Command> {
        self.undoable.back().map(|c| c.as_ref())
    }

    pub fn redo_command(&self) -> Option<&dyn Command> {
        self.redoable.last().map(|c| c.as_ref())
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo_command().and_then(|c| c.label())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo_command().and_then(|c| c.label())
    }

    /// Undo history oldest first, followed by the redo history in the
    /// order it would be redone.
    pub fn commands(&self) -> Vec<&dyn Command> {
        self.undoable
            .iter()
            .chain(self.redoable.iter().rev())
            .map(|c| c.as_ref())
            .collect()
    }

    pub fn undo_depth(&self) -> usize {
        self.undoable.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redoable.len()
    }

    // ─── Save location ───────────────────────────────────────────────────

    pub fn is_dirty(&self) -> bool {
        self.undoable.len() as i64 != self.save_location
    }

    pub fn mark_save_location(&mut self) {
        self.save_location = self.undoable.len() as i64;
        self.notify(StackEventState::CHANGED, None);
    }

    // ─── Teardown ────────────────────────────────────────────────────────

    fn flush_redo(&mut self) {
        for mut c in self.redoable.drain(..) {
            c.dispose();
        }
    }

    fn flush_undo(&mut self) {
        for mut c in self.undoable.drain(..) {
            c.dispose();
        }
    }

    /// Dispose every command and forget all history.
    pub fn flush(&mut self) {
        self.flush_redo();
        self.flush_undo();
        self.save_location = 0;
        self.notify(StackEventState::CHANGED, None);
    }

    /// Same as [`flush`](Self::flush); called when the owning domain goes away.
    pub fn dispose(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::{Journal, Recording};
    use crate::command::{CompoundCommand, unexecutable};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn labels(stack: &CommandStack) -> Vec<String> {
        stack
            .commands()
            .iter()
            .map(|c| c.label().unwrap_or("?").to_string())
            .collect()
    }

    #[test]
    fn bounded_history_evicts_oldest() {
        let j = Journal::default();
        let mut stack = CommandStack::with_undo_limit(2);
        for name in ["c1", "c2", "c3"] {
            stack.execute(Recording::boxed(name, &j));
        }
        assert_eq!(labels(&stack), vec!["c2", "c3"]);
        assert!(j.borrow().contains(&"dispose c1".to_string()));
        assert!(stack.can_undo());
        assert_eq!(stack.undo_label(), Some("c3"));
    }

    #[test]
    fn long_runs_keep_only_the_newest_in_order() {
        let j = Journal::default();
        let mut stack = CommandStack::with_undo_limit(3);
        let names = ["c0", "c1", "c2", "c3", "c4", "c5", "c6", "c7", "c8", "c9"];
        for name in names {
            stack.execute(Recording::boxed(name, &j));
        }
        assert_eq!(labels(&stack), vec!["c7", "c8", "c9"]);
        let disposed: Vec<String> = j
            .borrow()
            .iter()
            .filter_map(|e| e.strip_prefix("dispose ").map(str::to_string))
            .collect();
        assert_eq!(disposed, names[..7].to_vec());

        for _ in 0..3 {
            stack.undo();
        }
        assert!(!stack.can_undo());
        assert_eq!(stack.redo_label(), Some("c7"));
    }

    #[test]
    fn undo_then_redo_restores_history() {
        let j = Journal::default();
        let mut stack = CommandStack::new();
        for name in ["a", "b", "c"] {
            stack.execute(Recording::boxed(name, &j));
        }
        let before = labels(&stack);
        for _ in 0..3 {
            stack.undo();
        }
        assert_eq!(stack.undo_depth(), 0);
        for _ in 0..3 {
            stack.redo();
        }
        assert_eq!(labels(&stack), before);
        assert_eq!(stack.undo_depth(), 3);
        assert_eq!(stack.redo_depth(), 0);
    }

    #[test]
    fn execute_flushes_redo() {
        let j = Journal::default();
        let mut stack = CommandStack::new();
        stack.execute(Recording::boxed("a", &j));
        stack.execute(Recording::boxed("b", &j));
        stack.undo();
        stack.undo();
        assert!(stack.can_redo());
        stack.execute(Recording::boxed("c", &j));
        assert!(!stack.can_redo());
        let log = j.borrow();
        assert!(log.contains(&"dispose a".to_string()));
        assert!(log.contains(&"dispose b".to_string()));
    }

    #[test]
    fn dirty_tracks_save_location() {
        let j = Journal::default();
        let mut stack = CommandStack::new();
        stack.execute(Recording::boxed("a", &j));
        stack.mark_save_location();
        assert!(!stack.is_dirty());
        stack.execute(Recording::boxed("b", &j));
        assert!(stack.is_dirty());
        stack.undo();
        assert!(!stack.is_dirty());
        stack.undo();
        assert!(stack.is_dirty());
        stack.redo();
        assert!(!stack.is_dirty());
    }

    #[test]
    fn save_point_in_flushed_redo_is_lost() {
        let j = Journal::default();
        let mut stack = CommandStack::new();
        stack.execute(Recording::boxed("a", &j));
        stack.execute(Recording::boxed("b", &j));
        stack.mark_save_location();
        stack.undo();
        stack.undo();
        stack.execute(Recording::boxed("c", &j));
        assert!(stack.is_dirty());
        stack.undo();
        assert!(stack.is_dirty());
    }

    #[test]
    fn evicting_the_save_point_is_permanent() {
        let j = Journal::default();
        let mut stack = CommandStack::with_undo_limit(2);
        stack.mark_save_location();
        for name in ["a", "b", "c"] {
            stack.execute(Recording::boxed(name, &j));
        }
        assert_eq!(stack.undo_depth(), 2);
        stack.undo();
        stack.undo();
        assert!(!stack.can_undo());
        assert!(stack.is_dirty());
    }

    #[test]
    fn rejected_commands_are_ignored() {
        let j = Journal::default();
        let mut stack = CommandStack::new();
        stack.execute(unexecutable());
        stack.execute(CompoundCommand::new().unwrap());
        stack.execute(Recording::rejected("nope", &j));
        assert_eq!(stack.undo_depth(), 0);
        assert!(j.borrow().is_empty());
    }

    #[test]
    fn undo_with_empty_stack_is_a_no_op() {
        let mut stack = CommandStack::new();
        stack.undo();
        stack.redo();
        assert!(!stack.is_dirty());
    }

    #[test]
    fn listeners_see_pre_and_post() {
        let j = Journal::default();
        let seen: Rc<RefCell<Vec<(StackEventState, Option<String>)>>> = Rc::default();
        let mut stack = CommandStack::new();
        let sink = seen.clone();
        let id = stack.add_listener(move |e| {
            sink.borrow_mut()
                .push((e.state, e.command.and_then(|c| c.label()).map(str::to_string)));
        });
        stack.execute(Recording::boxed("a", &j));
        stack.undo();
        stack.redo();
        stack.mark_save_location();
        assert_eq!(
            *seen.borrow(),
            vec![
                (StackEventState::PRE_EXECUTE, Some("a".into())),
                (StackEventState::POST_EXECUTE, Some("a".into())),
                (StackEventState::PRE_UNDO, Some("a".into())),
                (StackEventState::POST_UNDO, Some("a".into())),
                (StackEventState::PRE_REDO, Some("a".into())),
                (StackEventState::POST_REDO, Some("a".into())),
                (StackEventState::CHANGED, None),
            ]
        );
        assert!(stack.remove_listener(id));
        stack.execute(Recording::boxed("b", &j));
        assert_eq!(seen.borrow().len(), 7);
    }

    #[derive(Debug)]
    struct Exploding;

    impl Command for Exploding {
        fn execute(&mut self) {
            panic!("boom");
        }
    }

    #[test]
    fn post_execute_fires_when_execute_panics() {
        let posts = Rc::new(RefCell::new(0));
        let mut stack = CommandStack::new();
        let counter = posts.clone();
        stack.add_listener(move |e| {
            if e.state == StackEventState::POST_EXECUTE {
                *counter.borrow_mut() += 1;
            }
        });
        let result = panic::catch_unwind(AssertUnwindSafe(|| stack.execute(Box::new(Exploding))));
        assert!(result.is_err());
        assert_eq!(*posts.borrow(), 1);
        assert_eq!(stack.undo_depth(), 0);
    }

    #[test]
    fn flush_disposes_everything() {
        let j = Journal::default();
        let mut stack = CommandStack::new();
        stack.execute(Recording::boxed("a", &j));
        stack.execute(Recording::boxed("b", &j));
        stack.undo();
        stack.flush();
        assert_eq!(stack.undo_depth() + stack.redo_depth(), 0);
        assert!(!stack.is_dirty());
        let log = j.borrow();
        assert!(log.contains(&"dispose a".to_string()));
        assert!(log.contains(&"dispose b".to_string()));
    }
}
