//! Commands: undoable units of change.
//!
//! A `Command` mutates the model in `execute()` and reverses exactly that
//! effect in `undo()`. Commands are composed structurally with
//! [`CompoundCommand`]; nothing runs until the stack executes them.
//!
//! A rejected edit is not an error: it is represented by the
//! [`UnexecutableCommand`], which poisons any compound it joins.

use std::fmt;

/// An undoable unit of change to the model.
pub trait Command: fmt::Debug {
    /// Human-readable label for menus ("Move", "Resize", …).
    fn label(&self) -> Option<&str> {
        None
    }

    /// Pure predicate; safe to call repeatedly.
    fn can_execute(&self) -> bool {
        true
    }

    /// Pure predicate; safe to call repeatedly.
    fn can_undo(&self) -> bool {
        true
    }

    fn execute(&mut self);

    fn undo(&mut self) {}

    fn redo(&mut self) {
        self.execute();
    }

    /// Release retained resources. Safe even if never executed.
    fn dispose(&mut self) {}

    /// True only for [`UnexecutableCommand`].
    fn is_unexecutable(&self) -> bool {
        false
    }
}

impl dyn Command {
    /// Compose `self` and `next` into a new compound, without running either.
    pub fn chain(self: Box<Self>, next: Box<dyn Command>) -> CompoundCommand {
        let mut compound = CompoundCommand::new();
        compound.push(self);
        compound.push(next);
        compound
    }
}

// ─── Unexecutable ────────────────────────────────────────────────────────

/// The shared "this cannot be done" command.
///
/// It is a zero-sized constant: boxing it never allocates, and every
/// instance is indistinguishable from [`UNEXECUTABLE`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnexecutableCommand;

/// The unexecutable constant.
pub const UNEXECUTABLE: UnexecutableCommand = UnexecutableCommand;

/// A boxed [`UNEXECUTABLE`].
pub fn unexecutable() -> Box<dyn Command> {
    Box::new(UNEXECUTABLE)
}

impl Command for UnexecutableCommand {
    fn label(&self) -> Option<&str> {
        Some("Unexecutable")
    }

    fn can_execute(&self) -> bool {
        false
    }

    fn can_undo(&self) -> bool {
        false
    }

    fn execute(&mut self) {}

    fn is_unexecutable(&self) -> bool {
        true
    }
}

// ─── Compound ────────────────────────────────────────────────────────────

/// An ordered aggregate. Executable only if non-empty and every child is.
#[derive(Debug, Default)]
pub struct CompoundCommand {
    label: Option<String>,
    commands: Vec<Box<dyn Command>>,
}

impl CompoundCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: Box<dyn Command>) {
        self.commands.push(command);
    }

    /// Add a contribution; `None` is ignored.
    pub fn add(&mut self, command: Option<Box<dyn Command>>) {
        if let Some(c) = command {
            self.commands.push(c);
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Box<dyn Command>] {
        &self.commands
    }

    /// Normalize: no children → [`UNEXECUTABLE`], one child → that child,
    /// otherwise the compound itself.
    pub fn unwrap(mut self) -> Box<dyn Command> {
        match self.commands.len() {
            0 => unexecutable(),
            1 => self.commands.pop().unwrap_or_else(unexecutable),
            _ => Box::new(self),
        }
    }
}

impl Command for CompoundCommand {
    fn label(&self) -> Option<&str> {
        self.label
            .as_deref()
            .or_else(|| self.commands.first().and_then(|c| c.label()))
    }

    fn can_execute(&self) -> bool {
        !self.commands.is_empty() && self.commands.iter().all(|c| c.can_execute())
    }

    fn can_undo(&self) -> bool {
        !self.commands.is_empty() && self.commands.iter().all(|c| c.can_undo())
    }

    fn execute(&mut self) {
        for c in self.commands.iter_mut() {
            c.execute();
        }
    }

    fn undo(&mut self) {
        for c in self.commands.iter_mut().rev() {
            c.undo();
        }
    }

    fn redo(&mut self) {
        for c in self.commands.iter_mut() {
            c.redo();
        }
    }

    fn dispose(&mut self) {
        for c in self.commands.iter_mut() {
            c.dispose();
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Command;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Shared journal that recording commands append to.
    pub type Journal = Rc<RefCell<Vec<String>>>;

    /// A command that records every call into a journal.
    #[derive(Debug)]
    pub struct Recording {
        pub name: &'static str,
        pub executable: bool,
        pub undoable: bool,
        pub journal: Journal,
    }

    impl Recording {
        pub fn boxed(name: &'static str, journal: &Journal) -> Box<dyn Command> {
            Box::new(Self {
                name,
                executable: true,
                undoable: true,
                journal: journal.clone(),
            })
        }

        pub fn rejected(name: &'static str, journal: &Journal) -> Box<dyn Command> {
            Box::new(Self {
                name,
                executable: false,
                undoable: true,
                journal: journal.clone(),
            })
        }

        fn log(&self, what: &str) {
            self.journal.borrow_mut().push(format!("{what} {}", self.name));
        }
    }

    impl Command for Recording {
        fn label(&self) -> Option<&str> {
            Some(self.name)
        }
        fn can_execute(&self) -> bool {
            self.executable
        }
        fn can_undo(&self) -> bool {
            self.undoable
        }
        fn execute(&mut self) {
            self.log("execute");
        }
        fn undo(&mut self) {
            self.log("undo");
        }
        fn redo(&mut self) {
            self.log("redo");
        }
        fn dispose(&mut self) {
            self.log("dispose");
        }
    }
}
