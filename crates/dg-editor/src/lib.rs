//! DG editor core.
//!
//! Controllers bind diagram model objects to figures and carry pluggable
//! abilities. Tools interpret raw input as requests, ask the abilities for
//! commands, and push those commands onto the shared undo stack.
//!
//! Entry point for hosts is [`Domain::receive_event`]; deferred work
//! (autoexpose polling, repaint flushing) runs from [`Domain::tick`].

pub mod ability;
pub mod command;
pub mod command_stack;
pub mod config;
pub mod controller;
pub mod diagram;
pub mod domain;
pub mod error;
pub mod handle;
pub mod input;
pub mod key_handler;
pub mod request;
pub mod selection;
pub mod snap;
pub mod tool;
pub mod viewer;

pub use ability::{Ability, AbilityContext, AbilityRole, FeedbackContext};
pub use command::{Command, CompoundCommand, UNEXECUTABLE, UnexecutableCommand, unexecutable};
pub use command_stack::{CommandStack, CommandStackEvent, ListenerId, StackEventState};
pub use config::EditorConfig;
pub use controller::{
    Controller, ControllerDelegate, ControllerEvent, ControllerFactory, ControllerId,
    SelectionState,
};
pub use domain::{Deferred, Domain};
pub use error::EditorError;
pub use handle::{Handle, HandleKind};
pub use input::{Input, InputEvent, KeyEvent, Modifiers, MouseEvent, WheelEvent};
pub use key_handler::{KeyAction, KeyHandler};
pub use request::{Request, RequestKind};
pub use tool::{Cursor, EditContext, Tool, ToolCore, ToolState};
pub use viewer::{Viewer, ViewerId};
