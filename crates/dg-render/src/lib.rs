//! DG figure tree.
//!
//! The widget layer the editor core draws into: a layered tree of figures
//! with parent-relative bounds, coordinate translation, hit testing, and a
//! coalescing update manager.

pub mod figure;
pub mod hit;
pub mod update;

pub use figure::{Anchor, Figure, FigureId, FigureKind, FigureTree};
pub use update::{UpdateManager, UpdateReport};
