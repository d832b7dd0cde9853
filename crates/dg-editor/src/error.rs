use crate::controller::ControllerId;
use crate::viewer::ViewerId;
use dg_core::{DiagramError, ModelId};
use thiserror::Error;

/// Structural misuse of the editor API.
///
/// Gesture-driven paths never return these; they degrade to no-ops.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("unknown viewer {0:?}")]
    UnknownViewer(ViewerId),

    #[error("unknown controller {0:?}")]
    UnknownController(ControllerId),

    #[error("no controller is registered for model {0}")]
    UnknownModel(ModelId),

    #[error("viewer has no contents")]
    MissingContents,

    #[error("invalid editor configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Diagram(#[from] DiagramError),
}
