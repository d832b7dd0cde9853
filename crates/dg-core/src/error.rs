use crate::id::ModelId;
use thiserror::Error;

/// Structural errors raised by the diagram model.
///
/// Rejected edits never surface here: they travel as unexecutable commands.
#[derive(Debug, Error)]
pub enum DiagramError {
    #[error("unknown model object {0}")]
    UnknownModel(ModelId),

    #[error("model object {0} already exists")]
    DuplicateModel(ModelId),

    #[error("{child} cannot be placed inside its own subtree {parent}")]
    Cycle { parent: ModelId, child: ModelId },

    #[error("the diagram root cannot be moved or removed")]
    RootImmutable,

    #[error("invalid diagram document: {0}")]
    Parse(#[from] serde_json::Error),
}
