pub mod doc;
pub mod error;
pub mod geometry;
pub mod id;
pub mod model;

pub use doc::DiagramDoc;
pub use error::DiagramError;
pub use geometry::*;
pub use id::ModelId;
pub use model::*;

// Re-export petgraph/kurbo types so downstream crates agree on one version
pub use kurbo;
pub use petgraph::graph::NodeIndex;
