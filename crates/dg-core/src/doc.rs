//! Serializable document format for diagrams.
//!
//! A diagram is stored as a nested tree of shapes:
//!
//! ```json
//! { "id": "root", "kind": "root", "children": [
//!     { "id": "lane", "kind": "group", "x": 20, "y": 20, "w": 300, "h": 200,
//!       "children": [ { "id": "task", "kind": "rect", "x": 10, "y": 10, "w": 80, "h": 40 } ] }
//! ] }
//! ```

use crate::error::DiagramError;
use crate::id::ModelId;
use crate::model::{Diagram, Shape, ShapeKind};
use kurbo::Rect;
use serde::{Deserialize, Serialize};

/// One shape and its children, as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramDoc {
    pub id: ModelId,
    pub kind: ShapeKind,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub w: f64,
    #[serde(default)]
    pub h: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DiagramDoc>,
}

impl DiagramDoc {
    fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.w, self.y + self.h)
    }
}

impl Diagram {
    /// Build a diagram from a document tree. The document's top node
    /// becomes the root; its own geometry is ignored.
    pub fn from_doc(doc: &DiagramDoc) -> Result<Self, DiagramError> {
        let mut diagram = Diagram::new();
        let root = diagram.root();
        for child in &doc.children {
            add_doc(&mut diagram, root, child)?;
        }
        log::debug!("loaded diagram with {} shapes", diagram.len());
        Ok(diagram)
    }

    pub fn from_json(json: &str) -> Result<Self, DiagramError> {
        let doc: DiagramDoc = serde_json::from_str(json)?;
        Self::from_doc(&doc)
    }

    /// Snapshot the attached tree as a document.
    pub fn to_doc(&self) -> DiagramDoc {
        self.doc_for(self.root())
    }

    pub fn to_json(&self) -> Result<String, DiagramError> {
        Ok(serde_json::to_string_pretty(&self.to_doc())?)
    }

    fn doc_for(&self, id: ModelId) -> DiagramDoc {
        let shape = self.shape(id);
        let bounds = shape.map(|s| s.bounds).unwrap_or_default();
        DiagramDoc {
            id,
            kind: shape.map(|s| s.kind).unwrap_or(ShapeKind::Rect),
            x: bounds.x0,
            y: bounds.y0,
            w: bounds.width(),
            h: bounds.height(),
            label: shape.map(|s| s.label.clone()).unwrap_or_default(),
            children: self.children(id).into_iter().map(|c| self.doc_for(c)).collect(),
        }
    }
}

fn add_doc(diagram: &mut Diagram, parent: ModelId, doc: &DiagramDoc) -> Result<(), DiagramError> {
    let shape = Shape::new(doc.id, doc.kind, doc.bounds()).with_label(doc.label.clone());
    diagram.add_shape(parent, shape)?;
    for child in &doc.children {
        add_doc(diagram, doc.id, child)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "id": "root", "kind": "root",
        "children": [
            { "id": "doc_lane", "kind": "group", "x": 20, "y": 20, "w": 300, "h": 200,
              "children": [
                { "id": "doc_task", "kind": "rect", "x": 10, "y": 10, "w": 80, "h": 40, "label": "Task" }
              ] }
        ]
    }"#;

    #[test]
    fn load_builds_tree() {
        let d = Diagram::from_json(SAMPLE).unwrap();
        let lane = ModelId::intern("doc_lane");
        assert_eq!(d.children(d.root()), vec![lane]);
        assert_eq!(
            d.bounds(ModelId::intern("doc_task")),
            Some(Rect::new(10.0, 10.0, 90.0, 50.0))
        );
        assert_eq!(d.shape(ModelId::intern("doc_task")).unwrap().label, "Task");
    }

    #[test]
    fn snapshot_matches_loaded_document() {
        let d = Diagram::from_json(SAMPLE).unwrap();
        let reloaded = Diagram::from_doc(&d.to_doc()).unwrap();
        assert_eq!(reloaded.to_doc(), d.to_doc());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let json = r#"{ "id": "root", "kind": "root", "children": [
            { "id": "dup_shape", "kind": "rect" }, { "id": "dup_shape", "kind": "rect" } ] }"#;
        assert!(matches!(
            Diagram::from_json(json),
            Err(DiagramError::DuplicateModel(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(Diagram::from_json("{"), Err(DiagramError::Parse(_))));
    }
}
