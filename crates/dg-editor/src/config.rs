//! Editor tunables.

use kurbo::Size;
use serde::{Deserialize, Serialize};

use crate::error::EditorError;

/// Tunables shared by the domain, its viewers and tools.
///
/// Every field has a default, so hosts may pass a partial JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Pixels the pointer must travel (on either axis) before a press
    /// becomes a drag.
    pub drag_threshold: f64,
    /// Maximum undo depth; 0 keeps everything.
    pub undo_limit: usize,
    /// Snap-grid spacing, when snapping is wanted.
    pub grid: Option<f64>,
    /// Width of the band along the viewport border that triggers autoexpose.
    pub autoexpose_insets: f64,
    /// Scroll distance per autoexpose step.
    pub autoexpose_step: f64,
    /// Upper bound of the keyboard drag step.
    pub accessible_step_max: u32,
    #[serde(with = "size_repr")]
    pub min_size: Size,
    #[serde(with = "size_repr")]
    pub max_size: Size,
    /// Edge length of resize knobs.
    pub handle_size: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 5.0,
            undo_limit: 0,
            grid: None,
            autoexpose_insets: 18.0,
            autoexpose_step: 10.0,
            accessible_step_max: 8,
            min_size: Size::new(1.0, 1.0),
            max_size: Size::new(f64::INFINITY, f64::INFINITY),
            handle_size: 7.0,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// `Size` as `{ "w": .., "h": .. }`; JSON has no infinity, so a missing or
/// null component means unbounded.
mod size_repr {
    use kurbo::Size;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Repr {
        #[serde(default)]
        w: Option<f64>,
        #[serde(default)]
        h: Option<f64>,
    }

    fn finite(v: f64) -> Option<f64> {
        v.is_finite().then_some(v)
    }

    pub fn serialize<S: Serializer>(s: &Size, ser: S) -> Result<S::Ok, S::Error> {
        Repr {
            w: finite(s.width),
            h: finite(s.height),
        }
        .serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Size, D::Error> {
        let r = Repr::deserialize(de)?;
        Ok(Size::new(
            r.w.unwrap_or(f64::INFINITY),
            r.h.unwrap_or(f64::INFINITY),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EditorConfig::from_json(r#"{ "grid": 10, "undo_limit": 3 }"#).unwrap();
        assert_eq!(cfg.grid, Some(10.0));
        assert_eq!(cfg.undo_limit, 3);
        assert_eq!(cfg.drag_threshold, 5.0);
        assert!(cfg.max_size.width.is_infinite());
    }

    #[test]
    fn max_size_component_can_be_bounded() {
        let cfg = EditorConfig::from_json(r#"{ "max_size": { "w": 400 } }"#).unwrap();
        assert_eq!(cfg.max_size.width, 400.0);
        assert!(cfg.max_size.height.is_infinite());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(EditorConfig::from_json("{ nope").is_err());
    }
}
