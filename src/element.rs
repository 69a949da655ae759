//! Visual elements: the flat, loosely-typed records edited on the canvas.
//!
//! This module defines the canvas-boundary schema (`VisualElement`,
//! `ElementKind`, `Binding`) and the JSON codec used when a scene arrives as
//! raw text. Elements are produced by the layout collaborator and by the
//! canvas itself; ids are opaque and owned by whichever surface created them.

use serde::{Deserialize, Serialize};

use crate::dsl::NodeShape;
use crate::error::ErrorCode;

/// The kind of a visual element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Rectangle,
    Diamond,
    /// Alias for [`ElementKind::Diamond`] used by some canvases.
    Rhombus,
    Ellipse,
    /// Alias for [`ElementKind::Ellipse`].
    Circle,
    Arrow,
    Line,
    Text,
    Freedraw,
    Image,
    /// Anything the engine has no mapping for.
    #[serde(other)]
    Unknown,
}

impl ElementKind {
    /// Shape family for node-producing kinds, `None` for everything else.
    #[must_use]
    pub fn node_shape(self) -> Option<NodeShape> {
        match self {
            Self::Rectangle => Some(NodeShape::Rectangle),
            Self::Diamond | Self::Rhombus => Some(NodeShape::Diamond),
            Self::Ellipse | Self::Circle => Some(NodeShape::Oval),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_connector(self) -> bool {
        self == Self::Arrow
    }

    /// Canonical element kind drawn for a node shape.
    #[must_use]
    pub fn for_shape(shape: NodeShape) -> Self {
        match shape {
            NodeShape::Rectangle => Self::Rectangle,
            NodeShape::Diamond => Self::Diamond,
            NodeShape::Oval => Self::Ellipse,
        }
    }
}

/// Weak reference from a connector endpoint to another element's id.
///
/// Accepts either a bare id string or an `{ "elementId": ... }` object on the
/// wire; always serializes as the object form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BindingRepr", into = "BindingRepr")]
pub struct Binding {
    pub element_id: String,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum BindingRepr {
    Id(String),
    Object {
        #[serde(rename = "elementId")]
        element_id: String,
    },
}

impl From<BindingRepr> for Binding {
    fn from(repr: BindingRepr) -> Self {
        match repr {
            BindingRepr::Id(element_id) | BindingRepr::Object { element_id } => Self { element_id },
        }
    }
}

impl From<Binding> for BindingRepr {
    fn from(binding: Binding) -> Self {
        Self::Object { element_id: binding.element_id }
    }
}

impl Binding {
    pub fn to(element_id: impl Into<String>) -> Self {
        Self { element_id: element_id.into() }
    }
}

/// A node or connector as stored on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualElement {
    /// Surface-assigned id. Elements with an empty id are ignored by conversion.
    #[serde(default)]
    pub id: String,
    /// Shape or connector type.
    #[serde(rename = "type", alias = "kind")]
    pub kind: ElementKind,
    /// Primary text carried by the element.
    #[serde(default, alias = "label", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Open-ended per-kind properties. `properties.text` is a secondary label.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// For text elements: the id of the shape this text labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    /// Connector start endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_binding: Option<Binding>,
    /// Connector end endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_binding: Option<Binding>,
    /// Tombstone flag set by canvases that keep deleted elements around.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_deleted: bool,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

impl VisualElement {
    /// A bare element of `kind` with no geometry.
    pub fn new(id: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            kind,
            text: None,
            properties: serde_json::Map::new(),
            container_id: None,
            start_binding: None,
            end_binding: None,
            is_deleted: false,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        }
    }

    /// A connector bound from `from` to `to`.
    pub fn arrow(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        let mut element = Self::new(id, ElementKind::Arrow);
        element.start_binding = Some(Binding::to(from));
        element.end_binding = Some(Binding::to(to));
        element
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_bounds(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
        self
    }

    /// Secondary text stored under `properties.text`, if it is a string.
    #[must_use]
    pub fn property_text(&self) -> Option<&str> {
        self.properties.get("text").and_then(serde_json::Value::as_str)
    }

    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Drop tombstoned elements, preserving order.
#[must_use]
pub fn non_deleted(elements: &[VisualElement]) -> Vec<VisualElement> {
    elements.iter().filter(|e| !e.is_deleted).cloned().collect()
}

// =============================================================================
// SCENE CODEC
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("invalid scene JSON: {0}")]
    InvalidScene(#[from] serde_json::Error),
}

impl ErrorCode for ConversionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidScene(_) => "E_INVALID_SCENE",
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SceneRepr {
    Elements(Vec<VisualElement>),
    Scene { elements: Vec<VisualElement> },
}

/// Decode a scene: either a bare element array or `{ "elements": [...] }`.
///
/// # Errors
///
/// Returns [`ConversionError::InvalidScene`] when the JSON does not match the
/// element schema.
pub fn decode_scene(json: &str) -> Result<Vec<VisualElement>, ConversionError> {
    let scene: SceneRepr = serde_json::from_str(json)?;
    Ok(match scene {
        SceneRepr::Elements(elements) | SceneRepr::Scene { elements } => elements,
    })
}

/// Encode elements as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns [`ConversionError::InvalidScene`] if serialization fails.
pub fn encode_scene(elements: &[VisualElement]) -> Result<String, ConversionError> {
    Ok(serde_json::to_string_pretty(elements)?)
}

#[cfg(test)]
#[path = "element_test.rs"]
mod tests;
