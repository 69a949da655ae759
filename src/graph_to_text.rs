//! Graph → text converter: canvas elements back into canonical diagram text.
//!
//! DESIGN
//! ======
//! A pure function of the element list. Elements are classified into nodes
//! and connectors, labels are resolved and sanitized, dangling connectors are
//! dropped, and nodes are renumbered `n1, n2, ...` in first-seen order so the
//! exported text is compact and never leaks opaque canvas ids.
//!
//! The conversion is lossy: geometry, styling, and unsupported element kinds
//! are discarded. Running it twice over the same ordered input yields
//! byte-identical text.

use std::collections::HashMap;

use crate::dsl::{DEFAULT_DECLARATION, NodeShape, format_edge};
use crate::element::{ElementKind, VisualElement, non_deleted};

/// Characters replaced with `_` because they delimit node shapes.
const SHAPE_DELIMITERS: &[char] = &['[', ']', '(', ')', '{', '}'];

/// Quote characters removed outright.
const QUOTES: &[char] = &['"', '\''];

// =============================================================================
// GRAPH MODEL
// =============================================================================

/// A node extracted from the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// Compact identifier, `n1`, `n2`, ...
    pub id: String,
    /// The canvas element this node came from.
    pub source_id: String,
    pub shape: NodeShape,
    pub label: String,
}

/// A connector whose both endpoints resolved to nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
}

/// Structured graph derived from a flat element list. Conversion-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagramGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl DiagramGraph {
    /// Classify `elements` into nodes and surviving edges.
    #[must_use]
    pub fn from_elements(elements: &[VisualElement]) -> Self {
        let bound_text = bound_text_by_container(elements);

        // First pass: nodes in first-seen order. A repeated id keeps its
        // original position and takes the later element's content.
        let mut nodes: Vec<GraphNode> = Vec::new();
        let mut index_by_source: HashMap<&str, usize> = HashMap::new();
        let mut connectors: Vec<&VisualElement> = Vec::new();

        for element in elements {
            if element.id.is_empty() {
                continue;
            }
            if let Some(shape) = element.kind.node_shape() {
                let label = sanitize_label(&resolve_node_label(element, shape, &bound_text));
                if let Some(&idx) = index_by_source.get(element.id.as_str()) {
                    nodes[idx].shape = shape;
                    nodes[idx].label = label;
                } else {
                    index_by_source.insert(element.id.as_str(), nodes.len());
                    nodes.push(GraphNode {
                        id: format!("n{}", nodes.len() + 1),
                        source_id: element.id.clone(),
                        shape,
                        label,
                    });
                }
            } else if element.kind.is_connector() {
                connectors.push(element);
            }
        }

        // Second pass: connectors whose endpoints both survived.
        let edges = connectors
            .into_iter()
            .filter_map(|connector| {
                let from = connector.start_binding.as_ref()?;
                let to = connector.end_binding.as_ref()?;
                let from = &nodes[*index_by_source.get(from.element_id.as_str())?];
                let to = &nodes[*index_by_source.get(to.element_id.as_str())?];
                let label = sanitize_label(&resolve_connector_label(connector, &bound_text));
                Some(GraphEdge {
                    from: from.id.clone(),
                    to: to.id.clone(),
                    label: (!label.is_empty()).then_some(label),
                })
            })
            .collect();

        Self { nodes, edges }
    }

    /// Emit canonical text: declaration, node lines, then edge lines.
    ///
    /// Every line, including the last, ends with `\n`.
    #[must_use]
    pub fn to_text(&self) -> String {
        let node_lines = self
            .nodes
            .iter()
            .map(|node| node.shape.format_node(&node.id, &node.label));
        let edge_lines = self
            .edges
            .iter()
            .map(|edge| format_edge(&edge.from, &edge.to, edge.label.as_deref()));

        let mut out = format!("{DEFAULT_DECLARATION}\n");
        for line in node_lines.chain(edge_lines) {
            out.push_str("  ");
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// Convert a canvas element list into canonical diagram text.
#[must_use]
pub fn elements_to_text(elements: &[VisualElement]) -> String {
    DiagramGraph::from_elements(elements).to_text()
}

/// Like [`elements_to_text`], for a raw canvas scene that may still carry
/// tombstoned elements.
#[must_use]
pub fn scene_to_text(scene: &[VisualElement]) -> String {
    elements_to_text(&non_deleted(scene))
}

// =============================================================================
// LABELS
// =============================================================================

/// Strip grammar-breaking characters and surrounding whitespace.
#[must_use]
pub fn sanitize_label(raw: &str) -> String {
    raw.chars()
        .filter(|c| !QUOTES.contains(c))
        .map(|c| if SHAPE_DELIMITERS.contains(&c) { '_' } else { c })
        .collect::<String>()
        .trim()
        .to_owned()
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

/// Text elements bound to a container, keyed by container id. First wins.
fn bound_text_by_container(elements: &[VisualElement]) -> HashMap<&str, &str> {
    let mut map = HashMap::new();
    for element in elements {
        if element.kind != ElementKind::Text {
            continue;
        }
        if let (Some(container), Some(text)) = (element.container_id.as_deref(), non_blank(element.text.as_deref())) {
            map.entry(container).or_insert(text);
        }
    }
    map
}

fn resolve_text<'a>(element: &'a VisualElement, bound_text: &HashMap<&str, &'a str>) -> Option<&'a str> {
    non_blank(element.text.as_deref())
        .or_else(|| non_blank(element.property_text()))
        .or_else(|| bound_text.get(element.id.as_str()).copied())
}

fn resolve_node_label(element: &VisualElement, shape: NodeShape, bound_text: &HashMap<&str, &str>) -> String {
    match resolve_text(element, bound_text) {
        Some(text) => text.to_owned(),
        None => {
            let short: String = element.id.chars().take(4).collect();
            format!("{}_{short}", shape.default_label_prefix())
        }
    }
}

fn resolve_connector_label(element: &VisualElement, bound_text: &HashMap<&str, &str>) -> String {
    resolve_text(element, bound_text).unwrap_or_default().to_owned()
}

#[cfg(test)]
#[path = "graph_to_text_test.rs"]
mod tests;
