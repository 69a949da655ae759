//! Layout engine: converts a parsed flowchart into positioned visual elements.
//!
//! Nodes are ranked by longest path from the sources (back edges in cycles
//! are ignored), then placed on a grid: ranks advance along the flow
//! direction and nodes within a rank are centred across it in first-mention
//! order. Connectors are clipped to their endpoints' bounding boxes and bound
//! to both node ids.

use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::ast::{Flowchart, Node, Shape};
use crate::element::{ElementKind, VisualElement};

// Layout constants (in logical pixels).
const NODE_MIN_W: f64 = 140.0;
const NODE_H: f64 = 60.0;
const CHAR_W: f64 = 8.0;
const LABEL_PADDING: f64 = 32.0;
const RANK_GAP: f64 = 80.0;
const NODE_GAP: f64 = 40.0;

const STROKE: &str = "#1e1e1e";
const RECT_FILL: &str = "#E3F2FD";
const DIAMOND_FILL: &str = "#FFF9C4";
const OVAL_FILL: &str = "#E8F5E9";

/// Lay out `chart` as canvas elements: every node, then every edge.
///
/// Element ids are fresh v4 UUIDs on each call.
#[must_use]
pub fn render_to_elements(chart: &Flowchart) -> Vec<VisualElement> {
    if chart.nodes.is_empty() {
        return Vec::new();
    }

    let ranks = assign_ranks(chart);
    let max_rank = ranks.iter().copied().max().unwrap_or_default();
    let mut by_rank: Vec<Vec<usize>> = vec![Vec::new(); max_rank + 1];
    for (node, &rank) in ranks.iter().enumerate() {
        by_rank[rank].push(node);
    }

    let widths: Vec<f64> = chart.nodes.iter().map(node_width).collect();
    let cell_w = widths.iter().copied().fold(NODE_MIN_W, f64::max);
    let horizontal = chart.direction.is_horizontal();
    let (along_step, across_step) = if horizontal {
        (cell_w + RANK_GAP, NODE_H + NODE_GAP)
    } else {
        (NODE_H + RANK_GAP, cell_w + NODE_GAP)
    };
    let widest = by_rank.iter().map(Vec::len).max().unwrap_or_default();

    let mut centers = vec![(0.0, 0.0); chart.nodes.len()];
    for (rank, members) in by_rank.iter().enumerate() {
        let step = if chart.direction.is_reversed() { max_rank - rank } else { rank };
        let along = units(step) * along_step;
        let offset = units(widest - members.len()) * across_step / 2.0;
        for (slot, &node) in members.iter().enumerate() {
            let across = offset + units(slot) * across_step;
            centers[node] = if horizontal {
                (along + cell_w / 2.0, across + NODE_H / 2.0)
            } else {
                (across + cell_w / 2.0, along + NODE_H / 2.0)
            };
        }
    }

    let ids: Vec<String> = chart.nodes.iter().map(|_| Uuid::new_v4().to_string()).collect();
    let mut elements = Vec::with_capacity(chart.nodes.len() + chart.edges.len());

    for (i, node) in chart.nodes.iter().enumerate() {
        let (cx, cy) = centers[i];
        let w = widths[i];
        let mut element = VisualElement::new(ids[i].clone(), ElementKind::for_shape(node.shape.family()))
            .with_text(node.label.clone())
            .with_bounds(cx - w / 2.0, cy - NODE_H / 2.0, w, NODE_H);
        element.properties = node_properties(node.shape);
        elements.push(element);
    }

    for edge in &chart.edges {
        let (Some(from), Some(to)) = (chart.node_index(&edge.from), chart.node_index(&edge.to)) else {
            continue;
        };
        let start = clip_to_box(centers[from], widths[from], centers[to]);
        let end = clip_to_box(centers[to], widths[to], centers[from]);
        let (dx, dy) = (end.0 - start.0, end.1 - start.1);

        let mut arrow = VisualElement::arrow(Uuid::new_v4().to_string(), ids[from].clone(), ids[to].clone())
            .with_bounds(start.0, start.1, dx.abs(), dy.abs());
        if let Some(label) = &edge.label {
            arrow = arrow.with_text(label.clone());
        }
        arrow.properties.insert("strokeColor".into(), json!(STROKE));
        arrow.properties.insert("points".into(), json!([[0.0, 0.0], [dx, dy]]));
        elements.push(arrow);
    }

    elements
}

#[allow(clippy::cast_precision_loss)]
fn units(n: usize) -> f64 {
    n as f64
}

fn node_width(node: &Node) -> f64 {
    (units(node.label.chars().count()) * CHAR_W + LABEL_PADDING).max(NODE_MIN_W)
}

fn node_properties(shape: Shape) -> Map<String, Value> {
    let fill = match shape {
        Shape::Rect | Shape::Rounded => RECT_FILL,
        Shape::Diamond => DIAMOND_FILL,
        Shape::Circle => OVAL_FILL,
    };
    let mut props = Map::new();
    props.insert("strokeColor".into(), json!(STROKE));
    props.insert("backgroundColor".into(), json!(fill));
    if shape == Shape::Rounded {
        props.insert("roundness".into(), json!("round"));
    }
    props
}

/// Longest-path ranks, capped below the node count so cycles terminate.
fn assign_ranks(chart: &Flowchart) -> Vec<usize> {
    let n = chart.nodes.len();
    let edges: Vec<(usize, usize)> = chart
        .edges
        .iter()
        .filter_map(|e| Some((chart.node_index(&e.from)?, chart.node_index(&e.to)?)))
        .filter(|(from, to)| from != to)
        .collect();

    let mut ranks = vec![0; n];
    for _ in 0..n {
        let mut changed = false;
        for &(from, to) in &edges {
            let candidate = ranks[from] + 1;
            if candidate > ranks[to] && candidate < n {
                ranks[to] = candidate;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    ranks
}

/// Point where the segment from `center` toward `target` leaves a node box.
fn clip_to_box(center: (f64, f64), width: f64, target: (f64, f64)) -> (f64, f64) {
    let (dx, dy) = (target.0 - center.0, target.1 - center.1);
    if dx.abs() < f64::EPSILON && dy.abs() < f64::EPSILON {
        return center;
    }
    let sx = if dx.abs() < f64::EPSILON { f64::INFINITY } else { (width / 2.0) / dx.abs() };
    let sy = if dy.abs() < f64::EPSILON { f64::INFINITY } else { (NODE_H / 2.0) / dy.abs() };
    let scale = sx.min(sy).min(1.0);
    (center.0 + dx * scale, center.1 + dy * scale)
}
