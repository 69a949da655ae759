//! AST types for flowchart diagrams.

use crate::dsl::{Direction, NodeShape};

/// A parsed flowchart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flowchart {
    pub direction: Direction,
    /// Nodes in first-mention order.
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Flowchart {
    #[must_use]
    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }
}

/// A node declaration or reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub shape: Shape,
}

/// Node shapes the grammar can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `id[label]`, also the shape of a bare `id`.
    Rect,
    /// `id(label)`
    Rounded,
    /// `id{label}`
    Diamond,
    /// `id((label))`
    Circle,
}

impl Shape {
    /// Shape family used on the canvas.
    #[must_use]
    pub fn family(self) -> NodeShape {
        match self {
            Self::Rect | Self::Rounded => NodeShape::Rectangle,
            Self::Diamond => NodeShape::Diamond,
            Self::Circle => NodeShape::Oval,
        }
    }
}

/// A directed `-->` connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
}
