//! Diagram DSL surface forms: declaration keywords, directions, node shapes.
//!
//! Only the pieces both converters agree on live here. Full parsing of the
//! grammar belongs to the layout collaborator (see [`crate::flowchart`]).

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Declaration emitted by the graph → text converter and prepended to bare
/// fragments by the text → graph converter.
pub const DEFAULT_DECLARATION: &str = "graph TD";

/// Keywords that open a flowchart declaration.
pub const FLOWCHART_KEYWORDS: &[&str] = &["graph", "flowchart"];

/// Every diagram-type keyword recognized as an explicit declaration.
pub const DECLARATION_KEYWORDS: &[&str] =
    &["graph", "flowchart", "sequenceDiagram", "classDiagram", "stateDiagram", "gantt", "pie", "journey"];

/// Flowchart direction keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Top to bottom (alias `TB`).
    #[default]
    TD,
    TB,
    BT,
    LR,
    RL,
}

impl Direction {
    /// Parse a direction token. Case-sensitive, as in the grammar.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "TD" => Some(Self::TD),
            "TB" => Some(Self::TB),
            "BT" => Some(Self::BT),
            "LR" => Some(Self::LR),
            "RL" => Some(Self::RL),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_token(self) -> &'static str {
        match self {
            Self::TD => "TD",
            Self::TB => "TB",
            Self::BT => "BT",
            Self::LR => "LR",
            Self::RL => "RL",
        }
    }

    /// `true` when ranks advance along the x axis.
    #[must_use]
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::LR | Self::RL)
    }

    /// `true` when ranks advance toward negative coordinates.
    #[must_use]
    pub fn is_reversed(self) -> bool {
        matches!(self, Self::BT | Self::RL)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Node shape families with a textual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    /// `id[label]`
    Rectangle,
    /// `id{label}`
    Diamond,
    /// `id((label))`
    Oval,
}

impl NodeShape {
    /// Render one node declaration, without indentation.
    #[must_use]
    pub fn format_node(self, id: &str, label: &str) -> String {
        match self {
            Self::Rectangle => format!("{id}[{label}]"),
            Self::Diamond => format!("{id}{{{label}}}"),
            Self::Oval => format!("{id}(({label}))"),
        }
    }

    /// Word used when a node on the canvas carries no label at all.
    #[must_use]
    pub fn default_label_prefix(self) -> &'static str {
        match self {
            Self::Rectangle => "Node",
            Self::Diamond => "Decision",
            Self::Oval => "Oval",
        }
    }
}

/// Render one edge statement, without indentation.
#[must_use]
pub fn format_edge(from: &str, to: &str, label: Option<&str>) -> String {
    match label {
        Some(label) if !label.trim().is_empty() => format!("{from} -->|{label}| {to}"),
        _ => format!("{from} --> {to}"),
    }
}

/// First whitespace-delimited token of the first meaningful line.
fn leading_keyword(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("%%"))
        .and_then(|line| line.split(|c: char| c.is_whitespace() || c == ';').next())
}

/// `true` if the text opens with any recognized diagram-type keyword.
///
/// `stateDiagram-v2` counts as `stateDiagram`.
#[must_use]
pub fn has_declaration(text: &str) -> bool {
    leading_keyword(text).is_some_and(|word| {
        DECLARATION_KEYWORDS
            .iter()
            .any(|kw| word == *kw || word.strip_prefix(kw).is_some_and(|rest| rest.starts_with('-')))
    })
}

/// Trim the text and prepend [`DEFAULT_DECLARATION`] when no declaration is
/// present, so surfaces may submit bare node/edge fragments.
#[must_use]
pub fn normalize(text: &str) -> Cow<'_, str> {
    let trimmed = text.trim();
    if trimmed.is_empty() || has_declaration(trimmed) {
        Cow::Borrowed(trimmed)
    } else {
        Cow::Owned(format!("{DEFAULT_DECLARATION}\n{trimmed}"))
    }
}

#[cfg(test)]
#[path = "dsl_test.rs"]
mod tests;
