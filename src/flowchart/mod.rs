//! Built-in flowchart parser and layout engine.
//!
//! Parses `graph`/`flowchart` syntax into an AST and lays the diagram out as
//! canvas elements (shapes plus bound arrows). [`FlowchartParser`] plugs this
//! into [`crate::text_to_graph::TextToGraph`] when no host layout engine is
//! provided.

pub mod ast;
pub mod layout;
pub mod parse;

pub use layout::render_to_elements;
pub use parse::parse;

use crate::element::VisualElement;
use crate::text_to_graph::{DiagramParser, ParseError};

/// Layout collaborator backed by this module.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowchartParser;

#[async_trait::async_trait]
impl DiagramParser for FlowchartParser {
    async fn parse(&self, text: &str) -> Result<Vec<VisualElement>, ParseError> {
        let chart = parse(text)?;
        Ok(render_to_elements(&chart))
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
