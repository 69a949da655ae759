//! Flowsync: keeps a diagram's text and canvas representations in step.
//!
//! DESIGN
//! ======
//! One [`store::DiagramStore`] per document holds the canonical text and its
//! linear history. Three surfaces feed it: the text editor, the canvas
//! (through [`sync::SyncCoordinator`]), and the assistant. Conversion runs
//! in both directions: [`text_to_graph::TextToGraph`] turns text into
//! elements through an async layout collaborator, and
//! [`graph_to_text::elements_to_text`] turns edited elements back into text.

pub mod assistant;
pub mod canvas;
pub mod config;
pub mod dsl;
pub mod element;
pub mod error;
pub mod export;
pub mod flowchart;
pub mod graph_to_text;
pub mod store;
pub mod sync;
pub mod text_to_graph;

pub use config::EngineConfig;
pub use element::{ElementKind, VisualElement};
pub use error::{ErrorCode, SurfaceError};
pub use store::{DiagramStore, Surface};
pub use sync::SyncCoordinator;
pub use text_to_graph::{DiagramParser, ParseError, TextToGraph};
