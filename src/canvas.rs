//! Canvas collaborator boundary.
//!
//! The canvas widget itself (drawing, selection, input) lives outside this
//! crate. The coordinator only pushes rendered scenes into it and forwards a
//! couple of session controls; element edits flow back through
//! [`crate::sync::SyncCoordinator::on_elements_changed`].

use crate::element::VisualElement;

/// A visual canvas that can display a scene.
pub trait CanvasSurface: Send {
    /// Replace the whole scene with `elements`.
    fn render(&mut self, elements: &[VisualElement]);

    /// Re-measure and redraw the current scene, e.g. after a resize.
    fn refresh(&mut self);

    fn set_read_only(&mut self, read_only: bool);
}

/// Canvas that keeps the last rendered scene in memory.
///
/// Used by the command-line tool and anywhere a scene is needed without a
/// real widget.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryCanvas {
    pub scene: Vec<VisualElement>,
    pub renders: usize,
    pub refreshes: usize,
    pub read_only: bool,
}

impl CanvasSurface for MemoryCanvas {
    fn render(&mut self, elements: &[VisualElement]) {
        self.scene = elements.to_vec();
        self.renders += 1;
    }

    fn refresh(&mut self) {
        self.refreshes += 1;
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }
}
