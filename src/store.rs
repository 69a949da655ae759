//! Diagram store: canonical text, linear undo history, and the active surface.
//!
//! DESIGN
//! ======
//! `DiagramStore` is a cheap-to-clone handle (`Arc<Mutex<_>>` inside) that is
//! injected into every surface. Only its entry points mutate the canonical
//! text or the history, and each entry point completes under one lock, so no
//! partially applied state is ever observable.
//!
//! Every observable change is broadcast as a [`StoreSnapshot`] on a
//! `tokio::sync::watch` channel. Surfaces subscribe instead of polling and
//! use the snapshot's `active_surface` to ignore updates they produced.
//!
//! Undo and redo only replay stored snapshots. They never invoke a
//! converter, so they cannot fail.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::SurfaceError;

/// Diagram loaded when a document opens without content.
pub const DEFAULT_DIAGRAM: &str = "graph TD\n  A[Start] --> B[Process]\n  B --> C[End]";

// =============================================================================
// SURFACE
// =============================================================================

/// An independent producer of diagram updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    #[default]
    Text,
    Canvas,
    Ai,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Canvas => "canvas",
            Self::Ai => "ai",
        })
    }
}

// =============================================================================
// HISTORY
// =============================================================================

/// Ordered canonical-text snapshots plus a cursor on the active one.
///
/// Invariant: `index < entries.len()` and `entries[index]` is the canonical
/// text. Two consecutive entries are never equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Vec<String>,
    index: usize,
    limit: Option<usize>,
}

impl History {
    #[must_use]
    pub fn new(initial: String, limit: Option<usize>) -> Self {
        Self { entries: vec![initial], index: 0, limit: limit.map(|l| l.max(1)) }
    }

    #[must_use]
    pub fn current(&self) -> &str {
        &self.entries[self.index]
    }

    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`: a history holds at least the initial snapshot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// Discard the redo branch and append `text`. Returns `false` for a no-op.
    fn record(&mut self, text: String) -> bool {
        if text == self.current() {
            return false;
        }
        self.entries.truncate(self.index + 1);
        self.entries.push(text);
        if let Some(limit) = self.limit {
            let overflow = self.entries.len().saturating_sub(limit);
            self.entries.drain(..overflow);
        }
        self.index = self.entries.len() - 1;
        true
    }

    fn step_back(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.index -= 1;
        true
    }

    fn step_forward(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.index += 1;
        true
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// What caused a snapshot to be broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The store was just created.
    Initial,
    /// New canonical text from a surface entry point.
    Edit(Surface),
    Undo,
    Redo,
    /// Error slot, active surface, or rendering flag changed.
    Status,
}

/// Immutable view of the store, broadcast on every observable change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub text: String,
    pub active_surface: Surface,
    pub error: Option<SurfaceError>,
    pub is_rendering: bool,
    pub history_index: usize,
    pub history_len: usize,
    /// Monotonic counter, bumped once per broadcast.
    pub revision: u64,
    pub change: ChangeKind,
}

// =============================================================================
// STORE
// =============================================================================

/// Shared handle to one document's canonical state.
#[derive(Clone)]
pub struct DiagramStore {
    inner: Arc<Mutex<StoreInner>>,
    changes: Arc<watch::Sender<StoreSnapshot>>,
}

struct StoreInner {
    history: History,
    active_surface: Surface,
    error: Option<SurfaceError>,
    is_rendering: bool,
    revision: u64,
}

impl StoreInner {
    fn snapshot(&self, change: ChangeKind) -> StoreSnapshot {
        StoreSnapshot {
            text: self.history.current().to_owned(),
            active_surface: self.active_surface,
            error: self.error.clone(),
            is_rendering: self.is_rendering,
            history_index: self.history.index(),
            history_len: self.history.len(),
            revision: self.revision,
            change,
        }
    }
}

impl Default for DiagramStore {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGRAM)
    }
}

impl DiagramStore {
    /// Open a document with `initial` as its first history entry.
    #[must_use]
    pub fn new(initial: impl Into<String>) -> Self {
        Self::with_history_limit(initial, None)
    }

    /// Open a document bounded by the configured history limit.
    #[must_use]
    pub fn from_config(initial: impl Into<String>, config: &EngineConfig) -> Self {
        Self::with_history_limit(initial, config.history_limit)
    }

    /// Like [`DiagramStore::new`], keeping at most `limit` history entries.
    ///
    /// Blank `initial` text opens [`DEFAULT_DIAGRAM`] instead.
    #[must_use]
    pub fn with_history_limit(initial: impl Into<String>, limit: Option<usize>) -> Self {
        let mut initial = initial.into();
        if initial.trim().is_empty() {
            debug!("store: blank initial text, opening default diagram");
            DEFAULT_DIAGRAM.clone_into(&mut initial);
        }
        let inner = StoreInner {
            history: History::new(initial, limit),
            active_surface: Surface::default(),
            error: None,
            is_rendering: false,
            revision: 0,
        };
        let (changes, _initial_rx) = watch::channel(inner.snapshot(ChangeKind::Initial));
        Self { inner: Arc::new(Mutex::new(inner)), changes: Arc::new(changes) }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &mut StoreInner, change: ChangeKind) {
        inner.revision += 1;
        let snapshot = inner.snapshot(change);
        self.changes.send_modify(|current| *current = snapshot);
    }

    // -------------------------------------------------------------------------
    // Readers
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn text(&self) -> String {
        self.lock().history.current().to_owned()
    }

    #[must_use]
    pub fn active_surface(&self) -> Surface {
        self.lock().active_surface
    }

    #[must_use]
    pub fn error(&self) -> Option<SurfaceError> {
        self.lock().error.clone()
    }

    #[must_use]
    pub fn is_rendering(&self) -> bool {
        self.lock().is_rendering
    }

    /// Copy of the full history, for inspection.
    #[must_use]
    pub fn history(&self) -> History {
        self.lock().history.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        self.changes.borrow().clone()
    }

    /// Receive every subsequent snapshot. The current one is marked seen.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.changes.subscribe()
    }

    // -------------------------------------------------------------------------
    // Entry points
    // -------------------------------------------------------------------------

    /// New canonical text typed in the text editor.
    pub fn from_text(&self, text: impl Into<String>) -> bool {
        self.update(Surface::Text, text.into())
    }

    /// New canonical text promoted from the canvas.
    pub fn from_canvas(&self, text: impl Into<String>) -> bool {
        self.update(Surface::Canvas, text.into())
    }

    /// New canonical text extracted from an assistant reply.
    pub fn from_ai(&self, text: impl Into<String>) -> bool {
        self.update(Surface::Ai, text.into())
    }

    /// Record `text` as produced by `surface`.
    ///
    /// Identical or blank text is a no-op: history, active surface, and the
    /// error slot are left untouched. Returns `true` when the text changed.
    pub fn update(&self, surface: Surface, text: String) -> bool {
        if text.trim().is_empty() {
            debug!(%surface, "store: ignoring blank update");
            return false;
        }
        let mut inner = self.lock();
        if !inner.history.record(text) {
            debug!(%surface, "store: update identical to canonical text");
            return false;
        }
        inner.active_surface = surface;
        inner.error = None;
        info!(
            %surface,
            history_len = inner.history.len(),
            history_index = inner.history.index(),
            "store: canonical text updated"
        );
        self.publish(&mut inner, ChangeKind::Edit(surface));
        true
    }

    /// Step back one history entry. No-op at the oldest entry.
    pub fn undo(&self) -> bool {
        let mut inner = self.lock();
        if !inner.history.step_back() {
            debug!("store: nothing to undo");
            return false;
        }
        info!(history_index = inner.history.index(), "store: undo");
        self.publish(&mut inner, ChangeKind::Undo);
        true
    }

    /// Step forward one history entry. No-op at the newest entry.
    pub fn redo(&self) -> bool {
        let mut inner = self.lock();
        if !inner.history.step_forward() {
            debug!("store: nothing to redo");
            return false;
        }
        info!(history_index = inner.history.index(), "store: redo");
        self.publish(&mut inner, ChangeKind::Redo);
        true
    }

    // -------------------------------------------------------------------------
    // Status setters
    // -------------------------------------------------------------------------

    /// Report or clear a transient conversion/parse problem.
    pub fn set_error(&self, error: Option<SurfaceError>) {
        let mut inner = self.lock();
        if inner.error == error {
            return;
        }
        if let Some(err) = &error {
            debug!(%err, "store: error reported");
        }
        inner.error = error;
        self.publish(&mut inner, ChangeKind::Status);
    }

    /// Clear the error slot only if it was raised by `surface`.
    pub fn clear_error_from(&self, surface: Surface) {
        let mut inner = self.lock();
        if inner.error.as_ref().is_some_and(|e| e.surface == surface) {
            inner.error = None;
            self.publish(&mut inner, ChangeKind::Status);
        }
    }

    pub fn set_active_surface(&self, surface: Surface) {
        let mut inner = self.lock();
        if inner.active_surface == surface {
            return;
        }
        debug!(%surface, "store: active surface changed");
        inner.active_surface = surface;
        self.publish(&mut inner, ChangeKind::Status);
    }

    pub fn set_rendering(&self, is_rendering: bool) {
        let mut inner = self.lock();
        if inner.is_rendering == is_rendering {
            return;
        }
        inner.is_rendering = is_rendering;
        self.publish(&mut inner, ChangeKind::Status);
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
