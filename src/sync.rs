//! Sync coordinator: mediates between the store and one canvas session.
//!
//! DESIGN
//! ======
//! Two directions, handled differently:
//!
//! - **text → canvas.** When canonical text changes and the canvas did not
//!   produce it, the text is converted (through the serialization-guarded
//!   [`TextToGraph`]) and rendered. A failed parse keeps the previous render
//!   and reports the error through the store.
//! - **canvas → text.** Local element edits are applied to the local scene
//!   immediately and a debounce timer is (re)started. When it fires, the
//!   non-deleted elements are converted to text and *staged*. Nothing
//!   reaches the store until [`SyncCoordinator::sync_to_editor`] promotes
//!   the staged text via `from_canvas`; the conversion is lossy, so it is
//!   never propagated automatically.
//!
//! A re-entrancy guard is held for a whole convert/render/settle cycle.
//! Refresh requests arriving while it is held are coalesced into one
//! follow-up cycle.
//!
//! Element callbacks are edits unless they are echoes of our own render:
//! anything delivered while the canvas is inside `render`, or a copy of the
//! rendered scene while no local edit is pending. A user edit that lands while a conversion is in
//! flight wins; the conversion's result is not drawn over it.
//!
//! Debounce timers run on the Tokio runtime captured at construction, so
//! the canvas may deliver callbacks from a thread outside the runtime.
//!
//! LOCKING
//! =======
//! The session state and canvas mutexes are never held across an `.await`
//! and never while calling into the store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::canvas::CanvasSurface;
use crate::config::EngineConfig;
use crate::element::{ConversionError, VisualElement, decode_scene};
use crate::error::SurfaceError;
use crate::graph_to_text::scene_to_text;
use crate::store::{ChangeKind, DiagramStore, StoreSnapshot, Surface};
use crate::text_to_graph::{ConversionOutcome, DiagramParser, ParseError, TextToGraph};

/// Where the canvas session is in its conversion cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    #[default]
    Idle,
    Converting,
    Staged,
}

#[derive(Default)]
struct SessionState {
    phase: SyncPhase,
    elements: Vec<VisualElement>,
    staged: Option<String>,
    /// Re-entrancy guard for the convert/render/settle cycle.
    cycle_running: bool,
    /// Coalesced refresh request; the flag is the OR of every `force` seen.
    pending_refresh: Option<bool>,
    /// Set by user edits, cleared by a fresh render.
    locally_edited: bool,
    /// Bumped on every user edit.
    edit_seq: u64,
    /// `true` while the canvas is inside `render`.
    rendering: bool,
    /// Last scene pushed into the canvas.
    rendered: Vec<VisualElement>,
    debounce: Option<JoinHandle<()>>,
    read_only: bool,
    ready: bool,
    last_error: Option<SurfaceError>,
}

pub struct SyncCoordinator {
    store: DiagramStore,
    converter: TextToGraph,
    canvas: Mutex<Box<dyn CanvasSurface>>,
    state: Mutex<SessionState>,
    config: EngineConfig,
    runtime: Handle,
}

impl SyncCoordinator {
    /// Build a session on the current Tokio runtime.
    ///
    /// Must be called from within a runtime; use
    /// [`SyncCoordinator::with_runtime`] to pass a handle explicitly.
    #[must_use]
    pub fn new(
        store: DiagramStore,
        parser: Arc<dyn DiagramParser>,
        canvas: Box<dyn CanvasSurface>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Self::with_runtime(store, parser, canvas, config, Handle::current())
    }

    #[must_use]
    pub fn with_runtime(
        store: DiagramStore,
        parser: Arc<dyn DiagramParser>,
        canvas: Box<dyn CanvasSurface>,
        config: EngineConfig,
        runtime: Handle,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            converter: TextToGraph::new(parser, &config),
            canvas: Mutex::new(canvas),
            state: Mutex::new(SessionState::default()),
            config,
            runtime,
        })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn canvas(&self) -> MutexGuard<'_, Box<dyn CanvasSurface>> {
        self.canvas.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn store(&self) -> &DiagramStore {
        &self.store
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.state().phase
    }

    #[must_use]
    pub fn staged_text(&self) -> Option<String> {
        self.state().staged.clone()
    }

    /// The locally rendered element set, including tombstones.
    #[must_use]
    pub fn elements(&self) -> Vec<VisualElement> {
        self.state().elements.clone()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<SurfaceError> {
        self.state().last_error.clone()
    }

    /// `true` once a render cycle has settled and no other is running.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state().ready
    }

    // -------------------------------------------------------------------------
    // text → canvas
    // -------------------------------------------------------------------------

    /// React to a store broadcast.
    ///
    /// Edits produced by the canvas itself are skipped; undo and redo always
    /// re-render because they replay history rather than a canvas edit. A
    /// status broadcast is treated as a possible text change, since the
    /// watch channel only keeps the latest snapshot.
    pub async fn on_store_change(&self, snapshot: &StoreSnapshot) {
        match snapshot.change {
            ChangeKind::Edit(Surface::Canvas) => {
                debug!(revision = snapshot.revision, "sync: skipping canvas-originated change");
            }
            ChangeKind::Undo | ChangeKind::Redo => self.refresh_scene(false).await,
            ChangeKind::Edit(_) | ChangeKind::Initial | ChangeKind::Status => self.on_text_changed().await,
        }
    }

    /// Canonical text changed: re-render unless the canvas is the active surface.
    pub async fn on_text_changed(&self) {
        if self.store.active_surface() == Surface::Canvas {
            debug!("sync: canvas is the active surface, not re-rendering");
            return;
        }
        self.refresh_scene(false).await;
    }

    /// Re-convert the canonical text bypassing the cache.
    pub async fn force_reload(&self) {
        info!("sync: forced reload");
        self.refresh_scene(true).await;
    }

    /// Convert the current canonical text and render it.
    ///
    /// If a cycle is already running the request is coalesced into a single
    /// follow-up cycle and this call returns immediately.
    pub async fn refresh_scene(&self, force: bool) {
        if !self.begin_cycle(force) {
            return;
        }

        let mut force = force;
        loop {
            let edit_seq = {
                let state = self.state();
                force |= state.locally_edited;
                state.edit_seq
            };
            let text = self.store.text();
            self.store.set_rendering(true);
            let result = self.converter.convert(&text, force).await;
            self.store.set_rendering(false);
            self.apply_conversion(result, edit_seq);

            tokio::time::sleep(self.config.settle).await;
            match self.finish_cycle() {
                Some(next) => force = next,
                None => break,
            }
        }
    }

    /// Take the re-entrancy guard, or coalesce into the running cycle.
    fn begin_cycle(&self, force: bool) -> bool {
        let mut state = self.state();
        if state.cycle_running {
            let merged = state.pending_refresh.unwrap_or(false) || force;
            state.pending_refresh = Some(merged);
            debug!(force = merged, "sync: refresh coalesced into running cycle");
            return false;
        }
        state.cycle_running = true;
        state.ready = false;
        state.phase = SyncPhase::Converting;
        true
    }

    /// Release the guard, or hand back the coalesced request's force flag.
    fn finish_cycle(&self) -> Option<bool> {
        let mut state = self.state();
        if let Some(next) = state.pending_refresh.take() {
            return Some(next);
        }
        state.cycle_running = false;
        state.ready = true;
        state.phase = if state.staged.is_some() { SyncPhase::Staged } else { SyncPhase::Idle };
        debug!(phase = ?state.phase, "sync: cycle settled");
        None
    }

    /// `edit_seq` is the edit counter observed when the conversion started.
    fn apply_conversion(&self, result: Result<ConversionOutcome, ParseError>, edit_seq: u64) {
        match result {
            Ok(ConversionOutcome::Converted(elements)) => {
                {
                    let mut state = self.state();
                    if state.edit_seq != edit_seq {
                        debug!("sync: canvas edited during conversion, render dropped");
                        return;
                    }
                    state.rendering = true;
                }
                self.canvas().render(&elements);
                {
                    let mut state = self.state();
                    state.rendering = false;
                    state.rendered.clone_from(&elements);
                    state.elements = elements;
                    state.staged = None;
                    state.locally_edited = false;
                    if let Some(pending) = state.debounce.take() {
                        pending.abort();
                    }
                }
                self.clear_last_error();
                info!("sync: canvas rendered from canonical text");
            }
            Ok(ConversionOutcome::Unchanged) => {
                // The text is back to what is on screen, e.g. after undoing a
                // broken edit.
                self.clear_last_error();
                debug!("sync: canonical text unchanged, render kept");
            }
            Ok(ConversionOutcome::Superseded) => {
                debug!("sync: stale conversion dropped");
            }
            Err(err) => {
                let surface = match self.store.active_surface() {
                    Surface::Canvas => Surface::Text,
                    other => other,
                };
                warn!(error = %err, %surface, "sync: parse failed, previous render kept");
                let error = SurfaceError::new(surface, &err);
                self.state().last_error = Some(error.clone());
                self.store.set_error(Some(error));
            }
        }
    }

    fn clear_last_error(&self) {
        let origin = self.state().last_error.take().map(|e| e.surface);
        if let Some(surface) = origin {
            self.store.clear_error_from(surface);
        }
    }

    // -------------------------------------------------------------------------
    // canvas → text
    // -------------------------------------------------------------------------

    /// Element-change callback from the canvas.
    ///
    /// Echoes of our own render are ignored. Anything else is a user edit,
    /// even mid-cycle: the local scene is replaced, the canvas becomes the
    /// active surface and the staging debounce restarts.
    pub fn on_elements_changed(self: &Arc<Self>, elements: Vec<VisualElement>) {
        {
            let mut state = self.state();
            if state.read_only {
                debug!("sync: ignoring edit on read-only canvas");
                return;
            }
            if state.rendering || (!state.locally_edited && state.rendered == elements) {
                debug!("sync: element echo of rendered scene");
                return;
            }
            state.elements = elements;
            state.locally_edited = true;
            state.edit_seq += 1;
        }
        self.store.set_active_surface(Surface::Canvas);
        self.schedule_staging();
    }

    /// Raw scene JSON from the canvas boundary.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::InvalidScene`] when the JSON does not
    /// decode. The error is also reported to the store and the local scene is
    /// left untouched.
    pub fn on_scene_json(self: &Arc<Self>, json: &str) -> Result<(), ConversionError> {
        match decode_scene(json) {
            Ok(elements) => {
                self.store.clear_error_from(Surface::Canvas);
                self.on_elements_changed(elements);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "sync: rejected scene from canvas");
                let error = SurfaceError::new(Surface::Canvas, &err);
                self.state().last_error = Some(error.clone());
                self.store.set_error(Some(error));
                Err(err)
            }
        }
    }

    fn schedule_staging(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let delay = self.config.debounce;
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            this.stage();
        });
        if let Some(previous) = self.state().debounce.replace(handle) {
            previous.abort();
        }
    }

    fn stage(&self) {
        let mut state = self.state();
        state.debounce = None;
        let text = scene_to_text(&state.elements);
        info!(bytes = text.len(), "sync: canvas text staged");
        state.staged = Some(text);
        if !state.cycle_running {
            state.phase = SyncPhase::Staged;
        }
    }

    /// `true` while staged text exists and differs from the canonical text.
    #[must_use]
    pub fn can_sync(&self) -> bool {
        let (phase, staged) = {
            let state = self.state();
            (state.phase, state.staged.clone())
        };
        phase == SyncPhase::Staged && staged.is_some_and(|text| text != self.store.text())
    }

    /// Promote the staged text into the store. Returns `false` if there was
    /// nothing to promote.
    pub fn sync_to_editor(&self) -> bool {
        if !self.can_sync() {
            debug!("sync: nothing to sync");
            return false;
        }
        let staged = {
            let mut state = self.state();
            state.phase = SyncPhase::Idle;
            state.staged.take()
        };
        let Some(text) = staged else {
            return false;
        };
        let promoted = self.store.from_canvas(text);
        info!(promoted, "sync: staged canvas text promoted");
        promoted
    }

    // -------------------------------------------------------------------------
    // Session controls
    // -------------------------------------------------------------------------

    pub fn on_resize(&self) {
        debug!("sync: resize, refreshing canvas");
        self.canvas().refresh();
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.state().read_only = read_only;
        self.canvas().set_read_only(read_only);
        info!(read_only, "sync: canvas mode changed");
    }

    /// Render the current text, then follow store broadcasts until the
    /// returned task is aborted.
    ///
    /// Status-only broadcasts that leave the text untouched are skipped, so
    /// the rendering flag toggled by a cycle never triggers another cycle.
    #[must_use]
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut changes = self.store.subscribe();
        self.runtime.spawn(async move {
            let mut seen_text = changes.borrow_and_update().text.clone();
            this.refresh_scene(false).await;
            while changes.changed().await.is_ok() {
                let snapshot = changes.borrow_and_update().clone();
                let text_changed = snapshot.text != seen_text;
                seen_text.clone_from(&snapshot.text);
                if !text_changed && matches!(snapshot.change, ChangeKind::Status | ChangeKind::Initial) {
                    continue;
                }
                this.on_store_change(&snapshot).await;
            }
            debug!("sync: store closed, listener exiting");
        })
    }
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
