use super::*;
use crate::element::ConversionError;

fn canvas_error() -> SurfaceError {
    let err = ConversionError::InvalidScene(serde_json::from_str::<serde_json::Value>("{").unwrap_err());
    SurfaceError::new(Surface::Canvas, &err)
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

#[test]
fn starts_with_default_diagram() {
    let store = DiagramStore::default();
    assert_eq!(store.text(), DEFAULT_DIAGRAM);
    assert_eq!(store.history().len(), 1);
    assert_eq!(store.history().index(), 0);
    assert_eq!(store.active_surface(), Surface::Text);
}

#[test]
fn each_entry_point_sets_its_surface() {
    let store = DiagramStore::new("graph TD\n  A");
    assert!(store.from_ai("graph TD\n  B"));
    assert_eq!(store.active_surface(), Surface::Ai);
    assert!(store.from_canvas("graph TD\n  C"));
    assert_eq!(store.active_surface(), Surface::Canvas);
    assert!(store.from_text("graph TD\n  D"));
    assert_eq!(store.active_surface(), Surface::Text);
    assert_eq!(store.history().len(), 4);
}

#[test]
fn identical_text_is_a_no_op() {
    let store = DiagramStore::new("graph TD\n  A");
    store.from_ai("graph TD\n  B");
    store.set_error(Some(canvas_error()));
    let before = store.snapshot();

    assert!(!store.from_text("graph TD\n  B"));

    assert_eq!(store.history().len(), 2);
    assert_eq!(store.history().index(), 1);
    assert_eq!(store.active_surface(), Surface::Ai);
    assert_eq!(store.error(), Some(canvas_error()));
    assert_eq!(store.snapshot(), before);
}

#[test]
fn blank_text_is_ignored() {
    let store = DiagramStore::new("graph TD\n  A");
    assert!(!store.from_text("  \n"));
    assert_eq!(store.text(), "graph TD\n  A");
}

#[test]
fn successful_update_clears_error() {
    let store = DiagramStore::new("graph TD\n  A");
    store.set_error(Some(canvas_error()));
    store.from_text("graph TD\n  B");
    assert_eq!(store.error(), None);
}

// =============================================================================
// UNDO / REDO
// =============================================================================

#[test]
fn undo_redo_at_boundaries_are_no_ops() {
    let store = DiagramStore::new("graph TD\n  A");
    assert!(!store.undo());
    assert!(!store.redo());
    assert_eq!(store.text(), "graph TD\n  A");
}

#[test]
fn branch_truncates_redo() {
    let store = DiagramStore::new("v0");
    store.from_text("v1");
    store.from_text("v2");
    assert!(store.undo());
    assert_eq!(store.text(), "v1");

    store.from_text("v3");
    let history = store.history();
    assert_eq!(history.len(), history.index() + 1);
    assert_eq!(history.entries(), ["v0", "v1", "v3"]);
    assert!(!store.redo());
    assert_eq!(store.text(), "v3");
}

#[test]
fn undo_then_redo_restores_text() {
    let store = DiagramStore::new("v0");
    let updates = ["v1", "v2", "v3", "v4"];
    for (i, text) in updates.iter().enumerate() {
        match i % 3 {
            0 => store.from_text(*text),
            1 => store.from_canvas(*text),
            _ => store.from_ai(*text),
        };
    }
    for k in 0..=updates.len() {
        for _ in 0..k {
            assert!(store.undo());
        }
        for _ in 0..k {
            assert!(store.redo());
        }
        assert_eq!(store.text(), "v4", "k = {k}");
    }
}

#[test]
fn undo_does_not_touch_surface_or_error() {
    let store = DiagramStore::new("v0");
    store.from_canvas("v1");
    store.set_error(Some(canvas_error()));
    store.undo();
    assert_eq!(store.text(), "v0");
    assert_eq!(store.active_surface(), Surface::Canvas);
    assert!(store.error().is_some());
}

#[test]
fn history_never_holds_consecutive_duplicates() {
    let store = DiagramStore::new("a");
    for text in ["b", "b", "a", "a", "c", "c"] {
        store.from_text(text);
    }
    let history = store.history();
    assert_eq!(history.entries(), ["a", "b", "a", "c"]);
    assert!(history.entries().windows(2).all(|w| w[0] != w[1]));
}

#[test]
fn history_limit_drops_oldest() {
    let store = DiagramStore::with_history_limit("v0", Some(3));
    for text in ["v1", "v2", "v3", "v4"] {
        store.from_text(text);
    }
    let history = store.history();
    assert_eq!(history.entries(), ["v2", "v3", "v4"]);
    assert_eq!(history.index(), 2);
    assert_eq!(history.current(), store.text());
}

#[test]
fn configured_history_limit_is_applied() {
    let config = EngineConfig { history_limit: Some(2), ..EngineConfig::default() };
    let store = DiagramStore::from_config("v0", &config);
    store.from_text("v1");
    store.from_text("v2");
    assert_eq!(store.history().entries(), ["v1", "v2"]);

    let unbounded = DiagramStore::from_config("v0", &EngineConfig::default());
    unbounded.from_text("v1");
    unbounded.from_text("v2");
    assert_eq!(unbounded.history().len(), 3);
}

#[test]
fn blank_initial_text_opens_default_diagram() {
    for blank in ["", "  \n\t "] {
        let store = DiagramStore::new(blank);
        assert_eq!(store.text(), DEFAULT_DIAGRAM);
        assert_eq!(store.history().entries(), [DEFAULT_DIAGRAM]);
        assert!(!store.undo());
    }
}

// =============================================================================
// STATUS + SUBSCRIPTION
// =============================================================================

#[test]
fn clear_error_from_only_clears_own_surface() {
    let store = DiagramStore::default();
    store.set_error(Some(canvas_error()));
    store.clear_error_from(Surface::Text);
    assert!(store.error().is_some());
    store.clear_error_from(Surface::Canvas);
    assert!(store.error().is_none());
}

#[tokio::test]
async fn subscribers_see_each_change() {
    let store = DiagramStore::new("v0");
    let mut rx = store.subscribe();

    store.from_ai("v1");
    rx.changed().await.unwrap();
    let snap = rx.borrow_and_update().clone();
    assert_eq!(snap.text, "v1");
    assert_eq!(snap.change, ChangeKind::Edit(Surface::Ai));
    assert_eq!(snap.active_surface, Surface::Ai);

    store.undo();
    rx.changed().await.unwrap();
    let snap = rx.borrow_and_update().clone();
    assert_eq!(snap.text, "v0");
    assert_eq!(snap.change, ChangeKind::Undo);
    assert_eq!(snap.history_index, 0);
    assert_eq!(snap.history_len, 2);
}

#[test]
fn no_op_does_not_broadcast() {
    let store = DiagramStore::new("v0");
    let rx = store.subscribe();
    store.from_text("v0");
    store.set_active_surface(Surface::Text);
    store.set_rendering(false);
    assert!(!rx.has_changed().unwrap());
}

#[test]
fn rendering_flag_round_trips() {
    let store = DiagramStore::default();
    store.set_rendering(true);
    assert!(store.is_rendering());
    assert!(store.snapshot().is_rendering);
    store.set_rendering(false);
    assert!(!store.is_rendering());
}
