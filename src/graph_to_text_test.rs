use super::*;
use crate::element::{Binding, decode_scene};
use serde_json::json;

fn rect(id: &str, text: &str) -> VisualElement {
    VisualElement::new(id, ElementKind::Rectangle).with_text(text)
}

// =============================================================================
// EMISSION
// =============================================================================

#[test]
fn clean_node_edge_scene() {
    let elements = vec![rect("e1", "Start"), rect("e2", "End"), VisualElement::arrow("e3", "e1", "e2")];
    assert_eq!(elements_to_text(&elements), "graph TD\n  n1[Start]\n  n2[End]\n  n1 --> n2\n");
}

#[test]
fn clean_scene_from_json_schema() {
    let json = json!([
        { "id": "e1", "kind": "rectangle", "label": "Start" },
        { "id": "e2", "kind": "rectangle", "label": "End" },
        { "id": "e3", "kind": "arrow", "startBinding": "e1", "endBinding": "e2" }
    ])
    .to_string();
    let elements = decode_scene(&json).unwrap();
    assert_eq!(elements_to_text(&elements), "graph TD\n  n1[Start]\n  n2[End]\n  n1 --> n2\n");
}

#[test]
fn shapes_map_to_syntax() {
    let elements = vec![
        rect("r", "Box"),
        VisualElement::new("d", ElementKind::Diamond).with_text("Ok?"),
        VisualElement::new("h", ElementKind::Rhombus).with_text("Again?"),
        VisualElement::new("e", ElementKind::Ellipse).with_text("Done"),
        VisualElement::new("c", ElementKind::Circle).with_text("Stop"),
    ];
    assert_eq!(
        elements_to_text(&elements),
        "graph TD\n  n1[Box]\n  n2{Ok?}\n  n3{Again?}\n  n4((Done))\n  n5((Stop))\n"
    );
}

#[test]
fn labeled_edge_uses_pipe_form() {
    let elements = vec![
        VisualElement::new("q", ElementKind::Diamond).with_text("Valid?"),
        rect("y", "Save"),
        VisualElement::arrow("a", "q", "y").with_text("yes"),
    ];
    assert!(elements_to_text(&elements).ends_with("  n1 -->|yes| n2\n"));
}

#[test]
fn output_is_deterministic() {
    let elements = vec![
        VisualElement::new("zz99", ElementKind::Ellipse),
        rect("aa11", "First?"),
        VisualElement::arrow("x", "aa11", "zz99"),
    ];
    let first = elements_to_text(&elements);
    let second = elements_to_text(&elements);
    assert_eq!(first, second);
    // First-seen order, not sorted by id.
    assert!(first.starts_with("graph TD\n  n1((Oval_zz99))\n  n2[First?]\n"));
}

// =============================================================================
// FILTERING
// =============================================================================

#[test]
fn dangling_connector_is_dropped() {
    let elements = vec![rect("a", "A"), VisualElement::arrow("x", "a", "missing")];
    assert_eq!(elements_to_text(&elements), "graph TD\n  n1[A]\n");
}

#[test]
fn unbound_connector_is_dropped() {
    let mut arrow = VisualElement::new("x", ElementKind::Arrow);
    arrow.start_binding = Some(Binding::to("a"));
    let elements = vec![rect("a", "A"), rect("b", "B"), arrow];
    let graph = DiagramGraph::from_elements(&elements);
    assert!(graph.edges.is_empty());
}

#[test]
fn connector_bound_to_non_node_is_dropped() {
    let mut note = VisualElement::new("t", ElementKind::Text).with_text("floating");
    note.container_id = None;
    let elements = vec![rect("a", "A"), note, VisualElement::arrow("x", "a", "t")];
    assert!(DiagramGraph::from_elements(&elements).edges.is_empty());
}

#[test]
fn elements_without_id_or_known_kind_are_ignored() {
    let elements = vec![
        VisualElement::new("", ElementKind::Rectangle).with_text("anonymous"),
        VisualElement::new("u", ElementKind::Unknown).with_text("?"),
        VisualElement::new("l", ElementKind::Line),
        rect("k", "Kept"),
    ];
    assert_eq!(elements_to_text(&elements), "graph TD\n  n1[Kept]\n");
}

#[test]
fn raw_scene_drops_tombstones_and_their_connectors() {
    let json = r#"[
        {"id": "a", "kind": "rectangle", "label": "Kept"},
        {"id": "b", "kind": "rectangle", "label": "Gone", "isDeleted": true},
        {"id": "c", "kind": "arrow", "startBinding": "a", "endBinding": "b"},
        {"id": "d", "kind": "arrow", "startBinding": "a", "endBinding": "a", "isDeleted": true}
    ]"#;
    let scene = decode_scene(json).unwrap();
    assert_eq!(scene_to_text(&scene), "graph TD\n  n1[Kept]\n");
}

#[test]
fn empty_scene_is_declaration_only() {
    assert_eq!(elements_to_text(&[]), "graph TD\n");
}

#[test]
fn repeated_id_keeps_first_position() {
    let elements = vec![rect("a", "Old"), rect("b", "B"), rect("a", "New")];
    let graph = DiagramGraph::from_elements(&elements);
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.nodes[0].id, "n1");
    assert_eq!(graph.nodes[0].label, "New");
    assert_eq!(graph.nodes[1].source_id, "b");
}

// =============================================================================
// LABELS
// =============================================================================

#[test]
fn sanitize_replaces_brackets_and_drops_quotes() {
    assert_eq!(sanitize_label(r#"A[B]"C""#), "A_B_C");
    assert_eq!(sanitize_label("  f(x) {y} 'z'  "), "f_x_ _y_ z");
}

#[test]
fn sanitized_label_in_emitted_text() {
    let elements = vec![rect("e1", r#"A[B]"C""#)];
    assert_eq!(elements_to_text(&elements), "graph TD\n  n1[A_B_C]\n");
}

#[test]
fn label_falls_back_to_property_text() {
    let mut element = VisualElement::new("p1", ElementKind::Rectangle).with_text("   ");
    element.properties.insert("text".into(), json!(" Inner "));
    let graph = DiagramGraph::from_elements(&[element]);
    assert_eq!(graph.nodes[0].label, "Inner");
}

#[test]
fn label_falls_back_to_bound_text_element() {
    let mut label = VisualElement::new("t1", ElementKind::Text).with_text("Bound");
    label.container_id = Some("box1".into());
    let elements = vec![VisualElement::new("box1", ElementKind::Rectangle), label];
    let graph = DiagramGraph::from_elements(&elements);
    assert_eq!(graph.nodes[0].label, "Bound");
}

#[test]
fn synthesized_defaults_per_shape_family() {
    let elements = vec![
        VisualElement::new("abcdef", ElementKind::Rectangle),
        VisualElement::new("ghijkl", ElementKind::Diamond),
        VisualElement::new("mn", ElementKind::Circle),
    ];
    let graph = DiagramGraph::from_elements(&elements);
    let labels: Vec<&str> = graph.nodes.iter().map(|n| n.label.as_str()).collect();
    assert_eq!(labels, ["Node_abcd", "Decision_ghij", "Oval_mn"]);
}

#[test]
fn connector_without_text_has_no_label() {
    let elements = vec![rect("a", "A"), rect("b", "B"), VisualElement::arrow("x", "a", "b")];
    let graph = DiagramGraph::from_elements(&elements);
    assert_eq!(graph.edges[0].label, None);
}

#[test]
fn connector_label_is_sanitized() {
    let elements = vec![rect("a", "A"), rect("b", "B"), VisualElement::arrow("x", "a", "b").with_text("\"ok\" (1)")];
    let graph = DiagramGraph::from_elements(&elements);
    assert_eq!(graph.edges[0].label.as_deref(), Some("ok _1_"));
}
