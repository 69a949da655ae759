use super::*;

#[test]
fn bare_fragment_gets_default_declaration() {
    assert_eq!(normalize("A-->B"), "graph TD\nA-->B");
}

#[test]
fn declared_text_is_only_trimmed() {
    assert_eq!(normalize("  graph LR\n  A --> B\n\n"), "graph LR\n  A --> B");
    assert_eq!(normalize("flowchart TD\nA"), "flowchart TD\nA");
    assert!(matches!(normalize("graph TD"), Cow::Borrowed(_)));
}

#[test]
fn other_diagram_types_are_recognized() {
    assert!(has_declaration("sequenceDiagram\nA->>B: hi"));
    assert!(has_declaration("stateDiagram-v2\n[*] --> S"));
    assert!(has_declaration("%% leading comment\ngraph TD"));
    assert!(has_declaration("graph;A-->B"));
}

#[test]
fn keyword_must_be_whole_word() {
    assert!(!has_declaration("graphics[Box]"));
    assert!(!has_declaration("Graph TD"));
    assert_eq!(normalize("graphics[Box]"), "graph TD\ngraphics[Box]");
}

#[test]
fn empty_text_stays_empty() {
    assert_eq!(normalize("   \n "), "");
}

#[test]
fn node_shapes_format() {
    assert_eq!(NodeShape::Rectangle.format_node("n1", "Start"), "n1[Start]");
    assert_eq!(NodeShape::Diamond.format_node("n2", "Ok?"), "n2{Ok?}");
    assert_eq!(NodeShape::Oval.format_node("n3", "End"), "n3((End))");
}

#[test]
fn edges_format_with_and_without_label() {
    assert_eq!(format_edge("n1", "n2", None), "n1 --> n2");
    assert_eq!(format_edge("n1", "n2", Some("")), "n1 --> n2");
    assert_eq!(format_edge("n1", "n2", Some("yes")), "n1 -->|yes| n2");
}

#[test]
fn direction_tokens_round_trip() {
    for dir in [Direction::TD, Direction::TB, Direction::BT, Direction::LR, Direction::RL] {
        assert_eq!(Direction::from_token(dir.as_token()), Some(dir));
    }
    assert_eq!(Direction::from_token("td"), None);
    assert!(Direction::LR.is_horizontal());
    assert!(Direction::BT.is_reversed());
}
