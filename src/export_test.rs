use super::*;
use crate::flowchart::{parse, render_to_elements};

fn rect(id: &str, label: &str) -> VisualElement {
    VisualElement::new(id, ElementKind::Rectangle).with_text(label).with_bounds(0.0, 0.0, 100.0, 50.0)
}

fn scene() -> Vec<VisualElement> {
    let chart = parse("graph TD\n  A[Start] --> B{Ok?}\n  B -->|yes| C((Done))").unwrap();
    render_to_elements(&chart)
}

// =========================================================================
// svg
// =========================================================================

fn text_nodes(out: &str) -> usize {
    out.matches("<text").count()
}

#[test]
fn svg_draws_every_shape_family() {
    let out = svg(&scene()).unwrap();

    assert!(out.contains("<svg"));
    assert!(out.trim_end().ends_with("</svg>"));
    assert!(out.contains("<rect"));
    assert!(out.contains("<ellipse"));
    assert_eq!(out.matches("<polyline").count(), 2);
    // One diamond plus one arrowhead per connector.
    assert_eq!(out.matches("<polygon").count(), 3);
    for label in ["Start", "Ok?", "Done", "yes"] {
        assert!(out.contains(label), "missing label {label}");
    }
    assert_eq!(text_nodes(&out), 4);
}

#[test]
fn svg_escapes_labels() {
    let out = svg(&[rect("a", "<a & b>")]).unwrap();
    assert!(out.contains("&lt;a &amp; b&gt;"));
    assert!(!out.contains("<a &"));
}

#[test]
fn svg_frames_scene_with_margin() {
    let out = svg(&[rect("a", "A")]).unwrap();
    assert!(out.contains("-20 -20 140 90"));
    assert!(out.contains(r#"width="140""#));
    assert!(out.contains(r#"height="90""#));
}

#[test]
fn svg_rounds_corners_on_request() {
    let mut rounded = rect("a", "A");
    rounded.properties.insert("roundness".into(), serde_json::json!({"type": 3}));
    assert!(svg(&[rounded]).unwrap().contains(r#"rx="8""#));
}

#[test]
fn svg_skips_deleted_elements() {
    let mut gone = rect("b", "Gone");
    gone.is_deleted = true;
    let out = svg(&[rect("a", "Kept"), gone]).unwrap();
    assert!(out.contains("Kept"));
    assert!(!out.contains("Gone"));
}

#[test]
fn svg_skips_kinds_without_vector_form() {
    let sketch = VisualElement::new("f", ElementKind::Freedraw).with_bounds(0.0, 0.0, 10.0, 10.0);
    let out = svg(&[rect("a", "A"), sketch]).unwrap();
    assert_eq!(out.matches("<g").count(), 1);
}

#[test]
fn bound_text_is_drawn_once() {
    let mut bound = VisualElement::new("t", ElementKind::Text).with_text("Start").with_bounds(10.0, 10.0, 80.0, 30.0);
    bound.container_id = Some("a".into());

    let labelled = svg(&[rect("a", "Start"), bound.clone()]).unwrap();
    assert_eq!(labelled.matches("Start").count(), 1);

    let mut blank = rect("a", "");
    blank.text = None;
    let unlabelled = svg(&[blank, bound]).unwrap();
    assert_eq!(unlabelled.matches("Start").count(), 1);
    assert_eq!(text_nodes(&unlabelled), 1);
}

#[test]
fn empty_scene_is_rejected() {
    assert!(matches!(svg(&[]), Err(ExportError::EmptyScene)));

    let mut gone = rect("a", "A");
    gone.is_deleted = true;
    let err = png(&[gone]).unwrap_err();
    assert_eq!(err.error_code(), "E_EMPTY_SCENE");
    assert!(!err.retryable());
}

// =========================================================================
// png
// =========================================================================

#[test]
fn png_outlines_shapes() {
    let bytes = png(&[rect("a", "A")]).unwrap();
    assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);

    let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (140, 90));
    // Top-left corner of the rectangle sits one margin in.
    assert_eq!(*decoded.get_pixel(20, 20), Rgba([30, 30, 30, 255]));
    assert_eq!(*decoded.get_pixel(70, 45), BACKGROUND);
}

#[test]
fn png_uses_stroke_color() {
    let mut red = rect("a", "A");
    red.properties.insert("strokeColor".into(), serde_json::json!("#ff0000"));
    let decoded = image::load_from_memory(&png(&[red]).unwrap()).unwrap().to_rgba8();
    assert_eq!(*decoded.get_pixel(20, 20), Rgba([255, 0, 0, 255]));
}

#[test]
fn oversized_scene_is_rejected() {
    let huge = VisualElement::new("a", ElementKind::Rectangle).with_bounds(0.0, 0.0, 10_000.0, 10.0);
    let err = png(&[huge]).unwrap_err();
    assert!(matches!(err, ExportError::TooLarge { width: 10_040, height: 50 }));
    assert_eq!(err.error_code(), "E_EXPORT_TOO_LARGE");
}

#[test]
fn artifacts_bundle_both_renditions() {
    let export = Export::artifacts(&scene()).unwrap();
    assert!(export.svg.contains("<svg"));
    assert_eq!(&export.png[1..4], b"PNG");
}

#[test]
fn color_parsing_falls_back() {
    assert_eq!(parse_color("#00ff7f"), Rgba([0, 255, 127, 255]));
    assert_eq!(parse_color("red"), DEFAULT_STROKE);
    assert_eq!(parse_color("#zzzzzz"), DEFAULT_STROKE);
}
