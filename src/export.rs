//! Document export: vector and raster artifacts of the current render.
//!
//! DESIGN
//! ======
//! Both artifacts are derived from the same element geometry. The scene is
//! framed by the bounding box of every live element plus a margin, so the
//! output never depends on where the canvas happened to be scrolled.
//!
//! The raster artifact draws outlines only; labels appear in the SVG.

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use svg::Document;
use svg::node::Text as SvgText;
use svg::node::element as svg_element;
use tracing::{debug, info};

use crate::element::{ElementKind, VisualElement, non_deleted};
use crate::error::ErrorCode;

const MARGIN: f64 = 20.0;
const ARROWHEAD_LEN: f64 = 10.0;
const ARROWHEAD_SPREAD: f64 = 0.45;
const DEFAULT_STROKE: Rgba<u8> = Rgba([30, 30, 30, 255]);
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Largest raster edge, in pixels.
pub const MAX_RASTER_EDGE: u32 = 8192;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export: the scene has no visible elements")]
    EmptyScene,

    #[error("scene is too large to rasterize: {width}x{height}")]
    TooLarge { width: u32, height: u32 },

    #[error("failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),
}

impl ErrorCode for ExportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyScene => "E_EMPTY_SCENE",
            Self::TooLarge { .. } => "E_EXPORT_TOO_LARGE",
            Self::Encode(_) => "E_EXPORT_ENCODE",
        }
    }
}

// =============================================================================
// ARTIFACTS
// =============================================================================

/// Vector and raster renditions of one scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub svg: String,
    pub png: Vec<u8>,
}

impl Export {
    /// Produce both artifacts for `elements`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::EmptyScene`] when no live element remains, or
    /// any error from [`png`].
    pub fn artifacts(elements: &[VisualElement]) -> Result<Self, ExportError> {
        let export = Self { svg: svg(elements)?, png: png(elements)? };
        info!(svg_bytes = export.svg.len(), png_bytes = export.png.len(), "export: artifacts ready");
        Ok(export)
    }
}

// =============================================================================
// GEOMETRY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frame {
    min_x: f64,
    min_y: f64,
    width: f64,
    height: f64,
}

/// Absolute polyline of a connector. Falls back to the bounding diagonal.
fn connector_points(element: &VisualElement) -> Vec<(f64, f64)> {
    let points: Vec<(f64, f64)> = element
        .properties
        .get("points")
        .and_then(serde_json::Value::as_array)
        .map(|points| {
            points
                .iter()
                .filter_map(|p| {
                    let pair = p.as_array()?;
                    Some((element.x + pair.first()?.as_f64()?, element.y + pair.get(1)?.as_f64()?))
                })
                .collect()
        })
        .unwrap_or_default();

    if points.len() >= 2 {
        points
    } else {
        vec![(element.x, element.y), (element.x + element.width, element.y + element.height)]
    }
}

fn is_connector(element: &VisualElement) -> bool {
    matches!(element.kind, ElementKind::Arrow | ElementKind::Line)
}

fn frame(elements: &[VisualElement]) -> Option<Frame> {
    let mut bounds: Option<(f64, f64, f64, f64)> = None;
    let mut grow = |x: f64, y: f64| {
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    };
    for element in elements {
        if is_connector(element) {
            for (x, y) in connector_points(element) {
                grow(x, y);
            }
        } else {
            grow(element.x, element.y);
            grow(element.x + element.width, element.y + element.height);
        }
    }
    let (x0, y0, x1, y1) = bounds?;
    Some(Frame {
        min_x: x0 - MARGIN,
        min_y: y0 - MARGIN,
        width: (x1 - x0) + 2.0 * MARGIN,
        height: (y1 - y0) + 2.0 * MARGIN,
    })
}

/// Two barb endpoints of an arrowhead pointing from `from` to `tip`.
fn arrowhead(from: (f64, f64), tip: (f64, f64)) -> [(f64, f64); 2] {
    let angle = (tip.1 - from.1).atan2(tip.0 - from.0);
    [angle + ARROWHEAD_SPREAD, angle - ARROWHEAD_SPREAD]
        .map(|a| (tip.0 - ARROWHEAD_LEN * a.cos(), tip.1 - ARROWHEAD_LEN * a.sin()))
}

fn label(element: &VisualElement) -> Option<&str> {
    element
        .text
        .as_deref()
        .or_else(|| element.property_text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn stroke_hex(element: &VisualElement) -> &str {
    element
        .properties
        .get("strokeColor")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("#1e1e1e")
}

// =============================================================================
// SVG
// =============================================================================

/// Render live elements as a standalone SVG document.
///
/// # Errors
///
/// Returns [`ExportError::EmptyScene`] when no live element remains.
pub fn svg(elements: &[VisualElement]) -> Result<String, ExportError> {
    let live = non_deleted(elements);
    let frame = frame(&live).ok_or(ExportError::EmptyScene)?;

    // Containers that already draw their own label.
    let labelled: Vec<&str> = live
        .iter()
        .filter(|e| e.kind.node_shape().is_some() && label(e).is_some())
        .map(|e| e.id.as_str())
        .collect();

    let background = svg_element::Rectangle::new()
        .set("x", frame.min_x)
        .set("y", frame.min_y)
        .set("width", frame.width)
        .set("height", frame.height)
        .set("fill", "#ffffff");

    let mut doc = Document::new()
        .set("viewBox", format!("{} {} {} {}", frame.min_x, frame.min_y, frame.width, frame.height))
        .set("width", frame.width)
        .set("height", frame.height)
        .add(background);

    for element in &live {
        if element.kind == ElementKind::Text {
            let drawn_by_container = element.container_id.as_deref().is_some_and(|id| labelled.contains(&id));
            if !drawn_by_container {
                if let Some(text) = label(element) {
                    let (cx, cy) = element.center();
                    doc = doc.add(render_text(cx, cy, text));
                }
            }
            continue;
        }
        match render_element(element) {
            Some(node) => doc = doc.add(node),
            None => debug!(id = %element.id, kind = ?element.kind, "export: element kind has no vector form"),
        }
    }

    Ok(doc.to_string())
}

/// Shape or connector plus its label, `None` for kinds without a vector form.
fn render_element(element: &VisualElement) -> Option<svg_element::Group> {
    let stroke = stroke_hex(element).to_owned();
    let fill = element
        .properties
        .get("backgroundColor")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("none")
        .to_owned();
    let (cx, cy) = element.center();
    let mut group = svg_element::Group::new();

    match element.kind {
        ElementKind::Rectangle => {
            let radius = if element.properties.contains_key("roundness") { 8.0 } else { 0.0 };
            group = group.add(
                svg_element::Rectangle::new()
                    .set("x", element.x)
                    .set("y", element.y)
                    .set("width", element.width)
                    .set("height", element.height)
                    .set("rx", radius)
                    .set("fill", fill)
                    .set("stroke", stroke)
                    .set("stroke-width", 2),
            );
        }
        ElementKind::Diamond | ElementKind::Rhombus => {
            let corners = [
                (cx, element.y),
                (element.x + element.width, cy),
                (cx, element.y + element.height),
                (element.x, cy),
            ];
            group = group.add(
                svg_element::Polygon::new()
                    .set("points", point_list(&corners))
                    .set("fill", fill)
                    .set("stroke", stroke)
                    .set("stroke-width", 2),
            );
        }
        ElementKind::Ellipse | ElementKind::Circle => {
            group = group.add(
                svg_element::Ellipse::new()
                    .set("cx", cx)
                    .set("cy", cy)
                    .set("rx", element.width / 2.0)
                    .set("ry", element.height / 2.0)
                    .set("fill", fill)
                    .set("stroke", stroke)
                    .set("stroke-width", 2),
            );
        }
        ElementKind::Arrow | ElementKind::Line => {
            let points = connector_points(element);
            group = group.add(
                svg_element::Polyline::new()
                    .set("points", point_list(&points))
                    .set("fill", "none")
                    .set("stroke", stroke.clone())
                    .set("stroke-width", 2),
            );
            if element.kind == ElementKind::Arrow {
                if let [.., from, tip] = points.as_slice() {
                    let [a, b] = arrowhead(*from, *tip);
                    let head = svg_element::Polygon::new().set("points", point_list(&[*tip, a, b])).set("fill", stroke);
                    group = group.add(head);
                }
            }
            if let (Some(text), Some(first), Some(last)) = (label(element), points.first(), points.last()) {
                let (mx, my) = ((first.0 + last.0) / 2.0, (first.1 + last.1) / 2.0);
                group = group.add(render_text(mx, my - 6.0, text));
            }
            return Some(group);
        }
        ElementKind::Text | ElementKind::Freedraw | ElementKind::Image | ElementKind::Unknown => return None,
    }

    if let Some(text) = label(element) {
        group = group.add(render_text(cx, cy, text));
    }
    Some(group)
}

fn point_list(points: &[(f64, f64)]) -> String {
    points.iter().map(|(x, y)| format!("{x},{y}")).collect::<Vec<_>>().join(" ")
}

fn render_text(x: f64, y: f64, text: &str) -> svg_element::Text {
    svg_element::Text::new("")
        .set("x", x)
        .set("y", y)
        .set("text-anchor", "middle")
        .set("dominant-baseline", "middle")
        .set("font-family", "sans-serif")
        .set("font-size", 14)
        .set("fill", "#1e1e1e")
        .add(SvgText::new(text))
}

// =============================================================================
// PNG
// =============================================================================

/// Parse `#rrggbb`; anything else draws in the default stroke.
fn parse_color(hex: &str) -> Rgba<u8> {
    let Some(digits) = hex.strip_prefix('#').filter(|d| d.len() == 6) else {
        return DEFAULT_STROKE;
    };
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16);
    match (channel(0), channel(2), channel(4)) {
        (Ok(r), Ok(g), Ok(b)) => Rgba([r, g, b, 255]),
        _ => DEFAULT_STROKE,
    }
}

/// Pixel canvas offset so that the frame origin lands at (0, 0).
struct Raster {
    image: RgbaImage,
    origin: (f64, f64),
}

#[allow(clippy::cast_possible_truncation)]
fn px(v: f64) -> i64 {
    v.round() as i64
}

impl Raster {
    fn plot(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return;
        };
        if let Some(pixel) = self.image.get_pixel_mut_checked(x, y) {
            *pixel = color;
        }
    }

    /// Bresenham segment between two scene points.
    fn line(&mut self, from: (f64, f64), to: (f64, f64), color: Rgba<u8>) {
        let (mut x0, mut y0) = (px(from.0 - self.origin.0), px(from.1 - self.origin.1));
        let (x1, y1) = (px(to.0 - self.origin.0), px(to.1 - self.origin.1));
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.plot(x0, y0, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn polyline(&mut self, points: &[(f64, f64)], color: Rgba<u8>) {
        for pair in points.windows(2) {
            self.line(pair[0], pair[1], color);
        }
    }

    fn ellipse(&mut self, element: &VisualElement, color: Rgba<u8>) {
        const STEPS: u32 = 96;
        let (cx, cy) = element.center();
        let (rx, ry) = (element.width / 2.0, element.height / 2.0);
        let points: Vec<(f64, f64)> = (0..=STEPS)
            .map(|i| {
                let t = std::f64::consts::TAU * f64::from(i) / f64::from(STEPS);
                (cx + rx * t.cos(), cy + ry * t.sin())
            })
            .collect();
        self.polyline(&points, color);
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn raster_edge(v: f64) -> u32 {
    v.ceil().clamp(1.0, f64::from(u32::MAX)) as u32
}

/// Rasterize live elements as a PNG image (outlines only).
///
/// # Errors
///
/// Returns [`ExportError::EmptyScene`] when no live element remains,
/// [`ExportError::TooLarge`] when the frame exceeds [`MAX_RASTER_EDGE`], or
/// [`ExportError::Encode`] if PNG encoding fails.
pub fn png(elements: &[VisualElement]) -> Result<Vec<u8>, ExportError> {
    let live = non_deleted(elements);
    let frame = frame(&live).ok_or(ExportError::EmptyScene)?;
    let (width, height) = (raster_edge(frame.width), raster_edge(frame.height));
    if width > MAX_RASTER_EDGE || height > MAX_RASTER_EDGE {
        return Err(ExportError::TooLarge { width, height });
    }

    let mut raster = Raster {
        image: RgbaImage::from_pixel(width, height, BACKGROUND),
        origin: (frame.min_x, frame.min_y),
    };

    for element in &live {
        let color = parse_color(stroke_hex(element));
        let (x0, y0) = (element.x, element.y);
        let (x1, y1) = (element.x + element.width, element.y + element.height);
        let (cx, cy) = element.center();
        match element.kind {
            ElementKind::Rectangle => {
                raster.polyline(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)], color);
            }
            ElementKind::Diamond | ElementKind::Rhombus => {
                raster.polyline(&[(cx, y0), (x1, cy), (cx, y1), (x0, cy), (cx, y0)], color);
            }
            ElementKind::Ellipse | ElementKind::Circle => raster.ellipse(element, color),
            ElementKind::Arrow | ElementKind::Line => {
                let points = connector_points(element);
                raster.polyline(&points, color);
                if element.kind == ElementKind::Arrow {
                    if let [.., from, tip] = points.as_slice() {
                        for barb in arrowhead(*from, *tip) {
                            raster.line(*tip, barb, color);
                        }
                    }
                }
            }
            ElementKind::Text | ElementKind::Freedraw | ElementKind::Image | ElementKind::Unknown => {}
        }
    }

    let mut bytes = Vec::new();
    raster.image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    debug!(width, height, bytes = bytes.len(), "export: PNG encoded");
    Ok(bytes)
}

#[cfg(test)]
#[path = "export_test.rs"]
mod tests;
