//! Line-oriented parser for flowchart syntax.
//!
//! Each line holds one or more `;`-separated statements. A statement is a
//! chain `node (--> node)*` where every node may carry an inline shape and
//! label, e.g. `A[Start] -->|go| B{Check?} --> C((Done))`.

use tracing::debug;

use super::ast::{Edge, Flowchart, Node, Shape};
use crate::dsl::{Direction, FLOWCHART_KEYWORDS, has_declaration};
use crate::text_to_graph::ParseError;

/// Statements accepted by the grammar but not drawn.
const IGNORED_DIRECTIVES: &[&str] = &["style", "classDef", "class", "linkStyle", "click", "subgraph", "end"];

/// Parse flowchart text into an AST.
///
/// Accepts text with or without the `graph`/`flowchart` header line.
///
/// # Errors
///
/// Returns [`ParseError::Syntax`] with a 1-based line number for malformed
/// statements, and [`ParseError::Unsupported`] when the text declares a
/// different diagram type.
pub fn parse(input: &str) -> Result<Flowchart, ParseError> {
    let mut chart = Flowchart::default();
    let mut first = true;

    for (idx, raw) in input.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with("%%") {
            continue;
        }

        for statement in split_statements(trimmed) {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            if std::mem::take(&mut first) {
                if let Some(direction) = parse_header(statement, line)? {
                    chart.direction = direction;
                    continue;
                }
            }
            if is_ignored_directive(statement) {
                debug!(line, statement, "flowchart: ignoring directive");
                continue;
            }
            parse_statement(statement, line, &mut chart)?;
        }
    }

    Ok(chart)
}

/// `Some(direction)` for a flowchart header, `None` if the statement is not
/// a header at all.
fn parse_header(statement: &str, line: usize) -> Result<Option<Direction>, ParseError> {
    let mut tokens = statement.split_whitespace();
    let Some(keyword) = tokens.next() else {
        return Ok(None);
    };

    if FLOWCHART_KEYWORDS.contains(&keyword) {
        let direction = match tokens.next() {
            None => Direction::default(),
            Some(token) => Direction::from_token(token).ok_or_else(|| ParseError::Syntax {
                line,
                message: format!("unknown direction `{token}`"),
            })?,
        };
        if let Some(extra) = tokens.next() {
            return Err(ParseError::Syntax { line, message: format!("unexpected `{extra}` after declaration") });
        }
        return Ok(Some(direction));
    }

    if has_declaration(statement) {
        return Err(ParseError::Unsupported(keyword.to_owned()));
    }
    Ok(None)
}

fn is_ignored_directive(statement: &str) -> bool {
    statement
        .split_whitespace()
        .next()
        .is_some_and(|word| IGNORED_DIRECTIVES.contains(&word))
}

/// Split on `;` outside labels, quotes, and pipe-delimited edge labels.
fn split_statements(line: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut piped = false;
    let mut start = 0;

    for (i, c) in line.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '|' if !quoted && depth == 0 => piped = !piped,
            '[' | '(' | '{' if !quoted => depth += 1,
            ']' | ')' | '}' if !quoted => depth = depth.saturating_sub(1),
            ';' if !quoted && !piped && depth == 0 => {
                parts.push(&line[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&line[start..]);
    parts
}

fn parse_statement(statement: &str, line: usize, chart: &mut Flowchart) -> Result<(), ParseError> {
    let mut cursor = Cursor { src: statement, pos: 0, line };
    let mut from = register(chart, cursor.node()?);

    loop {
        cursor.skip_ws();
        if cursor.is_done() {
            return Ok(());
        }
        let Some(arrow) = cursor.arrow()? else {
            return Err(cursor.error(format!("unexpected `{}`", cursor.rest())));
        };
        let to = register(chart, cursor.node()?);
        chart.edges.push(Edge { from, to: to.clone(), label: arrow.label });
        from = to;
    }
}

/// Record a node mention and return its id.
///
/// A later mention with an explicit shape replaces the earlier label and
/// shape; a bare mention never does.
fn register(chart: &mut Flowchart, mention: Mention<'_>) -> String {
    let id = mention.id.to_owned();
    if let Some(node) = chart.nodes.iter_mut().find(|n| n.id == id) {
        if let Some((shape, label)) = mention.shape {
            node.shape = shape;
            node.label = label;
        }
        return id;
    }
    let (shape, label) = mention.shape.unwrap_or_else(|| (Shape::Rect, id.clone()));
    chart.nodes.push(Node { id: id.clone(), label, shape });
    id
}

fn strip_quotes(text: &str) -> &str {
    text.strip_prefix('"').and_then(|t| t.strip_suffix('"')).unwrap_or(text)
}

// =============================================================================
// CURSOR
// =============================================================================

struct Arrow {
    label: Option<String>,
}

struct Mention<'a> {
    id: &'a str,
    shape: Option<(Shape, String)>,
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn is_done(&self) -> bool {
        self.rest().is_empty()
    }

    fn skip_ws(&mut self) {
        self.pos = self.src.len() - self.rest().trim_start().len();
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    /// Consume up to and including `closer`, returning the text before it.
    fn until(&mut self, closer: &str) -> Option<&'a str> {
        let rest = self.rest();
        let end = rest.find(closer)?;
        self.pos += end + closer.len();
        Some(&rest[..end])
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax { line: self.line, message: message.into() }
    }

    fn ident(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    fn node(&mut self) -> Result<Mention<'a>, ParseError> {
        self.skip_ws();
        let Some(id) = self.ident() else {
            return Err(if self.is_done() {
                self.error("expected node id")
            } else {
                self.error(format!("expected node id, found `{}`", self.rest()))
            });
        };

        let shape = if self.eat("((") {
            Some((Shape::Circle, self.label("))")?))
        } else if self.eat("(") {
            Some((Shape::Rounded, self.label(")")?))
        } else if self.eat("[") {
            Some((Shape::Rect, self.label("]")?))
        } else if self.eat("{") {
            Some((Shape::Diamond, self.label("}")?))
        } else {
            None
        };
        Ok(Mention { id, shape })
    }

    fn label(&mut self, closer: &str) -> Result<String, ParseError> {
        self.skip_ws();
        if self.eat("\"") {
            let Some(text) = self.until("\"") else {
                return Err(self.error("unterminated quoted label"));
            };
            self.skip_ws();
            if !self.eat(closer) {
                return Err(self.error(format!("expected `{closer}` after quoted label")));
            }
            return Ok(text.to_owned());
        }
        match self.until(closer) {
            Some(text) => Ok(text.trim().to_owned()),
            None => Err(self.error(format!("missing `{closer}`"))),
        }
    }

    /// `None` if the cursor is not on an arrow.
    fn arrow(&mut self) -> Result<Option<Arrow>, ParseError> {
        if !self.eat("-->") {
            return Ok(None);
        }
        self.skip_ws();
        if !self.eat("|") {
            return Ok(Some(Arrow { label: None }));
        }
        let Some(raw) = self.until("|") else {
            return Err(self.error("unterminated edge label"));
        };
        let label = strip_quotes(raw.trim()).trim();
        Ok(Some(Arrow { label: (!label.is_empty()).then(|| label.to_owned()) }))
    }
}
