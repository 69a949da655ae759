//! Text → graph converter: canonical text into visual elements for rendering.
//!
//! DESIGN
//! ======
//! The heavy lifting belongs to a [`DiagramParser`] collaborator (the
//! built-in [`crate::flowchart::FlowchartParser`] or a host layout engine).
//! This module wraps it with three things the collaborator cannot provide:
//!
//! - normalization of bare fragments (`A-->B` is read as `graph TD\nA-->B`)
//! - a serialization guard: at most one collaborator call is ever in flight;
//!   later callers retry after a fixed backoff instead of queueing. The call
//!   runs as its own task that owns the guard, so a caller that gives up on
//!   a slow collaborator never lets a second call start beside it
//! - a cache-of-one keyed on the last successfully converted text
//!
//! Every request takes a ticket from a monotonic counter. A result whose
//! ticket is no longer the latest is reported as
//! [`ConversionOutcome::Superseded`] and must not be rendered, whether it
//! succeeded or failed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::dsl::normalize;
use crate::element::VisualElement;
use crate::error::ErrorCode;

// =============================================================================
// COLLABORATOR
// =============================================================================

/// Grammar/layout engine turning diagram text into positioned elements.
///
/// Implementations may hold global state that is unsafe for concurrent use;
/// [`TextToGraph`] never calls `parse` twice at once.
#[async_trait::async_trait]
pub trait DiagramParser: Send + Sync {
    async fn parse(&self, text: &str) -> Result<Vec<VisualElement>, ParseError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("diagram text is empty")]
    Empty,
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("unsupported diagram type: {0}")]
    Unsupported(String),
    #[error("layout engine failed: {0}")]
    Collaborator(String),
    #[error("layout engine did not answer within {0:?}")]
    Timeout(Duration),
}

impl ErrorCode for ParseError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "E_EMPTY_DIAGRAM",
            Self::Syntax { .. } => "E_SYNTAX",
            Self::Unsupported(_) => "E_UNSUPPORTED_DIAGRAM",
            Self::Collaborator(_) => "E_LAYOUT_FAILED",
            Self::Timeout(_) => "E_LAYOUT_TIMEOUT",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Collaborator(_) | Self::Timeout(_))
    }
}

// =============================================================================
// CONVERTER
// =============================================================================

/// Result of a conversion request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    /// Fresh elements for the latest requested text.
    Converted(Vec<VisualElement>),
    /// The normalized text matches the last successful conversion.
    Unchanged,
    /// A newer request was issued while this one was waiting or running.
    Superseded,
}

pub struct TextToGraph {
    parser: Arc<dyn DiagramParser>,
    in_flight: Arc<AtomicBool>,
    requests: AtomicU64,
    last_converted: Mutex<Option<String>>,
    retry: Duration,
    timeout: Duration,
}

/// Holds the serialization flag; releases it on every exit path.
struct ParseGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ParseGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl TextToGraph {
    #[must_use]
    pub fn new(parser: Arc<dyn DiagramParser>, config: &EngineConfig) -> Self {
        Self {
            parser,
            in_flight: Arc::new(AtomicBool::new(false)),
            requests: AtomicU64::new(0),
            last_converted: Mutex::new(None),
            retry: config.parse_retry,
            timeout: config.parse_timeout,
        }
    }

    /// Ticket of the most recent request.
    #[must_use]
    pub fn latest_request(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Normalized text of the last successful conversion.
    #[must_use]
    pub fn last_converted(&self) -> Option<String> {
        self.last_converted.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// `true` while a collaborator call is running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Convert `text` into elements.
    ///
    /// With `force`, the cache-of-one is bypassed and the collaborator is
    /// always consulted.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's [`ParseError`], [`ParseError::Empty`] for
    /// blank input, or [`ParseError::Timeout`]. A timed-out call keeps the
    /// guard until the collaborator actually returns. Failures of superseded
    /// requests are swallowed and reported as `Superseded`.
    pub async fn convert(&self, text: &str, force: bool) -> Result<ConversionOutcome, ParseError> {
        let ticket = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Err(ParseError::Empty);
        }

        if !force && self.last_converted().as_deref() == Some(normalized.as_ref()) {
            debug!(ticket, "text_to_graph: unchanged since last conversion");
            return Ok(ConversionOutcome::Unchanged);
        }

        let guard = self.acquire().await;
        if self.is_stale(ticket) {
            debug!(ticket, "text_to_graph: superseded before parse");
            return Ok(ConversionOutcome::Superseded);
        }

        debug!(ticket, force, bytes = normalized.len(), "text_to_graph: parsing");
        let parser = Arc::clone(&self.parser);
        let input = normalized.clone().into_owned();
        let mut call = tokio::spawn(async move {
            let result = parser.parse(&input).await;
            drop(guard);
            result
        });

        let result = match tokio::time::timeout(self.timeout, &mut call).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(ParseError::Collaborator(join.to_string())),
            Err(_elapsed) => {
                warn!(ticket, timeout_ms = self.timeout.as_millis(), "text_to_graph: parse timed out, guard held until it returns");
                Err(ParseError::Timeout(self.timeout))
            }
        };

        if self.is_stale(ticket) {
            debug!(ticket, latest = self.latest_request(), "text_to_graph: discarding stale result");
            return Ok(ConversionOutcome::Superseded);
        }

        match result {
            Ok(elements) => {
                info!(ticket, elements = elements.len(), "text_to_graph: converted");
                *self.last_converted.lock().unwrap_or_else(PoisonError::into_inner) = Some(normalized.into_owned());
                Ok(ConversionOutcome::Converted(elements))
            }
            Err(err) => {
                warn!(ticket, error = %err, "text_to_graph: parse failed");
                Err(err)
            }
        }
    }

    fn is_stale(&self, ticket: u64) -> bool {
        self.latest_request() != ticket
    }

    async fn acquire(&self) -> ParseGuard {
        loop {
            if self
                .in_flight
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return ParseGuard { flag: Arc::clone(&self.in_flight) };
            }
            tokio::time::sleep(self.retry).await;
        }
    }
}

#[cfg(test)]
#[path = "text_to_graph_test.rs"]
mod tests;
