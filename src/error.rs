//! Error codes shared by every surface-facing error type.
//!
//! DESIGN
//! ======
//! Each module owns its own `thiserror` enum. Surfaces never match on those
//! enums across module boundaries; they present the grepable code and the
//! retryable flag exposed through [`ErrorCode`], plus the display message.

use serde::{Deserialize, Serialize};

use crate::store::Surface;

/// Grepable error code and retryable flag for surface-attached errors.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// An error message attached to the surface that produced it.
///
/// Stored in the [`crate::store::DiagramStore`] error slot. The originating
/// surface is kept so a canvas failure is never presented as a text failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceError {
    pub surface: Surface,
    pub code: String,
    pub message: String,
}

impl SurfaceError {
    /// Capture an error raised on `surface`.
    pub fn new(surface: Surface, error: &dyn ErrorCode) -> Self {
        Self { surface, code: error.error_code().to_owned(), message: error.to_string() }
    }
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.surface, self.code, self.message)
    }
}
