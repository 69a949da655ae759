//! Assistant surface: conversational edits to the diagram.
//!
//! DESIGN
//! ======
//! Language generation is external ([`ChatBackend`]). This module owns the
//! transcript and the contract around each exchange: every registered
//! [`ChatInterceptor`] sees the outgoing request before it is sent and the
//! reply after it arrives. [`DiagramContextInterceptor`] uses that contract
//! to attach the current diagram to the user's message and to feed the
//! diagram block of the reply back into the store via `from_ai`.
//!
//! A backend failure never reaches the store; the transcript is only
//! extended once a non-empty reply has arrived.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ErrorCode;
use crate::store::DiagramStore;

/// System prompt sent with every assistant request.
pub const FLOWCHART_SYSTEM_PROMPT: &str = "You are a flowchart specialist that helps users create and modify Mermaid-syntax flowcharts.

When responding to a user request, please follow these guidelines:
1. Always include the COMPLETE, UPDATED flowchart Mermaid code in your response.
2. Put the code in a code block with the mermaid syntax tag: ```mermaid ... ```
3. Keep your explanations brief and focused on the changes you've made.
4. Ensure your Mermaid syntax is correct and follows best practices.
5. For user experience, maintain the graph TD direction unless specifically asked to change it.

The user will provide the current flowchart (if any) in their message. If they don't, assume they want to start from scratch.";

const FENCE: &str = "```";
const DIAGRAM_TAG: &str = "mermaid";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssistantError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("assistant returned an empty reply")]
    EmptyReply,

    /// The chat backend could not be reached or failed mid-request.
    #[error("chat backend request failed: {0}")]
    Backend(String),

    /// The chat backend answered with a non-success status.
    #[error("chat backend error: status {status}")]
    BackendStatus { status: u16, body: String },
}

impl ErrorCode for AssistantError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "E_EMPTY_MESSAGE",
            Self::EmptyReply => "E_EMPTY_REPLY",
            Self::Backend(_) => "E_CHAT_BACKEND",
            Self::BackendStatus { .. } => "E_CHAT_STATUS",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::BackendStatus { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// One outgoing exchange: system prompt plus the full message list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub content: String,
}

// =============================================================================
// EXTRACTION
// =============================================================================

/// First fenced code block in `text`, optionally tagged `mermaid`, trimmed.
///
/// Returns `None` when there is no closed fence or the block is blank.
#[must_use]
pub fn extract_diagram_block(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after = &text[open + FENCE.len()..];
    let body = after.strip_prefix(DIAGRAM_TAG).unwrap_or(after);
    let close = body.find(FENCE)?;
    let block = body[..close].trim();
    (!block.is_empty()).then_some(block)
}

/// Wrap `request` with the current diagram, as sent to the backend.
#[must_use]
pub fn with_diagram_context(diagram: &str, request: &str) -> String {
    format!("Current flowchart:\n{FENCE}{DIAGRAM_TAG}\n{diagram}\n{FENCE}\n\nMy request: {request}")
}

// =============================================================================
// INTERCEPTORS
// =============================================================================

/// Hooks the chat transport invokes around every exchange.
pub trait ChatInterceptor: Send + Sync {
    fn before_send(&self, _request: &mut ChatRequest) {}

    fn after_receive(&self, _reply: &ChatReply) {}
}

/// Carries the canonical diagram into requests and replies into the store.
pub struct DiagramContextInterceptor {
    store: DiagramStore,
}

impl DiagramContextInterceptor {
    #[must_use]
    pub fn new(store: DiagramStore) -> Self {
        Self { store }
    }
}

impl ChatInterceptor for DiagramContextInterceptor {
    fn before_send(&self, request: &mut ChatRequest) {
        let Some(last) = request.messages.last_mut() else {
            return;
        };
        if last.role != Role::User || last.content.contains(&format!("{FENCE}{DIAGRAM_TAG}")) {
            return;
        }
        last.content = with_diagram_context(&self.store.text(), &last.content);
        debug!("assistant: attached current diagram to request");
    }

    fn after_receive(&self, reply: &ChatReply) {
        match extract_diagram_block(&reply.content) {
            Some(block) => {
                let changed = self.store.from_ai(block);
                info!(changed, bytes = block.len(), "assistant: diagram extracted from reply");
            }
            None => debug!("assistant: reply carried no diagram block"),
        }
    }
}

// =============================================================================
// CONVERSATION
// =============================================================================

/// External language generation.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatReply, AssistantError>;
}

/// Conversation driver for one document.
pub struct Assistant {
    backend: Arc<dyn ChatBackend>,
    interceptors: Vec<Arc<dyn ChatInterceptor>>,
    transcript: Vec<ChatMessage>,
    system_prompt: String,
}

impl Assistant {
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            interceptors: Vec::new(),
            transcript: Vec::new(),
            system_prompt: FLOWCHART_SYSTEM_PROMPT.to_owned(),
        }
    }

    /// Assistant wired to `store` through a [`DiagramContextInterceptor`].
    #[must_use]
    pub fn for_store(backend: Arc<dyn ChatBackend>, store: DiagramStore) -> Self {
        Self::new(backend).with_interceptor(Arc::new(DiagramContextInterceptor::new(store)))
    }

    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn ChatInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Messages as the user saw them, without injected context.
    #[must_use]
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Send one user message and return the reply.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::EmptyMessage`] for blank input,
    /// [`AssistantError::EmptyReply`] for a blank answer, or the backend's
    /// error. The transcript is unchanged on error.
    pub async fn send(&mut self, message: &str) -> Result<ChatReply, AssistantError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AssistantError::EmptyMessage);
        }

        let mut messages = self.transcript.clone();
        messages.push(ChatMessage::user(message));
        let mut request = ChatRequest { system: self.system_prompt.clone(), messages };
        for interceptor in &self.interceptors {
            interceptor.before_send(&mut request);
        }

        debug!(messages = request.messages.len(), "assistant: sending request");
        let reply = match self.backend.complete(&request).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, retryable = err.retryable(), "assistant: backend failed");
                return Err(err);
            }
        };
        if reply.content.trim().is_empty() {
            return Err(AssistantError::EmptyReply);
        }

        self.transcript.push(ChatMessage::user(message));
        self.transcript.push(ChatMessage::assistant(reply.content.clone()));
        for interceptor in &self.interceptors {
            interceptor.after_receive(&reply);
        }
        Ok(reply)
    }
}

#[cfg(test)]
#[path = "assistant_test.rs"]
mod tests;
