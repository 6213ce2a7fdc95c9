//! Canonical response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::chat::{Context, Message};
use super::usage::{FinishReason, Usage};

/// The value returned to the caller for a completed (non-streaming) call, or
/// assembled from a drained chunk stream.
///
/// Constructed exactly once per call by the response assembler. `context` is
/// the input context with the new assistant message appended; earlier
/// messages are never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Provider-assigned response id, or a generated one.
    pub id: String,
    /// Model that actually served the request, as reported by the provider.
    pub model: String,
    /// Provider-reported creation time, or the assembly time when the
    /// provider reports none.
    pub created: DateTime<Utc>,
    /// Conversation history after appending the new message.
    pub context: Context,
    /// The generated message. `None` when the call produced no message
    /// (e.g. a stream that was cancelled before any content).
    pub message: Option<Message>,
    /// Normalized token accounting.
    pub usage: Usage,
    /// Normalized finish reason, when the provider reported one.
    pub finish_reason: Option<FinishReason>,
    /// Vendor fields preserved verbatim for callers that need them.
    #[serde(default)]
    pub provider_meta: Map<String, Value>,
    /// Parsed structured object for schema-constrained generation. `None`
    /// when not requested or when the output did not parse.
    pub object: Option<Value>,
    /// Cost computed from the model's rate table, when one is known.
    pub cost: Option<f64>,
}

impl Response {
    /// Text of the generated message, if any.
    pub fn text(&self) -> Option<String> {
        self.message.as_ref().map(Message::text)
    }
}

/// Result of an embedding call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub model: String,
    pub embeddings: Vec<Vec<f32>>,
    pub usage: Usage,
}
