//! Streaming chunk types.

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::pin::Pin;

/// Smallest unit of streamed output.
///
/// Chunks are infallible by design: per-event streaming faults are degraded
/// inside the decoder rather than surfaced to the consumer, so the chunk
/// stream never yields errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Incremental text content.
    Content { text: String },
    /// A tool call. Depending on `metadata`, either fully resolved or an
    /// in-flight fragment the decoder is still accumulating (fragments carry
    /// `call_index` and `arguments_fragment`; resolved calls carry parsed
    /// `arguments`).
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    /// Incremental reasoning text.
    Thinking { text: String },
    /// Stream metadata. A chunk with `terminal: true` carries the final usage
    /// and finish reason, is emitted at most once, and is always last.
    Meta {
        data: Map<String, Value>,
        #[serde(default)]
        terminal: bool,
    },
}

impl StreamChunk {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content { text: text.into() }
    }

    pub fn thinking(text: impl Into<String>) -> Self {
        Self::Thinking { text: text.into() }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Meta { terminal: true, .. })
    }
}

/// Single-pass stream of chunks handed to the consumer.
pub type ChunkStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// One discrete event parsed out of a raw transport frame: an event name and
/// a structured payload. Adapters map these into [`StreamChunk`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEventRecord {
    pub name: String,
    pub data: Value,
}

impl StreamEventRecord {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

// Consumers hand chunk streams across tasks; keep that guaranteed.
static_assertions::assert_impl_all!(ChunkStream: Send);
