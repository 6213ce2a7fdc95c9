//! Canonical data model.
//!
//! Every provider speaks its own wire format; these types are the single
//! vocabulary the rest of the crate (and the caller) works in. They carry no
//! behavior beyond construction helpers and invariant checks.

mod chat;
mod model;
mod response;
mod streaming;
mod usage;

pub use chat::{ContentPart, Context, Message, Role};
pub use model::{ModelCapabilities, ModelCost, ModelDescriptor, ModelInfo, ModelLimit};
pub use response::{EmbeddingResponse, Response};
pub use streaming::{ChunkStream, StreamChunk, StreamEventRecord};
pub use usage::{FinishReason, Usage};

/// The operation a single call performs against a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Free-form chat completion.
    Chat,
    /// Schema-constrained structured generation.
    Object,
    /// Embedding computation.
    Embedding,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Object => write!(f, "object"),
            Self::Embedding => write!(f, "embedding"),
        }
    }
}
