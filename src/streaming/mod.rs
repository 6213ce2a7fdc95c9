//! Streaming pipeline: event decoding, fragment accumulation, and the
//! producer/consumer split.
//!
//! The producer task owns the transport and the decoder; the consumer holds a
//! [`StreamResponse`] with the chunk channel, a cancellation lever, and a
//! [`MetadataHandle`] that resolves once per stream with the final usage and
//! finish reason.

mod accumulator;
mod decoder;
mod handle;
mod producer;

pub use handle::{MetadataHandle, StreamMetadata, StreamResponse};
pub(crate) use producer::spawn_producer;
