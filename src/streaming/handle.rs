//! Consumer-side stream handles.

use async_stream::stream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::types::{ChunkStream, FinishReason, StreamChunk, Usage};

/// Final accounting for one stream, resolved out of band from the chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMetadata {
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
    /// Set when the stream ended by cancellation; usage then covers only
    /// what the provider reported before the cut.
    pub cancelled: bool,
}

/// Resolves once per stream, whether it ran to completion or was cancelled.
#[derive(Debug)]
pub struct MetadataHandle {
    rx: oneshot::Receiver<StreamMetadata>,
}

impl MetadataHandle {
    pub(crate) fn new(rx: oneshot::Receiver<StreamMetadata>) -> Self {
        Self { rx }
    }

    /// Wait for the stream's final metadata. A producer that went away
    /// without reporting resolves as a cancelled stream with zero usage.
    pub async fn wait(self) -> StreamMetadata {
        self.rx.await.unwrap_or(StreamMetadata {
            usage: Usage::default(),
            finish_reason: None,
            cancelled: true,
        })
    }
}

/// A live streaming call: the chunk sequence, a cancellation lever, and the
/// out-of-band metadata handle.
#[derive(Debug)]
pub struct StreamResponse {
    receiver: mpsc::Receiver<StreamChunk>,
    metadata: MetadataHandle,
    cancel: CancellationToken,
}

impl StreamResponse {
    pub(crate) fn new(
        receiver: mpsc::Receiver<StreamChunk>,
        metadata: MetadataHandle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            metadata,
            cancel,
        }
    }

    /// Next chunk, or `None` once the stream is over.
    pub async fn next_chunk(&mut self) -> Option<StreamChunk> {
        self.receiver.recv().await
    }

    /// Ask the producer to stop. Chunks already queued remain readable;
    /// the stream then ends without a terminal meta chunk and the metadata
    /// handle resolves with `cancelled` set.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token other tasks can use to cancel this stream.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Split into a plain chunk stream, the metadata handle, and the
    /// cancellation token.
    pub fn split(self) -> (ChunkStream, MetadataHandle, CancellationToken) {
        let mut receiver = self.receiver;
        let chunks: ChunkStream = Box::pin(stream! {
            while let Some(chunk) = receiver.recv().await {
                yield chunk;
            }
        });
        (chunks, self.metadata, self.cancel)
    }

    /// Drain the remaining chunks and return the final metadata.
    pub async fn finish(mut self) -> StreamMetadata {
        while self.receiver.recv().await.is_some() {}
        self.metadata.wait().await
    }
}
