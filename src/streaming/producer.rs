//! The producer task that drives one live stream.

use std::sync::Arc;

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adapter::ProviderAdapter;
use crate::types::{ModelDescriptor, StreamEventRecord};

use super::decoder::StreamDecoder;
use super::handle::{MetadataHandle, StreamResponse};

/// Bounded so a slow consumer backpressures the transport instead of
/// buffering the whole response.
const CHANNEL_CAPACITY: usize = 32;

/// Spawn the producer for one streaming call.
///
/// The producer parses the byte stream as server-sent events, runs each event
/// through the adapter and the decoder, and forwards chunks over a bounded
/// channel. It owns the stream lifecycle: end-of-stream finalization, the
/// single terminal meta chunk, and the metadata handle resolution. On
/// cancellation it stops without finalizing and resolves the metadata with
/// whatever usage arrived before the cut.
pub(crate) fn spawn_producer<S, E>(
    bytes: S,
    adapter: Arc<dyn ProviderAdapter>,
    model: ModelDescriptor,
) -> StreamResponse
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (meta_tx, meta_rx) = oneshot::channel();
    let cancel = CancellationToken::new();
    let producer_cancel = cancel.clone();

    tokio::spawn(async move {
        let mut events = Box::pin(bytes.eventsource());
        let mut decoder = StreamDecoder::new(adapter.clone(), model.clone());
        decoder.on_connected();
        let mut cancelled = false;

        loop {
            tokio::select! {
                biased;
                _ = producer_cancel.cancelled() => {
                    debug!("stream cancelled by consumer");
                    cancelled = true;
                    break;
                }
                next = events.next() => match next {
                    None => break,
                    Some(Err(err)) => {
                        // Transport faults end the stream; what arrived so
                        // far stays valid and the metadata still resolves.
                        warn!(error = %err, "stream transport error, ending stream");
                        break;
                    }
                    Some(Ok(event)) => {
                        if event.data.trim() == "[DONE]" {
                            break;
                        }
                        let payload: serde_json::Value = match serde_json::from_str(&event.data) {
                            Ok(value) => value,
                            Err(err) => {
                                // Malformed events are dropped, never fatal.
                                warn!(error = %err, "dropping malformed stream event");
                                continue;
                            }
                        };
                        let name = if event.event.is_empty() {
                            "message".to_string()
                        } else {
                            event.event.clone()
                        };
                        let record = StreamEventRecord::new(name, payload);
                        let chunks = adapter.decode_stream_event(&record, &model);
                        for chunk in decoder.absorb(chunks) {
                            // A gone consumer does not stop decoding; usage
                            // still accumulates for the metadata handle.
                            let _ = tx.send(chunk).await;
                        }
                    }
                }
            }
        }

        if !cancelled {
            for chunk in decoder.finalize() {
                let _ = tx.send(chunk).await;
            }
        }
        let _ = meta_tx.send(decoder.metadata(cancelled));
    });

    StreamResponse::new(rx, MetadataHandle::new(meta_rx), cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::DefaultAdapter;
    use crate::types::{FinishReason, StreamChunk};
    use serde_json::json;

    fn sse_frame(value: serde_json::Value) -> Result<bytes::Bytes, std::convert::Infallible> {
        Ok(bytes::Bytes::from(format!("data: {value}\n\n")))
    }

    fn done_frame() -> Result<bytes::Bytes, std::convert::Infallible> {
        Ok(bytes::Bytes::from("data: [DONE]\n\n".to_string()))
    }

    fn setup() -> (Arc<dyn ProviderAdapter>, ModelDescriptor) {
        (
            Arc::new(DefaultAdapter::new("acme", "https://api.test/v1")),
            ModelDescriptor::bare("acme", "standard-chat"),
        )
    }

    #[tokio::test]
    async fn content_stream_ends_with_terminal_meta() {
        let (adapter, model) = setup();
        let frames = vec![
            sse_frame(json!({ "choices": [{ "delta": { "content": "Hel" } }] })),
            sse_frame(json!({ "choices": [{ "delta": { "content": "lo" }, "finish_reason": "stop" }] })),
            sse_frame(json!({ "choices": [], "usage": { "prompt_tokens": 5, "completion_tokens": 3 } })),
            done_frame(),
        ];
        let mut response = spawn_producer(futures::stream::iter(frames), adapter, model);

        let mut collected = Vec::new();
        while let Some(chunk) = response.next_chunk().await {
            collected.push(chunk);
        }
        assert_eq!(collected.len(), 3);
        assert_eq!(collected[0], StreamChunk::content("Hel"));
        assert_eq!(collected[1], StreamChunk::content("lo"));
        assert!(collected[2].is_terminal());
    }

    #[tokio::test]
    async fn malformed_events_are_dropped_not_fatal() {
        let (adapter, model) = setup();
        let frames = vec![
            Ok(bytes::Bytes::from("data: {not json\n\n".to_string())),
            sse_frame(json!({ "choices": [{ "delta": { "content": "ok" } }] })),
            done_frame(),
        ];
        let mut response = spawn_producer(futures::stream::iter(frames), adapter, model);

        let first = response.next_chunk().await.unwrap();
        assert_eq!(first, StreamChunk::content("ok"));
    }

    #[tokio::test]
    async fn metadata_resolves_after_completion() {
        let (adapter, model) = setup();
        let frames = vec![
            sse_frame(json!({ "choices": [{ "delta": { "content": "hi" }, "finish_reason": "stop" }] })),
            sse_frame(json!({ "choices": [], "usage": { "prompt_tokens": 2, "completion_tokens": 1 } })),
            done_frame(),
        ];
        let response = spawn_producer(futures::stream::iter(frames), adapter, model);
        let metadata = response.finish().await;
        assert!(!metadata.cancelled);
        assert_eq!(metadata.usage.input_tokens, 2);
        assert_eq!(metadata.finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn cancellation_skips_the_terminal_chunk() {
        let (adapter, model) = setup();
        // A stream that never ends on its own.
        let frames = futures::stream::unfold(0u32, |n| async move {
            if n == 0 {
                Some((
                    Ok::<_, std::convert::Infallible>(bytes::Bytes::from(
                        "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n".to_string(),
                    )),
                    1,
                ))
            } else {
                futures::future::pending().await
            }
        });
        let mut response = spawn_producer(frames, adapter, model);

        let first = response.next_chunk().await.unwrap();
        assert_eq!(first, StreamChunk::content("hi"));

        response.cancel();
        // Channel closes without a terminal meta chunk.
        while let Some(chunk) = response.next_chunk().await {
            assert!(!chunk.is_terminal());
        }
        let metadata = response.finish().await;
        assert!(metadata.cancelled);
    }
}
