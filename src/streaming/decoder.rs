//! Stream decoding state machine.

use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::warn;

use crate::adapter::ProviderAdapter;
use crate::types::{FinishReason, ModelDescriptor, StreamChunk, Usage};

use super::accumulator::ToolCallAccumulator;
use super::handle::StreamMetadata;

/// Lifecycle of one decoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Idle,
    Receiving,
    Finalizing,
    Closed,
}

/// Folds adapter-decoded chunks into the consumer-facing sequence.
///
/// Tool-call fragments are absorbed rather than forwarded; the resolved call
/// is emitted once complete. Non-terminal meta chunks are folded into running
/// usage and finish-reason state, which surfaces exactly once in the terminal
/// meta chunk at end of stream. Usage payloads go through the adapter's
/// extraction, so overrides for exotic accounting are honored on streams too.
pub(crate) struct StreamDecoder {
    adapter: Arc<dyn ProviderAdapter>,
    model: ModelDescriptor,
    state: DecoderState,
    accumulator: ToolCallAccumulator,
    usage: Usage,
    finish_reason: Option<FinishReason>,
    terminal_emitted: bool,
}

impl StreamDecoder {
    pub(crate) fn new(adapter: Arc<dyn ProviderAdapter>, model: ModelDescriptor) -> Self {
        Self {
            adapter,
            model,
            state: DecoderState::Idle,
            accumulator: ToolCallAccumulator::default(),
            usage: Usage::default(),
            finish_reason: None,
            terminal_emitted: false,
        }
    }

    pub(crate) fn on_connected(&mut self) {
        debug_assert_eq!(self.state, DecoderState::Idle);
        self.state = DecoderState::Receiving;
    }

    /// Absorb adapter output for one event, returning the chunks to forward.
    pub(crate) fn absorb(&mut self, chunks: Vec<StreamChunk>) -> Vec<StreamChunk> {
        if self.state != DecoderState::Receiving {
            warn!("dropping chunks received outside the receiving state");
            return Vec::new();
        }
        let mut forward = Vec::new();
        for chunk in chunks {
            match chunk {
                StreamChunk::ToolCall {
                    id,
                    name,
                    arguments,
                    metadata,
                } => {
                    let index = metadata
                        .get("call_index")
                        .and_then(Value::as_u64);
                    match index {
                        Some(index) => {
                            self.accumulator.push_fragment(
                                index,
                                &id,
                                &name,
                                metadata.get("arguments_fragment").and_then(Value::as_str),
                            );
                            if metadata.get("completed").and_then(Value::as_bool) == Some(true) {
                                forward.extend(self.accumulator.resolve(index));
                            }
                        }
                        // No index means the adapter handed us a complete call.
                        None => forward.push(StreamChunk::ToolCall {
                            id,
                            name,
                            arguments,
                            metadata,
                        }),
                    }
                }
                StreamChunk::Meta { data, .. } => {
                    if let Some(usage) = data.get("usage") {
                        self.usage
                            .merge(&self.adapter.extract_usage(usage, &self.model));
                    }
                    if let Some(reason) = data.get("finish_reason").and_then(Value::as_str) {
                        self.finish_reason = Some(FinishReason::from_vendor(reason));
                    }
                }
                passthrough @ (StreamChunk::Content { .. } | StreamChunk::Thinking { .. }) => {
                    forward.push(passthrough);
                }
            }
        }
        forward
    }

    /// End of stream: pending tool calls resolve, then the terminal meta
    /// chunk. Emitted at most once; later calls yield nothing.
    pub(crate) fn finalize(&mut self) -> Vec<StreamChunk> {
        if self.terminal_emitted {
            return Vec::new();
        }
        self.terminal_emitted = true;
        self.state = DecoderState::Finalizing;

        let mut chunks = self.accumulator.resolve_all();
        if self.finish_reason.is_none() && chunks.iter().any(StreamChunk::is_tool_call_chunk) {
            self.finish_reason = Some(FinishReason::ToolCalls);
        }
        let mut data = Map::new();
        data.insert(
            "usage".into(),
            serde_json::to_value(&self.usage).unwrap_or(Value::Null),
        );
        if let Some(reason) = &self.finish_reason {
            data.insert("finish_reason".into(), json!(reason.as_str()));
        }
        chunks.push(StreamChunk::Meta {
            data,
            terminal: true,
        });
        self.state = DecoderState::Closed;
        chunks
    }

    /// Snapshot of the accumulated metadata, for the out-of-band handle.
    pub(crate) fn metadata(&self, cancelled: bool) -> StreamMetadata {
        StreamMetadata {
            usage: self.usage.clone(),
            finish_reason: self.finish_reason.clone(),
            cancelled,
        }
    }
}

impl StreamChunk {
    fn is_tool_call_chunk(&self) -> bool {
        matches!(self, Self::ToolCall { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::DefaultAdapter;

    fn decoder() -> StreamDecoder {
        StreamDecoder::new(
            Arc::new(DefaultAdapter::new("acme", "https://api.test/v1")),
            ModelDescriptor::bare("acme", "standard-chat"),
        )
    }

    fn fragment(index: u64, id: &str, name: &str, fragment: &str) -> StreamChunk {
        let mut metadata = Map::new();
        metadata.insert("call_index".into(), json!(index));
        metadata.insert("arguments_fragment".into(), json!(fragment));
        StreamChunk::ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: Value::Null,
            metadata,
        }
    }

    fn meta(data: Value) -> StreamChunk {
        StreamChunk::Meta {
            data: data.as_object().unwrap().clone(),
            terminal: false,
        }
    }

    #[test]
    fn content_passes_through_fragments_are_held_back() {
        let mut decoder = decoder();
        decoder.on_connected();
        let forwarded = decoder.absorb(vec![
            StreamChunk::content("Hel"),
            fragment(0, "call-1", "get_weather", "{\"ci"),
        ]);
        assert_eq!(forwarded, vec![StreamChunk::content("Hel")]);
    }

    #[test]
    fn finalize_resolves_calls_then_emits_terminal_meta_once() {
        let mut decoder = decoder();
        decoder.on_connected();
        decoder.absorb(vec![fragment(0, "call-1", "get_weather", "{\"city\":\"Paris\"}")]);
        decoder.absorb(vec![meta(json!({
            "usage": { "prompt_tokens": 5, "completion_tokens": 3 },
            "finish_reason": "tool_calls"
        }))]);

        let tail = decoder.finalize();
        assert_eq!(tail.len(), 2);
        assert!(matches!(&tail[0], StreamChunk::ToolCall { .. }));
        match &tail[1] {
            StreamChunk::Meta { data, terminal } => {
                assert!(*terminal);
                assert_eq!(data["finish_reason"], json!("tool_calls"));
                assert_eq!(data["usage"]["input_tokens"], json!(5));
            }
            other => panic!("unexpected chunk {other:?}"),
        }

        assert!(decoder.finalize().is_empty());
    }

    #[test]
    fn completed_flag_resolves_a_call_early() {
        let mut decoder = decoder();
        decoder.on_connected();
        decoder.absorb(vec![fragment(0, "call-1", "lookup", "{\"id\"")]);
        let mut metadata = Map::new();
        metadata.insert("call_index".into(), json!(0));
        metadata.insert("arguments_fragment".into(), json!(":3}"));
        metadata.insert("completed".into(), json!(true));
        let forwarded = decoder.absorb(vec![StreamChunk::ToolCall {
            id: String::new(),
            name: String::new(),
            arguments: Value::Null,
            metadata,
        }]);
        assert_eq!(forwarded.len(), 1);
        match &forwarded[0] {
            StreamChunk::ToolCall { arguments, .. } => assert_eq!(arguments, &json!({"id": 3})),
            other => panic!("unexpected chunk {other:?}"),
        }
    }

    #[test]
    fn metadata_snapshot_reports_cancellation() {
        let mut decoder = decoder();
        decoder.on_connected();
        decoder.absorb(vec![meta(json!({ "usage": { "prompt_tokens": 2 } }))]);
        let metadata = decoder.metadata(true);
        assert!(metadata.cancelled);
        assert_eq!(metadata.usage.input_tokens, 2);
    }
}
