//! Tool-call fragment accumulation.

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::debug;

use crate::types::StreamChunk;

/// An in-flight tool call being pieced together from argument fragments.
#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    fragments: String,
}

impl PendingToolCall {
    fn resolve(self, index: u64) -> StreamChunk {
        // Fragments that never become valid JSON degrade to an empty
        // argument object; a broken tail never fails the stream.
        let arguments = match serde_json::from_str(&self.fragments) {
            Ok(value) => value,
            Err(err) => {
                debug!(call_index = index, error = %err, "tool-call arguments did not parse");
                json!({})
            }
        };
        let mut metadata = Map::new();
        metadata.insert("call_index".into(), json!(index));
        StreamChunk::ToolCall {
            id: self.id,
            name: self.name,
            arguments,
            metadata,
        }
    }
}

/// Accumulates tool-call argument fragments keyed by call index until the
/// call can be resolved into a single chunk with parsed arguments.
#[derive(Debug, Default)]
pub(crate) struct ToolCallAccumulator {
    pending: BTreeMap<u64, PendingToolCall>,
}

impl ToolCallAccumulator {
    pub(crate) fn push_fragment(
        &mut self,
        index: u64,
        id: &str,
        name: &str,
        fragment: Option<&str>,
    ) {
        let entry = self.pending.entry(index).or_default();
        if !id.is_empty() {
            entry.id = id.to_string();
        }
        if !name.is_empty() {
            entry.name = name.to_string();
        }
        if let Some(fragment) = fragment {
            entry.fragments.push_str(fragment);
        }
    }

    /// Resolve one call early, when the provider marks it complete.
    pub(crate) fn resolve(&mut self, index: u64) -> Option<StreamChunk> {
        self.pending.remove(&index).map(|call| call.resolve(index))
    }

    /// Resolve everything still pending, in call-index order.
    pub(crate) fn resolve_all(&mut self) -> Vec<StreamChunk> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(index, call)| call.resolve(index))
            .collect()
    }
}
