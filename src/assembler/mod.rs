//! Response assembly and normalization.
//!
//! Adapters decode provider payloads into an [`AssemblerInput`]; this module
//! turns that into the canonical [`Response`] exactly once per call,
//! normalizing usage counters and finish reasons and pricing the call when
//! the model carries a rate table.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::adapter::ProviderAdapter;
use crate::types::{
    ContentPart, Context, FinishReason, Message, ModelCost, ModelDescriptor, Response,
    StreamChunk, Usage,
};

/// Tool name reserved for schema-constrained generation. When the caller
/// requests a structured object, the request carries a single tool with this
/// name and the assembler parses its arguments as the object.
pub const OBJECT_TOOL_NAME: &str = "structured_output";

/// Decoded provider payload, before normalization.
#[derive(Debug, Clone, Default)]
pub struct AssemblerInput {
    pub id: Option<String>,
    pub model: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub message: Option<Message>,
    /// Raw usage object as the provider shipped it.
    pub usage: Value,
    /// Vendor finish-reason string, unnormalized.
    pub finish_reason: Option<String>,
    /// Vendor fields preserved verbatim.
    pub provider_meta: Map<String, Value>,
}

/// Map a vendor usage object onto the canonical counters.
///
/// Recognizes both the `prompt_tokens`/`completion_tokens` and the
/// `input_tokens`/`output_tokens` spellings; everything unrecognized is
/// zero, never an error.
pub fn normalize_usage(raw: &Value) -> Usage {
    let count = |keys: &[&str]| -> u32 {
        keys.iter()
            .find_map(|k| raw.get(k).and_then(Value::as_u64))
            .unwrap_or(0) as u32
    };
    let nested = |path: &[&str]| -> u32 {
        let mut node = raw;
        for key in path {
            match node.get(key) {
                Some(next) => node = next,
                None => return 0,
            }
        }
        node.as_u64().unwrap_or(0) as u32
    };

    let input_tokens = count(&["prompt_tokens", "input_tokens"]);
    let output_tokens = count(&["completion_tokens", "output_tokens"]);
    let total = count(&["total_tokens"]);
    Usage {
        input_tokens,
        output_tokens,
        total_tokens: if total > 0 {
            total
        } else {
            input_tokens + output_tokens
        },
        cached_tokens: nested(&["prompt_tokens_details", "cached_tokens"])
            .max(count(&["cache_read_input_tokens", "cached_tokens"])),
        reasoning_tokens: nested(&["completion_tokens_details", "reasoning_tokens"])
            .max(count(&["reasoning_tokens"])),
    }
}

/// Normalize a vendor finish-reason string.
pub fn normalize_finish_reason(raw: Option<&str>) -> Option<FinishReason> {
    raw.map(FinishReason::from_vendor)
}

/// Price a call from the model's per-1000-token rates. `None` when the model
/// has no rate table.
pub fn compute_cost(usage: &Usage, cost: Option<&ModelCost>) -> Option<f64> {
    let rates = cost?;
    let per_k = |tokens: u32, rate: f64| f64::from(tokens) / 1000.0 * rate;
    Some(
        per_k(usage.input_tokens, rates.input)
            + per_k(usage.output_tokens, rates.output)
            + per_k(usage.cached_tokens, rates.cache_read),
    )
}

/// Extract the structured object from a generated message: the designated
/// tool call's arguments if present, otherwise the message text parsed as
/// JSON. Parse failure degrades to `None`.
fn extract_object(message: &Message) -> Option<Value> {
    for call in message.tool_calls() {
        if let ContentPart::ToolCall { name, input, .. } = call {
            if name == OBJECT_TOOL_NAME {
                return Some(input.clone());
            }
        }
    }
    let text = message.text();
    match serde_json::from_str(text.trim()) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(error = %err, "structured output did not parse as JSON");
            None
        }
    }
}

/// Build the canonical response. The input context gains the generated
/// message; earlier messages are never rewritten. Usage goes through the
/// adapter's [`ProviderAdapter::extract_usage`], so adapters with exotic
/// accounting keep control of the counters.
pub fn assemble(
    adapter: &dyn ProviderAdapter,
    input: AssemblerInput,
    context: Context,
    model: &ModelDescriptor,
    object_mode: bool,
) -> Response {
    let usage = adapter.extract_usage(&input.usage, model);
    finish(input, usage, context, model, object_mode)
}

/// Shared assembly tail, once usage is in canonical form.
fn finish(
    input: AssemblerInput,
    usage: Usage,
    context: Context,
    model: &ModelDescriptor,
    object_mode: bool,
) -> Response {
    let finish_reason = normalize_finish_reason(input.finish_reason.as_deref());
    let object = if object_mode {
        input.message.as_ref().and_then(extract_object)
    } else {
        None
    };
    let context = match &input.message {
        Some(message) => context.with(message.clone()),
        None => context,
    };
    Response {
        id: input
            .id
            .unwrap_or_else(|| format!("resp-{}", Uuid::new_v4())),
        model: input.model.unwrap_or_else(|| model.name.clone()),
        created: input.created.unwrap_or_else(Utc::now),
        context,
        message: input.message,
        cost: compute_cost(&usage, model.cost.as_ref()),
        usage,
        finish_reason,
        provider_meta: input.provider_meta,
        object,
    }
}

/// Rebuild a canonical response from a fully-drained chunk sequence.
///
/// Content and thinking chunks concatenate in arrival order, resolved tool
/// calls become tool-call parts, and the terminal meta chunk supplies usage
/// and finish reason. The terminal chunk's usage is already canonical (the
/// stream decoder ran the adapter's extraction), so no adapter is needed
/// here.
pub fn assemble_stream(
    chunks: &[StreamChunk],
    context: Context,
    model: &ModelDescriptor,
    object_mode: bool,
) -> Response {
    let mut text = String::new();
    let mut thinking = String::new();
    let mut calls = Vec::new();
    let mut input = AssemblerInput::default();
    let mut usage = Usage::default();

    for chunk in chunks {
        match chunk {
            StreamChunk::Content { text: t } => text.push_str(t),
            StreamChunk::Thinking { text: t } => thinking.push_str(t),
            StreamChunk::ToolCall {
                id,
                name,
                arguments,
                ..
            } => calls.push(ContentPart::tool_call(id, name, arguments.clone())),
            StreamChunk::Meta { data, terminal } if *terminal => {
                if let Some(value) = data.get("usage") {
                    usage = serde_json::from_value(value.clone())
                        .unwrap_or_else(|_| normalize_usage(value));
                }
                input.finish_reason = data
                    .get("finish_reason")
                    .and_then(Value::as_str)
                    .map(String::from);
            }
            StreamChunk::Meta { .. } => {}
        }
    }

    let mut parts = Vec::new();
    if !thinking.is_empty() {
        parts.push(ContentPart::Thinking { text: thinking });
    }
    if !text.is_empty() {
        parts.push(ContentPart::text(text));
    }
    parts.extend(calls);
    if !parts.is_empty() {
        input.message = Some(Message::assistant_with_parts(parts));
    }
    finish(input, usage, context, model, object_mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::DefaultAdapter;
    use serde_json::json;

    fn adapter() -> DefaultAdapter {
        DefaultAdapter::new("acme", "https://api.test/v1")
    }

    #[test]
    fn usage_recognizes_both_spellings() {
        let openai = json!({
            "prompt_tokens": 5,
            "completion_tokens": 3,
            "total_tokens": 8,
            "prompt_tokens_details": { "cached_tokens": 2 },
            "completion_tokens_details": { "reasoning_tokens": 1 }
        });
        let usage = normalize_usage(&openai);
        assert_eq!(usage, Usage {
            input_tokens: 5,
            output_tokens: 3,
            total_tokens: 8,
            cached_tokens: 2,
            reasoning_tokens: 1,
        });

        let anthropic = json!({ "input_tokens": 10, "output_tokens": 4 });
        let usage = normalize_usage(&anthropic);
        assert_eq!(usage.input_tokens, 10);
        assert_eq!(usage.total_tokens, 14);
    }

    #[test]
    fn unrecognized_usage_is_all_zero() {
        let usage = normalize_usage(&json!({ "tokens": "many" }));
        assert_eq!(usage, Usage::default());
    }

    #[test]
    fn cost_requires_a_rate_table() {
        let usage = Usage::new(1000, 500);
        assert_eq!(compute_cost(&usage, None), None);
        let rates = ModelCost {
            input: 0.003,
            output: 0.015,
            cache_read: 0.0003,
        };
        let cost = compute_cost(&usage, Some(&rates)).unwrap();
        assert!((cost - (0.003 + 0.0075)).abs() < 1e-12);
    }

    #[test]
    fn object_mode_prefers_designated_tool_call() {
        let message = Message::assistant_with_parts(vec![
            ContentPart::text("here you go"),
            ContentPart::tool_call("call-1", OBJECT_TOOL_NAME, json!({ "city": "Paris" })),
        ]);
        let input = AssemblerInput {
            message: Some(message),
            ..Default::default()
        };
        let model = ModelDescriptor::bare("acme", "standard-chat");
        let response = assemble(&adapter(), input, Context::new(), &model, true);
        assert_eq!(response.object, Some(json!({ "city": "Paris" })));
    }

    #[test]
    fn object_mode_falls_back_to_json_text() {
        let input = AssemblerInput {
            message: Some(Message::assistant(r#"{"ok": true}"#)),
            ..Default::default()
        };
        let model = ModelDescriptor::bare("acme", "standard-chat");
        let response = assemble(&adapter(), input, Context::new(), &model, true);
        assert_eq!(response.object, Some(json!({ "ok": true })));
    }

    #[test]
    fn drained_stream_reassembles_into_a_response() {
        let mut terminal = Map::new();
        terminal.insert(
            "usage".into(),
            serde_json::to_value(Usage::new(5, 3)).unwrap(),
        );
        terminal.insert("finish_reason".into(), json!("stop"));
        let chunks = vec![
            StreamChunk::content("Hel"),
            StreamChunk::content("lo"),
            StreamChunk::Meta {
                data: terminal,
                terminal: true,
            },
        ];
        let model = ModelDescriptor::bare("acme", "standard-chat");
        let response = assemble_stream(&chunks, Context::new(), &model, false);
        assert_eq!(response.text().as_deref(), Some("Hello"));
        assert_eq!(response.usage.total_tokens, 8);
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn context_gains_exactly_the_new_message() {
        let context = Context::new().with(Message::user("hi"));
        let input = AssemblerInput {
            message: Some(Message::assistant("hello")),
            ..Default::default()
        };
        let model = ModelDescriptor::bare("acme", "standard-chat");
        let response = assemble(&adapter(), input, context, &model, false);
        assert_eq!(response.context.len(), 2);
        assert_eq!(response.text().as_deref(), Some("hello"));
    }
}
