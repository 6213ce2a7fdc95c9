//! The provider adapter seam.
//!
//! An adapter owns everything provider-specific: which endpoint an operation
//! hits, how the canonical context serializes onto the wire, how responses
//! and stream events decode back. Everything else in the crate is
//! provider-agnostic and talks to adapters only through this trait.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Method;
use serde_json::{Map, Value, json};
use std::time::Duration;

use crate::assembler::AssemblerInput;
use crate::error::ClientError;
use crate::options::{
    OptionConstraint, OptionMap, OptionSchema, OptionWarning, PreparedOptions,
};
use crate::types::{
    ContentPart, Context, EmbeddingResponse, Message, ModelDescriptor, ModelInfo, Operation, Role,
    StreamChunk, StreamEventRecord, Usage,
};

/// What a provider advertises about itself: identity and model catalog.
#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    pub id: String,
    pub name: String,
    pub base_url: Option<String>,
    pub models: Vec<ModelInfo>,
}

/// Where and how one request goes.
#[derive(Debug, Clone)]
pub struct RequestPlan {
    pub method: Method,
    /// Path appended to the provider's base URL.
    pub path: String,
    /// Per-request timeout override, when the operation warrants one.
    pub timeout: Option<Duration>,
}

/// Provider-specific behavior behind a uniform interface.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider_id(&self) -> &str;

    fn default_base_url(&self) -> &str;

    /// The closed world of canonical option keys this adapter accepts for an
    /// operation, with constraints and defaults.
    fn supported_options(&self, operation: Operation) -> OptionSchema;

    /// Self-description for registry discovery. May perform I/O (e.g. list
    /// models); the registry bounds it with a timeout.
    async fn describe(&self) -> Result<ProviderMetadata, ClientError>;

    /// Endpoint and method for one operation.
    fn prepare_request(
        &self,
        operation: Operation,
        model: &ModelDescriptor,
    ) -> Result<RequestPlan, ClientError>;

    /// Serialize the context and prepared options into the request body.
    fn encode_body(
        &self,
        operation: Operation,
        context: &Context,
        prepared: &PreparedOptions,
        streaming: bool,
    ) -> Result<Value, ClientError>;

    /// Decode a buffered chat/object response body.
    fn decode_response(
        &self,
        body: &Value,
        model: &ModelDescriptor,
    ) -> Result<AssemblerInput, ClientError>;

    /// Decode a buffered embedding response body.
    fn decode_embedding(
        &self,
        body: &Value,
        model: &ModelDescriptor,
    ) -> Result<EmbeddingResponse, ClientError>;

    /// Map one parsed stream event onto zero or more chunks. Infallible:
    /// events the adapter does not understand produce an empty vec.
    fn decode_stream_event(
        &self,
        event: &StreamEventRecord,
        model: &ModelDescriptor,
    ) -> Vec<StreamChunk>;

    /// Map a vendor usage payload onto the canonical counters. The default
    /// normalization covers the common spellings; adapters for providers
    /// with exotic accounting override it.
    fn extract_usage(&self, raw: &Value, model: &ModelDescriptor) -> Usage {
        let _ = model;
        crate::assembler::normalize_usage(raw)
    }

    /// Optional full takeover of option translation. The default keeps the
    /// built-in profiles by returning no warnings alongside the untouched map.
    fn translate_options(
        &self,
        operation: Operation,
        model: &ModelDescriptor,
        opts: OptionMap,
    ) -> (OptionMap, Option<Vec<OptionWarning>>) {
        let _ = (operation, model);
        (opts, None)
    }
}

/// Adapter for providers speaking the OpenAI-compatible wire dialect, which
/// by now is most of them. Configurable identity and catalog; the wire
/// behavior is fixed.
#[derive(Debug, Clone)]
pub struct DefaultAdapter {
    id: String,
    display_name: String,
    base_url: String,
    models: Vec<ModelInfo>,
}

impl DefaultAdapter {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            base_url: base_url.into(),
            models: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = models;
        self
    }

    fn encode_messages(context: &Context) -> Vec<Value> {
        context.messages().iter().map(Self::encode_message).collect()
    }

    fn encode_message(message: &Message) -> Value {
        // Tool results use the dedicated "tool" role shape.
        if message.role == Role::Tool {
            if let Some(ContentPart::ToolResult { call_id, output }) = message.content.first() {
                return json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": output.to_string(),
                });
            }
        }

        let mut body = Map::new();
        body.insert("role".into(), json!(message.role.as_str()));

        let tool_calls: Vec<Value> = message
            .content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolCall { id, name, input } => Some(json!({
                    "id": id,
                    "type": "function",
                    "function": { "name": name, "arguments": input.to_string() },
                })),
                _ => None,
            })
            .collect();
        if !tool_calls.is_empty() {
            body.insert("tool_calls".into(), Value::Array(tool_calls));
        }

        let has_images = message
            .content
            .iter()
            .any(|p| matches!(p, ContentPart::Image { .. }));
        if has_images {
            let parts: Vec<Value> = message
                .content
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(json!({ "type": "text", "text": text })),
                    ContentPart::Image { data, media_type } => {
                        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
                        Some(json!({
                            "type": "image_url",
                            "image_url": { "url": format!("data:{media_type};base64,{encoded}") },
                        }))
                    }
                    _ => None,
                })
                .collect();
            body.insert("content".into(), Value::Array(parts));
        } else {
            body.insert("content".into(), json!(message.text()));
        }
        Value::Object(body)
    }

    fn decode_message(choice_message: &Value) -> Message {
        let mut parts = Vec::new();
        if let Some(thinking) = choice_message
            .get("reasoning_content")
            .and_then(Value::as_str)
        {
            if !thinking.is_empty() {
                parts.push(ContentPart::Thinking {
                    text: thinking.to_string(),
                });
            }
        }
        if let Some(text) = choice_message.get("content").and_then(Value::as_str) {
            if !text.is_empty() {
                parts.push(ContentPart::text(text));
            }
        }
        if let Some(calls) = choice_message.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                let id = call.get("id").and_then(Value::as_str).unwrap_or_default();
                let function = call.get("function");
                let name = function
                    .and_then(|f| f.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let input = function
                    .and_then(|f| f.get("arguments"))
                    .and_then(Value::as_str)
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or_else(|| json!({}));
                parts.push(ContentPart::tool_call(id, name, input));
            }
        }
        Message::assistant_with_parts(parts)
    }
}

#[async_trait]
impl ProviderAdapter for DefaultAdapter {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn default_base_url(&self) -> &str {
        &self.base_url
    }

    fn supported_options(&self, operation: Operation) -> OptionSchema {
        match operation {
            Operation::Chat | Operation::Object => OptionSchema::new()
                .declare("temperature", OptionConstraint::float(0.0, 2.0))
                .declare("top_p", OptionConstraint::float(0.0, 1.0))
                .declare("max_tokens", OptionConstraint::integer(1, 1_000_000))
                .declare("frequency_penalty", OptionConstraint::float(-2.0, 2.0))
                .declare("presence_penalty", OptionConstraint::float(-2.0, 2.0))
                .declare("seed", OptionConstraint::integer(0, i64::MAX))
                .declare("stop", OptionConstraint::list())
                .declare("reasoning_effort", OptionConstraint::text()),
            Operation::Embedding => OptionSchema::new()
                .declare("dimensions", OptionConstraint::integer(1, 16_384))
                .declare("encoding_format", OptionConstraint::text()),
        }
    }

    async fn describe(&self) -> Result<ProviderMetadata, ClientError> {
        Ok(ProviderMetadata {
            id: self.id.clone(),
            name: self.display_name.clone(),
            base_url: Some(self.base_url.clone()),
            models: self.models.clone(),
        })
    }

    fn prepare_request(
        &self,
        operation: Operation,
        _model: &ModelDescriptor,
    ) -> Result<RequestPlan, ClientError> {
        let path = match operation {
            Operation::Chat | Operation::Object => "/chat/completions",
            Operation::Embedding => "/embeddings",
        };
        Ok(RequestPlan {
            method: Method::POST,
            path: path.to_string(),
            timeout: None,
        })
    }

    fn encode_body(
        &self,
        operation: Operation,
        context: &Context,
        prepared: &PreparedOptions,
        streaming: bool,
    ) -> Result<Value, ClientError> {
        let mut body = prepared.opts.clone();
        match operation {
            Operation::Chat | Operation::Object => {
                body.insert(
                    "messages".into(),
                    Value::Array(Self::encode_messages(context)),
                );
                if streaming {
                    body.insert("stream".into(), json!(true));
                    body.insert("stream_options".into(), json!({ "include_usage": true }));
                }
            }
            Operation::Embedding => {
                // Each context message is one embedding input.
                let inputs: Vec<Value> = context
                    .messages()
                    .iter()
                    .map(|m| json!(m.text()))
                    .collect();
                body.insert("input".into(), Value::Array(inputs));
            }
        }
        // Passthrough lands verbatim, after canonical keys.
        for (key, value) in &prepared.passthrough {
            body.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(body))
    }

    fn decode_response(
        &self,
        body: &Value,
        _model: &ModelDescriptor,
    ) -> Result<AssemblerInput, ClientError> {
        let choice = body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .ok_or_else(|| {
                ClientError::ParseError("response carried no choices".to_string())
            })?;
        let message = choice
            .get("message")
            .map(Self::decode_message)
            .ok_or_else(|| ClientError::ParseError("choice carried no message".to_string()))?;

        let mut provider_meta = Map::new();
        if let Some(value) = body.get("system_fingerprint") {
            provider_meta.insert("system_fingerprint".to_string(), value.clone());
        }

        Ok(AssemblerInput {
            id: body.get("id").and_then(Value::as_str).map(String::from),
            model: body.get("model").and_then(Value::as_str).map(String::from),
            created: body
                .get("created")
                .and_then(Value::as_i64)
                .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0)),
            message: Some(message),
            usage: body.get("usage").cloned().unwrap_or(Value::Null),
            finish_reason: choice
                .get("finish_reason")
                .and_then(Value::as_str)
                .map(String::from),
            provider_meta,
        })
    }

    fn decode_embedding(
        &self,
        body: &Value,
        model: &ModelDescriptor,
    ) -> Result<EmbeddingResponse, ClientError> {
        let data = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::ParseError("embedding response carried no data".into()))?;
        let mut embeddings = Vec::with_capacity(data.len());
        for entry in data {
            let vector = entry
                .get("embedding")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    ClientError::ParseError("embedding entry carried no vector".into())
                })?;
            embeddings.push(
                vector
                    .iter()
                    .filter_map(Value::as_f64)
                    .map(|v| v as f32)
                    .collect(),
            );
        }
        Ok(EmbeddingResponse {
            model: body
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(&model.name)
                .to_string(),
            embeddings,
            usage: self.extract_usage(body.get("usage").unwrap_or(&Value::Null), model),
        })
    }

    fn decode_stream_event(
        &self,
        event: &StreamEventRecord,
        _model: &ModelDescriptor,
    ) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        let data = &event.data;
        let choice = data.get("choices").and_then(Value::as_array).and_then(|c| c.first());

        if let Some(delta) = choice.and_then(|c| c.get("delta")) {
            if let Some(text) = delta.get("reasoning_content").and_then(Value::as_str) {
                if !text.is_empty() {
                    chunks.push(StreamChunk::thinking(text));
                }
            }
            if let Some(text) = delta.get("content").and_then(Value::as_str) {
                if !text.is_empty() {
                    chunks.push(StreamChunk::content(text));
                }
            }
            if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
                for call in calls {
                    let mut metadata = Map::new();
                    metadata.insert(
                        "call_index".into(),
                        call.get("index").cloned().unwrap_or(json!(0)),
                    );
                    if let Some(fragment) = call
                        .get("function")
                        .and_then(|f| f.get("arguments"))
                        .and_then(Value::as_str)
                    {
                        metadata.insert("arguments_fragment".into(), json!(fragment));
                    }
                    chunks.push(StreamChunk::ToolCall {
                        id: call
                            .get("id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        name: call
                            .get("function")
                            .and_then(|f| f.get("name"))
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        arguments: Value::Null,
                        metadata,
                    });
                }
            }
        }

        // Usage and finish reason ride on non-terminal meta chunks; the
        // decoder folds them into the single terminal chunk at end of stream.
        let mut meta = Map::new();
        if let Some(reason) = choice
            .and_then(|c| c.get("finish_reason"))
            .filter(|r| !r.is_null())
        {
            meta.insert("finish_reason".into(), reason.clone());
        }
        if let Some(usage) = data.get("usage").filter(|u| u.is_object()) {
            meta.insert("usage".into(), usage.clone());
        }
        if !meta.is_empty() {
            chunks.push(StreamChunk::Meta {
                data: meta,
                terminal: false,
            });
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelDescriptor {
        ModelDescriptor::bare("acme", "standard-chat")
    }

    fn prepared(opts: OptionMap) -> PreparedOptions {
        PreparedOptions {
            opts,
            passthrough: OptionMap::new(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn chat_body_carries_messages_and_stream_flag() {
        let adapter = DefaultAdapter::new("acme", "https://api.acme.test/v1");
        let context = Context::new()
            .with(Message::system("be terse"))
            .with(Message::user("hi"));
        let body = adapter
            .encode_body(Operation::Chat, &context, &prepared(OptionMap::new()), true)
            .unwrap();
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["stream"], json!(true));
    }

    #[test]
    fn tool_result_messages_use_the_tool_role_shape() {
        let adapter = DefaultAdapter::new("acme", "https://api.acme.test/v1");
        let context = Context::new().with(Message::tool_result("call-1", json!({"ok": true})));
        let body = adapter
            .encode_body(Operation::Chat, &context, &prepared(OptionMap::new()), false)
            .unwrap();
        assert_eq!(body["messages"][0]["role"], "tool");
        assert_eq!(body["messages"][0]["tool_call_id"], "call-1");
    }

    #[test]
    fn response_decodes_text_and_tool_calls() {
        let adapter = DefaultAdapter::new("acme", "https://api.acme.test/v1");
        let body = json!({
            "id": "chatcmpl-1",
            "model": "standard-chat",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "checking",
                    "tool_calls": [{
                        "id": "call-1",
                        "type": "function",
                        "function": { "name": "get_weather", "arguments": "{\"city\":\"Paris\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8 }
        });
        let input = adapter.decode_response(&body, &model()).unwrap();
        let message = input.message.unwrap();
        assert_eq!(message.text(), "checking");
        assert_eq!(message.tool_calls().len(), 1);
        assert_eq!(input.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn malformed_tool_call_arguments_decode_to_empty_object() {
        let adapter = DefaultAdapter::new("acme", "https://api.acme.test/v1");
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "tool_calls": [{
                        "id": "call-1",
                        "function": { "name": "get_weather", "arguments": "{\"city\":" }
                    }]
                }
            }]
        });
        let input = adapter.decode_response(&body, &model()).unwrap();
        let message = input.message.unwrap();
        match message.tool_calls()[0] {
            ContentPart::ToolCall { input, .. } => assert_eq!(input, &json!({})),
            _ => unreachable!(),
        }
    }

    #[test]
    fn stream_delta_maps_to_content_and_fragments() {
        let adapter = DefaultAdapter::new("acme", "https://api.acme.test/v1");
        let event = StreamEventRecord::new(
            "message",
            json!({
                "choices": [{
                    "delta": {
                        "content": "Hel",
                        "tool_calls": [{
                            "index": 0,
                            "id": "call-1",
                            "function": { "name": "get_weather", "arguments": "{\"ci" }
                        }]
                    }
                }]
            }),
        );
        let chunks = adapter.decode_stream_event(&event, &model());
        assert_eq!(chunks.len(), 2);
        assert!(matches!(&chunks[0], StreamChunk::Content { text } if text == "Hel"));
        match &chunks[1] {
            StreamChunk::ToolCall { metadata, .. } => {
                assert_eq!(metadata["call_index"], json!(0));
                assert_eq!(metadata["arguments_fragment"], json!("{\"ci"));
            }
            other => panic!("unexpected chunk {other:?}"),
        }
    }

    #[test]
    fn usage_only_event_becomes_non_terminal_meta() {
        let adapter = DefaultAdapter::new("acme", "https://api.acme.test/v1");
        let event = StreamEventRecord::new(
            "message",
            json!({ "choices": [], "usage": { "prompt_tokens": 5, "completion_tokens": 3 } }),
        );
        let chunks = adapter.decode_stream_event(&event, &model());
        assert_eq!(chunks.len(), 1);
        assert!(matches!(&chunks[0], StreamChunk::Meta { terminal: false, .. }));
    }
}
