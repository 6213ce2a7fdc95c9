//! Conversation types: roles, content parts, messages, and the context.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// One typed unit of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text.
    Text { text: String },
    /// Inline image bytes with their media type.
    Image { data: Vec<u8>, media_type: String },
    /// A structured function invocation requested by the model.
    ToolCall {
        id: String,
        name: String,
        input: Value,
    },
    /// The caller-supplied result of a previous tool call.
    ToolResult { call_id: String, output: Value },
    /// Internal reasoning text from models that expose it.
    Thinking { text: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, output: Value) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            output,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Self::ToolCall { .. })
    }
}

/// A message in a conversation.
///
/// Content is an ordered list of [`ContentPart`]s; tool calls live inside the
/// content as [`ContentPart::ToolCall`] parts and can be listed with
/// [`Message::tool_calls`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentPart>) -> Self {
        Self { role, content }
    }

    /// A user message with plain-text content.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentPart::text(text)])
    }

    /// A system message with plain-text content.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentPart::text(text)])
    }

    /// An assistant message with plain-text content.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentPart::text(text)])
    }

    /// An assistant message with arbitrary content parts.
    pub fn assistant_with_parts(parts: Vec<ContentPart>) -> Self {
        Self::new(Role::Assistant, parts)
    }

    /// A tool message carrying the result of an earlier tool call.
    pub fn tool_result(call_id: impl Into<String>, output: Value) -> Self {
        Self::new(Role::Tool, vec![ContentPart::tool_result(call_id, output)])
    }

    /// Concatenated text of all `Text` parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// All tool-call parts in this message, in order.
    pub fn tool_calls(&self) -> Vec<&ContentPart> {
        self.content.iter().filter(|p| p.is_tool_call()).collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.content.iter().any(ContentPart::is_tool_call)
    }
}

/// Ordered conversation history.
///
/// Append-only from the caller's perspective: the response assembler only
/// ever pushes new messages, it never rewrites earlier ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Context {
    messages: Vec<Message>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Builder-style append.
    pub fn with(mut self, message: Message) -> Self {
        self.push(message);
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of system messages. Adapters may reject contexts where this is
    /// greater than one at the encoding boundary.
    pub fn system_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == Role::System)
            .count()
    }
}

impl FromIterator<Message> for Context {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}
