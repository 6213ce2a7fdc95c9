//! Token accounting and finish reasons.

use serde::{Deserialize, Serialize};

/// Canonical token usage.
///
/// Every vendor usage payload is normalized into this fixed five-field shape;
/// counters a vendor does not report default to 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub cached_tokens: u32,
    pub reasoning_tokens: u32,
}

impl Usage {
    /// Usage with a computed total.
    pub const fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            cached_tokens: 0,
            reasoning_tokens: 0,
        }
    }

    /// Accumulate another usage report into this one.
    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
        self.cached_tokens += other.cached_tokens;
        self.reasoning_tokens += other.reasoning_tokens;
    }
}

/// Why the model stopped generating.
///
/// Vendor vocabularies are folded into this fixed set; anything unrecognized
/// is preserved verbatim in [`FinishReason::Other`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural completion or a stop sequence.
    Stop,
    /// The token limit was reached; the response is truncated.
    Length,
    /// The model wants one or more tools executed.
    ToolCalls,
    /// Output was blocked by a safety filter.
    ContentFilter,
    /// Generation failed server-side.
    Error,
    /// Provider-specific reason outside the canonical set.
    Other(String),
}

impl FinishReason {
    /// Normalize a vendor finish-reason string.
    ///
    /// Covers the vocabularies of the OpenAI, Anthropic, and Gemini wire
    /// formats; everything else maps to `Other`.
    pub fn from_vendor(raw: &str) -> Self {
        match raw {
            "stop" | "end_turn" | "stop_sequence" | "STOP" | "completed" => Self::Stop,
            "length" | "max_tokens" | "MAX_TOKENS" | "model_length" => Self::Length,
            "tool_calls" | "tool_use" | "function_call" => Self::ToolCalls,
            "content_filter" | "refusal" | "SAFETY" | "RECITATION" | "PROHIBITED_CONTENT" => {
                Self::ContentFilter
            }
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
            Self::Error => "error",
            Self::Other(s) => s,
        }
    }
}
