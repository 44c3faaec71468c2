//! Normalized response and chunk types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Token counters reported by an agent
///
/// Copied verbatim from the agent's output. Zero when nothing was reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default, alias = "cache_creation_tokens")]
    pub cache_creation_input_tokens: u64,
    #[serde(default, alias = "cache_read_tokens")]
    pub cache_read_input_tokens: u64,
}

impl TokenUsage {
    /// Input plus output tokens, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// A tool invocation reported by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Why the agent stopped
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    MaxTokens,
    ToolUse,
    Other(String),
}

impl FinishReason {
    pub fn from_agent(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "stop" | "end_turn" | "success" | "completed" => Self::Stop,
            "max_tokens" | "length" => Self::MaxTokens,
            "tool_use" | "tool_calls" => Self::ToolUse,
            _ => Self::Other(raw.to_string()),
        }
    }
}

/// Error carried by the terminal chunk of a failed stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkError {
    pub message: String,
    pub retryable: bool,
}

/// One increment of streamed output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedChunk {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Only present on the final chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ChunkError>,
}

impl NormalizedChunk {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            tool_calls: vec![call],
            ..Default::default()
        }
    }

    pub fn done(usage: TokenUsage) -> Self {
        Self {
            usage: Some(usage),
            done: true,
            ..Default::default()
        }
    }

    pub fn failed(err: &crate::AdapterError) -> Self {
        Self {
            done: true,
            error: Some(ChunkError {
                message: err.to_string(),
                retryable: err.is_retryable(),
            }),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Structured facts found in marker tags of free-text output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Value of a completion tag, if present
    pub phase_complete: Option<bool>,
    /// Payload of a blocked tag, if present
    pub blocked_reason: Option<String>,
    /// Commit hash reported by the agent
    pub commit_hash: Option<String>,
    /// Edited paths, in the order reported
    #[serde(default)]
    pub edits: Vec<String>,
}

impl ResponseMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Complete result of a non-streamed call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: TokenUsage,
    /// Model reported by the agent, else the requested one
    pub model: Option<String>,
    pub finish_reason: FinishReason,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    #[serde(default)]
    pub metadata: ResponseMetadata,
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
