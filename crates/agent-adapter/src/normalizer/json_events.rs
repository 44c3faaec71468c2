use serde::Deserialize;
use tracing::debug;

use super::{Completion, OutputNormalizer};
use crate::response::{FinishReason, NormalizedChunk, TokenUsage, ToolCall};

/// Tagged events an agent may print, one per line
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AgentEvent {
    Content {
        #[serde(default)]
        content: String,
    },
    ToolCall {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default)]
        arguments: serde_json::Value,
    },
    Done {
        #[serde(default)]
        usage: TokenUsage,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        finish_reason: Option<String>,
    },
    #[serde(other)]
    Unrecognized,
}

/// Normalizer for line-delimited JSON events
///
/// Lines that are not tagged events are passed through as plain text.
/// A missing `done` event still yields a (zero usage) completion.
#[derive(Debug, Default)]
pub struct JsonEventNormalizer {
    completion: Completion,
}

impl JsonEventNormalizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputNormalizer for JsonEventNormalizer {
    fn push_line(&mut self, line: &str) -> Option<NormalizedChunk> {
        let trimmed = line.trim();
        if trimmed.starts_with('{') && trimmed.ends_with('}') {
            if let Ok(event) = serde_json::from_str::<AgentEvent>(trimmed) {
                return match event {
                    AgentEvent::Content { content } => Some(NormalizedChunk::content(content)),
                    AgentEvent::ToolCall {
                        id,
                        name,
                        arguments,
                    } => Some(NormalizedChunk::tool_call(ToolCall {
                        id,
                        name,
                        arguments,
                    })),
                    AgentEvent::Done {
                        usage,
                        model,
                        finish_reason,
                    } => {
                        self.completion = Completion {
                            usage,
                            model,
                            finish_reason: finish_reason.as_deref().map(FinishReason::from_agent),
                        };
                        None
                    }
                    AgentEvent::Unrecognized => {
                        debug!("Ignoring unrecognized event: {}", trimmed);
                        None
                    }
                };
            }
        }

        Some(NormalizedChunk::content(format!("{}\n", line)))
    }

    fn finish(&mut self) -> Completion {
        std::mem::take(&mut self.completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_then_done() {
        let mut normalizer = JsonEventNormalizer::new();
        let chunk = normalizer
            .push_line(r#"{"type":"content","content":"hi"}"#)
            .unwrap();
        assert_eq!(chunk.content, "hi");
        assert!(!chunk.done);

        let done = r#"{"type":"done","usage":{"input_tokens":3,"output_tokens":2}}"#;
        assert!(normalizer.push_line(done).is_none());

        let completion = normalizer.finish();
        assert_eq!(completion.usage.input_tokens, 3);
        assert_eq!(completion.usage.output_tokens, 2);
        assert_eq!(completion.usage.total(), 5);
    }

    #[test]
    fn test_non_json_line_becomes_content() {
        let mut normalizer = JsonEventNormalizer::new();
        let chunk = normalizer.push_line("Compiling project...").unwrap();
        assert_eq!(chunk.content, "Compiling project...\n");
    }

    #[test]
    fn test_malformed_event_becomes_content() {
        let mut normalizer = JsonEventNormalizer::new();
        let line = r#"{"type":"content","content":42}"#;
        assert_eq!(normalizer.push_line(line).unwrap().content, format!("{}\n", line));

        let line = r#"{"no_type":true}"#;
        assert_eq!(normalizer.push_line(line).unwrap().content, format!("{}\n", line));
    }

    #[test]
    fn test_unrecognized_event_is_skipped() {
        let mut normalizer = JsonEventNormalizer::new();
        assert!(normalizer
            .push_line(r#"{"type":"heartbeat","seq":1}"#)
            .is_none());
    }

    #[test]
    fn test_tool_call_event() {
        let mut normalizer = JsonEventNormalizer::new();
        let line = r#"{"type":"tool_call","id":"t1","name":"Read","arguments":{"path":"a.rs"}}"#;
        let chunk = normalizer.push_line(line).unwrap();
        assert_eq!(chunk.content, "");
        assert_eq!(chunk.tool_calls.len(), 1);
        assert_eq!(chunk.tool_calls[0].name, "Read");
        assert_eq!(chunk.tool_calls[0].arguments["path"], "a.rs");
    }

    #[test]
    fn test_missing_done_yields_zero_usage() {
        let mut normalizer = JsonEventNormalizer::new();
        normalizer.push_line(r#"{"type":"content","content":"x"}"#);
        let completion = normalizer.finish();
        assert!(completion.usage.is_zero());
        assert!(completion.model.is_none());
    }

    #[test]
    fn test_done_metadata() {
        let mut normalizer = JsonEventNormalizer::new();
        normalizer.push_line(concat!(
            r#"{"type":"done","model":"opus","finish_reason":"end_turn","#,
            r#""usage":{"input_tokens":1,"output_tokens":1,"cache_read_input_tokens":7}}"#,
        ));
        let completion = normalizer.finish();
        assert_eq!(completion.model.as_deref(), Some("opus"));
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
        assert_eq!(completion.usage.cache_read_input_tokens, 7);
    }

    #[test]
    fn test_done_with_extreme_usage() {
        let mut normalizer = JsonEventNormalizer::new();
        normalizer.push_line(concat!(
            r#"{"type":"done","usage":"#,
            r#"{"input_tokens":18446744073709551615,"output_tokens":5}}"#,
        ));
        let usage = normalizer.finish().usage;
        assert_eq!(usage.input_tokens, u64::MAX);
        assert_eq!(usage.total(), u64::MAX);
    }
}
