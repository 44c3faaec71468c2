//! Output normalizers for the supported output shapes

use crate::profile::OutputFormat;
use crate::response::{FinishReason, NormalizedChunk, TokenUsage};

pub mod json_events;
pub mod markers;
pub mod plain;

/// What a normalizer knows once stdout has ended
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Zero unless the agent reported usage
    pub usage: TokenUsage,
    pub model: Option<String>,
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    pub fn into_chunk(self) -> NormalizedChunk {
        NormalizedChunk::done(self.usage)
    }
}

/// Trait for normalizing agent stdout
///
/// Fed one line at a time in read order. The final chunk is never produced
/// by `push_line`; the caller builds it from [`OutputNormalizer::finish`]
/// after the process has been waited on.
pub trait OutputNormalizer: Send {
    /// Normalize one line (without its terminator)
    fn push_line(&mut self, line: &str) -> Option<NormalizedChunk>;

    /// Summarize the stream once it has ended
    fn finish(&mut self) -> Completion;
}

/// Create a line normalizer for the given output format
///
/// Marker-tagged output has no line structure; it streams as plain text
/// and its tags are read from the full buffer by [`markers::parse`].
pub fn create_normalizer(format: OutputFormat) -> Box<dyn OutputNormalizer> {
    match format {
        OutputFormat::JsonEvents => Box::new(json_events::JsonEventNormalizer::new()),
        OutputFormat::PlainText | OutputFormat::MarkerTagged => {
            Box::new(plain::PlainTextNormalizer)
        }
    }
}
