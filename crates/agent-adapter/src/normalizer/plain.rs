use super::{Completion, OutputNormalizer};
use crate::response::NormalizedChunk;

/// One content chunk per line; no usage data
pub struct PlainTextNormalizer;

impl OutputNormalizer for PlainTextNormalizer {
    fn push_line(&mut self, line: &str) -> Option<NormalizedChunk> {
        Some(NormalizedChunk::content(format!("{}\n", line)))
    }

    fn finish(&mut self) -> Completion {
        Completion::default()
    }
}
