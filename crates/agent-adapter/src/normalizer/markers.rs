//! Marker tags in free-text agent output

use once_cell::sync::Lazy;
use regex::Regex;

use crate::response::ResponseMetadata;

/// What a marker tag reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    PhaseComplete,
    PhaseBlocked,
    Commit,
    Edit,
}

/// Recognized tags, in scan order
pub const MARKER_TAGS: &[(&str, MarkerKind)] = &[
    ("phase_complete", MarkerKind::PhaseComplete),
    ("phase_blocked", MarkerKind::PhaseBlocked),
    ("commit", MarkerKind::Commit),
    ("edit", MarkerKind::Edit),
];

static PATTERNS: Lazy<Vec<(Regex, MarkerKind)>> = Lazy::new(|| {
    MARKER_TAGS
        .iter()
        .filter_map(|&(tag, kind)| {
            let pattern = format!(r"(?is)<{tag}>\s*(.*?)\s*</{tag}>", tag = regex::escape(tag));
            Regex::new(&pattern).ok().map(|re| (re, kind))
        })
        .collect()
});

/// Payloads of every occurrence of `tag`, whitespace-trimmed
///
/// Matching is non-greedy, so `<x>a</x><x>b</x>` yields `a` then `b`.
pub fn tag_values<'a>(text: &'a str, tag: &str) -> Vec<&'a str> {
    PATTERNS
        .iter()
        .zip(MARKER_TAGS)
        .find(|(_, (name, _))| *name == tag)
        .map(|((re, _), _)| {
            re.captures_iter(text)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().trim())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Extract marker metadata from a full response buffer
///
/// Absent or malformed tags simply leave the field unset.
pub fn parse(text: &str) -> ResponseMetadata {
    let mut metadata = ResponseMetadata::default();

    for (re, kind) in PATTERNS.iter() {
        let mut values = re
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|v| !v.is_empty());

        match kind {
            MarkerKind::PhaseComplete => {
                metadata.phase_complete = values.find_map(parse_bool);
            }
            MarkerKind::PhaseBlocked => {
                metadata.blocked_reason = values.next().map(str::to_string);
            }
            MarkerKind::Commit => {
                metadata.commit_hash = values.next().map(str::to_string);
            }
            MarkerKind::Edit => {
                metadata.edits = values.map(str::to_string).collect();
            }
        }
    }

    metadata
}
