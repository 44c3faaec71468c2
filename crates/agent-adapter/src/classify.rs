//! Failure classification for non-zero agent exits

/// Why a failure was judged transient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientCause {
    RateLimited,
    Timeout,
    Overloaded,
    Unavailable,
    Network,
}

/// Verdict for one failed process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Likely transient; the caller may retry the same request
    Retryable {
        cause: TransientCause,
        pattern: &'static str,
    },
    /// Retrying will not help
    Permanent,
}

impl Classification {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

/// Ordered (substring, cause) table. Matching is case-insensitive and the
/// first hit wins; patterns must be lowercase.
pub const TRANSIENT_PATTERNS: &[(&str, TransientCause)] = &[
    ("rate limit", TransientCause::RateLimited),
    ("rate_limit", TransientCause::RateLimited),
    ("ratelimit", TransientCause::RateLimited),
    ("too many requests", TransientCause::RateLimited),
    ("429", TransientCause::RateLimited),
    ("timeout", TransientCause::Timeout),
    ("timed out", TransientCause::Timeout),
    ("overloaded", TransientCause::Overloaded),
    ("529", TransientCause::Overloaded),
    ("503", TransientCause::Unavailable),
    ("502", TransientCause::Unavailable),
    ("service unavailable", TransientCause::Unavailable),
    ("bad gateway", TransientCause::Unavailable),
    ("connection reset", TransientCause::Network),
    ("connection refused", TransientCause::Network),
];

/// Classify a non-zero exit from its captured stderr
pub fn classify(stderr: &str) -> Classification {
    let haystack = stderr.to_lowercase();
    TRANSIENT_PATTERNS
        .iter()
        .find(|(pattern, _)| haystack.contains(pattern))
        .map(|&(pattern, cause)| Classification::Retryable { cause, pattern })
        .unwrap_or(Classification::Permanent)
}
