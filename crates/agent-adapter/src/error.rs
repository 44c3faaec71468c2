//! Error types for agent-adapter

use std::time::Duration;

use thiserror::Error;

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;

/// The underlying cause of a failed call
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// The request was rejected before any process was started
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// An ephemeral configuration file could not be written
    #[error("Failed to provision {what}: {source}")]
    Provision {
        what: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to spawn agent process
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The caller cancelled the call
    #[error("Call was cancelled")]
    Cancelled,

    /// The call deadline elapsed
    #[error("Execution timed out after {}ms", .after.as_millis())]
    TimedOut { after: Duration },

    /// Agent process exited with a non-zero status
    #[error("Agent process exited with code {code:?}: {stderr}")]
    ProcessExited { code: Option<i32>, stderr: String },

    /// IO error while talking to the process
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No adapter is registered under the name
    #[error("Unknown agent: {name}")]
    UnknownAgent { name: String },
}

/// A classified failure leaving the adapter
///
/// Built exactly once per failed call. The adapter never retries on its
/// own; `retryable` is advice for the caller.
#[derive(Debug, Error)]
#[error("{origin} {operation}: {kind}")]
pub struct AdapterError {
    /// Adapter (agent) name the failure originated from
    pub origin: String,
    /// Public operation that failed (`complete`, `stream`, ...)
    pub operation: &'static str,
    /// Wrapped cause
    #[source]
    pub kind: ErrorKind,
    /// Whether the caller may retry the same request
    pub retryable: bool,
}

impl AdapterError {
    /// Wrap a cause with an explicit verdict
    pub fn new(
        origin: impl Into<String>,
        operation: &'static str,
        kind: ErrorKind,
        retryable: bool,
    ) -> Self {
        Self {
            origin: origin.into(),
            operation,
            kind,
            retryable,
        }
    }

    /// Create an InvalidRequest error
    pub fn invalid_request(
        origin: impl Into<String>,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            origin,
            operation,
            ErrorKind::InvalidRequest {
                message: message.into(),
            },
            false,
        )
    }

    /// Create a Provision error
    pub fn provision_failed(
        origin: impl Into<String>,
        operation: &'static str,
        what: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::new(
            origin,
            operation,
            ErrorKind::Provision {
                what: what.into(),
                source,
            },
            false,
        )
    }

    /// Create a Spawn error
    pub fn spawn_failed(
        origin: impl Into<String>,
        operation: &'static str,
        program: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::new(
            origin,
            operation,
            ErrorKind::Spawn {
                program: program.into(),
                source,
            },
            false,
        )
    }

    /// Create a Cancelled error
    pub fn cancelled(origin: impl Into<String>, operation: &'static str) -> Self {
        Self::new(origin, operation, ErrorKind::Cancelled, true)
    }

    /// Create a TimedOut error
    pub fn timed_out(origin: impl Into<String>, operation: &'static str, after: Duration) -> Self {
        Self::new(origin, operation, ErrorKind::TimedOut { after }, true)
    }

    /// Create a ProcessExited error, classifying it from the stderr text
    pub fn process_exited(
        origin: impl Into<String>,
        operation: &'static str,
        code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        let stderr = stderr.into();
        let retryable = crate::classify::classify(&stderr).is_retryable();
        Self::new(
            origin,
            operation,
            ErrorKind::ProcessExited { code, stderr },
            retryable,
        )
    }

    /// Create an UnknownAgent error
    pub fn unknown_agent(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            name.clone(),
            "create",
            ErrorKind::UnknownAgent { name },
            false,
        )
    }

    /// Whether the caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Whether the failure was a cancellation or deadline
    pub fn is_cancellation(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled | ErrorKind::TimedOut { .. })
    }
}
