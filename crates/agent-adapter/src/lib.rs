//! Agent Adapter - one request/response contract for command-line coding agents
//!
//! This crate runs external agent executables (Claude Code, OpenCode,
//! Codex, Gemini CLI, ...) as subprocesses and normalizes their output,
//! whether plain text lines, JSON event lines or marker-tagged text, into
//! [`NormalizedResponse`] values or a stream of [`NormalizedChunk`]s.

mod adapter;
mod classify;
mod config;
mod error;
mod invocation;
mod normalizer;
mod profile;
mod provision;
mod queue;
mod registry;
mod request;
mod response;
mod session;

pub use adapter::{Adapter, ProcessAdapter};
pub use classify::{classify, Classification, TransientCause, TRANSIENT_PATTERNS};
pub use config::{AdapterConfig, DEFAULT_QUEUE_CAPACITY};
pub use error::{AdapterError, ErrorKind, Result};
pub use invocation::{build as build_invocation, Invocation};
pub use normalizer::{create_normalizer, markers, Completion, OutputNormalizer};
pub use profile::{AgentKind, AgentProfile, FlagTable, OutputFormat, PromptArg};
pub use provision::EphemeralResource;
pub use queue::{ChunkSender, ChunkStream};
pub use registry::{AdapterFactory, AdapterRegistry};
pub use request::{ChatMessage, ExecutionRequest, McpConfig, McpServer, MessageRole};
pub use response::{
    ChunkError, FinishReason, NormalizedChunk, NormalizedResponse, ResponseMetadata, TokenUsage,
    ToolCall,
};
pub use session::{ProcessSession, SessionOutcome, StderrBuffer, Termination, DEFAULT_STDERR_LIMIT};

/// Re-exported so callers need not depend on tokio-util directly
pub use tokio_util::sync::CancellationToken;
