//! Per-executable adapter facade

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::ChildStdout;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::AdapterConfig;
use crate::error::{AdapterError, ErrorKind, Result};
use crate::invocation::{self, Invocation};
use crate::normalizer::{create_normalizer, markers, Completion, OutputNormalizer};
use crate::profile::{AgentKind, AgentProfile, OutputFormat};
use crate::provision::EphemeralResource;
use crate::queue::{self, ChunkSender, ChunkStream};
use crate::request::ExecutionRequest;
use crate::response::{FinishReason, NormalizedChunk, NormalizedResponse, ToolCall};
use crate::session::{LineReader, ProcessSession, Termination};

/// The two public operations every adapter offers
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Origin label for logs and errors
    fn name(&self) -> &str;

    /// Run the request to completion and return the full response
    async fn complete(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<NormalizedResponse>;

    /// Run the request and stream its output
    ///
    /// Must be called from within a tokio runtime. The stream ends with
    /// exactly one `done` chunk, which carries the error on failure.
    fn stream(&self, request: ExecutionRequest, cancel: CancellationToken) -> ChunkStream;
}

/// What the stdout reader gathered
#[derive(Debug, Default)]
struct Collected {
    content: String,
    tool_calls: Vec<ToolCall>,
    completion: Completion,
}

/// Adapter driving one external executable through its profile
#[derive(Debug, Clone)]
pub struct ProcessAdapter {
    profile: AgentProfile,
    config: Arc<AdapterConfig>,
}

impl ProcessAdapter {
    /// Create an adapter, applying binary and environment overrides from `config`
    pub fn new(mut profile: AgentProfile, config: Arc<AdapterConfig>) -> Self {
        if let Some(program) = config.binary_for(&profile.name) {
            profile.program = program.to_path_buf();
        }
        profile
            .env
            .extend(config.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        Self { profile, config }
    }

    /// Create an adapter for a built-in agent
    pub fn for_kind(kind: AgentKind, config: Arc<AdapterConfig>) -> Self {
        Self::new(kind.profile(), config)
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// Resolve the invocation a request would produce, without running it
    pub fn invocation(&self, request: &ExecutionRequest) -> Result<Invocation> {
        let prompt = self.prompt(request, "invocation")?;
        Ok(invocation::build(&self.profile, request, &prompt, None))
    }

    fn prompt(&self, request: &ExecutionRequest, operation: &'static str) -> Result<String> {
        request.prompt_text().ok_or_else(|| {
            AdapterError::invalid_request(&self.profile.name, operation, "prompt is empty")
        })
    }

    fn timeout(&self, request: &ExecutionRequest) -> Option<Duration> {
        request
            .timeout
            .filter(|t| !t.is_zero())
            .or_else(|| self.config.default_timeout())
    }

    fn provision(
        &self,
        request: &ExecutionRequest,
        operation: &'static str,
    ) -> Result<Option<EphemeralResource>> {
        let Some(mcp) = request.mcp_config.as_ref().filter(|c| !c.is_empty()) else {
            return Ok(None);
        };
        if self.profile.flags.mcp_config.is_none() {
            warn!("{} takes no MCP config file, ignoring inline config", self.profile.name);
            return Ok(None);
        }

        EphemeralResource::mcp_config(mcp, self.config.scratch_dir.as_deref())
            .map(Some)
            .map_err(|e| {
                AdapterError::provision_failed(&self.profile.name, operation, "MCP config", e)
            })
    }

    /// Validate, provision, run, release
    async fn run(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
        operation: &'static str,
        sink: Option<ChunkSender>,
    ) -> Result<(Collected, Duration)> {
        let prompt = self.prompt(&request, operation)?;
        if cancel.is_cancelled() {
            return Err(AdapterError::cancelled(&self.profile.name, operation));
        }

        let resource = self.provision(&request, operation)?;
        let invocation = invocation::build(
            &self.profile,
            &request,
            &prompt,
            resource.as_ref().map(EphemeralResource::path),
        );

        let result = self
            .execute(&invocation, self.timeout(&request), &cancel, operation, sink)
            .await;

        if let Some(resource) = resource {
            resource.release();
        }
        result
    }

    async fn execute(
        &self,
        invocation: &Invocation,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
        operation: &'static str,
        sink: Option<ChunkSender>,
    ) -> Result<(Collected, Duration)> {
        let name = self.profile.name.as_str();

        let program = invocation.program.to_string_lossy();
        let mut session =
            ProcessSession::spawn(invocation, cancel, timeout, self.config.stderr_limit)
                .map_err(|e| AdapterError::spawn_failed(name, operation, program.clone(), e))?;
        info!("Started {} (pid {:?})", name, session.pid());

        let stdout = session.take_stdout().ok_or_else(|| {
            AdapterError::spawn_failed(
                name,
                operation,
                program.clone(),
                std::io::Error::other("Failed to capture stdout"),
            )
        })?;
        let reader = tokio::spawn(
            read_stdout(stdout, session.token(), create_normalizer(self.profile.output), sink)
                .in_current_span(),
        );

        let outcome = session
            .wait(reader)
            .await
            .map_err(|e| AdapterError::new(name, operation, ErrorKind::Io(e), false))?;

        match outcome.termination {
            Termination::Cancelled => Err(AdapterError::cancelled(name, operation)),
            Termination::TimedOut(deadline) => {
                Err(AdapterError::timed_out(name, operation, deadline))
            }
            Termination::Exited(status) if !status.success() => {
                let err =
                    AdapterError::process_exited(name, operation, status.code(), outcome.stderr);
                warn!("{} failed (retryable: {}): {}", name, err.is_retryable(), err);
                Err(err)
            }
            Termination::Exited(_) => Ok((outcome.stdout, outcome.elapsed)),
        }
    }

    async fn complete_inner(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<NormalizedResponse> {
        let requested_model = request.model.clone();
        let (collected, duration) = self.run(request, cancel, "complete", None).await?;

        let metadata = match self.profile.output {
            OutputFormat::MarkerTagged => markers::parse(&collected.content),
            OutputFormat::PlainText | OutputFormat::JsonEvents => Default::default(),
        };
        let Completion {
            usage,
            model,
            finish_reason,
        } = collected.completion;

        Ok(NormalizedResponse {
            content: collected.content,
            tool_calls: collected.tool_calls,
            usage,
            model: model.or(requested_model),
            finish_reason: finish_reason.unwrap_or(FinishReason::Stop),
            duration,
            metadata,
        })
    }
}

#[async_trait]
impl Adapter for ProcessAdapter {
    fn name(&self) -> &str {
        &self.profile.name
    }

    async fn complete(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<NormalizedResponse> {
        let span = info_span!(
            "agent_call",
            agent = %self.profile.name,
            call_id = %Uuid::new_v4(),
            op = "complete"
        );
        self.complete_inner(request, cancel).instrument(span).await
    }

    fn stream(&self, request: ExecutionRequest, cancel: CancellationToken) -> ChunkStream {
        let (tx, stream) = queue::channel(
            self.config.queue_capacity,
            cancel.clone(),
            self.profile.name.as_str(),
        );
        let adapter = self.clone();
        let span = info_span!(
            "agent_call",
            agent = %self.profile.name,
            call_id = %Uuid::new_v4(),
            op = "stream"
        );

        tokio::spawn(
            async move {
                match adapter.run(request, cancel.clone(), "stream", Some(tx.clone())).await {
                    Ok((collected, _)) => {
                        tx.send(collected.completion.into_chunk()).await;
                    }
                    Err(err) => {
                        let chunk = NormalizedChunk::failed(&err);
                        if cancel.is_cancelled() {
                            // A full queue drops it; ChunkStream then
                            // supplies the cancellation chunk
                            tx.send_terminal(chunk);
                        } else {
                            tx.send(chunk).await;
                        }
                    }
                }
            }
            .instrument(span),
        );

        stream
    }
}

/// Read stdout line by line until end of stream or cancellation
///
/// With a sink, chunks are forwarded in read order; without one they are
/// folded into the returned content. A dropped receiver stops forwarding
/// but the pipe keeps draining so the process is never blocked on a write.
async fn read_stdout(
    stdout: ChildStdout,
    token: CancellationToken,
    mut normalizer: Box<dyn OutputNormalizer>,
    mut sink: Option<ChunkSender>,
) -> Collected {
    let mut reader = LineReader::new(stdout);
    let mut collected = Collected::default();
    let streaming = sink.is_some();

    loop {
        let line = tokio::select! {
            _ = token.cancelled() => break,
            line = reader.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("stdout read failed: {}", e);
                break;
            }
        };
        tracing::debug!("stdout: {}", line);

        let Some(chunk) = normalizer.push_line(&line) else {
            continue;
        };
        if !streaming {
            collected.content.push_str(&chunk.content);
            collected.tool_calls.extend(chunk.tool_calls);
        } else if let Some(tx) = &sink {
            let sent = tokio::select! {
                _ = token.cancelled() => break,
                sent = tx.send(chunk) => sent,
            };
            if !sent {
                sink = None;
            }
        }
    }

    collected.completion = normalizer.finish();
    collected
}
