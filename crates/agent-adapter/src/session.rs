//! Agent process sessions

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::invocation::Invocation;

/// Default cap on captured stderr, in characters
pub const DEFAULT_STDERR_LIMIT: usize = 500;

/// Bounded capture of a process's stderr
///
/// Keeps the first `limit` characters; everything after is drained and
/// discarded.
#[derive(Debug, Clone)]
pub struct StderrBuffer {
    text: String,
    limit: usize,
    truncated: bool,
}

impl StderrBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit,
            truncated: false,
        }
    }

    pub fn push_line(&mut self, line: &str) {
        if self.truncated {
            return;
        }
        let used = self.text.chars().count();
        let remaining = self.limit.saturating_sub(used);
        let len = line.chars().count();

        if len <= remaining {
            self.text.push_str(line);
            // May overshoot by this separator; into_string trims it
            self.text.push('\n');
        } else {
            self.text.extend(line.chars().take(remaining));
            self.truncated = true;
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn into_string(self) -> String {
        let mut text = self.text.trim_end().to_string();
        if self.truncated {
            text.push_str("...");
        }
        text
    }
}

/// Reads newline-delimited text, tolerating invalid UTF-8
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, `None` at end of stream
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        let n = self.inner.read_until(b'\n', &mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if self.buf.ends_with(b"\n") {
            self.buf.pop();
            if self.buf.ends_with(b"\r") {
                self.buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

/// How the process came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited on its own
    Exited(ExitStatus),
    /// The caller's cancellation token fired first
    Cancelled,
    /// The deadline elapsed first
    TimedOut(Duration),
}

/// Result of a finished session
#[derive(Debug)]
pub struct SessionOutcome<T> {
    pub termination: Termination,
    /// Captured (bounded) stderr text
    pub stderr: String,
    /// Whatever the stdout reader task returned
    pub stdout: T,
    pub elapsed: Duration,
}

/// One running agent subprocess
///
/// Owns the child exclusively. The child is killed when the session is
/// dropped without being waited on.
pub struct ProcessSession {
    child: Child,
    program: String,
    stdout: Option<ChildStdout>,
    stderr_task: JoinHandle<String>,
    caller: CancellationToken,
    token: CancellationToken,
    deadline: Option<Duration>,
    started_at: Instant,
}

impl ProcessSession {
    /// Spawn the process and start draining its stderr
    ///
    /// `deadline` of `None` or zero means no deadline.
    pub fn spawn(
        invocation: &Invocation,
        cancel: &CancellationToken,
        deadline: Option<Duration>,
        stderr_limit: usize,
    ) -> std::io::Result<Self> {
        let program = invocation.program.to_string_lossy().into_owned();

        info!(
            "Spawning {} in {:?} with {} args",
            program,
            invocation.working_dir,
            invocation.args.len()
        );

        let mut cmd = if cfg!(target_os = "windows") && program.ends_with(".cmd") {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&invocation.program);
            c
        } else {
            Command::new(&invocation.program)
        };

        cmd.args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &invocation.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn()?;
        let token = cancel.child_token();

        let stdout = child.stdout.take();
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("Failed to capture stderr"))?;

        let stderr_token = token.clone();
        let stderr_task = tokio::spawn(async move {
            let mut reader = LineReader::new(stderr);
            let mut buffer = StderrBuffer::new(stderr_limit);
            loop {
                tokio::select! {
                    _ = stderr_token.cancelled() => break,
                    line = reader.next_line() => match line {
                        Ok(Some(line)) => {
                            debug!("stderr: {}", line);
                            buffer.push_line(&line);
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!("stderr read failed: {}", e);
                            break;
                        }
                    },
                }
            }
            buffer.into_string()
        });

        Ok(Self {
            child,
            program,
            stdout,
            stderr_task,
            caller: cancel.clone(),
            token,
            deadline: deadline.filter(|d| !d.is_zero()),
            started_at: Instant::now(),
        })
    }

    /// Get the process ID
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Token that fires on caller cancellation or deadline expiry
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Take the stdout handle (can only be called once)
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Wait for exit, cancellation or deadline, then join both readers
    ///
    /// On cancellation or deadline the process is killed and reaped before
    /// the readers are joined. The deadline and the caller token stay armed
    /// while the readers drain, so a descendant that keeps the pipes open
    /// after the direct child exits cannot hold the call past either.
    pub async fn wait<T>(
        mut self,
        stdout_task: JoinHandle<T>,
    ) -> std::io::Result<SessionOutcome<T>> {
        let deadline_at = self
            .deadline
            .map(|d| tokio::time::Instant::from_std(self.started_at + d));
        let expired = async move {
            match deadline_at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        let mut termination = tokio::select! {
            biased;
            _ = self.caller.cancelled() => Termination::Cancelled,
            _ = &mut expired => Termination::TimedOut(self.deadline.unwrap_or_default()),
            status = self.child.wait() => Termination::Exited(status?),
        };

        if !matches!(termination, Termination::Exited(_)) {
            warn!("Terminating {} ({:?})", self.program, termination);
            self.token.cancel();
            if let Err(e) = self.child.kill().await {
                warn!("Failed to kill {}: {}", self.program, e);
            }
        }

        let stderr_task = self.stderr_task;
        let joined = async move { (stdout_task.await, stderr_task.await) };
        tokio::pin!(joined);

        let exited = matches!(termination, Termination::Exited(_));
        let drained = tokio::select! {
            biased;
            _ = self.caller.cancelled(), if exited => Err(Termination::Cancelled),
            _ = &mut expired, if exited => {
                Err(Termination::TimedOut(self.deadline.unwrap_or_default()))
            }
            out = &mut joined => Ok(out),
        };
        let (stdout, stderr) = match drained {
            Ok(out) => {
                // Readers stop on the caller token, so they may have
                // finished early because of it
                if exited && self.caller.is_cancelled() {
                    termination = Termination::Cancelled;
                }
                out
            }
            Err(late) => {
                warn!(
                    "{} exited but its output is still open, abandoning ({:?})",
                    self.program, late
                );
                termination = late;
                self.token.cancel();
                joined.await
            }
        };
        let stdout =
            stdout.map_err(|e| std::io::Error::other(format!("stdout reader failed: {}", e)))?;
        let stderr = stderr.unwrap_or_default();
        let elapsed = self.started_at.elapsed();

        info!(
            "{} finished after {}ms: {:?}",
            self.program,
            elapsed.as_millis(),
            termination
        );

        Ok(SessionOutcome {
            termination,
            stderr,
            stdout,
            elapsed,
        })
    }
}
