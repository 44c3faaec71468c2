//! Cancellable bounded chunk queue

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{AdapterError, ErrorKind};
use crate::response::NormalizedChunk;

/// Sending half of a chunk queue
///
/// Every send races the cancellation token so a reader never blocks
/// forever on a caller that stopped receiving.
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: mpsc::Sender<NormalizedChunk>,
    cancel: CancellationToken,
}

impl ChunkSender {
    /// Send a chunk; returns false if cancelled or the receiver is gone
    pub async fn send(&self, chunk: NormalizedChunk) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!("Call cancelled, dropping chunk");
                false
            }
            sent = self.tx.send(chunk) => {
                if sent.is_err() {
                    warn!("Chunk receiver dropped");
                }
                sent.is_ok()
            }
        }
    }

    /// Send the terminal chunk even after cancellation
    ///
    /// Used for the single error chunk; gives up immediately when the
    /// queue is full or closed.
    pub fn send_terminal(&self, chunk: NormalizedChunk) -> bool {
        self.tx.try_send(chunk).is_ok()
    }
}

/// Ordered stream of chunks from one call
///
/// Terminated by exactly one chunk with `done == true`, which is either a
/// normal completion or an error chunk. If the queue closes before a
/// terminal chunk arrived (the error chunk did not fit a full queue, or the
/// producer went away) the stream supplies one itself.
#[derive(Debug)]
pub struct ChunkStream {
    inner: ReceiverStream<NormalizedChunk>,
    cancel: CancellationToken,
    origin: String,
    terminated: bool,
}

impl ChunkStream {
    /// Receive the next chunk, `None` once the stream has terminated
    pub async fn recv(&mut self) -> Option<NormalizedChunk> {
        self.next().await
    }

    /// Drain the stream into a vector
    pub async fn collect_all(mut self) -> Vec<NormalizedChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.recv().await {
            chunks.push(chunk);
        }
        chunks
    }

    fn closed_early(&self) -> NormalizedChunk {
        let err = if self.cancel.is_cancelled() {
            AdapterError::cancelled(self.origin.as_str(), "stream")
        } else {
            AdapterError::new(
                self.origin.as_str(),
                "stream",
                ErrorKind::Io(std::io::Error::other("stream closed before completion")),
                false,
            )
        };
        warn!("{}", err);
        NormalizedChunk::failed(&err)
    }
}

impl Stream for ChunkStream {
    type Item = NormalizedChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(chunk)) => {
                self.terminated = chunk.done;
                Poll::Ready(Some(chunk))
            }
            Poll::Ready(None) => {
                self.terminated = true;
                Poll::Ready(Some(self.closed_early()))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Create a bounded queue whose sends abandon on `cancel`
///
/// `origin` labels the error chunk the stream makes up when the queue
/// closes without one.
pub fn channel(
    capacity: usize,
    cancel: CancellationToken,
    origin: impl Into<String>,
) -> (ChunkSender, ChunkStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ChunkSender {
            tx,
            cancel: cancel.clone(),
        },
        ChunkStream {
            inner: ReceiverStream::new(rx),
            cancel,
            origin: origin.into(),
            terminated: false,
        },
    )
}
