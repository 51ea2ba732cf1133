//! Bidirectional copy pump shared by the server relay and the client pipe.
//!
//! Each direction runs as its own task. The first direction to finish
//! decides the outcome of the whole relay; the other task is then aborted,
//! which drops (and so closes) the reader and writer it owns. There is no
//! half-close: a failure in either direction tears down both.

use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::common::READ_BUFFER_SIZE;
use crate::error::{Error, Result};

/// How one pump direction ended.
#[derive(Debug)]
pub enum PumpOutcome {
    /// Source reached end of input.
    Eof,
    /// Cancellation was observed before the next read.
    Cancelled,
    /// Reading from the source failed.
    ReadFailed(io::Error),
    /// Writing to the sink failed.
    WriteFailed(io::Error),
    /// The pump task panicked or was aborted.
    Panicked(String),
}

impl fmt::Display for PumpOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpOutcome::Eof => write!(f, "end of input"),
            PumpOutcome::Cancelled => write!(f, "cancelled"),
            PumpOutcome::ReadFailed(e) => write!(f, "read failed: {}", e),
            PumpOutcome::WriteFailed(e) => write!(f, "write failed: {}", e),
            PumpOutcome::Panicked(msg) => write!(f, "pump task failed: {}", msg),
        }
    }
}

/// One direction of a relay: bytes flow from `reader` to `writer`.
pub struct Pipe<R, W> {
    /// Name used in logs and errors (e.g. `to_backend`, `stdin`).
    pub direction: &'static str,
    pub reader: R,
    pub writer: W,
}

impl<R, W> Pipe<R, W> {
    pub fn new(direction: &'static str, reader: R, writer: W) -> Self {
        Self {
            direction,
            reader,
            writer,
        }
    }
}

/// Terminal outcome of a relay, tagged with the direction that ended first.
#[derive(Debug)]
pub struct RelayOutcome {
    pub direction: &'static str,
    pub outcome: PumpOutcome,
}

impl RelayOutcome {
    /// Converts the outcome for callers that surface relay failures.
    ///
    /// End of input is a normal way for a tunnel to end and maps to `Ok`.
    pub fn into_result(self) -> Result<()> {
        match self.outcome {
            PumpOutcome::Eof => Ok(()),
            PumpOutcome::Cancelled => Err(Error::Cancelled),
            PumpOutcome::ReadFailed(source) | PumpOutcome::WriteFailed(source) => {
                Err(Error::Relay {
                    direction: self.direction,
                    source,
                })
            }
            PumpOutcome::Panicked(msg) => Err(Error::Relay {
                direction: self.direction,
                source: io::Error::other(msg),
            }),
        }
    }
}

impl fmt::Display for RelayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.direction, self.outcome)
    }
}

/// Copies bytes from `reader` to `writer` until one side ends.
///
/// Cancellation is checked before every read. Each chunk of at most
/// [`READ_BUFFER_SIZE`] bytes is written in full and flushed before the
/// next read.
pub async fn pump<R, W>(mut reader: R, mut writer: W, cancel: CancellationToken) -> PumpOutcome
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        if cancel.is_cancelled() {
            return PumpOutcome::Cancelled;
        }

        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PumpOutcome::Cancelled,
            read = reader.read(&mut buf) => match read {
                Ok(0) => return PumpOutcome::Eof,
                Ok(n) => n,
                Err(e) => return PumpOutcome::ReadFailed(e),
            },
        };

        if let Err(e) = writer.write_all(&buf[..n]).await {
            return PumpOutcome::WriteFailed(e);
        }
        if let Err(e) = writer.flush().await {
            return PumpOutcome::WriteFailed(e);
        }
    }
}

/// Runs two pump directions concurrently and returns whichever ends first.
///
/// Both directions run under a child of `cancel`. Once the first finishes,
/// the child token is cancelled and the remaining task is aborted and
/// awaited, so every reader and writer has been dropped by the time this
/// returns. Dropping the returned future aborts both tasks as well.
pub async fn relay<R1, W1, R2, W2>(
    forward: Pipe<R1, W1>,
    backward: Pipe<R2, W2>,
    cancel: &CancellationToken,
) -> RelayOutcome
where
    R1: AsyncRead + Unpin + Send + 'static,
    W1: AsyncWrite + Unpin + Send + 'static,
    R2: AsyncRead + Unpin + Send + 'static,
    W2: AsyncWrite + Unpin + Send + 'static,
{
    let scope = cancel.child_token();
    let mut tasks = JoinSet::new();

    let forward_name = forward.direction;
    let backward_name = backward.direction;
    let span = tracing::Span::current();
    let forward_id = tasks
        .spawn(run_pipe(forward, scope.clone()).instrument(span.clone()))
        .id();
    tasks.spawn(run_pipe(backward, scope.clone()).instrument(span));

    let first = match tasks.join_next_with_id().await {
        Some(Ok((_, outcome))) => outcome,
        Some(Err(e)) => RelayOutcome {
            direction: if e.id() == forward_id {
                forward_name
            } else {
                backward_name
            },
            outcome: PumpOutcome::Panicked(e.to_string()),
        },
        None => RelayOutcome {
            direction: forward_name,
            outcome: PumpOutcome::Panicked("no pump task ran".to_string()),
        },
    };

    scope.cancel();
    tasks.shutdown().await;

    first
}

async fn run_pipe<R, W>(pipe: Pipe<R, W>, cancel: CancellationToken) -> RelayOutcome
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let outcome = pump(pipe.reader, pipe.writer, cancel).await;
    tracing::debug!(direction = pipe.direction, %outcome, "pump finished");
    RelayOutcome {
        direction: pipe.direction,
        outcome,
    }
}
