//! Session handle and connection writer
//!
//! Every connection has exactly one writer task that owns the write half of
//! the transport and drains a bounded queue of encoded lines. Everything
//! that wants to write to the client (the hub's deliveries and the session's
//! own `ERR` replies) goes through a `SessionHandle`, so lines from
//! different producers never interleave.

use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Unique session identifier
pub type SessionId = u64;

/// Error queuing a line for a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// Client is not draining its queue fast enough
    QueueFull,
    /// Writer has stopped (connection closed or write error)
    Closed,
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportFailure::QueueFull => write!(f, "outbound queue full"),
            TransportFailure::Closed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for TransportFailure {}

/// Reference to a live session held by the hub and its channels
///
/// Cheap to clone. Dropping every clone ends the session's writer task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    tx: mpsc::Sender<Bytes>,
}

impl SessionHandle {
    /// Wrap an existing outbound queue
    pub fn new(id: SessionId, tx: mpsc::Sender<Bytes>) -> Self {
        Self { id, tx }
    }

    /// Create a handle together with the receiving end of its outbound queue
    pub fn channel(id: SessionId, capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Queue a line without waiting
    ///
    /// Used by the hub, which must never block on a slow client.
    pub fn send(&self, data: Bytes) -> Result<(), TransportFailure> {
        self.tx.try_send(data).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportFailure::QueueFull,
            mpsc::error::TrySendError::Closed(_) => TransportFailure::Closed,
        })
    }

    /// Queue a line, waiting for space
    ///
    /// Used by the session itself for its direct replies.
    pub async fn send_wait(&self, data: Bytes) -> Result<(), TransportFailure> {
        self.tx
            .send(data)
            .await
            .map_err(|_| TransportFailure::Closed)
    }

    /// Check whether the writer has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Drain the outbound queue into the connection
///
/// Runs until every `SessionHandle` for the session is dropped, then shuts
/// down the write side. Returns the number of bytes written.
///
/// Each write must complete within `write_timeout` (zero disables the
/// limit); a peer that stops reading fails the loop with `TimedOut`, which
/// closes the queue for every handle.
pub async fn write_loop<W>(
    session_id: SessionId,
    mut rx: mpsc::Receiver<Bytes>,
    mut writer: W,
    write_timeout: Duration,
) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;

    while let Some(data) = rx.recv().await {
        within(write_timeout, writer.write_all(&data)).await?;
        written += data.len() as u64;

        // Batch whatever else is already queued before flushing
        while let Ok(data) = rx.try_recv() {
            within(write_timeout, writer.write_all(&data)).await?;
            written += data.len() as u64;
        }
        within(write_timeout, writer.flush()).await?;
    }

    within(write_timeout, writer.shutdown()).await?;
    tracing::trace!(session_id = session_id, bytes = written, "Writer finished");
    Ok(written)
}

async fn within<F>(limit: Duration, op: F) -> io::Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    if limit.is_zero() {
        return op.await;
    }
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
    }
}
