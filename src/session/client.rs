//! Client session
//!
//! Owns one connection for its lifetime: reads and decodes frames, turns
//! them into hub requests, and reports malformed frames straight back to the
//! client. On close it sends exactly one deregistration to the hub.

use std::io;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use super::handle::{write_loop, SessionHandle, SessionId, TransportFailure};
use super::state::SessionState;
use crate::error::{Error, Result};
use crate::hub::{Command, HubError, HubHandle};
use crate::protocol::{encode_error, Frame, FrameDecoder, Identity};
use crate::server::ServerConfig;

/// A client session bound to one connection
pub struct ClientSession {
    state: SessionState,
    config: ServerConfig,
    hub: HubHandle,
    decoder: FrameDecoder,
}

impl ClientSession {
    pub fn new(session_id: SessionId, peer_addr: SocketAddr, config: ServerConfig, hub: HubHandle) -> Self {
        let decoder = FrameDecoder::with_limits(config.max_line_length, config.max_body_length);

        Self {
            state: SessionState::new(session_id, peer_addr),
            config,
            hub,
            decoder,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Serve the connection until it closes
    ///
    /// End-of-stream is a clean close and returns `Ok`. Read errors, idle
    /// timeouts, a client that stops reading and a stopped hub end the
    /// session with an error. Either way the hub is told the session is gone.
    pub async fn run<S>(mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let session_id = self.state.id;
        let (reader, writer) = tokio::io::split(stream);
        let (handle, outbound) =
            SessionHandle::channel(session_id, self.config.outbound_queue_capacity);
        let writer_task = tokio::spawn(write_loop(
            session_id,
            outbound,
            writer,
            self.config.write_timeout,
        ));

        let result = self.receive_loop(reader, &handle).await;
        if let Err(Error::Timeout) = result {
            let _ = self.reply(&handle, encode_error(Error::Timeout)).await;
        }

        self.close().await;
        drop(handle);

        match writer_task.await {
            Ok(Ok(bytes)) => self.state.stats.bytes_sent = bytes,
            Ok(Err(e)) => {
                tracing::debug!(session_id = session_id, error = %e, "Write failed")
            }
            Err(e) => tracing::warn!(session_id = session_id, error = %e, "Writer task failed"),
        }

        let stats = &self.state.stats;
        tracing::debug!(
            session_id = session_id,
            peer = %self.state.peer_addr,
            identity = self.state.identity.as_ref().map(Identity::as_str),
            bytes_received = stats.bytes_received,
            bytes_sent = stats.bytes_sent,
            frames = stats.frames,
            protocol_errors = stats.protocol_errors,
            duration_ms = stats.duration.as_millis() as u64,
            "Session closed"
        );

        result
    }

    async fn receive_loop<R>(&mut self, mut reader: R, handle: &SessionHandle) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = BytesMut::with_capacity(self.config.read_buffer_size);

        loop {
            self.process_buffer(&mut buf, handle, false).await?;

            buf.reserve(self.config.read_buffer_size.max(1));
            let n = self.read_some(&mut reader, &mut buf).await?;
            if n == 0 {
                // Peer closed: whatever is left is the final (possibly truncated) frame
                self.process_buffer(&mut buf, handle, true).await?;
                tracing::debug!(session_id = self.state.id, "Peer closed connection");
                return Ok(());
            }
            self.state.stats.bytes_received += n as u64;

            // The writer gave up on this client; nothing more can reach it
            if handle.is_closed() {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, TransportFailure::Closed).into());
            }
        }
    }

    async fn read_some<R>(&self, reader: &mut R, buf: &mut BytesMut) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        if self.config.idle_timeout.is_zero() {
            return Ok(reader.read_buf(buf).await?);
        }

        match tokio::time::timeout(self.config.idle_timeout, reader.read_buf(buf)).await {
            Ok(read) => Ok(read?),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Decode and dispatch every complete frame in the buffer
    async fn process_buffer(&mut self, buf: &mut BytesMut, handle: &SessionHandle, eof: bool) -> Result<()> {
        loop {
            let decoded = if eof {
                self.decoder.decode_eof(buf)
            } else {
                self.decoder.decode(buf)
            };

            match decoded {
                Ok(Some(frame)) => {
                    self.state.stats.frames += 1;
                    self.dispatch(frame, handle).await?;
                }
                Ok(None) => return Ok(()),
                Err(err) => {
                    self.state.stats.protocol_errors += 1;
                    tracing::debug!(session_id = self.state.id, error = %err, "Rejected frame");
                    self.reply(handle, encode_error(&err)).await?;
                }
            }
        }
    }

    async fn dispatch(&mut self, frame: Frame, handle: &SessionHandle) -> Result<()> {
        tracing::trace!(session_id = self.state.id, verb = frame.verb().as_str(), "Frame");

        match frame {
            Frame::Register(identity) => self.register(identity, handle).await,
            Frame::Join(channel) => {
                let command = Command::join(handle.clone(), self.state.identity.clone(), channel);
                Ok(self.hub.submit(command).await?)
            }
            Frame::Message { recipient, body } => {
                let command = Command::deliver(
                    handle.clone(),
                    self.state.identity.clone(),
                    recipient,
                    body,
                );
                Ok(self.hub.submit(command).await?)
            }
        }
    }

    async fn register(&mut self, identity: Identity, handle: &SessionHandle) -> Result<()> {
        if let Some(current) = &self.state.identity {
            let err = HubError::AlreadyRegistered(current.clone());
            return self.reply(handle, encode_error(&err)).await;
        }

        // The hub writes OK / ERR itself; the answer tells us which
        match self.hub.register(handle.clone(), identity.clone()).await {
            Ok(()) => {
                tracing::debug!(session_id = self.state.id, identity = %identity, "Registered");
                self.state.on_registered(identity);
                Ok(())
            }
            Err(HubError::HubClosed) => Err(HubError::HubClosed.into()),
            Err(err) => {
                tracing::debug!(
                    session_id = self.state.id,
                    identity = %identity,
                    reason = %err,
                    "Registration rejected"
                );
                Ok(())
            }
        }
    }

    async fn close(&mut self) {
        if !self.state.close() {
            return;
        }
        if let Err(e) = self.hub.deregister(self.state.id).await {
            tracing::debug!(session_id = self.state.id, error = %e, "Deregistration not delivered");
        }
    }

    /// Queue a reply written by the session itself
    ///
    /// Fails when the writer has stopped or the queue stays full for the
    /// whole write timeout; either ends the session.
    async fn reply(&self, handle: &SessionHandle, data: Bytes) -> Result<()> {
        let limit = self.config.write_timeout;
        let sent = if limit.is_zero() {
            handle.send_wait(data).await
        } else {
            match tokio::time::timeout(limit, handle.send_wait(data)).await {
                Ok(sent) => sent,
                Err(_) => Err(TransportFailure::QueueFull),
            }
        };

        sent.map_err(|e| {
            tracing::debug!(session_id = handle.id(), error = %e, "Reply not delivered");
            let kind = match e {
                TransportFailure::QueueFull => io::ErrorKind::TimedOut,
                TransportFailure::Closed => io::ErrorKind::BrokenPipe,
            };
            Error::Io(io::Error::new(kind, e))
        })
    }
}
