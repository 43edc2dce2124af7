//! Client-side handle to the hub task

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::command::{Command, Registration};
use super::error::HubError;
use crate::protocol::Identity;
use crate::session::{SessionHandle, SessionId};
use crate::stats::{HubCounters, HubStats};

/// Cloneable handle for talking to the hub
///
/// All three queues are bounded; senders wait for capacity, which applies
/// backpressure to sessions when the hub falls behind.
#[derive(Debug, Clone)]
pub struct HubHandle {
    registrations: mpsc::Sender<Registration>,
    deregistrations: mpsc::Sender<SessionId>,
    commands: mpsc::Sender<Command>,
    counters: Arc<HubCounters>,
}

impl HubHandle {
    pub(super) fn new(
        registrations: mpsc::Sender<Registration>,
        deregistrations: mpsc::Sender<SessionId>,
        commands: mpsc::Sender<Command>,
        counters: Arc<HubCounters>,
    ) -> Self {
        Self {
            registrations,
            deregistrations,
            commands,
            counters,
        }
    }

    /// Claim `identity` for `session` and wait for the hub's decision
    ///
    /// The hub writes `OK` or `ERR <reason>` to the session itself; the
    /// returned result tells the caller which one it was.
    pub async fn register(&self, session: SessionHandle, identity: Identity) -> Result<(), HubError> {
        let (reply, answer) = oneshot::channel();
        self.registrations
            .send(Registration {
                session,
                identity,
                reply,
            })
            .await
            .map_err(|_| HubError::HubClosed)?;

        answer.await.map_err(|_| HubError::HubClosed)?
    }

    /// Notify the hub that a session has ended
    pub async fn deregister(&self, session_id: SessionId) -> Result<(), HubError> {
        self.deregistrations
            .send(session_id)
            .await
            .map_err(|_| HubError::HubClosed)
    }

    /// Enqueue a join or message command (fire-and-forget)
    pub async fn submit(&self, command: Command) -> Result<(), HubError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HubError::HubClosed)
    }

    /// Current hub statistics
    pub fn stats(&self) -> HubStats {
        self.counters.snapshot()
    }

    /// Check whether the hub task has stopped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
