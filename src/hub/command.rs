//! Messages sent from sessions to the hub

use bytes::Bytes;
use tokio::sync::oneshot;

use super::error::HubError;
use crate::protocol::{ChannelName, Identity, Recipient};
use crate::session::SessionHandle;

/// A validated routing command
#[derive(Debug)]
pub struct Command {
    /// Session that issued the command (replies go here)
    pub origin: SessionHandle,
    /// Identity the session believes it holds (`None` before registration)
    pub sender: Option<Identity>,
    /// What to do
    pub action: Action,
}

/// Routing action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Join (or lazily create) a channel
    Join {
        channel: ChannelName,
        /// "<identity> has joined the channel"
        notice: Bytes,
    },
    /// Deliver a message body to a channel or a user
    Deliver { recipient: Recipient, body: Bytes },
}

impl Command {
    /// Build a join command with the standard join notice
    pub fn join(origin: SessionHandle, sender: Option<Identity>, channel: ChannelName) -> Self {
        let who = sender.as_ref().map_or("", Identity::as_str);
        let notice = Bytes::from(format!("{} has joined the channel", who));
        Self {
            origin,
            sender,
            action: Action::Join { channel, notice },
        }
    }

    /// Build a message delivery command
    pub fn deliver(
        origin: SessionHandle,
        sender: Option<Identity>,
        recipient: Recipient,
        body: Bytes,
    ) -> Self {
        Self {
            origin,
            sender,
            action: Action::Deliver { recipient, body },
        }
    }

    /// Channel or user name the command targets
    pub fn recipient(&self) -> &str {
        match &self.action {
            Action::Join { channel, .. } => channel.as_str(),
            Action::Deliver { recipient, .. } => recipient.as_str(),
        }
    }
}

/// Registration request; the hub answers on `reply`
#[derive(Debug)]
pub struct Registration {
    pub session: SessionHandle,
    pub identity: Identity,
    pub reply: oneshot::Sender<Result<(), HubError>>,
}
