//! Hub error types
//!
//! Registration rejections and routing failures. Routing failures are
//! either dropped silently or reported to the sender, depending on the
//! configured `RoutingPolicy`.

use crate::protocol::{ChannelName, Identity};

/// Error type for hub operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Identity is held by another session
    UsernameTaken(Identity),
    /// Session already holds an identity
    AlreadyRegistered(Identity),
    /// Sender has not completed registration
    NotRegistered,
    /// Direct message target is not registered
    NoSuchUser(Identity),
    /// Channel was never joined by anyone
    NoSuchChannel(ChannelName),
    /// Sender is not a member of the target channel
    NotAMember(ChannelName),
    /// Hub task is no longer running
    HubClosed,
}

impl std::fmt::Display for HubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubError::UsernameTaken(_) => write!(f, "username taken"),
            HubError::AlreadyRegistered(identity) => {
                write!(f, "already registered as {}", identity)
            }
            HubError::NotRegistered => write!(f, "not registered"),
            HubError::NoSuchUser(identity) => write!(f, "no such user {}", identity),
            HubError::NoSuchChannel(channel) => write!(f, "no such channel {}", channel),
            HubError::NotAMember(channel) => write!(f, "not a member of {}", channel),
            HubError::HubClosed => write!(f, "hub is not running"),
        }
    }
}

impl std::error::Error for HubError {}
