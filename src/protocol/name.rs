//! Identity and channel name types
//!
//! Both are validated on construction, so anything holding an `Identity` or
//! a `ChannelName` can rely on the prefix being present and the name being
//! non-empty and free of whitespace.

use std::str::FromStr;

use super::constants::{CHANNEL_PREFIX, IDENTITY_PREFIX};
use super::error::ProtocolError;

/// A registered user handle, e.g. `@alice`
///
/// Case-sensitive: `@Alice` and `@alice` are different identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    /// Parse an identity from raw argument bytes (surrounding whitespace is trimmed)
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        parse_name(raw, IDENTITY_PREFIX)
            .map(Self)
            .ok_or(ProtocolError::InvalidIdentity)
    }

    /// The identity including its `@` prefix
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Identity {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A channel name, e.g. `#general`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelName(String);

impl ChannelName {
    /// Parse a channel name from raw argument bytes (surrounding whitespace is trimmed)
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        parse_name(raw, CHANNEL_PREFIX)
            .map(Self)
            .ok_or(ProtocolError::InvalidChannelName)
    }

    /// The channel name including its `#` prefix
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ChannelName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}

impl std::fmt::Display for ChannelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Target of a `MSG` command
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Recipient {
    /// Broadcast to every member of a channel
    Channel(ChannelName),
    /// Direct delivery to one user
    User(Identity),
}

impl Recipient {
    /// Parse a recipient token, dispatching on its prefix
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        let raw = raw.trim_ascii();
        match raw.first() {
            Some(&CHANNEL_PREFIX) => ChannelName::parse(raw)
                .map(Recipient::Channel)
                .map_err(|_| ProtocolError::InvalidRecipient),
            Some(&IDENTITY_PREFIX) => Identity::parse(raw)
                .map(Recipient::User)
                .map_err(|_| ProtocolError::InvalidRecipient),
            _ => Err(ProtocolError::InvalidRecipient),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Recipient::Channel(name) => name.as_str(),
            Recipient::User(identity) => identity.as_str(),
        }
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_name(raw: &[u8], prefix: u8) -> Option<String> {
    let raw = raw.trim_ascii();
    match raw.split_first() {
        Some((&first, rest)) if first == prefix && !rest.is_empty() => {}
        _ => return None,
    }

    // A name with inner whitespace could never be addressed by MSG
    if raw.iter().any(u8::is_ascii_whitespace) {
        return None;
    }

    std::str::from_utf8(raw).ok().map(str::to_owned)
}
