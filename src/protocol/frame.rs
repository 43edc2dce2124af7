//! Decoded frame types
//!
//! A frame is one complete client command. Verbs outside the fixed set are
//! rejected by the decoder rather than represented here.

use bytes::Bytes;

use super::name::{ChannelName, Identity, Recipient};

/// Command word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// `REG @identity`
    Reg,
    /// `JOIN #channel`
    Join,
    /// `MSG <recipient> <length>` followed by the body
    Msg,
}

impl Verb {
    /// Match a command word case-insensitively
    pub fn parse(word: &[u8]) -> Option<Self> {
        if word.eq_ignore_ascii_case(b"REG") {
            Some(Verb::Reg)
        } else if word.eq_ignore_ascii_case(b"JOIN") {
            Some(Verb::Join)
        } else if word.eq_ignore_ascii_case(b"MSG") {
            Some(Verb::Msg)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Reg => "REG",
            Verb::Join => "JOIN",
            Verb::Msg => "MSG",
        }
    }
}

/// A decoded client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Claim an identity
    Register(Identity),
    /// Join (or lazily create) a channel
    Join(ChannelName),
    /// Send a body to a channel or a user
    Message {
        recipient: Recipient,
        /// Raw body bytes, exactly as many as declared
        body: Bytes,
    },
}

impl Frame {
    pub fn verb(&self) -> Verb {
        match self {
            Frame::Register(_) => Verb::Reg,
            Frame::Join(_) => Verb::Join,
            Frame::Message { .. } => Verb::Msg,
        }
    }
}
