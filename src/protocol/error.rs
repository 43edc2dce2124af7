//! Protocol error types
//!
//! Every variant describes a malformed frame. These are reported to the
//! offending connection as `ERR <message>` and never end the session.

/// Error type for frame decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Command word is not one of REG, JOIN, MSG
    UnknownCommand(String),
    /// Identity is empty or lacks the `@` prefix
    InvalidIdentity,
    /// Channel name is empty or lacks the `#` prefix
    InvalidChannelName,
    /// Message recipient is neither a channel nor an identity
    InvalidRecipient,
    /// `MSG` header has no body length
    MissingLength,
    /// `MSG` declared a zero-length body
    EmptyBody,
    /// Fewer body bytes than declared were available
    TruncatedBody { expected: usize, available: usize },
    /// Declared body length exceeds the configured limit
    BodyTooLarge { length: usize, max: usize },
    /// Command line exceeds the configured limit
    LineTooLong { max: usize },
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::UnknownCommand(word) => write!(f, "unknown command {}", word),
            ProtocolError::InvalidIdentity => {
                write!(f, "username must start with @ and must not be empty")
            }
            ProtocolError::InvalidChannelName => {
                write!(f, "channel name must start with # and must not be empty")
            }
            ProtocolError::InvalidRecipient => write!(f, "recipient must start with # or @"),
            ProtocolError::MissingLength => write!(f, "body length must be present"),
            ProtocolError::EmptyBody => write!(f, "body length must be at least 1"),
            ProtocolError::TruncatedBody {
                expected,
                available,
            } => write!(
                f,
                "body truncated: expected {} bytes, got {}",
                expected, available
            ),
            ProtocolError::BodyTooLarge { length, max } => {
                write!(f, "body length {} exceeds limit of {}", length, max)
            }
            ProtocolError::LineTooLong { max } => write!(f, "line exceeds {} bytes", max),
        }
    }
}

impl std::error::Error for ProtocolError {}
