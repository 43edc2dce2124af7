//! Error types
//!
//! `Error` is the crate-level error returned by sessions and the server.
//! Layer-specific errors (`ProtocolError`, `HubError`) convert into it so
//! `?` works across module boundaries.

use std::fmt;
use std::io;

use crate::hub::HubError;
use crate::protocol::ProtocolError;

/// Crate-level result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error
#[derive(Debug)]
pub enum Error {
    /// Transport failure (bind, accept, read)
    Io(io::Error),
    /// Malformed frame
    Protocol(ProtocolError),
    /// Hub rejected a request or is no longer running
    Hub(HubError),
    /// No data received within the idle timeout
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(e) => write!(f, "protocol error: {}", e),
            Error::Hub(e) => write!(f, "hub error: {}", e),
            Error::Timeout => write!(f, "idle timeout"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Hub(e) => Some(e),
            Error::Timeout => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<HubError> for Error {
    fn from(e: HubError) -> Self {
        Error::Hub(e)
    }
}
