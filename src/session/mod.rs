//! Client sessions
//!
//! A session reads frames from one connection and forwards them to the hub.
//! Everything written back to the client goes through its
//! [`SessionHandle`] and the single writer task behind it.

pub mod client;
pub mod handle;
pub mod state;

pub use client::ClientSession;
pub use handle::{write_loop, SessionHandle, SessionId, TransportFailure};
pub use state::{SessionPhase, SessionState};
