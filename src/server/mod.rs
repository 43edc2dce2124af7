//! TCP server
//!
//! Binds the listener, enforces the connection limit and spawns one
//! [`ClientSession`](crate::session::ClientSession) per accepted socket.

pub mod config;
pub mod listener;

pub use config::ServerConfig;
pub use listener::ChatServer;
