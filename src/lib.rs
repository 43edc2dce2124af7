//! A minimal line-oriented TCP chat server
//!
//! Clients register an `@identity`, join `#channels` and send messages to a
//! channel or directly to another identity:
//!
//! ```text
//! REG @alice
//! JOIN #general
//! MSG #general 5
//! Hello
//! ```
//!
//! Every `MSG` carries an explicit body length, so bodies may contain any
//! bytes including newlines. Routing state lives in a single [`Hub`] task;
//! each connection is served by a [`session::ClientSession`].
//!
//! # Example
//!
//! ```no_run
//! use chat_hub::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> chat_hub::Result<()> {
//!     let server = ChatServer::new(ServerConfig::default());
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod hub;
pub mod protocol;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use hub::{Hub, HubConfig, HubHandle, RoutingPolicy};
pub use server::{ChatServer, ServerConfig};
pub use stats::HubStats;
