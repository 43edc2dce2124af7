//! Routing hub
//!
//! The hub owns every identity registration and channel membership. It runs
//! on a single task and is reached only through message queues, so all state
//! transitions are serialized without locks.
//!
//! # Architecture
//!
//! ```text
//!   [ClientSession]   [ClientSession]   [ClientSession]
//!         │                 │                 │
//!         │ register ───────┼─────────────────┼──► registrations ─┐
//!         │ deregister ─────┼─────────────────┼──► deregistrations ├─► Hub task
//!         │ join / msg ─────┴─────────────────┴──► commands ───────┘   │
//!         │                                                            │
//!         │                 users: Identity → Member                   │
//!         │                 channels: ChannelName → Channel            │
//!         │                                                            │
//!         └◄── SessionHandle (bounded outbound queue) ◄── OK / ERR / messages
//!                    │
//!                    ▼
//!               writer task ──► TCP
//! ```
//!
//! Registration is synchronous for the session (it waits on a oneshot reply);
//! join and message commands are fire-and-forget.

pub mod actor;
pub mod channel;
pub mod command;
pub mod config;
pub mod error;
pub mod handle;

pub use actor::Hub;
pub use channel::{Channel, Fanout};
pub use command::{Action, Command, Registration};
pub use config::{HubConfig, RoutingPolicy};
pub use error::HubError;
pub use handle::HubHandle;
