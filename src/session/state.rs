//! Session state machine
//!
//! Tracks a client session from connection to disconnection.

use std::net::SocketAddr;
use std::time::Instant;

use crate::protocol::Identity;
use crate::stats::SessionStats;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, no identity yet
    Connected,
    /// Identity accepted by the hub
    Registered,
    /// Session closed (terminal)
    Closed,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: SessionPhase,

    /// Identity accepted by the hub (None until registration succeeds)
    pub identity: Option<Identity>,

    /// Connection start time
    pub connected_at: Instant,

    /// Time when registration succeeded
    pub registered_at: Option<Instant>,

    /// Traffic counters
    pub stats: SessionStats,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Connected,
            identity: None,
            connected_at: Instant::now(),
            registered_at: None,
            stats: SessionStats::new(),
        }
    }

    /// Record an identity accepted by the hub
    pub fn on_registered(&mut self, identity: Identity) {
        if self.phase == SessionPhase::Connected {
            self.identity = Some(identity);
            self.registered_at = Some(Instant::now());
            self.phase = SessionPhase::Registered;
        }
    }

    /// Check if the session holds an identity
    pub fn is_registered(&self) -> bool {
        self.phase == SessionPhase::Registered
    }

    /// Get session duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }

    /// Close the session; returns false if it was already closed
    pub fn close(&mut self) -> bool {
        if self.phase == SessionPhase::Closed {
            return false;
        }
        self.phase = SessionPhase::Closed;
        self.stats.duration = self.duration();
        true
    }
}
