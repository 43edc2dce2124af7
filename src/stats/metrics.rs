//! Statistics for chat sessions and the hub

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Session-level statistics
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Total bytes received from the client
    pub bytes_received: u64,
    /// Total bytes written to the client
    pub bytes_sent: u64,
    /// Frames decoded successfully
    pub frames: u64,
    /// Frames rejected with `ERR`
    pub protocol_errors: u64,
    /// Connection duration
    pub duration: Duration,
}

impl SessionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }
}

/// Live hub counters
///
/// Written only by the hub task; read by any holder of a `HubHandle`
/// without going through the hub's queues.
#[derive(Debug, Default)]
pub struct HubCounters {
    users: AtomicUsize,
    channels: AtomicUsize,
    messages_routed: AtomicU64,
    messages_dropped: AtomicU64,
    deliveries: AtomicU64,
    transport_failures: AtomicU64,
    faults: AtomicU64,
}

impl HubCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_users(&self, users: usize) {
        self.users.store(users, Ordering::Relaxed);
    }

    pub(crate) fn set_channels(&self, channels: usize) {
        self.channels.store(channels, Ordering::Relaxed);
    }

    pub(crate) fn record_routed(&self) {
        self.messages_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deliveries(&self, delivered: usize, failed: usize) {
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.transport_failures
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters
    pub fn snapshot(&self) -> HubStats {
        HubStats {
            users: self.users.load(Ordering::Relaxed),
            channels: self.channels.load(Ordering::Relaxed),
            messages_routed: self.messages_routed.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }
}

/// Hub-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Registered identities
    pub users: usize,
    /// Channels ever created (channels are never destroyed)
    pub channels: usize,
    /// Join and message commands that were routed
    pub messages_routed: u64,
    /// Commands dropped for a routing failure
    pub messages_dropped: u64,
    /// Lines queued to client connections by the hub
    pub deliveries: u64,
    /// Lines that could not be queued (client queue full or closed)
    pub transport_failures: u64,
    /// Hub events that faulted and were isolated
    pub faults: u64,
}
