//! Hub configuration

/// What the hub does when a command cannot be routed
///
/// Covers unregistered senders, unknown recipients, missing channels and
/// non-member senders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingPolicy {
    /// Drop the command without telling the sender
    #[default]
    Silent,
    /// Drop the command and reply `ERR <reason>` to the sender
    Notify,
}

/// Hub configuration options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of the shared command queue (join and message commands)
    pub command_queue_capacity: usize,

    /// Capacity of the registration and deregistration queues
    pub registration_queue_capacity: usize,

    /// Handling of commands that cannot be routed
    pub routing_policy: RoutingPolicy,

    /// Send "<identity> has joined the channel" to existing members on join
    pub announce_joins: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_queue_capacity: 1024,
            registration_queue_capacity: 256,
            routing_policy: RoutingPolicy::Silent,
            announce_joins: false,
        }
    }
}

impl HubConfig {
    /// Set the command queue capacity (at least 1)
    pub fn command_queue_capacity(mut self, capacity: usize) -> Self {
        self.command_queue_capacity = capacity.max(1);
        self
    }

    /// Set the registration queue capacity (at least 1)
    pub fn registration_queue_capacity(mut self, capacity: usize) -> Self {
        self.registration_queue_capacity = capacity.max(1);
        self
    }

    /// Set the routing failure policy
    pub fn routing_policy(mut self, policy: RoutingPolicy) -> Self {
        self.routing_policy = policy;
        self
    }

    /// Enable join announcements
    pub fn announce_joins(mut self, enabled: bool) -> Self {
        self.announce_joins = enabled;
        self
    }
}
