//! Hub control loop
//!
//! The hub task is the only owner of the registry (identity → session) and
//! the channel table. Sessions reach it through three bounded queues and it
//! answers by pushing encoded lines into the sessions' outbound queues, so
//! no state is shared and no locks are needed.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::channel::{Channel, Fanout};
use super::command::{Action, Command, Registration};
use super::config::{HubConfig, RoutingPolicy};
use super::error::HubError;
use super::handle::HubHandle;
use crate::protocol::{
    encode_channel_message, encode_direct_message, encode_error, encode_ok, ChannelName, Identity,
    Recipient,
};
use crate::session::{SessionHandle, SessionId};
use crate::stats::HubCounters;

/// Registry entry for a registered identity
#[derive(Debug)]
struct Member {
    session: SessionHandle,
    /// Reverse index of joined channels, used for cleanup on disconnect
    channels: HashSet<ChannelName>,
}

/// Receiving ends of the hub queues
struct Inbox {
    registrations: mpsc::Receiver<Registration>,
    deregistrations: mpsc::Receiver<SessionId>,
    commands: mpsc::Receiver<Command>,
}

enum Event {
    Register(Registration),
    Deregister(SessionId),
    Command(Command),
}

impl Event {
    fn kind(&self) -> &'static str {
        match self {
            Event::Register(_) => "register",
            Event::Deregister(_) => "deregister",
            Event::Command(_) => "command",
        }
    }
}

/// The routing hub
///
/// Can be driven directly through its methods (single-threaded use and
/// tests) or moved onto its own task with [`Hub::spawn`].
pub struct Hub {
    config: HubConfig,
    users: HashMap<Identity, Member>,
    sessions: HashMap<SessionId, Identity>,
    channels: HashMap<ChannelName, Channel>,
    counters: Arc<HubCounters>,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            users: HashMap::new(),
            sessions: HashMap::new(),
            channels: HashMap::new(),
            counters: Arc::new(HubCounters::new()),
        }
    }

    /// Start the hub on its own task
    ///
    /// The task runs until every clone of the returned handle is dropped.
    pub fn spawn(config: HubConfig) -> (HubHandle, JoinHandle<()>) {
        let (registrations_tx, registrations) =
            mpsc::channel(config.registration_queue_capacity.max(1));
        let (deregistrations_tx, deregistrations) =
            mpsc::channel(config.registration_queue_capacity.max(1));
        let (commands_tx, commands) = mpsc::channel(config.command_queue_capacity.max(1));

        let hub = Hub::new(config);
        let handle = HubHandle::new(
            registrations_tx,
            deregistrations_tx,
            commands_tx,
            Arc::clone(&hub.counters),
        );
        let inbox = Inbox {
            registrations,
            deregistrations,
            commands,
        };

        (handle, tokio::spawn(hub.run(inbox)))
    }

    async fn run(mut self, mut inbox: Inbox) {
        tracing::debug!("Hub started");

        loop {
            // A session's commands are always queued before its deregistration,
            // so draining commands first keeps them from being dropped as
            // coming from an unregistered sender. Deregistrations go ahead of
            // registrations so an identity freed by a closed session can be
            // claimed again at once.
            let event = tokio::select! {
                biased;
                Some(command) = inbox.commands.recv() => Event::Command(command),
                Some(session_id) = inbox.deregistrations.recv() => Event::Deregister(session_id),
                Some(registration) = inbox.registrations.recv() => Event::Register(registration),
                else => break,
            };
            self.dispatch(event);
        }

        tracing::debug!(
            users = self.users.len(),
            channels = self.channels.len(),
            "Hub stopped"
        );
    }

    /// Handle one event; a fault is logged and never ends the loop
    fn dispatch(&mut self, event: Event) {
        let kind = event.kind();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handle_event(event)));

        if let Err(payload) = outcome {
            self.counters.record_fault();
            tracing::error!(
                event = kind,
                panic = panic_message(payload.as_ref()),
                "Hub event faulted"
            );
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Register(Registration {
                session,
                identity,
                reply,
            }) => {
                let result = self.register(&session, identity);
                // The session may have gone away while waiting
                let _ = reply.send(result);
            }
            Event::Deregister(session_id) => {
                self.deregister(session_id);
            }
            Event::Command(command) => self.handle_command(command),
        }
    }

    /// Register `identity` for `session`
    ///
    /// Writes `OK` or `ERR <reason>` to the session.
    pub fn register(&mut self, session: &SessionHandle, identity: Identity) -> Result<(), HubError> {
        let result = if let Some(current) = self.sessions.get(&session.id()) {
            Err(HubError::AlreadyRegistered(current.clone()))
        } else if self.users.contains_key(&identity) {
            Err(HubError::UsernameTaken(identity))
        } else {
            tracing::info!(
                session_id = session.id(),
                identity = %identity,
                "User registered"
            );
            self.sessions.insert(session.id(), identity.clone());
            self.users.insert(
                identity,
                Member {
                    session: session.clone(),
                    channels: HashSet::new(),
                },
            );
            self.counters.set_users(self.users.len());
            Ok(())
        };

        match &result {
            Ok(()) => self.deliver(session, encode_ok()),
            Err(err) => {
                tracing::debug!(
                    session_id = session.id(),
                    reason = %err,
                    "Registration rejected"
                );
                self.deliver(session, encode_error(err));
            }
        }

        result
    }

    /// Remove a session from the registry and from every channel it joined
    ///
    /// Idempotent: returns false if the session held no identity.
    pub fn deregister(&mut self, session_id: SessionId) -> bool {
        let Some(identity) = self.sessions.remove(&session_id) else {
            return false;
        };

        let joined = self
            .users
            .remove(&identity)
            .map(|member| member.channels)
            .unwrap_or_default();
        for name in &joined {
            if let Some(channel) = self.channels.get_mut(name) {
                channel.remove(session_id);
            }
        }
        self.counters.set_users(self.users.len());

        tracing::info!(
            session_id = session_id,
            identity = %identity,
            channels = joined.len(),
            "User deregistered"
        );
        true
    }

    /// Route a join or message command
    pub fn handle_command(&mut self, command: Command) {
        tracing::trace!(
            session_id = command.origin.id(),
            target = command.recipient(),
            "Routing command"
        );

        let Command {
            origin,
            sender,
            action,
        } = command;

        let Some(identity) = self.verified_sender(origin.id(), sender.as_ref()) else {
            self.routing_failure(&origin, HubError::NotRegistered);
            return;
        };

        match action {
            Action::Join { channel, notice } => self.join_channel(&origin, identity, channel, notice),
            Action::Deliver { recipient, body } => {
                self.route_message(&origin, identity, recipient, body)
            }
        }
    }

    fn join_channel(
        &mut self,
        origin: &SessionHandle,
        identity: Identity,
        name: ChannelName,
        notice: Bytes,
    ) {
        let channel = self.channels.entry(name.clone()).or_insert_with(|| {
            tracing::info!(channel = %name, "Channel created");
            Channel::new(name.clone())
        });

        let newly_joined = channel.insert(origin.clone());
        let announced = if newly_joined && self.config.announce_joins {
            channel.broadcast_except(origin.id(), &encode_direct_message(&notice))
        } else {
            Fanout::default()
        };
        let members = channel.len();

        if let Some(member) = self.users.get_mut(&identity) {
            member.channels.insert(name.clone());
        }

        self.counters.set_channels(self.channels.len());
        self.counters
            .record_deliveries(announced.delivered, announced.failed);
        self.counters.record_routed();
        self.deliver(origin, encode_ok());

        tracing::debug!(
            identity = %identity,
            channel = %name,
            members = members,
            newly_joined = newly_joined,
            "Joined channel"
        );
    }

    fn route_message(
        &mut self,
        origin: &SessionHandle,
        sender: Identity,
        recipient: Recipient,
        body: Bytes,
    ) {
        match recipient {
            Recipient::Channel(name) => {
                let Some(channel) = self.channels.get(&name) else {
                    self.routing_failure(origin, HubError::NoSuchChannel(name));
                    return;
                };
                if !channel.contains(origin.id()) {
                    self.routing_failure(origin, HubError::NotAMember(name));
                    return;
                }

                let fanout = channel.broadcast(&encode_channel_message(&sender, &body));
                self.counters.record_deliveries(fanout.delivered, fanout.failed);
                self.counters.record_routed();

                tracing::debug!(
                    sender = %sender,
                    channel = %name,
                    bytes = body.len(),
                    delivered = fanout.delivered,
                    "Channel message"
                );
            }
            Recipient::User(target) => {
                let Some(member) = self.users.get(&target) else {
                    self.routing_failure(origin, HubError::NoSuchUser(target));
                    return;
                };

                self.deliver(&member.session, encode_direct_message(&body));
                self.counters.record_routed();

                tracing::debug!(
                    sender = %sender,
                    recipient = %target,
                    bytes = body.len(),
                    "Direct message"
                );
            }
        }
    }

    /// The registry's identity for the session, if it matches the claimed one
    fn verified_sender(&self, session_id: SessionId, claimed: Option<&Identity>) -> Option<Identity> {
        let registered = self.sessions.get(&session_id)?;
        (claimed == Some(registered)).then(|| registered.clone())
    }

    fn routing_failure(&self, origin: &SessionHandle, err: HubError) {
        self.counters.record_dropped();
        tracing::debug!(session_id = origin.id(), reason = %err, "Command not routed");

        if self.config.routing_policy == RoutingPolicy::Notify {
            self.deliver(origin, encode_error(&err));
        }
    }

    fn deliver(&self, session: &SessionHandle, data: Bytes) {
        match session.send(data) {
            Ok(()) => self.counters.record_deliveries(1, 0),
            Err(e) => {
                self.counters.record_deliveries(0, 1);
                tracing::warn!(session_id = session.id(), error = %e, "Dropped delivery");
            }
        }
    }

    /// Identity held by a session
    pub fn identity_of(&self, session_id: SessionId) -> Option<&Identity> {
        self.sessions.get(&session_id)
    }

    pub fn is_registered(&self, identity: &Identity) -> bool {
        self.users.contains_key(identity)
    }

    pub fn channel(&self, name: &ChannelName) -> Option<&Channel> {
        self.channels.get(name)
    }

    /// Channels joined by an identity
    pub fn joined_channels(&self, identity: &Identity) -> Option<&HashSet<ChannelName>> {
        self.users.get(identity).map(|member| &member.channels)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn counters(&self) -> &Arc<HubCounters> {
        &self.counters
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
