//! Channel membership and fan-out

use std::collections::HashMap;

use bytes::Bytes;

use crate::protocol::ChannelName;
use crate::session::{SessionHandle, SessionId};

/// Result of a fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fanout {
    /// Members whose queue accepted the line
    pub delivered: usize,
    /// Members whose queue was full or closed
    pub failed: usize,
}

/// A named broadcast group
///
/// Membership is a set keyed by session id: joining twice is a no-op.
#[derive(Debug)]
pub struct Channel {
    name: ChannelName,
    members: HashMap<SessionId, SessionHandle>,
}

impl Channel {
    pub fn new(name: ChannelName) -> Self {
        Self {
            name,
            members: HashMap::new(),
        }
    }

    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    /// Add a member; returns false if it was already present
    pub fn insert(&mut self, session: SessionHandle) -> bool {
        self.members.insert(session.id(), session).is_none()
    }

    /// Remove a member; returns false if it was not present
    pub fn remove(&mut self, session_id: SessionId) -> bool {
        self.members.remove(&session_id).is_some()
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.members.contains_key(&session_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Queue `frame` for every member, including the sender
    pub fn broadcast(&self, frame: &Bytes) -> Fanout {
        self.fan_out(frame, None)
    }

    /// Queue `frame` for every member except `skip`
    pub fn broadcast_except(&self, skip: SessionId, frame: &Bytes) -> Fanout {
        self.fan_out(frame, Some(skip))
    }

    // Best effort: a failing member never stops delivery to the others
    fn fan_out(&self, frame: &Bytes, skip: Option<SessionId>) -> Fanout {
        let mut fanout = Fanout::default();

        for (id, member) in &self.members {
            if Some(*id) == skip {
                continue;
            }
            match member.send(frame.clone()) {
                Ok(()) => fanout.delivered += 1,
                Err(e) => {
                    fanout.failed += 1;
                    tracing::warn!(
                        channel = %self.name,
                        session_id = *id,
                        error = %e,
                        "Dropped channel delivery"
                    );
                }
            }
        }

        fanout
    }
}
