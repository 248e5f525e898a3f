//! The set of active (post-handshake) sessions, and broadcasting to it.
//!
//! Each session registers a bounded channel to its writer task. Sends
//! are fire-and-forget: a full or closed channel marks that session for
//! removal so one stalled client can never hold up the rest.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::interaction::InputAction;
use crate::tracking::HandPresence;

use super::codes::ActionCode;
use super::wire::{Envelope, HandPresenceEvent, WireInputAction};

/// Outbound capacity per session before it counts as a slow consumer.
pub const SESSION_QUEUE_CAPACITY: usize = 64;

struct Inner {
    sessions: HashMap<u64, mpsc::Sender<String>>,
    next_id: u64,
    /// Latest presence event, handed to every session at attach time so
    /// late joiners know the current state.
    cached_presence: HandPresenceEvent,
}

pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                next_id: 1,
                cached_presence: HandPresenceEvent {
                    state: HandPresence::HandsLost,
                },
            }),
        }
    }

    /// Reserve a session id before the handshake completes.
    pub fn next_session_id(&self) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        id
    }

    /// Add a handshaken session to the broadcast set. Returns the cached
    /// presence event the new session must immediately receive.
    pub fn attach(&self, id: u64, sender: mpsc::Sender<String>) -> HandPresenceEvent {
        let mut inner = self.inner.lock().unwrap();
        inner.sessions.insert(id, sender);
        info!(session = id, total = inner.sessions.len(), "session attached");
        inner.cached_presence
    }

    pub fn detach(&self, id: u64) {
        let mut inner = self.inner.lock().unwrap();
        if inner.sessions.remove(&id).is_some() {
            info!(session = id, total = inner.sessions.len(), "session detached");
        }
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().unwrap().sessions.len()
    }

    /// Broadcast an input action to every attached session.
    pub fn broadcast_input_action(&self, action: &InputAction) {
        let payload =
            Envelope::new(ActionCode::InputAction, &WireInputAction::from(action)).to_json();
        self.broadcast(payload);
    }

    /// Broadcast a presence transition and remember it for late joiners.
    pub fn broadcast_presence(&self, state: HandPresence) {
        let event = HandPresenceEvent { state };
        {
            let mut inner = self.inner.lock().unwrap();
            inner.cached_presence = event;
        }
        let payload = Envelope::new(ActionCode::HandPresenceEvent, &event).to_json();
        self.broadcast(payload);
    }

    /// Serialize a presence event for a single session.
    pub fn presence_payload(event: HandPresenceEvent) -> String {
        Envelope::new(ActionCode::HandPresenceEvent, &event).to_json()
    }

    fn broadcast(&self, payload: String) {
        let mut inner = self.inner.lock().unwrap();
        let mut slow = Vec::new();

        for (id, sender) in &inner.sessions {
            match sender.try_send(payload.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(session = *id, "slow consumer; dropping session");
                    slow.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    slow.push(*id);
                }
            }
        }

        for id in slow {
            inner.sessions.remove(&id);
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────
