//! Outbound message delivery seam.
//!
//! The game core emits typed display/status events through a [`Messenger`]
//! without knowing anything about sockets. Delivery is fire-and-forget,
//! at most once per call; anything stronger is the transport's problem.

use crate::protocol::{Envelope, ServerMessage, Target};
use crate::types::SessionId;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub trait Messenger: Send {
    fn send(&self, target: Target, message: ServerMessage);

    fn broadcast(&self, message: ServerMessage) {
        self.send(Target::All, message);
    }

    fn send_to(&self, session_id: &SessionId, message: ServerMessage) {
        self.send(Target::One(session_id.clone()), message);
    }
}

/// Fans envelopes out to every connected socket through a broadcast
/// channel; each connection task filters on the target itself.
pub struct ChannelMessenger {
    tx: broadcast::Sender<Envelope>,
}

impl ChannelMessenger {
    pub fn new(tx: broadcast::Sender<Envelope>) -> Self {
        Self { tx }
    }
}

impl Messenger for ChannelMessenger {
    fn send(&self, target: Target, message: ServerMessage) {
        // No receivers connected is fine.
        let _ = self.tx.send(Envelope { target, message });
    }
}

/// Collects everything it is handed. Used by tests to assert on traffic.
#[derive(Clone, Default)]
pub struct RecordingMessenger {
    sent: Arc<Mutex<Vec<Envelope>>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Messenger for RecordingMessenger {
    fn send(&self, target: Target, message: ServerMessage) {
        self.sent.lock().unwrap().push(Envelope { target, message });
    }
}
