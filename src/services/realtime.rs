//! In-process real-time hub. Events are pushed to the WebSocket sessions that are connected at
//! publish time; nothing is queued for sessions that join later.

use crate::domain::actor::Role;
use crate::domain::events::{Audience, NotificationEvent};
use crate::ports::{Notifier, NotifyError};
use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::broadcast;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Envelope {
    pub audience: Audience,
    pub event: NotificationEvent,
}

/// Wire frame sent to a client.
#[derive(Debug, Serialize)]
pub struct Frame<'a> {
    pub event: &'static str,
    pub payload: &'a NotificationEvent,
}

impl Envelope {
    pub fn frame(&self) -> Frame<'_> {
        Frame {
            event: self.audience.channel(),
            payload: &self.event,
        }
    }
}

#[derive(Clone)]
pub struct RealtimeHub {
    tx: broadcast::Sender<Envelope>,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn connected(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Notifier for RealtimeHub {
    fn publish(&self, audience: Audience, event: NotificationEvent) -> Result<(), NotifyError> {
        let channel = audience.channel();
        match self.tx.send(Envelope { audience, event }) {
            Ok(receivers) => {
                tracing::debug!(channel, receivers, "Real-time event published");
                Ok(())
            }
            // No connected observers; at-most-once delivery means there is nobody to miss it.
            Err(_) => {
                tracing::trace!(channel, "No connected observers for real-time event");
                Ok(())
            }
        }
    }
}

/// What a connected socket is subscribed to.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub role: Role,
    rooms: HashSet<String>,
}

impl Session {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self {
            user_id,
            role,
            rooms: HashSet::new(),
        }
    }

    pub fn join(&mut self, room: &str) -> bool {
        self.rooms.insert(room.to_string())
    }

    pub fn leave(&mut self, room: &str) -> bool {
        self.rooms.remove(room)
    }

    pub fn reaches(&self, audience: &Audience) -> bool {
        match audience {
            Audience::Admins => self.role == Role::Admin,
            Audience::Agent(id) => self.role == Role::Agent && *id == self.user_id,
            Audience::User(id) => *id == self.user_id,
            Audience::Room(room) => self.rooms.contains(room),
            Audience::Everyone => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::EventKind;
    use uuid::Uuid;

    fn event() -> NotificationEvent {
        NotificationEvent::new(
            EventKind::TransactionCreated,
            1,
            Uuid::new_v4(),
            "New DEPOSIT transaction",
            serde_json::json!({}),
        )
    }

    #[test]
    fn publish_without_observers_is_ok() {
        let hub = RealtimeHub::default();
        assert!(hub.notify_admins(event()).is_ok());
        assert_eq!(hub.connected(), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_addressed_envelopes() {
        let hub = RealtimeHub::default();
        let mut rx = hub.subscribe();

        hub.notify_agent(7, event()).unwrap();
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.audience, Audience::Agent(7));

        let frame = serde_json::to_value(envelope.frame()).unwrap();
        assert_eq!(frame["event"], "agent_notification");
        assert_eq!(frame["payload"]["type"], "transaction_created");
        assert_eq!(frame["payload"]["transactionId"], 1);
    }

    #[test]
    fn sessions_only_see_their_audiences() {
        let mut agent = Session::new(7, Role::Agent);
        assert!(agent.reaches(&Audience::Agent(7)));
        assert!(!agent.reaches(&Audience::Agent(8)));
        assert!(!agent.reaches(&Audience::Admins));
        assert!(agent.reaches(&Audience::User(7)));
        assert!(agent.reaches(&Audience::Everyone));

        assert!(!agent.reaches(&Audience::Room("desk".into())));
        assert!(agent.join("desk"));
        assert!(agent.reaches(&Audience::Room("desk".into())));
        assert!(agent.leave("desk"));
        assert!(!agent.reaches(&Audience::Room("desk".into())));

        let admin = Session::new(1, Role::Admin);
        assert!(admin.reaches(&Audience::Admins));
        assert!(!admin.reaches(&Audience::Agent(7)));
    }
}
