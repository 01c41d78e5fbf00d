//! Real-time notification events and their audiences.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Audience {
    Admins,
    Agent(i64),
    User(i64),
    Room(String),
    Everyone,
}

impl Audience {
    /// Event name a connected client sees for this audience.
    pub fn channel(&self) -> &'static str {
        match self {
            Audience::Admins => "admin_notification",
            Audience::Agent(_) => "agent_notification",
            Audience::User(_) => "user_notification",
            Audience::Room(_) => "room_notification",
            Audience::Everyone => "broadcast",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TransactionCreated,
    TransactionAssigned,
    TransactionProcessed,
    TransactionUpdated,
    TransactionReopened,
    TransactionCommented,
    TransactionDeleted,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub transaction_id: i64,
    pub transaction_uuid: Uuid,
    pub message: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(
        kind: EventKind,
        transaction_id: i64,
        transaction_uuid: Uuid,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            kind,
            transaction_id,
            transaction_uuid,
            message: message.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}
