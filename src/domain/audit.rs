//! Audit trail entries. Rows are append-only; nothing in the crate updates or deletes them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

pub const ENTITY_TRANSACTION: &str = "Transaction";
pub const ENTITY_DEPOSIT_BANK: &str = "DepositBank";
pub const ENTITY_WITHDRAWAL_BANK: &str = "WithdrawalBank";
pub const ENTITY_BETTING_SITE: &str = "BettingSite";
pub const ENTITY_PLAYER_PROFILE: &str = "PlayerProfile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Created,
    Updated,
    Assigned,
    Processed,
    StatusUpdated,
    Reopened,
    Commented,
    Reconciled,
    Deleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "CREATED",
            AuditAction::Updated => "UPDATED",
            AuditAction::Assigned => "ASSIGNED",
            AuditAction::Processed => "PROCESSED",
            AuditAction::StatusUpdated => "STATUS_UPDATED",
            AuditAction::Reopened => "REOPENED",
            AuditAction::Commented => "COMMENTED",
            AuditAction::Reconciled => "RECONCILED",
            AuditAction::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An audit row before the store has attached it to an entity id.
///
/// Store mutations take a draft and persist it in the same unit of work as the change itself,
/// so the trail can never disagree with the data.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub actor_user_id: Option<i64>,
    pub action: AuditAction,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub ip_address: Option<String>,
}

impl AuditDraft {
    pub fn new(action: AuditAction, actor_user_id: Option<i64>, ip_address: Option<String>) -> Self {
        Self {
            actor_user_id,
            action,
            old_value: None,
            new_value: None,
            ip_address,
        }
    }

    pub fn old(mut self, value: Value) -> Self {
        self.old_value = Some(value);
        self
    }

    pub fn new_value(mut self, value: Value) -> Self {
        self.new_value = Some(value);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: i64,
    pub actor_user_id: Option<i64>,
    pub entity: String,
    pub entity_id: i64,
    pub action: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}
