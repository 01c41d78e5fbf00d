//! Best-effort side effects that follow a committed lifecycle mutation.
//!
//! Nothing here returns an error: a failed push or message is logged at `warn` and the caller
//! carries on, because the state change it reports is already durable.

use crate::domain::events::{EventKind, NotificationEvent};
use crate::domain::status::TxStatus;
use crate::domain::transaction::{Comment, TransactionRecord};
use crate::ports::{MessageDetails, MessagePhase, Messenger, Notifier, NotifyError};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct Fanout {
    notifier: Arc<dyn Notifier>,
    messenger: Arc<dyn Messenger>,
}

fn summary(record: &TransactionRecord) -> Value {
    let tx = &record.transaction;
    json!({
        "type": tx.transaction_type(),
        "amount": tx.amount.to_string(),
        "currency": tx.currency,
        "status": tx.status,
        "playerUuid": record.player.player_uuid,
        "telegramUsername": record.player.telegram_username,
        "assignedAgentId": tx.assigned_agent_id,
    })
}

fn event(kind: EventKind, record: &TransactionRecord, message: String) -> NotificationEvent {
    NotificationEvent::new(
        kind,
        record.transaction.id,
        record.transaction.transaction_uuid,
        message,
        summary(record),
    )
}

fn log_push(result: Result<(), NotifyError>, record: &TransactionRecord, target: &str) {
    if let Err(e) = result {
        tracing::warn!(
            transaction_id = record.transaction.id,
            target,
            error = %e,
            "Real-time notification failed"
        );
    }
}

impl Fanout {
    pub fn new(notifier: Arc<dyn Notifier>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            notifier,
            messenger,
        }
    }

    pub fn messaging_configured(&self) -> bool {
        self.messenger.is_configured()
    }

    async fn message_player(
        &self,
        record: &TransactionRecord,
        phase: MessagePhase,
        notes: Option<&str>,
    ) {
        let Some(channel_id) = record.player.identity.channel_id() else {
            tracing::debug!(
                transaction_id = record.transaction.id,
                "Player has a placeholder identity, not messaging"
            );
            return;
        };

        let tx = &record.transaction;
        let details = MessageDetails {
            tx_type: Some(tx.transaction_type()),
            amount: Some(tx.amount.to_string()),
            currency: Some(tx.currency.clone()),
            status_label: Some(tx.status.label().to_string()),
            notes: notes.map(str::to_string),
        };

        let sent = self
            .messenger
            .send_transaction_notification(channel_id, tx.transaction_uuid, phase, &details)
            .await;
        if !sent {
            tracing::warn!(
                transaction_id = tx.id,
                ?phase,
                "Player message was not delivered"
            );
        }
    }

    pub async fn created(&self, record: &TransactionRecord) {
        let tx = &record.transaction;
        let message = format!(
            "New {} request of {} {}",
            tx.transaction_type(),
            tx.amount,
            tx.currency
        );
        log_push(
            self.notifier
                .notify_admins(event(EventKind::TransactionCreated, record, message)),
            record,
            "admins",
        );
        self.message_player(record, MessagePhase::Created, None).await;
    }

    pub async fn assigned(&self, record: &TransactionRecord) {
        let Some(agent_id) = record.transaction.assigned_agent_id else {
            return;
        };
        let tx = &record.transaction;
        let message = format!(
            "{} of {} {} assigned to you",
            tx.transaction_type(),
            tx.amount,
            tx.currency
        );
        log_push(
            self.notifier
                .notify_agent(agent_id, event(EventKind::TransactionAssigned, record, message)),
            record,
            "agent",
        );
    }

    pub async fn processed(&self, record: &TransactionRecord) {
        let tx = &record.transaction;
        self.message_player(record, MessagePhase::Processed, tx.agent_notes.as_deref())
            .await;

        let message = format!("Transaction processed: {}", tx.status.label());
        log_push(
            self.notifier
                .notify_admins(event(EventKind::TransactionProcessed, record, message)),
            record,
            "admins",
        );
    }

    /// Admin status override. The player is only messaged for SUCCESS and FAILED.
    pub async fn overridden(&self, record: &TransactionRecord) {
        let tx = &record.transaction;
        if matches!(tx.status, TxStatus::Success | TxStatus::Failed) {
            self.message_player(record, MessagePhase::Processed, tx.admin_notes.as_deref())
                .await;
        }

        let message = format!("Status changed to {}", tx.status.label());
        log_push(
            self.notifier.notify_admins(event(
                EventKind::TransactionUpdated,
                record,
                message.clone(),
            )),
            record,
            "admins",
        );
        if let Some(agent_id) = tx.assigned_agent_id {
            log_push(
                self.notifier
                    .notify_agent(agent_id, event(EventKind::TransactionUpdated, record, message)),
                record,
                "agent",
            );
        }
    }

    pub async fn reopened(&self, record: &TransactionRecord) {
        let tx = &record.transaction;
        let message = format!("Transaction reopened as {}", tx.status.label());
        log_push(
            self.notifier.notify_admins(event(
                EventKind::TransactionReopened,
                record,
                message.clone(),
            )),
            record,
            "admins",
        );
        if let Some(agent_id) = tx.assigned_agent_id {
            log_push(
                self.notifier
                    .notify_agent(agent_id, event(EventKind::TransactionReopened, record, message)),
                record,
                "agent",
            );
        }
        self.message_player(record, MessagePhase::Updated, tx.admin_notes.as_deref())
            .await;
    }

    pub async fn commented(&self, record: &TransactionRecord, comment: &Comment) {
        let tx = &record.transaction;
        let mut ev = event(
            EventKind::TransactionCommented,
            record,
            "New comment on transaction".to_string(),
        );
        ev.data["commentId"] = json!(comment.id);
        ev.data["rating"] = json!(comment.rating);

        if let Some(agent_id) = tx.assigned_agent_id.filter(|id| *id != comment.commenter_user_id) {
            log_push(
                self.notifier.notify_agent(agent_id, ev.clone()),
                record,
                "agent",
            );
        }
        log_push(self.notifier.notify_admins(ev), record, "admins");
    }

    pub async fn deleted(&self, record: &TransactionRecord) {
        let message = format!("Transaction {} deleted", record.transaction.transaction_uuid);
        log_push(
            self.notifier
                .broadcast(event(EventKind::TransactionDeleted, record, message)),
            record,
            "everyone",
        );
    }
}
