//! JSON projections returned by the HTTP layer.
//!
//! Callers outside the staff roles only ever see [`PublicTransactionView`] and [`PlayerView`],
//! which carry external UUIDs and no internal numeric ids.

use crate::domain::player::PlayerProfile;
use crate::domain::transaction::{
    AgentSummary, Comment, Evidence, PlayerSummary, Routing, TransactionDetails,
    TransactionRecord, TransactionType,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTransactionView {
    pub transaction_uuid: Uuid,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub amount: String,
    pub currency: String,
    pub status: &'static str,
    pub status_code: &'static str,
    pub player_uuid: Uuid,
    pub screenshot_url: Option<String>,
    pub rating: Option<i16>,
    pub requested_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&TransactionRecord> for PublicTransactionView {
    fn from(record: &TransactionRecord) -> Self {
        let tx = &record.transaction;
        Self {
            transaction_uuid: tx.transaction_uuid,
            tx_type: tx.transaction_type(),
            amount: tx.amount.to_string(),
            currency: tx.currency.clone(),
            status: tx.status.label(),
            status_code: tx.status.code(),
            player_uuid: record.player.player_uuid,
            screenshot_url: tx.screenshot_url.clone(),
            rating: tx.rating,
            requested_at: tx.requested_at,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

/// Staff projection with internal ids, routing and notes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: i64,
    pub transaction_uuid: Uuid,
    #[serde(flatten)]
    pub routing: Routing,
    pub amount: String,
    pub currency: String,
    pub status: &'static str,
    pub status_code: &'static str,
    pub betting_site_id: Option<i64>,
    pub player_site_id: Option<String>,
    pub screenshot_url: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub player: PlayerSummary,
    pub user_id: Option<i64>,
    pub assigned_agent_id: Option<i64>,
    pub assigned_agent: Option<AgentSummary>,
    pub admin_notes: Option<String>,
    pub agent_notes: Option<String>,
    pub rating: Option<i16>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TransactionRecord> for TransactionView {
    fn from(record: TransactionRecord) -> Self {
        let tx = record.transaction;
        let (betting_site_id, player_site_id) = match tx.site {
            Some(site) => (Some(site.betting_site_id), Some(site.player_site_id)),
            None => (None, None),
        };
        Self {
            id: tx.id,
            transaction_uuid: tx.transaction_uuid,
            routing: tx.routing,
            amount: tx.amount.to_string(),
            currency: tx.currency,
            status: tx.status.label(),
            status_code: tx.status.code(),
            betting_site_id,
            player_site_id,
            screenshot_url: tx.screenshot_url,
            requested_at: tx.requested_at,
            player: record.player,
            user_id: tx.user_id,
            assigned_agent_id: tx.assigned_agent_id,
            assigned_agent: record.assigned_agent,
            admin_notes: tx.admin_notes,
            agent_notes: tx.agent_notes,
            rating: tx.rating,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetailsView {
    #[serde(flatten)]
    pub transaction: TransactionView,
    pub evidence: Vec<Evidence>,
    pub comments: Vec<Comment>,
}

impl From<TransactionDetails> for TransactionDetailsView {
    fn from(details: TransactionDetails) -> Self {
        Self {
            transaction: details.record.into(),
            evidence: details.evidence,
            comments: details.comments,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub player_uuid: Uuid,
    /// Present once the profile is linked to a durable channel identity.
    pub telegram_id: Option<String>,
    pub linked: bool,
    pub telegram_username: Option<String>,
    pub language_code: String,
    pub last_active: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<PlayerProfile> for PlayerView {
    fn from(profile: PlayerProfile) -> Self {
        Self {
            player_uuid: profile.player_uuid,
            telegram_id: profile.identity.channel_id().map(str::to_string),
            linked: !profile.identity.is_placeholder(),
            telegram_username: profile.telegram_username,
            language_code: profile.language_code,
            last_active: profile.last_active,
            created_at: profile.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::player::PlayerIdentity;
    use crate::domain::transaction::Transaction;
    use crate::domain::TxStatus;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn record() -> TransactionRecord {
        let now = Utc::now();
        TransactionRecord {
            transaction: Transaction {
                id: 42,
                transaction_uuid: Uuid::new_v4(),
                player_profile_id: 7,
                user_id: None,
                routing: Routing::Deposit { deposit_bank_id: 1 },
                amount: BigDecimal::from_str("100.00").unwrap(),
                currency: "USD".into(),
                site: None,
                screenshot_url: None,
                requested_at: now,
                assigned_agent_id: Some(3),
                status: TxStatus::Pending,
                admin_notes: Some("check the slip".into()),
                agent_notes: None,
                rating: None,
                created_at: now,
                updated_at: now,
            },
            player: PlayerSummary {
                id: 7,
                player_uuid: Uuid::new_v4(),
                identity: PlayerIdentity::placeholder(),
                telegram_username: None,
            },
            assigned_agent: None,
        }
    }

    #[test]
    fn public_view_hides_internal_ids_and_notes() {
        let value = serde_json::to_value(PublicTransactionView::from(&record())).unwrap();
        assert_eq!(value["status"], "Pending");
        assert_eq!(value["type"], "DEPOSIT");
        assert_eq!(value["amount"], "100.00");
        assert!(value.get("id").is_none());
        assert!(value.get("assignedAgentId").is_none());
        assert!(value.get("adminNotes").is_none());
    }

    #[test]
    fn staff_view_flattens_routing() {
        let value = serde_json::to_value(TransactionView::from(record())).unwrap();
        assert_eq!(value["id"], 42);
        assert_eq!(value["type"], "DEPOSIT");
        assert_eq!(value["depositBankId"], 1);
        assert_eq!(value["statusCode"], "PENDING");
        assert_eq!(value["adminNotes"], "check the slip");
    }
}
