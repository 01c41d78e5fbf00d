//! Transaction domain entity.
//! Framework-agnostic representation of a deposit or withdrawal request.

use super::player::PlayerIdentity;
use super::status::TxStatus;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdraw,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdraw => "WITHDRAW",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAW" => Ok(TransactionType::Withdraw),
            other => Err(format!("unknown transaction type '{other}'")),
        }
    }
}

/// Type-specific routing. The transaction type is derived from the variant, so a deposit can
/// never carry a withdrawal address and a withdrawal can never lack one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Routing {
    Deposit {
        #[serde(rename = "depositBankId")]
        deposit_bank_id: i64,
    },
    Withdraw {
        #[serde(rename = "withdrawalBankId")]
        withdrawal_bank_id: i64,
        #[serde(rename = "withdrawalAddress")]
        withdrawal_address: String,
    },
}

impl Routing {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            Routing::Deposit { .. } => TransactionType::Deposit,
            Routing::Withdraw { .. } => TransactionType::Withdraw,
        }
    }

    pub fn deposit_bank_id(&self) -> Option<i64> {
        match self {
            Routing::Deposit { deposit_bank_id } => Some(*deposit_bank_id),
            Routing::Withdraw { .. } => None,
        }
    }

    pub fn withdrawal_bank_id(&self) -> Option<i64> {
        match self {
            Routing::Withdraw {
                withdrawal_bank_id, ..
            } => Some(*withdrawal_bank_id),
            Routing::Deposit { .. } => None,
        }
    }

    pub fn withdrawal_address(&self) -> Option<&str> {
        match self {
            Routing::Withdraw {
                withdrawal_address, ..
            } => Some(withdrawal_address.as_str()),
            Routing::Deposit { .. } => None,
        }
    }

    /// Rebuilds routing from the flat column set used by the store.
    pub fn from_columns(
        tx_type: TransactionType,
        deposit_bank_id: Option<i64>,
        withdrawal_bank_id: Option<i64>,
        withdrawal_address: Option<String>,
    ) -> Option<Self> {
        match (tx_type, deposit_bank_id, withdrawal_bank_id, withdrawal_address) {
            (TransactionType::Deposit, Some(deposit_bank_id), None, None) => {
                Some(Routing::Deposit { deposit_bank_id })
            }
            (TransactionType::Withdraw, None, Some(withdrawal_bank_id), Some(withdrawal_address)) => {
                Some(Routing::Withdraw {
                    withdrawal_bank_id,
                    withdrawal_address,
                })
            }
            _ => None,
        }
    }
}

/// Betting site the player wants the funds credited on or taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteContext {
    pub betting_site_id: i64,
    pub player_site_id: String,
}

/// Domain entity representing a transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub transaction_uuid: Uuid,
    pub player_profile_id: i64,
    pub user_id: Option<i64>,
    #[serde(flatten)]
    pub routing: Routing,
    pub amount: BigDecimal,
    pub currency: String,
    pub site: Option<SiteContext>,
    pub screenshot_url: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub assigned_agent_id: Option<i64>,
    pub status: TxStatus,
    pub admin_notes: Option<String>,
    pub agent_notes: Option<String>,
    pub rating: Option<i16>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn transaction_type(&self) -> TransactionType {
        self.routing.transaction_type()
    }
}

/// Everything needed to insert a transaction; ids and record times are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub transaction_uuid: Uuid,
    pub player_profile_id: i64,
    pub user_id: Option<i64>,
    pub routing: Routing,
    pub amount: BigDecimal,
    pub currency: String,
    pub site: Option<SiteContext>,
    pub screenshot_url: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub status: StatusRef,
}

/// A status together with the store id it resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRef {
    pub id: i32,
    pub code: TxStatus,
}

/// Notes column a status write is allowed to touch. `None` keeps whatever is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotesUpdate {
    Agent(Option<String>),
    Admin(Option<String>),
}

#[derive(Debug, Clone)]
pub struct StatusChange {
    /// Status the engine read before deciding; the store refuses the write if it moved since.
    pub expected: TxStatus,
    pub target: StatusRef,
    pub notes: NotesUpdate,
    pub evidence: Option<NewEvidence>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub id: i64,
    pub player_uuid: Uuid,
    pub identity: PlayerIdentity,
    pub telegram_username: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
}

/// A transaction joined with the display fields operators need.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub transaction: Transaction,
    pub player: PlayerSummary,
    pub assigned_agent: Option<AgentSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub id: i64,
    pub transaction_id: i64,
    pub uploaded_by_user_id: i64,
    pub file_url: String,
    pub file_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEvidence {
    pub uploaded_by_user_id: i64,
    pub file_url: String,
    pub file_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub transaction_id: i64,
    pub commenter_user_id: i64,
    pub rating: Option<i16>,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub transaction_id: i64,
    pub commenter_user_id: i64,
    pub rating: Option<i16>,
    pub comment: String,
}

/// Full read model for operator detail views and deletion snapshots.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    #[serde(flatten)]
    pub record: TransactionRecord,
    pub evidence: Vec<Evidence>,
    pub comments: Vec<Comment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_columns_must_match_type() {
        assert_eq!(
            Routing::from_columns(TransactionType::Deposit, Some(1), None, None),
            Some(Routing::Deposit { deposit_bank_id: 1 })
        );
        assert_eq!(
            Routing::from_columns(TransactionType::Deposit, Some(1), None, Some("addr".into())),
            None
        );
        assert_eq!(
            Routing::from_columns(TransactionType::Withdraw, None, Some(2), None),
            None
        );
        assert!(Routing::from_columns(
            TransactionType::Withdraw,
            None,
            Some(2),
            Some("addr".into())
        )
        .is_some());
    }

    #[test]
    fn routing_serializes_with_type_tag() {
        let routing = Routing::Withdraw {
            withdrawal_bank_id: 4,
            withdrawal_address: "acct-9".into(),
        };
        let value = serde_json::to_value(&routing).unwrap();
        assert_eq!(value["type"], "WITHDRAW");
        assert_eq!(value["withdrawalBankId"], 4);
        assert_eq!(value["withdrawalAddress"], "acct-9");
    }
}
