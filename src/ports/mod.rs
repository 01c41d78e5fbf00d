//! Boundaries the engine and services depend on.
//!
//! Stores are implemented by `adapters::postgres` and `adapters::memory`; collaborators by the
//! real-time hub, the Telegram client and the local uploader in `services`.

use crate::domain::audit::{AuditDraft, AuditEntry};
use crate::domain::catalog::{
    BettingSite, DepositBank, NewBettingSite, NewDepositBank, NewWithdrawalBank, WithdrawalBank,
};
use crate::domain::events::{Audience, NotificationEvent};
use crate::domain::player::{NewPlayer, PlayerProfile, PlayerUpdate};
use crate::domain::query::{PageRequest, TransactionFilter};
use crate::domain::status::{StatusRecord, TxStatus};
use crate::domain::transaction::{
    Comment, Evidence, NewComment, NewTransaction, StatusChange, Transaction, TransactionRecord,
    TransactionType,
};
use crate::domain::user::{NewUser, RefreshToken, User};
use crate::domain::Role;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// A row could not be removed or written because another row references it.
    #[error("foreign key violated: {0}")]
    ForeignKey(String),

    /// The row changed between read and write.
    #[error("concurrent update: {0}")]
    Stale(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row".to_string()),
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                match db_err.code().as_deref() {
                    Some("23505") => RepositoryError::Conflict(constraint),
                    Some("23503") => RepositoryError::ForeignKey(constraint),
                    _ => RepositoryError::Storage(err.to_string()),
                }
            }
            _ => RepositoryError::Storage(err.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn status_record(&self, code: TxStatus) -> RepositoryResult<Option<StatusRecord>>;

    async fn insert(&self, tx: NewTransaction, audit: AuditDraft) -> RepositoryResult<Transaction>;

    async fn find(&self, id: i64) -> RepositoryResult<Option<TransactionRecord>>;

    async fn find_by_uuid(&self, uuid: Uuid) -> RepositoryResult<Option<TransactionRecord>>;

    /// Compare-and-set on `expected`, like `update_status`.
    async fn assign(
        &self,
        id: i64,
        agent_id: i64,
        expected: TxStatus,
        audit: AuditDraft,
    ) -> RepositoryResult<Transaction>;

    /// Compare-and-set on `change.expected`; returns `Stale` when the status moved underneath.
    async fn update_status(
        &self,
        id: i64,
        change: StatusChange,
        audit: AuditDraft,
    ) -> RepositoryResult<Transaction>;

    /// Removes evidence and comments, then the transaction, then records the audit row.
    async fn delete(&self, id: i64, audit: AuditDraft) -> RepositoryResult<()>;

    async fn list(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> RepositoryResult<(Vec<TransactionRecord>, i64)>;

    async fn evidence(&self, transaction_id: i64) -> RepositoryResult<Vec<Evidence>>;

    async fn comments(&self, transaction_id: i64) -> RepositoryResult<Vec<Comment>>;

    /// Inserts the comment; when `set_rating` is true the transaction rating is set as well,
    /// provided it has none yet.
    async fn add_comment(
        &self,
        comment: NewComment,
        set_rating: bool,
        audit: AuditDraft,
    ) -> RepositoryResult<Comment>;

    async fn audit_trail(&self, entity: &str, entity_id: i64) -> RepositoryResult<Vec<AuditEntry>>;
}

#[async_trait]
pub trait PlayerStore: Send + Sync {
    async fn find_player_by_id(&self, id: i64) -> RepositoryResult<Option<PlayerProfile>>;

    async fn find_player_by_uuid(&self, uuid: Uuid) -> RepositoryResult<Option<PlayerProfile>>;

    async fn find_player_by_channel(&self, channel_id: &str)
        -> RepositoryResult<Option<PlayerProfile>>;

    async fn find_player_by_user(&self, user_id: i64) -> RepositoryResult<Option<PlayerProfile>>;

    async fn insert_player(&self, player: NewPlayer) -> RepositoryResult<PlayerProfile>;

    /// Applies the set fields and touches `last_active`.
    async fn update_player(
        &self,
        id: i64,
        update: PlayerUpdate,
        audit: Option<AuditDraft>,
    ) -> RepositoryResult<PlayerProfile>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: i64) -> RepositoryResult<Option<User>>;

    /// Matches username, email or phone.
    async fn find_user_by_login(&self, login: &str) -> RepositoryResult<Option<User>>;

    async fn users_with_role(&self, role: Role, active_only: bool) -> RepositoryResult<Vec<User>>;

    async fn insert_user(&self, user: NewUser) -> RepositoryResult<User>;

    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()>;

    async fn store_refresh_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    async fn find_refresh_token(&self, token_hash: &str) -> RepositoryResult<Option<RefreshToken>>;

    /// Returns whether a live token was revoked.
    async fn revoke_refresh_token(&self, token_hash: &str) -> RepositoryResult<bool>;

    async fn revoke_user_tokens(&self, user_id: i64) -> RepositoryResult<u64>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn deposit_banks(&self, active_only: bool) -> RepositoryResult<Vec<DepositBank>>;
    async fn deposit_bank(&self, id: i64) -> RepositoryResult<Option<DepositBank>>;
    /// Inserts when `id` is `None`, otherwise replaces the row.
    async fn save_deposit_bank(
        &self,
        id: Option<i64>,
        bank: NewDepositBank,
        audit: AuditDraft,
    ) -> RepositoryResult<DepositBank>;
    async fn delete_deposit_bank(&self, id: i64, audit: AuditDraft) -> RepositoryResult<()>;

    async fn withdrawal_banks(&self, active_only: bool) -> RepositoryResult<Vec<WithdrawalBank>>;
    async fn withdrawal_bank(&self, id: i64) -> RepositoryResult<Option<WithdrawalBank>>;
    async fn save_withdrawal_bank(
        &self,
        id: Option<i64>,
        bank: NewWithdrawalBank,
        audit: AuditDraft,
    ) -> RepositoryResult<WithdrawalBank>;
    async fn delete_withdrawal_bank(&self, id: i64, audit: AuditDraft) -> RepositoryResult<()>;

    async fn betting_sites(&self, active_only: bool) -> RepositoryResult<Vec<BettingSite>>;
    async fn betting_site(&self, id: i64) -> RepositoryResult<Option<BettingSite>>;
    async fn save_betting_site(
        &self,
        id: Option<i64>,
        site: NewBettingSite,
        audit: AuditDraft,
    ) -> RepositoryResult<BettingSite>;
    async fn delete_betting_site(&self, id: i64, audit: AuditDraft) -> RepositoryResult<()>;
}

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub original_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub url: String,
    pub stored_name: String,
    pub size: usize,
    pub mime_type: String,
    pub original_name: String,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file type '{0}' is not allowed; only PNG and JPEG images are accepted")]
    DisallowedType(String),

    #[error("file is {size} bytes; the limit is {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("file is empty")]
    Empty,

    #[error("upload storage failed: {0}")]
    Storage(String),
}

#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, file: UploadFile) -> Result<StoredFile, UploadError>;

    /// Best-effort removal of a previously stored file.
    async fn remove(&self, stored_name: &str) -> bool;
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification hub unavailable: {0}")]
    Unavailable(String),
}

/// Fire-and-forget real-time delivery. `Ok` means the event was handed to the transport, not
/// that anybody received it.
pub trait Notifier: Send + Sync {
    fn publish(&self, audience: Audience, event: NotificationEvent) -> Result<(), NotifyError>;

    fn notify_admins(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        self.publish(Audience::Admins, event)
    }

    fn notify_agent(&self, agent_id: i64, event: NotificationEvent) -> Result<(), NotifyError> {
        self.publish(Audience::Agent(agent_id), event)
    }

    fn notify_user(&self, user_id: i64, event: NotificationEvent) -> Result<(), NotifyError> {
        self.publish(Audience::User(user_id), event)
    }

    fn notify_room(&self, room: &str, event: NotificationEvent) -> Result<(), NotifyError> {
        self.publish(Audience::Room(room.to_string()), event)
    }

    fn broadcast(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        self.publish(Audience::Everyone, event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePhase {
    Created,
    Processed,
    Updated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageDetails {
    pub tx_type: Option<TransactionType>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub status_label: Option<String>,
    pub notes: Option<String>,
}

#[async_trait]
pub trait Messenger: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Returns `false` on any failure; callers must never treat that as fatal.
    async fn send_transaction_notification(
        &self,
        recipient_channel_id: &str,
        transaction_uuid: Uuid,
        phase: MessagePhase,
        details: &MessageDetails,
    ) -> bool;
}

/// The store handles the rest of the crate is wired with.
#[derive(Clone)]
pub struct Stores {
    pub transactions: std::sync::Arc<dyn TransactionStore>,
    pub players: std::sync::Arc<dyn PlayerStore>,
    pub users: std::sync::Arc<dyn UserStore>,
    pub catalog: std::sync::Arc<dyn CatalogStore>,
}

impl Stores {
    /// Wires every port to one backend implementing all of them.
    pub fn from_backend<S>(backend: std::sync::Arc<S>) -> Self
    where
        S: TransactionStore + PlayerStore + UserStore + CatalogStore + 'static,
    {
        Self {
            transactions: backend.clone(),
            players: backend.clone(),
            users: backend.clone(),
            catalog: backend,
        }
    }
}
