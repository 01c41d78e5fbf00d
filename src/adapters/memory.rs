//! In-memory store backing tests and `serve --ephemeral`.
//!
//! A single lock around the whole state makes every trait call atomic, which mirrors the
//! one-database-transaction-per-mutation guarantee of the Postgres adapter.

use crate::domain::audit::{
    AuditDraft, AuditEntry, ENTITY_BETTING_SITE, ENTITY_DEPOSIT_BANK, ENTITY_PLAYER_PROFILE,
    ENTITY_TRANSACTION, ENTITY_WITHDRAWAL_BANK,
};
use crate::domain::catalog::{
    BettingSite, DepositBank, NewBettingSite, NewDepositBank, NewWithdrawalBank, WithdrawalBank,
};
use crate::domain::player::{NewPlayer, PlayerProfile, PlayerUpdate};
use crate::domain::query::{PageRequest, TransactionFilter};
use crate::domain::status::{StatusRecord, TxStatus};
use crate::domain::transaction::{
    AgentSummary, Comment, Evidence, NewComment, NewTransaction, NotesUpdate, PlayerSummary,
    StatusChange, Transaction, TransactionRecord,
};
use crate::domain::user::{NewUser, RefreshToken, User};
use crate::domain::Role;
use crate::ports::{
    CatalogStore, PlayerStore, RepositoryError, RepositoryResult, TransactionStore, UserStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    last_id: i64,
    statuses: Vec<StatusRecord>,
    transactions: BTreeMap<i64, Transaction>,
    players: BTreeMap<i64, PlayerProfile>,
    users: BTreeMap<i64, User>,
    refresh_tokens: HashMap<String, RefreshToken>,
    evidence: Vec<Evidence>,
    comments: Vec<Comment>,
    audit: Vec<AuditEntry>,
    deposit_banks: BTreeMap<i64, DepositBank>,
    withdrawal_banks: BTreeMap<i64, WithdrawalBank>,
    betting_sites: BTreeMap<i64, BettingSite>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn push_audit(&mut self, entity: &str, entity_id: i64, draft: AuditDraft) {
        let id = self.next_id();
        self.audit.push(AuditEntry {
            id,
            actor_user_id: draft.actor_user_id,
            entity: entity.to_string(),
            entity_id,
            action: draft.action.as_str().to_string(),
            old_value: draft.old_value,
            new_value: draft.new_value,
            ip_address: draft.ip_address,
            created_at: Utc::now(),
        });
    }

    fn record(&self, tx: &Transaction) -> RepositoryResult<TransactionRecord> {
        let player = self.players.get(&tx.player_profile_id).ok_or_else(|| {
            RepositoryError::Storage(format!("transaction {} has no player profile", tx.id))
        })?;
        let assigned_agent = tx
            .assigned_agent_id
            .and_then(|id| self.users.get(&id))
            .map(|user| AgentSummary {
                id: user.id,
                username: user.username.clone(),
                display_name: user.display_name.clone(),
            });

        Ok(TransactionRecord {
            transaction: tx.clone(),
            player: PlayerSummary {
                id: player.id,
                player_uuid: player.player_uuid,
                identity: player.identity.clone(),
                telegram_username: player.telegram_username.clone(),
            },
            assigned_agent,
        })
    }

    fn channel_taken(&self, key: &str, except: Option<i64>) -> bool {
        self.players
            .values()
            .any(|p| p.identity.key() == key && Some(p.id) != except)
    }

    fn login_taken(&self, user: &NewUser) -> bool {
        self.users.values().any(|existing| {
            existing.username == user.username
                || (user.email.is_some() && existing.email == user.email)
        })
    }
}

pub struct InMemoryStore {
    state: RwLock<State>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Store seeded with the status vocabulary.
    pub fn new() -> Self {
        let statuses = TxStatus::ALL
            .iter()
            .enumerate()
            .map(|(idx, code)| StatusRecord {
                id: idx as i32 + 1,
                code: *code,
                label: code.label().to_string(),
            })
            .collect();

        Self {
            state: RwLock::new(State {
                statuses,
                ..State::default()
            }),
        }
    }

    /// Drops a status from the vocabulary; used to exercise misconfigured deployments.
    pub async fn remove_status(&self, code: TxStatus) {
        self.state.write().await.statuses.retain(|s| s.code != code);
    }

    /// Every audit row in insertion order.
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.read().await.audit.clone()
    }
}

fn ensure_exists<T>(map: &BTreeMap<i64, T>, id: i64, constraint: &str) -> RepositoryResult<()> {
    if map.contains_key(&id) {
        Ok(())
    } else {
        Err(RepositoryError::ForeignKey(constraint.to_string()))
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn status_record(&self, code: TxStatus) -> RepositoryResult<Option<StatusRecord>> {
        let state = self.state.read().await;
        Ok(state.statuses.iter().find(|s| s.code == code).cloned())
    }

    async fn insert(&self, new: NewTransaction, audit: AuditDraft) -> RepositoryResult<Transaction> {
        let mut state = self.state.write().await;

        ensure_exists(
            &state.players,
            new.player_profile_id,
            "transactions_player_profile_id_fkey",
        )?;
        if let Some(bank) = new.routing.deposit_bank_id() {
            ensure_exists(&state.deposit_banks, bank, "transactions_deposit_bank_id_fkey")?;
        }
        if let Some(bank) = new.routing.withdrawal_bank_id() {
            ensure_exists(&state.withdrawal_banks, bank, "transactions_withdrawal_bank_id_fkey")?;
        }
        if let Some(site) = &new.site {
            ensure_exists(
                &state.betting_sites,
                site.betting_site_id,
                "transactions_betting_site_id_fkey",
            )?;
        }
        if state
            .transactions
            .values()
            .any(|tx| tx.transaction_uuid == new.transaction_uuid)
        {
            return Err(RepositoryError::Conflict(
                "transactions_transaction_uuid_key".to_string(),
            ));
        }

        let id = state.next_id();
        let now = Utc::now();
        let tx = Transaction {
            id,
            transaction_uuid: new.transaction_uuid,
            player_profile_id: new.player_profile_id,
            user_id: new.user_id,
            routing: new.routing,
            amount: new.amount,
            currency: new.currency,
            site: new.site,
            screenshot_url: new.screenshot_url,
            requested_at: new.requested_at,
            assigned_agent_id: None,
            status: new.status.code,
            admin_notes: None,
            agent_notes: None,
            rating: None,
            created_at: now,
            updated_at: now,
        };
        state.transactions.insert(id, tx.clone());
        state.push_audit(ENTITY_TRANSACTION, id, audit);
        Ok(tx)
    }

    async fn find(&self, id: i64) -> RepositoryResult<Option<TransactionRecord>> {
        let state = self.state.read().await;
        state
            .transactions
            .get(&id)
            .map(|tx| state.record(tx))
            .transpose()
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> RepositoryResult<Option<TransactionRecord>> {
        let state = self.state.read().await;
        state
            .transactions
            .values()
            .find(|tx| tx.transaction_uuid == uuid)
            .map(|tx| state.record(tx))
            .transpose()
    }

    async fn assign(
        &self,
        id: i64,
        agent_id: i64,
        expected: TxStatus,
        audit: AuditDraft,
    ) -> RepositoryResult<Transaction> {
        let mut state = self.state.write().await;
        ensure_exists(&state.users, agent_id, "transactions_assigned_agent_id_fkey")?;

        let tx = state
            .transactions
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {id}")))?;
        if tx.status != expected {
            return Err(RepositoryError::Stale(format!("transaction {id}")));
        }
        tx.assigned_agent_id = Some(agent_id);
        tx.updated_at = Utc::now();
        let updated = tx.clone();

        state.push_audit(ENTITY_TRANSACTION, id, audit);
        Ok(updated)
    }

    async fn update_status(
        &self,
        id: i64,
        change: StatusChange,
        audit: AuditDraft,
    ) -> RepositoryResult<Transaction> {
        let mut state = self.state.write().await;
        let evidence_id = change.evidence.as_ref().map(|_| state.next_id());

        let tx = state
            .transactions
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {id}")))?;
        if tx.status != change.expected {
            return Err(RepositoryError::Stale(format!("transaction {id}")));
        }

        let now = Utc::now();
        tx.status = change.target.code;
        match change.notes {
            NotesUpdate::Agent(Some(notes)) => tx.agent_notes = Some(notes),
            NotesUpdate::Admin(Some(notes)) => tx.admin_notes = Some(notes),
            NotesUpdate::Agent(None) | NotesUpdate::Admin(None) => {}
        }
        tx.updated_at = now;
        let updated = tx.clone();

        if let (Some(evidence), Some(evidence_id)) = (change.evidence, evidence_id) {
            state.evidence.push(Evidence {
                id: evidence_id,
                transaction_id: id,
                uploaded_by_user_id: evidence.uploaded_by_user_id,
                file_url: evidence.file_url,
                file_type: evidence.file_type,
                created_at: now,
            });
        }
        state.push_audit(ENTITY_TRANSACTION, id, audit);
        Ok(updated)
    }

    async fn delete(&self, id: i64, audit: AuditDraft) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        if !state.transactions.contains_key(&id) {
            return Err(RepositoryError::NotFound(format!("transaction {id}")));
        }

        state.evidence.retain(|e| e.transaction_id != id);
        state.comments.retain(|c| c.transaction_id != id);
        state.transactions.remove(&id);
        state.push_audit(ENTITY_TRANSACTION, id, audit);
        Ok(())
    }

    async fn list(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> RepositoryResult<(Vec<TransactionRecord>, i64)> {
        let state = self.state.read().await;
        let mut matching = state
            .transactions
            .values()
            .map(|tx| state.record(tx))
            .collect::<RepositoryResult<Vec<_>>>()?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect::<Vec<_>>();

        matching.sort_by(|a, b| {
            b.transaction
                .created_at
                .cmp(&a.transaction.created_at)
                .then(b.transaction.id.cmp(&a.transaction.id))
        });

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok((items, total))
    }

    async fn evidence(&self, transaction_id: i64) -> RepositoryResult<Vec<Evidence>> {
        let state = self.state.read().await;
        Ok(state
            .evidence
            .iter()
            .filter(|e| e.transaction_id == transaction_id)
            .cloned()
            .collect())
    }

    async fn comments(&self, transaction_id: i64) -> RepositoryResult<Vec<Comment>> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .filter(|c| c.transaction_id == transaction_id)
            .cloned()
            .collect())
    }

    async fn add_comment(
        &self,
        new: NewComment,
        set_rating: bool,
        audit: AuditDraft,
    ) -> RepositoryResult<Comment> {
        let mut state = self.state.write().await;
        ensure_exists(&state.users, new.commenter_user_id, "transaction_comments_commenter_user_id_fkey")?;
        let id = state.next_id();

        let tx = state
            .transactions
            .get_mut(&new.transaction_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", new.transaction_id)))?;
        if set_rating {
            if tx.rating.is_some() {
                return Err(RepositoryError::Conflict("transactions_rating_once".to_string()));
            }
            tx.rating = new.rating;
            tx.updated_at = Utc::now();
        }

        let comment = Comment {
            id,
            transaction_id: new.transaction_id,
            commenter_user_id: new.commenter_user_id,
            rating: new.rating,
            comment: new.comment,
            created_at: Utc::now(),
        };
        state.comments.push(comment.clone());
        state.push_audit(ENTITY_TRANSACTION, new.transaction_id, audit);
        Ok(comment)
    }

    async fn audit_trail(&self, entity: &str, entity_id: i64) -> RepositoryResult<Vec<AuditEntry>> {
        let state = self.state.read().await;
        Ok(state
            .audit
            .iter()
            .filter(|a| a.entity == entity && a.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PlayerStore for InMemoryStore {
    async fn find_player_by_id(&self, id: i64) -> RepositoryResult<Option<PlayerProfile>> {
        Ok(self.state.read().await.players.get(&id).cloned())
    }

    async fn find_player_by_uuid(&self, uuid: Uuid) -> RepositoryResult<Option<PlayerProfile>> {
        let state = self.state.read().await;
        Ok(state.players.values().find(|p| p.player_uuid == uuid).cloned())
    }

    async fn find_player_by_channel(
        &self,
        channel_id: &str,
    ) -> RepositoryResult<Option<PlayerProfile>> {
        let state = self.state.read().await;
        Ok(state
            .players
            .values()
            .find(|p| p.identity.channel_id() == Some(channel_id))
            .cloned())
    }

    async fn find_player_by_user(&self, user_id: i64) -> RepositoryResult<Option<PlayerProfile>> {
        let state = self.state.read().await;
        Ok(state
            .players
            .values()
            .find(|p| p.user_id == Some(user_id))
            .cloned())
    }

    async fn insert_player(&self, new: NewPlayer) -> RepositoryResult<PlayerProfile> {
        let mut state = self.state.write().await;
        if state.channel_taken(new.identity.key(), None) {
            return Err(RepositoryError::Conflict(
                "player_profiles_channel_id_key".to_string(),
            ));
        }

        let id = state.next_id();
        let now = Utc::now();
        let player = PlayerProfile {
            id,
            player_uuid: new.player_uuid,
            user_id: new.user_id,
            identity: new.identity,
            telegram_username: new.telegram_username,
            language_code: new.language_code,
            last_active: now,
            created_at: now,
            updated_at: now,
        };
        state.players.insert(id, player.clone());
        Ok(player)
    }

    async fn update_player(
        &self,
        id: i64,
        update: PlayerUpdate,
        audit: Option<AuditDraft>,
    ) -> RepositoryResult<PlayerProfile> {
        let mut state = self.state.write().await;
        if let Some(identity) = &update.identity {
            if state.channel_taken(identity.key(), Some(id)) {
                return Err(RepositoryError::Conflict(
                    "player_profiles_channel_id_key".to_string(),
                ));
            }
        }

        let player = state
            .players
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("player {id}")))?;
        if let Some(username) = update.telegram_username {
            player.telegram_username = Some(username);
        }
        if let Some(language) = update.language_code {
            player.language_code = language;
        }
        if let Some(identity) = update.identity {
            player.identity = identity;
        }
        let now = Utc::now();
        player.last_active = now;
        player.updated_at = now;
        let updated = player.clone();

        if let Some(audit) = audit {
            state.push_audit(ENTITY_PLAYER_PROFILE, id, audit);
        }
        Ok(updated)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_user(&self, id: i64) -> RepositoryResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> RepositoryResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| {
                u.username == login
                    || u.email.as_deref() == Some(login)
                    || u.phone.as_deref() == Some(login)
            })
            .cloned())
    }

    async fn users_with_role(&self, role: Role, active_only: bool) -> RepositoryResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| u.role == role && (!active_only || u.is_active))
            .cloned()
            .collect())
    }

    async fn insert_user(&self, new: NewUser) -> RepositoryResult<User> {
        let mut state = self.state.write().await;
        if state.login_taken(&new) {
            return Err(RepositoryError::Conflict("users_username_key".to_string()));
        }

        let id = state.next_id();
        let now = Utc::now();
        let user = User {
            id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            display_name: new.display_name,
            phone: new.phone,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {id}")))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn store_refresh_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        ensure_exists(&state.users, user_id, "refresh_tokens_user_id_fkey")?;
        state.refresh_tokens.insert(
            token_hash.to_string(),
            RefreshToken {
                user_id,
                token_hash: token_hash.to_string(),
                expires_at,
                revoked: false,
            },
        );
        Ok(())
    }

    async fn find_refresh_token(&self, token_hash: &str) -> RepositoryResult<Option<RefreshToken>> {
        Ok(self.state.read().await.refresh_tokens.get(token_hash).cloned())
    }

    async fn revoke_refresh_token(&self, token_hash: &str) -> RepositoryResult<bool> {
        let mut state = self.state.write().await;
        Ok(match state.refresh_tokens.get_mut(token_hash) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                true
            }
            _ => false,
        })
    }

    async fn revoke_user_tokens(&self, user_id: i64) -> RepositoryResult<u64> {
        let mut state = self.state.write().await;
        let mut revoked = 0;
        for token in state
            .refresh_tokens
            .values_mut()
            .filter(|t| t.user_id == user_id && !t.revoked)
        {
            token.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn deposit_banks(&self, active_only: bool) -> RepositoryResult<Vec<DepositBank>> {
        let state = self.state.read().await;
        Ok(state
            .deposit_banks
            .values()
            .filter(|b| !active_only || b.is_active)
            .cloned()
            .collect())
    }

    async fn deposit_bank(&self, id: i64) -> RepositoryResult<Option<DepositBank>> {
        Ok(self.state.read().await.deposit_banks.get(&id).cloned())
    }

    async fn save_deposit_bank(
        &self,
        id: Option<i64>,
        bank: NewDepositBank,
        audit: AuditDraft,
    ) -> RepositoryResult<DepositBank> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let (id, created_at) = match id {
            Some(id) => {
                let existing = state
                    .deposit_banks
                    .get(&id)
                    .ok_or_else(|| RepositoryError::NotFound(format!("deposit bank {id}")))?;
                (id, existing.created_at)
            }
            None => (state.next_id(), now),
        };

        let saved = DepositBank {
            id,
            bank_name: bank.bank_name,
            account_number: bank.account_number,
            account_name: bank.account_name,
            notes: bank.notes,
            is_active: bank.is_active,
            created_at,
            updated_at: now,
        };
        state.deposit_banks.insert(id, saved.clone());
        state.push_audit(ENTITY_DEPOSIT_BANK, id, audit);
        Ok(saved)
    }

    async fn delete_deposit_bank(&self, id: i64, audit: AuditDraft) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        if state
            .transactions
            .values()
            .any(|tx| tx.routing.deposit_bank_id() == Some(id))
        {
            return Err(RepositoryError::ForeignKey(
                "transactions_deposit_bank_id_fkey".to_string(),
            ));
        }
        state
            .deposit_banks
            .remove(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("deposit bank {id}")))?;
        state.push_audit(ENTITY_DEPOSIT_BANK, id, audit);
        Ok(())
    }

    async fn withdrawal_banks(&self, active_only: bool) -> RepositoryResult<Vec<WithdrawalBank>> {
        let state = self.state.read().await;
        Ok(state
            .withdrawal_banks
            .values()
            .filter(|b| !active_only || b.is_active)
            .cloned()
            .collect())
    }

    async fn withdrawal_bank(&self, id: i64) -> RepositoryResult<Option<WithdrawalBank>> {
        Ok(self.state.read().await.withdrawal_banks.get(&id).cloned())
    }

    async fn save_withdrawal_bank(
        &self,
        id: Option<i64>,
        bank: NewWithdrawalBank,
        audit: AuditDraft,
    ) -> RepositoryResult<WithdrawalBank> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let (id, created_at) = match id {
            Some(id) => {
                let existing = state
                    .withdrawal_banks
                    .get(&id)
                    .ok_or_else(|| RepositoryError::NotFound(format!("withdrawal bank {id}")))?;
                (id, existing.created_at)
            }
            None => (state.next_id(), now),
        };

        let saved = WithdrawalBank {
            id,
            bank_name: bank.bank_name,
            required_fields: bank.required_fields,
            notes: bank.notes,
            is_active: bank.is_active,
            created_at,
            updated_at: now,
        };
        state.withdrawal_banks.insert(id, saved.clone());
        state.push_audit(ENTITY_WITHDRAWAL_BANK, id, audit);
        Ok(saved)
    }

    async fn delete_withdrawal_bank(&self, id: i64, audit: AuditDraft) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        if state
            .transactions
            .values()
            .any(|tx| tx.routing.withdrawal_bank_id() == Some(id))
        {
            return Err(RepositoryError::ForeignKey(
                "transactions_withdrawal_bank_id_fkey".to_string(),
            ));
        }
        state
            .withdrawal_banks
            .remove(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("withdrawal bank {id}")))?;
        state.push_audit(ENTITY_WITHDRAWAL_BANK, id, audit);
        Ok(())
    }

    async fn betting_sites(&self, active_only: bool) -> RepositoryResult<Vec<BettingSite>> {
        let state = self.state.read().await;
        Ok(state
            .betting_sites
            .values()
            .filter(|s| !active_only || s.is_active)
            .cloned()
            .collect())
    }

    async fn betting_site(&self, id: i64) -> RepositoryResult<Option<BettingSite>> {
        Ok(self.state.read().await.betting_sites.get(&id).cloned())
    }

    async fn save_betting_site(
        &self,
        id: Option<i64>,
        site: NewBettingSite,
        audit: AuditDraft,
    ) -> RepositoryResult<BettingSite> {
        let mut state = self.state.write().await;
        if state
            .betting_sites
            .values()
            .any(|existing| existing.name == site.name && Some(existing.id) != id)
        {
            return Err(RepositoryError::Conflict("betting_sites_name_key".to_string()));
        }

        let now = Utc::now();
        let (id, created_at) = match id {
            Some(id) => {
                let existing = state
                    .betting_sites
                    .get(&id)
                    .ok_or_else(|| RepositoryError::NotFound(format!("betting site {id}")))?;
                (id, existing.created_at)
            }
            None => (state.next_id(), now),
        };

        let saved = BettingSite {
            id,
            name: site.name,
            description: site.description,
            website: site.website,
            is_active: site.is_active,
            created_at,
            updated_at: now,
        };
        state.betting_sites.insert(id, saved.clone());
        state.push_audit(ENTITY_BETTING_SITE, id, audit);
        Ok(saved)
    }

    async fn delete_betting_site(&self, id: i64, audit: AuditDraft) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        if state
            .transactions
            .values()
            .any(|tx| tx.site.as_ref().map(|s| s.betting_site_id) == Some(id))
        {
            return Err(RepositoryError::ForeignKey(
                "transactions_betting_site_id_fkey".to_string(),
            ));
        }
        state
            .betting_sites
            .remove(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("betting site {id}")))?;
        state.push_audit(ENTITY_BETTING_SITE, id, audit);
        Ok(())
    }
}
