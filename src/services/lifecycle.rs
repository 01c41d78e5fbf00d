//! The transaction lifecycle engine.
//!
//! Every operation follows the same order: validate input, load, authorize, check the
//! transition, write the change together with its audit row, then fan out. Nothing after the
//! write can undo it.

use crate::domain::actor::{RequestContext, Role};
use crate::domain::audit::{AuditAction, AuditDraft, AuditEntry, ENTITY_TRANSACTION};
use crate::domain::lifecycle::{check_reopen, check_transition, Lane, TransitionError};
use crate::domain::query::{Page, PageRequest, Pagination, TransactionFilter};
use crate::domain::status::TxStatus;
use crate::domain::transaction::{
    Comment, NewComment, NewEvidence, NewTransaction, NotesUpdate, Routing, SiteContext,
    StatusChange, StatusRef, TransactionDetails, TransactionRecord,
};
use crate::domain::user::User;
use crate::error::AppError;
use crate::ports::{
    CatalogStore, RepositoryError, Stores, TransactionStore, UploadFile, Uploader, UserStore,
};
use crate::services::access::{
    require_actor, require_admin, require_assigned_agent, require_comment_access, require_role,
    require_view,
};
use crate::services::fanout::Fanout;
use crate::services::players::PlayerService;
use crate::validation::transaction::{AddComment, CreateTransaction, OverrideStatus, ProcessTransaction};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

const EVIDENCE_FILE_TYPE: &str = "image";

#[derive(Clone)]
pub struct TransactionLifecycle {
    transactions: Arc<dyn TransactionStore>,
    users: Arc<dyn UserStore>,
    catalog: Arc<dyn CatalogStore>,
    players: PlayerService,
    uploader: Arc<dyn Uploader>,
    fanout: Fanout,
}

fn draft(action: AuditAction, ctx: &RequestContext) -> AuditDraft {
    AuditDraft::new(action, ctx.user_id(), ctx.ip_address.clone())
}

impl TransactionLifecycle {
    pub fn new(stores: &Stores, uploader: Arc<dyn Uploader>, fanout: Fanout) -> Self {
        Self {
            transactions: stores.transactions.clone(),
            users: stores.users.clone(),
            catalog: stores.catalog.clone(),
            players: PlayerService::new(stores.players.clone()),
            uploader,
            fanout,
        }
    }

    /// Store id for a status code. A missing vocabulary row is a deployment fault, not bad input.
    async fn status_ref(&self, code: TxStatus) -> Result<StatusRef, AppError> {
        self.transactions
            .status_record(code)
            .await?
            .map(|record| StatusRef {
                id: record.id,
                code: record.code,
            })
            .ok_or_else(|| AppError::Internal(format!("transaction status {code} is not configured")))
    }

    async fn load(&self, id: i64) -> Result<TransactionRecord, AppError> {
        self.transactions
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction".to_string()))
    }

    async fn reload(&self, id: i64) -> Result<TransactionRecord, AppError> {
        self.transactions
            .find(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("transaction {id} vanished after write")))
    }

    /// Referenced banks and sites must exist and be accepting requests.
    async fn check_references(
        &self,
        routing: &Routing,
        site: Option<&SiteContext>,
    ) -> Result<(), AppError> {
        match routing {
            Routing::Deposit { deposit_bank_id } => {
                let bank = self
                    .catalog
                    .deposit_bank(*deposit_bank_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Deposit bank".to_string()))?;
                if !bank.is_active {
                    return Err(AppError::validation("depositBankId", "deposit bank is not active"));
                }
            }
            Routing::Withdraw {
                withdrawal_bank_id, ..
            } => {
                let bank = self
                    .catalog
                    .withdrawal_bank(*withdrawal_bank_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Withdrawal bank".to_string()))?;
                if !bank.is_active {
                    return Err(AppError::validation(
                        "withdrawalBankId",
                        "withdrawal bank is not active",
                    ));
                }
            }
        }

        if let Some(site) = site {
            let betting_site = self
                .catalog
                .betting_site(site.betting_site_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Betting site".to_string()))?;
            if !betting_site.is_active {
                return Err(AppError::validation("bettingSiteId", "betting site is not active"));
            }
        }
        Ok(())
    }

    pub async fn create(
        &self,
        input: CreateTransaction,
        screenshot: Option<UploadFile>,
        ctx: &RequestContext,
    ) -> Result<TransactionRecord, AppError> {
        let pending = self.status_ref(TxStatus::Pending).await?;
        self.check_references(&input.routing, input.site.as_ref()).await?;
        let player = self.players.resolve_for_transaction(&input.player, ctx).await?;

        let stored = match screenshot {
            Some(file) => Some(self.uploader.upload(file).await?),
            None => None,
        };

        let new = NewTransaction {
            transaction_uuid: Uuid::new_v4(),
            player_profile_id: player.id,
            user_id: ctx.user_id(),
            routing: input.routing,
            amount: input.amount,
            currency: input.currency,
            site: input.site,
            screenshot_url: stored.as_ref().map(|s| s.url.clone()),
            requested_at: Utc::now(),
            status: pending,
        };
        let audit = draft(AuditAction::Created, ctx).new_value(json!({
            "transactionUuid": new.transaction_uuid,
            "type": new.routing.transaction_type(),
            "amount": new.amount.to_string(),
            "currency": new.currency,
            "playerProfileId": new.player_profile_id,
            "screenshotUrl": new.screenshot_url,
        }));

        let tx = match self.transactions.insert(new, audit).await {
            Ok(tx) => tx,
            Err(err) => {
                if let Some(stored) = &stored {
                    if !self.uploader.remove(&stored.stored_name).await {
                        tracing::warn!(stored_name = %stored.stored_name, "Orphaned upload left behind");
                    }
                }
                return Err(err.into());
            }
        };

        let record = self.reload(tx.id).await?;
        tracing::info!(
            transaction_id = tx.id,
            transaction_uuid = %tx.transaction_uuid,
            actor_id = ?ctx.user_id(),
            status = %tx.status,
            tx_type = %tx.transaction_type(),
            "Transaction created"
        );

        self.fanout.created(&record).await;
        Ok(record)
    }

    /// Public lookup by external handle.
    pub async fn get_by_uuid(
        &self,
        uuid: Uuid,
        player_uuid: Option<Uuid>,
        ctx: &RequestContext,
    ) -> Result<TransactionRecord, AppError> {
        let record = self
            .transactions
            .find_by_uuid(uuid)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction".to_string()))?;
        require_view(ctx, &record, player_uuid)?;
        Ok(record)
    }

    /// Operator detail view with evidence and comments.
    pub async fn details(&self, id: i64, ctx: &RequestContext) -> Result<TransactionDetails, AppError> {
        let actor = require_role(ctx, &[Role::Admin, Role::Agent])?;
        let record = self.load(id).await?;
        if actor.role == Role::Agent && record.transaction.assigned_agent_id != Some(actor.user_id) {
            return Err(AppError::Forbidden(
                "transaction is not assigned to you".to_string(),
            ));
        }
        self.expand(record).await
    }

    async fn expand(&self, record: TransactionRecord) -> Result<TransactionDetails, AppError> {
        let id = record.transaction.id;
        Ok(TransactionDetails {
            evidence: self.transactions.evidence(id).await?,
            comments: self.transactions.comments(id).await?,
            record,
        })
    }

    pub async fn assign(
        &self,
        id: i64,
        agent_id: i64,
        ctx: &RequestContext,
    ) -> Result<TransactionRecord, AppError> {
        require_admin(ctx)?;
        let record = self.load(id).await?;

        let current = record.transaction.status;
        if current.is_terminal() {
            return Err(TransitionError::Terminal { from: current }.into());
        }

        let agent = self
            .users
            .find_user(agent_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;
        if agent.role != Role::Agent || !agent.is_active {
            return Err(AppError::validation("agentId", "Invalid agent"));
        }

        let previous = record.transaction.assigned_agent_id;
        let audit = draft(AuditAction::Assigned, ctx)
            .old(json!({ "assignedAgentId": previous }))
            .new_value(json!({ "assignedAgentId": agent.id }));
        self.transactions.assign(id, agent.id, current, audit).await?;

        let record = self.reload(id).await?;
        tracing::info!(
            transaction_id = id,
            actor_id = ?ctx.user_id(),
            agent_id = agent.id,
            previous_agent_id = ?previous,
            status = %record.transaction.status,
            "Transaction assigned"
        );

        self.fanout.assigned(&record).await;
        Ok(record)
    }

    /// Agent lane: only the assigned agent, only forward transitions.
    pub async fn process(
        &self,
        id: i64,
        input: ProcessTransaction,
        ctx: &RequestContext,
    ) -> Result<TransactionRecord, AppError> {
        let record = self.load(id).await?;
        let actor = require_assigned_agent(ctx, &record)?;

        let current = record.transaction.status;
        check_transition(current, input.status, Lane::Agent)?;
        let target = self.status_ref(input.status).await?;

        // Omitted notes keep the stored ones, so the audit records what the row will hold.
        let previous_notes = record.transaction.agent_notes.clone();
        let effective_notes = input.agent_notes.clone().or_else(|| previous_notes.clone());
        let audit = draft(AuditAction::Processed, ctx)
            .old(json!({
                "status": current,
                "agentNotes": previous_notes,
            }))
            .new_value(json!({
                "status": target.code,
                "agentNotes": effective_notes,
                "evidenceUrl": input.evidence_url,
            }));
        let change = StatusChange {
            expected: current,
            target,
            notes: NotesUpdate::Agent(input.agent_notes),
            evidence: input.evidence_url.map(|file_url| NewEvidence {
                uploaded_by_user_id: actor.user_id,
                file_url,
                file_type: EVIDENCE_FILE_TYPE.to_string(),
            }),
        };
        self.transactions.update_status(id, change, audit).await?;

        let record = self.reload(id).await?;
        tracing::info!(
            transaction_id = id,
            actor_id = actor.user_id,
            from = %current,
            status = %record.transaction.status,
            "Transaction processed"
        );

        self.fanout.processed(&record).await;
        Ok(record)
    }

    /// Admin lane: any assignment, any target, but never out of a terminal status.
    pub async fn override_status(
        &self,
        id: i64,
        input: OverrideStatus,
        ctx: &RequestContext,
    ) -> Result<TransactionRecord, AppError> {
        let actor = require_admin(ctx)?;
        let record = self.load(id).await?;

        let current = record.transaction.status;
        check_transition(current, input.status, Lane::Admin)?;
        let target = self.status_ref(input.status).await?;

        let record = self
            .write_admin_status(record, target, input.admin_notes, AuditAction::StatusUpdated, ctx)
            .await?;
        tracing::info!(
            transaction_id = id,
            actor_id = actor.user_id,
            from = %current,
            status = %record.transaction.status,
            "Transaction status overridden"
        );

        self.fanout.overridden(&record).await;
        Ok(record)
    }

    /// Explicit correction of a terminal status back into the open part of the lifecycle.
    pub async fn reopen(
        &self,
        id: i64,
        input: OverrideStatus,
        ctx: &RequestContext,
    ) -> Result<TransactionRecord, AppError> {
        let actor = require_admin(ctx)?;
        let record = self.load(id).await?;

        let current = record.transaction.status;
        check_reopen(current, input.status)?;
        let target = self.status_ref(input.status).await?;

        let record = self
            .write_admin_status(record, target, input.admin_notes, AuditAction::Reopened, ctx)
            .await?;
        tracing::info!(
            transaction_id = id,
            actor_id = actor.user_id,
            from = %current,
            status = %record.transaction.status,
            "Transaction reopened"
        );

        self.fanout.reopened(&record).await;
        Ok(record)
    }

    async fn write_admin_status(
        &self,
        record: TransactionRecord,
        target: StatusRef,
        admin_notes: Option<String>,
        action: AuditAction,
        ctx: &RequestContext,
    ) -> Result<TransactionRecord, AppError> {
        let tx = &record.transaction;
        let audit = draft(action, ctx)
            .old(json!({ "status": tx.status, "adminNotes": tx.admin_notes }))
            .new_value(json!({
                "status": target.code,
                "adminNotes": admin_notes.as_ref().or(tx.admin_notes.as_ref()),
            }));
        let change = StatusChange {
            expected: tx.status,
            target,
            notes: NotesUpdate::Admin(admin_notes),
            evidence: None,
        };
        self.transactions.update_status(tx.id, change, audit).await?;
        self.reload(tx.id).await
    }

    pub async fn delete(&self, id: i64, ctx: &RequestContext) -> Result<(), AppError> {
        let actor = require_admin(ctx)?;
        let record = self.load(id).await?;

        let details = self.expand(record).await?;
        let audit = draft(AuditAction::Deleted, ctx)
            .old(serde_json::to_value(&details).unwrap_or(Value::Null));
        self.transactions
            .delete(id, audit)
            .await
            .map_err(|err| match err {
                RepositoryError::ForeignKey(relation) => AppError::Dependency {
                    relation,
                    hint: "Cancel the transaction instead of deleting it".to_string(),
                },
                other => other.into(),
            })?;

        tracing::info!(
            transaction_id = id,
            actor_id = actor.user_id,
            status = %details.record.transaction.status,
            evidence = details.evidence.len(),
            comments = details.comments.len(),
            "Transaction deleted"
        );

        self.fanout.deleted(&details.record).await;
        Ok(())
    }

    async fn page(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, AppError> {
        let (items, total) = self.transactions.list(filter, page).await?;
        Ok(Page {
            items,
            pagination: Pagination::new(total, page),
        })
    }

    pub async fn list(
        &self,
        filter: TransactionFilter,
        page: PageRequest,
        ctx: &RequestContext,
    ) -> Result<Page<TransactionRecord>, AppError> {
        require_admin(ctx)?;
        self.page(&filter, page).await
    }

    /// The caller's own queue; any agent filter in the query is replaced.
    pub async fn agent_tasks(
        &self,
        mut filter: TransactionFilter,
        page: PageRequest,
        ctx: &RequestContext,
    ) -> Result<Page<TransactionRecord>, AppError> {
        let actor = require_role(ctx, &[Role::Agent])?;
        filter.assigned_agent_id = Some(actor.user_id);
        self.page(&filter, page).await
    }

    pub async fn player_transactions(
        &self,
        player_uuid: Uuid,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, AppError> {
        let player = self.players.get(player_uuid).await?;
        let filter = TransactionFilter {
            player_profile_id: Some(player.id),
            ..TransactionFilter::default()
        };
        self.page(&filter, page).await
    }

    /// Comments are open at any status; a rating needs a finished transaction and is set once.
    pub async fn add_comment(
        &self,
        uuid: Uuid,
        input: AddComment,
        ctx: &RequestContext,
    ) -> Result<Comment, AppError> {
        require_actor(ctx)?;
        let record = self
            .transactions
            .find_by_uuid(uuid)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction".to_string()))?;
        let actor = require_comment_access(ctx, &record)?;

        let tx = &record.transaction;
        if input.rating.is_some() {
            if !tx.status.is_terminal() {
                return Err(AppError::validation(
                    "rating",
                    "can only be given once the transaction is finished",
                ));
            }
            if tx.rating.is_some() {
                return Err(AppError::Conflict("transaction has already been rated".to_string()));
            }
        }

        let audit = draft(AuditAction::Commented, ctx).new_value(json!({
            "comment": input.comment,
            "rating": input.rating,
        }));
        let set_rating = input.rating.is_some();
        let comment = self
            .transactions
            .add_comment(
                NewComment {
                    transaction_id: tx.id,
                    commenter_user_id: actor.user_id,
                    rating: input.rating,
                    comment: input.comment,
                },
                set_rating,
                audit,
            )
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict(_) => {
                    AppError::Conflict("transaction has already been rated".to_string())
                }
                other => other.into(),
            })?;

        tracing::info!(
            transaction_id = tx.id,
            actor_id = actor.user_id,
            comment_id = comment.id,
            rating = ?comment.rating,
            "Comment added"
        );

        self.fanout.commented(&record, &comment).await;
        Ok(comment)
    }

    /// Audit rows outlive the transaction, so a deleted transaction still has a trail.
    pub async fn audit_trail(&self, id: i64, ctx: &RequestContext) -> Result<Vec<AuditEntry>, AppError> {
        require_admin(ctx)?;
        let entries = self.transactions.audit_trail(ENTITY_TRANSACTION, id).await?;
        if entries.is_empty() && self.transactions.find(id).await?.is_none() {
            return Err(AppError::NotFound("Transaction".to_string()));
        }
        Ok(entries)
    }

    pub async fn list_agents(&self, ctx: &RequestContext) -> Result<Vec<User>, AppError> {
        require_admin(ctx)?;
        Ok(self.users.users_with_role(Role::Agent, true).await?)
    }
}
