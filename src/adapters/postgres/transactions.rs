use super::{write_audit, PgStore};
use crate::domain::audit::{AuditDraft, AuditEntry, ENTITY_TRANSACTION};
use crate::domain::player::PlayerIdentity;
use crate::domain::query::{PageRequest, TransactionFilter};
use crate::domain::status::{StatusRecord, TxStatus};
use crate::domain::transaction::{
    AgentSummary, Comment, Evidence, NewComment, NewTransaction, NotesUpdate, PlayerSummary,
    Routing, SiteContext, StatusChange, Transaction, TransactionRecord, TransactionType,
};
use crate::ports::{RepositoryError, RepositoryResult, TransactionStore};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::str::FromStr;
use uuid::Uuid;

const RECORD_SELECT: &str = r#"
    SELECT t.id, t.transaction_uuid, t.player_profile_id, t.user_id, t.type AS tx_type,
           t.amount, t.currency, t.deposit_bank_id, t.withdrawal_bank_id, t.withdrawal_address,
           t.screenshot_url, t.betting_site_id, t.player_site_id, t.requested_at,
           t.assigned_agent_id, s.code AS status_code, t.admin_notes, t.agent_notes, t.rating,
           t.created_at, t.updated_at,
           p.player_uuid, p.channel_kind, p.channel_id, p.telegram_username,
           u.username AS agent_username, u.display_name AS agent_display_name
    FROM transactions t
    JOIN transaction_statuses s ON s.id = t.status_id
    JOIN player_profiles p ON p.id = t.player_profile_id
    LEFT JOIN users u ON u.id = t.assigned_agent_id
"#;

const COUNT_SELECT: &str = r#"
    SELECT COUNT(*)
    FROM transactions t
    JOIN transaction_statuses s ON s.id = t.status_id
"#;

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &TransactionFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND s.code = ").push_bind(status.code());
    }
    if let Some(agent) = filter.assigned_agent_id {
        qb.push(" AND t.assigned_agent_id = ").push_bind(agent);
    }
    if let Some(tx_type) = filter.tx_type {
        qb.push(" AND t.type = ").push_bind(tx_type.as_str());
    }
    if let Some(min) = &filter.min_amount {
        qb.push(" AND t.amount >= ").push_bind(min.clone());
    }
    if let Some(max) = &filter.max_amount {
        qb.push(" AND t.amount <= ").push_bind(max.clone());
    }
    if let Some(from) = filter.created_from {
        qb.push(" AND t.created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.created_to {
        qb.push(" AND t.created_at <= ").push_bind(to);
    }
    if let Some(site) = filter.betting_site_id {
        qb.push(" AND t.betting_site_id = ").push_bind(site);
    }
    if let Some(player) = filter.player_profile_id {
        qb.push(" AND t.player_profile_id = ").push_bind(player);
    }
}

async fn fetch_record(conn: &mut PgConnection, id: i64) -> RepositoryResult<TransactionRecord> {
    let row = sqlx::query_as::<_, RecordRow>(&format!("{RECORD_SELECT} WHERE t.id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(RepositoryError::from)?;

    row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {id}")))?
        .into_domain()
}

async fn exists(conn: &mut PgConnection, id: i64) -> RepositoryResult<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM transactions WHERE id = $1)")
        .bind(id)
        .fetch_one(conn)
        .await
        .map_err(RepositoryError::from)
}

#[async_trait]
impl TransactionStore for PgStore {
    async fn status_record(&self, code: TxStatus) -> RepositoryResult<Option<StatusRecord>> {
        let row = sqlx::query_as::<_, StatusRow>(
            "SELECT id, code, label FROM transaction_statuses WHERE code = $1",
        )
        .bind(code.code())
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(StatusRow::into_domain).transpose()
    }

    async fn insert(&self, new: NewTransaction, audit: AuditDraft) -> RepositoryResult<Transaction> {
        let mut db_tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO transactions (
                transaction_uuid, player_profile_id, user_id, type, amount, currency,
                deposit_bank_id, withdrawal_bank_id, withdrawal_address, screenshot_url,
                betting_site_id, player_site_id, requested_at, status_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(new.transaction_uuid)
        .bind(new.player_profile_id)
        .bind(new.user_id)
        .bind(new.routing.transaction_type().as_str())
        .bind(&new.amount)
        .bind(&new.currency)
        .bind(new.routing.deposit_bank_id())
        .bind(new.routing.withdrawal_bank_id())
        .bind(new.routing.withdrawal_address())
        .bind(&new.screenshot_url)
        .bind(new.site.as_ref().map(|s| s.betting_site_id))
        .bind(new.site.as_ref().map(|s| s.player_site_id.clone()))
        .bind(new.requested_at)
        .bind(new.status.id)
        .fetch_one(&mut *db_tx)
        .await
        .map_err(RepositoryError::from)?;

        write_audit(&mut *db_tx, ENTITY_TRANSACTION, id, audit).await?;
        let record = fetch_record(&mut *db_tx, id).await?;
        db_tx.commit().await.map_err(RepositoryError::from)?;

        Ok(record.transaction)
    }

    async fn find(&self, id: i64) -> RepositoryResult<Option<TransactionRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(&format!("{RECORD_SELECT} WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(RecordRow::into_domain).transpose()
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> RepositoryResult<Option<TransactionRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "{RECORD_SELECT} WHERE t.transaction_uuid = $1"
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(RecordRow::into_domain).transpose()
    }

    async fn assign(
        &self,
        id: i64,
        agent_id: i64,
        expected: TxStatus,
        audit: AuditDraft,
    ) -> RepositoryResult<Transaction> {
        let mut db_tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let updated = sqlx::query(
            r#"
            UPDATE transactions
            SET assigned_agent_id = $2, updated_at = NOW()
            WHERE id = $1
              AND status_id = (SELECT id FROM transaction_statuses WHERE code = $3)
            "#,
        )
        .bind(id)
        .bind(agent_id)
        .bind(expected.code())
        .execute(&mut *db_tx)
        .await
        .map_err(RepositoryError::from)?;
        if updated.rows_affected() == 0 {
            return Err(if exists(&mut *db_tx, id).await? {
                RepositoryError::Stale(format!("transaction {id}"))
            } else {
                RepositoryError::NotFound(format!("transaction {id}"))
            });
        }

        write_audit(&mut *db_tx, ENTITY_TRANSACTION, id, audit).await?;
        let record = fetch_record(&mut *db_tx, id).await?;
        db_tx.commit().await.map_err(RepositoryError::from)?;

        Ok(record.transaction)
    }

    async fn update_status(
        &self,
        id: i64,
        change: StatusChange,
        audit: AuditDraft,
    ) -> RepositoryResult<Transaction> {
        let mut db_tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let (agent_notes, admin_notes) = match change.notes {
            NotesUpdate::Agent(notes) => (notes, None),
            NotesUpdate::Admin(notes) => (None, notes),
        };

        let updated = sqlx::query(
            r#"
            UPDATE transactions
            SET status_id = $2,
                agent_notes = COALESCE($3, agent_notes),
                admin_notes = COALESCE($4, admin_notes),
                updated_at = NOW()
            WHERE id = $1
              AND status_id = (SELECT id FROM transaction_statuses WHERE code = $5)
            "#,
        )
        .bind(id)
        .bind(change.target.id)
        .bind(agent_notes)
        .bind(admin_notes)
        .bind(change.expected.code())
        .execute(&mut *db_tx)
        .await
        .map_err(RepositoryError::from)?;

        if updated.rows_affected() == 0 {
            return Err(if exists(&mut *db_tx, id).await? {
                RepositoryError::Stale(format!("transaction {id}"))
            } else {
                RepositoryError::NotFound(format!("transaction {id}"))
            });
        }

        if let Some(evidence) = change.evidence {
            sqlx::query(
                r#"
                INSERT INTO transaction_evidence (transaction_id, uploaded_by_user_id, file_url, file_type)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(id)
            .bind(evidence.uploaded_by_user_id)
            .bind(&evidence.file_url)
            .bind(&evidence.file_type)
            .execute(&mut *db_tx)
            .await
            .map_err(RepositoryError::from)?;
        }

        write_audit(&mut *db_tx, ENTITY_TRANSACTION, id, audit).await?;
        let record = fetch_record(&mut *db_tx, id).await?;
        db_tx.commit().await.map_err(RepositoryError::from)?;

        Ok(record.transaction)
    }

    async fn delete(&self, id: i64, audit: AuditDraft) -> RepositoryResult<()> {
        let mut db_tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        sqlx::query("DELETE FROM transaction_evidence WHERE transaction_id = $1")
            .bind(id)
            .execute(&mut *db_tx)
            .await
            .map_err(RepositoryError::from)?;
        sqlx::query("DELETE FROM transaction_comments WHERE transaction_id = $1")
            .bind(id)
            .execute(&mut *db_tx)
            .await
            .map_err(RepositoryError::from)?;
        let deleted = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&mut *db_tx)
            .await
            .map_err(RepositoryError::from)?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("transaction {id}")));
        }

        write_audit(&mut *db_tx, ENTITY_TRANSACTION, id, audit).await?;
        db_tx.commit().await.map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn list(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> RepositoryResult<(Vec<TransactionRecord>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new(COUNT_SELECT);
        push_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        let mut query = QueryBuilder::<Postgres>::new(RECORD_SELECT);
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY t.created_at DESC, t.id DESC LIMIT ")
            .push_bind(i64::from(page.limit()))
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query
            .build_query_as::<RecordRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        let items = rows
            .into_iter()
            .map(RecordRow::into_domain)
            .collect::<RepositoryResult<Vec<_>>>()?;
        Ok((items, total))
    }

    async fn evidence(&self, transaction_id: i64) -> RepositoryResult<Vec<Evidence>> {
        let rows = sqlx::query_as::<_, EvidenceRow>(
            r#"
            SELECT id, transaction_id, uploaded_by_user_id, file_url, file_type, created_at
            FROM transaction_evidence WHERE transaction_id = $1 ORDER BY id
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(EvidenceRow::into_domain).collect())
    }

    async fn comments(&self, transaction_id: i64) -> RepositoryResult<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, transaction_id, commenter_user_id, rating, comment, created_at
            FROM transaction_comments WHERE transaction_id = $1 ORDER BY id
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(CommentRow::into_domain).collect())
    }

    async fn add_comment(
        &self,
        new: NewComment,
        set_rating: bool,
        audit: AuditDraft,
    ) -> RepositoryResult<Comment> {
        let mut db_tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        if set_rating {
            let rated = sqlx::query(
                r#"
                UPDATE transactions SET rating = $2, updated_at = NOW()
                WHERE id = $1 AND rating IS NULL
                "#,
            )
            .bind(new.transaction_id)
            .bind(new.rating)
            .execute(&mut *db_tx)
            .await
            .map_err(RepositoryError::from)?;

            if rated.rows_affected() == 0 {
                return Err(if exists(&mut *db_tx, new.transaction_id).await? {
                    RepositoryError::Conflict("transactions_rating_once".to_string())
                } else {
                    RepositoryError::NotFound(format!("transaction {}", new.transaction_id))
                });
            }
        }

        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO transaction_comments (transaction_id, commenter_user_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id, transaction_id, commenter_user_id, rating, comment, created_at
            "#,
        )
        .bind(new.transaction_id)
        .bind(new.commenter_user_id)
        .bind(new.rating)
        .bind(&new.comment)
        .fetch_one(&mut *db_tx)
        .await
        .map_err(RepositoryError::from)?;

        write_audit(&mut *db_tx, ENTITY_TRANSACTION, new.transaction_id, audit).await?;
        db_tx.commit().await.map_err(RepositoryError::from)?;

        Ok(row.into_domain())
    }

    async fn audit_trail(&self, entity: &str, entity_id: i64) -> RepositoryResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, actor_user_id, entity, entity_id, action, old_value, new_value, ip_address, created_at
            FROM audit_logs WHERE entity = $1 AND entity_id = $2
            ORDER BY created_at, id
            "#,
        )
        .bind(entity)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(AuditRow::into_domain).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatusRow {
    id: i32,
    code: String,
    label: String,
}

impl StatusRow {
    fn into_domain(self) -> RepositoryResult<StatusRecord> {
        let code = TxStatus::from_str(&self.code)
            .map_err(|err| RepositoryError::Storage(err.to_string()))?;
        Ok(StatusRecord {
            id: self.id,
            code,
            label: self.label,
        })
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: i64,
    transaction_uuid: Uuid,
    player_profile_id: i64,
    user_id: Option<i64>,
    tx_type: String,
    amount: BigDecimal,
    currency: String,
    deposit_bank_id: Option<i64>,
    withdrawal_bank_id: Option<i64>,
    withdrawal_address: Option<String>,
    screenshot_url: Option<String>,
    betting_site_id: Option<i64>,
    player_site_id: Option<String>,
    requested_at: DateTime<Utc>,
    assigned_agent_id: Option<i64>,
    status_code: String,
    admin_notes: Option<String>,
    agent_notes: Option<String>,
    rating: Option<i16>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    player_uuid: Uuid,
    channel_kind: String,
    channel_id: String,
    telegram_username: Option<String>,
    agent_username: Option<String>,
    agent_display_name: Option<String>,
}

impl RecordRow {
    fn into_domain(self) -> RepositoryResult<TransactionRecord> {
        let corrupt = |what: &str| RepositoryError::Storage(format!("transaction {}: {what}", self.id));

        let tx_type = TransactionType::from_str(&self.tx_type).map_err(|_| corrupt("unknown type"))?;
        let status = TxStatus::from_str(&self.status_code).map_err(|_| corrupt("unknown status"))?;
        let identity = PlayerIdentity::from_parts(&self.channel_kind, self.channel_id.clone())
            .ok_or_else(|| corrupt("unknown player channel kind"))?;
        let routing = Routing::from_columns(
            tx_type,
            self.deposit_bank_id,
            self.withdrawal_bank_id,
            self.withdrawal_address.clone(),
        )
        .ok_or_else(|| corrupt("routing columns do not match type"))?;
        let site = match (self.betting_site_id, self.player_site_id) {
            (Some(betting_site_id), Some(player_site_id)) => Some(SiteContext {
                betting_site_id,
                player_site_id,
            }),
            _ => None,
        };
        let assigned_agent = match (self.assigned_agent_id, self.agent_username) {
            (Some(id), Some(username)) => Some(AgentSummary {
                id,
                username,
                display_name: self.agent_display_name,
            }),
            _ => None,
        };

        Ok(TransactionRecord {
            transaction: Transaction {
                id: self.id,
                transaction_uuid: self.transaction_uuid,
                player_profile_id: self.player_profile_id,
                user_id: self.user_id,
                routing,
                amount: self.amount,
                currency: self.currency,
                site,
                screenshot_url: self.screenshot_url,
                requested_at: self.requested_at,
                assigned_agent_id: self.assigned_agent_id,
                status,
                admin_notes: self.admin_notes,
                agent_notes: self.agent_notes,
                rating: self.rating,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            player: PlayerSummary {
                id: self.player_profile_id,
                player_uuid: self.player_uuid,
                identity,
                telegram_username: self.telegram_username,
            },
            assigned_agent,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EvidenceRow {
    id: i64,
    transaction_id: i64,
    uploaded_by_user_id: i64,
    file_url: String,
    file_type: String,
    created_at: DateTime<Utc>,
}

impl EvidenceRow {
    fn into_domain(self) -> Evidence {
        Evidence {
            id: self.id,
            transaction_id: self.transaction_id,
            uploaded_by_user_id: self.uploaded_by_user_id,
            file_url: self.file_url,
            file_type: self.file_type,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: i64,
    transaction_id: i64,
    commenter_user_id: i64,
    rating: Option<i16>,
    comment: String,
    created_at: DateTime<Utc>,
}

impl CommentRow {
    fn into_domain(self) -> Comment {
        Comment {
            id: self.id,
            transaction_id: self.transaction_id,
            commenter_user_id: self.commenter_user_id,
            rating: self.rating,
            comment: self.comment,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: i64,
    actor_user_id: Option<i64>,
    entity: String,
    entity_id: i64,
    action: String,
    old_value: Option<serde_json::Value>,
    new_value: Option<serde_json::Value>,
    ip_address: Option<String>,
    created_at: DateTime<Utc>,
}

impl AuditRow {
    fn into_domain(self) -> AuditEntry {
        AuditEntry {
            id: self.id,
            actor_user_id: self.actor_user_id,
            entity: self.entity,
            entity_id: self.entity_id,
            action: self.action,
            old_value: self.old_value,
            new_value: self.new_value,
            ip_address: self.ip_address,
            created_at: self.created_at,
        }
    }
}
