use super::{write_audit, PgStore};
use crate::domain::audit::{
    AuditDraft, ENTITY_BETTING_SITE, ENTITY_DEPOSIT_BANK, ENTITY_WITHDRAWAL_BANK,
};
use crate::domain::catalog::{
    BettingSite, DepositBank, NewBettingSite, NewDepositBank, NewWithdrawalBank, WithdrawalBank,
};
use crate::ports::{CatalogStore, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

const DEPOSIT_BANK_COLUMNS: &str =
    "id, bank_name, account_number, account_name, notes, is_active, created_at, updated_at";
const WITHDRAWAL_BANK_COLUMNS: &str =
    "id, bank_name, required_fields, notes, is_active, created_at, updated_at";
const BETTING_SITE_COLUMNS: &str =
    "id, name, description, website, is_active, created_at, updated_at";

impl PgStore {
    async fn delete_catalog_row(
        &self,
        table: &str,
        entity: &str,
        id: i64,
        audit: AuditDraft,
    ) -> RepositoryResult<()> {
        let mut db_tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let deleted = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(id)
            .execute(&mut *db_tx)
            .await
            .map_err(RepositoryError::from)?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("{entity} {id}")));
        }

        write_audit(&mut *db_tx, entity, id, audit).await?;
        db_tx.commit().await.map_err(RepositoryError::from)?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn deposit_banks(&self, active_only: bool) -> RepositoryResult<Vec<DepositBank>> {
        let rows = sqlx::query_as::<_, DepositBankRow>(&format!(
            "SELECT {DEPOSIT_BANK_COLUMNS} FROM deposit_banks \
             WHERE ($1 = FALSE OR is_active) ORDER BY bank_name"
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(DepositBankRow::into_domain).collect())
    }

    async fn deposit_bank(&self, id: i64) -> RepositoryResult<Option<DepositBank>> {
        let row = sqlx::query_as::<_, DepositBankRow>(&format!(
            "SELECT {DEPOSIT_BANK_COLUMNS} FROM deposit_banks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(DepositBankRow::into_domain))
    }

    async fn save_deposit_bank(
        &self,
        id: Option<i64>,
        bank: NewDepositBank,
        audit: AuditDraft,
    ) -> RepositoryResult<DepositBank> {
        let mut db_tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let sql = match id {
            Some(_) => format!(
                "UPDATE deposit_banks SET bank_name = $1, account_number = $2, account_name = $3, \
                 notes = $4, is_active = $5, updated_at = NOW() WHERE id = $6 \
                 RETURNING {DEPOSIT_BANK_COLUMNS}"
            ),
            None => format!(
                "INSERT INTO deposit_banks (bank_name, account_number, account_name, notes, is_active) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING {DEPOSIT_BANK_COLUMNS}"
            ),
        };
        let mut query = sqlx::query_as::<_, DepositBankRow>(&sql)
            .bind(&bank.bank_name)
            .bind(&bank.account_number)
            .bind(&bank.account_name)
            .bind(&bank.notes)
            .bind(bank.is_active);
        if let Some(id) = id {
            query = query.bind(id);
        }
        let row = query
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(RepositoryError::from)?
            .ok_or_else(|| RepositoryError::NotFound(format!("deposit bank {}", id.unwrap_or_default())))?;

        write_audit(&mut *db_tx, ENTITY_DEPOSIT_BANK, row.id, audit).await?;
        db_tx.commit().await.map_err(RepositoryError::from)?;
        Ok(row.into_domain())
    }

    async fn delete_deposit_bank(&self, id: i64, audit: AuditDraft) -> RepositoryResult<()> {
        self.delete_catalog_row("deposit_banks", ENTITY_DEPOSIT_BANK, id, audit)
            .await
    }

    async fn withdrawal_banks(&self, active_only: bool) -> RepositoryResult<Vec<WithdrawalBank>> {
        let rows = sqlx::query_as::<_, WithdrawalBankRow>(&format!(
            "SELECT {WITHDRAWAL_BANK_COLUMNS} FROM withdrawal_banks \
             WHERE ($1 = FALSE OR is_active) ORDER BY bank_name"
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(WithdrawalBankRow::into_domain).collect())
    }

    async fn withdrawal_bank(&self, id: i64) -> RepositoryResult<Option<WithdrawalBank>> {
        let row = sqlx::query_as::<_, WithdrawalBankRow>(&format!(
            "SELECT {WITHDRAWAL_BANK_COLUMNS} FROM withdrawal_banks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(WithdrawalBankRow::into_domain))
    }

    async fn save_withdrawal_bank(
        &self,
        id: Option<i64>,
        bank: NewWithdrawalBank,
        audit: AuditDraft,
    ) -> RepositoryResult<WithdrawalBank> {
        let mut db_tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let sql = match id {
            Some(_) => format!(
                "UPDATE withdrawal_banks SET bank_name = $1, required_fields = $2, notes = $3, \
                 is_active = $4, updated_at = NOW() WHERE id = $5 \
                 RETURNING {WITHDRAWAL_BANK_COLUMNS}"
            ),
            None => format!(
                "INSERT INTO withdrawal_banks (bank_name, required_fields, notes, is_active) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING {WITHDRAWAL_BANK_COLUMNS}"
            ),
        };
        let mut query = sqlx::query_as::<_, WithdrawalBankRow>(&sql)
            .bind(&bank.bank_name)
            .bind(&bank.required_fields)
            .bind(&bank.notes)
            .bind(bank.is_active);
        if let Some(id) = id {
            query = query.bind(id);
        }
        let row = query
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(RepositoryError::from)?
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("withdrawal bank {}", id.unwrap_or_default()))
            })?;

        write_audit(&mut *db_tx, ENTITY_WITHDRAWAL_BANK, row.id, audit).await?;
        db_tx.commit().await.map_err(RepositoryError::from)?;
        Ok(row.into_domain())
    }

    async fn delete_withdrawal_bank(&self, id: i64, audit: AuditDraft) -> RepositoryResult<()> {
        self.delete_catalog_row("withdrawal_banks", ENTITY_WITHDRAWAL_BANK, id, audit)
            .await
    }

    async fn betting_sites(&self, active_only: bool) -> RepositoryResult<Vec<BettingSite>> {
        let rows = sqlx::query_as::<_, BettingSiteRow>(&format!(
            "SELECT {BETTING_SITE_COLUMNS} FROM betting_sites \
             WHERE ($1 = FALSE OR is_active) ORDER BY name"
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(BettingSiteRow::into_domain).collect())
    }

    async fn betting_site(&self, id: i64) -> RepositoryResult<Option<BettingSite>> {
        let row = sqlx::query_as::<_, BettingSiteRow>(&format!(
            "SELECT {BETTING_SITE_COLUMNS} FROM betting_sites WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(BettingSiteRow::into_domain))
    }

    async fn save_betting_site(
        &self,
        id: Option<i64>,
        site: NewBettingSite,
        audit: AuditDraft,
    ) -> RepositoryResult<BettingSite> {
        let mut db_tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let sql = match id {
            Some(_) => format!(
                "UPDATE betting_sites SET name = $1, description = $2, website = $3, \
                 is_active = $4, updated_at = NOW() WHERE id = $5 \
                 RETURNING {BETTING_SITE_COLUMNS}"
            ),
            None => format!(
                "INSERT INTO betting_sites (name, description, website, is_active) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING {BETTING_SITE_COLUMNS}"
            ),
        };
        let mut query = sqlx::query_as::<_, BettingSiteRow>(&sql)
            .bind(&site.name)
            .bind(&site.description)
            .bind(&site.website)
            .bind(site.is_active);
        if let Some(id) = id {
            query = query.bind(id);
        }
        let row = query
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(RepositoryError::from)?
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("betting site {}", id.unwrap_or_default()))
            })?;

        write_audit(&mut *db_tx, ENTITY_BETTING_SITE, row.id, audit).await?;
        db_tx.commit().await.map_err(RepositoryError::from)?;
        Ok(row.into_domain())
    }

    async fn delete_betting_site(&self, id: i64, audit: AuditDraft) -> RepositoryResult<()> {
        self.delete_catalog_row("betting_sites", ENTITY_BETTING_SITE, id, audit)
            .await
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DepositBankRow {
    id: i64,
    bank_name: String,
    account_number: String,
    account_name: String,
    notes: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DepositBankRow {
    fn into_domain(self) -> DepositBank {
        DepositBank {
            id: self.id,
            bank_name: self.bank_name,
            account_number: self.account_number,
            account_name: self.account_name,
            notes: self.notes,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WithdrawalBankRow {
    id: i64,
    bank_name: String,
    required_fields: serde_json::Value,
    notes: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WithdrawalBankRow {
    fn into_domain(self) -> WithdrawalBank {
        WithdrawalBank {
            id: self.id,
            bank_name: self.bank_name,
            required_fields: self.required_fields,
            notes: self.notes,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BettingSiteRow {
    id: i64,
    name: String,
    description: Option<String>,
    website: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BettingSiteRow {
    fn into_domain(self) -> BettingSite {
        BettingSite {
            id: self.id,
            name: self.name,
            description: self.description,
            website: self.website,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
