//! Admin-maintained configuration entities: deposit banks, withdrawal banks, betting sites.

use crate::domain::audit::{AuditAction, AuditDraft};
use crate::domain::catalog::{
    BettingSite, DepositBank, NewBettingSite, NewDepositBank, NewWithdrawalBank, WithdrawalBank,
};
use crate::domain::RequestContext;
use crate::error::AppError;
use crate::ports::{CatalogStore, RepositoryError};
use crate::services::access::require_admin;
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
}

fn snapshot<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn write_error(err: RepositoryError, what: &str) -> AppError {
    match err {
        RepositoryError::Conflict(_) => {
            AppError::Conflict(format!("a {what} with the same name already exists"))
        }
        RepositoryError::ForeignKey(_) => AppError::Dependency {
            relation: "transactions".to_string(),
            hint: format!("Deactivate the {what} instead of deleting it"),
        },
        other => other.into(),
    }
}

fn draft(action: AuditAction, ctx: &RequestContext) -> AuditDraft {
    AuditDraft::new(action, ctx.user_id(), ctx.ip_address.clone())
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    // Deposit banks

    pub async fn deposit_banks(&self, active_only: bool) -> Result<Vec<DepositBank>, AppError> {
        Ok(self.store.deposit_banks(active_only).await?)
    }

    pub async fn deposit_bank(&self, id: i64) -> Result<DepositBank, AppError> {
        self.store
            .deposit_bank(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Deposit bank".to_string()))
    }

    pub async fn save_deposit_bank(
        &self,
        id: Option<i64>,
        bank: NewDepositBank,
        ctx: &RequestContext,
    ) -> Result<DepositBank, AppError> {
        require_admin(ctx)?;
        let audit = match id {
            Some(id) => draft(AuditAction::Updated, ctx).old(snapshot(&self.deposit_bank(id).await?)),
            None => draft(AuditAction::Created, ctx),
        }
        .new_value(snapshot(&bank));

        let saved = self
            .store
            .save_deposit_bank(id, bank, audit)
            .await
            .map_err(|e| write_error(e, "deposit bank"))?;
        tracing::info!(deposit_bank_id = saved.id, actor_id = ?ctx.user_id(), "Deposit bank saved");
        Ok(saved)
    }

    pub async fn delete_deposit_bank(&self, id: i64, ctx: &RequestContext) -> Result<(), AppError> {
        require_admin(ctx)?;
        let existing = self.deposit_bank(id).await?;
        let audit = draft(AuditAction::Deleted, ctx).old(snapshot(&existing));
        self.store
            .delete_deposit_bank(id, audit)
            .await
            .map_err(|e| write_error(e, "deposit bank"))?;
        tracing::info!(deposit_bank_id = id, actor_id = ?ctx.user_id(), "Deposit bank deleted");
        Ok(())
    }

    // Withdrawal banks

    pub async fn withdrawal_banks(&self, active_only: bool) -> Result<Vec<WithdrawalBank>, AppError> {
        Ok(self.store.withdrawal_banks(active_only).await?)
    }

    pub async fn withdrawal_bank(&self, id: i64) -> Result<WithdrawalBank, AppError> {
        self.store
            .withdrawal_bank(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Withdrawal bank".to_string()))
    }

    pub async fn save_withdrawal_bank(
        &self,
        id: Option<i64>,
        bank: NewWithdrawalBank,
        ctx: &RequestContext,
    ) -> Result<WithdrawalBank, AppError> {
        require_admin(ctx)?;
        let audit = match id {
            Some(id) => {
                draft(AuditAction::Updated, ctx).old(snapshot(&self.withdrawal_bank(id).await?))
            }
            None => draft(AuditAction::Created, ctx),
        }
        .new_value(snapshot(&bank));

        let saved = self
            .store
            .save_withdrawal_bank(id, bank, audit)
            .await
            .map_err(|e| write_error(e, "withdrawal bank"))?;
        tracing::info!(withdrawal_bank_id = saved.id, actor_id = ?ctx.user_id(), "Withdrawal bank saved");
        Ok(saved)
    }

    pub async fn delete_withdrawal_bank(&self, id: i64, ctx: &RequestContext) -> Result<(), AppError> {
        require_admin(ctx)?;
        let existing = self.withdrawal_bank(id).await?;
        let audit = draft(AuditAction::Deleted, ctx).old(snapshot(&existing));
        self.store
            .delete_withdrawal_bank(id, audit)
            .await
            .map_err(|e| write_error(e, "withdrawal bank"))?;
        tracing::info!(withdrawal_bank_id = id, actor_id = ?ctx.user_id(), "Withdrawal bank deleted");
        Ok(())
    }

    // Betting sites

    pub async fn betting_sites(&self, active_only: bool) -> Result<Vec<BettingSite>, AppError> {
        Ok(self.store.betting_sites(active_only).await?)
    }

    pub async fn betting_site(&self, id: i64) -> Result<BettingSite, AppError> {
        self.store
            .betting_site(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Betting site".to_string()))
    }

    pub async fn save_betting_site(
        &self,
        id: Option<i64>,
        site: NewBettingSite,
        ctx: &RequestContext,
    ) -> Result<BettingSite, AppError> {
        require_admin(ctx)?;
        let audit = match id {
            Some(id) => draft(AuditAction::Updated, ctx).old(snapshot(&self.betting_site(id).await?)),
            None => draft(AuditAction::Created, ctx),
        }
        .new_value(snapshot(&site));

        let saved = self
            .store
            .save_betting_site(id, site, audit)
            .await
            .map_err(|e| write_error(e, "betting site"))?;
        tracing::info!(betting_site_id = saved.id, actor_id = ?ctx.user_id(), "Betting site saved");
        Ok(saved)
    }

    pub async fn delete_betting_site(&self, id: i64, ctx: &RequestContext) -> Result<(), AppError> {
        require_admin(ctx)?;
        let existing = self.betting_site(id).await?;
        let audit = draft(AuditAction::Deleted, ctx).old(snapshot(&existing));
        self.store
            .delete_betting_site(id, audit)
            .await
            .map_err(|e| write_error(e, "betting site"))?;
        tracing::info!(betting_site_id = id, actor_id = ?ctx.user_id(), "Betting site deleted");
        Ok(())
    }
}
