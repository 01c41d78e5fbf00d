//! Admin endpoints: transaction oversight and catalog management. Mounted behind
//! `require_admin_layer`; the services repeat the role check.

use super::{path_id, validated};
use crate::domain::TxStatus;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::schemas::{TransactionDetailsView, TransactionView};
use crate::services::access::require_admin;
use crate::validation::catalog::{BettingSiteRequest, DepositBankRequest, WithdrawalBankRequest};
use crate::validation::transaction::{AssignRequest, ListQuery, OverrideRequest};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde_json::json;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/transactions", get(list_transactions))
        .route(
            "/admin/transactions/:id",
            get(transaction_details).delete(delete_transaction),
        )
        .route("/admin/transactions/:id/audit", get(audit_trail))
        .route("/admin/transactions/:id/assign", put(assign))
        .route("/admin/transactions/:id/status", put(override_status))
        .route("/admin/transactions/:id/reopen", put(reopen))
        .route("/admin/agents", get(list_agents))
        .route(
            "/admin/deposit-banks",
            get(list_deposit_banks).post(create_deposit_bank),
        )
        .route(
            "/admin/deposit-banks/:id",
            put(update_deposit_bank).delete(delete_deposit_bank),
        )
        .route(
            "/admin/withdrawal-banks",
            get(list_withdrawal_banks).post(create_withdrawal_bank),
        )
        .route(
            "/admin/withdrawal-banks/:id",
            put(update_withdrawal_bank).delete(delete_withdrawal_bank),
        )
        .route(
            "/admin/betting-sites",
            get(list_betting_sites).post(create_betting_site),
        )
        .route(
            "/admin/betting-sites/:id",
            put(update_betting_site).delete(delete_betting_site),
        )
}

pub async fn list_transactions(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (filter, page) = validated(query.validate())?;
    let result = state.lifecycle.list(filter, page, &ctx).await?;
    Ok(Json(result.map(TransactionView::from)))
}

pub async fn transaction_details(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id)?;
    let details = state.lifecycle.details(id, &ctx).await?;
    Ok(Json(TransactionDetailsView::from(details)))
}

pub async fn audit_trail(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id)?;
    Ok(Json(state.lifecycle.audit_trail(id, &ctx).await?))
}

pub async fn assign(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id)?;
    let Json(request) = payload?;
    let agent_id = validated(request.validate())?;
    let record = state.lifecycle.assign(id, agent_id, &ctx).await?;
    Ok(Json(TransactionView::from(record)))
}

pub async fn override_status(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
    payload: Result<Json<OverrideRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id)?;
    let Json(request) = payload?;
    let input = validated(request.validate())?;
    let record = state.lifecycle.override_status(id, input, &ctx).await?;
    Ok(Json(TransactionView::from(record)))
}

pub async fn reopen(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
    payload: Result<Json<OverrideRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id)?;
    let Json(request) = payload?;
    let input = validated(request.validate_with_default(Some(TxStatus::InProgress)))?;
    let record = state.lifecycle.reopen(id, input, &ctx).await?;
    Ok(Json(TransactionView::from(record)))
}

pub async fn delete_transaction(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id)?;
    state.lifecycle.delete(id, &ctx).await?;
    Ok(Json(json!({ "message": "Transaction deleted" })))
}

pub async fn list_agents(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.lifecycle.list_agents(&ctx).await?))
}

// Catalog

pub async fn list_deposit_banks(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&ctx)?;
    Ok(Json(state.catalog.deposit_banks(false).await?))
}

pub async fn create_deposit_bank(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    payload: Result<Json<DepositBankRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let bank = validated(request.validate())?;
    let saved = state.catalog.save_deposit_bank(None, bank, &ctx).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn update_deposit_bank(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
    payload: Result<Json<DepositBankRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id)?;
    let Json(request) = payload?;
    let bank = validated(request.validate())?;
    Ok(Json(state.catalog.save_deposit_bank(Some(id), bank, &ctx).await?))
}

pub async fn delete_deposit_bank(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id)?;
    state.catalog.delete_deposit_bank(id, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_withdrawal_banks(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&ctx)?;
    Ok(Json(state.catalog.withdrawal_banks(false).await?))
}

pub async fn create_withdrawal_bank(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    payload: Result<Json<WithdrawalBankRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let bank = validated(request.validate())?;
    let saved = state.catalog.save_withdrawal_bank(None, bank, &ctx).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn update_withdrawal_bank(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
    payload: Result<Json<WithdrawalBankRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id)?;
    let Json(request) = payload?;
    let bank = validated(request.validate())?;
    Ok(Json(state.catalog.save_withdrawal_bank(Some(id), bank, &ctx).await?))
}

pub async fn delete_withdrawal_bank(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id)?;
    state.catalog.delete_withdrawal_bank(id, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_betting_sites(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&ctx)?;
    Ok(Json(state.catalog.betting_sites(false).await?))
}

pub async fn create_betting_site(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    payload: Result<Json<BettingSiteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let site = validated(request.validate())?;
    let saved = state.catalog.save_betting_site(None, site, &ctx).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn update_betting_site(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
    payload: Result<Json<BettingSiteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id)?;
    let Json(request) = payload?;
    let site = validated(request.validate())?;
    Ok(Json(state.catalog.save_betting_site(Some(id), site, &ctx).await?))
}

pub async fn delete_betting_site(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id)?;
    state.catalog.delete_betting_site(id, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}
