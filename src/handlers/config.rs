//! Public catalog listings. Only active entries are shown.

use crate::error::AppError;
use crate::AppState;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/config/deposit-banks", get(deposit_banks))
        .route("/config/withdrawal-banks", get(withdrawal_banks))
        .route("/config/betting-sites", get(betting_sites))
}

pub async fn deposit_banks(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.catalog.deposit_banks(true).await?))
}

pub async fn withdrawal_banks(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.catalog.withdrawal_banks(true).await?))
}

pub async fn betting_sites(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.catalog.betting_sites(true).await?))
}
