//! Player profile endpoints. The player UUID is the only handle a player holds, so these routes
//! need no token.

use super::{path_uuid, validated};
use crate::error::AppError;
use crate::middleware::auth::MaybeAuthContext;
use crate::schemas::{PlayerView, PublicTransactionView};
use crate::validation::player::{RegisterPlayerRequest, ReconcileRequest, UpdatePlayerRequest};
use crate::validation::transaction::ListQuery;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/players", post(register))
        .route("/players/:uuid", get(get_player).put(update_player))
        .route("/players/:uuid/identity", put(reconcile))
        .route("/players/:uuid/transactions", get(transactions))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    MaybeAuthContext(ctx): MaybeAuthContext,
    payload: Result<Json<RegisterPlayerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let input = validated(request.validate())?;
    let profile = state.players.register(input, &ctx).await?;
    Ok((StatusCode::CREATED, Json(PlayerView::from(profile))))
}

pub async fn get_player(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let uuid = path_uuid("playerUuid", &uuid)?;
    Ok(Json(PlayerView::from(state.players.get(uuid).await?)))
}

pub async fn update_player(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    payload: Result<Json<UpdatePlayerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let uuid = path_uuid("playerUuid", &uuid)?;
    let Json(request) = payload?;
    let update = validated(request.validate())?;
    Ok(Json(PlayerView::from(state.players.update(uuid, update).await?)))
}

pub async fn reconcile(
    State(state): State<AppState>,
    MaybeAuthContext(ctx): MaybeAuthContext,
    Path(uuid): Path<String>,
    payload: Result<Json<ReconcileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let uuid = path_uuid("playerUuid", &uuid)?;
    let Json(request) = payload?;
    let input = validated(request.validate())?;
    Ok(Json(PlayerView::from(
        state.players.reconcile(uuid, input, &ctx).await?,
    )))
}

pub async fn transactions(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let uuid = path_uuid("playerUuid", &uuid)?;
    let (_, page) = validated(
        ListQuery {
            page: query.page,
            limit: query.limit,
            ..ListQuery::default()
        }
        .validate(),
    )?;
    let result = state.lifecycle.player_transactions(uuid, page).await?;
    Ok(Json(result.map(|record| PublicTransactionView::from(&record))))
}
