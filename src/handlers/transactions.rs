use super::{from_fields, path_uuid, read_multipart, validated};
use crate::error::AppError;
use crate::middleware::auth::{AuthContext, MaybeAuthContext};
use crate::schemas::PublicTransactionView;
use crate::validation::transaction::{CommentRequest, CreateTransactionRequest};
use crate::AppState;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, FromRequest, Multipart, Path, Query, State},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

pub const SCREENSHOT_FIELD: &str = "screenshot";

/// Creation only; the router puts it behind the creation rate limit.
pub fn create_routes() -> Router<AppState> {
    Router::new().route("/transactions", post(create))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transactions/:uuid", get(get_transaction))
        .route("/transactions/:uuid/comments", post(add_comment))
}

fn is_multipart(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| value.starts_with("multipart/form-data"))
}

/// Accepts a JSON body, or a multipart form whose text fields mirror the JSON keys plus an
/// optional `screenshot` image.
pub async fn create(
    State(state): State<AppState>,
    MaybeAuthContext(ctx): MaybeAuthContext,
    request: Request<Body>,
) -> Result<impl IntoResponse, AppError> {
    let (body, screenshot) = if is_multipart(&request) {
        let multipart = Multipart::from_request(request, &state).await?;
        let form = read_multipart(multipart, SCREENSHOT_FIELD).await?;
        (from_fields::<CreateTransactionRequest>(form.fields)?, form.file)
    } else {
        let Json(body) = Json::<CreateTransactionRequest>::from_request(request, &state).await?;
        (body, None)
    };

    let input = validated(body.validate())?;
    let record = state.lifecycle.create(input, screenshot, &ctx).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Transaction request received",
            "transaction": PublicTransactionView::from(&record),
        })),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewQuery {
    pub player_uuid: Option<String>,
}

pub async fn get_transaction(
    State(state): State<AppState>,
    MaybeAuthContext(ctx): MaybeAuthContext,
    Path(uuid): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Result<impl IntoResponse, AppError> {
    let uuid = path_uuid("transactionUuid", &uuid)?;
    let player_uuid = match query.player_uuid.as_deref().filter(|v| !v.trim().is_empty()) {
        Some(raw) => Some(path_uuid("playerUuid", raw)?),
        None => None,
    };
    let record = state.lifecycle.get_by_uuid(uuid, player_uuid, &ctx).await?;
    Ok(Json(PublicTransactionView::from(&record)))
}

pub async fn add_comment(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Path(uuid): Path<String>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let uuid = path_uuid("transactionUuid", &uuid)?;
    let Json(request) = payload?;
    let input = validated(request.validate())?;
    let comment = state.lifecycle.add_comment(uuid, input, &ctx).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
