use super::{path_id, read_multipart, validated};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::schemas::TransactionView;
use crate::validation::transaction::{ListQuery, ProcessRequest};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

pub const EVIDENCE_FIELD: &str = "file";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/agent/tasks", get(tasks))
        .route("/agent/transactions/:id/process", put(process))
        .route("/agent/evidence", post(upload_evidence))
}

pub async fn tasks(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (filter, page) = validated(query.validate())?;
    let result = state.lifecycle.agent_tasks(filter, page, &ctx).await?;
    Ok(Json(result.map(TransactionView::from)))
}

pub async fn process(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id)?;
    let Json(request) = payload?;
    let input = validated(request.validate())?;
    let record = state.lifecycle.process(id, input, &ctx).await?;
    Ok(Json(TransactionView::from(record)))
}

/// Stores an evidence image and returns its URL for a following process call.
pub async fn upload_evidence(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    multipart: Result<Multipart, axum::extract::multipart::MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let form = read_multipart(multipart?, EVIDENCE_FIELD).await?;
    let file = form
        .file
        .ok_or_else(|| AppError::validation("file", "is required"))?;
    let stored = state.uploader.upload(file).await?;
    tracing::info!(
        actor_id = ?ctx.user_id(),
        stored_name = %stored.stored_name,
        size = stored.size,
        "Evidence uploaded"
    );
    Ok((StatusCode::CREATED, Json(stored)))
}
