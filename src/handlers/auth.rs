use super::validated;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::validation::auth::{ChangePasswordRequest, LoginRequest, RefreshRequest};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;

/// Routes that take credentials; the router puts these behind the auth rate limit.
pub fn credential_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/profile", get(profile))
        .route("/auth/change-password", put(change_password))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let credentials = validated(request.validate())?;
    let result = state.auth.login(credentials).await?;
    Ok(Json(json!({
        "accessToken": result.tokens.access_token,
        "refreshToken": result.tokens.refresh_token,
        "tokenType": result.tokens.token_type,
        "expiresIn": result.tokens.expires_in,
        "user": result.user,
    })))
}

pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let token = validated(request.validate())?;
    Ok(Json(state.auth.refresh(&token).await?))
}

pub async fn logout(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let token = validated(request.validate())?;
    state.auth.logout(&token).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}

pub async fn profile(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.auth.profile(&ctx).await?))
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthContext(ctx): AuthContext,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let input = validated(request.validate())?;
    state.auth.change_password(&ctx, input).await?;
    Ok(Json(json!({
        "message": "Password changed; sign in again on your other devices"
    })))
}
