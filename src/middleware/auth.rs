//! Request extractors that turn the bearer token and peer address into a `RequestContext`.

use crate::domain::actor::{RequestContext, Role};
use crate::error::AppError;
use crate::middleware::client_ip::client_ip;
use crate::services::access::require_role;
use crate::AppState;
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("malformed authorization header".to_string()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(Some(token.trim()))
        }
        _ => Err(AppError::Unauthorized(
            "authorization header must be 'Bearer <token>'".to_string(),
        )),
    }
}

fn ip_of(parts: &Parts, state: &AppState) -> Option<String> {
    client_ip(&parts.headers, &parts.extensions, state.config.trusted_proxy_depth)
        .map(|ip| ip.to_string())
}

/// Requires a valid access token.
pub struct AuthContext(pub RequestContext);

#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<RequestContext>() {
            return Ok(AuthContext(ctx.clone()));
        }
        let token = bearer_token(parts)?
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;
        let actor = state.auth.authenticate(token).await?;
        Ok(AuthContext(RequestContext::for_actor(actor, ip_of(parts, state))))
    }
}

/// Accepts anonymous callers, but a token that is present must be valid.
pub struct MaybeAuthContext(pub RequestContext);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ip = ip_of(parts, state);
        match bearer_token(parts)? {
            Some(token) => {
                let actor = state.auth.authenticate(token).await?;
                Ok(MaybeAuthContext(RequestContext::for_actor(actor, ip)))
            }
            None => Ok(MaybeAuthContext(RequestContext::anonymous(ip))),
        }
    }
}

async fn guard(
    state: &AppState,
    request: Request<Body>,
    next: Next<Body>,
    roles: &[Role],
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    let AuthContext(ctx) = AuthContext::from_request_parts(&mut parts, state).await?;
    require_role(&ctx, roles)?;
    parts.extensions.insert(ctx);
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Route layer for the `/admin` surface.
pub async fn require_admin_layer(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    guard(&state, request, next, &[Role::Admin]).await
}

/// Route layer for the `/agent` surface. Ownership of individual transactions is checked by the
/// lifecycle engine.
pub async fn require_staff_layer(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    guard(&state, request, next, &[Role::Agent, Role::Admin]).await
}
