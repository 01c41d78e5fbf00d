use crate::error::AppError;
use crate::middleware::client_ip::client_ip;
use axum::{
    body::Body,
    extract::State,
    http::{header::RETRY_AFTER, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

pub type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Per-client request budget for one group of routes.
#[derive(Clone)]
pub struct RateLimit {
    name: &'static str,
    limiter: Option<Arc<KeyedLimiter>>,
    trusted_proxy_depth: usize,
}

impl RateLimit {
    /// `per_minute == 0` disables the limit.
    pub fn per_minute(name: &'static str, per_minute: u32, trusted_proxy_depth: usize) -> Self {
        let limiter = NonZeroU32::new(per_minute)
            .map(|n| Arc::new(RateLimiter::keyed(Quota::per_minute(n))));
        Self {
            name,
            limiter,
            trusted_proxy_depth,
        }
    }

    /// Drops idle keys; called periodically so the key map does not grow without bound.
    pub fn prune(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.retain_recent();
        }
    }
}

pub async fn rate_limit_middleware(
    State(limit): State<RateLimit>,
    req: Request<Body>,
    next: Next<Body>,
) -> Response {
    let Some(limiter) = &limit.limiter else {
        return next.run(req).await;
    };

    let key = client_ip(req.headers(), req.extensions(), limit.trusted_proxy_depth)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match limiter.check_key(&key) {
        Ok(()) => next.run(req).await,
        Err(not_until) => {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            tracing::warn!(limiter = limit.name, client = %key, retry_after_secs = wait.as_secs(), "Rate limit exceeded");

            let mut response = AppError::RateLimited.into_response();
            if let Ok(value) = HeaderValue::from_str(&(wait.as_secs() + 1).to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Router};
    use tower::ServiceExt;

    fn app(limit: RateLimit) -> Router {
        Router::new()
            .route("/login", post(|| async { "ok" }))
            .route_layer(axum::middleware::from_fn_with_state(limit, rate_limit_middleware))
    }

    fn request() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn rejects_after_budget_is_spent() {
        let app = app(RateLimit::per_minute("auth", 2, 0));

        assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);
        assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);

        let limited = app.oneshot(request()).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().contains_key(RETRY_AFTER));
    }

    #[tokio::test]
    async fn zero_disables_the_limit() {
        let app = app(RateLimit::per_minute("auth", 0, 0));
        for _ in 0..5 {
            assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);
        }
    }
}
