pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod schemas;
pub mod services;
pub mod startup;
pub mod utils;
pub mod validation;

use crate::config::Config;
use crate::health::HealthState;
use crate::middleware::auth::{require_admin_layer, require_staff_layer};
use crate::middleware::rate_limit::{rate_limit_middleware, RateLimit};
use crate::middleware::request_logger::{request_logger_middleware, RequestLogConfig};
use crate::ports::{Messenger, Stores, Uploader};
use crate::services::{
    AuthService, CatalogService, Fanout, PlayerService, RealtimeHub, TransactionLifecycle,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

/// Room left for multipart boundaries and text fields next to the largest allowed file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: TransactionLifecycle,
    pub players: PlayerService,
    pub catalog: CatalogService,
    pub auth: AuthService,
    pub hub: RealtimeHub,
    pub uploader: Arc<dyn Uploader>,
    pub health: HealthState,
    pub transaction_limit: RateLimit,
    pub auth_limit: RateLimit,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the services around one set of stores and collaborators.
    pub fn assemble(
        config: Config,
        stores: Stores,
        messenger: Arc<dyn Messenger>,
        uploader: Arc<dyn Uploader>,
        health: HealthState,
    ) -> Self {
        let hub = RealtimeHub::default();
        let fanout = Fanout::new(Arc::new(hub.clone()), messenger);

        Self {
            lifecycle: TransactionLifecycle::new(&stores, uploader.clone(), fanout),
            players: PlayerService::new(stores.players.clone()),
            catalog: CatalogService::new(stores.catalog.clone()),
            auth: AuthService::new(
                stores.users.clone(),
                &config.jwt_secret,
                config.access_token_ttl_secs,
                config.refresh_token_ttl_days,
            ),
            hub,
            uploader,
            health,
            transaction_limit: RateLimit::per_minute(
                "transactions",
                config.transaction_rate_per_minute,
                config.trusted_proxy_depth,
            ),
            auth_limit: RateLimit::per_minute(
                "auth",
                config.auth_rate_per_minute,
                config.trusted_proxy_depth,
            ),
            config: Arc::new(config),
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if config.cors_allowed_origins.is_empty() {
        if config.is_production() {
            return layer;
        }
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let api = Router::new()
        .merge(
            handlers::auth::credential_routes()
                .route_layer(from_fn_with_state(state.auth_limit.clone(), rate_limit_middleware)),
        )
        .merge(handlers::auth::routes())
        .merge(handlers::config::routes())
        .merge(handlers::players::routes())
        .merge(
            handlers::transactions::create_routes().route_layer(from_fn_with_state(
                state.transaction_limit.clone(),
                rate_limit_middleware,
            )),
        )
        .merge(handlers::transactions::routes())
        .merge(
            handlers::admin::routes()
                .route_layer(from_fn_with_state(state.clone(), require_admin_layer)),
        )
        .merge(
            handlers::agent::routes()
                .route_layer(from_fn_with_state(state.clone(), require_staff_layer)),
        );

    Router::new()
        .nest("/api/v1", api)
        .route("/ws", get(handlers::ws::ws_handler))
        .route("/health", get(handlers::health))
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes + MULTIPART_OVERHEAD))
        .layer(from_fn_with_state(
            RequestLogConfig {
                log_body: config.log_request_body,
            },
            request_logger_middleware,
        ))
        .layer(cors_layer(&config))
        .with_state(state)
}
