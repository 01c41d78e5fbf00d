use crate::adapters::{InMemoryStore, PgStore};
use crate::config::Config;
use crate::error::expose_internal_details;
use crate::health::{HealthState, InMemoryChecker, NamedChecker, PostgresChecker, TelegramChecker};
use crate::ports::Stores;
use crate::services::{AuthService, LocalUploader, TelegramClient};
use crate::validation::auth::CreateUserRequest;
use crate::{create_app, db, AppState};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use uuid::Uuid;

const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "payops-core")]
#[command(about = "PayOps Core - deposit and withdrawal operations service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Keep everything in memory instead of Postgres. Not allowed in production.
        #[arg(long)]
        ephemeral: bool,
    },

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Operator account commands
    #[command(subcommand)]
    Users(UserCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create an admin, agent or player account
    Create(CreateUserArgs),
}

#[derive(Args)]
pub struct CreateUserArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub password: String,
    /// admin, agent or player
    #[arg(long)]
    pub role: String,
    #[arg(long)]
    pub display_name: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
}

impl From<CreateUserArgs> for CreateUserRequest {
    fn from(args: CreateUserArgs) -> Self {
        CreateUserRequest {
            username: Some(args.username),
            email: args.email,
            password: Some(args.password),
            role: Some(args.role),
            display_name: args.display_name,
            phone: args.phone,
        }
    }
}

pub async fn handle_serve(config: Config, ephemeral: bool) -> anyhow::Result<()> {
    expose_internal_details(!config.is_production());

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("cannot create upload dir {}", config.upload_dir.display()))?;
    let uploader = Arc::new(LocalUploader::new(
        &config.upload_dir,
        &config.public_base_url,
        config.max_upload_bytes,
    ));

    let telegram = TelegramClient::new(
        config.telegram_api_url.clone(),
        config.telegram_bot_token.clone(),
    );
    if config.telegram_bot_token.is_none() {
        tracing::warn!("TELEGRAM_BOT_TOKEN not set; player messaging is disabled");
    }
    let telegram_checker = NamedChecker {
        name: "telegram",
        critical: false,
        checker: Arc::new(TelegramChecker::new(telegram.clone())),
    };

    let (stores, store_checker, seed_admin) = if ephemeral {
        if config.is_production() {
            anyhow::bail!("--ephemeral is not allowed in production");
        }
        tracing::warn!("Using the in-memory store; all data is lost on exit");
        let store = Arc::new(InMemoryStore::new());
        let checker = NamedChecker {
            name: "store",
            critical: true,
            checker: Arc::new(InMemoryChecker),
        };
        (Stores::from_backend(store), checker, true)
    } else {
        let pool = db::create_pool(&config).await?;
        db::run_migrations(&pool).await?;
        let checker = NamedChecker {
            name: "postgres",
            critical: true,
            checker: Arc::new(PostgresChecker::new(pool.clone())),
        };
        (Stores::from_backend(Arc::new(PgStore::new(pool))), checker, false)
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let state = AppState::assemble(
        config,
        stores,
        Arc::new(telegram),
        uploader,
        HealthState::new(vec![store_checker, telegram_checker]),
    );

    if seed_admin {
        seed_ephemeral_admin(&state.auth).await?;
    }

    let limits = (state.transaction_limit.clone(), state.auth_limit.clone());
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            limits.0.prune();
            limits.1.prune();
        }
    });

    let app = create_app(state);
    tracing::info!("listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// An in-memory deployment starts without accounts; create one admin so it can be used.
async fn seed_ephemeral_admin(auth: &AuthService) -> anyhow::Result<()> {
    let password = Uuid::new_v4().simple().to_string();
    let input = CreateUserRequest {
        username: Some("admin".to_string()),
        password: Some(password.clone()),
        role: Some("admin".to_string()),
        ..CreateUserRequest::default()
    }
    .validate()
    .map_err(|errors| anyhow::anyhow!("invalid seed admin: {errors:?}"))?;
    auth.create_user(input).await?;
    println!("Ephemeral admin account: username 'admin', password '{password}'");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!(%error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = db::create_pool(config).await?;
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;
    println!("Database migrations completed");
    Ok(())
}

pub async fn handle_users_create(config: &Config, args: CreateUserArgs) -> anyhow::Result<()> {
    let input = CreateUserRequest::from(args).validate().map_err(|errors| {
        let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::anyhow!("invalid user: {}", reasons.join("; "))
    })?;

    let pool = db::create_pool(config).await?;
    let auth = AuthService::new(
        Arc::new(PgStore::new(pool)),
        &config.jwt_secret,
        config.access_token_ttl_secs,
        config.refresh_token_ttl_days,
    );
    let user = auth
        .create_user(input)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("Created {} '{}' with id {}", user.role, user.username, user.id);
    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Environment: {:?}", config.app_env);
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Telegram API URL: {}", config.telegram_api_url);
    println!("  Upload Dir: {}", config.upload_dir.display());

    let pool = match db::create_pool(config).await {
        Ok(pool) => Some(pool),
        Err(e) => {
            println!("  Database: unreachable ({e})");
            None
        }
    };
    let report = crate::startup::validate_environment(config, pool.as_ref()).await;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("configuration is invalid");
    }
    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_database_password() {
        assert_eq!(
            mask_password("postgres://app:hunter2@db:5432/payops"),
            "postgres://app:****@db:5432/payops"
        );
        assert_eq!(mask_password("postgres://db/payops"), "postgres://db/payops");
    }

    #[test]
    fn parses_user_create() {
        let cli = Cli::try_parse_from([
            "payops-core",
            "users",
            "create",
            "--username",
            "ops1",
            "--password",
            "correct horse",
            "--role",
            "agent",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Users(UserCommands::Create(args))) => {
                let input = CreateUserRequest::from(args).validate().unwrap();
                assert_eq!(input.username, "ops1");
            }
            _ => panic!("expected users create"),
        }
    }

    #[test]
    fn serve_defaults_to_postgres() {
        let cli = Cli::try_parse_from(["payops-core", "serve"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve { ephemeral: false })));
    }
}
