use crate::config::{Config, LogFormat};
use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "payops_core=debug,tower_http=debug";

pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

pub struct ValidationReport {
    pub environment: bool,
    pub database: Option<bool>,
    pub messaging: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database.unwrap_or(true)
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        match self.database {
            Some(ok) => println!("Database Connectivity: {}", status(ok)),
            None => println!("Database Connectivity: skipped"),
        }
        println!(
            "Telegram Messaging:    {}",
            if self.messaging { "configured" } else { "not configured" }
        );

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  - {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "PASS" } else { "FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "OK" } else { "FAIL" }
}

/// Checks the configuration and, when a pool is given, that the database is reachable and
/// migrated.
pub async fn validate_environment(config: &Config, pool: Option<&PgPool>) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        database: None,
        messaging: config.telegram_bot_token.is_some(),
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Some(pool) = pool {
        let result = validate_database(pool).await;
        report.database = Some(result.is_ok());
        if let Err(e) = result {
            report.errors.push(format!("Database: {:#}", e));
        }
    }

    report
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.jwt_secret.len() < 32 && config.is_production() {
        anyhow::bail!("JWT_SECRET must be at least 32 characters in production");
    }
    if config.access_token_ttl_secs <= 0 || config.refresh_token_ttl_days <= 0 {
        anyhow::bail!("token lifetimes must be positive");
    }
    if config.max_upload_bytes == 0 {
        anyhow::bail!("MAX_UPLOAD_BYTES must be greater than 0");
    }

    url::Url::parse(&config.database_url).context("DATABASE_URL is not a valid URL")?;
    url::Url::parse(&config.telegram_api_url).context("TELEGRAM_API_URL is not a valid URL")?;
    url::Url::parse(&config.public_base_url).context("PUBLIC_BASE_URL is not a valid URL")?;

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppEnv;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_env_vars(&Config::default()).is_ok());
    }

    #[test]
    fn test_short_secret_rejected_in_production() {
        let config = Config {
            app_env: AppEnv::Production,
            jwt_secret: "short".to_string(),
            ..Config::default()
        };
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_invalid_public_url() {
        let config = Config {
            public_base_url: "not-a-url".to_string(),
            ..Config::default()
        };
        assert!(validate_env_vars(&config).is_err());
    }

    #[tokio::test]
    async fn test_report_without_database() {
        let report = validate_environment(&Config::default(), None).await;
        assert!(report.is_valid());
        assert_eq!(report.database, None);
        assert!(!report.messaging);
    }
}
