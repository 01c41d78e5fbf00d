use crate::services::TelegramClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(started: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl Into<String>) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.into(),
        }
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e.to_string()),
        }
    }
}

/// Reports the Telegram circuit breaker; an unconfigured bot is not a failure.
pub struct TelegramChecker {
    client: TelegramClient,
}

impl TelegramChecker {
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DependencyChecker for TelegramChecker {
    async fn check(&self) -> DependencyStatus {
        use crate::ports::Messenger;

        let start = Instant::now();
        if !self.client.is_configured() {
            return DependencyStatus::Healthy {
                status: "unconfigured".to_string(),
                latency_ms: 0,
            };
        }
        match self.client.circuit_state().as_str() {
            "closed" => DependencyStatus::healthy(start),
            state => DependencyStatus::unhealthy(format!("circuit breaker {state}")),
        }
    }
}

/// The in-process store used by ephemeral deployments is always reachable.
pub struct InMemoryChecker;

#[async_trait]
impl DependencyChecker for InMemoryChecker {
    async fn check(&self) -> DependencyStatus {
        DependencyStatus::healthy(Instant::now())
    }
}

#[derive(Clone)]
pub struct NamedChecker {
    pub name: &'static str,
    pub critical: bool,
    pub checker: Arc<dyn DependencyChecker>,
}

#[derive(Clone)]
pub struct HealthState {
    pub checkers: Vec<NamedChecker>,
    pub started_at: Instant,
}

impl HealthState {
    pub fn new(checkers: Vec<NamedChecker>) -> Self {
        Self {
            checkers,
            started_at: Instant::now(),
        }
    }
}

pub async fn check_health(state: &HealthState) -> HealthResponse {
    let results = futures::future::join_all(state.checkers.iter().map(|named| async move {
        let status = timeout(CHECK_TIMEOUT, named.checker.check())
            .await
            .unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));
        (named, status)
    }))
    .await;

    let mut critical_failure = false;
    let mut non_critical_failure = false;
    let mut dependencies = HashMap::new();
    for (named, status) in results {
        if matches!(status, DependencyStatus::Unhealthy { .. }) {
            if named.critical {
                critical_failure = true;
            } else {
                non_critical_failure = true;
            }
        }
        dependencies.insert(named.name.to_string(), status);
    }

    HealthResponse {
        status: overall_status(critical_failure, non_critical_failure).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        dependencies,
    }
}

fn overall_status(critical_failure: bool, non_critical_failure: bool) -> &'static str {
    if critical_failure {
        "unhealthy"
    } else if non_critical_failure {
        "degraded"
    } else {
        "healthy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl DependencyChecker for Failing {
        async fn check(&self) -> DependencyStatus {
            DependencyStatus::unhealthy("connection refused")
        }
    }

    fn named(name: &'static str, critical: bool, checker: Arc<dyn DependencyChecker>) -> NamedChecker {
        NamedChecker {
            name,
            critical,
            checker,
        }
    }

    #[tokio::test]
    async fn non_critical_failure_degrades() {
        let state = HealthState::new(vec![
            named("store", true, Arc::new(InMemoryChecker)),
            named("telegram", false, Arc::new(Failing)),
        ]);
        let health = check_health(&state).await;
        assert_eq!(health.status, "degraded");
        assert_eq!(health.dependencies.len(), 2);
    }

    #[tokio::test]
    async fn critical_failure_is_unhealthy() {
        let state = HealthState::new(vec![named("postgres", true, Arc::new(Failing))]);
        assert_eq!(check_health(&state).await.status, "unhealthy");
    }

    #[tokio::test]
    async fn unconfigured_telegram_is_healthy() {
        let client = TelegramClient::new("http://127.0.0.1:9".into(), None);
        let status = TelegramChecker::new(client).check().await;
        assert!(matches!(status, DependencyStatus::Healthy { ref status, .. } if status == "unconfigured"));
    }
}
