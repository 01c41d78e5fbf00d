use crate::ports::{MessageDetails, MessagePhase, Messenger};
use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram bot token is not configured")]
    NotConfigured,
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Telegram API rejected the message ({status}): {description}")]
    Rejected { status: u16, description: String },
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Telegram Bot API client used as the outbound messaging channel.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_url: String,
    token: Option<String>,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl TelegramClient {
    pub fn new(api_url: String, token: Option<String>) -> Self {
        Self::with_circuit_breaker(api_url, token, 3, 60)
    }

    pub fn with_circuit_breaker(
        api_url: String,
        token: Option<String>,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        TelegramClient {
            client,
            api_url,
            token: token.filter(|t| !t.trim().is_empty()),
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TelegramError> {
        let token = self.token.as_deref().ok_or(TelegramError::NotConfigured)?;
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_url.trim_end_matches('/'),
            token
        );
        let client = self.client.clone();
        let payload = serde_json::json!(SendMessage { chat_id, text });

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&url).json(&payload).send().await?;
                let status = response.status();
                let body = response.json::<ApiResponse>().await.ok();

                match body {
                    Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
                    other => Err(TelegramError::Rejected {
                        status: status.as_u16(),
                        description: other
                            .and_then(|b| b.description)
                            .unwrap_or_else(|| "no description".to_string()),
                    }),
                }
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(FailsafeError::Rejected) => Err(TelegramError::CircuitBreakerOpen(
                "Telegram API circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

/// Body of the player-facing message for each lifecycle phase.
pub fn render_message(transaction_uuid: Uuid, phase: MessagePhase, details: &MessageDetails) -> String {
    let status = details.status_label.as_deref().unwrap_or("Unknown");
    let mut lines = match phase {
        MessagePhase::Created => vec![
            "Your transaction request has been received.".to_string(),
            format!("ID: {transaction_uuid}"),
            format!(
                "Type: {}",
                details
                    .tx_type
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_else(|| "-".to_string())
            ),
            format!(
                "Amount: {} {}",
                details.amount.as_deref().unwrap_or("-"),
                details.currency.as_deref().unwrap_or("")
            )
            .trim_end()
            .to_string(),
            format!("Status: {status}"),
        ],
        MessagePhase::Processed => vec![
            "Your transaction has been processed.".to_string(),
            format!("ID: {transaction_uuid}"),
            format!("Status: {status}"),
        ],
        MessagePhase::Updated => vec![
            "Your transaction has been updated.".to_string(),
            format!("ID: {transaction_uuid}"),
            format!("Status: {status}"),
        ],
    };

    if phase != MessagePhase::Created {
        if let Some(notes) = details.notes.as_deref().filter(|n| !n.is_empty()) {
            lines.push(format!("Notes: {notes}"));
        }
    }

    lines.join("\n")
}

#[async_trait]
impl Messenger for TelegramClient {
    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    async fn send_transaction_notification(
        &self,
        recipient_channel_id: &str,
        transaction_uuid: Uuid,
        phase: MessagePhase,
        details: &MessageDetails,
    ) -> bool {
        if !self.is_configured() {
            tracing::debug!(%transaction_uuid, ?phase, "Telegram not configured, skipping message");
            return false;
        }

        let text = render_message(transaction_uuid, phase, details);
        match self.send_message(recipient_channel_id, &text).await {
            Ok(()) => {
                tracing::info!(%transaction_uuid, ?phase, "Telegram notification sent");
                true
            }
            Err(e) => {
                tracing::warn!(%transaction_uuid, ?phase, error = %e, "Telegram notification failed");
                false
            }
        }
    }
}
