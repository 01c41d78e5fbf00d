use super::{
    optional_text, validate_language_code, Collector, FieldValue, ValidationError,
    USERNAME_MAX_LEN,
};
use crate::domain::player::{PlayerIdentity, PlayerUpdate, ReconcileError};
use serde::Deserialize;

pub const DEFAULT_LANGUAGE: &str = "en";

fn channel_identity(
    field: &'static str,
    value: &FieldValue,
) -> Result<PlayerIdentity, ValidationError> {
    PlayerIdentity::known(&value.as_text()).map_err(|err| match err {
        ReconcileError::EmptyChannelId => ValidationError::new(field, "must not be empty"),
        other => ValidationError::new(field, other.to_string()),
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPlayerRequest {
    pub telegram_id: Option<FieldValue>,
    pub telegram_username: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterPlayer {
    /// `None` registers the player under a placeholder identity.
    pub identity: Option<PlayerIdentity>,
    pub telegram_username: Option<String>,
    pub language_code: String,
}

impl RegisterPlayerRequest {
    pub fn validate(&self) -> Result<RegisterPlayer, Vec<ValidationError>> {
        let mut errors = Collector::default();
        let identity = match self.telegram_id.as_ref().filter(|v| !v.as_text().is_empty()) {
            Some(value) => errors.check(channel_identity("telegramId", value)),
            None => None,
        };
        let telegram_username = errors
            .check(optional_text(
                "telegramUsername",
                self.telegram_username.as_deref(),
                USERNAME_MAX_LEN,
            ))
            .flatten();
        let language_code = match self.language_code.as_deref().filter(|v| !v.trim().is_empty()) {
            Some(code) => errors.check(validate_language_code("languageCode", code)),
            None => Some(DEFAULT_LANGUAGE.to_string()),
        };
        errors.finish()?;

        Ok(RegisterPlayer {
            identity,
            telegram_username,
            language_code: language_code.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlayerRequest {
    pub telegram_username: Option<String>,
    pub language_code: Option<String>,
}

impl UpdatePlayerRequest {
    pub fn validate(&self) -> Result<PlayerUpdate, Vec<ValidationError>> {
        let mut errors = Collector::default();
        let telegram_username = errors
            .check(optional_text(
                "telegramUsername",
                self.telegram_username.as_deref(),
                USERNAME_MAX_LEN,
            ))
            .flatten();
        let language_code = match self.language_code.as_deref() {
            Some(code) => errors.check(validate_language_code("languageCode", code)),
            None => None,
        };
        errors.finish()?;

        Ok(PlayerUpdate {
            telegram_username,
            language_code,
            identity: None,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    pub telegram_id: Option<FieldValue>,
    pub telegram_username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconcile {
    pub channel_id: String,
    pub telegram_username: Option<String>,
}

impl ReconcileRequest {
    pub fn validate(&self) -> Result<Reconcile, Vec<ValidationError>> {
        let mut errors = Collector::default();
        let identity = match &self.telegram_id {
            Some(value) => errors.check(channel_identity("telegramId", value)),
            None => {
                errors.push("telegramId", "is required");
                None
            }
        };
        let telegram_username = errors
            .check(optional_text(
                "telegramUsername",
                self.telegram_username.as_deref(),
                USERNAME_MAX_LEN,
            ))
            .flatten();
        errors.finish()?;

        match identity.as_ref().and_then(|i| i.channel_id()) {
            Some(channel_id) => Ok(Reconcile {
                channel_id: channel_id.to_string(),
                telegram_username,
            }),
            None => Err(vec![ValidationError::new("telegramId", "is required")]),
        }
    }
}
