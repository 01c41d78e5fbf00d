//! Player identity.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub const PLACEHOLDER_PREFIX: &str = "tmp_";

/// How a player can be reached on the messaging channel.
///
/// A `Placeholder` is stamped on profiles created before the player has a durable channel
/// identity. It is never messaged and can be reconciled exactly once into a `Known` identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum PlayerIdentity {
    Known(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("player is already linked to channel identity '{0}'")]
    AlreadyKnown(String),

    #[error("channel identity must not be empty")]
    EmptyChannelId,

    #[error("channel identity must not use the reserved '{PLACEHOLDER_PREFIX}' prefix")]
    ReservedPrefix,
}

impl PlayerIdentity {
    pub fn placeholder() -> Self {
        PlayerIdentity::Placeholder(format!("{}{}", PLACEHOLDER_PREFIX, Uuid::new_v4().simple()))
    }

    /// Channel id the messenger may deliver to.
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            PlayerIdentity::Known(id) => Some(id),
            PlayerIdentity::Placeholder(_) => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, PlayerIdentity::Placeholder(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PlayerIdentity::Known(_) => "known",
            PlayerIdentity::Placeholder(_) => "placeholder",
        }
    }

    /// Raw key as persisted in the unique channel column.
    pub fn key(&self) -> &str {
        match self {
            PlayerIdentity::Known(id) | PlayerIdentity::Placeholder(id) => id,
        }
    }

    pub fn from_parts(kind: &str, key: String) -> Option<Self> {
        match kind {
            "known" => Some(PlayerIdentity::Known(key)),
            "placeholder" => Some(PlayerIdentity::Placeholder(key)),
            _ => None,
        }
    }

    pub fn known(channel_id: &str) -> Result<Self, ReconcileError> {
        let channel_id = channel_id.trim();
        if channel_id.is_empty() {
            return Err(ReconcileError::EmptyChannelId);
        }
        if channel_id.starts_with(PLACEHOLDER_PREFIX) {
            return Err(ReconcileError::ReservedPrefix);
        }
        Ok(PlayerIdentity::Known(channel_id.to_string()))
    }

    /// Placeholder -> Known. Re-linking to the same channel is a no-op, any other change is refused.
    pub fn reconcile(&self, channel_id: &str) -> Result<Self, ReconcileError> {
        let target = Self::known(channel_id)?;
        match self {
            PlayerIdentity::Placeholder(_) => Ok(target),
            PlayerIdentity::Known(current) if Some(current.as_str()) == target.channel_id() => {
                Ok(target)
            }
            PlayerIdentity::Known(current) => Err(ReconcileError::AlreadyKnown(current.clone())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub id: i64,
    pub player_uuid: Uuid,
    pub user_id: Option<i64>,
    pub identity: PlayerIdentity,
    pub telegram_username: Option<String>,
    pub language_code: String,
    pub last_active: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub player_uuid: Uuid,
    pub user_id: Option<i64>,
    pub identity: PlayerIdentity,
    pub telegram_username: Option<String>,
    pub language_code: String,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerUpdate {
    pub telegram_username: Option<String>,
    pub language_code: Option<String>,
    pub identity: Option<PlayerIdentity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_unique_and_not_messageable() {
        let a = PlayerIdentity::placeholder();
        let b = PlayerIdentity::placeholder();
        assert_ne!(a, b);
        assert!(a.key().starts_with(PLACEHOLDER_PREFIX));
        assert_eq!(a.channel_id(), None);
    }

    #[test]
    fn reconciles_placeholder_once() {
        let placeholder = PlayerIdentity::placeholder();
        let known = placeholder.reconcile("123456").unwrap();
        assert_eq!(known.channel_id(), Some("123456"));

        assert_eq!(known.reconcile("123456"), Ok(known.clone()));
        assert_eq!(
            known.reconcile("999"),
            Err(ReconcileError::AlreadyKnown("123456".into()))
        );
    }

    #[test]
    fn rejects_reserved_or_empty_channel_ids() {
        let placeholder = PlayerIdentity::placeholder();
        assert_eq!(
            placeholder.reconcile("  "),
            Err(ReconcileError::EmptyChannelId)
        );
        assert_eq!(
            placeholder.reconcile("tmp_abc"),
            Err(ReconcileError::ReservedPrefix)
        );
    }

    #[test]
    fn storage_parts_round_trip() {
        let known = PlayerIdentity::Known("42".into());
        assert_eq!(
            PlayerIdentity::from_parts(known.kind(), known.key().to_string()),
            Some(known)
        );
        assert_eq!(PlayerIdentity::from_parts("other", "x".into()), None);
    }
}
