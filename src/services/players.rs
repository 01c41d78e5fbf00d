use crate::domain::audit::{AuditAction, AuditDraft};
use crate::domain::player::{NewPlayer, PlayerIdentity, PlayerProfile, PlayerUpdate, ReconcileError};
use crate::domain::RequestContext;
use crate::error::AppError;
use crate::ports::{PlayerStore, RepositoryError};
use crate::validation::player::{Reconcile, RegisterPlayer, DEFAULT_LANGUAGE};
use crate::validation::transaction::PlayerRef;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct PlayerService {
    players: Arc<dyn PlayerStore>,
}

fn identity_snapshot(identity: &PlayerIdentity) -> serde_json::Value {
    json!({ "kind": identity.kind(), "value": identity.key() })
}

impl PlayerService {
    pub fn new(players: Arc<dyn PlayerStore>) -> Self {
        Self { players }
    }

    pub async fn register(
        &self,
        input: RegisterPlayer,
        ctx: &RequestContext,
    ) -> Result<PlayerProfile, AppError> {
        if let Some(channel_id) = input.identity.as_ref().and_then(|i| i.channel_id()) {
            if self.players.find_player_by_channel(channel_id).await?.is_some() {
                return Err(AppError::Conflict(
                    "a player with this telegramId already exists".to_string(),
                ));
            }
        }

        let profile = self
            .players
            .insert_player(NewPlayer {
                player_uuid: Uuid::new_v4(),
                user_id: ctx.user_id(),
                identity: input.identity.unwrap_or_else(PlayerIdentity::placeholder),
                telegram_username: input.telegram_username,
                language_code: input.language_code,
            })
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict(_) => AppError::Conflict(
                    "a player with this telegramId already exists".to_string(),
                ),
                other => other.into(),
            })?;

        tracing::info!(
            player_id = profile.id,
            player_uuid = %profile.player_uuid,
            identity = profile.identity.kind(),
            "Player profile created"
        );
        Ok(profile)
    }

    pub async fn get(&self, player_uuid: Uuid) -> Result<PlayerProfile, AppError> {
        self.players
            .find_player_by_uuid(player_uuid)
            .await?
            .ok_or_else(|| AppError::NotFound("Player profile".to_string()))
    }

    pub async fn update(
        &self,
        player_uuid: Uuid,
        update: PlayerUpdate,
    ) -> Result<PlayerProfile, AppError> {
        let profile = self.get(player_uuid).await?;
        let updated = self.players.update_player(profile.id, update, None).await?;
        tracing::debug!(player_id = updated.id, "Player profile updated");
        Ok(updated)
    }

    /// Links a placeholder profile to its durable channel identity.
    pub async fn reconcile(
        &self,
        player_uuid: Uuid,
        input: Reconcile,
        ctx: &RequestContext,
    ) -> Result<PlayerProfile, AppError> {
        let profile = self.get(player_uuid).await?;
        let identity = profile
            .identity
            .reconcile(&input.channel_id)
            .map_err(|err| match err {
                ReconcileError::AlreadyKnown(_) => AppError::Conflict(err.to_string()),
                other => AppError::validation("telegramId", other.to_string()),
            })?;

        if identity == profile.identity {
            return Ok(profile);
        }

        if let Some(owner) = self.players.find_player_by_channel(&input.channel_id).await? {
            if owner.id != profile.id {
                return Err(AppError::Conflict(
                    "telegramId is linked to another player".to_string(),
                ));
            }
        }

        let audit = AuditDraft::new(AuditAction::Reconciled, ctx.user_id(), ctx.ip_address.clone())
            .old(identity_snapshot(&profile.identity))
            .new_value(identity_snapshot(&identity));
        let updated = self
            .players
            .update_player(
                profile.id,
                PlayerUpdate {
                    telegram_username: input.telegram_username,
                    language_code: None,
                    identity: Some(identity),
                },
                Some(audit),
            )
            .await?;

        tracing::info!(player_id = updated.id, "Player identity reconciled");
        Ok(updated)
    }

    /// Finds the profile a new transaction belongs to, creating one when the requester has no
    /// durable identity yet.
    pub async fn resolve_for_transaction(
        &self,
        player: &PlayerRef,
        ctx: &RequestContext,
    ) -> Result<PlayerProfile, AppError> {
        match player {
            PlayerRef::Uuid(uuid) => self.get(*uuid).await,
            PlayerRef::Channel {
                channel_id,
                username,
            } => {
                if let Some(existing) = self.players.find_player_by_channel(channel_id).await? {
                    return Ok(existing);
                }
                let identity = PlayerIdentity::known(channel_id)
                    .map_err(|err| AppError::validation("telegramId", err.to_string()))?;
                self.create_for_transaction(identity, username.clone(), ctx).await
            }
            PlayerRef::Unidentified => {
                if let Some(user_id) = ctx.user_id() {
                    if let Some(existing) = self.players.find_player_by_user(user_id).await? {
                        return Ok(existing);
                    }
                }
                self.create_for_transaction(PlayerIdentity::placeholder(), None, ctx)
                    .await
            }
        }
    }

    async fn create_for_transaction(
        &self,
        identity: PlayerIdentity,
        telegram_username: Option<String>,
        ctx: &RequestContext,
    ) -> Result<PlayerProfile, AppError> {
        let profile = self
            .players
            .insert_player(NewPlayer {
                player_uuid: Uuid::new_v4(),
                user_id: ctx.user_id(),
                identity,
                telegram_username,
                language_code: DEFAULT_LANGUAGE.to_string(),
            })
            .await?;
        tracing::info!(
            player_id = profile.id,
            identity = profile.identity.kind(),
            "Player profile created for transaction"
        );
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;

    fn service() -> PlayerService {
        PlayerService::new(Arc::new(InMemoryStore::new()))
    }

    fn register(channel: Option<&str>) -> RegisterPlayer {
        RegisterPlayer {
            identity: channel.map(|c| PlayerIdentity::Known(c.to_string())),
            telegram_username: Some("punter".into()),
            language_code: "en".into(),
        }
    }

    #[tokio::test]
    async fn duplicate_channel_is_conflict() {
        let players = service();
        let ctx = RequestContext::default();
        players.register(register(Some("42")), &ctx).await.unwrap();
        let err = players.register(register(Some("42")), &ctx).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn reconcile_placeholder_once() {
        let players = service();
        let ctx = RequestContext::default();
        let profile = players.register(register(None), &ctx).await.unwrap();
        assert!(profile.identity.is_placeholder());

        let reconciled = players
            .reconcile(
                profile.player_uuid,
                Reconcile {
                    channel_id: "555".into(),
                    telegram_username: None,
                },
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(reconciled.identity.channel_id(), Some("555"));

        let err = players
            .reconcile(
                profile.player_uuid,
                Reconcile {
                    channel_id: "556".into(),
                    telegram_username: None,
                },
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn reconcile_refuses_channel_owned_by_another_player() {
        let players = service();
        let ctx = RequestContext::default();
        players.register(register(Some("777")), &ctx).await.unwrap();
        let placeholder = players.register(register(None), &ctx).await.unwrap();

        let err = players
            .reconcile(
                placeholder.player_uuid,
                Reconcile {
                    channel_id: "777".into(),
                    telegram_username: None,
                },
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn resolve_unknown_uuid_is_not_found() {
        let players = service();
        let err = players
            .resolve_for_transaction(&PlayerRef::Uuid(Uuid::new_v4()), &RequestContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn resolve_channel_reuses_existing_profile() {
        let players = service();
        let ctx = RequestContext::default();
        let channel = PlayerRef::Channel {
            channel_id: "9001".into(),
            username: None,
        };
        let first = players.resolve_for_transaction(&channel, &ctx).await.unwrap();
        let second = players.resolve_for_transaction(&channel, &ctx).await.unwrap();
        assert_eq!(first.id, second.id);

        let anon = players
            .resolve_for_transaction(&PlayerRef::Unidentified, &ctx)
            .await
            .unwrap();
        assert!(anon.identity.is_placeholder());
    }
}
