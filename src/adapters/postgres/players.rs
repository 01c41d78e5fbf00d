use super::{write_audit, PgStore};
use crate::domain::audit::{AuditDraft, ENTITY_PLAYER_PROFILE};
use crate::domain::player::{NewPlayer, PlayerIdentity, PlayerProfile, PlayerUpdate};
use crate::ports::{PlayerStore, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const PLAYER_COLUMNS: &str = "id, player_uuid, user_id, channel_kind, channel_id, \
     telegram_username, language_code, last_active, created_at, updated_at";

#[async_trait]
impl PlayerStore for PgStore {
    async fn find_player_by_id(&self, id: i64) -> RepositoryResult<Option<PlayerProfile>> {
        let row = sqlx::query_as::<_, PlayerRow>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player_profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(PlayerRow::into_domain).transpose()
    }

    async fn find_player_by_uuid(&self, uuid: Uuid) -> RepositoryResult<Option<PlayerProfile>> {
        let row = sqlx::query_as::<_, PlayerRow>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player_profiles WHERE player_uuid = $1"
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(PlayerRow::into_domain).transpose()
    }

    async fn find_player_by_channel(
        &self,
        channel_id: &str,
    ) -> RepositoryResult<Option<PlayerProfile>> {
        let row = sqlx::query_as::<_, PlayerRow>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player_profiles \
             WHERE channel_kind = 'known' AND channel_id = $1"
        ))
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(PlayerRow::into_domain).transpose()
    }

    async fn find_player_by_user(&self, user_id: i64) -> RepositoryResult<Option<PlayerProfile>> {
        let row = sqlx::query_as::<_, PlayerRow>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player_profiles WHERE user_id = $1 ORDER BY id LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(PlayerRow::into_domain).transpose()
    }

    async fn insert_player(&self, new: NewPlayer) -> RepositoryResult<PlayerProfile> {
        let row = sqlx::query_as::<_, PlayerRow>(&format!(
            r#"
            INSERT INTO player_profiles (player_uuid, user_id, channel_kind, channel_id, telegram_username, language_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PLAYER_COLUMNS}
            "#
        ))
        .bind(new.player_uuid)
        .bind(new.user_id)
        .bind(new.identity.kind())
        .bind(new.identity.key())
        .bind(&new.telegram_username)
        .bind(&new.language_code)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn update_player(
        &self,
        id: i64,
        update: PlayerUpdate,
        audit: Option<AuditDraft>,
    ) -> RepositoryResult<PlayerProfile> {
        let mut db_tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let row = sqlx::query_as::<_, PlayerRow>(&format!(
            r#"
            UPDATE player_profiles
            SET telegram_username = COALESCE($2, telegram_username),
                language_code = COALESCE($3, language_code),
                channel_kind = COALESCE($4, channel_kind),
                channel_id = COALESCE($5, channel_id),
                last_active = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PLAYER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.telegram_username)
        .bind(&update.language_code)
        .bind(update.identity.as_ref().map(PlayerIdentity::kind))
        .bind(update.identity.as_ref().map(|identity| identity.key().to_string()))
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(RepositoryError::from)?
        .ok_or_else(|| RepositoryError::NotFound(format!("player {id}")))?;

        if let Some(audit) = audit {
            write_audit(&mut *db_tx, ENTITY_PLAYER_PROFILE, id, audit).await?;
        }
        db_tx.commit().await.map_err(RepositoryError::from)?;

        row.into_domain()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct PlayerRow {
    id: i64,
    player_uuid: Uuid,
    user_id: Option<i64>,
    channel_kind: String,
    channel_id: String,
    telegram_username: Option<String>,
    language_code: String,
    last_active: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PlayerRow {
    fn into_domain(self) -> RepositoryResult<PlayerProfile> {
        let identity = PlayerIdentity::from_parts(&self.channel_kind, self.channel_id).ok_or_else(
            || RepositoryError::Storage(format!("player {}: unknown channel kind", self.id)),
        )?;

        Ok(PlayerProfile {
            id: self.id,
            player_uuid: self.player_uuid,
            user_id: self.user_id,
            identity,
            telegram_username: self.telegram_username,
            language_code: self.language_code,
            last_active: self.last_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
