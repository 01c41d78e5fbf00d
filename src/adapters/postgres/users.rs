use super::PgStore;
use crate::domain::user::{NewUser, RefreshToken, User};
use crate::domain::Role;
use crate::ports::{RepositoryError, RepositoryResult, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::str::FromStr;

const USER_SELECT: &str = r#"
    SELECT u.id, u.username, u.email, u.password_hash, r.name AS role, u.display_name,
           u.phone, u.is_active, u.created_at, u.updated_at
    FROM users u
    JOIN roles r ON r.id = u.role_id
"#;

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, id: i64) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(UserRow::into_domain).transpose()
    }

    async fn find_user_by_login(&self, login: &str) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "{USER_SELECT} WHERE u.username = $1 OR u.email = $1 OR u.phone = $1 ORDER BY u.id LIMIT 1"
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(UserRow::into_domain).transpose()
    }

    async fn users_with_role(&self, role: Role, active_only: bool) -> RepositoryResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "{USER_SELECT} WHERE r.name = $1 AND ($2 = FALSE OR u.is_active) ORDER BY u.username"
        ))
        .bind(role.as_str())
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        rows.into_iter().map(UserRow::into_domain).collect()
    }

    async fn insert_user(&self, new: NewUser) -> RepositoryResult<User> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, email, password_hash, role_id, display_name, phone)
            VALUES ($1, $2, $3, (SELECT id FROM roles WHERE name = $4), $5, $6)
            RETURNING id
            "#,
        )
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(&new.display_name)
        .bind(&new.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        self.find_user(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("user {id}")))
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()> {
        let updated = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn store_refresh_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn find_refresh_token(&self, token_hash: &str) -> RepositoryResult<Option<RefreshToken>> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT user_id, token_hash, expires_at, revoked FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(|r| RefreshToken {
            user_id: r.user_id,
            token_hash: r.token_hash,
            expires_at: r.expires_at,
            revoked: r.revoked,
        }))
    }

    async fn revoke_refresh_token(&self, token_hash: &str) -> RepositoryResult<bool> {
        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE token_hash = $1 AND revoked = FALSE",
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(revoked.rows_affected() > 0)
    }

    async fn revoke_user_tokens(&self, user_id: i64) -> RepositoryResult<u64> {
        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(revoked.rows_affected())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: Option<String>,
    password_hash: String,
    role: String,
    display_name: Option<String>,
    phone: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_domain(self) -> RepositoryResult<User> {
        let role = Role::from_str(&self.role).map_err(RepositoryError::Storage)?;
        Ok(User {
            id: self.id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            role,
            display_name: self.display_name,
            phone: self.phone,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RefreshTokenRow {
    user_id: i64,
    token_hash: String,
    expires_at: DateTime<Utc>,
    revoked: bool,
}
