//! Credential checks and session tokens.
//!
//! Access tokens are HS256 JWTs. Refresh tokens are opaque random strings; only their
//! HMAC-SHA256 digest is stored, and every refresh rotates them.

use crate::domain::actor::{Actor, RequestContext, Role};
use crate::domain::user::{NewUser, User};
use crate::error::AppError;
use crate::ports::{RepositoryError, UserStore};
use crate::services::access::require_actor;
use crate::validation::auth::{ChangePassword, CreateUser, Credentials};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

const REFRESH_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub tokens: TokenPair,
    pub user: User,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    secret: Arc<String>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("invalid credentials".to_string())
}

pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
    })
    .await
    .map_err(|e| AppError::Internal(format!("password hashing task failed: {e}")))?
}

pub async fn verify_password(password: &str, stored_hash: &str) -> bool {
    let password = password.to_string();
    let stored_hash = stored_hash.to_string();
    tokio::task::spawn_blocking(move || match PasswordHash::new(&stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await
    .unwrap_or(false)
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        secret: &str,
        access_ttl_secs: i64,
        refresh_ttl_days: i64,
    ) -> Self {
        Self {
            users,
            secret: Arc::new(secret.to_string()),
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::days(refresh_ttl_days),
        }
    }

    pub fn issue_access_token(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::Unauthorized("token expired".to_string())
            }
            _ => AppError::Unauthorized("invalid token".to_string()),
        })
    }

    /// Resolves a bearer token to the current state of its user; deactivated accounts are
    /// locked out even while their token is still unexpired.
    pub async fn authenticate(&self, token: &str) -> Result<Actor, AppError> {
        let claims = self.verify_access_token(token)?;
        let user = self
            .users
            .find_user(claims.sub)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| AppError::Unauthorized("account is not active".to_string()))?;
        Ok(user.actor())
    }

    fn digest(&self, refresh_token: &str) -> Result<String, AppError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("invalid token secret: {e}")))?;
        mac.update(refresh_token.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn issue_pair(&self, user: &User) -> Result<TokenPair, AppError> {
        let access_token = self.issue_access_token(user)?;

        let mut raw = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.fill_bytes(&mut raw);
        let refresh_token = hex::encode(raw);

        self.users
            .store_refresh_token(
                user.id,
                &self.digest(&refresh_token)?,
                Utc::now() + self.refresh_ttl,
            )
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    pub async fn login(&self, credentials: Credentials) -> Result<LoginResult, AppError> {
        let user = self
            .users
            .find_user_by_login(&credentials.login)
            .await?
            .ok_or_else(invalid_credentials)?;

        if !verify_password(&credentials.password, &user.password_hash).await {
            tracing::warn!(user_id = user.id, "Login rejected: wrong password");
            return Err(invalid_credentials());
        }
        if !user.is_active {
            tracing::warn!(user_id = user.id, "Login rejected: account inactive");
            return Err(AppError::Unauthorized("account is not active".to_string()));
        }

        let tokens = self.issue_pair(&user).await?;
        tracing::info!(user_id = user.id, role = %user.role, "User logged in");
        Ok(LoginResult { tokens, user })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let digest = self.digest(refresh_token)?;
        let stored = self
            .users
            .find_refresh_token(&digest)
            .await?
            .filter(|token| token.is_usable(Utc::now()))
            .ok_or_else(|| AppError::Unauthorized("invalid refresh token".to_string()))?;

        // Losing this race means another request already rotated the token.
        if !self.users.revoke_refresh_token(&digest).await? {
            return Err(AppError::Unauthorized("invalid refresh token".to_string()));
        }

        let user = self
            .users
            .find_user(stored.user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| AppError::Unauthorized("account is not active".to_string()))?;

        let pair = self.issue_pair(&user).await?;
        tracing::debug!(user_id = user.id, "Refresh token rotated");
        Ok(pair)
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        let revoked = self
            .users
            .revoke_refresh_token(&self.digest(refresh_token)?)
            .await?;
        tracing::debug!(revoked, "Logout");
        Ok(())
    }

    pub async fn profile(&self, ctx: &RequestContext) -> Result<User, AppError> {
        let actor = require_actor(ctx)?;
        self.users
            .find_user(actor.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    pub async fn change_password(
        &self,
        ctx: &RequestContext,
        input: ChangePassword,
    ) -> Result<(), AppError> {
        let user = self.profile(ctx).await?;
        if !verify_password(&input.current_password, &user.password_hash).await {
            return Err(AppError::validation(
                "currentPassword",
                "is incorrect",
            ));
        }

        let hash = hash_password(&input.new_password).await?;
        self.users.update_password(user.id, &hash).await?;
        let revoked = self.users.revoke_user_tokens(user.id).await?;
        tracing::info!(user_id = user.id, revoked_tokens = revoked, "Password changed");
        Ok(())
    }

    pub async fn create_user(&self, input: CreateUser) -> Result<User, AppError> {
        let password_hash = hash_password(&input.password).await?;
        let user = self
            .users
            .insert_user(NewUser {
                username: input.username,
                email: input.email,
                password_hash,
                role: input.role,
                display_name: input.display_name,
                phone: input.phone,
            })
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict(_) => {
                    AppError::Conflict("username or email already in use".to_string())
                }
                other => other.into(),
            })?;
        tracing::info!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;

    fn service() -> AuthService {
        AuthService::new(Arc::new(InMemoryStore::new()), "test-secret", 3600, 30)
    }

    fn agent(username: &str) -> CreateUser {
        CreateUser {
            username: username.into(),
            email: Some(format!("{username}@example.com")),
            password: "correct horse".into(),
            role: Role::Agent,
            display_name: None,
            phone: Some("+251900000000".into()),
        }
    }

    fn creds(login: &str, password: &str) -> Credentials {
        Credentials {
            login: login.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn login_by_username_email_or_phone() {
        let auth = service();
        let user = auth.create_user(agent("ops1")).await.unwrap();

        for login in ["ops1", "ops1@example.com", "+251900000000"] {
            let result = auth.login(creds(login, "correct horse")).await.unwrap();
            assert_eq!(result.user.id, user.id);
            let actor = auth.authenticate(&result.tokens.access_token).await.unwrap();
            assert_eq!(actor.role, Role::Agent);
        }

        assert!(matches!(
            auth.login(creds("ops1", "wrong")).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.login(creds("nobody", "correct horse")).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn refresh_rotates_token() {
        let auth = service();
        auth.create_user(agent("ops2")).await.unwrap();
        let login = auth.login(creds("ops2", "correct horse")).await.unwrap();

        let rotated = auth.refresh(&login.tokens.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, login.tokens.refresh_token);

        // The old token is spent.
        assert!(auth.refresh(&login.tokens.refresh_token).await.is_err());

        auth.logout(&rotated.refresh_token).await.unwrap();
        assert!(auth.refresh(&rotated.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn change_password_revokes_sessions() {
        let auth = service();
        let user = auth.create_user(agent("ops3")).await.unwrap();
        let login = auth.login(creds("ops3", "correct horse")).await.unwrap();
        let ctx = RequestContext::for_actor(user.actor(), None);

        let wrong = auth
            .change_password(
                &ctx,
                ChangePassword {
                    current_password: "nope".into(),
                    new_password: "battery staple".into(),
                },
            )
            .await;
        assert!(matches!(wrong, Err(AppError::Validation(_))));

        auth.change_password(
            &ctx,
            ChangePassword {
                current_password: "correct horse".into(),
                new_password: "battery staple".into(),
            },
        )
        .await
        .unwrap();

        assert!(auth.refresh(&login.tokens.refresh_token).await.is_err());
        assert!(auth.login(creds("ops3", "battery staple")).await.is_ok());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let auth = service();
        let other = AuthService::new(Arc::new(InMemoryStore::new()), "other-secret", 3600, 30);
        let user = User {
            id: 1,
            username: "a".into(),
            email: None,
            password_hash: String::new(),
            role: Role::Admin,
            display_name: None,
            phone: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let token = other.issue_access_token(&user).unwrap();
        assert!(matches!(
            auth.verify_access_token(&token),
            Err(AppError::Unauthorized(_))
        ));
        let own = auth.issue_access_token(&user).unwrap();
        assert_eq!(auth.verify_access_token(&own).unwrap().role, Role::Admin);
    }
}
