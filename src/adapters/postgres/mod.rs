//! Postgres implementation of the store ports.
//!
//! Every mutation runs inside one database transaction together with its audit row.

mod catalog;
mod players;
mod transactions;
mod users;

use crate::domain::audit::AuditDraft;
use crate::ports::{RepositoryError, RepositoryResult};
use sqlx::{PgConnection, PgPool};

/// Postgres-backed store implementing every port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn write_audit(
    conn: &mut PgConnection,
    entity: &str,
    entity_id: i64,
    draft: AuditDraft,
) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (actor_user_id, entity, entity_id, action, old_value, new_value, ip_address)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(draft.actor_user_id)
    .bind(entity)
    .bind(entity_id)
    .bind(draft.action.as_str())
    .bind(draft.old_value)
    .bind(draft.new_value)
    .bind(draft.ip_address)
    .execute(conn)
    .await
    .map_err(RepositoryError::from)?;

    Ok(())
}
