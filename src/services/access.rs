//! Role and ownership gates.
//!
//! Callers load the resource first: a missing resource is a 404 before any of these run, so a
//! 403 from here always means "exists, but not yours".

use crate::domain::actor::{Actor, RequestContext, Role};
use crate::domain::transaction::TransactionRecord;
use crate::error::AppError;
use uuid::Uuid;

pub fn require_actor(ctx: &RequestContext) -> Result<&Actor, AppError> {
    ctx.actor
        .as_ref()
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))
}

pub fn require_role<'a>(ctx: &'a RequestContext, roles: &[Role]) -> Result<&'a Actor, AppError> {
    let actor = require_actor(ctx)?;
    if roles.contains(&actor.role) {
        Ok(actor)
    } else {
        Err(AppError::Forbidden(format!(
            "role '{}' may not perform this action",
            actor.role
        )))
    }
}

pub fn require_admin(ctx: &RequestContext) -> Result<&Actor, AppError> {
    require_role(ctx, &[Role::Admin])
}

/// Only the agent the transaction is assigned to; the admin role does not bypass this.
pub fn require_assigned_agent<'a>(
    ctx: &'a RequestContext,
    record: &TransactionRecord,
) -> Result<&'a Actor, AppError> {
    let actor = require_role(ctx, &[Role::Agent, Role::Admin])?;
    if record.transaction.assigned_agent_id == Some(actor.user_id) {
        Ok(actor)
    } else {
        Err(AppError::Forbidden(
            "transaction is not assigned to you".to_string(),
        ))
    }
}

fn owns(actor: &Actor, record: &TransactionRecord) -> bool {
    record.transaction.user_id == Some(actor.user_id)
}

/// Staff see what they handle; players see their own requests, either through their account or
/// by presenting the player UUID the transaction belongs to.
pub fn can_view(ctx: &RequestContext, record: &TransactionRecord, player_uuid: Option<Uuid>) -> bool {
    if player_uuid == Some(record.player.player_uuid) {
        return true;
    }
    match &ctx.actor {
        Some(actor) => match actor.role {
            Role::Admin => true,
            Role::Agent => {
                record.transaction.assigned_agent_id == Some(actor.user_id) || owns(actor, record)
            }
            Role::Player => owns(actor, record),
        },
        None => false,
    }
}

pub fn require_view(
    ctx: &RequestContext,
    record: &TransactionRecord,
    player_uuid: Option<Uuid>,
) -> Result<(), AppError> {
    if can_view(ctx, record, player_uuid) {
        Ok(())
    } else if ctx.actor.is_none() && player_uuid.is_none() {
        Err(AppError::Unauthorized(
            "authentication or playerUuid required".to_string(),
        ))
    } else {
        Err(AppError::Forbidden(
            "you do not have access to this transaction".to_string(),
        ))
    }
}

/// The player who raised it, the assigned agent, or an admin.
pub fn require_comment_access<'a>(
    ctx: &'a RequestContext,
    record: &TransactionRecord,
) -> Result<&'a Actor, AppError> {
    let actor = require_actor(ctx)?;
    let allowed = actor.is_admin()
        || owns(actor, record)
        || (actor.role == Role::Agent && record.transaction.assigned_agent_id == Some(actor.user_id));
    if allowed {
        Ok(actor)
    } else {
        Err(AppError::Forbidden(
            "you may not comment on this transaction".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::player::PlayerIdentity;
    use crate::domain::status::TxStatus;
    use crate::domain::transaction::{PlayerSummary, Routing, Transaction};
    use bigdecimal::BigDecimal;
    use chrono::Utc;

    fn record(assigned: Option<i64>, user_id: Option<i64>) -> TransactionRecord {
        let now = Utc::now();
        TransactionRecord {
            transaction: Transaction {
                id: 1,
                transaction_uuid: Uuid::new_v4(),
                player_profile_id: 1,
                user_id,
                routing: Routing::Deposit { deposit_bank_id: 1 },
                amount: BigDecimal::from(10),
                currency: "USD".into(),
                site: None,
                screenshot_url: None,
                requested_at: now,
                assigned_agent_id: assigned,
                status: TxStatus::Pending,
                admin_notes: None,
                agent_notes: None,
                rating: None,
                created_at: now,
                updated_at: now,
            },
            player: PlayerSummary {
                id: 1,
                player_uuid: Uuid::new_v4(),
                identity: PlayerIdentity::placeholder(),
                telegram_username: None,
            },
            assigned_agent: None,
        }
    }

    fn ctx(user_id: i64, role: Role) -> RequestContext {
        RequestContext::for_actor(
            Actor {
                user_id,
                username: format!("user{user_id}"),
                role,
            },
            None,
        )
    }

    #[test]
    fn ownership_not_role_gates_processing() {
        let rec = record(Some(10), None);
        assert!(require_assigned_agent(&ctx(10, Role::Agent), &rec).is_ok());
        assert!(matches!(
            require_assigned_agent(&ctx(11, Role::Agent), &rec),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            require_assigned_agent(&ctx(1, Role::Admin), &rec),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            require_assigned_agent(&RequestContext::default(), &rec),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn view_rules() {
        let rec = record(Some(10), Some(30));
        assert!(can_view(&ctx(1, Role::Admin), &rec, None));
        assert!(can_view(&ctx(10, Role::Agent), &rec, None));
        assert!(!can_view(&ctx(11, Role::Agent), &rec, None));
        assert!(can_view(&ctx(30, Role::Player), &rec, None));
        assert!(!can_view(&ctx(31, Role::Player), &rec, None));
        assert!(can_view(&RequestContext::default(), &rec, Some(rec.player.player_uuid)));
        assert!(!can_view(&RequestContext::default(), &rec, Some(Uuid::new_v4())));

        assert!(matches!(
            require_view(&RequestContext::default(), &rec, None),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn comment_rules() {
        let rec = record(Some(10), Some(30));
        assert!(require_comment_access(&ctx(30, Role::Player), &rec).is_ok());
        assert!(require_comment_access(&ctx(10, Role::Agent), &rec).is_ok());
        assert!(require_comment_access(&ctx(1, Role::Admin), &rec).is_ok());
        assert!(require_comment_access(&ctx(11, Role::Agent), &rec).is_err());
    }
}
