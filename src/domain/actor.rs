//! Actors and roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Agent,
    Player,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Agent => "agent",
            Role::Player => "player",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "agent" => Ok(Role::Agent),
            "player" => Ok(Role::Player),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// An authenticated user as seen by authorization checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Who is asking and from where. The origin address ends up in audit rows.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub actor: Option<Actor>,
    pub ip_address: Option<String>,
}

impl RequestContext {
    pub fn anonymous(ip_address: Option<String>) -> Self {
        Self {
            actor: None,
            ip_address,
        }
    }

    pub fn for_actor(actor: Actor, ip_address: Option<String>) -> Self {
        Self {
            actor: Some(actor),
            ip_address,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.actor.as_ref().map(|actor| actor.user_id)
    }
}
