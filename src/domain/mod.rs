//! Framework-agnostic domain types.
//! Nothing in here touches the network, the database or the clock beyond `Utc::now()`.

pub mod actor;
pub mod audit;
pub mod catalog;
pub mod events;
pub mod lifecycle;
pub mod player;
pub mod query;
pub mod status;
pub mod transaction;
pub mod user;

pub use actor::{Actor, RequestContext, Role};
pub use audit::{AuditAction, AuditDraft, AuditEntry};
pub use lifecycle::{Lane, TransitionError};
pub use player::{PlayerIdentity, PlayerProfile};
pub use query::{Page, PageRequest, Pagination, TransactionFilter};
pub use status::{StatusRecord, TxStatus};
pub use transaction::{Routing, Transaction, TransactionRecord, TransactionType};
pub use user::{NewUser, User};
