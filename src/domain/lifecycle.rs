//! Transaction state machine.
//!
//! Every status write goes through [`check_transition`] or [`check_reopen`]; the engine never
//! writes a status without one of them approving it first.

use super::status::TxStatus;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which actor lane a status write belongs to. Determines both the allowed targets and which
/// notes column the write may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Agent,
    Admin,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::Agent => f.write_str("agent"),
            Lane::Admin => f.write_str("admin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("transaction is already {from} and can only be reopened by an admin")]
    Terminal { from: TxStatus },

    #[error("{lane} cannot move a transaction from {from} to {to}")]
    NotAllowed {
        from: TxStatus,
        to: TxStatus,
        lane: Lane,
    },

    #[error("only a transaction in a terminal status can be reopened (currently {from})")]
    NotReopenable { from: TxStatus },

    #[error("a reopened transaction must go back to PENDING or IN_PROGRESS, not {to}")]
    InvalidReopenTarget { to: TxStatus },
}

pub fn allowed_targets(from: TxStatus, lane: Lane) -> &'static [TxStatus] {
    use TxStatus::*;

    if from.is_terminal() {
        return &[];
    }

    match (lane, from) {
        (Lane::Agent, Pending | InProgress) => &[Success, Failed, Cancelled],
        (Lane::Admin, _) => &TxStatus::ALL,
        _ => &[],
    }
}

pub fn check_transition(from: TxStatus, to: TxStatus, lane: Lane) -> Result<(), TransitionError> {
    if from.is_terminal() {
        return Err(TransitionError::Terminal { from });
    }

    if allowed_targets(from, lane).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError::NotAllowed { from, to, lane })
    }
}

pub fn check_reopen(from: TxStatus, to: TxStatus) -> Result<(), TransitionError> {
    if !from.is_terminal() {
        return Err(TransitionError::NotReopenable { from });
    }

    match to {
        TxStatus::Pending | TxStatus::InProgress => Ok(()),
        _ => Err(TransitionError::InvalidReopenTarget { to }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TxStatus::*;

    #[test]
    fn agent_lane_only_closes_transactions() {
        for from in [Pending, InProgress] {
            for to in [Success, Failed, Cancelled] {
                assert!(check_transition(from, to, Lane::Agent).is_ok(), "{from} -> {to}");
            }
        }
        assert_eq!(
            check_transition(Pending, InProgress, Lane::Agent),
            Err(TransitionError::NotAllowed {
                from: Pending,
                to: InProgress,
                lane: Lane::Agent
            })
        );
    }

    #[test]
    fn agent_lane_cannot_go_back_to_pending() {
        assert!(check_transition(InProgress, Pending, Lane::Agent).is_err());
        assert!(check_transition(InProgress, InProgress, Lane::Agent).is_err());
        assert!(check_transition(InProgress, Success, Lane::Agent).is_ok());
    }

    #[test]
    fn admin_lane_accepts_any_target_from_open_status() {
        for from in [Pending, InProgress] {
            for to in TxStatus::ALL {
                assert!(check_transition(from, to, Lane::Admin).is_ok());
            }
        }
    }

    #[test]
    fn terminal_status_is_closed_for_both_lanes() {
        for from in [Success, Failed, Cancelled] {
            for to in TxStatus::ALL {
                for lane in [Lane::Agent, Lane::Admin] {
                    assert_eq!(
                        check_transition(from, to, lane),
                        Err(TransitionError::Terminal { from })
                    );
                }
            }
        }
    }

    #[test]
    fn reopen_only_from_terminal() {
        assert!(check_reopen(Failed, InProgress).is_ok());
        assert!(check_reopen(Success, Pending).is_ok());
        assert_eq!(
            check_reopen(InProgress, Pending),
            Err(TransitionError::NotReopenable { from: InProgress })
        );
        assert_eq!(
            check_reopen(Cancelled, Success),
            Err(TransitionError::InvalidReopenTarget { to: Success })
        );
    }
}
