//! Fixed transaction status vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status code '{0}'")]
pub struct UnknownStatus(pub String);

impl TxStatus {
    pub const ALL: [TxStatus; 5] = [
        TxStatus::Pending,
        TxStatus::InProgress,
        TxStatus::Success,
        TxStatus::Failed,
        TxStatus::Cancelled,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            TxStatus::Pending => "PENDING",
            TxStatus::InProgress => "IN_PROGRESS",
            TxStatus::Success => "SUCCESS",
            TxStatus::Failed => "FAILED",
            TxStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TxStatus::Pending => "Pending",
            TxStatus::InProgress => "In Progress",
            TxStatus::Success => "Success",
            TxStatus::Failed => "Failed",
            TxStatus::Cancelled => "Cancelled",
        }
    }

    /// No operation other than an explicit reopen may leave a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxStatus::Success | TxStatus::Failed | TxStatus::Cancelled
        )
    }

    pub fn codes() -> Vec<&'static str> {
        Self::ALL.iter().map(TxStatus::code).collect()
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TxStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TxStatus::ALL
            .iter()
            .copied()
            .find(|status| status.code() == s.trim())
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// A row of the status vocabulary as held by the entity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub id: i32,
    pub code: TxStatus,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_code() {
        for status in TxStatus::ALL {
            assert_eq!(status.code().parse::<TxStatus>(), Ok(status));
        }
    }

    #[test]
    fn rejects_labels_and_lowercase() {
        assert!("Pending".parse::<TxStatus>().is_err());
        assert!("success".parse::<TxStatus>().is_err());
        assert!("REFUNDED".parse::<TxStatus>().is_err());
        assert!("".parse::<TxStatus>().is_err());
    }

    #[test]
    fn terminal_set() {
        let terminal: Vec<_> = TxStatus::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![&TxStatus::Success, &TxStatus::Failed, &TxStatus::Cancelled]
        );
    }

    #[test]
    fn serializes_as_code() {
        let json = serde_json::to_string(&TxStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }
}
