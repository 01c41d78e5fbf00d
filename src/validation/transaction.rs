//! Request payloads for the transaction surface and their validated command forms.

use super::{
    optional_text, parse_amount, parse_currency, parse_id, parse_status, parse_uuid,
    required_text, validate_rating, validate_url, Collector, FieldValue, ValidationError,
    COMMENT_MAX_LEN, NOTES_MAX_LEN, PLAYER_SITE_ID_MAX_LEN, USERNAME_MAX_LEN,
    WITHDRAWAL_ADDRESS_MAX_LEN,
};
use crate::domain::query::{PageRequest, TransactionFilter, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::domain::transaction::{Routing, SiteContext, TransactionType};
use crate::domain::TxStatus;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub player_uuid: Option<String>,
    pub telegram_id: Option<FieldValue>,
    pub telegram_username: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    pub amount: Option<FieldValue>,
    pub currency: Option<String>,
    pub deposit_bank_id: Option<FieldValue>,
    pub withdrawal_bank_id: Option<FieldValue>,
    pub withdrawal_address: Option<String>,
    pub betting_site_id: Option<FieldValue>,
    pub player_site_id: Option<FieldValue>,
}

/// How the requester identifies the player a new transaction belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerRef {
    Uuid(Uuid),
    Channel {
        channel_id: String,
        username: Option<String>,
    },
    /// No durable identity yet; a placeholder profile is created unless the requester is a
    /// logged-in user who already has one.
    Unidentified,
}

#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub player: PlayerRef,
    pub routing: Routing,
    pub amount: BigDecimal,
    pub currency: String,
    pub site: Option<SiteContext>,
}

fn is_present(value: &Option<FieldValue>) -> bool {
    value.as_ref().map_or(false, |v| !v.as_text().is_empty())
}

fn is_present_text(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.trim().is_empty())
}

impl CreateTransactionRequest {
    pub fn validate(&self) -> Result<CreateTransaction, Vec<ValidationError>> {
        let mut errors = Collector::default();

        let tx_type = match self.tx_type.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push("type", "is required");
                None
            }
            Some(raw) => errors.check(
                TransactionType::from_str(raw)
                    .map_err(|_| ValidationError::new("type", "must be one of: DEPOSIT, WITHDRAW")),
            ),
        };

        let amount = match &self.amount {
            Some(value) => errors.check(parse_amount("amount", value)),
            None => {
                errors.push("amount", "is required");
                None
            }
        };

        let currency = errors.check(parse_currency("currency", self.currency.as_deref()));

        let routing = match tx_type {
            Some(TransactionType::Deposit) => {
                if is_present(&self.withdrawal_bank_id) {
                    errors.push("withdrawalBankId", "is not allowed for a DEPOSIT");
                }
                if is_present_text(&self.withdrawal_address) {
                    errors.push("withdrawalAddress", "is not allowed for a DEPOSIT");
                }
                match &self.deposit_bank_id {
                    Some(value) => errors
                        .check(parse_id("depositBankId", value))
                        .map(|deposit_bank_id| Routing::Deposit { deposit_bank_id }),
                    None => {
                        errors.push("depositBankId", "is required for a DEPOSIT");
                        None
                    }
                }
            }
            Some(TransactionType::Withdraw) => {
                if is_present(&self.deposit_bank_id) {
                    errors.push("depositBankId", "is not allowed for a WITHDRAW");
                }
                let bank = match &self.withdrawal_bank_id {
                    Some(value) => errors.check(parse_id("withdrawalBankId", value)),
                    None => {
                        errors.push("withdrawalBankId", "is required for a WITHDRAW");
                        None
                    }
                };
                let address = errors.check(required_text(
                    "withdrawalAddress",
                    self.withdrawal_address.as_deref(),
                    WITHDRAWAL_ADDRESS_MAX_LEN,
                ));
                match (bank, address) {
                    (Some(withdrawal_bank_id), Some(withdrawal_address)) => Some(Routing::Withdraw {
                        withdrawal_bank_id,
                        withdrawal_address,
                    }),
                    _ => None,
                }
            }
            None => None,
        };

        let site = match (&self.betting_site_id, &self.player_site_id) {
            (None, None) => Some(None),
            (Some(site_id), Some(player_site_id)) => {
                let site_id = errors.check(parse_id("bettingSiteId", site_id));
                let player_site_id = errors.check(required_text(
                    "playerSiteId",
                    Some(player_site_id.as_text().as_str()),
                    PLAYER_SITE_ID_MAX_LEN,
                ));
                match (site_id, player_site_id) {
                    (Some(betting_site_id), Some(player_site_id)) => Some(Some(SiteContext {
                        betting_site_id,
                        player_site_id,
                    })),
                    _ => None,
                }
            }
            (Some(_), None) => {
                errors.push("playerSiteId", "is required when bettingSiteId is given");
                None
            }
            (None, Some(_)) => {
                errors.push("bettingSiteId", "is required when playerSiteId is given");
                None
            }
        };

        let player = if let Some(raw) = self.player_uuid.as_deref().filter(|v| !v.trim().is_empty()) {
            errors.check(parse_uuid("playerUuid", raw)).map(PlayerRef::Uuid)
        } else if let Some(channel) = self.telegram_id.as_ref().filter(|v| !v.as_text().is_empty()) {
            let username = errors
                .check(optional_text(
                    "telegramUsername",
                    self.telegram_username.as_deref(),
                    USERNAME_MAX_LEN,
                ))
                .flatten();
            Some(PlayerRef::Channel {
                channel_id: channel.as_text(),
                username,
            })
        } else {
            Some(PlayerRef::Unidentified)
        };

        match (errors.finish(), player, routing, amount, currency, site) {
            (Ok(()), Some(player), Some(routing), Some(amount), Some(currency), Some(site)) => {
                Ok(CreateTransaction {
                    player,
                    routing,
                    amount,
                    currency,
                    site,
                })
            }
            (Err(errors), ..) => Err(errors),
            _ => Err(vec![ValidationError::new("body", "is incomplete")]),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub agent_id: Option<FieldValue>,
}

impl AssignRequest {
    pub fn validate(&self) -> Result<i64, Vec<ValidationError>> {
        match &self.agent_id {
            Some(value) => parse_id("agentId", value).map_err(|err| vec![err]),
            None => Err(vec![ValidationError::new("agentId", "is required")]),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub status: Option<String>,
    pub agent_notes: Option<String>,
    pub evidence_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTransaction {
    pub status: TxStatus,
    pub agent_notes: Option<String>,
    pub evidence_url: Option<String>,
}

/// Agents only close transactions; moving one back to an open status is an admin override.
fn require_closing_status(status: TxStatus) -> Result<TxStatus, ValidationError> {
    if status.is_terminal() {
        Ok(status)
    } else {
        Err(ValidationError::new(
            "status",
            "must be one of: SUCCESS, FAILED, CANCELLED",
        ))
    }
}

impl ProcessRequest {
    pub fn validate(&self) -> Result<ProcessTransaction, Vec<ValidationError>> {
        let mut errors = Collector::default();
        let status = errors.check(
            parse_status("status", self.status.as_deref().unwrap_or(""))
                .and_then(require_closing_status),
        );
        let agent_notes = errors
            .check(optional_text("agentNotes", self.agent_notes.as_deref(), NOTES_MAX_LEN))
            .flatten();
        let evidence_url = match self.evidence_url.as_deref().filter(|v| !v.trim().is_empty()) {
            Some(url) => errors.check(validate_url("evidenceUrl", url)),
            None => None,
        };
        errors.finish()?;

        match status {
            Some(status) => Ok(ProcessTransaction {
                status,
                agent_notes,
                evidence_url,
            }),
            None => Err(vec![ValidationError::new("status", "is required")]),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRequest {
    pub status: Option<String>,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideStatus {
    pub status: TxStatus,
    pub admin_notes: Option<String>,
}

impl OverrideRequest {
    pub fn validate(&self) -> Result<OverrideStatus, Vec<ValidationError>> {
        self.validate_with_default(None)
    }

    /// Reopen requests may omit the status and fall back to `default`.
    pub fn validate_with_default(
        &self,
        default: Option<TxStatus>,
    ) -> Result<OverrideStatus, Vec<ValidationError>> {
        let mut errors = Collector::default();
        let status = match (self.status.as_deref().filter(|s| !s.trim().is_empty()), default) {
            (Some(raw), _) => errors.check(parse_status("status", raw)),
            (None, Some(default)) => Some(default),
            (None, None) => {
                errors.push("status", "is required");
                None
            }
        };
        let admin_notes = errors
            .check(optional_text("adminNotes", self.admin_notes.as_deref(), NOTES_MAX_LEN))
            .flatten();
        errors.finish()?;

        match status {
            Some(status) => Ok(OverrideStatus {
                status,
                admin_notes,
            }),
            None => Err(vec![ValidationError::new("status", "is required")]),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    pub comment: Option<String>,
    pub rating: Option<FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddComment {
    pub comment: String,
    pub rating: Option<i16>,
}

impl CommentRequest {
    pub fn validate(&self) -> Result<AddComment, Vec<ValidationError>> {
        let mut errors = Collector::default();
        let comment = errors.check(required_text("comment", self.comment.as_deref(), COMMENT_MAX_LEN));
        let rating = match &self.rating {
            Some(value) => match value.as_text().parse::<i64>() {
                Ok(rating) => errors.check(validate_rating("rating", rating)),
                Err(_) => {
                    errors.push("rating", "must be an integer between 1 and 5");
                    None
                }
            },
            None => None,
        };
        errors.finish()?;

        match comment {
            Some(comment) => Ok(AddComment { comment, rating }),
            None => Err(vec![ValidationError::new("comment", "is required")]),
        }
    }
}

/// Query string of the operator list views. Everything arrives as text so that malformed values
/// produce field-level validation errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<String>,
    pub agent: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    pub amount_range: Option<String>,
    pub date_range: Option<String>,
    pub betting_site_id: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ListQuery {
    pub fn validate(&self) -> Result<(TransactionFilter, PageRequest), Vec<ValidationError>> {
        let mut errors = Collector::default();
        let mut filter = TransactionFilter::default();

        if let Some(raw) = non_empty(&self.status) {
            filter.status = errors.check(parse_status("status", raw));
        }
        if let Some(raw) = non_empty(&self.agent) {
            filter.assigned_agent_id = errors.check(parse_id("agent", &FieldValue::from(raw)));
        }
        if let Some(raw) = non_empty(&self.tx_type) {
            filter.tx_type = errors.check(
                TransactionType::from_str(raw)
                    .map_err(|_| ValidationError::new("type", "must be one of: DEPOSIT, WITHDRAW")),
            );
        }
        if let Some(raw) = non_empty(&self.amount_range) {
            if let Some((min, max)) = errors.check(parse_amount_range(raw)) {
                filter.min_amount = min;
                filter.max_amount = max;
            }
        }
        if let Some(raw) = non_empty(&self.date_range) {
            if let Some((from, to)) = errors.check(parse_date_range(raw)) {
                filter.created_from = from;
                filter.created_to = to;
            }
        }
        if let Some(raw) = non_empty(&self.betting_site_id) {
            filter.betting_site_id = errors.check(parse_id("bettingSiteId", &FieldValue::from(raw)));
        }

        let page = parse_bounded("page", non_empty(&self.page), 1, u32::MAX, 1);
        let limit = parse_bounded(
            "limit",
            non_empty(&self.limit),
            1,
            MAX_PAGE_LIMIT,
            DEFAULT_PAGE_LIMIT,
        );
        let page = errors.check(page);
        let limit = errors.check(limit);
        errors.finish()?;

        match (page, limit) {
            (Some(page), Some(limit)) => PageRequest::new(page, limit)
                .map(|request| (filter, request))
                .ok_or_else(|| vec![ValidationError::new("limit", "is out of range")]),
            _ => Err(vec![ValidationError::new("page", "is out of range")]),
        }
    }
}

fn parse_bounded(
    field: &'static str,
    raw: Option<&str>,
    min: u32,
    max: u32,
    default: u32,
) -> Result<u32, ValidationError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    raw.parse::<u32>()
        .ok()
        .filter(|value| (min..=max).contains(value))
        .ok_or_else(|| ValidationError::new(field, format!("must be an integer between {min} and {max}")))
}

/// `min-max`, where either side may be empty: `10-`, `-500`, `10-500`.
pub fn parse_amount_range(
    raw: &str,
) -> Result<(Option<BigDecimal>, Option<BigDecimal>), ValidationError> {
    let invalid = || ValidationError::new("amountRange", "must look like min-max, e.g. 10-500");
    let (min, max) = raw.split_once('-').ok_or_else(invalid)?;

    let parse_side = |side: &str| -> Result<Option<BigDecimal>, ValidationError> {
        let side = side.trim();
        if side.is_empty() {
            return Ok(None);
        }
        if side.contains(['e', 'E']) {
            return Err(invalid());
        }
        BigDecimal::from_str(side).map(Some).map_err(|_| invalid())
    };

    let (min, max) = (parse_side(min)?, parse_side(max)?);
    if let (Some(min), Some(max)) = (&min, &max) {
        if min > max {
            return Err(ValidationError::new("amountRange", "min must not exceed max"));
        }
    }
    Ok((min, max))
}

/// `start,end`, each an RFC 3339 timestamp or a `YYYY-MM-DD` date. A bare end date covers the
/// whole day.
pub fn parse_date_range(
    raw: &str,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ValidationError> {
    let invalid = || ValidationError::new("dateRange", "must look like start,end with ISO dates");
    let (start, end) = raw.split_once(',').ok_or_else(invalid)?;

    let parse_side = |side: &str, end_of_day: bool| -> Result<Option<DateTime<Utc>>, ValidationError> {
        let side = side.trim();
        if side.is_empty() {
            return Ok(None);
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(side) {
            return Ok(Some(ts.with_timezone(&Utc)));
        }
        let date = NaiveDate::parse_from_str(side, "%Y-%m-%d").map_err(|_| invalid())?;
        let time = if end_of_day {
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
        } else {
            NaiveTime::from_hms_opt(0, 0, 0)
        }
        .ok_or_else(invalid)?;
        Ok(Some(Utc.from_utc_datetime(&date.and_time(time))))
    };

    let (start, end) = (parse_side(start, false)?, parse_side(end, true)?);
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ValidationError::new("dateRange", "start must not be after end"));
        }
    }
    Ok((start, end))
}
