//! Filters and pagination for operator views.

use super::status::TxStatus;
use super::transaction::{TransactionRecord, TransactionType};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Every field is optional; the set fields are combined with logical AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub status: Option<TxStatus>,
    pub assigned_agent_id: Option<i64>,
    pub tx_type: Option<TransactionType>,
    pub min_amount: Option<BigDecimal>,
    pub max_amount: Option<BigDecimal>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub betting_site_id: Option<i64>,
    pub player_profile_id: Option<i64>,
}

impl TransactionFilter {
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        let tx = &record.transaction;

        self.status.map_or(true, |status| tx.status == status)
            && self
                .assigned_agent_id
                .map_or(true, |agent| tx.assigned_agent_id == Some(agent))
            && self
                .tx_type
                .map_or(true, |tx_type| tx.transaction_type() == tx_type)
            && self.min_amount.as_ref().map_or(true, |min| &tx.amount >= min)
            && self.max_amount.as_ref().map_or(true, |max| &tx.amount <= max)
            && self.created_from.map_or(true, |from| tx.created_at >= from)
            && self.created_to.map_or(true, |to| tx.created_at <= to)
            && self.betting_site_id.map_or(true, |site| {
                tx.site.as_ref().map(|s| s.betting_site_id) == Some(site)
            })
            && self
                .player_profile_id
                .map_or(true, |player| tx.player_profile_id == player)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl PageRequest {
    /// `page` is 1-based; `limit` must be within 1..=100.
    pub fn new(page: u32, limit: u32) -> Option<Self> {
        if page == 0 || limit == 0 || limit > MAX_PAGE_LIMIT {
            return None;
        }
        Some(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub pages: i64,
}

impl Pagination {
    pub fn new(total: i64, request: PageRequest) -> Self {
        let limit = i64::from(request.limit);
        let total = total.max(0);
        Self {
            total,
            page: request.page,
            limit: request.limit,
            pages: (total + limit - 1) / limit,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}
