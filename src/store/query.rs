//! History query parameters and results.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::record::{MessageRecord, MessageStatus};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

/// Filters for listing message history.
///
/// Values arrive as raw query-string text; anything unparseable falls back
/// to its default instead of failing the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub date: Option<String>,
}

impl HistoryQuery {
    /// 1-based page number.
    pub fn page(&self) -> usize {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<usize>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }

    /// Page size, clamped to 1..=50.
    pub fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse::<usize>().ok())
            .filter(|l| *l > 0)
            .map(|l| l.min(MAX_LIMIT))
            .unwrap_or(DEFAULT_LIMIT)
    }

    pub fn status(&self) -> Option<MessageStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    /// Lowercased search terms.
    pub fn terms(&self) -> Vec<String> {
        self.search
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_lowercase)
            .collect()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }
}

/// Paging information for a history listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: usize,
    pub page: usize,
    pub pages: usize,
    pub limit: usize,
}

/// Counts over the whole store, ignoring filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub today_count: usize,
    pub total_count: usize,
}

/// One page of message history.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub data: Vec<MessageRecord>,
    pub pagination: Pagination,
    pub stats: HistoryStats,
}
