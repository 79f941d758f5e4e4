//! In-memory message log.
//!
//! Every outbound reminder is recorded with its outcome so operators can page
//! through the history and mark replies.

mod query;
mod record;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{Local, NaiveDate, Utc};
use tracing::debug;

use crate::error::{Result, WaSenderError};

pub use query::{HistoryPage, HistoryQuery, HistoryStats, Pagination, DEFAULT_LIMIT, MAX_LIMIT};
pub use record::{CustomerRecord, Delivery, MessageRecord, MessageStatus};

/// Thread-safe storage for message records.
pub struct MessageStore {
    records: RwLock<Vec<MessageRecord>>,
    next_id: AtomicU64,
}

impl MessageStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Record a delivered message.
    pub fn log_sent(&self, delivery: Delivery, wa_message_id: &str) -> Result<MessageRecord> {
        let now = Utc::now();
        self.insert(delivery, MessageStatus::Sent, |record| {
            record.wa_message_id = Some(wa_message_id.to_string());
            record.sent_at = Some(now);
        })
    }

    /// Record a message the driver refused.
    pub fn log_failed(&self, delivery: Delivery, reason: &str) -> Result<MessageRecord> {
        self.insert(delivery, MessageStatus::Failed, |record| {
            record.failure_reason = Some(reason.to_string());
        })
    }

    fn insert<F>(&self, delivery: Delivery, status: MessageStatus, f: F) -> Result<MessageRecord>
    where
        F: FnOnce(&mut MessageRecord),
    {
        let now = Utc::now();
        let mut record = MessageRecord {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            customer: delivery.customer,
            recipient: delivery.to,
            message: delivery.text,
            status,
            wa_message_id: None,
            failure_reason: None,
            reply_message: None,
            sent_at: None,
            replied_at: None,
            created_at: now,
            updated_at: now,
        };
        f(&mut record);

        let mut records = self
            .records
            .write()
            .map_err(|_| WaSenderError::LockPoisoned)?;
        records.push(record.clone());

        debug!(id = record.id, status = %record.status, "message logged");
        Ok(record)
    }

    /// Get a clone of the record with the given ID.
    pub fn get(&self, id: u64) -> Result<Option<MessageRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| WaSenderError::LockPoisoned)?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    /// Change a record's status. Marking it replied stamps the reply time.
    pub fn update_status(
        &self,
        id: u64,
        status: MessageStatus,
        reply: Option<String>,
    ) -> Result<MessageRecord> {
        let mut records = self
            .records
            .write()
            .map_err(|_| WaSenderError::LockPoisoned)?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(WaSenderError::MessageNotFound(id))?;

        let now = Utc::now();
        record.status = status;
        record.updated_at = now;
        if status == MessageStatus::Replied {
            record.replied_at = Some(now);
            if reply.is_some() {
                record.reply_message = reply;
            }
        }

        Ok(record.clone())
    }

    /// List records newest first, filtered and paged.
    pub fn query(&self, query: &HistoryQuery) -> Result<HistoryPage> {
        self.query_on(query, Local::now().date_naive())
    }

    fn query_on(&self, query: &HistoryQuery, today: NaiveDate) -> Result<HistoryPage> {
        let records = self
            .records
            .read()
            .map_err(|_| WaSenderError::LockPoisoned)?;

        let local_date = |r: &MessageRecord| r.created_at.with_timezone(&Local).date_naive();
        let stats = HistoryStats {
            today_count: records.iter().filter(|r| local_date(r) == today).count(),
            total_count: records.len(),
        };

        let status = query.status();
        let terms = query.terms();
        let date = query.date();

        let matching: Vec<&MessageRecord> = records
            .iter()
            .rev()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .filter(|r| date.map_or(true, |d| local_date(r) == d))
            .filter(|r| r.matches_terms(&terms))
            .collect();

        let page = query.page();
        let limit = query.limit();
        let total = matching.len();
        let data = matching
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .cloned()
            .collect();

        Ok(HistoryPage {
            data,
            pagination: Pagination {
                total,
                page,
                pages: total.div_ceil(limit),
                limit,
            },
            stats,
        })
    }

    /// Get the number of records.
    pub fn count(&self) -> Result<usize> {
        let records = self
            .records
            .read()
            .map_err(|_| WaSenderError::LockPoisoned)?;
        Ok(records.len())
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}
