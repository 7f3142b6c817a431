//! # Query Log
//!
//! Append-only record of answered, denied, and deferred queries. The rate
//! limiter derives today's usage by counting entries here at check time,
//! so no separate counter state exists to drift.

use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{GateError, GateResult};

/// How a logged query concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOutcome {
    Answered,
    Denied,
    Deferred,
    Failed,
}

/// One logged query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub external_id: String,
    pub query_text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,

    /// Namespaces the retrieval was scoped to
    pub namespaces: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,

    pub outcome: QueryOutcome,
    pub timestamp: DateTime<Utc>,
}

impl QueryLogEntry {
    pub fn new(principal_id: Uuid, external_id: &str, query_text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            principal_id,
            external_id: external_id.to_string(),
            query_text: query_text.to_string(),
            response_text: None,
            namespaces: Vec::new(),
            response_time_ms: None,
            outcome: QueryOutcome::Answered,
            timestamp: Utc::now(),
        }
    }
}

/// Query log repository contract
pub trait QueryLogRepository: Send + Sync {
    fn append(&self, entry: &QueryLogEntry) -> GateResult<()>;

    /// Entries for a principal within one calendar day (UTC)
    fn count_on_day(&self, principal_id: Uuid, day: NaiveDate) -> GateResult<u64>;
}

/// In-memory query log
#[derive(Debug, Default)]
pub struct InMemoryQueryLog {
    entries: RwLock<Vec<QueryLogEntry>>,
}

impl InMemoryQueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries, for tests and analytics
    pub fn entries(&self) -> Vec<QueryLogEntry> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }

    fn lock_err() -> GateError {
        GateError::StorageError("query log lock poisoned".to_string())
    }
}

impl QueryLogRepository for InMemoryQueryLog {
    fn append(&self, entry: &QueryLogEntry) -> GateResult<()> {
        self.entries
            .write()
            .map_err(|_| Self::lock_err())?
            .push(entry.clone());
        Ok(())
    }

    fn count_on_day(&self, principal_id: Uuid, day: NaiveDate) -> GateResult<u64> {
        let entries = self.entries.read().map_err(|_| Self::lock_err())?;
        Ok(entries
            .iter()
            .filter(|e| e.principal_id == principal_id && e.timestamp.date_naive() == day)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_count_respects_day_boundary() {
        let log = InMemoryQueryLog::new();
        let principal = Uuid::new_v4();

        let mut today = QueryLogEntry::new(principal, "chat-1", "q1");
        today.timestamp = Utc::now();
        log.append(&today).unwrap();

        let mut yesterday = QueryLogEntry::new(principal, "chat-1", "q0");
        yesterday.timestamp = Utc::now() - Duration::days(1);
        log.append(&yesterday).unwrap();

        let count = log.count_on_day(principal, Utc::now().date_naive()).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_count_is_per_principal() {
        let log = InMemoryQueryLog::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        log.append(&QueryLogEntry::new(a, "chat-a", "q")).unwrap();
        log.append(&QueryLogEntry::new(b, "chat-b", "q")).unwrap();

        assert_eq!(log.count_on_day(a, Utc::now().date_naive()).unwrap(), 1);
    }
}
