//! Query history
//!
//! Keeps a bounded ring of recent queries for the stats endpoint, plus a
//! monotonic total. Oldest entries are evicted first.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Entries retained in the ring
const HISTORY_CAPACITY: usize = 10;

/// Stored query prefix length in characters
const QUERY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub context_length: usize,
    pub model: String,
}

impl HistoryEntry {
    pub fn new(query: &str, context_length: usize, model: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            query: query.chars().take(QUERY_PREVIEW_CHARS).collect(),
            context_length,
            model: model.to_string(),
        }
    }
}

#[derive(Default)]
pub struct QueryHistory {
    inner: Mutex<HistoryInner>,
}

#[derive(Default)]
struct HistoryInner {
    entries: VecDeque<HistoryEntry>,
    total: u64,
}

impl QueryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: HistoryEntry) {
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.len() == HISTORY_CAPACITY {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry);
        inner.total += 1;
    }

    /// Most recent `n` entries, newest last
    pub fn recent(&self, n: usize) -> Vec<HistoryEntry> {
        let inner = self.inner.lock().unwrap();
        let skip = inner.entries.len().saturating_sub(n);
        inner.entries.iter().skip(skip).cloned().collect()
    }

    /// Total queries recorded since startup
    pub fn total(&self) -> u64 {
        self.inner.lock().unwrap().total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let history = QueryHistory::new();
        for i in 0..11 {
            history.record(HistoryEntry::new(&format!("query {}", i), 100, "m"));
        }

        let recent = history.recent(20);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].query, "query 1");
        assert_eq!(recent[9].query, "query 10");
        assert_eq!(history.total(), 11);
    }

    #[test]
    fn test_recent_returns_newest_last() {
        let history = QueryHistory::new();
        history.record(HistoryEntry::new("first", 10, "m"));
        history.record(HistoryEntry::new("second", 20, "m"));
        history.record(HistoryEntry::new("third", 30, "m"));

        let recent = history.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].query, "second");
        assert_eq!(recent[1].query, "third");
    }

    #[test]
    fn test_long_queries_are_truncated() {
        let history = QueryHistory::new();
        history.record(HistoryEntry::new(&"q".repeat(500), 10, "m"));
        assert_eq!(history.recent(1)[0].query.chars().count(), 200);
    }
}
