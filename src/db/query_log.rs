//! Fixed-capacity statement log.

use crate::config::DEFAULT_QUERY_LOG_CAPACITY;
use crate::models::{QueryLogEntry, QueryParam};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// FIFO ring buffer of executed statements. The oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct QueryLog {
    entries: VecDeque<QueryLogEntry>,
    capacity: usize,
    enabled: bool,
    sequence: Arc<AtomicU64>,
}

impl QueryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_QUERY_LOG_CAPACITY)),
            capacity,
            enabled: false,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number entries from `sequence`, so logs sharing it can be merged in
    /// execution order.
    pub fn share_sequence(&mut self, sequence: Arc<AtomicU64>) {
        self.sequence = sequence;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity, evicting the oldest entries that no longer fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict();
    }

    /// Record one statement; no-op while disabled.
    pub fn record(&mut self, sql: &str, params: &[QueryParam], elapsed: Duration) {
        if !self.enabled || self.capacity == 0 {
            return;
        }
        self.entries.push_back(QueryLogEntry {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            sql: sql.to_string(),
            params: params.to_vec(),
            elapsed,
            executed_at: Utc::now(),
        });
        self.evict();
    }

    /// The most recent `limit` entries (all when `None`), oldest first.
    pub fn recent(&self, limit: Option<usize>) -> Vec<QueryLogEntry> {
        let take = limit.unwrap_or(self.entries.len()).min(self.entries.len());
        self.entries
            .iter()
            .skip(self.entries.len() - take)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

impl Default for QueryLog {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_LOG_CAPACITY)
    }
}
