//! Fault reporting to the audit collaborator.
//!
//! Connection failures are reported as fire-and-forget events. A sink must not
//! fail the operation that reports to it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::error;

/// One reported system failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultEvent {
    pub category: &'static str,
    pub result: &'static str,
    pub detail: String,
    pub connection: String,
    pub occurred_at: DateTime<Utc>,
}

impl FaultEvent {
    /// A connection failure on the named slot.
    pub fn connection_failure(connection: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            category: "system",
            result: "failure",
            detail: detail.into(),
            connection: connection.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Receiver of fault events.
pub trait FaultSink: Send + Sync {
    fn record(&self, event: FaultEvent);
}

/// Default sink: emits each event as an error-level tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFaultSink;

impl FaultSink for TracingFaultSink {
    fn record(&self, event: FaultEvent) {
        error!(
            category = event.category,
            result = event.result,
            connection = %event.connection,
            occurred_at = %event.occurred_at,
            "{}",
            event.detail
        );
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryFaultSink {
    events: Arc<Mutex<Vec<FaultEvent>>>,
}

impl MemoryFaultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events, oldest first.
    pub fn events(&self) -> Vec<FaultEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FaultSink for MemoryFaultSink {
    fn record(&self, event: FaultEvent) {
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event);
    }
}

impl<S: FaultSink + ?Sized> FaultSink for Arc<S> {
    fn record(&self, event: FaultEvent) {
        (**self).record(event)
    }
}
