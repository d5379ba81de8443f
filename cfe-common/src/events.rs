//! Scrape event types and broadcast bus
//!
//! Events are published by the background scrape job and forwarded to SSE
//! subscribers. Delivery is best effort: a run never waits on listeners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted over the lifetime of a scrape run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScrapeEvent {
    /// Background job picked the run up
    RunStarted {
        run_id: Uuid,
        output_dir: String,
        timestamp: DateTime<Utc>,
    },

    /// Periodic progress while walking the portal
    RunProgress {
        run_id: Uuid,
        fare: String,
        period: String,
        region: Option<String>,
        records_total: usize,
        failures_total: usize,
        timestamp: DateTime<Utc>,
    },

    /// Run finished and outputs were persisted
    RunSucceeded {
        run_id: Uuid,
        records_inserted: usize,
        failures_inserted: usize,
        duration_seconds: u64,
        timestamp: DateTime<Utc>,
    },

    /// Run stopped on request
    RunCancelled {
        run_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Run aborted with an error
    RunFailed {
        run_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ScrapeEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            ScrapeEvent::RunStarted { .. } => "RunStarted",
            ScrapeEvent::RunProgress { .. } => "RunProgress",
            ScrapeEvent::RunSucceeded { .. } => "RunSucceeded",
            ScrapeEvent::RunCancelled { .. } => "RunCancelled",
            ScrapeEvent::RunFailed { .. } => "RunFailed",
        }
    }

    /// Run the event belongs to
    pub fn run_id(&self) -> Uuid {
        match self {
            ScrapeEvent::RunStarted { run_id, .. }
            | ScrapeEvent::RunProgress { run_id, .. }
            | ScrapeEvent::RunSucceeded { run_id, .. }
            | ScrapeEvent::RunCancelled { run_id, .. }
            | ScrapeEvent::RunFailed { run_id, .. } => *run_id,
        }
    }
}

/// Broadcast bus for scrape events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScrapeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ScrapeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ScrapeEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
