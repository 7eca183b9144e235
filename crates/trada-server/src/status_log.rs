//! Bounded in-memory log of server activity, readable by remote clients.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tracing::info;
use trada_core::Clock;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Keeps the most recent `capacity` entries; older ones are dropped.
pub struct StatusLog {
    entries: RwLock<VecDeque<LogEntry>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl StatusLog {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            clock,
        }
    }

    /// Record a message and echo it to tracing.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "status", "{}", message);

        if self.capacity == 0 {
            return;
        }
        let entry = LogEntry {
            timestamp: self.clock.now(),
            message,
        };
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Entries oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
