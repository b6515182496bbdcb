//! History Log
//!
//! Append-only record of completed user actions for the current session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of completed action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    SubmitReport,
    VerifyReport,
}

/// A history entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique entry ID
    pub id: String,

    pub timestamp: DateTime<Utc>,

    pub action: HistoryAction,

    /// Human readable description
    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
}

impl HistoryEntry {
    pub fn new(action: HistoryAction, description: impl Into<String>) -> Self {
        Self {
            id: generate_history_id(),
            timestamp: Utc::now(),
            action,
            description: description.into(),
            report_id: None,
        }
    }

    pub fn with_report(mut self, report_id: impl Into<String>) -> Self {
        self.report_id = Some(report_id.into());
        self
    }
}

/// History collector
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    max_entries: usize,
    view: usize,
}

impl HistoryLog {
    /// Retain at most `max_entries`; show the last `view`
    pub fn with_limits(max_entries: usize, view: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: max_entries.max(1),
            view,
        }
    }

    pub fn append(&mut self, entry: HistoryEntry) -> String {
        let id = entry.id.clone();
        self.entries.push(entry);

        if self.entries.len() > self.max_entries {
            let drain_count = self.entries.len() - self.max_entries;
            self.entries.drain(0..drain_count);
        }
        id
    }

    pub fn record(
        &mut self,
        action: HistoryAction,
        report_id: &str,
        description: impl Into<String>,
    ) -> String {
        self.append(HistoryEntry::new(action, description).with_report(report_id))
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Tail shown to the user
    pub fn recent(&self) -> &[HistoryEntry] {
        self.tail(self.view)
    }

    pub fn tail(&self, n: usize) -> &[HistoryEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn generate_history_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("hist_{:x}_{:04x}", Utc::now().timestamp_millis(), counter % 0xFFFF)
}
