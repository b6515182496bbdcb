//! Status Channel
//!
//! Holds exactly one current notification. Each `set` overwrites the
//! previous one; an expiring notification is cleared after its display
//! duration unless a newer one replaced it first.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTag {
    Pending,
    Success,
    Error,
    /// User backed out; rendered as a neutral notice
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Increases with every `set`
    pub seq: u64,
    pub tag: StatusTag,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_expire_ms: Option<u64>,
    pub set_at: DateTime<Utc>,
}

struct Slot {
    seq: u64,
    deadline: Option<Instant>,
}

struct Shared {
    tx: watch::Sender<Option<Status>>,
    slot: Mutex<Slot>,
}

/// Single-writer, many-reader notification slot
#[derive(Clone)]
pub struct StatusChannel {
    shared: Arc<Shared>,
}

impl StatusChannel {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                tx,
                slot: Mutex::new(Slot { seq: 0, deadline: None }),
            }),
        }
    }

    /// Overwrite the current notification; returns its sequence number
    pub fn set(
        &self,
        tag: StatusTag,
        message: impl Into<String>,
        auto_expire: Option<Duration>,
    ) -> u64 {
        let message = message.into();
        let seq = {
            let mut slot = self.shared.slot.lock();
            slot.seq += 1;
            slot.deadline = auto_expire.map(|d| Instant::now() + d);
            self.shared.tx.send_replace(Some(Status {
                seq: slot.seq,
                tag,
                message: message.clone(),
                auto_expire_ms: auto_expire.map(|d| d.as_millis() as u64),
                set_at: Utc::now(),
            }));
            slot.seq
        };
        tracing::debug!(seq, ?tag, %message, "status set");

        if let Some(after) = auto_expire {
            // Without a runtime the slot still expires lazily on read
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let shared = Arc::downgrade(&self.shared);
                handle.spawn(async move {
                    tokio::time::sleep(after).await;
                    if let Some(shared) = shared.upgrade() {
                        clear_if_current(&shared, seq);
                    }
                });
            }
        }
        seq
    }

    pub fn pending(&self, message: impl Into<String>) -> u64 {
        self.set(StatusTag::Pending, message, None)
    }

    pub fn success(&self, message: impl Into<String>, display: Duration) -> u64 {
        self.set(StatusTag::Success, message, Some(display))
    }

    pub fn error(&self, message: impl Into<String>, display: Duration) -> u64 {
        self.set(StatusTag::Error, message, Some(display))
    }

    pub fn cancelled(&self, message: impl Into<String>, display: Duration) -> u64 {
        self.set(StatusTag::Cancelled, message, Some(display))
    }

    /// Current notification, or `None` if empty or expired
    pub fn current(&self) -> Option<Status> {
        let slot = self.shared.slot.lock();
        if matches!(slot.deadline, Some(deadline) if Instant::now() >= deadline) {
            return None;
        }
        self.shared.tx.borrow().clone()
    }

    pub fn clear(&self) {
        let mut slot = self.shared.slot.lock();
        slot.deadline = None;
        self.shared.tx.send_replace(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Status>> {
        self.shared.tx.subscribe()
    }
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn clear_if_current(shared: &Shared, seq: u64) {
    let mut slot = shared.slot.lock();
    if slot.seq == seq {
        slot.deadline = None;
        shared.tx.send_replace(None);
        tracing::trace!(seq, "status expired");
    }
}
