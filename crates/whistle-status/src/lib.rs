//! Whistle Status: the notification slot and history log observed by the UI
pub mod channel;
pub mod history;

pub use channel::{Status, StatusChannel, StatusTag};
pub use history::{HistoryAction, HistoryEntry, HistoryLog};
