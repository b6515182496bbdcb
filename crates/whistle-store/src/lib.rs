//! Whistle Store: the session cache the UI renders from
//!
//! Only the orchestrator writes here. Verification state merges
//! monotonically, so no write path can re-seal a revealed report.
pub mod report_store;
pub mod snapshot;

pub use report_store::ReportStore;
pub use snapshot::{ReportStats, StoreSnapshot};
