//! Whistle Orchestrator: the confidential report lifecycle
//!
//! # Flow
//!
//! ```text
//! submit:  encrypt → createReport → finality → upsert → refresh
//! verify:  getReport ─┬─ verified ──────────────────────────────→ value
//!                     └─ sealed → handle → decrypt+prove → submit → finality → refresh → value
//!                                                      └── "already verified" ──→ re-read → value
//! refresh: listIds → getReport* → replaceAll
//! ```

pub mod gate;
mod ids;
pub mod orchestrator;
pub mod steps;
mod submitter;

pub use gate::{EngineGate, GateState};
pub use ids::ReportIdGenerator;
pub use orchestrator::{Orchestrator, RefreshSummary};
pub use steps::{StepRecord, StepTrace};
