//! Whistle Core: data model, error taxonomy and collaborator contracts
//!
//! Shared vocabulary for the confidential report lifecycle. The ledger and
//! the encryption engine are only known through the traits defined here.

pub mod config;
pub mod context;
pub mod data_model;
pub mod error;
pub mod gateway;
pub mod ledger;

pub use config::{ConfigError, OrchestratorConfig};
pub use context::SessionContext;
pub use data_model::{
    Category, ContractAddress, CreateReportRequest, DecryptionProof, DecryptionResult,
    Disclosure, EncryptedHandle, EncryptedInput, Identity, LedgerRecord, Report, ReportDraft,
    TxHandle, TxReceipt, VerificationRequest,
};
pub use error::{GatewayError, LedgerError, Rejection, WhistleError};
pub use gateway::{EncryptionGateway, ProofSink};
pub use ledger::LedgerClient;

/// Engine version
pub const WHISTLE_VERSION: &str = "1.0.0";
