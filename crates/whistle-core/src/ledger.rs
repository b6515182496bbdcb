//! Ledger Client contract: read and signed-write views of the report contract
use async_trait::async_trait;

use crate::data_model::{
    ContractAddress, CreateReportRequest, EncryptedHandle, LedgerRecord, TxHandle, TxReceipt,
    VerificationRequest,
};
use crate::error::LedgerError;

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Address of the contract this client talks to
    fn contract_address(&self) -> ContractAddress;

    // === Read ===

    async fn list_report_ids(&self) -> Result<Vec<String>, LedgerError>;

    async fn get_report(&self, id: &str) -> Result<LedgerRecord, LedgerError>;

    async fn get_encrypted_handle(&self, id: &str) -> Result<EncryptedHandle, LedgerError>;

    async fn check_liveness(&self) -> Result<bool, LedgerError>;

    // === Write (signed) ===

    async fn create_report(&self, request: CreateReportRequest) -> Result<TxHandle, LedgerError>;

    async fn submit_verification(
        &self,
        request: VerificationRequest,
    ) -> Result<TxHandle, LedgerError>;

    /// Resolve once the transaction is durable. Reverts surface here as
    /// `LedgerError::Rejected`.
    async fn await_finality(&self, tx: &TxHandle) -> Result<TxReceipt, LedgerError>;
}
