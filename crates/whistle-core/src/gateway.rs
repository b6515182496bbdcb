//! Encryption Gateway contract
use async_trait::async_trait;

use crate::data_model::{
    ContractAddress, DecryptionProof, DecryptionResult, EncryptedHandle, EncryptedInput,
    Identity, TxHandle,
};
use crate::error::{GatewayError, LedgerError};

/// Continuation invoked by the decryption protocol once clear values and
/// their proof exist. Usually submits the verification transaction.
#[async_trait]
pub trait ProofSink: Send + Sync {
    async fn on_proof_ready(&self, proof: DecryptionProof) -> Result<TxHandle, LedgerError>;
}

#[async_trait]
pub trait EncryptionGateway: Send + Sync {
    /// One-time session handshake. Calling again after success is a no-op.
    async fn initialize(&self) -> Result<(), GatewayError>;

    fn is_initialized(&self) -> bool;

    async fn encrypt(
        &self,
        contract: &ContractAddress,
        submitter: &Identity,
        value: u64,
    ) -> Result<EncryptedInput, GatewayError>;

    /// Run multi-party decrypt-and-prove for `handles`, handing the proof to
    /// `sink` before returning. A sink failure is returned as
    /// `GatewayError::Continuation`.
    async fn request_decryption(
        &self,
        handles: &[EncryptedHandle],
        contract: &ContractAddress,
        sink: &dyn ProofSink,
    ) -> Result<DecryptionResult, GatewayError>;
}
