//! Proof continuation that lands the verification transaction
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use whistle_core::{DecryptionProof, LedgerClient, LedgerError, ProofSink, TxHandle, VerificationRequest};

/// Submits `(reportId, clearValues, proof)` once the decryption protocol
/// hands over its result, and remembers the transaction for the finality wait.
pub(crate) struct VerificationSubmitter {
    ledger: Arc<dyn LedgerClient>,
    report_id: String,
    submitted: Mutex<Option<TxHandle>>,
}

impl VerificationSubmitter {
    pub(crate) fn new(ledger: Arc<dyn LedgerClient>, report_id: &str) -> Self {
        Self {
            ledger,
            report_id: report_id.to_string(),
            submitted: Mutex::new(None),
        }
    }

    pub(crate) fn submitted(&self) -> Option<TxHandle> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl ProofSink for VerificationSubmitter {
    async fn on_proof_ready(&self, proof: DecryptionProof) -> Result<TxHandle, LedgerError> {
        let tx = self
            .ledger
            .submit_verification(VerificationRequest {
                report_id: self.report_id.clone(),
                decryption: proof,
            })
            .await?;
        tracing::debug!(report_id = %self.report_id, %tx, "verification submitted");
        *self.submitted.lock() = Some(tx.clone());
        Ok(tx)
    }
}
