//! Unified Error Model
use thiserror::Error;

/// Why the ledger refused a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Verification already completed by someone
    AlreadyVerified,
    /// Signer is not allowed to perform the call
    Unauthorized,
    /// Any other revert
    Other,
}

/// Failure reported by a Ledger Client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger read failed: {0}")]
    Read(String),

    #[error("transaction rejected: {message}")]
    Rejected { reason: Rejection, message: String },

    #[error("user rejected transaction")]
    UserDeclined,

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// Build a write rejection from a raw revert message.
    ///
    /// Only for ledgers without coded revert reasons; adapters that can
    /// decode a reason should construct `Rejected` directly.
    pub fn from_revert_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("user rejected") || lower.contains("user denied") {
            return LedgerError::UserDeclined;
        }
        let reason = if lower.contains("already verified") {
            Rejection::AlreadyVerified
        } else if lower.contains("unauthorized") || lower.contains("not authorized") {
            Rejection::Unauthorized
        } else {
            Rejection::Other
        };
        LedgerError::Rejected { reason, message }
    }

    pub fn is_already_verified(&self) -> bool {
        matches!(
            self,
            LedgerError::Rejected { reason: Rejection::AlreadyVerified, .. }
        )
    }
}

/// Failure reported by an Encryption Gateway
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("engine initialization failed: {0}")]
    Init(String),

    #[error("engine not initialized")]
    NotInitialized,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption protocol failed: {0}")]
    Decryption(String),

    /// The proof continuation failed after the protocol itself succeeded
    #[error("proof submission failed: {0}")]
    Continuation(LedgerError),
}

/// Errors surfaced by orchestrator operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WhistleError {
    #[error("NOT_READY/{0}")]
    NotReady(String),

    #[error("GATEWAY/INIT: {0}")]
    GatewayInitFailure(String),

    #[error("DRAFT/{0}")]
    InvalidDraft(String),

    #[error("GATEWAY/ENCRYPT: {0}")]
    EncryptionFailure(String),

    #[error("GATEWAY/DECRYPT: {0}")]
    DecryptionFailure(String),

    #[error("LEDGER/WRITE: {message}")]
    LedgerWriteRejected { reason: Rejection, message: String },

    #[error("LEDGER/READ: {0}")]
    LedgerReadFailure(String),

    #[error("USER/DECLINED: signature request was declined")]
    UserDeclinedSignature,
}

impl WhistleError {
    /// Soft cancellations are not reported with error severity
    pub fn is_cancellation(&self) -> bool {
        matches!(self, WhistleError::UserDeclinedSignature)
    }

    /// Map a failed ledger read
    pub fn from_read(err: LedgerError) -> Self {
        match err {
            LedgerError::UserDeclined => WhistleError::UserDeclinedSignature,
            other => WhistleError::LedgerReadFailure(other.to_string()),
        }
    }

    /// Map a failed ledger write or finality wait
    pub fn from_write(err: LedgerError) -> Self {
        match err {
            LedgerError::UserDeclined => WhistleError::UserDeclinedSignature,
            LedgerError::Rejected { reason, message } => {
                WhistleError::LedgerWriteRejected { reason, message }
            }
            other => WhistleError::LedgerWriteRejected {
                reason: Rejection::Other,
                message: other.to_string(),
            },
        }
    }

    /// Map a gateway failure, keeping protocol and continuation failures apart
    pub fn from_gateway(err: GatewayError) -> Self {
        match err {
            GatewayError::Init(msg) => WhistleError::GatewayInitFailure(msg),
            GatewayError::NotInitialized => {
                WhistleError::NotReady("encryption engine not initialized".into())
            }
            GatewayError::Encryption(msg) => WhistleError::EncryptionFailure(msg),
            GatewayError::Decryption(msg) => WhistleError::DecryptionFailure(msg),
            GatewayError::Continuation(ledger) => WhistleError::from_write(ledger),
        }
    }
}
