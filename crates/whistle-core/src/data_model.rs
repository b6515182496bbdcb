//! Data Model: Report, ReportDraft, ledger records and opaque handles
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::WhistleError;

/// Lowest accepted public risk level
pub const MIN_RISK_LEVEL: u8 = 1;
/// Highest accepted public risk level
pub const MAX_RISK_LEVEL: u8 = 10;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// Connected submitter identity (wallet address)
    Identity
);
opaque_id!(
    /// Address of the contract that stores the reports
    ContractAddress
);
opaque_id!(
    /// Ledger-side reference to an encrypted value
    EncryptedHandle
);
opaque_id!(
    /// Reference to a submitted, possibly unconfirmed, transaction
    TxHandle
);

/// Report category. The ledger does not store it, so it is only known
/// locally for reports submitted in this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    Corruption,
    Fraud,
    Safety,
    Environment,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Corruption,
        Category::Fraud,
        Category::Safety,
        Category::Environment,
        Category::Other,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Category::Corruption => "corruption",
            Category::Fraud => "fraud",
            Category::Safety => "safety",
            Category::Environment => "environment",
            Category::Other => "other",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Whether a report's confidential value is public yet.
///
/// `Revealed` carries the clear value, so a value can never exist for an
/// unverified report and a verified report can never lack one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "clear_value", rename_all = "snake_case")]
pub enum Disclosure {
    #[default]
    Sealed,
    Revealed(u64),
}

impl Disclosure {
    pub fn is_verified(&self) -> bool {
        matches!(self, Disclosure::Revealed(_))
    }

    pub fn clear_value(&self) -> Option<u64> {
        match self {
            Disclosure::Revealed(v) => Some(*v),
            Disclosure::Sealed => None,
        }
    }

    /// Monotonic merge: once revealed, stays revealed
    pub fn merge(self, incoming: Disclosure) -> Disclosure {
        match (self, incoming) {
            (Disclosure::Revealed(v), Disclosure::Sealed) => Disclosure::Revealed(v),
            (_, incoming) => incoming,
        }
    }
}

/// One confidential disclosure as seen by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub encrypted_handle: EncryptedHandle,
    /// Clear risk level in 1..=10
    pub public_risk_level: u8,
    pub disclosure: Disclosure,
    /// Set by the ledger; absent until the creating transaction is final
    pub created_at: Option<DateTime<Utc>>,
    pub creator: Option<Identity>,
}

impl Report {
    pub fn is_verified(&self) -> bool {
        self.disclosure.is_verified()
    }

    pub fn clear_value(&self) -> Option<u64> {
        self.disclosure.clear_value()
    }

    /// Map a ledger record into a report. `known_category` carries the
    /// locally known category because the ledger has none.
    pub fn from_ledger(
        id: impl Into<String>,
        record: LedgerRecord,
        known_category: Option<Category>,
    ) -> Result<Self, WhistleError> {
        let id = id.into();
        let risk = u8::try_from(record.public_value1)
            .ok()
            .filter(|r| (MIN_RISK_LEVEL..=MAX_RISK_LEVEL).contains(r))
            .ok_or_else(|| {
                WhistleError::LedgerReadFailure(format!(
                    "report {id} has risk level {} outside {MIN_RISK_LEVEL}..={MAX_RISK_LEVEL}",
                    record.public_value1
                ))
            })?;

        let disclosure = if record.is_verified {
            Disclosure::Revealed(record.clear_value)
        } else {
            Disclosure::Sealed
        };

        Ok(Self {
            id,
            title: record.title,
            description: record.description,
            category: known_category.unwrap_or_default(),
            encrypted_handle: record.encrypted_handle,
            public_risk_level: risk,
            disclosure,
            created_at: i64::try_from(record.timestamp)
                .ok()
                .and_then(|t| Utc.timestamp_opt(t, 0).single()),
            creator: Some(record.creator),
        })
    }
}

/// User input for a new report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDraft {
    pub title: String,
    #[serde(default)]
    pub category: Category,
    /// Confidential value; encrypted before it leaves the process
    pub value: u64,
    pub risk_level: u8,
    pub description: String,
}

impl ReportDraft {
    /// Reject drafts that can never become a valid report
    pub fn validate(&self) -> Result<(), WhistleError> {
        if self.title.trim().is_empty() {
            return Err(WhistleError::InvalidDraft("title must not be empty".into()));
        }
        if self.description.trim().is_empty() {
            return Err(WhistleError::InvalidDraft("description must not be empty".into()));
        }
        if !(MIN_RISK_LEVEL..=MAX_RISK_LEVEL).contains(&self.risk_level) {
            return Err(WhistleError::InvalidDraft(format!(
                "risk level {} outside {MIN_RISK_LEVEL}..={MAX_RISK_LEVEL}",
                self.risk_level
            )));
        }
        Ok(())
    }
}

/// Public record as returned by the ledger's `getReport`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub title: String,
    /// Public risk level
    pub public_value1: u64,
    /// Reserved second public value, always 0 at creation
    pub public_value2: u64,
    pub description: String,
    /// Unix seconds of the creating block
    pub timestamp: u64,
    pub creator: Identity,
    pub is_verified: bool,
    /// Meaningful only when `is_verified`
    pub clear_value: u64,
    pub encrypted_handle: EncryptedHandle,
}

/// Output of client-side encryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    /// Handle the ledger will store the value under
    pub handle: EncryptedHandle,
    pub encrypted_payload: Vec<u8>,
    pub proof: Vec<u8>,
}

/// Clear values plus the proof produced by multi-party decryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProof {
    pub clear_values_payload: Vec<u8>,
    pub proof: Vec<u8>,
}

/// Decoded result of multi-party decryption
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionResult {
    pub clear_values: HashMap<EncryptedHandle, u64>,
}

/// Confirmation of a final transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx: TxHandle,
    pub block_number: u64,
}

/// Signed `createReport` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReportRequest {
    pub from: Identity,
    pub id: String,
    pub title: String,
    pub encrypted: EncryptedInput,
    pub risk_level: u8,
    pub initial_value2: u64,
    pub description: String,
}

/// Signed `verifyDecryption` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub report_id: String,
    pub decryption: DecryptionProof,
}
