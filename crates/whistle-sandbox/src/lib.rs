//! Whistle Sandbox: in-memory stand-ins for the ledger and the encryption engine
//!
//! Used by the test suites and by the API binary when no chain is
//! configured. Both collaborators count their calls and accept injected
//! faults so every failure branch of the orchestrator can be driven.

mod codec;
pub mod gateway;
pub mod ledger;

pub use gateway::{GatewayCalls, GatewayFaults, SandboxGateway};
pub use ledger::{LedgerCalls, LedgerFaults, SandboxLedger};

use std::sync::Arc;
use whistle_core::{CreateReportRequest, EncryptedHandle, Identity};

/// Default contract address of a sandbox deployment
pub const SANDBOX_CONTRACT: &str = "0x5a4db0c0ffee000000000000000000000000c0de";

/// A ledger and a gateway wired to the same contract
#[derive(Clone)]
pub struct Sandbox {
    pub ledger: Arc<SandboxLedger>,
    pub gateway: Arc<SandboxGateway>,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::with_contract(SANDBOX_CONTRACT)
    }

    pub fn with_contract(contract: &str) -> Self {
        Self {
            ledger: Arc::new(SandboxLedger::new(contract)),
            gateway: Arc::new(SandboxGateway::new(contract.as_bytes())),
        }
    }

    pub fn from_parts(ledger: SandboxLedger, gateway: SandboxGateway) -> Self {
        Self {
            ledger: Arc::new(ledger),
            gateway: Arc::new(gateway),
        }
    }

    /// Put an already-final report on the ledger without touching call
    /// counters or the gateway's initialization state.
    pub fn seed_report(
        &self,
        creator: &str,
        id: &str,
        title: &str,
        value: u64,
        risk_level: u8,
    ) -> EncryptedHandle {
        use whistle_core::LedgerClient;

        let from = Identity::from(creator);
        let encrypted = self
            .gateway
            .seal(&self.ledger.contract_address(), &from, value);
        self.ledger.insert_final(CreateReportRequest {
            from,
            id: id.to_string(),
            title: title.to_string(),
            encrypted,
            risk_level,
            initial_value2: 0,
            description: format!("{title} (seeded)"),
        })
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}
