//! Sandbox Ledger
//!
//! In-memory report contract. Writes are queued as pending transactions
//! and take effect in `await_finality`, which is where reverts surface.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use whistle_core::{
    ContractAddress, CreateReportRequest, EncryptedHandle, Identity, LedgerClient, LedgerError,
    LedgerRecord, Rejection, TxHandle, TxReceipt, VerificationRequest,
};

use crate::codec;

const ALREADY_VERIFIED: &str = "Data already verified";

/// Per-operation call counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCalls {
    pub list_report_ids: usize,
    pub get_report: usize,
    pub get_encrypted_handle: usize,
    pub check_liveness: usize,
    pub create_report: usize,
    pub submit_verification: usize,
    pub await_finality: usize,
}

impl LedgerCalls {
    pub fn total(&self) -> usize {
        self.list_report_ids
            + self.get_report
            + self.get_encrypted_handle
            + self.check_liveness
            + self.create_report
            + self.submit_verification
            + self.await_finality
    }

    pub fn writes(&self) -> usize {
        self.create_report + self.submit_verification
    }
}

#[derive(Default)]
struct Counters {
    list_report_ids: AtomicUsize,
    get_report: AtomicUsize,
    get_encrypted_handle: AtomicUsize,
    check_liveness: AtomicUsize,
    create_report: AtomicUsize,
    submit_verification: AtomicUsize,
    await_finality: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// Injected failures and concurrent-actor behavior
#[derive(Debug, Clone, Default)]
pub struct LedgerFaults {
    /// `list_report_ids` fails
    pub fail_listing: bool,
    /// Reads of these ids fail
    pub fail_reads: HashSet<String>,
    /// The next signature request is declined by the user
    pub decline_next_signature: bool,
    /// The next write is reverted at finality with this message
    pub revert_next_finality: Option<String>,
    /// Another party verifies the report right before our submission lands
    pub external_verify_on_submit: bool,
    /// Another party verifies the report while our transaction is pending
    pub external_verify_before_finality: bool,
    /// `check_liveness` errors out
    pub fail_liveness: bool,
}

enum PendingTx {
    Create(CreateReportRequest),
    Verify { report_id: String, value: u64 },
}

#[derive(Default)]
struct LedgerState {
    records: HashMap<String, LedgerRecord>,
    order: Vec<String>,
    pending: HashMap<TxHandle, PendingTx>,
    next_tx: u64,
    block: u64,
    available: bool,
}

impl LedgerState {
    fn insert(&mut self, id: String, record: LedgerRecord) {
        if !self.records.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.records.insert(id, record);
    }

    fn enqueue(&mut self, tx: PendingTx) -> TxHandle {
        self.next_tx += 1;
        let handle = TxHandle::new(format!("0xtx{:06x}", self.next_tx));
        self.pending.insert(handle.clone(), tx);
        handle
    }

    fn reveal(&mut self, report_id: &str, value: u64) -> bool {
        match self.records.get_mut(report_id) {
            Some(record) if !record.is_verified => {
                record.is_verified = true;
                record.clear_value = value;
                true
            }
            _ => false,
        }
    }
}

fn already_verified() -> LedgerError {
    LedgerError::Rejected {
        reason: Rejection::AlreadyVerified,
        message: ALREADY_VERIFIED.to_string(),
    }
}

/// Record as stored once a create transaction is mined
fn mined_record(request: CreateReportRequest) -> (String, LedgerRecord) {
    let record = LedgerRecord {
        title: request.title,
        public_value1: request.risk_level as u64,
        public_value2: request.initial_value2,
        description: request.description,
        timestamp: chrono::Utc::now().timestamp().max(0) as u64,
        creator: request.from,
        is_verified: false,
        clear_value: 0,
        encrypted_handle: codec::handle_for(&request.encrypted.encrypted_payload),
    };
    (request.id, record)
}

fn revert(message: impl Into<String>) -> LedgerError {
    LedgerError::Rejected {
        reason: Rejection::Other,
        message: message.into(),
    }
}

pub struct SandboxLedger {
    contract: ContractAddress,
    state: Mutex<LedgerState>,
    faults: Mutex<LedgerFaults>,
    counters: Counters,
    finality_delay: Duration,
}

impl SandboxLedger {
    pub fn new(contract: impl Into<ContractAddress>) -> Self {
        Self {
            contract: contract.into(),
            state: Mutex::new(LedgerState {
                available: true,
                ..Default::default()
            }),
            faults: Mutex::new(LedgerFaults::default()),
            counters: Counters::default(),
            finality_delay: Duration::ZERO,
        }
    }

    /// Simulated block time
    pub fn with_finality_delay(mut self, delay: Duration) -> Self {
        self.finality_delay = delay;
        self
    }

    pub fn set_faults(&self, faults: LedgerFaults) {
        *self.faults.lock() = faults;
    }

    pub fn update_faults(&self, update: impl FnOnce(&mut LedgerFaults)) {
        update(&mut self.faults.lock());
    }

    pub fn set_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    pub fn calls(&self) -> LedgerCalls {
        let c = &self.counters;
        LedgerCalls {
            list_report_ids: c.list_report_ids.load(Ordering::SeqCst),
            get_report: c.get_report.load(Ordering::SeqCst),
            get_encrypted_handle: c.get_encrypted_handle.load(Ordering::SeqCst),
            check_liveness: c.check_liveness.load(Ordering::SeqCst),
            create_report: c.create_report.load(Ordering::SeqCst),
            submit_verification: c.submit_verification.load(Ordering::SeqCst),
            await_finality: c.await_finality.load(Ordering::SeqCst),
        }
    }

    /// Current on-chain record, bypassing counters and faults
    pub fn record(&self, id: &str) -> Option<LedgerRecord> {
        self.state.lock().records.get(id).cloned()
    }

    pub fn creator_of(&self, id: &str) -> Option<Identity> {
        self.state.lock().records.get(id).map(|r| r.creator.clone())
    }

    pub fn report_count(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Another party completes verification out of band
    pub fn verify_externally(&self, report_id: &str, value: u64) -> bool {
        self.state.lock().reveal(report_id, value)
    }

    /// Write a final record directly, as if mined in an earlier session
    pub(crate) fn insert_final(&self, request: CreateReportRequest) -> EncryptedHandle {
        let mut state = self.state.lock();
        state.block += 1;
        let (id, record) = mined_record(request);
        let handle = record.encrypted_handle.clone();
        state.insert(id, record);
        handle
    }

    /// Consume a pending signature decline, if armed
    fn take_decline(&self) -> bool {
        std::mem::take(&mut self.faults.lock().decline_next_signature)
    }

    fn check_read(&self, id: &str) -> Result<(), LedgerError> {
        if self.faults.lock().fail_reads.contains(id) {
            return Err(LedgerError::Read(format!("rpc error reading {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for SandboxLedger {
    fn contract_address(&self) -> ContractAddress {
        self.contract.clone()
    }

    async fn list_report_ids(&self) -> Result<Vec<String>, LedgerError> {
        bump(&self.counters.list_report_ids);
        if self.faults.lock().fail_listing {
            return Err(LedgerError::Read("rpc error listing report ids".into()));
        }
        Ok(self.state.lock().order.clone())
    }

    async fn get_report(&self, id: &str) -> Result<LedgerRecord, LedgerError> {
        bump(&self.counters.get_report);
        self.check_read(id)?;
        self.state
            .lock()
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::Read(format!("report {id} not found")))
    }

    async fn get_encrypted_handle(&self, id: &str) -> Result<EncryptedHandle, LedgerError> {
        bump(&self.counters.get_encrypted_handle);
        self.check_read(id)?;
        self.state
            .lock()
            .records
            .get(id)
            .map(|r| r.encrypted_handle.clone())
            .ok_or_else(|| LedgerError::Read(format!("report {id} not found")))
    }

    async fn check_liveness(&self) -> Result<bool, LedgerError> {
        bump(&self.counters.check_liveness);
        if self.faults.lock().fail_liveness {
            return Err(LedgerError::Unavailable("node did not answer".into()));
        }
        Ok(self.state.lock().available)
    }

    async fn create_report(&self, request: CreateReportRequest) -> Result<TxHandle, LedgerError> {
        bump(&self.counters.create_report);
        if self.take_decline() {
            return Err(LedgerError::UserDeclined);
        }
        let expected = codec::input_proof(
            &self.contract,
            &request.from,
            &request.encrypted.encrypted_payload,
        );
        if expected != request.encrypted.proof {
            return Err(revert("invalid input proof"));
        }

        let mut state = self.state.lock();
        if state.records.contains_key(&request.id) {
            return Err(revert(format!("report {} already exists", request.id)));
        }
        let tx = state.enqueue(PendingTx::Create(request));
        tracing::debug!(%tx, "sandbox create queued");
        Ok(tx)
    }

    async fn submit_verification(
        &self,
        request: VerificationRequest,
    ) -> Result<TxHandle, LedgerError> {
        bump(&self.counters.submit_verification);
        if self.take_decline() {
            return Err(LedgerError::UserDeclined);
        }

        let proof = codec::decryption_proof(&self.contract, &request.decryption.clear_values_payload);
        if proof != request.decryption.proof {
            return Err(revert("invalid decryption proof"));
        }
        let value = codec::decode_clear_values(&request.decryption.clear_values_payload)
            .and_then(|values| values.first().copied())
            .ok_or_else(|| revert("malformed clear values"))?;

        let external = self.faults.lock().external_verify_on_submit;
        let mut state = self.state.lock();
        if external {
            state.reveal(&request.report_id, value);
        }
        match state.records.get(&request.report_id) {
            None => return Err(revert(format!("report {} not found", request.report_id))),
            Some(record) if record.is_verified => return Err(already_verified()),
            Some(_) => {}
        }
        let tx = state.enqueue(PendingTx::Verify {
            report_id: request.report_id,
            value,
        });
        tracing::debug!(%tx, "sandbox verification queued");
        Ok(tx)
    }

    async fn await_finality(&self, tx: &TxHandle) -> Result<TxReceipt, LedgerError> {
        bump(&self.counters.await_finality);
        if !self.finality_delay.is_zero() {
            tokio::time::sleep(self.finality_delay).await;
        }

        let (forced_revert, external) = {
            let mut faults = self.faults.lock();
            (
                faults.revert_next_finality.take(),
                faults.external_verify_before_finality,
            )
        };

        let mut state = self.state.lock();
        let pending = state
            .pending
            .remove(tx)
            .ok_or_else(|| LedgerError::Read(format!("unknown transaction {tx}")))?;
        if let Some(message) = forced_revert {
            return Err(LedgerError::from_revert_message(message));
        }

        match pending {
            PendingTx::Create(request) => {
                if state.records.contains_key(&request.id) {
                    return Err(revert(format!("report {} already exists", request.id)));
                }
                let (id, record) = mined_record(request);
                state.insert(id, record);
            }
            PendingTx::Verify { report_id, value } => {
                if external {
                    state.reveal(&report_id, value);
                }
                if !state.reveal(&report_id, value) {
                    return Err(already_verified());
                }
            }
        }

        state.block += 1;
        Ok(TxReceipt {
            tx: tx.clone(),
            block_number: state.block,
        })
    }
}
