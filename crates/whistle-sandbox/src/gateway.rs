//! Sandbox Encryption Gateway
//!
//! Stands in for the key-share holders: it remembers every value it
//! encrypted and reveals it again through a simulated decrypt-and-prove
//! round.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use whistle_core::{
    ContractAddress, DecryptionProof, DecryptionResult, EncryptedHandle, EncryptedInput,
    EncryptionGateway, GatewayError, Identity, ProofSink,
};

use crate::codec;

/// Per-operation call counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayCalls {
    pub initialize: usize,
    pub encrypt: usize,
    pub request_decryption: usize,
}

impl GatewayCalls {
    pub fn total(&self) -> usize {
        self.initialize + self.encrypt + self.request_decryption
    }
}

#[derive(Default)]
struct Counters {
    initialize: AtomicUsize,
    encrypt: AtomicUsize,
    request_decryption: AtomicUsize,
}

/// Injected failures; each one fires until cleared
#[derive(Debug, Clone, Default)]
pub struct GatewayFaults {
    pub fail_init: Option<String>,
    pub fail_encrypt: Option<String>,
    pub fail_decrypt: Option<String>,
}

pub struct SandboxGateway {
    key: [u8; 32],
    initialized: AtomicBool,
    nonce: AtomicU64,
    /// handle -> plaintext, i.e. what the key-share holders can jointly reveal
    plaintexts: Mutex<HashMap<EncryptedHandle, u64>>,
    faults: Mutex<GatewayFaults>,
    counters: Counters,
    latency: Duration,
}

impl SandboxGateway {
    pub fn new(seed: &[u8]) -> Self {
        Self {
            key: blake3::derive_key("whistle-sandbox 2024 gateway key", seed),
            initialized: AtomicBool::new(false),
            nonce: AtomicU64::new(0),
            plaintexts: Mutex::new(HashMap::new()),
            faults: Mutex::new(GatewayFaults::default()),
            counters: Counters::default(),
            latency: Duration::ZERO,
        }
    }

    /// Simulated proof-generation time for encrypt and decrypt
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_faults(&self, faults: GatewayFaults) {
        *self.faults.lock() = faults;
    }

    pub fn faults(&self) -> GatewayFaults {
        self.faults.lock().clone()
    }

    pub fn calls(&self) -> GatewayCalls {
        GatewayCalls {
            initialize: self.counters.initialize.load(Ordering::SeqCst),
            encrypt: self.counters.encrypt.load(Ordering::SeqCst),
            request_decryption: self.counters.request_decryption.load(Ordering::SeqCst),
        }
    }

    /// Encrypt without counting the call or requiring initialization
    pub(crate) fn seal(
        &self,
        contract: &ContractAddress,
        submitter: &Identity,
        value: u64,
    ) -> EncryptedInput {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst).to_be_bytes();
        let mut keyed = blake3::Hasher::new_keyed(&self.key);
        keyed.update(&nonce);
        let mask = keyed.finalize();

        let mut masked = [0u8; 8];
        for (i, b) in value.to_be_bytes().iter().enumerate() {
            masked[i] = b ^ mask.as_bytes()[i];
        }

        let mut ciphertext = Vec::with_capacity(16);
        ciphertext.extend_from_slice(&nonce);
        ciphertext.extend_from_slice(&masked);

        let handle = codec::handle_for(&ciphertext);
        self.plaintexts.lock().insert(handle.clone(), value);

        EncryptedInput {
            handle,
            proof: codec::input_proof(contract, submitter, &ciphertext),
            encrypted_payload: ciphertext,
        }
    }

    async fn simulate_work(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl EncryptionGateway for SandboxGateway {
    async fn initialize(&self) -> Result<(), GatewayError> {
        self.counters.initialize.fetch_add(1, Ordering::SeqCst);
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(reason) = self.faults.lock().fail_init.clone() {
            return Err(GatewayError::Init(reason));
        }
        self.simulate_work().await;
        self.initialized.store(true, Ordering::SeqCst);
        tracing::debug!("sandbox gateway initialized");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn encrypt(
        &self,
        contract: &ContractAddress,
        submitter: &Identity,
        value: u64,
    ) -> Result<EncryptedInput, GatewayError> {
        self.counters.encrypt.fetch_add(1, Ordering::SeqCst);
        if !self.is_initialized() {
            return Err(GatewayError::NotInitialized);
        }
        if let Some(reason) = self.faults.lock().fail_encrypt.clone() {
            return Err(GatewayError::Encryption(reason));
        }
        self.simulate_work().await;
        Ok(self.seal(contract, submitter, value))
    }

    async fn request_decryption(
        &self,
        handles: &[EncryptedHandle],
        contract: &ContractAddress,
        sink: &dyn ProofSink,
    ) -> Result<DecryptionResult, GatewayError> {
        self.counters.request_decryption.fetch_add(1, Ordering::SeqCst);
        if !self.is_initialized() {
            return Err(GatewayError::NotInitialized);
        }
        if let Some(reason) = self.faults.lock().fail_decrypt.clone() {
            return Err(GatewayError::Decryption(reason));
        }

        let values = {
            let plaintexts = self.plaintexts.lock();
            handles
                .iter()
                .map(|h| {
                    plaintexts
                        .get(h)
                        .copied()
                        .ok_or_else(|| GatewayError::Decryption(format!("no key shares for handle {h}")))
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        self.simulate_work().await;

        let clear_values_payload = codec::encode_clear_values(&values);
        let proof = DecryptionProof {
            proof: codec::decryption_proof(contract, &clear_values_payload),
            clear_values_payload,
        };
        sink.on_proof_ready(proof)
            .await
            .map_err(GatewayError::Continuation)?;

        Ok(DecryptionResult {
            clear_values: handles.iter().cloned().zip(values).collect(),
        })
    }
}
