//! Byte formats shared by the sandbox ledger and gateway
use whistle_core::{ContractAddress, EncryptedHandle, Identity};

const INPUT_PROOF_CONTEXT: &str = "whistle-sandbox 2024 input proof";
const DECRYPTION_PROOF_CONTEXT: &str = "whistle-sandbox 2024 decryption proof";
const WORD: usize = 32;

pub(crate) fn handle_for(ciphertext: &[u8]) -> EncryptedHandle {
    EncryptedHandle::new(format!("0x{}", blake3::hash(ciphertext).to_hex()))
}

pub(crate) fn input_proof(
    contract: &ContractAddress,
    submitter: &Identity,
    ciphertext: &[u8],
) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new_derive_key(INPUT_PROOF_CONTEXT);
    hasher.update(contract.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(submitter.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(ciphertext);
    hasher.finalize().as_bytes().to_vec()
}

pub(crate) fn decryption_proof(contract: &ContractAddress, clear_values: &[u8]) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new_derive_key(DECRYPTION_PROOF_CONTEXT);
    hasher.update(contract.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(clear_values);
    hasher.finalize().as_bytes().to_vec()
}

/// One big-endian 32-byte word per value
pub(crate) fn encode_clear_values(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * WORD);
    for value in values {
        out.extend_from_slice(&[0u8; WORD - 8]);
        out.extend_from_slice(&value.to_be_bytes());
    }
    out
}

pub(crate) fn decode_clear_values(payload: &[u8]) -> Option<Vec<u64>> {
    if payload.is_empty() || payload.len() % WORD != 0 {
        return None;
    }
    payload
        .chunks(WORD)
        .map(|word| {
            let (high, low) = word.split_at(WORD - 8);
            if high.iter().any(|b| *b != 0) {
                return None;
            }
            let mut buf = [0u8; 8];
            buf.copy_from_slice(low);
            Some(u64::from_be_bytes(buf))
        })
        .collect()
}
