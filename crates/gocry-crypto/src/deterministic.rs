//! Deterministic authenticated encryption (AES-SIV)
//!
//! Deterministic encryption (same plaintext + key = same ciphertext) is what
//! makes encrypted files diff- and dedup-friendly. The engine only needs the
//! [`DeterministicAead`] capability; [`AesSiv`] provides it with AES-256-SIV
//! (RFC 5297) and a single empty associated-data component.

use aes_siv::{aead::KeyInit, siv::Aes256Siv};
use zeroize::Zeroize;

use gocry_core::{CipherKind, GocryError, GocryResult};

use crate::envelope::{decode_header, encode_header, HEADER_SIZE};
use crate::key::SecretKey;
use crate::{DETERMINISTIC_KEY_SIZE, SIV_SIZE};

const ASSOCIATED_DATA: [&[u8]; 1] = [b""];

/// Encrypt/decrypt such that identical inputs give identical outputs.
pub trait DeterministicAead {
    fn encrypt_deterministic(&self, plaintext: &[u8]) -> GocryResult<Vec<u8>>;

    /// Fails with [`GocryError::Authentication`] on any tampering.
    fn decrypt_deterministic(&self, ciphertext: &[u8]) -> GocryResult<Vec<u8>>;
}

/// AES-256-SIV keyed with 64 bytes. Zeroized on drop.
pub struct AesSiv {
    key: [u8; DETERMINISTIC_KEY_SIZE],
}

impl AesSiv {
    pub fn new(key: &[u8; DETERMINISTIC_KEY_SIZE]) -> Self {
        Self { key: *key }
    }

    fn cipher(&self) -> Aes256Siv {
        Aes256Siv::new((&self.key).into())
    }
}

impl Drop for AesSiv {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for AesSiv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesSiv").field("key", &"[REDACTED]").finish()
    }
}

impl DeterministicAead for AesSiv {
    fn encrypt_deterministic(&self, plaintext: &[u8]) -> GocryResult<Vec<u8>> {
        self.cipher()
            .encrypt(ASSOCIATED_DATA, plaintext)
            .map_err(|e| GocryError::Format(format!("AES-SIV encryption failed: {e}")))
    }

    fn decrypt_deterministic(&self, ciphertext: &[u8]) -> GocryResult<Vec<u8>> {
        if ciphertext.len() < SIV_SIZE {
            return Err(GocryError::Format(format!(
                "deterministic payload too short: {} bytes (minimum {SIV_SIZE})",
                ciphertext.len()
            )));
        }
        self.cipher()
            .decrypt(ASSOCIATED_DATA, ciphertext)
            .map_err(|_| GocryError::Authentication)
    }
}

/// Build the capability for `key`, checking its length first.
pub fn cipher_for(key: &SecretKey) -> GocryResult<AesSiv> {
    Ok(AesSiv::new(key.deterministic()?))
}

/// Encrypt into a complete envelope: `[header, mode 0x01][SIV output]`
pub fn encrypt(key: &SecretKey, plaintext: &[u8]) -> GocryResult<Vec<u8>> {
    let payload = cipher_for(key)?.encrypt_deterministic(plaintext)?;

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&encode_header(CipherKind::Deterministic));
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decrypt a complete envelope produced by [`encrypt`].
pub fn decrypt(key: &SecretKey, envelope: &[u8]) -> GocryResult<Vec<u8>> {
    let header = envelope.get(..HEADER_SIZE).ok_or_else(|| {
        GocryError::Format(format!(
            "envelope too short: {} bytes (minimum {HEADER_SIZE})",
            envelope.len()
        ))
    })?;
    if decode_header(header)? != CipherKind::Deterministic {
        return Err(GocryError::Format(
            "unexpected mode for deterministic decryption".into(),
        ));
    }

    cipher_for(key)?.decrypt_deterministic(&envelope[HEADER_SIZE..])
}
