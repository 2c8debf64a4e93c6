//! Raw key material and per-mode length checks

use gocry_core::{CipherKind, GocryError, GocryResult};
use rand::RngCore;
use zeroize::Zeroize;

use crate::{DETERMINISTIC_KEY_SIZE, RANDOMIZED_KEY_SIZE};

/// A 32- or 64-byte symmetric key. Zeroized on drop.
///
/// Which length is acceptable depends on the construction; the checked
/// accessors below are the only way cipher code reaches the bytes, so a key of
/// the wrong size is rejected before any primitive is built.
#[derive(Clone)]
pub struct SecretKey {
    bytes: Vec<u8>,
}

impl SecretKey {
    pub fn new(mut bytes: Vec<u8>) -> GocryResult<Self> {
        let len = bytes.len();
        if len != RANDOMIZED_KEY_SIZE && len != DETERMINISTIC_KEY_SIZE {
            bytes.zeroize();
            return Err(GocryError::Key(format!(
                "key must be {RANDOMIZED_KEY_SIZE} or {DETERMINISTIC_KEY_SIZE} bytes \
                 ({} or {} hex chars), got {len} bytes",
                RANDOMIZED_KEY_SIZE * 2,
                DETERMINISTIC_KEY_SIZE * 2
            )));
        }
        Ok(Self { bytes })
    }

    /// Decode a hex string; surrounding whitespace is ignored.
    pub fn from_hex(encoded: &str) -> GocryResult<Self> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| GocryError::Key(format!("key is not valid hex: {e}")))?;
        Self::new(bytes)
    }

    /// Generate a random key suitable for `kind`.
    pub fn generate(kind: CipherKind) -> Self {
        let mut bytes = vec![0u8; kind.key_len()];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Fail unless this key fits `kind`.
    pub fn require(&self, kind: CipherKind) -> GocryResult<()> {
        if self.bytes.len() == kind.key_len() {
            return Ok(());
        }
        let name = match kind {
            CipherKind::Randomized => "randomized",
            CipherKind::Deterministic => "deterministic",
        };
        Err(GocryError::Key(format!(
            "{name} mode requires a {}-byte key ({} hex chars), got {} bytes",
            kind.key_len(),
            kind.key_len() * 2,
            self.bytes.len()
        )))
    }

    pub(crate) fn randomized(&self) -> GocryResult<&[u8; RANDOMIZED_KEY_SIZE]> {
        self.require(CipherKind::Randomized)?;
        self.bytes
            .first_chunk::<RANDOMIZED_KEY_SIZE>()
            .ok_or_else(|| GocryError::Key("randomized key unavailable".into()))
    }

    pub(crate) fn deterministic(&self) -> GocryResult<&[u8; DETERMINISTIC_KEY_SIZE]> {
        self.require(CipherKind::Deterministic)?;
        self.bytes
            .first_chunk::<DETERMINISTIC_KEY_SIZE>()
            .ok_or_else(|| GocryError::Key("deterministic key unavailable".into()))
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
