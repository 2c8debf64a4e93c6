//! Base64 armor for envelopes embedded in text (standard alphabet, padded)

use base64::{engine::general_purpose::STANDARD, Engine};

use gocry_core::{CipherKind, GocryError, GocryResult};

use crate::envelope::{open, seal};
use crate::key::SecretKey;

/// Seal `plaintext` and return the envelope as base64 text.
pub fn seal_armored(kind: CipherKind, key: &SecretKey, plaintext: &[u8]) -> GocryResult<String> {
    Ok(STANDARD.encode(seal(kind, key, plaintext)?))
}

/// Decode base64 text and open the envelope inside it.
pub fn open_armored(key: &SecretKey, armored: &[u8]) -> GocryResult<Vec<u8>> {
    let envelope = STANDARD
        .decode(armored)
        .map_err(|e| GocryError::Format(format!("decoding base64: {e}")))?;
    open(key, &envelope)
}
