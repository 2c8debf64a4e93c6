//! Envelope header codec and mode dispatch
//!
//! Header format (binary, fixed size):
//! ```text
//! [5 bytes: "GOCRY"][1 byte: version = 0x01][1 byte: mode]
//! mode: 0x01 = deterministic (AES-SIV), 0x02 = randomized (CTR + HMAC)
//! ```

use gocry_core::{CipherKind, GocryError, GocryResult};

use crate::key::SecretKey;
use crate::{deterministic, randomized};

pub const MAGIC: &[u8; 5] = b"GOCRY";

/// The only envelope version this build reads or writes
pub const VERSION: u8 = 1;

pub const HEADER_SIZE: usize = MAGIC.len() + 2;

const MODE_DETERMINISTIC: u8 = 0x01;
const MODE_RANDOMIZED: u8 = 0x02;

pub fn encode_header(mode: CipherKind) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[..MAGIC.len()].copy_from_slice(MAGIC);
    header[MAGIC.len()] = VERSION;
    header[MAGIC.len() + 1] = match mode {
        CipherKind::Deterministic => MODE_DETERMINISTIC,
        CipherKind::Randomized => MODE_RANDOMIZED,
    };
    header
}

/// Parse a header, rejecting any deviation from the format.
pub fn decode_header(header: &[u8]) -> GocryResult<CipherKind> {
    if header.len() != HEADER_SIZE {
        return Err(GocryError::Format(format!(
            "header must be {HEADER_SIZE} bytes, got {}",
            header.len()
        )));
    }

    if &header[..MAGIC.len()] != MAGIC {
        return Err(GocryError::Format("invalid header magic".into()));
    }

    let version = header[MAGIC.len()];
    if version != VERSION {
        return Err(GocryError::Format(format!(
            "unsupported envelope version {version}"
        )));
    }

    match header[MAGIC.len() + 1] {
        MODE_DETERMINISTIC => Ok(CipherKind::Deterministic),
        MODE_RANDOMIZED => Ok(CipherKind::Randomized),
        other => Err(GocryError::Format(format!("unsupported envelope mode {other}"))),
    }
}

/// Encrypt `plaintext` into a complete in-memory envelope.
pub fn seal(kind: CipherKind, key: &SecretKey, plaintext: &[u8]) -> GocryResult<Vec<u8>> {
    match kind {
        CipherKind::Randomized => randomized::encrypt(key, plaintext),
        CipherKind::Deterministic => deterministic::encrypt(key, plaintext),
    }
}

/// Decrypt an in-memory envelope of either mode; the header selects the cipher.
pub fn open(key: &SecretKey, envelope: &[u8]) -> GocryResult<Vec<u8>> {
    let header = envelope.get(..HEADER_SIZE).ok_or_else(|| {
        GocryError::Format(format!(
            "envelope too short: {} bytes (minimum {HEADER_SIZE})",
            envelope.len()
        ))
    })?;

    match decode_header(header)? {
        CipherKind::Randomized => randomized::decrypt(key, envelope),
        CipherKind::Deterministic => deterministic::decrypt(key, envelope),
    }
}
