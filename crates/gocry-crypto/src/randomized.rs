//! In-memory AES-256-CTR + HMAC-SHA256 envelopes
//!
//! Envelope format (binary):
//! ```text
//! [7 bytes: header, mode 0x02][16 bytes: random IV][N bytes: ciphertext][32 bytes: HMAC tag]
//! tag = HMAC-SHA256(mac_key, header || IV || ciphertext)
//! ```
//!
//! The tag is verified over the whole envelope before any byte of plaintext
//! is produced.

use aes::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use gocry_core::{CipherKind, GocryError, GocryResult};

use crate::envelope::{decode_header, encode_header, HEADER_SIZE};
use crate::kdf::{derive_keys, DerivedKeys};
use crate::key::SecretKey;
use crate::{IV_SIZE, TAG_SIZE};

pub(crate) type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;
pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Smallest well-formed randomized envelope (empty plaintext)
pub const MIN_ENVELOPE_SIZE: usize = HEADER_SIZE + IV_SIZE + TAG_SIZE;

pub(crate) fn new_ctr(keys: &DerivedKeys, iv: &[u8; IV_SIZE]) -> Aes256Ctr {
    Aes256Ctr::new(keys.enc_key().into(), iv.into())
}

pub(crate) fn new_mac(keys: &DerivedKeys) -> GocryResult<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(keys.mac_key())
        .map_err(|e| GocryError::Key(format!("HMAC key rejected: {e}")))
}

pub(crate) fn random_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

/// Encrypt `plaintext` under a fresh random IV.
///
/// Returns: `[header][16-byte IV][ciphertext][32-byte tag]`
pub fn encrypt(key: &SecretKey, plaintext: &[u8]) -> GocryResult<Vec<u8>> {
    let keys = derive_keys(key.randomized()?)?;
    let iv = random_iv();

    let mut out = Vec::with_capacity(MIN_ENVELOPE_SIZE + plaintext.len());
    out.extend_from_slice(&encode_header(CipherKind::Randomized));
    out.extend_from_slice(&iv);

    let body_start = out.len();
    out.extend_from_slice(plaintext);
    new_ctr(&keys, &iv).apply_keystream(&mut out[body_start..]);

    let mut mac = new_mac(&keys)?;
    mac.update(&out);
    out.extend_from_slice(&mac.finalize().into_bytes());

    Ok(out)
}

/// Verify and decrypt an envelope produced by [`encrypt`] or by the
/// streaming encryptor.
pub fn decrypt(key: &SecretKey, envelope: &[u8]) -> GocryResult<Vec<u8>> {
    if envelope.len() < MIN_ENVELOPE_SIZE {
        return Err(GocryError::Format(format!(
            "randomized envelope too short: {} bytes (minimum {MIN_ENVELOPE_SIZE})",
            envelope.len()
        )));
    }

    let (header, rest) = envelope.split_at(HEADER_SIZE);
    if decode_header(header)? != CipherKind::Randomized {
        return Err(GocryError::Format(
            "unexpected mode for randomized decryption".into(),
        ));
    }

    let keys = derive_keys(key.randomized()?)?;

    let (authenticated, tag) = envelope.split_at(envelope.len() - TAG_SIZE);
    let mut mac = new_mac(&keys)?;
    mac.update(authenticated);
    mac.verify_slice(tag).map_err(|_| GocryError::Authentication)?;

    let (iv, body) = rest[..rest.len() - TAG_SIZE]
        .split_first_chunk::<IV_SIZE>()
        .ok_or_else(|| GocryError::Format("missing initialization vector".into()))?;

    let mut plaintext = body.to_vec();
    new_ctr(&keys, iv).apply_keystream(&mut plaintext);
    Ok(plaintext)
}
