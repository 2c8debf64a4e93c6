//! Key derivation: one 32-byte key → independent CTR and HMAC sub-keys

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use gocry_core::{GocryError, GocryResult};

use crate::RANDOMIZED_KEY_SIZE;

/// HKDF info string binding the derived keys to this construction
pub const KDF_INFO: &[u8] = b"gocry/ctr+mac";

const SUBKEY_SIZE: usize = 32;

/// Encryption and authentication sub-keys. Zeroized on drop.
pub struct DerivedKeys {
    enc: [u8; SUBKEY_SIZE],
    mac: [u8; SUBKEY_SIZE],
}

impl DerivedKeys {
    pub fn enc_key(&self) -> &[u8; SUBKEY_SIZE] {
        &self.enc
    }

    pub fn mac_key(&self) -> &[u8; SUBKEY_SIZE] {
        &self.mac
    }
}

impl Drop for DerivedKeys {
    fn drop(&mut self) {
        self.enc.zeroize();
        self.mac.zeroize();
    }
}

impl std::fmt::Debug for DerivedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeys")
            .field("enc", &"[REDACTED]")
            .field("mac", &"[REDACTED]")
            .finish()
    }
}

/// Derive the (encryption, authentication) pair with HKDF-SHA256.
///
/// No salt; the output depends only on `key`, so decryption re-derives the
/// same pair that encryption used.
pub fn derive_keys(key: &[u8; RANDOMIZED_KEY_SIZE]) -> GocryResult<DerivedKeys> {
    let hkdf = Hkdf::<Sha256>::new(None, key);
    let mut okm = [0u8; SUBKEY_SIZE * 2];
    hkdf.expand(KDF_INFO, &mut okm)
        .map_err(|e| GocryError::Key(format!("HKDF expand failed: {e}")))?;

    let mut keys = DerivedKeys {
        enc: [0u8; SUBKEY_SIZE],
        mac: [0u8; SUBKEY_SIZE],
    };
    keys.enc.copy_from_slice(&okm[..SUBKEY_SIZE]);
    keys.mac.copy_from_slice(&okm[SUBKEY_SIZE..]);
    okm.zeroize();

    Ok(keys)
}
