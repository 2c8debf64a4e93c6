use serde::{Deserialize, Serialize};

use crate::error::{GocryError, GocryResult};

/// Whether the input is being encrypted or decrypted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Encrypt,
    Decrypt,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Encrypt => f.write_str("encrypt"),
            Operation::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// How the input is split before encryption
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// The whole input is one authenticated unit
    #[default]
    File,
    /// Only lines carrying a directive are transformed, in place
    Line,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::File => f.write_str("file"),
            Mode::Line => f.write_str("line"),
        }
    }
}

/// Cipher construction used when encrypting.
///
/// Decryption never consults this: the envelope header says which one was used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherKind {
    /// AES-256-CTR + HMAC-SHA256 with a fresh IV, 32-byte key
    #[default]
    Randomized,
    /// AES-256-SIV, 64-byte key
    Deterministic,
}

impl CipherKind {
    pub fn from_deterministic(deterministic: bool) -> Self {
        if deterministic {
            CipherKind::Deterministic
        } else {
            CipherKind::Randomized
        }
    }

    /// Key length in bytes this construction requires
    pub fn key_len(self) -> usize {
        match self {
            CipherKind::Randomized => 32,
            CipherKind::Deterministic => 64,
        }
    }
}

/// Markers selecting lines in line mode.
///
/// `encrypt` is matched as a line suffix, `decrypt` as the prefix `"<decrypt>: "`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Directives {
    pub encrypt: String,
    pub decrypt: String,
}

impl Default for Directives {
    fn default() -> Self {
        Self {
            encrypt: "### DIRECTIVE: ENCRYPT".into(),
            decrypt: "### DIRECTIVE: DECRYPT".into(),
        }
    }
}

impl Directives {
    pub fn new(encrypt: impl Into<String>, decrypt: impl Into<String>) -> Self {
        Self {
            encrypt: encrypt.into(),
            decrypt: decrypt.into(),
        }
    }

    pub fn validate(&self) -> GocryResult<()> {
        if self.encrypt.is_empty() || self.decrypt.is_empty() {
            return Err(GocryError::Config("directives must not be empty".into()));
        }
        if self.encrypt == self.decrypt {
            return Err(GocryError::Config(format!(
                "encrypt and decrypt directives must differ (both are {:?})",
                self.encrypt
            )));
        }
        Ok(())
    }

    /// The literal prefix an encrypted line starts with
    pub fn decrypt_prefix(&self) -> String {
        format!("{}: ", self.decrypt)
    }
}
