//! gocry-crypto: the envelope format and the two cipher constructions behind it
//!
//! Every ciphertext starts with a 7-byte header naming the construction:
//! ```text
//! "GOCRY" (5) || version 0x01 (1) || mode (1)
//!
//! mode 0x02 randomized:    header || IV (16) || AES-256-CTR ciphertext (N) || HMAC-SHA256 (32)
//! mode 0x01 deterministic: header || AES-256-SIV output (16 + N)
//! ```
//!
//! Key hierarchy for the randomized construction:
//! ```text
//! 32-byte key
//!   └── HKDF-SHA256 (no salt, info="gocry/ctr+mac") → 64 bytes
//!         ├── [0..32]  AES-256-CTR key
//!         └── [32..64] HMAC-SHA256 key (covers header || IV || ciphertext)
//! ```
//!
//! The deterministic construction takes a 64-byte key directly (two AES-256
//! sub-keys, as AES-SIV requires).

pub mod armor;
pub mod deterministic;
pub mod envelope;
pub mod kdf;
pub mod key;
pub mod randomized;
pub mod stream;

pub use armor::{open_armored, seal_armored};
pub use deterministic::{AesSiv, DeterministicAead};
pub use envelope::{decode_header, encode_header, open, seal, HEADER_SIZE};
pub use kdf::{derive_keys, DerivedKeys};
pub use key::SecretKey;
pub use stream::{decrypt_stream, encrypt_stream};

/// Key length for the randomized (CTR + HMAC) construction
pub const RANDOMIZED_KEY_SIZE: usize = 32;

/// Key length for the deterministic (AES-SIV) construction
pub const DETERMINISTIC_KEY_SIZE: usize = 64;

/// AES block size, and therefore the CTR initialization vector size
pub const IV_SIZE: usize = 16;

/// HMAC-SHA256 output size
pub const TAG_SIZE: usize = 32;

/// Synthetic IV prepended by AES-SIV
pub const SIV_SIZE: usize = 16;
