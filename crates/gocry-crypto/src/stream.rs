//! Bounded-memory AES-256-CTR + HMAC-SHA256 over readers and writers
//!
//! Produces and consumes exactly the same bytes as [`crate::randomized`], but
//! never holds more than one chunk (plus the trailing tag) in memory.
//!
//! On decrypt the tag sits at the end of a stream of unknown length, so the
//! last [`TAG_SIZE`] bytes seen are always held back: only bytes pushed out of
//! that window are known to be ciphertext. Those are authenticated, decrypted
//! and written immediately; the tag is checked once the reader is exhausted.
//! A corrupted stream therefore still emits plaintext before failing. Callers
//! that must not observe unauthenticated plaintext should buffer the input
//! and use [`crate::randomized::decrypt`].

use aes::cipher::StreamCipher;
use hmac::Mac;
use std::io::{ErrorKind, Read, Write};
use tracing::debug;

use gocry_core::{CipherKind, GocryError, GocryResult, IoResultExt};

use crate::envelope::{decode_header, encode_header, HEADER_SIZE};
use crate::kdf::derive_keys;
use crate::key::SecretKey;
use crate::randomized::{new_ctr, new_mac, random_iv};
use crate::{IV_SIZE, TAG_SIZE};

/// Read buffer size for streaming encryption and decryption
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Read into `buf`, retrying on `Interrupted`. Returns 0 only at end of input.
fn read_some<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Encrypt everything `reader` yields into a randomized envelope on `writer`.
///
/// Returns the number of plaintext bytes consumed.
pub fn encrypt_stream<R: Read, W: Write>(
    key: &SecretKey,
    reader: &mut R,
    writer: &mut W,
) -> GocryResult<u64> {
    let keys = derive_keys(key.randomized()?)?;
    let mut mac = new_mac(&keys)?;

    let header = encode_header(CipherKind::Randomized);
    writer.write_all(&header).io_context("writing header")?;
    mac.update(&header);

    let iv = random_iv();
    writer.write_all(&iv).io_context("writing IV")?;
    mac.update(&iv);

    let mut cipher = new_ctr(&keys, &iv);
    let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = read_some(reader, &mut buf).io_context("reading plaintext")?;
        if n == 0 {
            break;
        }
        let chunk = &mut buf[..n];
        cipher.apply_keystream(chunk);
        mac.update(chunk);
        writer.write_all(chunk).io_context("writing ciphertext")?;
        total += n as u64;
    }

    writer
        .write_all(&mac.finalize().into_bytes())
        .io_context("writing authentication tag")?;

    debug!(bytes = total, "stream encrypted");
    Ok(total)
}

/// Decrypt a randomized envelope whose header has already been read.
///
/// `header` must be the exact bytes consumed from the stream; they are
/// covered by the tag. Returns the number of plaintext bytes written.
pub fn decrypt_stream<R: Read, W: Write>(
    key: &SecretKey,
    header: &[u8; HEADER_SIZE],
    reader: &mut R,
    writer: &mut W,
) -> GocryResult<u64> {
    if decode_header(header)? != CipherKind::Randomized {
        return Err(GocryError::Format(
            "unexpected mode for randomized decryption".into(),
        ));
    }

    let keys = derive_keys(key.randomized()?)?;
    let mut mac = new_mac(&keys)?;
    mac.update(header);

    let mut iv = [0u8; IV_SIZE];
    reader.read_exact(&mut iv).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => {
            GocryError::Format("truncated stream: initialization vector missing".into())
        }
        _ => GocryError::Io {
            context: "reading IV",
            source: e,
        },
    })?;
    mac.update(&iv);

    let mut cipher = new_ctr(&keys, &iv);
    let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
    let mut trailing = TrailingTag::with_capacity(STREAM_CHUNK_SIZE);
    let mut total = 0u64;

    loop {
        let n = read_some(reader, &mut buf).io_context("reading ciphertext")?;
        if n == 0 {
            break;
        }

        let released = trailing.push(&buf[..n]);
        if released == 0 {
            continue;
        }

        let ciphertext = trailing.front_mut(released);
        mac.update(ciphertext);
        cipher.apply_keystream(ciphertext);
        writer
            .write_all(ciphertext)
            .io_context("writing decrypted data")?;
        trailing.consume(released);
        total += released as u64;
    }

    let tag = trailing.finish()?;
    mac.verify_slice(&tag).map_err(|_| GocryError::Authentication)?;

    debug!(bytes = total, "stream decrypted");
    Ok(total)
}

/// Holds back the most recent `TAG_SIZE` bytes of a stream.
///
/// Scoped to one decryption; the buffer is never shared.
struct TrailingTag {
    pending: Vec<u8>,
}

impl TrailingTag {
    fn with_capacity(chunk_size: usize) -> Self {
        Self {
            pending: Vec::with_capacity(chunk_size + TAG_SIZE),
        }
    }

    /// Append `incoming` and return how many leading bytes are now known to
    /// precede the tag.
    fn push(&mut self, incoming: &[u8]) -> usize {
        self.pending.extend_from_slice(incoming);
        self.pending.len().saturating_sub(TAG_SIZE)
    }

    fn front_mut(&mut self, len: usize) -> &mut [u8] {
        &mut self.pending[..len]
    }

    fn consume(&mut self, len: usize) {
        self.pending.drain(..len);
    }

    fn finish(self) -> GocryResult<[u8; TAG_SIZE]> {
        <[u8; TAG_SIZE]>::try_from(self.pending.as_slice()).map_err(|_| {
            GocryError::Format("truncated stream: authentication tag missing".into())
        })
    }
}
