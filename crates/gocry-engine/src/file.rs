//! Whole-input encryption: the entire stream is one envelope

use std::io::{ErrorKind, Read, Write};
use tracing::debug;

use gocry_core::{CipherKind, GocryError, GocryResult, IoResultExt};
use gocry_crypto::deterministic::{self, DeterministicAead};
use gocry_crypto::{
    decode_header, decrypt_stream, encrypt_stream, randomized, SecretKey, HEADER_SIZE,
};

pub struct FileProcessor<'a> {
    key: &'a SecretKey,
    cipher: CipherKind,
    buffered: bool,
}

impl<'a> FileProcessor<'a> {
    pub fn new(key: &'a SecretKey, cipher: CipherKind) -> Self {
        Self {
            key,
            cipher,
            buffered: false,
        }
    }

    /// Verify the whole randomized envelope before emitting any plaintext.
    ///
    /// Costs memory proportional to the input.
    pub fn buffered(mut self, buffered: bool) -> Self {
        self.buffered = buffered;
        self
    }

    pub fn encrypt<R: Read, W: Write>(&self, mut reader: R, mut writer: W) -> GocryResult<()> {
        self.key.require(self.cipher)?;

        match self.cipher {
            CipherKind::Randomized => {
                encrypt_stream(self.key, &mut reader, &mut writer)?;
            }
            CipherKind::Deterministic => {
                let plaintext = read_all(&mut reader, "reading input")?;
                let envelope = deterministic::encrypt(self.key, &plaintext)?;
                writer.write_all(&envelope).io_context("writing ciphertext")?;
                debug!(bytes = plaintext.len(), "file encrypted deterministically");
            }
        }

        writer.flush().io_context("flushing output")
    }

    pub fn decrypt<R: Read, W: Write>(&self, mut reader: R, mut writer: W) -> GocryResult<()> {
        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                GocryError::Format("input is shorter than the envelope header".into())
            }
            _ => GocryError::Io {
                context: "reading header",
                source: e,
            },
        })?;

        let mode = decode_header(&header)?;
        // Before any primitive is constructed
        self.key.require(mode)?;
        debug!(mode = ?mode, buffered = self.buffered, "decrypting file");

        match mode {
            CipherKind::Randomized if self.buffered => {
                let mut envelope = header.to_vec();
                reader
                    .read_to_end(&mut envelope)
                    .io_context("reading ciphertext")?;
                let plaintext = randomized::decrypt(self.key, &envelope)?;
                writer.write_all(&plaintext).io_context("writing plaintext")?;
            }
            CipherKind::Randomized => {
                decrypt_stream(self.key, &header, &mut reader, &mut writer)?;
            }
            CipherKind::Deterministic => {
                let payload = read_all(&mut reader, "reading ciphertext")?;
                let plaintext =
                    deterministic::cipher_for(self.key)?.decrypt_deterministic(&payload)?;
                writer.write_all(&plaintext).io_context("writing plaintext")?;
            }
        }

        writer.flush().io_context("flushing output")
    }
}

fn read_all<R: Read>(reader: &mut R, context: &'static str) -> GocryResult<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).io_context(context)?;
    Ok(buf)
}
