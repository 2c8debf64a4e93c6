//! gocry-engine: drives the envelope ciphers over files and text lines
//!
//! - `file`: the whole input is one envelope, streamed with bounded memory
//! - `line`: only lines carrying a directive are sealed or opened, in place,
//!   on a fixed-size worker pool with output in input order

pub mod file;
pub mod line;

use std::io::{Read, Write};
use tracing::debug;

use gocry_core::{CipherKind, Directives, GocryError, GocryResult, Mode, Operation};
use gocry_crypto::SecretKey;

pub use file::FileProcessor;
pub use line::LineProcessor;

/// One encrypt or decrypt run, fully configured.
#[derive(Debug)]
pub struct Engine {
    pub key: SecretKey,
    pub operation: Operation,
    pub mode: Mode,
    /// Construction used when encrypting; decryption follows the header
    pub cipher: CipherKind,
    pub directives: Directives,
    /// Line-mode worker count, at least 1
    pub parallelism: usize,
    /// File-mode decrypt: authenticate everything before writing plaintext
    pub buffered: bool,
    /// Line-mode encrypt: seal a bare encrypt directive with the line after it
    pub join_standalone: bool,
}

impl Engine {
    /// Defaults: file mode, randomized cipher, default directives, one worker
    /// per available CPU.
    pub fn new(key: SecretKey, operation: Operation) -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            key,
            operation,
            mode: Mode::File,
            cipher: CipherKind::Randomized,
            directives: Directives::default(),
            parallelism,
            buffered: false,
            join_standalone: false,
        }
    }

    /// Run the configured operation from `input` to `output`.
    ///
    /// Returns whether anything was transformed: always `true` for file mode,
    /// and `true` in line mode only if at least one directive matched.
    pub fn process<R: Read, W: Write>(&self, input: R, output: W) -> GocryResult<bool> {
        if self.operation == Operation::Encrypt {
            self.key.require(self.cipher)?;
        }

        debug!(
            operation = %self.operation,
            mode = %self.mode,
            cipher = ?self.cipher,
            "processing"
        );

        match self.mode {
            Mode::File => {
                let processor = FileProcessor::new(&self.key, self.cipher).buffered(self.buffered);
                match self.operation {
                    Operation::Encrypt => processor.encrypt(input, output)?,
                    Operation::Decrypt => processor.decrypt(input, output)?,
                }
                Ok(true)
            }
            Mode::Line => {
                self.directives.validate()?;
                if self.parallelism == 0 {
                    return Err(GocryError::Config("parallelism must be at least 1".into()));
                }
                LineProcessor::new(&self.key, &self.directives, self.cipher)
                    .parallelism(self.parallelism)
                    .join_standalone(self.join_standalone)
                    .process(self.operation, input, output)
            }
        }
    }
}
