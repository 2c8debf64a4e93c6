use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GocryError, GocryResult, IoResultExt};
use crate::types::{CipherKind, Directives, Mode};

/// Top-level configuration (loaded from gocry.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GocryConfig {
    /// Processing mode: "file" or "line" (default: file)
    pub mode: Mode,
    /// Line-mode worker count (0 = available hardware concurrency)
    pub parallel: usize,
    /// Encrypt with AES-SIV instead of CTR+HMAC (requires a 64-byte key)
    pub deterministic: bool,
    /// Authenticate the whole file before writing any plaintext on decrypt
    pub buffered: bool,
    /// Seal a line holding only the encrypt directive together with the next line
    pub join_standalone: bool,
    pub directives: Directives,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl GocryConfig {
    /// Read and parse a TOML config file.
    pub fn from_file(path: &Path) -> GocryResult<Self> {
        let content = std::fs::read_to_string(path).io_context("reading config file")?;
        toml::from_str(&content)
            .map_err(|e| GocryError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn cipher(&self) -> CipherKind {
        CipherKind::from_deterministic(self.deterministic)
    }

    /// Worker count with 0 resolved to the number of available CPUs.
    pub fn effective_parallelism(&self) -> usize {
        if self.parallel > 0 {
            return self.parallel;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
