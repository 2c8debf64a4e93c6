pub mod config;
pub mod error;
pub mod types;

pub use error::{ErrorKind, GocryError, GocryResult, IoResultExt};
pub use types::{CipherKind, Directives, Mode, Operation};
