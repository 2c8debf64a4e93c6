use thiserror::Error;

pub type GocryResult<T> = Result<T, GocryError>;

#[derive(Debug, Error)]
pub enum GocryError {
    /// Malformed envelope, bad header, truncated stream, invalid armor.
    #[error("format error: {0}")]
    Format(String),

    /// MAC or SIV verification failed. Deliberately carries no detail.
    #[error("authentication failed")]
    Authentication,

    #[error("key error: {0}")]
    Key(String),

    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),

    /// A failure attributed to one input line (1-based) in line mode.
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<GocryError>,
    },
}

/// Error category, independent of any line attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Authentication,
    Key,
    Io,
    Config,
}

impl GocryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GocryError::Format(_) => ErrorKind::Format,
            GocryError::Authentication => ErrorKind::Authentication,
            GocryError::Key(_) => ErrorKind::Key,
            GocryError::Io { .. } => ErrorKind::Io,
            GocryError::Config(_) => ErrorKind::Config,
            GocryError::Line { source, .. } => source.kind(),
        }
    }

    pub fn at_line(self, line: usize) -> Self {
        GocryError::Line {
            line,
            source: Box::new(self),
        }
    }
}

/// Attach a short context string to an I/O result.
pub trait IoResultExt<T> {
    fn io_context(self, context: &'static str) -> GocryResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn io_context(self, context: &'static str) -> GocryResult<T> {
        self.map_err(|source| GocryError::Io { context, source })
    }
}
