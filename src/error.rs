//! The two error enums that propagate with `?`: everything else a request
//! can go wrong in is an HTTP status recorded on [`crate::conn::ConnState`],
//! not a `Result` — those are expected per-request outcomes, not exceptional
//! ones.

use std::fmt::Display;
use std::io;

/// Startup-time configuration problems. Fatal: the worker never runs with
/// an invalid configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A buffer size is too small to hold even a minimal request/response.
    BufferTooSmall {
        /// Name of the offending field, e.g. `"receive.buf_size"`.
        field: &'static str,
    },
    /// `fs.www` is empty.
    EmptyDocumentRoot,
    /// The same `(path, method)` was registered twice in the virtspace map.
    DuplicateVirtspaceEntry {
        /// The path that was registered twice.
        path: String,
    },
    /// The content-type table text could not be parsed.
    BadContentTypeTable {
        /// Line number (1-based) that failed to parse.
        line: usize,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::BufferTooSmall { field } => {
                write!(f, "{field} is too small to hold a minimal request/response")
            }
            ConfigError::EmptyDocumentRoot => write!(f, "fs.www must not be empty"),
            ConfigError::DuplicateVirtspaceEntry { path } => {
                write!(f, "duplicate virtspace entry for path {path:?}")
            }
            ConfigError::BadContentTypeTable { line } => {
                write!(f, "content-type table: malformed line {line}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// An `io::Error` that aborts a worker's reactor loop. Anything transient
/// (`WouldBlock`, `Interrupted`) never reaches this type; it's reserved for
/// errors out of the readiness-wait itself.
#[derive(Debug)]
pub struct FatalIoError(pub io::Error);

impl Display for FatalIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fatal reactor I/O error: {}", self.0)
    }
}

impl std::error::Error for FatalIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<io::Error> for FatalIoError {
    fn from(e: io::Error) -> Self {
        FatalIoError(e)
    }
}
