//! Error types for `PakLedger`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `PakLedger` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error without a known path.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error tied to a specific file or directory.
    #[error("IO error at {path}: {source}")]
    IoAt {
        /// The path being read or written.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDir(String),

    // ==================== Catalog Entry Errors ====================
    /// The filename does not match the pakfile naming grammar.
    #[error("malformed pak name '{name}': {reason}")]
    MalformedName {
        /// The raw filename as given.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },

    /// A canonical link already exists and points somewhere else.
    #[error("canonical link for '{name}' points to {existing}, not {expected}")]
    Conflict {
        /// The raw filename.
        name: String,
        /// Where the existing link points.
        existing: PathBuf,
        /// Where this batch would have pointed it.
        expected: PathBuf,
    },

    /// Two distinct names occupy the same position in the processing order.
    #[error("'{first}' and '{second}' sort identically; check for duplicates")]
    AmbiguousOrder {
        /// The first raw name.
        first: String,
        /// The second raw name.
        second: String,
    },

    // ==================== Batch Errors ====================
    /// The patch-batch directory is unusable.
    #[error("invalid patch batch {path}: {reason}")]
    InvalidBatch {
        /// The batch directory.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    // ==================== Ledger Errors ====================
    /// A ledger line could not be parsed.
    #[error("{path}:{line}: {reason}")]
    LedgerParse {
        /// The ledger file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What is wrong with the line.
        reason: String,
    },

    /// Another process holds the ledger lock.
    #[error("ledger is locked by another run (remove {path} if stale)")]
    LedgerLocked {
        /// The lock file path.
        path: PathBuf,
    },

    // ==================== Configuration Errors ====================
    /// The configuration file is invalid.
    #[error("invalid config {path}: {message}")]
    Config {
        /// The configuration file.
        path: PathBuf,
        /// The parse or validation error.
        message: String,
    },

    /// Unknown storefront or digest algorithm name.
    #[error("unknown {kind}: '{value}'")]
    UnknownValue {
        /// What kind of value was being parsed.
        kind: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl Error {
    /// Attach a path to an IO error.
    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::IoAt {
            path: path.into(),
            source,
        }
    }
}

// Add conversion from walkdir::Error
impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDir(err.to_string())
    }
}

/// A specialized Result type for `PakLedger` operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_at_names_the_path() {
        let io = Error::io_at("/nope", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(io.to_string().contains("/nope"));
    }
}
