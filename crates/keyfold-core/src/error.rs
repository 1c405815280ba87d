//! Public error surface.
//!
//! Every module owns a typed error; each converts into [`Error`], which
//! carries the stable kind + origin taxonomy the CLI maps to exit codes.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }

    /// Construct a usage error raised while reading process arguments.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Usage, ErrorOrigin::Cli, message)
    }

    /// Construct a configuration error for a specific origin.
    pub fn config(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, origin, message)
    }

    /// Construct a malformed-input error for a specific origin.
    pub fn malformed_input(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedInput, origin, message)
    }

    /// Construct an I/O error for a specific origin.
    pub fn io(origin: ErrorOrigin, err: &std::io::Error) -> Self {
        Self::new(ErrorKind::Io, origin, err.to_string())
    }

    #[must_use]
    pub fn display_with_kind(&self) -> String {
        format!("{}:{}: {}", self.origin, self.kind, self.message)
    }
}

///
/// ErrorKind
/// Error taxonomy for callers and the CLI exit-code contract.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    /// Wrong process arguments.
    Usage,

    /// Unknown function name or invalid budget/capacity parameters.
    Config,

    /// Truncated store, mismatched record counts, bad sampling ranges.
    MalformedInput,

    /// Distinct keys or distinct-key bytes exceeded the engine capacity.
    CapacityExceeded,

    /// The engine could not be initialized.
    EngineInit,

    /// A driver method was called out of sequence.
    InvalidState,

    /// File system access failed.
    Io,

    /// The caller cannot remediate this.
    Internal,
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Cli,
    Store,
    Index,
    Sampling,
    Batch,
    Function,
    Engine,
    Driver,
    Output,
}

///
/// TESTS
///
