//! Module: output
//! Responsibility: render result mappings as `"<key> <result>"` text lines.
//! Does not own: result production or verification.
//! Boundary: the pipeline writes once per completed run.

use crate::{
    error::{Error, ErrorKind, ErrorOrigin},
    function::{AggregateFunction, FunctionError},
    result::ResultMapping,
};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
    str::FromStr,
};
use thiserror::Error as ThisError;

/// Output argument that disables writing.
pub const DISCARD_OUTPUT: &str = "none";

///
/// OutputError
///

#[derive(Debug, ThisError)]
pub enum OutputError {
    #[error("cannot write results to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Function(#[from] FunctionError),
}

impl From<OutputError> for Error {
    fn from(err: OutputError) -> Self {
        match err {
            OutputError::Io { .. } => Self::new(ErrorKind::Io, ErrorOrigin::Output, err.to_string()),
            OutputError::Function(err) => err.into(),
        }
    }
}

///
/// OutputTarget
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum OutputTarget {
    #[default]
    Discard,
    File(PathBuf),
}

impl OutputTarget {
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    #[must_use]
    pub const fn is_discard(&self) -> bool {
        matches!(self, Self::Discard)
    }
}

impl FromStr for OutputTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s == DISCARD_OUTPUT {
            Self::Discard
        } else {
            Self::file(s)
        })
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discard => f.write_str(DISCARD_OUTPUT),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Write one line per key in ascending key order; returns the line count.
///
/// Key bytes that are not UTF-8 are replaced with U+FFFD.
pub fn write_results<W: Write>(
    writer: &mut W,
    mapping: &ResultMapping,
    function: AggregateFunction,
) -> Result<usize, WriteFailure> {
    let mut lines = 0;
    for row in mapping.results(function) {
        let (key, value) = row.map_err(WriteFailure::Function)?;
        writeln!(writer, "{} {value}", String::from_utf8_lossy(key)).map_err(WriteFailure::Io)?;
        lines += 1;
    }
    writer.flush().map_err(WriteFailure::Io)?;

    Ok(lines)
}

/// Write results to `target`; `Discard` writes nothing and returns zero.
pub fn write_results_to(
    target: &OutputTarget,
    mapping: &ResultMapping,
    function: AggregateFunction,
) -> Result<usize, OutputError> {
    let OutputTarget::File(path) = target else {
        return Ok(0);
    };

    let io_error = |source| OutputError::Io {
        path: path.clone(),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);

    write_results(&mut writer, mapping, function).map_err(|failure| match failure {
        WriteFailure::Io(source) => io_error(source),
        WriteFailure::Function(err) => OutputError::Function(err),
    })
}

/// Path-free failure from `write_results`.
#[derive(Debug, ThisError)]
pub enum WriteFailure {
    #[error("{0}")]
    Io(io::Error),

    #[error("{0}")]
    Function(FunctionError),
}

///
/// TESTS
///
