//! Error types for definition compiling

use thiserror::Error;

/// Errors that can occur while compiling an ADX definition
///
/// Missing optional fields and malformed parameter, bit or command nodes
/// never produce an error; they fall back to defaults or are skipped.
#[derive(Error, Debug)]
pub enum CompileError {
    /// Nothing resembling markup was found
    #[error("Definition contains no markup")]
    NoMarkup,

    /// The definition file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
