//! Session errors.

#![allow(missing_docs)]

use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised by session mutation, decoding, and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Another file in the session already uses this name.
    #[error("duplicate file name '{0}'")]
    DuplicateFileName(SmolStr),

    /// File names must be non-empty after trimming.
    #[error("empty file name")]
    EmptyFileName,

    /// The name is reserved for the snippet metadata file.
    #[error("file name '{0}' is reserved")]
    ReservedFileName(SmolStr),

    /// The per-session file cap was reached.
    #[error("file limit of {0} reached")]
    FileLimit(usize),

    /// The last remaining file cannot be removed.
    #[error("cannot remove the last file")]
    LastFile,

    /// No file exists at the given index.
    #[error("no file at index {0}")]
    InvalidIndex(usize),

    /// Encoded URL state failed to decompress or parse.
    #[error("malformed shared state '{0}'")]
    MalformedState(SmolStr),

    /// Plugin bitset parameter is not a decimal big integer.
    #[error("malformed plugin bitset '{0}'")]
    MalformedBitset(SmolStr),

    /// Backing state store failed.
    #[error("state store error '{0}'")]
    StateStore(SmolStr),

    /// Playground configuration error.
    #[error("invalid config '{0}'")]
    InvalidConfig(SmolStr),
}
