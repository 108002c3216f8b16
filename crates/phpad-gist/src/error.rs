//! Remote snippet errors.

#![allow(missing_docs)]

use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised by the snippet host client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// A mutating call was made without a stored credential. Callers must
    /// surface this and fall back to URL sharing; it is never treated as
    /// anonymous access.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The supplied credential was rejected by the host.
    #[error("credential rejected by the snippet host")]
    InvalidCredential,

    /// The snippet (or requested revision) does not exist.
    #[error("snippet '{id}' not found")]
    NotFound { id: SmolStr },

    /// Any other non-success HTTP status.
    #[error("snippet api status {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure; the operation is aborted and prior state is
    /// left intact.
    #[error("network error: {0}")]
    Network(String),

    /// The host answered with a body this client cannot interpret.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}
