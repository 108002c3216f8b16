//! Engine and lifecycle errors.

#![allow(missing_docs)]

use thiserror::Error;

/// Errors raised while fetching builds and driving the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Transport failure fetching a build artifact. Transient: the operation
    /// aborts, prior state is left intact.
    #[error("network error fetching '{path}': {reason}")]
    Network { path: String, reason: String },

    /// Non-success HTTP status fetching a build artifact.
    #[error("http status {status} fetching '{path}'")]
    HttpStatus { status: u16, path: String },

    /// Engine failed to come up. Fatal for the session.
    #[error("engine initialization failed: {0}")]
    Init(String),

    /// Engine trapped mid-execution. Fatal for the session.
    #[error("engine aborted: {0}")]
    Aborted(String),

    /// The manager is in the unusable terminal state; only a reload recovers.
    #[error("engine is not usable")]
    Unusable,

    /// An execution is already in flight; the request was dropped, not
    /// queued.
    #[error("an execution is already in flight")]
    Busy,

    /// No build has been loaded yet.
    #[error("no build loaded")]
    NoBuild,

    /// Writing into the sandbox virtual filesystem failed.
    #[error("virtual file write failed: {0}")]
    Vfs(String),
}

impl EngineError {
    /// Fatal errors poison the whole session; everything else leaves the
    /// manager recoverable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Init(_) | Self::Aborted(_))
    }
}
