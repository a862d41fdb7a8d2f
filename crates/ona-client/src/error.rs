//! Error types for the ONA client.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, OnaError>;

/// Errors surfaced to callers of the client.
///
/// Parse failures and read timeouts are not errors: they are absorbed and
/// show up only in the shape of the returned batch.
#[derive(Debug, Error)]
pub enum OnaError {
    /// The engine binary could not be found. The process was never started.
    #[error("engine binary not found at {}\n{hint}", path.display())]
    Configuration { path: PathBuf, hint: String },

    /// The binary was found but the operating system refused to run it.
    #[error("failed to spawn engine process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The engine process is gone (exited, killed, or its pipes closed).
    #[error("connection to engine lost: {reason}")]
    ConnectionLost { reason: String },
}

impl OnaError {
    pub(crate) fn connection_lost(reason: impl Into<String>) -> Self {
        Self::ConnectionLost {
            reason: reason.into(),
        }
    }
}
