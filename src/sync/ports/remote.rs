//! Error contract shared by ports backed by remote services.

use thiserror::Error;

/// Result type for remote port operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failure reported by a remote collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote answered with a non-success status.
    #[error("{message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-provided message, or a generic fallback.
        message: String,
    },

    /// The addressed resource does not exist remotely.
    #[error("{0}")]
    NotFound(String),

    /// GitHub refused a merge because the pull request is not mergeable
    /// yet, without reporting conflicts.
    #[error("{0}")]
    NotMergeable(String),

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    /// Returns the message to surface to users.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Rejected { message, .. } => message,
            Self::NotFound(message) | Self::NotMergeable(message) | Self::Transport(message) => {
                message
            }
        }
    }
}
