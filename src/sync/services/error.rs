//! Error taxonomy returned by sync services.

use crate::sync::{
    domain::{ColumnRuleError, DuplicateRuleError, SyncDomainError, TaskId},
    ports::{MappingRepositoryError, RemoteError},
};
use thiserror::Error;

/// Result type for sync service operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Failures surfaced by sync services.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Input or state failed validation.
    #[error(transparent)]
    Validation(#[from] SyncDomainError),

    /// The task or the issue is already mapped.
    #[error("{0}")]
    Conflict(String),

    /// A column rule with the same prefix already exists.
    #[error(transparent)]
    DuplicateRule(#[from] DuplicateRuleError),

    /// A remote collaborator failed; carries its raw message.
    #[error(transparent)]
    Upstream(#[from] RemoteError),

    /// GitHub kept answering "not mergeable" and the user declined to retry.
    #[error("{message}")]
    TransientMerge {
        /// Raw message of the last refusal.
        message: String,
        /// Merge calls made.
        attempts: u32,
    },

    /// The same action is already running for the same key.
    #[error("{action} already in progress for {key}")]
    InFlight {
        /// Action name.
        action: &'static str,
        /// Guarded key.
        key: String,
    },

    /// The task does not exist on the board.
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    /// The issue body template failed to render.
    #[error("issue body template failed: {0}")]
    Template(String),

    /// Mapping persistence failed.
    #[error(transparent)]
    Repository(MappingRepositoryError),
}

impl SyncError {
    /// Returns whether retrying the same call later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Upstream(RemoteError::Transport(_) | RemoteError::NotMergeable(_))
                | Self::TransientMerge { .. }
                | Self::InFlight { .. }
        )
    }
}

impl From<MappingRepositoryError> for SyncError {
    fn from(err: MappingRepositoryError) -> Self {
        match err {
            MappingRepositoryError::TaskAlreadyLinked(_)
            | MappingRepositoryError::IssueAlreadyLinked { .. } => Self::Conflict(err.to_string()),
            other => Self::Repository(other),
        }
    }
}

impl From<ColumnRuleError> for SyncError {
    fn from(err: ColumnRuleError) -> Self {
        match err {
            ColumnRuleError::Duplicate(duplicate) => Self::DuplicateRule(duplicate),
            ColumnRuleError::Invalid(invalid) => Self::Validation(invalid),
        }
    }
}
