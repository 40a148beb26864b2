//! Repository port for task/issue mapping persistence.

use crate::sync::domain::{IssueNumber, TaskId, TaskIssueMapping, TeamId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for mapping repository operations.
pub type MappingRepositoryResult<T> = Result<T, MappingRepositoryError>;

/// Mapping persistence contract.
///
/// Implementations enforce both uniqueness rules: one mapping per task and
/// one mapping per issue within a team.
#[async_trait]
pub trait MappingRepository: Send + Sync {
    /// Stores a new mapping.
    ///
    /// # Errors
    ///
    /// Returns [`MappingRepositoryError::TaskAlreadyLinked`] or
    /// [`MappingRepositoryError::IssueAlreadyLinked`] when either side is
    /// already mapped.
    async fn store(&self, mapping: &TaskIssueMapping) -> MappingRepositoryResult<()>;

    /// Persists status and timestamp changes of an existing mapping.
    ///
    /// # Errors
    ///
    /// Returns [`MappingRepositoryError::NotFound`] when the task has no
    /// mapping.
    async fn update(&self, mapping: &TaskIssueMapping) -> MappingRepositoryResult<()>;

    /// Finds the mapping of a task.
    async fn find_by_task(&self, task_id: TaskId) -> MappingRepositoryResult<Option<TaskIssueMapping>>;

    /// Finds the mapping of an issue within a team.
    async fn find_by_issue(
        &self,
        team_id: TeamId,
        issue_number: IssueNumber,
    ) -> MappingRepositoryResult<Option<TaskIssueMapping>>;

    /// Lists every mapping of a team.
    async fn list_by_team(&self, team_id: TeamId) -> MappingRepositoryResult<Vec<TaskIssueMapping>>;

    /// Removes the mapping of a task, returning it when one existed.
    async fn remove(&self, task_id: TaskId) -> MappingRepositoryResult<Option<TaskIssueMapping>>;
}

/// Errors returned by mapping repository implementations.
#[derive(Debug, Clone, Error)]
pub enum MappingRepositoryError {
    /// The task already has a mapping.
    #[error("task {0} is already linked to an issue")]
    TaskAlreadyLinked(TaskId),

    /// The issue already has a mapping in the team.
    #[error("issue #{issue_number} is already linked to a task in team {team_id}")]
    IssueAlreadyLinked {
        /// Team scope.
        team_id: TeamId,
        /// Linked issue.
        issue_number: IssueNumber,
    },

    /// The mapping was not found.
    #[error("mapping not found for task {0}")]
    NotFound(TaskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl MappingRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
