//! Ports for the collaboration backend's board and team records.

use crate::sync::domain::{BoardTask, MemberId, NewBoardTask, PersistedTeamSettings, TaskId, TeamId};
use crate::sync::ports::RemoteResult;
use async_trait::async_trait;

/// Access to board tasks.
#[async_trait]
pub trait TaskBoard: Send + Sync {
    /// Finds a task by identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_task(&self, task_id: TaskId) -> RemoteResult<Option<BoardTask>>;

    /// Lists every task on the team's board.
    async fn list_tasks(&self, team_id: TeamId) -> RemoteResult<Vec<BoardTask>>;

    /// Creates a task on the team's board on behalf of `requester`.
    async fn create_task(
        &self,
        team_id: TeamId,
        task: &NewBoardTask,
        requester: MemberId,
    ) -> RemoteResult<BoardTask>;

    /// Marks a task complete.
    async fn complete_task(&self, task_id: TaskId) -> RemoteResult<()>;
}

/// Access to team-scoped GitHub settings.
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    /// Loads the raw persisted settings of a team.
    async fn team_settings(&self, team_id: TeamId) -> RemoteResult<PersistedTeamSettings>;

    /// Persists the serialised column rules of a team.
    async fn save_column_mappings(&self, team_id: TeamId, serialized: &str) -> RemoteResult<()>;
}
