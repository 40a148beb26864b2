//! In-memory board and team directory.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use super::poisoned;
use crate::sync::{
    domain::{BoardTask, MemberId, NewBoardTask, PersistedTeamSettings, TaskId, TeamId},
    ports::{RemoteError, RemoteResult, TaskBoard, TeamDirectory},
};

/// Board tasks and team settings held in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkspace {
    state: Arc<RwLock<WorkspaceState>>,
}

#[derive(Debug, Default)]
struct WorkspaceState {
    teams: HashMap<TeamId, PersistedTeamSettings>,
    tasks: BTreeMap<TaskId, BoardTask>,
    rejected_title_fragments: Vec<String>,
    created_by: HashMap<TaskId, MemberId>,
}

impl InMemoryWorkspace {
    /// Creates an empty workspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a team's settings.
    pub fn put_team(&self, team_id: TeamId, settings: PersistedTeamSettings) {
        if let Ok(mut state) = self.state.write() {
            state.teams.insert(team_id, settings);
        }
    }

    /// Inserts or replaces a task.
    pub fn put_task(&self, task: BoardTask) {
        if let Ok(mut state) = self.state.write() {
            state.tasks.insert(task.id(), task);
        }
    }

    /// Returns a task snapshot.
    #[must_use]
    pub fn task(&self, task_id: TaskId) -> Option<BoardTask> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.tasks.get(&task_id).cloned())
    }

    /// Returns the member who created a task through this board.
    #[must_use]
    pub fn creator_of(&self, task_id: TaskId) -> Option<MemberId> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.created_by.get(&task_id).copied())
    }

    /// Makes task creation fail for titles containing `fragment`.
    pub fn reject_titles_containing(&self, fragment: impl Into<String>) {
        if let Ok(mut state) = self.state.write() {
            state.rejected_title_fragments.push(fragment.into());
        }
    }

    /// Returns the persisted settings of a team.
    #[must_use]
    pub fn settings(&self, team_id: TeamId) -> Option<PersistedTeamSettings> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.teams.get(&team_id).cloned())
    }
}

#[async_trait]
impl TaskBoard for InMemoryWorkspace {
    async fn find_task(&self, task_id: TaskId) -> RemoteResult<Option<BoardTask>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.tasks.get(&task_id).cloned())
    }

    async fn list_tasks(&self, team_id: TeamId) -> RemoteResult<Vec<BoardTask>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .tasks
            .values()
            .filter(|task| task.team_id() == team_id)
            .cloned()
            .collect())
    }

    async fn create_task(
        &self,
        team_id: TeamId,
        task: &NewBoardTask,
        requester: MemberId,
    ) -> RemoteResult<BoardTask> {
        let mut state = self.state.write().map_err(poisoned)?;
        if state
            .rejected_title_fragments
            .iter()
            .any(|fragment| task.title.contains(fragment.as_str()))
        {
            return Err(RemoteError::Rejected {
                status: 422,
                message: format!("task '{}' rejected by board", task.title),
            });
        }
        let next_id = state
            .tasks
            .keys()
            .next_back()
            .map_or(1, |id| id.value().saturating_add(1));
        let id = TaskId::new(next_id).map_err(|err| RemoteError::Transport(err.to_string()))?;
        let mut created = BoardTask::new(id, team_id, task.title.clone(), Utc::now());
        if let Some(description) = &task.description {
            created = created.with_description(description.clone());
        }
        if let Some(column_id) = task.column_id {
            created = created.with_column(column_id);
        }
        state.tasks.insert(id, created.clone());
        state.created_by.insert(id, requester);
        Ok(created)
    }

    async fn complete_task(&self, task_id: TaskId) -> RemoteResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let task = state
            .tasks
            .remove(&task_id)
            .ok_or_else(|| RemoteError::NotFound(format!("task {task_id} not found")))?;
        state.tasks.insert(task_id, task.completed());
        Ok(())
    }
}

#[async_trait]
impl TeamDirectory for InMemoryWorkspace {
    async fn team_settings(&self, team_id: TeamId) -> RemoteResult<PersistedTeamSettings> {
        let state = self.state.read().map_err(poisoned)?;
        state
            .teams
            .get(&team_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("team {team_id} not found")))
    }

    async fn save_column_mappings(&self, team_id: TeamId, serialized: &str) -> RemoteResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let team = state
            .teams
            .get_mut(&team_id)
            .ok_or_else(|| RemoteError::NotFound(format!("team {team_id} not found")))?;
        team.github_column_mappings = Some(serialized.to_owned());
        Ok(())
    }
}
