//! In-memory repository for task/issue mappings.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::sync::{
    domain::{IssueNumber, TaskId, TaskIssueMapping, TeamId},
    ports::{MappingRepository, MappingRepositoryError, MappingRepositoryResult},
};

/// Thread-safe in-memory mapping repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMappingRepository {
    state: Arc<RwLock<InMemoryMappingState>>,
}

#[derive(Debug, Default)]
struct InMemoryMappingState {
    mappings: HashMap<TaskId, TaskIssueMapping>,
    issue_index: HashMap<(TeamId, IssueNumber), TaskId>,
}

impl InMemoryMappingRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: impl std::fmt::Display) -> MappingRepositoryError {
    MappingRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl MappingRepository for InMemoryMappingRepository {
    async fn store(&self, mapping: &TaskIssueMapping) -> MappingRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        if state.mappings.contains_key(&mapping.task_id()) {
            return Err(MappingRepositoryError::TaskAlreadyLinked(mapping.task_id()));
        }
        let issue_key = (mapping.team_id(), mapping.issue_number());
        if state.issue_index.contains_key(&issue_key) {
            return Err(MappingRepositoryError::IssueAlreadyLinked {
                team_id: mapping.team_id(),
                issue_number: mapping.issue_number(),
            });
        }

        state.issue_index.insert(issue_key, mapping.task_id());
        state.mappings.insert(mapping.task_id(), mapping.clone());
        Ok(())
    }

    async fn update(&self, mapping: &TaskIssueMapping) -> MappingRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        let existing = state
            .mappings
            .get_mut(&mapping.task_id())
            .ok_or(MappingRepositoryError::NotFound(mapping.task_id()))?;
        *existing = mapping.clone();
        Ok(())
    }

    async fn find_by_task(&self, task_id: TaskId) -> MappingRepositoryResult<Option<TaskIssueMapping>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.mappings.get(&task_id).cloned())
    }

    async fn find_by_issue(
        &self,
        team_id: TeamId,
        issue_number: IssueNumber,
    ) -> MappingRepositoryResult<Option<TaskIssueMapping>> {
        let state = self.state.read().map_err(lock_error)?;
        let mapping = state
            .issue_index
            .get(&(team_id, issue_number))
            .and_then(|task_id| state.mappings.get(task_id))
            .cloned();
        Ok(mapping)
    }

    async fn list_by_team(&self, team_id: TeamId) -> MappingRepositoryResult<Vec<TaskIssueMapping>> {
        let state = self.state.read().map_err(lock_error)?;
        let mut mappings: Vec<TaskIssueMapping> = state
            .mappings
            .values()
            .filter(|mapping| mapping.team_id() == team_id)
            .cloned()
            .collect();
        mappings.sort_by_key(TaskIssueMapping::task_id);
        Ok(mappings)
    }

    async fn remove(&self, task_id: TaskId) -> MappingRepositoryResult<Option<TaskIssueMapping>> {
        let mut state = self.state.write().map_err(lock_error)?;
        let removed = state.mappings.remove(&task_id);
        if let Some(mapping) = &removed {
            state
                .issue_index
                .remove(&(mapping.team_id(), mapping.issue_number()));
        }
        Ok(removed)
    }
}
