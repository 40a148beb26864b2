//! Board task snapshots as seen by the synchronization engine.

use super::{ColumnId, ContentSnapshot, SyncDomainError, TaskId, TeamId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of an internal board task.
///
/// Tasks are owned by the collaboration backend; the engine only reads them
/// and asks the board to create or complete them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardTask {
    id: TaskId,
    team_id: TeamId,
    title: String,
    description: Option<String>,
    column_id: Option<ColumnId>,
    completed: bool,
    updated_at: DateTime<Utc>,
}

impl BoardTask {
    /// Creates a task snapshot with required fields.
    #[must_use]
    pub fn new(
        id: TaskId,
        team_id: TeamId,
        title: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            team_id,
            title: title.into(),
            description: None,
            column_id: None,
            completed: false,
            updated_at,
        }
    }

    /// Sets the task description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let value = description.into();
        let normalized = value.trim();
        self.description = (!normalized.is_empty()).then(|| normalized.to_owned());
        self
    }

    /// Places the task in a board column.
    #[must_use]
    pub const fn with_column(mut self, column_id: ColumnId) -> Self {
        self.column_id = Some(column_id);
        self
    }

    /// Marks the task snapshot as completed.
    #[must_use]
    pub const fn completed(mut self) -> Self {
        self.completed = true;
        self
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning team.
    #[must_use]
    pub const fn team_id(&self) -> TeamId {
        self.team_id
    }

    /// Returns the task title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the task description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the board column holding the task.
    #[must_use]
    pub const fn column_id(&self) -> Option<ColumnId> {
        self.column_id
    }

    /// Returns whether the task is complete.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed
    }

    /// Returns the latest modification timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the content compared against the mapped issue.
    #[must_use]
    pub fn content(&self) -> ContentSnapshot {
        ContentSnapshot::new(&self.title, self.description.as_deref(), self.completed)
    }
}

/// Payload for creating a board task from an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBoardTask {
    /// Task title.
    pub title: String,
    /// Task description.
    pub description: Option<String>,
    /// Destination column.
    pub column_id: Option<ColumnId>,
}

impl NewBoardTask {
    /// Creates a validated task payload.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::EmptyTitle`] when the title is blank.
    pub fn new(
        title: &str,
        description: Option<&str>,
        column_id: Option<ColumnId>,
    ) -> Result<Self, SyncDomainError> {
        let normalized = title.trim();
        if normalized.is_empty() {
            return Err(SyncDomainError::EmptyTitle("task"));
        }
        Ok(Self {
            title: normalized.to_owned(),
            description: description
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_owned),
            column_id,
        })
    }
}
