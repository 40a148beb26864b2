//! Typed events the engine publishes to external collaborators.

use super::{IssueNumber, PullRequestNumber, SyncStatus, TaskId, TeamId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of mapping change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingChange {
    /// A mapping was created.
    Linked,
    /// A mapping was removed.
    Unlinked,
    /// The sync status or sync timestamp changed.
    StatusChanged,
}

/// Event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEventKind {
    /// `mapping.changed`
    #[serde(rename = "mapping.changed")]
    MappingChanged {
        /// Team owning the task.
        team_id: TeamId,
        /// Affected task.
        task_id: TaskId,
        /// Issue the task is or was linked to.
        issue_number: IssueNumber,
        /// What happened.
        change: MappingChange,
        /// Status after the change, absent after an unlink.
        status: Option<SyncStatus>,
    },
    /// `pr.merged`
    #[serde(rename = "pr.merged")]
    PullRequestMerged {
        /// Team owning the repository.
        team_id: TeamId,
        /// Merged pull request.
        pr_number: PullRequestNumber,
        /// Task completed by the merge, if known.
        task_id: Option<TaskId>,
        /// Merge commit.
        sha: String,
    },
}

/// Event envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// Publication time.
    pub occurred_at: DateTime<Utc>,
    /// Payload.
    #[serde(flatten)]
    pub kind: SyncEventKind,
}

impl SyncEvent {
    /// Wraps a payload in a new envelope.
    #[must_use]
    pub fn new(kind: SyncEventKind, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at,
            kind,
        }
    }

    /// Returns the dotted event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self.kind {
            SyncEventKind::MappingChanged { .. } => "mapping.changed",
            SyncEventKind::PullRequestMerged { .. } => "pr.merged",
        }
    }
}
