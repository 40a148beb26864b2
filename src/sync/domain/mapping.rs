//! Task-to-issue mapping aggregate.

use super::{
    ContentFingerprint, IssueNumber, LastKnownState, Observation, SyncStatus, TaskId, TeamId,
    evaluate,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Link between one board task and one GitHub issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIssueMapping {
    task_id: TaskId,
    team_id: TeamId,
    issue_number: IssueNumber,
    issue_url: String,
    sync_status: SyncStatus,
    synced_fingerprint: Option<ContentFingerprint>,
    last_synced_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedMappingData {
    /// Mapped task.
    pub task_id: TaskId,
    /// Team owning the task and repository.
    pub team_id: TeamId,
    /// Mapped issue number.
    pub issue_number: IssueNumber,
    /// Browser URL of the issue.
    pub issue_url: String,
    /// Persisted sync status.
    pub sync_status: SyncStatus,
    /// Fingerprint recorded at the last successful sync.
    pub synced_fingerprint: Option<ContentFingerprint>,
    /// Time of the last successful sync.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Identity of the issue a mapping points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    /// Owning team.
    pub team_id: TeamId,
    /// Issue number.
    pub issue_number: IssueNumber,
    /// Browser URL of the issue.
    pub issue_url: String,
}

impl TaskIssueMapping {
    /// Creates a mapping whose two sides were just observed.
    ///
    /// The initial status comes from the sync status tracker: identical
    /// content starts `SYNCED` with a recorded fingerprint, anything else
    /// starts `PENDING`.
    #[must_use]
    pub fn link(
        task_id: TaskId,
        target: LinkTarget,
        local: &Observation,
        remote: &Observation,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        let status = evaluate(local, remote, &LastKnownState::default());
        let synced = status == SyncStatus::Synced;
        Self {
            task_id,
            team_id: target.team_id,
            issue_number: target.issue_number,
            issue_url: target.issue_url,
            sync_status: status,
            synced_fingerprint: synced.then(|| local.fingerprint.clone()),
            last_synced_at: synced.then_some(timestamp),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a mapping from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedMappingData) -> Self {
        Self {
            task_id: data.task_id,
            team_id: data.team_id,
            issue_number: data.issue_number,
            issue_url: data.issue_url,
            sync_status: data.sync_status,
            synced_fingerprint: data.synced_fingerprint,
            last_synced_at: data.last_synced_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the mapped task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the owning team.
    #[must_use]
    pub const fn team_id(&self) -> TeamId {
        self.team_id
    }

    /// Returns the mapped issue number.
    #[must_use]
    pub const fn issue_number(&self) -> IssueNumber {
        self.issue_number
    }

    /// Returns the issue URL.
    #[must_use]
    pub fn issue_url(&self) -> &str {
        &self.issue_url
    }

    /// Returns the current sync status.
    #[must_use]
    pub const fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }

    /// Returns the fingerprint recorded at the last successful sync.
    #[must_use]
    pub const fn synced_fingerprint(&self) -> Option<&ContentFingerprint> {
        self.synced_fingerprint.as_ref()
    }

    /// Returns the time of the last successful sync.
    #[must_use]
    pub const fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the tracker input describing the last sync.
    #[must_use]
    pub fn last_known_state(&self) -> LastKnownState {
        LastKnownState {
            synced_fingerprint: self.synced_fingerprint.clone(),
            last_synced_at: self.last_synced_at,
            last_attempt_failed: self.sync_status == SyncStatus::Error,
        }
    }

    /// Records a successful push that left both sides at `fingerprint`.
    pub fn record_synced(&mut self, fingerprint: ContentFingerprint, clock: &impl Clock) {
        let timestamp = clock.utc();
        self.sync_status = SyncStatus::Synced;
        self.synced_fingerprint = Some(fingerprint);
        self.last_synced_at = Some(timestamp);
        self.updated_at = timestamp;
    }

    /// Records a failed sync attempt.
    pub fn record_failure(&mut self, clock: &impl Clock) {
        self.sync_status = SyncStatus::Error;
        self.updated_at = clock.utc();
    }

    /// Re-evaluates the status from fresh observations without pushing.
    ///
    /// `ERROR` survives a refresh; only [`Self::record_synced`] clears it.
    /// Returns `true` when the status changed.
    pub fn refresh(&mut self, local: &Observation, remote: &Observation, clock: &impl Clock) -> bool {
        let status = evaluate(local, remote, &self.last_known_state());
        if status == self.sync_status {
            return false;
        }
        self.sync_status = status;
        self.updated_at = clock.utc();
        true
    }
}

/// Result of looking up a task's mapping.
///
/// "Not linked" is an ordinary answer rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MappingLookup {
    /// The task is linked.
    Linked(TaskIssueMapping),
    /// The task has no mapping; serialised as `{"linked": false}`.
    NotLinked {
        /// Always `false`.
        linked: bool,
    },
}

impl MappingLookup {
    /// Builds the "not linked" answer.
    #[must_use]
    pub const fn not_linked() -> Self {
        Self::NotLinked { linked: false }
    }

    /// Returns the mapping when the task is linked.
    #[must_use]
    pub const fn mapping(&self) -> Option<&TaskIssueMapping> {
        match self {
            Self::Linked(mapping) => Some(mapping),
            Self::NotLinked { .. } => None,
        }
    }

    /// Returns whether the task is linked.
    #[must_use]
    pub const fn is_linked(&self) -> bool {
        matches!(self, Self::Linked(_))
    }
}

impl From<Option<TaskIssueMapping>> for MappingLookup {
    fn from(value: Option<TaskIssueMapping>) -> Self {
        value.map_or_else(Self::not_linked, Self::Linked)
    }
}
