//! Domain model for GitHub synchronization.
//!
//! The domain covers task/issue mappings, sync status classification,
//! column rules, branch and pull request values, and the conflict and merge
//! state machines. Infrastructure concerns stay outside this boundary.

mod branch;
mod column_rule;
mod conflict;
mod error;
mod event;
mod ids;
mod issue;
mod mapping;
mod merge;
mod projection;
mod pull_request;
mod sync_status;
mod task;
mod team;

pub use branch::BranchName;
pub use column_rule::{ColumnMappingRule, ColumnRuleError, ColumnRuleSet, DuplicateRuleError};
pub use conflict::{
    ApplyRequest, ConflictAnalysis, ConflictResolutionSession, ResolutionOption, ResolutionState,
};
pub use error::{ParseSyncValueError, SyncDomainError};
pub use event::{MappingChange, SyncEvent, SyncEventKind};
pub use ids::{ColumnId, IssueNumber, MemberId, RepositoryFullName, TaskId, TeamId};
pub use issue::{IssueDraft, IssueState, RemoteIssue};
pub use mapping::{LinkTarget, MappingLookup, PersistedMappingData, TaskIssueMapping};
pub use merge::{MergeMethod, MergePhase, MergeProgress, MergeRetryPolicy, PollPolicy};
pub use projection::{PrDetailProjection, ReconcileReport};
pub use pull_request::{
    ConflictFile, FileChangeStatus, NewPullRequest, PrDetail, PullRequestNumber,
    PullRequestRecord,
};
pub use sync_status::{
    ContentFingerprint, ContentSnapshot, LastKnownState, Observation, SyncStatus, evaluate,
};
pub use task::{BoardTask, NewBoardTask};
pub use team::{PersistedTeamSettings, TeamGithubSettings};

pub(crate) use merge::duration_secs;
