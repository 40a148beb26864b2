//! Port for AI-assisted conflict resolution.

use crate::sync::domain::{ApplyRequest, ConflictAnalysis, PullRequestNumber, TeamId};
use crate::sync::ports::RemoteResult;
use async_trait::async_trait;

/// Source of conflict analyses and sink for chosen resolutions.
#[async_trait]
pub trait ConflictAdvisor: Send + Sync {
    /// Analyses a conflicting file and proposes ordered resolution options.
    async fn resolve_conflict(
        &self,
        team_id: TeamId,
        pr_number: PullRequestNumber,
        filename: &str,
    ) -> RemoteResult<ConflictAnalysis>;

    /// Pushes the chosen replacement content to the pull request head.
    async fn apply_resolution(
        &self,
        team_id: TeamId,
        pr_number: PullRequestNumber,
        request: &ApplyRequest,
    ) -> RemoteResult<()>;
}
