//! Port for GitHub issues, branches and pull requests.

use crate::sync::domain::{
    BranchName, IssueDraft, IssueNumber, MergeMethod, NewPullRequest, PrDetail,
    PullRequestNumber, PullRequestRecord, RemoteIssue, RepositoryFullName,
};
use crate::sync::ports::RemoteResult;
use async_trait::async_trait;

/// Result of a successful merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReceipt {
    /// Merge commit.
    pub sha: String,
    /// GitHub's confirmation message.
    pub message: String,
}

/// GitHub repository operations used by the engine.
#[async_trait]
pub trait GitHubGateway: Send + Sync {
    /// Fetches an issue. Returns `None` when it does not exist.
    async fn get_issue(
        &self,
        repository: &RepositoryFullName,
        number: IssueNumber,
    ) -> RemoteResult<Option<RemoteIssue>>;

    /// Lists open issues, excluding pull requests.
    async fn list_open_issues(&self, repository: &RepositoryFullName)
    -> RemoteResult<Vec<RemoteIssue>>;

    /// Creates an issue.
    async fn create_issue(
        &self,
        repository: &RepositoryFullName,
        draft: &IssueDraft,
    ) -> RemoteResult<RemoteIssue>;

    /// Overwrites title, body and state of an issue.
    async fn update_issue(
        &self,
        repository: &RepositoryFullName,
        number: IssueNumber,
        draft: &IssueDraft,
    ) -> RemoteResult<RemoteIssue>;

    /// Returns the repository's default branch.
    async fn default_branch(&self, repository: &RepositoryFullName) -> RemoteResult<BranchName>;

    /// Returns the commit at the head of `branch`.
    async fn branch_head(
        &self,
        repository: &RepositoryFullName,
        branch: &BranchName,
    ) -> RemoteResult<String>;

    /// Creates `branch` pointing at `from_sha`.
    async fn create_branch(
        &self,
        repository: &RepositoryFullName,
        branch: &BranchName,
        from_sha: &str,
    ) -> RemoteResult<()>;

    /// Opens a pull request.
    async fn create_pull_request(
        &self,
        repository: &RepositoryFullName,
        request: &NewPullRequest,
    ) -> RemoteResult<PullRequestRecord>;

    /// Lists pull requests in every state.
    async fn list_pull_requests(
        &self,
        repository: &RepositoryFullName,
    ) -> RemoteResult<Vec<PullRequestRecord>>;

    /// Lists pull requests that reference `issue` in its timeline.
    async fn cross_referenced_pull_requests(
        &self,
        repository: &RepositoryFullName,
        issue: IssueNumber,
    ) -> RemoteResult<Vec<PullRequestRecord>>;

    /// Fetches mergeability detail for a pull request.
    async fn pull_request_detail(
        &self,
        repository: &RepositoryFullName,
        number: PullRequestNumber,
    ) -> RemoteResult<PrDetail>;

    /// Merges a pull request.
    ///
    /// Returns [`crate::sync::ports::RemoteError::NotMergeable`] when GitHub
    /// refuses the merge without a conflict.
    async fn merge_pull_request(
        &self,
        repository: &RepositoryFullName,
        number: PullRequestNumber,
        method: MergeMethod,
    ) -> RemoteResult<MergeReceipt>;
}
