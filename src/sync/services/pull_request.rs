//! Branch and pull request coordination for tasks.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{InFlightRegistry, SyncError, SyncResult, settings::connected_repository};
use crate::sync::{
    domain::{
        BranchName, NewPullRequest, PollPolicy, PrDetail, PullRequestNumber, PullRequestRecord,
        SyncDomainError, TaskId, TeamId,
    },
    ports::{Delay, GitHubGateway, MappingRepository, TaskBoard, TeamDirectory},
};

/// Input for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePullRequestRequest {
    /// Owning team.
    pub team_id: TeamId,
    /// Branch holding the changes.
    pub head: String,
    /// Target branch; the repository default when absent.
    pub base: Option<String>,
    /// Pull request title.
    pub title: String,
    /// Pull request body.
    pub body: Option<String>,
}

/// Creates task branches and pull requests and reads their state.
#[derive(Clone)]
pub struct PullRequestService<M, W, G, D>
where
    M: MappingRepository,
    W: TaskBoard + TeamDirectory,
    G: GitHubGateway,
    D: Delay,
{
    mappings: Arc<M>,
    workspace: Arc<W>,
    github: Arc<G>,
    delay: Arc<D>,
    poll: PollPolicy,
    in_flight: InFlightRegistry,
}

impl<M, W, G, D> PullRequestService<M, W, G, D>
where
    M: MappingRepository,
    W: TaskBoard + TeamDirectory,
    G: GitHubGateway,
    D: Delay,
{
    /// Creates a service with the default poll policy.
    #[must_use]
    pub fn new(mappings: Arc<M>, workspace: Arc<W>, github: Arc<G>, delay: Arc<D>) -> Self {
        Self {
            mappings,
            workspace,
            github,
            delay,
            poll: PollPolicy::default(),
            in_flight: InFlightRegistry::new(),
        }
    }

    /// Replaces the mergeability poll policy.
    #[must_use]
    pub const fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Shares an in-flight registry with other services.
    #[must_use]
    pub fn with_in_flight(mut self, registry: InFlightRegistry) -> Self {
        self.in_flight = registry;
        self
    }

    /// Creates the work branch of a task from the default branch head.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::TaskNotFound`] for an unknown task and
    /// [`SyncError::Upstream`] when GitHub rejects the branch.
    pub async fn create_branch(&self, task_id: TaskId, team_id: TeamId) -> SyncResult<BranchName> {
        let _guard = self.in_flight.acquire("pr.branch", task_id)?;
        let task = self
            .workspace
            .find_task(task_id)
            .await?
            .filter(|task| task.team_id() == team_id)
            .ok_or(SyncError::TaskNotFound(task_id))?;
        let repository = connected_repository(self.workspace.as_ref(), team_id).await?;

        let branch = BranchName::for_task(task_id, task.title());
        let base = self.github.default_branch(&repository).await?;
        let head_sha = self.github.branch_head(&repository, &base).await?;
        self.github
            .create_branch(&repository, &branch, &head_sha)
            .await?;
        info!(%task_id, %team_id, %branch, %base, "created task branch");
        Ok(branch)
    }

    /// Opens a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] for a blank head branch or title,
    /// before any remote call, and [`SyncError::Upstream`] when GitHub
    /// rejects the pull request.
    pub async fn create_pr(&self, request: CreatePullRequestRequest) -> SyncResult<PullRequestRecord> {
        if request.head.trim().is_empty() {
            return Err(SyncDomainError::EmptyHeadBranch.into());
        }
        if request.title.trim().is_empty() {
            return Err(SyncDomainError::EmptyTitle("pull request").into());
        }
        let _guard = self.in_flight.acquire("pr.create", request.head.trim())?;
        let repository = connected_repository(self.workspace.as_ref(), request.team_id).await?;
        let base = match request.base.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            Some(base) => BranchName::new(base)?,
            None => self.github.default_branch(&repository).await?,
        };
        let new_pr = NewPullRequest::new(&request.head, base, &request.title, request.body.as_deref())?;
        let record = self.github.create_pull_request(&repository, &new_pr).await?;
        info!(team_id = %request.team_id, pr_number = %record.number, head = %new_pr.head(), "opened pull request");
        Ok(record)
    }

    /// Lists the pull requests of a task.
    ///
    /// Includes pull requests whose head branch was derived for the task and
    /// pull requests cross-referenced from the task's issue, deduplicated and
    /// ordered by number.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] when GitHub cannot be read.
    pub async fn list_prs(&self, task_id: TaskId, team_id: TeamId) -> SyncResult<Vec<PullRequestRecord>> {
        let repository = connected_repository(self.workspace.as_ref(), team_id).await?;
        let mut by_number: BTreeMap<PullRequestNumber, PullRequestRecord> = self
            .github
            .list_pull_requests(&repository)
            .await?
            .into_iter()
            .filter(|record| {
                BranchName::new(record.head_branch.as_str())
                    .is_ok_and(|branch| branch.belongs_to_task(task_id))
            })
            .map(|record| (record.number, record))
            .collect();

        if let Some(mapping) = self.mappings.find_by_task(task_id).await? {
            let referenced = self
                .github
                .cross_referenced_pull_requests(&repository, mapping.issue_number())
                .await?;
            for mut record in referenced {
                record.from_github = true;
                by_number.entry(record.number).or_insert(record);
            }
        }
        Ok(by_number.into_values().collect())
    }

    /// Returns the repository's default branch.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] without a connected repository and
    /// [`SyncError::Upstream`] when GitHub cannot be read.
    pub async fn default_branch(&self, team_id: TeamId) -> SyncResult<BranchName> {
        let repository = connected_repository(self.workspace.as_ref(), team_id).await?;
        Ok(self.github.default_branch(&repository).await?)
    }

    /// Fetches mergeability detail; `mergeable` may still be unknown.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] when GitHub cannot be read.
    pub async fn get_pr_detail(&self, team_id: TeamId, pr_number: PullRequestNumber) -> SyncResult<PrDetail> {
        let repository = connected_repository(self.workspace.as_ref(), team_id).await?;
        Ok(self.github.pull_request_detail(&repository, pr_number).await?)
    }

    /// Polls until GitHub has computed mergeability or the poll policy is
    /// exhausted, returning the last detail either way.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] when a fetch fails.
    pub async fn await_mergeability(
        &self,
        team_id: TeamId,
        pr_number: PullRequestNumber,
    ) -> SyncResult<PrDetail> {
        let repository = connected_repository(self.workspace.as_ref(), team_id).await?;
        let mut detail = self.github.pull_request_detail(&repository, pr_number).await?;
        for interval in self.poll.schedule() {
            if detail.mergeability_known() {
                break;
            }
            debug!(%pr_number, ?interval, "mergeability unknown, polling again");
            self.delay.wait(interval).await;
            detail = self.github.pull_request_detail(&repository, pr_number).await?;
        }
        Ok(detail)
    }
}
