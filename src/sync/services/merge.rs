//! Pull request merge execution with bounded automatic retries.
//!
//! GitHub briefly answers "not mergeable" after a push while it recomputes
//! mergeability. Such refusals are retried automatically a fixed number of
//! times; after that the caller gets a [`RetryPrompt`] and each confirmed
//! retry performs exactly one more attempt.

use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{InFlightRegistry, SyncError, SyncResult, settings::connected_repository};
use crate::sync::{
    domain::{
        ConflictFile, MergeMethod, MergePhase, MergeProgress, MergeRetryPolicy,
        PullRequestNumber, RepositoryFullName, SyncDomainError, SyncEvent, SyncEventKind, TaskId,
        TeamId,
    },
    ports::{
        Delay, GitHubGateway, MergeReceipt, RemoteError, SyncEventPublisher, TaskBoard,
        TeamDirectory,
    },
};

/// Merge request for one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    /// Team owning the repository.
    pub team_id: TeamId,
    /// Pull request to merge.
    pub pr_number: PullRequestNumber,
    /// Merge strategy.
    pub method: MergeMethod,
    /// Task to complete once merged.
    pub task_id: Option<TaskId>,
}

impl MergeRequest {
    /// Creates a merge-commit request without task completion.
    #[must_use]
    pub fn new(team_id: TeamId, pr_number: PullRequestNumber) -> Self {
        Self {
            team_id,
            pr_number,
            method: MergeMethod::default(),
            task_id: None,
        }
    }

    /// Sets the merge strategy.
    #[must_use]
    pub const fn with_method(mut self, method: MergeMethod) -> Self {
        self.method = method;
        self
    }

    /// Completes `task_id` after a successful merge.
    #[must_use]
    pub const fn completing(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    fn key(&self) -> String {
        format!("{}/{}", self.team_id, self.pr_number)
    }
}

/// What happened to the task owning a merged pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCompletion {
    /// No task was named in the request.
    NotRequested,
    /// The task was marked complete.
    Completed(TaskId),
    /// The board refused to complete the task; the merge still stands.
    Failed {
        /// Task that stayed open.
        task_id: TaskId,
        /// Board error message.
        message: String,
    },
}

/// Offer to retry a merge GitHub keeps refusing as not mergeable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPrompt {
    request: MergeRequest,
    attempts: u32,
    message: String,
    retry_delay: Duration,
}

impl RetryPrompt {
    /// Returns the request to retry.
    #[must_use]
    pub const fn request(&self) -> &MergeRequest {
        &self.request
    }

    /// Returns the merge calls made so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns GitHub's last refusal message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the wait before a confirmed retry.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Gives up, turning the prompt into [`SyncError::TransientMerge`].
    #[must_use]
    pub fn decline(self) -> SyncError {
        SyncError::TransientMerge {
            message: self.message,
            attempts: self.attempts,
        }
    }
}

/// Result of a merge call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The pull request was merged.
    Merged {
        /// Merge commit.
        sha: String,
        /// Merge calls made, including the successful one.
        attempts: u32,
        /// Completion of the owning task.
        task_completion: TaskCompletion,
    },
    /// Conflicting files block the merge; nothing was attempted.
    Conflicted {
        /// Files to resolve.
        files: Vec<ConflictFile>,
    },
    /// Automatic retries are exhausted.
    RetryPrompt(RetryPrompt),
}

/// Merges pull requests and completes their tasks.
#[derive(Clone)]
pub struct MergeService<W, G, D, C>
where
    W: TaskBoard + TeamDirectory,
    G: GitHubGateway,
    D: Delay,
    C: Clock + Send + Sync,
{
    workspace: Arc<W>,
    github: Arc<G>,
    delay: Arc<D>,
    events: Arc<dyn SyncEventPublisher>,
    clock: Arc<C>,
    policy: MergeRetryPolicy,
    in_flight: InFlightRegistry,
}

impl<W, G, D, C> MergeService<W, G, D, C>
where
    W: TaskBoard + TeamDirectory,
    G: GitHubGateway,
    D: Delay,
    C: Clock + Send + Sync,
{
    /// Creates a merge service with the default retry policy.
    #[must_use]
    pub fn new(
        workspace: Arc<W>,
        github: Arc<G>,
        delay: Arc<D>,
        events: Arc<dyn SyncEventPublisher>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            workspace,
            github,
            delay,
            events,
            clock,
            policy: MergeRetryPolicy::default(),
            in_flight: InFlightRegistry::new(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: MergeRetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shares an in-flight registry with other services.
    #[must_use]
    pub fn with_in_flight(mut self, registry: InFlightRegistry) -> Self {
        self.in_flight = registry;
        self
    }

    /// Checks mergeability and merges.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] for a closed pull request and
    /// [`SyncError::Upstream`] with GitHub's raw message for any refusal
    /// other than the transient "not mergeable" answer.
    pub async fn merge(&self, request: MergeRequest) -> SyncResult<MergeOutcome> {
        let _guard = self.in_flight.acquire("merge", request.key())?;
        let repository = connected_repository(self.workspace.as_ref(), request.team_id).await?;
        let mut progress = MergeProgress::new();
        progress.advance(MergePhase::Checking)?;

        let detail = match self
            .github
            .pull_request_detail(&repository, request.pr_number)
            .await
        {
            Ok(detail) => detail,
            Err(err) => {
                progress.advance(MergePhase::Failed)?;
                return Err(err.into());
            }
        };
        if !detail.record.is_open() {
            progress.advance(MergePhase::Failed)?;
            return Err(SyncDomainError::PullRequestClosed(request.pr_number.value()).into());
        }
        if detail.has_conflicts {
            progress.advance(MergePhase::Conflicted)?;
            debug!(pr_number = %request.pr_number, files = detail.conflict_files.len(), "merge blocked by conflicts");
            return Ok(MergeOutcome::Conflicted {
                files: detail.conflict_files,
            });
        }
        let checked = if detail.mergeable == Some(true) {
            MergePhase::Mergeable
        } else {
            MergePhase::Unknown
        };
        progress.advance(checked)?;
        progress.advance(MergePhase::Merging)?;
        self.attempt(&repository, request, progress, true).await
    }

    /// Waits the prompt's delay and performs exactly one more attempt.
    ///
    /// # Errors
    ///
    /// As for [`Self::merge`].
    pub async fn confirm_retry(&self, prompt: RetryPrompt) -> SyncResult<MergeOutcome> {
        let _guard = self.in_flight.acquire("merge", prompt.request.key())?;
        let repository = connected_repository(self.workspace.as_ref(), prompt.request.team_id).await?;
        self.delay.wait(prompt.retry_delay).await;
        let mut progress = MergeProgress::awaiting_confirmation(prompt.attempts);
        progress.advance(MergePhase::Merging)?;
        self.attempt(&repository, prompt.request, progress, false).await
    }

    async fn attempt(
        &self,
        repository: &RepositoryFullName,
        request: MergeRequest,
        mut progress: MergeProgress,
        automatic: bool,
    ) -> SyncResult<MergeOutcome> {
        loop {
            let result = self
                .github
                .merge_pull_request(repository, request.pr_number, request.method)
                .await;
            match result {
                Ok(receipt) => {
                    progress.advance(MergePhase::Merged)?;
                    return Ok(self.finish(&request, receipt, progress.attempts()).await);
                }
                Err(RemoteError::NotMergeable(message)) => {
                    if automatic && progress.attempts() <= self.policy.automatic_retries {
                        debug!(pr_number = %request.pr_number, attempts = progress.attempts(), %message, "pull request not mergeable yet, retrying");
                        self.delay.wait(self.policy.automatic_delay).await;
                        progress.advance(MergePhase::Merging)?;
                        continue;
                    }
                    progress.advance(MergePhase::AwaitingConfirmation)?;
                    info!(pr_number = %request.pr_number, attempts = progress.attempts(), "merge awaiting confirmation");
                    return Ok(MergeOutcome::RetryPrompt(RetryPrompt {
                        request,
                        attempts: progress.attempts(),
                        message,
                        retry_delay: self.policy.confirmed_delay,
                    }));
                }
                Err(err) => {
                    progress.advance(MergePhase::Failed)?;
                    warn!(pr_number = %request.pr_number, error = %err, "merge failed");
                    return Err(err.into());
                }
            }
        }
    }

    async fn finish(&self, request: &MergeRequest, receipt: MergeReceipt, attempts: u32) -> MergeOutcome {
        info!(team_id = %request.team_id, pr_number = %request.pr_number, sha = %receipt.sha, attempts, "merged pull request");
        self.events.publish(SyncEvent::new(
            SyncEventKind::PullRequestMerged {
                team_id: request.team_id,
                pr_number: request.pr_number,
                task_id: request.task_id,
                sha: receipt.sha.clone(),
            },
            self.clock.utc(),
        ));
        let task_completion = match request.task_id {
            None => TaskCompletion::NotRequested,
            Some(task_id) => match self.workspace.complete_task(task_id).await {
                Ok(()) => TaskCompletion::Completed(task_id),
                Err(err) => {
                    warn!(%task_id, error = %err, "task completion after merge failed");
                    TaskCompletion::Failed {
                        task_id,
                        message: err.message().to_owned(),
                    }
                }
            },
        };
        MergeOutcome::Merged {
            sha: receipt.sha,
            attempts,
            task_completion,
        }
    }
}
