//! Task/issue mapping store and single-item synchronization.

use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    InFlightRegistry, IssueBodyTemplate, SyncError, SyncResult,
    settings::connected_repository,
};
use crate::sync::{
    domain::{
        BoardTask, IssueNumber, LinkTarget, MappingChange, MappingLookup, MemberId, Observation,
        RemoteIssue, SyncDomainError, SyncEvent, SyncEventKind, SyncStatus, TaskId,
        TaskIssueMapping, TeamId,
    },
    ports::{
        GitHubGateway, MappingRepository, RemoteError, SyncEventPublisher, TaskBoard,
        TeamDirectory,
    },
};

/// Links tasks to issues and keeps each pair consistent.
#[derive(Clone)]
pub struct MappingService<M, W, G, C>
where
    M: MappingRepository,
    W: TaskBoard + TeamDirectory,
    G: GitHubGateway,
    C: Clock + Send + Sync,
{
    mappings: Arc<M>,
    workspace: Arc<W>,
    github: Arc<G>,
    events: Arc<dyn SyncEventPublisher>,
    clock: Arc<C>,
    template: IssueBodyTemplate,
    in_flight: InFlightRegistry,
}

impl<M, W, G, C> MappingService<M, W, G, C>
where
    M: MappingRepository,
    W: TaskBoard + TeamDirectory,
    G: GitHubGateway,
    C: Clock + Send + Sync,
{
    /// Creates a service with the default issue body template.
    #[must_use]
    pub fn new(
        mappings: Arc<M>,
        workspace: Arc<W>,
        github: Arc<G>,
        events: Arc<dyn SyncEventPublisher>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            mappings,
            workspace,
            github,
            events,
            clock,
            template: IssueBodyTemplate::default(),
            in_flight: InFlightRegistry::new(),
        }
    }

    /// Replaces the issue body template.
    #[must_use]
    pub fn with_template(mut self, template: IssueBodyTemplate) -> Self {
        self.template = template;
        self
    }

    /// Shares an in-flight registry with other services.
    #[must_use]
    pub fn with_in_flight(mut self, registry: InFlightRegistry) -> Self {
        self.in_flight = registry;
        self
    }

    /// Returns the mapping of a task, or [`MappingLookup::NotLinked`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Repository`] when the lookup fails.
    pub async fn get_mapping(&self, task_id: TaskId) -> SyncResult<MappingLookup> {
        Ok(self.mappings.find_by_task(task_id).await?.into())
    }

    /// Links an existing task to an existing issue.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Conflict`] when either side is already mapped,
    /// [`SyncError::TaskNotFound`] for an unknown task and
    /// [`SyncError::Upstream`] when the issue cannot be fetched.
    pub async fn link(
        &self,
        task_id: TaskId,
        issue_number: IssueNumber,
        team_id: TeamId,
        requester: MemberId,
    ) -> SyncResult<TaskIssueMapping> {
        let _guard = self.in_flight.acquire("mapping.link", task_id)?;
        self.ensure_unlinked(task_id).await?;
        if self
            .mappings
            .find_by_issue(team_id, issue_number)
            .await?
            .is_some()
        {
            return Err(SyncError::Conflict(format!(
                "issue #{issue_number} is already linked to a task in team {team_id}"
            )));
        }

        let task = self.team_task(task_id, team_id).await?;
        let repository = connected_repository(self.workspace.as_ref(), team_id).await?;
        let issue = self
            .github
            .get_issue(&repository, issue_number)
            .await?
            .ok_or_else(|| RemoteError::NotFound(format!("issue #{issue_number} not found")))?;

        let mapping = self.store_link(&task, &issue).await?;
        info!(%task_id, %issue_number, %team_id, %requester, status = %mapping.sync_status(), "linked task to issue");
        Ok(mapping)
    }

    /// Removes the mapping of a task.
    ///
    /// Returns `false` when the task was not linked.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Repository`] when removal fails.
    pub async fn unlink(&self, task_id: TaskId) -> SyncResult<bool> {
        let _guard = self.in_flight.acquire("mapping.unlink", task_id)?;
        let Some(removed) = self.mappings.remove(task_id).await? else {
            debug!(%task_id, "unlink ignored for unlinked task");
            return Ok(false);
        };
        self.publish(&removed, MappingChange::Unlinked, None);
        info!(%task_id, issue_number = %removed.issue_number(), "unlinked task");
        Ok(true)
    }

    /// Creates an issue mirroring a task and links the two.
    ///
    /// Nothing is stored when the issue cannot be created.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Conflict`] when the task is already linked,
    /// [`SyncError::Validation`] without a connected repository and
    /// [`SyncError::Upstream`] when GitHub rejects the issue.
    pub async fn create_from_task(
        &self,
        task_id: TaskId,
        team_id: TeamId,
        requester: MemberId,
    ) -> SyncResult<TaskIssueMapping> {
        let _guard = self.in_flight.acquire("mapping.create", task_id)?;
        self.ensure_unlinked(task_id).await?;
        let task = self.team_task(task_id, team_id).await?;
        let repository = connected_repository(self.workspace.as_ref(), team_id).await?;
        let draft = self.template.draft_for(&task)?;

        let issue = self
            .github
            .create_issue(&repository, &draft)
            .await
            .inspect_err(|err| warn!(%task_id, %team_id, error = %err, "issue creation failed"))?;

        let mapping = self.store_link(&task, &issue).await?;
        info!(%task_id, issue_number = %issue.number, %requester, "created issue from task");
        Ok(mapping)
    }

    /// Pushes the task's title, body and state to its issue.
    ///
    /// The local side wins. On failure the mapping is persisted as `ERROR`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the task is not linked and
    /// [`SyncError::Upstream`] when GitHub rejects the update.
    pub async fn sync(&self, task_id: TaskId, requester: MemberId) -> SyncResult<TaskIssueMapping> {
        let _guard = self.in_flight.acquire("mapping.sync", task_id)?;
        let mut mapping = self.require_mapping(task_id).await?;
        let team_id = mapping.team_id();
        let task = self.team_task(task_id, team_id).await?;
        let repository = connected_repository(self.workspace.as_ref(), team_id).await?;
        let draft = self.template.draft_for(&task)?;

        match self
            .github
            .update_issue(&repository, mapping.issue_number(), &draft)
            .await
        {
            Ok(_) => {
                mapping.record_synced(draft.content().fingerprint(), &*self.clock);
                self.mappings.update(&mapping).await?;
                self.publish(&mapping, MappingChange::StatusChanged, Some(SyncStatus::Synced));
                info!(%task_id, issue_number = %mapping.issue_number(), %requester, "synced task to issue");
                Ok(mapping)
            }
            Err(err) => {
                warn!(%task_id, issue_number = %mapping.issue_number(), error = %err, "sync failed");
                mapping.record_failure(&*self.clock);
                self.mappings.update(&mapping).await?;
                self.publish(&mapping, MappingChange::StatusChanged, Some(SyncStatus::Error));
                Err(err.into())
            }
        }
    }

    /// Recomputes the status of a mapping from both sides without pushing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the task is not linked and
    /// [`SyncError::Upstream`] when either side cannot be read.
    pub async fn refresh_status(&self, task_id: TaskId) -> SyncResult<TaskIssueMapping> {
        let mut mapping = self.require_mapping(task_id).await?;
        let team_id = mapping.team_id();
        let task = self.team_task(task_id, team_id).await?;
        let repository = connected_repository(self.workspace.as_ref(), team_id).await?;
        let issue = self
            .github
            .get_issue(&repository, mapping.issue_number())
            .await?
            .ok_or_else(|| {
                RemoteError::NotFound(format!("issue #{} not found", mapping.issue_number()))
            })?;

        let (_, local) = self.template.observe(&task)?;
        let remote = Observation::of(&issue.content(), issue.updated_at);
        if mapping.refresh(&local, &remote, &*self.clock) {
            self.mappings.update(&mapping).await?;
            let status = mapping.sync_status();
            self.publish(&mapping, MappingChange::StatusChanged, Some(status));
            debug!(%task_id, %status, "sync status changed");
        }
        Ok(mapping)
    }

    /// Polling variant of [`Self::refresh_status`].
    ///
    /// Failures are logged and reported as `None`.
    pub async fn poll_status(&self, task_id: TaskId) -> Option<SyncStatus> {
        match self.refresh_status(task_id).await {
            Ok(mapping) => Some(mapping.sync_status()),
            Err(err) => {
                debug!(%task_id, error = %err, "status poll failed");
                None
            }
        }
    }

    async fn ensure_unlinked(&self, task_id: TaskId) -> SyncResult<()> {
        if self.mappings.find_by_task(task_id).await?.is_some() {
            return Err(SyncError::Conflict(format!(
                "task {task_id} is already linked to an issue"
            )));
        }
        Ok(())
    }

    async fn require_mapping(&self, task_id: TaskId) -> SyncResult<TaskIssueMapping> {
        self.mappings
            .find_by_task(task_id)
            .await?
            .ok_or_else(|| SyncDomainError::TaskNotLinked(task_id.value()).into())
    }

    async fn team_task(&self, task_id: TaskId, team_id: TeamId) -> SyncResult<BoardTask> {
        self.workspace
            .find_task(task_id)
            .await?
            .filter(|task| task.team_id() == team_id)
            .ok_or(SyncError::TaskNotFound(task_id))
    }

    async fn store_link(&self, task: &BoardTask, issue: &RemoteIssue) -> SyncResult<TaskIssueMapping> {
        let mapping = link_mapping(&self.template, task, issue, &*self.clock)?;
        self.mappings.store(&mapping).await?;
        self.publish(&mapping, MappingChange::Linked, Some(mapping.sync_status()));
        Ok(mapping)
    }

    fn publish(&self, mapping: &TaskIssueMapping, change: MappingChange, status: Option<SyncStatus>) {
        publish_mapping_event(self.events.as_ref(), mapping, change, status, self.clock.utc());
    }
}

/// Builds a fresh mapping between a task and an issue.
pub(super) fn link_mapping(
    template: &IssueBodyTemplate,
    task: &BoardTask,
    issue: &RemoteIssue,
    clock: &impl Clock,
) -> SyncResult<TaskIssueMapping> {
    let (_, local) = template.observe(task)?;
    let remote = Observation::of(&issue.content(), issue.updated_at);
    Ok(TaskIssueMapping::link(
        task.id(),
        LinkTarget {
            team_id: task.team_id(),
            issue_number: issue.number,
            issue_url: issue.html_url.clone(),
        },
        &local,
        &remote,
        clock,
    ))
}

pub(super) fn publish_mapping_event(
    events: &dyn SyncEventPublisher,
    mapping: &TaskIssueMapping,
    change: MappingChange,
    status: Option<SyncStatus>,
    at: chrono::DateTime<chrono::Utc>,
) {
    events.publish(SyncEvent::new(
        SyncEventKind::MappingChanged {
            team_id: mapping.team_id(),
            task_id: mapping.task_id(),
            issue_number: mapping.issue_number(),
            change,
            status,
        },
        at,
    ));
}
