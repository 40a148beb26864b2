//! Bulk reconciliation between unlinked tasks and unlinked issues.
//!
//! Batches never abort on a single item: each failure is counted and
//! reported with its message. Preconditions (a connected repository, a
//! readable issue or task list) are checked before the batch starts.

use mockable::Clock;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    InFlightRegistry, IssueBodyTemplate, SyncResult,
    mapping::{link_mapping, publish_mapping_event},
    settings::{connected_repository, load_settings, require_repository},
};
use crate::sync::{
    domain::{
        BoardTask, IssueNumber, MappingChange, MemberId, NewBoardTask, RemoteIssue,
        RepositoryFullName, TaskId, TeamGithubSettings, TeamId,
    },
    ports::{GitHubGateway, MappingRepository, SyncEventPublisher, TaskBoard, TeamDirectory},
};

/// Outcome of one batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome<T> {
    /// A counterpart was created and linked.
    Linked {
        /// Identifier of the created counterpart.
        counterpart: T,
    },
    /// The item was already linked.
    Skipped,
    /// Creating or linking the counterpart failed.
    Failed {
        /// Failure message.
        message: String,
    },
}

/// Per-issue result of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportItem {
    /// Source issue.
    pub issue_number: IssueNumber,
    /// Issue title.
    pub title: String,
    /// What happened.
    #[serde(flatten)]
    pub outcome: ItemOutcome<TaskId>,
}

/// Per-task result of an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportItem {
    /// Source task.
    pub task_id: TaskId,
    /// Task title.
    pub title: String,
    /// What happened.
    #[serde(flatten)]
    pub outcome: ItemOutcome<IssueNumber>,
}

/// Summary of importing open issues as tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Issues turned into linked tasks.
    pub imported: usize,
    /// Issues that were already linked.
    pub skipped: usize,
    /// Issues that could not be imported.
    pub failed: usize,
    /// Per-issue detail in processing order.
    pub items: Vec<ImportItem>,
}

/// Summary of exporting tasks as issues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    /// Tasks turned into linked issues.
    pub exported: usize,
    /// Tasks that were already linked.
    pub skipped: usize,
    /// Tasks that could not be exported.
    pub failed: usize,
    /// Per-task detail in processing order.
    pub items: Vec<ExportItem>,
}

/// Number of items each side would contribute to a reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlinkedCounts {
    /// Open tasks without an issue.
    pub unlinked_tasks: usize,
    /// Open issues without a task.
    pub unlinked_issues: usize,
}

fn tally<T>(outcome: &ItemOutcome<T>, linked: &mut usize, skipped: &mut usize, failed: &mut usize) {
    let counter = match outcome {
        ItemOutcome::Linked { .. } => linked,
        ItemOutcome::Skipped => skipped,
        ItemOutcome::Failed { .. } => failed,
    };
    *counter = counter.saturating_add(1);
}

impl ImportReport {
    fn push(&mut self, item: ImportItem) {
        tally(&item.outcome, &mut self.imported, &mut self.skipped, &mut self.failed);
        self.items.push(item);
    }
}

impl ExportReport {
    fn push(&mut self, item: ExportItem) {
        tally(&item.outcome, &mut self.exported, &mut self.skipped, &mut self.failed);
        self.items.push(item);
    }
}

/// Creates the missing counterpart for every unlinked task or issue.
#[derive(Clone)]
pub struct ReconciliationService<M, W, G, C>
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

impl<M, W, G, C> ReconciliationService<M, W, G, C>
where
    M: MappingRepository,
    W: TaskBoard + TeamDirectory,
    G: GitHubGateway,
    C: Clock + Send + Sync,
{
    /// Creates a reconciliation service with the default issue body template.
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

    /// Replaces the issue body template used for exports.
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

    /// Creates a linked task for every open issue without one.
    ///
    /// Tasks are placed by the team's column rules.
    ///
    /// # Errors
    ///
    /// Returns [`super::SyncError::Validation`] when no repository is
    /// connected and [`super::SyncError::Upstream`] when the issue list
    /// cannot be read. Per-issue failures are reported, not returned.
    pub async fn import_unlinked_issues(
        &self,
        team_id: TeamId,
        requester: MemberId,
    ) -> SyncResult<ImportReport> {
        let _guard = self.in_flight.acquire("reconcile", team_id)?;
        let settings = load_settings(self.workspace.as_ref(), team_id).await?;
        let repository = require_repository(&settings, team_id)?;
        let issues = self.github.list_open_issues(&repository).await?;

        let mut report = ImportReport::default();
        for issue in issues {
            let outcome = self
                .import_issue(&settings, team_id, requester, &issue)
                .await;
            report.push(ImportItem {
                issue_number: issue.number,
                title: issue.title,
                outcome,
            });
        }
        info!(
            %team_id, %requester,
            imported = report.imported, skipped = report.skipped, failed = report.failed,
            "imported unlinked issues"
        );
        Ok(report)
    }

    /// Creates a linked issue for every open task without one.
    ///
    /// # Errors
    ///
    /// Returns [`super::SyncError::Validation`] when no repository is
    /// connected and [`super::SyncError::Upstream`] when the task list
    /// cannot be read. Per-task failures are reported, not returned.
    pub async fn export_unlinked_tasks(
        &self,
        team_id: TeamId,
        requester: MemberId,
    ) -> SyncResult<ExportReport> {
        let _guard = self.in_flight.acquire("reconcile", team_id)?;
        let repository = connected_repository(self.workspace.as_ref(), team_id).await?;
        let tasks = self.workspace.list_tasks(team_id).await?;

        let mut report = ExportReport::default();
        for task in tasks.into_iter().filter(|task| !task.is_completed()) {
            let outcome = self.export_task(&repository, &task).await;
            report.push(ExportItem {
                task_id: task.id(),
                title: task.title().to_owned(),
                outcome,
            });
        }
        info!(
            %team_id, %requester,
            exported = report.exported, skipped = report.skipped, failed = report.failed,
            "exported unlinked tasks"
        );
        Ok(report)
    }

    /// Counts open tasks and open issues that have no counterpart.
    ///
    /// Both counts are zero when no repository is connected.
    ///
    /// # Errors
    ///
    /// Returns [`super::SyncError::Upstream`] when either list cannot be
    /// read.
    pub async fn unlinked_counts(
        &self,
        team_id: TeamId,
        requester: MemberId,
    ) -> SyncResult<UnlinkedCounts> {
        let settings = load_settings(self.workspace.as_ref(), team_id).await?;
        let Some(repository) = settings.repository() else {
            return Ok(UnlinkedCounts::default());
        };
        let mappings = self.mappings.list_by_team(team_id).await?;
        let linked_tasks: HashSet<TaskId> = mappings.iter().map(|m| m.task_id()).collect();
        let linked_issues: HashSet<IssueNumber> =
            mappings.iter().map(|m| m.issue_number()).collect();

        let tasks = self.workspace.list_tasks(team_id).await?;
        let issues = self.github.list_open_issues(repository).await?;
        let counts = UnlinkedCounts {
            unlinked_tasks: tasks
                .iter()
                .filter(|task| !task.is_completed() && !linked_tasks.contains(&task.id()))
                .count(),
            unlinked_issues: issues
                .iter()
                .filter(|issue| !linked_issues.contains(&issue.number))
                .count(),
        };
        tracing::debug!(%team_id, %requester, ?counts, "counted unlinked items");
        Ok(counts)
    }

    async fn import_issue(
        &self,
        settings: &TeamGithubSettings,
        team_id: TeamId,
        requester: MemberId,
        issue: &RemoteIssue,
    ) -> ItemOutcome<TaskId> {
        match self.mappings.find_by_issue(team_id, issue.number).await {
            Ok(Some(_)) => return ItemOutcome::Skipped,
            Ok(None) => {}
            Err(err) => return failed(&err),
        }
        let column_id = settings.resolve_column(&issue.title);
        let new_task = match NewBoardTask::new(&issue.title, issue.body.as_deref(), column_id) {
            Ok(new_task) => new_task,
            Err(err) => return failed(&err),
        };
        let task = match self.workspace.create_task(team_id, &new_task, requester).await {
            Ok(task) => task,
            Err(err) => {
                warn!(%team_id, issue_number = %issue.number, error = %err, "task creation failed");
                return failed(&err);
            }
        };
        match self.link(&task, issue).await {
            Ok(()) => ItemOutcome::Linked {
                counterpart: task.id(),
            },
            Err(message) => {
                warn!(%team_id, task_id = %task.id(), issue_number = %issue.number, %message, "created task left unlinked");
                ItemOutcome::Failed { message }
            }
        }
    }

    async fn export_task(
        &self,
        repository: &RepositoryFullName,
        task: &BoardTask,
    ) -> ItemOutcome<IssueNumber> {
        match self.mappings.find_by_task(task.id()).await {
            Ok(Some(_)) => return ItemOutcome::Skipped,
            Ok(None) => {}
            Err(err) => return failed(&err),
        }
        let draft = match self.template.draft_for(task) {
            Ok(draft) => draft,
            Err(err) => return failed(&err),
        };
        let issue = match self.github.create_issue(repository, &draft).await {
            Ok(issue) => issue,
            Err(err) => {
                warn!(task_id = %task.id(), error = %err, "issue creation failed");
                return failed(&err);
            }
        };
        match self.link(task, &issue).await {
            Ok(()) => ItemOutcome::Linked {
                counterpart: issue.number,
            },
            Err(message) => {
                warn!(task_id = %task.id(), issue_number = %issue.number, %message, "created issue left unlinked");
                ItemOutcome::Failed { message }
            }
        }
    }

    async fn link(&self, task: &BoardTask, issue: &RemoteIssue) -> Result<(), String> {
        let mapping =
            link_mapping(&self.template, task, issue, &*self.clock).map_err(|err| err.to_string())?;
        self.mappings
            .store(&mapping)
            .await
            .map_err(|err| err.to_string())?;
        publish_mapping_event(
            self.events.as_ref(),
            &mapping,
            MappingChange::Linked,
            Some(mapping.sync_status()),
            self.clock.utc(),
        );
        Ok(())
    }
}

fn failed<T>(err: &impl std::fmt::Display) -> ItemOutcome<T> {
    ItemOutcome::Failed {
        message: err.to_string(),
    }
}
