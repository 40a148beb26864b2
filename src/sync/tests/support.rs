//! Shared fixtures for synchronization unit tests.

use std::sync::Arc;

use chrono::Utc;
use mockable::DefaultClock;
use rstest::fixture;

use crate::sync::{
    adapters::{
        events::BroadcastEventBus,
        memory::{
            InMemoryConflictAdvisor, InMemoryGitHub, InMemoryMappingRepository,
            InMemoryWorkspace, RecordingDelay,
        },
    },
    domain::{BoardTask, MemberId, PersistedTeamSettings, RepositoryFullName, TaskId, TeamId},
    services::{
        ConflictResolutionService, MappingService, MergeService, PullRequestService,
        ReconciliationService,
    },
};

pub(super) const REPO_URL: &str = "https://github.com/acme/widgets";

pub(super) type TestMappingService =
    MappingService<InMemoryMappingRepository, InMemoryWorkspace, InMemoryGitHub, DefaultClock>;
pub(super) type TestReconciliationService = ReconciliationService<
    InMemoryMappingRepository,
    InMemoryWorkspace,
    InMemoryGitHub,
    DefaultClock,
>;
pub(super) type TestPullRequestService =
    PullRequestService<InMemoryMappingRepository, InMemoryWorkspace, InMemoryGitHub, RecordingDelay>;
pub(super) type TestMergeService =
    MergeService<InMemoryWorkspace, InMemoryGitHub, RecordingDelay, DefaultClock>;
pub(super) type TestConflictService = ConflictResolutionService<
    InMemoryWorkspace,
    InMemoryGitHub,
    InMemoryConflictAdvisor,
    DefaultClock,
>;

/// One team with a connected repository and in-memory collaborators.
pub(super) struct Harness {
    pub(super) team: TeamId,
    pub(super) member: MemberId,
    pub(super) repository: RepositoryFullName,
    pub(super) workspace: Arc<InMemoryWorkspace>,
    pub(super) github: Arc<InMemoryGitHub>,
    pub(super) mappings: Arc<InMemoryMappingRepository>,
    pub(super) advisor: Arc<InMemoryConflictAdvisor>,
    pub(super) delay: Arc<RecordingDelay>,
    pub(super) events: Arc<BroadcastEventBus>,
}

impl Harness {
    pub(super) fn new() -> Self {
        let team = TeamId::new(7).expect("valid team id");
        let repository = RepositoryFullName::from_url(REPO_URL).expect("valid repository");
        let workspace = Arc::new(InMemoryWorkspace::new());
        workspace.put_team(
            team,
            PersistedTeamSettings {
                github_repo_url: Some(REPO_URL.to_owned()),
                board_column_ids: vec![10, 20, 30],
                ..PersistedTeamSettings::default()
            },
        );
        let github = Arc::new(InMemoryGitHub::new());
        github.add_repository(&repository, "main");
        Self {
            team,
            member: MemberId::new(3).expect("valid member id"),
            repository,
            workspace,
            github,
            mappings: Arc::new(InMemoryMappingRepository::new()),
            advisor: Arc::new(InMemoryConflictAdvisor::new()),
            delay: Arc::new(RecordingDelay::new()),
            events: Arc::new(BroadcastEventBus::default()),
        }
    }

    pub(super) fn put_task(&self, id: u64, title: &str, description: Option<&str>) -> TaskId {
        let task_id = TaskId::new(id).expect("valid task id");
        let mut task = BoardTask::new(task_id, self.team, title, Utc::now());
        if let Some(text) = description {
            task = task.with_description(text);
        }
        self.workspace.put_task(task);
        task_id
    }

    pub(super) fn mapping_service(&self) -> TestMappingService {
        MappingService::new(
            Arc::clone(&self.mappings),
            Arc::clone(&self.workspace),
            Arc::clone(&self.github),
            self.events.clone(),
            Arc::new(DefaultClock),
        )
    }

    pub(super) fn reconciliation_service(&self) -> TestReconciliationService {
        ReconciliationService::new(
            Arc::clone(&self.mappings),
            Arc::clone(&self.workspace),
            Arc::clone(&self.github),
            self.events.clone(),
            Arc::new(DefaultClock),
        )
    }

    pub(super) fn pull_request_service(&self) -> TestPullRequestService {
        PullRequestService::new(
            Arc::clone(&self.mappings),
            Arc::clone(&self.workspace),
            Arc::clone(&self.github),
            Arc::clone(&self.delay),
        )
    }

    pub(super) fn merge_service(&self) -> TestMergeService {
        MergeService::new(
            Arc::clone(&self.workspace),
            Arc::clone(&self.github),
            Arc::clone(&self.delay),
            self.events.clone(),
            Arc::new(DefaultClock),
        )
    }

    pub(super) fn conflict_service(&self) -> TestConflictService {
        ConflictResolutionService::new(
            Arc::clone(&self.workspace),
            Arc::clone(&self.github),
            Arc::clone(&self.advisor),
            Arc::new(DefaultClock),
        )
    }
}

#[fixture]
pub(super) fn harness() -> Harness {
    Harness::new()
}
