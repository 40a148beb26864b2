//! Shared world state for synchronization BDD scenarios.

use std::sync::Arc;

use boardsync::sync::{
    adapters::{
        events::BroadcastEventBus,
        memory::{InMemoryGitHub, InMemoryMappingRepository, InMemoryWorkspace, RecordingDelay},
    },
    domain::{ColumnRuleSet, MemberId, RepositoryFullName, TeamId},
    services::{
        ColumnRuleService, ImportReport, MappingService, MergeOutcome, MergeService,
        ReconciliationService, SyncError, SyncResult,
    },
};
use mockable::DefaultClock;
use rstest::fixture;

/// Repository URL connected to the scenario team.
pub const REPO_URL: &str = "https://github.com/acme/widgets";

/// Mapping service type used by the BDD world.
pub type TestMappingService =
    MappingService<InMemoryMappingRepository, InMemoryWorkspace, InMemoryGitHub, DefaultClock>;

/// Reconciliation service type used by the BDD world.
pub type TestReconciliationService = ReconciliationService<
    InMemoryMappingRepository,
    InMemoryWorkspace,
    InMemoryGitHub,
    DefaultClock,
>;

/// Merge service type used by the BDD world.
pub type TestMergeService =
    MergeService<InMemoryWorkspace, InMemoryGitHub, RecordingDelay, DefaultClock>;

/// Scenario world for synchronization behaviour tests.
pub struct SyncWorld {
    pub team: TeamId,
    pub member: MemberId,
    pub repository: RepositoryFullName,
    pub workspace: Arc<InMemoryWorkspace>,
    pub github: Arc<InMemoryGitHub>,
    pub mappings: Arc<InMemoryMappingRepository>,
    pub delay: Arc<RecordingDelay>,
    pub events: Arc<BroadcastEventBus>,
    pub last_error: Option<SyncError>,
    pub last_rules: Option<SyncResult<ColumnRuleSet>>,
    pub import_reports: Vec<ImportReport>,
    pub merge_outcome: Option<MergeOutcome>,
}

impl SyncWorld {
    /// Creates a world with empty collaborators.
    ///
    /// # Panics
    ///
    /// Panics if the fixed identifiers are rejected.
    #[must_use]
    #[expect(clippy::expect_used, reason = "fixed scenario identifiers are valid")]
    pub fn new() -> Self {
        Self {
            team: TeamId::new(7).expect("valid team id"),
            member: MemberId::new(3).expect("valid member id"),
            repository: RepositoryFullName::from_url(REPO_URL).expect("valid repository"),
            workspace: Arc::new(InMemoryWorkspace::new()),
            github: Arc::new(InMemoryGitHub::new()),
            mappings: Arc::new(InMemoryMappingRepository::new()),
            delay: Arc::new(RecordingDelay::new()),
            events: Arc::new(BroadcastEventBus::default()),
            last_error: None,
            last_rules: None,
            import_reports: Vec::new(),
            merge_outcome: None,
        }
    }

    /// Builds a mapping service over the world's collaborators.
    #[must_use]
    pub fn mapping_service(&self) -> TestMappingService {
        MappingService::new(
            Arc::clone(&self.mappings),
            Arc::clone(&self.workspace),
            Arc::clone(&self.github),
            self.events.clone(),
            Arc::new(DefaultClock),
        )
    }

    /// Builds a reconciliation service over the world's collaborators.
    #[must_use]
    pub fn reconciliation_service(&self) -> TestReconciliationService {
        ReconciliationService::new(
            Arc::clone(&self.mappings),
            Arc::clone(&self.workspace),
            Arc::clone(&self.github),
            self.events.clone(),
            Arc::new(DefaultClock),
        )
    }

    /// Builds a merge service over the world's collaborators.
    #[must_use]
    pub fn merge_service(&self) -> TestMergeService {
        MergeService::new(
            Arc::clone(&self.workspace),
            Arc::clone(&self.github),
            Arc::clone(&self.delay),
            self.events.clone(),
            Arc::new(DefaultClock),
        )
    }

    /// Builds a column rule service over the world's team directory.
    #[must_use]
    pub fn column_rule_service(&self) -> ColumnRuleService<InMemoryWorkspace> {
        ColumnRuleService::new(Arc::clone(&self.workspace))
    }
}

impl Default for SyncWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> SyncWorld {
    SyncWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
