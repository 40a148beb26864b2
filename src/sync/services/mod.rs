//! Application services orchestrating sync ports.

mod column_rules;
mod conflict;
mod error;
mod in_flight;
mod issue_body;
mod mapping;
mod merge;
mod pull_request;
mod reconciliation;
mod settings;

pub use column_rules::ColumnRuleService;
pub use conflict::{ConflictResolutionService, DEFAULT_OPTIMISTIC_WINDOW};
pub use error::{SyncError, SyncResult};
pub use in_flight::{InFlightGuard, InFlightRegistry};
pub use issue_body::{DEFAULT_ISSUE_BODY_TEMPLATE, IssueBodyTemplate};
pub use mapping::MappingService;
pub use merge::{MergeOutcome, MergeRequest, MergeService, RetryPrompt, TaskCompletion};
pub use pull_request::{CreatePullRequestRequest, PullRequestService};
pub use reconciliation::{
    ExportItem, ExportReport, ImportItem, ImportReport, ItemOutcome, ReconciliationService,
    UnlinkedCounts,
};
