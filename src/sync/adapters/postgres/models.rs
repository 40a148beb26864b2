//! Diesel row models for task/issue mappings.

use super::schema::task_issue_mappings;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = task_issue_mappings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MappingRow {
    /// Board task identifier.
    pub task_id: i64,
    /// Owning team.
    pub team_id: i64,
    /// GitHub issue number.
    pub issue_number: i64,
    /// Browser URL of the issue.
    pub issue_url: String,
    /// Sync status.
    pub sync_status: String,
    /// Fingerprint recorded at the last successful sync.
    pub synced_fingerprint: Option<String>,
    /// Time of the last successful sync.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_issue_mappings)]
pub struct NewMappingRow {
    /// Board task identifier.
    pub task_id: i64,
    /// Owning team.
    pub team_id: i64,
    /// GitHub issue number.
    pub issue_number: i64,
    /// Browser URL of the issue.
    pub issue_url: String,
    /// Sync status.
    pub sync_status: String,
    /// Fingerprint recorded at the last successful sync.
    pub synced_fingerprint: Option<String>,
    /// Time of the last successful sync.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Changeset applied when a mapping's status moves.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = task_issue_mappings)]
#[diesel(treat_none_as_null = true)]
pub struct MappingStatusChangeset {
    /// Sync status.
    pub sync_status: String,
    /// Fingerprint recorded at the last successful sync.
    pub synced_fingerprint: Option<String>,
    /// Time of the last successful sync.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
