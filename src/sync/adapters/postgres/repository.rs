//! `PostgreSQL` repository implementation for task/issue mappings.

use super::{
    models::{MappingRow, MappingStatusChangeset, NewMappingRow},
    schema::task_issue_mappings,
};
use crate::sync::{
    domain::{
        ContentFingerprint, IssueNumber, PersistedMappingData, SyncStatus, TaskId,
        TaskIssueMapping, TeamId,
    },
    ports::{MappingRepository, MappingRepositoryError, MappingRepositoryResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by the mapping adapter.
pub type MappingPgPool = Pool<ConnectionManager<PgConnection>>;

const ISSUE_UNIQUE_CONSTRAINT: &str = "idx_task_issue_mappings_issue_unique";

/// `PostgreSQL`-backed mapping repository.
#[derive(Debug, Clone)]
pub struct PostgresMappingRepository {
    pool: MappingPgPool,
}

impl PostgresMappingRepository {
    /// Creates a repository from a connection pool.
    #[must_use]
    pub const fn new(pool: MappingPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> MappingRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> MappingRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(MappingRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(MappingRepositoryError::persistence)?
    }
}

#[async_trait]
impl MappingRepository for PostgresMappingRepository {
    async fn store(&self, mapping: &TaskIssueMapping) -> MappingRepositoryResult<()> {
        let task_id = mapping.task_id();
        let team_id = mapping.team_id();
        let issue_number = mapping.issue_number();
        let new_row = to_new_row(mapping)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(task_issue_mappings::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                        if is_issue_unique_violation(info.as_ref()) =>
                    {
                        MappingRepositoryError::IssueAlreadyLinked {
                            team_id,
                            issue_number,
                        }
                    }
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        MappingRepositoryError::TaskAlreadyLinked(task_id)
                    }
                    _ => MappingRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update(&self, mapping: &TaskIssueMapping) -> MappingRepositoryResult<()> {
        let task_id = mapping.task_id();
        let key = to_column(task_id.value())?;
        let changeset = MappingStatusChangeset {
            sync_status: mapping.sync_status().as_str().to_owned(),
            synced_fingerprint: mapping
                .synced_fingerprint()
                .map(|fingerprint| fingerprint.as_str().to_owned()),
            last_synced_at: mapping.last_synced_at(),
            updated_at: mapping.updated_at(),
        };

        self.run_blocking(move |connection| {
            let updated = diesel::update(task_issue_mappings::table.find(key))
                .set(&changeset)
                .execute(connection)
                .map_err(MappingRepositoryError::persistence)?;
            if updated == 0 {
                return Err(MappingRepositoryError::NotFound(task_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_task(&self, task_id: TaskId) -> MappingRepositoryResult<Option<TaskIssueMapping>> {
        let key = to_column(task_id.value())?;
        self.run_blocking(move |connection| {
            let row = task_issue_mappings::table
                .find(key)
                .select(MappingRow::as_select())
                .first::<MappingRow>(connection)
                .optional()
                .map_err(MappingRepositoryError::persistence)?;
            row.map(row_to_mapping).transpose()
        })
        .await
    }

    async fn find_by_issue(
        &self,
        team_id: TeamId,
        issue_number: IssueNumber,
    ) -> MappingRepositoryResult<Option<TaskIssueMapping>> {
        let team = to_column(team_id.value())?;
        let issue = to_column(issue_number.value())?;
        self.run_blocking(move |connection| {
            let row = task_issue_mappings::table
                .filter(task_issue_mappings::team_id.eq(team))
                .filter(task_issue_mappings::issue_number.eq(issue))
                .select(MappingRow::as_select())
                .first::<MappingRow>(connection)
                .optional()
                .map_err(MappingRepositoryError::persistence)?;
            row.map(row_to_mapping).transpose()
        })
        .await
    }

    async fn list_by_team(&self, team_id: TeamId) -> MappingRepositoryResult<Vec<TaskIssueMapping>> {
        let team = to_column(team_id.value())?;
        self.run_blocking(move |connection| {
            let rows = task_issue_mappings::table
                .filter(task_issue_mappings::team_id.eq(team))
                .order(task_issue_mappings::task_id.asc())
                .select(MappingRow::as_select())
                .load::<MappingRow>(connection)
                .map_err(MappingRepositoryError::persistence)?;
            rows.into_iter().map(row_to_mapping).collect()
        })
        .await
    }

    async fn remove(&self, task_id: TaskId) -> MappingRepositoryResult<Option<TaskIssueMapping>> {
        let key = to_column(task_id.value())?;
        self.run_blocking(move |connection| {
            let row = diesel::delete(task_issue_mappings::table.find(key))
                .returning(MappingRow::as_returning())
                .get_result::<MappingRow>(connection)
                .optional()
                .map_err(MappingRepositoryError::persistence)?;
            row.map(row_to_mapping).transpose()
        })
        .await
    }
}

fn to_column(value: u64) -> MappingRepositoryResult<i64> {
    i64::try_from(value).map_err(MappingRepositoryError::persistence)
}

fn from_column(value: i64) -> MappingRepositoryResult<u64> {
    u64::try_from(value).map_err(MappingRepositoryError::persistence)
}

pub(super) fn to_new_row(mapping: &TaskIssueMapping) -> MappingRepositoryResult<NewMappingRow> {
    Ok(NewMappingRow {
        task_id: to_column(mapping.task_id().value())?,
        team_id: to_column(mapping.team_id().value())?,
        issue_number: to_column(mapping.issue_number().value())?,
        issue_url: mapping.issue_url().to_owned(),
        sync_status: mapping.sync_status().as_str().to_owned(),
        synced_fingerprint: mapping
            .synced_fingerprint()
            .map(|fingerprint| fingerprint.as_str().to_owned()),
        last_synced_at: mapping.last_synced_at(),
        created_at: mapping.created_at(),
        updated_at: mapping.updated_at(),
    })
}

pub(super) fn row_to_mapping(row: MappingRow) -> MappingRepositoryResult<TaskIssueMapping> {
    let MappingRow {
        task_id,
        team_id,
        issue_number,
        issue_url,
        sync_status,
        synced_fingerprint,
        last_synced_at,
        created_at,
        updated_at,
    } = row;

    let data = PersistedMappingData {
        task_id: TaskId::new(from_column(task_id)?).map_err(MappingRepositoryError::persistence)?,
        team_id: TeamId::new(from_column(team_id)?).map_err(MappingRepositoryError::persistence)?,
        issue_number: IssueNumber::new(from_column(issue_number)?)
            .map_err(MappingRepositoryError::persistence)?,
        issue_url,
        sync_status: sync_status
            .parse::<SyncStatus>()
            .map_err(MappingRepositoryError::persistence)?,
        synced_fingerprint: synced_fingerprint.map(ContentFingerprint::from_persisted),
        last_synced_at,
        created_at,
        updated_at,
    };
    Ok(TaskIssueMapping::from_persisted(data))
}

fn is_issue_unique_violation(info: &dyn DatabaseErrorInformation) -> bool {
    info.constraint_name()
        .is_some_and(|name| name == ISSUE_UNIQUE_CONSTRAINT)
}
