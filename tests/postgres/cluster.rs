//! Template and scratch-database helpers around the shared embedded cluster.

use boardsync::sync::adapters::postgres::PostgresMappingRepository;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use pg_embedded_setup_unpriv::TestCluster;
use tokio::runtime::Runtime;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Schema for the mapping table.
pub const UP_SQL: &str =
    include_str!("../../migrations/2026-01-12-000000_create_task_issue_mappings/up.sql");

/// Reverts [`UP_SQL`].
pub const DOWN_SQL: &str =
    include_str!("../../migrations/2026-01-12-000000_create_task_issue_mappings/down.sql");

/// Template database holding the migrated schema.
pub const TEMPLATE_DB: &str = "boardsync_test_template";

/// Builds a current-thread runtime for driving the async repository.
pub fn test_runtime() -> Result<Runtime, BoxError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| Box::new(err) as BoxError)
}

/// Ensures the template database exists with the migration applied.
pub fn ensure_template(cluster: &TestCluster) -> Result<(), BoxError> {
    cluster
        .ensure_template_exists(TEMPLATE_DB, |db_name| {
            let url = cluster.connection().database_url(db_name);
            let mut conn = PgConnection::establish(&url).map_err(|e| eyre::eyre!("{e}"))?;
            conn.batch_execute(UP_SQL)
                .map_err(|e| eyre::eyre!("migration failed: {e}"))?;
            Ok(())
        })
        .map_err(|e| Box::new(e) as BoxError)?;
    Ok(())
}

/// Opens a direct connection to `db_name`.
pub fn connect(cluster: &TestCluster, db_name: &str) -> Result<PgConnection, BoxError> {
    let url = cluster.connection().database_url(db_name);
    PgConnection::establish(&url).map_err(|err| Box::new(err) as BoxError)
}

/// Clones the template into `db_name` and returns a repository over it.
pub fn setup_repository(
    cluster: &TestCluster,
    db_name: &str,
) -> Result<PostgresMappingRepository, BoxError> {
    cluster
        .create_database_from_template(db_name, TEMPLATE_DB)
        .map_err(|e| Box::new(e) as BoxError)?;
    let url = cluster.connection().database_url(db_name);
    let manager = ConnectionManager::<PgConnection>::new(url);
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Box::new(e) as BoxError)?;
    Ok(PostgresMappingRepository::new(pool))
}

/// Drops the scratch database when the test ends, even on panic.
pub struct CleanupGuard<'a> {
    cluster: &'a TestCluster,
    db_name: String,
}

impl<'a> CleanupGuard<'a> {
    pub const fn new(cluster: &'a TestCluster, db_name: String) -> Self {
        Self { cluster, db_name }
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.cluster.drop_database(self.db_name.as_str()) {
            tracing::warn!(db_name = %self.db_name, error = %err, "failed to drop test database");
        }
    }
}
