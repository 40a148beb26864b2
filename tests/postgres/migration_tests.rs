//! Checks the mapping migration applies and reverts cleanly.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use pg_embedded_setup_unpriv::{TestCluster, test_support::shared_test_cluster};
use rstest::rstest;

use super::cluster::{CleanupGuard, DOWN_SQL, TEMPLATE_DB, UP_SQL, connect, ensure_template};

#[derive(diesel::QueryableByName)]
struct CountRow {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    count: i64,
}

fn count(conn: &mut PgConnection, sql: &str) -> i64 {
    diesel::sql_query(sql)
        .get_result::<CountRow>(conn)
        .map(|row| row.count)
        .unwrap_or(-1)
}

const TABLE_SQL: &str = "SELECT COUNT(*) AS count FROM information_schema.tables \
     WHERE table_name = 'task_issue_mappings'";
const INDEX_SQL: &str = "SELECT COUNT(*) AS count FROM pg_indexes \
     WHERE indexname = 'idx_task_issue_mappings_issue_unique'";

#[rstest]
fn migration_reverts_and_reapplies(shared_test_cluster: &'static TestCluster) {
    ensure_template(shared_test_cluster).expect("template setup");
    let db_name = format!("mapping_migration_{}", uuid::Uuid::new_v4().simple());
    shared_test_cluster
        .create_database_from_template(db_name.as_str(), TEMPLATE_DB)
        .expect("database created");
    let _guard = CleanupGuard::new(shared_test_cluster, db_name.clone());
    let mut conn = connect(shared_test_cluster, &db_name).expect("connection");

    assert_eq!(count(&mut conn, TABLE_SQL), 1);
    assert_eq!(count(&mut conn, INDEX_SQL), 1);

    conn.batch_execute(DOWN_SQL).expect("revert");
    assert_eq!(count(&mut conn, TABLE_SQL), 0);
    assert_eq!(count(&mut conn, INDEX_SQL), 0);

    conn.batch_execute(UP_SQL).expect("reapply");
    assert_eq!(count(&mut conn, TABLE_SQL), 1);
    assert_eq!(count(&mut conn, INDEX_SQL), 1);
}

#[rstest]
fn the_status_column_rejects_unknown_values(shared_test_cluster: &'static TestCluster) {
    ensure_template(shared_test_cluster).expect("template setup");
    let db_name = format!("mapping_check_{}", uuid::Uuid::new_v4().simple());
    shared_test_cluster
        .create_database_from_template(db_name.as_str(), TEMPLATE_DB)
        .expect("database created");
    let _guard = CleanupGuard::new(shared_test_cluster, db_name.clone());
    let mut conn = connect(shared_test_cluster, &db_name).expect("connection");

    let result = conn.batch_execute(
        "INSERT INTO task_issue_mappings (task_id, team_id, issue_number, issue_url, sync_status) \
         VALUES (1, 7, 12, 'https://github.com/acme/board/issues/12', 'STALE')",
    );

    assert!(result.is_err());
}
