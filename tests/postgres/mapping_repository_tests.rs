//! Store, lookup and uniqueness behaviour of the `PostgreSQL` mapping store.

use boardsync::sync::{
    adapters::postgres::PostgresMappingRepository,
    domain::{
        ContentFingerprint, IssueNumber, PersistedMappingData, SyncStatus, TaskId,
        TaskIssueMapping, TeamId,
    },
    ports::{MappingRepository, MappingRepositoryError},
};
use chrono::{TimeZone, Utc};
use mockable::DefaultClock;
use pg_embedded_setup_unpriv::{TestCluster, test_support::shared_test_cluster};
use rstest::rstest;
use tokio::runtime::Runtime;

use super::cluster::{CleanupGuard, ensure_template, setup_repository, test_runtime};

fn mapping(task: u64, team: u64, issue: u64) -> TaskIssueMapping {
    let at = Utc
        .with_ymd_and_hms(2026, 1, 12, 9, 0, 0)
        .single()
        .expect("fixed timestamp");
    TaskIssueMapping::from_persisted(PersistedMappingData {
        task_id: TaskId::new(task).expect("valid task id"),
        team_id: TeamId::new(team).expect("valid team id"),
        issue_number: IssueNumber::new(issue).expect("valid issue number"),
        issue_url: format!("https://github.com/acme/board/issues/{issue}"),
        sync_status: SyncStatus::Synced,
        synced_fingerprint: Some(ContentFingerprint::from_persisted("cd".repeat(32))),
        last_synced_at: Some(at),
        created_at: at,
        updated_at: at,
    })
}

/// Repository over a scratch database; the pool closes before the drop.
struct Scratch<'a> {
    repo: PostgresMappingRepository,
    rt: Runtime,
    _guard: CleanupGuard<'a>,
}

fn prepare<'a>(cluster: &'a TestCluster, prefix: &str) -> Scratch<'a> {
    ensure_template(cluster).expect("template setup");
    let db_name = format!("{prefix}_{}", uuid::Uuid::new_v4().simple());
    let guard = CleanupGuard::new(cluster, db_name.clone());
    let repo = setup_repository(cluster, &db_name).expect("repository setup");
    Scratch {
        repo,
        rt: test_runtime().expect("runtime"),
        _guard: guard,
    }
}

#[rstest]
fn stored_mappings_are_found_by_task_and_by_issue(shared_test_cluster: &'static TestCluster) {
    let scratch = prepare(shared_test_cluster, "mapping_store");
    let (repo, rt) = (&scratch.repo, &scratch.rt);
    let stored = mapping(42, 7, 12);

    rt.block_on(repo.store(&stored)).expect("store");

    let by_task = rt
        .block_on(repo.find_by_task(stored.task_id()))
        .expect("find by task")
        .expect("mapping exists");
    assert_eq!(by_task.issue_number(), stored.issue_number());
    assert_eq!(by_task.sync_status(), SyncStatus::Synced);
    assert_eq!(by_task.synced_fingerprint(), stored.synced_fingerprint());
    assert_eq!(by_task.created_at(), stored.created_at());

    let by_issue = rt
        .block_on(repo.find_by_issue(stored.team_id(), stored.issue_number()))
        .expect("find by issue")
        .expect("mapping exists");
    assert_eq!(by_issue.task_id(), stored.task_id());

    let other_team = TeamId::new(8).expect("valid team id");
    assert!(
        rt.block_on(repo.find_by_issue(other_team, stored.issue_number()))
            .expect("find by issue")
            .is_none()
    );
}

#[rstest]
fn a_second_mapping_for_the_same_task_is_rejected(shared_test_cluster: &'static TestCluster) {
    let scratch = prepare(shared_test_cluster, "mapping_dup_task");
    let (repo, rt) = (&scratch.repo, &scratch.rt);
    rt.block_on(repo.store(&mapping(42, 7, 12))).expect("store");

    let err = rt
        .block_on(repo.store(&mapping(42, 7, 13)))
        .expect_err("task already linked");

    assert!(matches!(err, MappingRepositoryError::TaskAlreadyLinked(task) if task.value() == 42));
}

#[rstest]
fn a_second_mapping_for_the_same_issue_is_rejected(shared_test_cluster: &'static TestCluster) {
    let scratch = prepare(shared_test_cluster, "mapping_dup_issue");
    let (repo, rt) = (&scratch.repo, &scratch.rt);
    rt.block_on(repo.store(&mapping(42, 7, 12))).expect("store");

    let err = rt
        .block_on(repo.store(&mapping(43, 7, 12)))
        .expect_err("issue already linked");

    assert!(matches!(
        err,
        MappingRepositoryError::IssueAlreadyLinked { team_id, issue_number }
            if team_id.value() == 7 && issue_number.value() == 12
    ));
    rt.block_on(repo.store(&mapping(43, 8, 12)))
        .expect("the same issue number is free in another team");
}

#[rstest]
fn updates_persist_status_changes(shared_test_cluster: &'static TestCluster) {
    let scratch = prepare(shared_test_cluster, "mapping_update");
    let (repo, rt) = (&scratch.repo, &scratch.rt);
    let mut stored = mapping(42, 7, 12);
    rt.block_on(repo.store(&stored)).expect("store");

    stored.record_failure(&DefaultClock);
    rt.block_on(repo.update(&stored)).expect("update");

    let found = rt
        .block_on(repo.find_by_task(stored.task_id()))
        .expect("find")
        .expect("mapping exists");
    assert_eq!(found.sync_status(), SyncStatus::Error);
    assert!(found.updated_at() > found.created_at());
}

#[rstest]
fn updating_an_unknown_mapping_is_not_found(shared_test_cluster: &'static TestCluster) {
    let scratch = prepare(shared_test_cluster, "mapping_update_missing");
    let (repo, rt) = (&scratch.repo, &scratch.rt);

    let err = rt
        .block_on(repo.update(&mapping(42, 7, 12)))
        .expect_err("no stored mapping");

    assert!(matches!(err, MappingRepositoryError::NotFound(task) if task.value() == 42));
}

#[rstest]
fn removal_returns_the_mapping_and_frees_both_sides(shared_test_cluster: &'static TestCluster) {
    let scratch = prepare(shared_test_cluster, "mapping_remove");
    let (repo, rt) = (&scratch.repo, &scratch.rt);
    let stored = mapping(42, 7, 12);
    rt.block_on(repo.store(&stored)).expect("store");

    let removed = rt
        .block_on(repo.remove(stored.task_id()))
        .expect("remove")
        .expect("mapping existed");
    assert_eq!(removed.issue_number(), stored.issue_number());
    assert!(
        rt.block_on(repo.remove(stored.task_id()))
            .expect("second remove")
            .is_none()
    );

    rt.block_on(repo.store(&mapping(43, 7, 12)))
        .expect("issue is linkable again");
}

#[rstest]
fn team_listings_are_ordered_by_task(shared_test_cluster: &'static TestCluster) {
    let scratch = prepare(shared_test_cluster, "mapping_list");
    let (repo, rt) = (&scratch.repo, &scratch.rt);
    for stored in [mapping(44, 7, 3), mapping(42, 7, 1), mapping(43, 8, 2)] {
        rt.block_on(repo.store(&stored)).expect("store");
    }

    let listed = rt
        .block_on(repo.list_by_team(TeamId::new(7).expect("valid team id")))
        .expect("list");

    let tasks: Vec<u64> = listed.iter().map(|m| m.task_id().value()).collect();
    assert_eq!(tasks, [42, 44]);
}
