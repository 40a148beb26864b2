//! Service tests for the task/issue mapping store and status tracking.

use rstest::rstest;

use super::support::{Harness, harness};
use crate::sync::{
    adapters::memory::FailingOperation,
    domain::{
        IssueNumber, IssueState, MappingChange, PersistedTeamSettings, SyncDomainError,
        SyncEventKind, SyncStatus, TeamId,
    },
    ports::{MappingRepository, RemoteError, TaskBoard},
    services::{IssueBodyTemplate, SyncError},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_from_task_opens_a_synced_issue(harness: Harness) {
    let task = harness.put_task(42, "Fix login", Some("Users cannot sign in"));
    let mut events = harness.events.subscribe();
    let service = harness.mapping_service();

    let mapping = service
        .create_from_task(task, harness.team, harness.member)
        .await
        .expect("issue created");

    assert_eq!(mapping.sync_status(), SyncStatus::Synced);
    assert!(mapping.last_synced_at().is_some());
    let issue = harness
        .github
        .issue(&harness.repository, mapping.issue_number())
        .expect("issue exists");
    assert_eq!(issue.title, "Fix login");
    assert_eq!(issue.body.as_deref(), Some("Users cannot sign in"));
    let event = events.try_recv().expect("mapping event published");
    assert!(matches!(
        event.kind,
        SyncEventKind::MappingChanged {
            change: MappingChange::Linked,
            status: Some(SyncStatus::Synced),
            ..
        }
    ));
    assert!(service.get_mapping(task).await.expect("lookup").is_linked());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn a_linked_task_cannot_create_a_second_issue(harness: Harness) {
    let task = harness.put_task(42, "Fix login", None);
    let service = harness.mapping_service();
    service
        .create_from_task(task, harness.team, harness.member)
        .await
        .expect("first issue");

    let second = service
        .create_from_task(task, harness.team, harness.member)
        .await;

    assert!(matches!(second, Err(SyncError::Conflict(_))));
    assert_eq!(harness.github.issue_count(&harness.repository), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_issue_creation_stores_nothing(harness: Harness) {
    let task = harness.put_task(42, "Fix login", None);
    harness
        .github
        .fail(&harness.repository, FailingOperation::CreateIssue);
    let service = harness.mapping_service();

    let result = service
        .create_from_task(task, harness.team, harness.member)
        .await;

    assert!(matches!(result, Err(SyncError::Upstream(_))));
    assert!(harness
        .mappings
        .find_by_task(task)
        .await
        .expect("lookup")
        .is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn linking_divergent_content_starts_pending(harness: Harness) {
    let task = harness.put_task(42, "Fix login", Some("Local notes"));
    let other_task = harness.put_task(43, "Other", None);
    let issue = harness
        .github
        .add_issue(&harness.repository, "Login broken", Some("Remote notes"))
        .expect("issue added");
    let service = harness.mapping_service();

    let mapping = service
        .link(task, issue, harness.team, harness.member)
        .await
        .expect("linked");
    let duplicate = service
        .link(other_task, issue, harness.team, harness.member)
        .await;

    assert_eq!(mapping.sync_status(), SyncStatus::Pending);
    assert!(mapping.synced_fingerprint().is_none());
    assert!(matches!(duplicate, Err(SyncError::Conflict(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn linking_an_already_mapped_task_conflicts(harness: Harness) {
    let task = harness.put_task(42, "Fix login", None);
    let service = harness.mapping_service();
    let first = service
        .create_from_task(task, harness.team, harness.member)
        .await
        .expect("issue created");
    let other_issue = harness
        .github
        .add_issue(&harness.repository, "Another issue", None)
        .expect("issue added");

    let result = service
        .link(task, other_issue, harness.team, harness.member)
        .await;

    assert!(matches!(result, Err(SyncError::Conflict(_))));
    let stored = harness
        .mappings
        .find_by_task(task)
        .await
        .expect("lookup")
        .expect("mapping kept");
    assert_eq!(stored.issue_number(), first.issue_number());
    assert!(harness
        .mappings
        .find_by_issue(harness.team, other_issue)
        .await
        .expect("lookup")
        .is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn linking_a_task_of_another_team_is_not_found(harness: Harness) {
    let task = harness.put_task(42, "Fix login", None);
    let issue = harness
        .github
        .add_issue(&harness.repository, "Fix login", None)
        .expect("issue added");
    let other_team = TeamId::new(8).expect("valid team id");
    let service = harness.mapping_service();

    let result = service.link(task, issue, other_team, harness.member).await;

    assert!(matches!(result, Err(SyncError::TaskNotFound(id)) if id == task));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn linking_a_missing_issue_is_upstream_not_found(harness: Harness) {
    let task = harness.put_task(42, "Fix login", None);
    let service = harness.mapping_service();

    let result = service
        .link(
            task,
            IssueNumber::new(999).expect("valid issue number"),
            harness.team,
            harness.member,
        )
        .await;

    assert!(matches!(
        result,
        Err(SyncError::Upstream(RemoteError::NotFound(_)))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unlink_removes_the_mapping_once(harness: Harness) {
    let task = harness.put_task(42, "Fix login", None);
    let service = harness.mapping_service();
    let mapping = service
        .create_from_task(task, harness.team, harness.member)
        .await
        .expect("issue created");

    assert!(service.unlink(task).await.expect("unlink"));
    assert!(!service.unlink(task).await.expect("second unlink"));
    assert!(!service.get_mapping(task).await.expect("lookup").is_linked());
    assert!(harness
        .github
        .issue(&harness.repository, mapping.issue_number())
        .is_some());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_sync_persists_error_and_a_later_sync_recovers(harness: Harness) {
    let task = harness.put_task(42, "Fix login", None);
    let service = harness.mapping_service();
    service
        .create_from_task(task, harness.team, harness.member)
        .await
        .expect("issue created");
    harness
        .github
        .fail(&harness.repository, FailingOperation::UpdateIssue);

    let failed = service.sync(task, harness.member).await;
    let stored = harness
        .mappings
        .find_by_task(task)
        .await
        .expect("lookup")
        .expect("mapping kept");

    assert!(matches!(failed, Err(SyncError::Upstream(_))));
    assert_eq!(stored.sync_status(), SyncStatus::Error);

    harness
        .github
        .recover(&harness.repository, FailingOperation::UpdateIssue);
    let recovered = service.sync(task, harness.member).await.expect("sync");
    assert_eq!(recovered.sync_status(), SyncStatus::Synced);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn status_polls_keep_error_until_a_sync_succeeds(harness: Harness) {
    let task = harness.put_task(42, "Fix login", None);
    let service = harness.mapping_service();
    service
        .create_from_task(task, harness.team, harness.member)
        .await
        .expect("issue created");
    harness.put_task(42, "Fix login on Safari", None);
    harness
        .github
        .fail(&harness.repository, FailingOperation::UpdateIssue);
    assert!(service.sync(task, harness.member).await.is_err());

    assert_eq!(service.poll_status(task).await, Some(SyncStatus::Error));
    let refreshed = service.refresh_status(task).await.expect("refresh");
    assert_eq!(refreshed.sync_status(), SyncStatus::Error);

    harness
        .github
        .recover(&harness.repository, FailingOperation::UpdateIssue);
    service.sync(task, harness.member).await.expect("sync");
    assert_eq!(service.poll_status(task).await, Some(SyncStatus::Synced));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sync_pushes_the_local_side(harness: Harness) {
    let task = harness.put_task(42, "Fix login", None);
    let service = harness.mapping_service();
    let mapping = service
        .create_from_task(task, harness.team, harness.member)
        .await
        .expect("issue created");
    harness
        .workspace
        .complete_task(task)
        .await
        .expect("task completed");

    service.sync(task, harness.member).await.expect("sync");

    let issue = harness
        .github
        .issue(&harness.repository, mapping.issue_number())
        .expect("issue exists");
    assert_eq!(issue.state, IssueState::Closed);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn refresh_detects_one_sided_and_divergent_edits(harness: Harness) {
    let task = harness.put_task(42, "Fix login", Some("Body"));
    let service = harness.mapping_service();
    let mapping = service
        .create_from_task(task, harness.team, harness.member)
        .await
        .expect("issue created");

    harness
        .github
        .edit_issue(
            &harness.repository,
            mapping.issue_number(),
            "Fix login (remote)",
            IssueState::Open,
        )
        .expect("issue edited");
    let pending = service.refresh_status(task).await.expect("refresh");
    assert_eq!(pending.sync_status(), SyncStatus::Pending);

    harness.put_task(42, "Fix login", Some("Edited on the board"));
    let conflicted = service.refresh_status(task).await.expect("refresh");
    assert_eq!(conflicted.sync_status(), SyncStatus::Conflict);
    assert_eq!(service.poll_status(task).await, Some(SyncStatus::Conflict));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn polling_an_unlinked_task_yields_nothing(harness: Harness) {
    let task = harness.put_task(42, "Fix login", None);
    assert_eq!(harness.mapping_service().poll_status(task).await, None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn teams_without_a_repository_are_rejected(harness: Harness) {
    let task = harness.put_task(42, "Fix login", None);
    harness
        .workspace
        .put_team(harness.team, PersistedTeamSettings::default());

    let result = harness
        .mapping_service()
        .create_from_task(task, harness.team, harness.member)
        .await;

    assert!(matches!(
        result,
        Err(SyncError::Validation(SyncDomainError::RepositoryNotConnected(7)))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn custom_templates_shape_the_issue_body(harness: Harness) {
    let task = harness.put_task(42, "Fix login", Some("Users cannot sign in"));
    let template = IssueBodyTemplate::new(
        "{{ description }}\n\n_Tracked by board task #{{ task_id }}_",
    )
    .expect("template compiles");
    let service = harness.mapping_service().with_template(template);

    let mapping = service
        .create_from_task(task, harness.team, harness.member)
        .await
        .expect("issue created");

    let issue = harness
        .github
        .issue(&harness.repository, mapping.issue_number())
        .expect("issue exists");
    assert_eq!(
        issue.body.as_deref(),
        Some("Users cannot sign in\n\n_Tracked by board task #42_")
    );
    assert_eq!(mapping.sync_status(), SyncStatus::Synced);
}
