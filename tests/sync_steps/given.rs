//! Given steps for synchronization BDD scenarios.

use super::world::{REPO_URL, SyncWorld, run_async};
use boardsync::sync::{
    domain::{
        BoardTask, ColumnId, IssueState, PersistedTeamSettings, PrDetail, PullRequestNumber,
        PullRequestRecord, TaskId,
    },
    ports::RemoteError,
};
use chrono::Utc;
use eyre::WrapErr;
use rstest_bdd_macros::given;

#[given("a team with a connected repository")]
fn team_with_repository(world: &mut SyncWorld) {
    world.workspace.put_team(
        world.team,
        PersistedTeamSettings {
            github_repo_url: Some(REPO_URL.to_owned()),
            board_column_ids: vec![10, 20, 30],
            ..PersistedTeamSettings::default()
        },
    );
    world.github.add_repository(&world.repository, "main");
}

#[given(r#"a board task {task_id:u64} titled "{title}""#)]
fn board_task(world: &mut SyncWorld, task_id: u64, title: String) -> Result<(), eyre::Report> {
    let id = TaskId::new(task_id).wrap_err("valid task id")?;
    world
        .workspace
        .put_task(BoardTask::new(id, world.team, title, Utc::now()));
    Ok(())
}

#[given("an issue was created from task {task_id:u64}")]
fn issue_already_created(world: &mut SyncWorld, task_id: u64) -> Result<(), eyre::Report> {
    let id = TaskId::new(task_id).wrap_err("valid task id")?;
    let service = world.mapping_service();
    run_async(service.create_from_task(id, world.team, world.member))
        .wrap_err("create the first issue")?;
    Ok(())
}

#[given(r#"a column rule "{prefix}" for column {column_id:u64}"#)]
fn column_rule(world: &mut SyncWorld, prefix: String, column_id: u64) -> Result<(), eyre::Report> {
    let column = ColumnId::new(column_id).wrap_err("valid column id")?;
    let service = world.column_rule_service();
    run_async(service.add_rule(world.team, &prefix, column)).wrap_err("add column rule")?;
    Ok(())
}

#[given(r#"an open issue titled "{title}""#)]
fn open_issue(world: &mut SyncWorld, title: String) -> Result<(), eyre::Report> {
    world
        .github
        .add_issue(&world.repository, &title, None)
        .wrap_err("open issue")?;
    Ok(())
}

#[given("an open pull request {pr_number:u64}")]
fn open_pull_request(world: &mut SyncWorld, pr_number: u64) -> Result<(), eyre::Report> {
    let number = PullRequestNumber::new(pr_number).wrap_err("valid pull request number")?;
    let detail = PrDetail {
        record: PullRequestRecord {
            number,
            title: "Fix login".to_owned(),
            head_branch: "task-42-fix-login".to_owned(),
            base_branch: "main".to_owned(),
            state: IssueState::Open,
            merged: false,
            from_github: false,
            html_url: format!("{REPO_URL}/pull/{pr_number}"),
        },
        head_sha: "abc123".to_owned(),
        mergeable: Some(true),
        has_conflicts: false,
        conflict_files: Vec::new(),
    };
    world
        .github
        .put_pull_request(&world.repository, detail)
        .wrap_err("store pull request")?;
    Ok(())
}

#[given("GitHub refuses the next {count:usize} merges as not mergeable")]
fn refused_merges(world: &mut SyncWorld, count: usize) -> Result<(), eyre::Report> {
    let answers = (0..count).map(|_| {
        Err(RemoteError::NotMergeable(
            "Pull Request is not mergeable".to_owned(),
        ))
    });
    world
        .github
        .script_merges(&world.repository, answers)
        .wrap_err("script merge answers")?;
    Ok(())
}
