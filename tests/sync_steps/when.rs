//! When steps for synchronization BDD scenarios.

use super::world::{SyncWorld, run_async};
use boardsync::sync::{
    domain::{ColumnId, PullRequestNumber, TaskId},
    services::{MergeOutcome, MergeRequest},
};
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when("an issue is created from task {task_id:u64}")]
fn create_issue(world: &mut SyncWorld, task_id: u64) -> Result<(), eyre::Report> {
    let id = TaskId::new(task_id).wrap_err("valid task id")?;
    let service = world.mapping_service();
    world.last_error = run_async(service.create_from_task(id, world.team, world.member)).err();
    Ok(())
}

#[when("task {task_id:u64} is unlinked")]
fn unlink_task(world: &mut SyncWorld, task_id: u64) -> Result<(), eyre::Report> {
    let id = TaskId::new(task_id).wrap_err("valid task id")?;
    let service = world.mapping_service();
    let removed = run_async(service.unlink(id)).wrap_err("unlink task")?;
    if !removed {
        return Err(eyre::eyre!("expected task {task_id} to have a mapping"));
    }
    Ok(())
}

#[when(r#"a column rule "{prefix}" for column {column_id:u64} is added"#)]
fn add_column_rule(world: &mut SyncWorld, prefix: String, column_id: u64) -> Result<(), eyre::Report> {
    let column = ColumnId::new(column_id).wrap_err("valid column id")?;
    let service = world.column_rule_service();
    world.last_rules = Some(run_async(service.add_rule(world.team, &prefix, column)));
    Ok(())
}

#[when("unlinked issues are imported")]
fn import_issues(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    let service = world.reconciliation_service();
    let report = run_async(service.import_unlinked_issues(world.team, world.member))
        .wrap_err("import unlinked issues")?;
    world.import_reports.push(report);
    Ok(())
}

#[when("pull request {pr_number:u64} is merged")]
fn merge_pull_request(world: &mut SyncWorld, pr_number: u64) -> Result<(), eyre::Report> {
    let number = PullRequestNumber::new(pr_number).wrap_err("valid pull request number")?;
    run_merge(world, MergeRequest::new(world.team, number))
}

#[when("pull request {pr_number:u64} is merged for task {task_id:u64}")]
fn merge_pull_request_for_task(
    world: &mut SyncWorld,
    pr_number: u64,
    task_id: u64,
) -> Result<(), eyre::Report> {
    let number = PullRequestNumber::new(pr_number).wrap_err("valid pull request number")?;
    let task = TaskId::new(task_id).wrap_err("valid task id")?;
    run_merge(world, MergeRequest::new(world.team, number).completing(task))
}

#[when("the retry is confirmed")]
fn confirm_retry(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    let Some(MergeOutcome::RetryPrompt(prompt)) = world.merge_outcome.take() else {
        return Err(eyre::eyre!("no retry prompt to confirm"));
    };
    let service = world.merge_service();
    let outcome = run_async(service.confirm_retry(prompt)).wrap_err("confirm retry")?;
    world.merge_outcome = Some(outcome);
    Ok(())
}

fn run_merge(world: &mut SyncWorld, request: MergeRequest) -> Result<(), eyre::Report> {
    let service = world.merge_service();
    let outcome = run_async(service.merge(request)).wrap_err("merge pull request")?;
    world.merge_outcome = Some(outcome);
    Ok(())
}
