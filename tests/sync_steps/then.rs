//! Then steps for synchronization BDD scenarios.

use super::world::{SyncWorld, run_async};
use boardsync::sync::{
    domain::{ColumnId, SyncStatus, TaskId},
    ports::TaskBoard,
    services::{ImportReport, MergeOutcome, SyncError, TaskCompletion},
};
use eyre::WrapErr;
use rstest_bdd_macros::then;

#[then(r#"task {task_id:u64} is linked with status "{status}""#)]
fn task_linked(world: &SyncWorld, task_id: u64, status: String) -> Result<(), eyre::Report> {
    let id = TaskId::new(task_id).wrap_err("valid task id")?;
    let expected: SyncStatus = status.parse().wrap_err("valid sync status")?;
    let service = world.mapping_service();
    let lookup = run_async(service.get_mapping(id)).wrap_err("look up mapping")?;
    let mapping = lookup
        .mapping()
        .ok_or_else(|| eyre::eyre!("expected task {task_id} to be linked"))?;
    if mapping.sync_status() != expected {
        return Err(eyre::eyre!(
            "expected status {expected}, found {}",
            mapping.sync_status()
        ));
    }
    Ok(())
}

#[then("task {task_id:u64} is not linked")]
fn task_not_linked(world: &SyncWorld, task_id: u64) -> Result<(), eyre::Report> {
    let id = TaskId::new(task_id).wrap_err("valid task id")?;
    let service = world.mapping_service();
    let lookup = run_async(service.get_mapping(id)).wrap_err("look up mapping")?;
    if lookup.mapping().is_some() {
        return Err(eyre::eyre!("expected task {task_id} to be unlinked"));
    }
    Ok(())
}

#[then("the repository has {count:usize} issue")]
fn repository_issue_count(world: &SyncWorld, count: usize) -> Result<(), eyre::Report> {
    let found = world.github.issue_count(&world.repository);
    if found != count {
        return Err(eyre::eyre!("expected {count} issues, found {found}"));
    }
    Ok(())
}

#[then("the request fails with a conflict")]
fn request_conflicts(world: &SyncWorld) -> Result<(), eyre::Report> {
    match &world.last_error {
        Some(SyncError::Conflict(_)) => Ok(()),
        other => Err(eyre::eyre!("expected a conflict error, found {other:?}")),
    }
}

#[then("the rule is rejected as a duplicate")]
fn rule_rejected(world: &SyncWorld) -> Result<(), eyre::Report> {
    match &world.last_rules {
        Some(Err(SyncError::DuplicateRule(_))) => Ok(()),
        other => Err(eyre::eyre!("expected a duplicate rule error, found {other:?}")),
    }
}

#[then("the team has {count:usize} column rule")]
fn team_rule_count(world: &SyncWorld, count: usize) -> Result<(), eyre::Report> {
    let service = world.column_rule_service();
    let rules = run_async(service.rules(world.team)).wrap_err("load column rules")?;
    if rules.len() != count {
        return Err(eyre::eyre!("expected {count} rules, found {}", rules.len()));
    }
    Ok(())
}

#[then(r#"the task titled "{title}" is in column {column_id:u64}"#)]
fn task_in_column(world: &SyncWorld, title: String, column_id: u64) -> Result<(), eyre::Report> {
    let expected = ColumnId::new(column_id).wrap_err("valid column id")?;
    let tasks = run_async(world.workspace.list_tasks(world.team)).wrap_err("list tasks")?;
    let task = tasks
        .iter()
        .find(|task| task.title() == title)
        .ok_or_else(|| eyre::eyre!("no task titled {title}"))?;
    if task.column_id() != Some(expected) {
        return Err(eyre::eyre!(
            "expected column {expected}, found {:?}",
            task.column_id()
        ));
    }
    Ok(())
}

#[then("the first import linked {count:usize} issues")]
fn first_import_linked(world: &SyncWorld, count: usize) -> Result<(), eyre::Report> {
    let report = import_report(world.import_reports.first())?;
    if report.imported != count {
        return Err(eyre::eyre!(
            "expected {count} imported issues, found {}",
            report.imported
        ));
    }
    Ok(())
}

#[then("the last import skipped {count:usize} issues")]
fn last_import_skipped(world: &SyncWorld, count: usize) -> Result<(), eyre::Report> {
    let report = import_report(world.import_reports.last())?;
    if report.skipped != count || report.imported != 0 {
        return Err(eyre::eyre!(
            "expected {count} skipped and none imported, found {} skipped and {} imported",
            report.skipped,
            report.imported
        ));
    }
    Ok(())
}

#[then("the board has {count:usize} tasks")]
fn board_task_count(world: &SyncWorld, count: usize) -> Result<(), eyre::Report> {
    let tasks = run_async(world.workspace.list_tasks(world.team)).wrap_err("list tasks")?;
    if tasks.len() != count {
        return Err(eyre::eyre!("expected {count} tasks, found {}", tasks.len()));
    }
    Ok(())
}

#[then("a retry prompt is offered after {attempts:u32} attempts")]
fn retry_prompt_offered(world: &SyncWorld, attempts: u32) -> Result<(), eyre::Report> {
    let Some(MergeOutcome::RetryPrompt(prompt)) = &world.merge_outcome else {
        return Err(eyre::eyre!(
            "expected a retry prompt, found {:?}",
            world.merge_outcome
        ));
    };
    if prompt.attempts() != attempts {
        return Err(eyre::eyre!(
            "expected {attempts} attempts, found {}",
            prompt.attempts()
        ));
    }
    Ok(())
}

#[then("the merge waited {count:usize} times for {seconds:u64} seconds")]
fn merge_waits(world: &SyncWorld, count: usize, seconds: u64) -> Result<(), eyre::Report> {
    let waits = world.delay.waits();
    let expected = vec![std::time::Duration::from_secs(seconds); count];
    if waits != expected {
        return Err(eyre::eyre!("expected waits {expected:?}, found {waits:?}"));
    }
    Ok(())
}

#[then("the pull request is merged after {attempts:u32} attempts")]
fn pull_request_merged(world: &SyncWorld, attempts: u32) -> Result<(), eyre::Report> {
    match &world.merge_outcome {
        Some(MergeOutcome::Merged { attempts: made, .. }) if *made == attempts => Ok(()),
        other => Err(eyre::eyre!(
            "expected a merge after {attempts} attempts, found {other:?}"
        )),
    }
}

#[then("task {task_id:u64} is completed")]
fn task_completed(world: &SyncWorld, task_id: u64) -> Result<(), eyre::Report> {
    let id = TaskId::new(task_id).wrap_err("valid task id")?;
    let Some(MergeOutcome::Merged {
        task_completion, ..
    }) = &world.merge_outcome
    else {
        return Err(eyre::eyre!("no merge recorded"));
    };
    if *task_completion != TaskCompletion::Completed(id) {
        return Err(eyre::eyre!("expected task completion, found {task_completion:?}"));
    }
    let task = world
        .workspace
        .task(id)
        .ok_or_else(|| eyre::eyre!("task {task_id} missing from the board"))?;
    if !task.is_completed() {
        return Err(eyre::eyre!("task {task_id} is still open"));
    }
    Ok(())
}

fn import_report(report: Option<&ImportReport>) -> Result<&ImportReport, eyre::Report> {
    report.ok_or_else(|| eyre::eyre!("no import recorded in scenario world"))
}
