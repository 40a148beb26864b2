//! Command line entry point for board and GitHub reconciliation.
//!
//! ```text
//! boardsync --config boardsync.toml counts --team 7 --member 3
//! boardsync import --team 7 --member 3
//! boardsync merge --team 7 --pr 12 --task 42 --confirm-retries 1
//! boardsync rules --team 7 add --prefix "[bug]" --column 20
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use boardsync::config::BoardsyncConfig;
use boardsync::sync::{
    adapters::{
        events::BroadcastEventBus,
        http::{BackendClient, GitHubRestGateway, WebhookConfig},
        memory::InMemoryMappingRepository,
        postgres::PostgresMappingRepository,
    },
    domain::{
        ColumnId, ColumnRuleSet, MemberId, MergeMethod, PullRequestNumber, RepositoryFullName,
        TaskId, TeamId,
    },
    ports::{MappingRepository, TokioDelay},
    services::{
        ColumnRuleService, MappingService, MergeOutcome, MergeRequest, MergeService, ReconciliationService,
        TaskCompletion,
    },
};
use clap::{Parser, Subcommand};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use eyre::{Result, WrapErr};
use mockable::DefaultClock;
use serde::Serialize;
use tracing::{info, warn};

/// boardsync - keep board tasks and GitHub issues in step
#[derive(Parser, Debug)]
#[command(name = "boardsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Count open tasks and open issues without a counterpart
    Counts {
        /// Team identifier
        #[arg(long)]
        team: u64,
        /// Member issuing the request
        #[arg(long)]
        member: u64,
    },

    /// Create a linked task for every unlinked open issue
    Import {
        /// Team identifier
        #[arg(long)]
        team: u64,
        /// Member issuing the request
        #[arg(long)]
        member: u64,
    },

    /// Create a linked issue for every unlinked open task
    Export {
        /// Team identifier
        #[arg(long)]
        team: u64,
        /// Member issuing the request
        #[arg(long)]
        member: u64,
    },

    /// Show a task's mapping and refresh its sync status
    Status {
        /// Task identifier
        #[arg(long)]
        task: u64,
    },

    /// Push a task's content to its linked issue
    Sync {
        /// Task identifier
        #[arg(long)]
        task: u64,
        /// Member issuing the request
        #[arg(long)]
        member: u64,
    },

    /// Merge a pull request, completing its task on success
    Merge {
        /// Team identifier
        #[arg(long)]
        team: u64,
        /// Pull request number
        #[arg(long)]
        pr: u64,
        /// Merge strategy (merge, squash, rebase)
        #[arg(long, default_value = "merge")]
        method: MergeMethod,
        /// Task to complete after the merge
        #[arg(long)]
        task: Option<u64>,
        /// Confirmed retries to spend once automatic retries are exhausted
        #[arg(long, default_value = "0")]
        confirm_retries: u32,
    },

    /// List, add or remove a team's column rules
    Rules {
        /// Team identifier
        #[arg(long)]
        team: u64,
        #[command(subcommand)]
        action: RuleAction,
    },

    /// List repositories the backend can connect
    Repos,

    /// Connect a GitHub repository to a team
    Connect {
        /// Team identifier
        #[arg(long)]
        team: u64,
        /// Repository URL, e.g. https://github.com/acme/widgets
        #[arg(long)]
        url: String,
    },

    /// Disconnect a team's repository
    Disconnect {
        /// Team identifier
        #[arg(long)]
        team: u64,
    },

    /// Show the webhook of a team's repository, or install one with --url
    Webhook {
        /// Team identifier
        #[arg(long)]
        team: u64,
        /// Delivery URL to install
        #[arg(long)]
        url: Option<String>,
        /// Subscribed event; repeat for several (default: issues, pull_request)
        #[arg(long = "event", requires = "url")]
        events: Vec<String>,
        /// Install the webhook with deliveries disabled
        #[arg(long, requires = "url")]
        inactive: bool,
    },
}

#[derive(Subcommand, Debug)]
enum RuleAction {
    /// Print the rules in match order
    List,
    /// Append a rule
    Add {
        /// Issue title prefix
        #[arg(long)]
        prefix: String,
        /// Destination column
        #[arg(long)]
        column: u64,
    },
    /// Remove the rule at a zero-based position
    Remove {
        /// Rule position
        #[arg(long)]
        index: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = BoardsyncConfig::load(cli.config.as_deref())?;
    boardsync::telemetry::init_tracing(config.log_directive())
        .wrap_err("failed to install tracing subscriber")?;

    if let Some(url) = config.database.url.as_deref() {
        let pool = Pool::builder()
            .max_size(config.database.max_connections)
            .build(ConnectionManager::<PgConnection>::new(url))
            .wrap_err("failed to connect to the mapping database")?;
        run(&cli, &config, Arc::new(PostgresMappingRepository::new(pool))).await
    } else {
        warn!("no database configured, mappings are kept in memory for this run");
        run(&cli, &config, Arc::new(InMemoryMappingRepository::new())).await
    }
}

async fn run<M>(cli: &Cli, config: &BoardsyncConfig, mappings: Arc<M>) -> Result<()>
where
    M: MappingRepository + 'static,
{
    let backend = Arc::new(BackendClient::new(
        &config.backend.url,
        config.backend_token()?,
        config.http.timeout,
    )?);
    let github = Arc::new(GitHubRestGateway::new(
        &config.github.api_base,
        config.github_token()?,
        config.http.timeout,
    )?);
    let events = Arc::new(BroadcastEventBus::default());
    let clock = Arc::new(DefaultClock);
    let template = config.issue_template()?;

    match cli.command {
        Commands::Counts { team, member } => {
            let service = ReconciliationService::new(mappings, backend, github, events, clock);
            let counts = service
                .unlinked_counts(TeamId::new(team)?, MemberId::new(member)?)
                .await?;
            emit(&counts)
        }
        Commands::Import { team, member } => {
            let service = ReconciliationService::new(mappings, backend, github, events, clock)
                .with_template(template);
            let report = service
                .import_unlinked_issues(TeamId::new(team)?, MemberId::new(member)?)
                .await?;
            emit(&report)
        }
        Commands::Export { team, member } => {
            let service = ReconciliationService::new(mappings, backend, github, events, clock)
                .with_template(template);
            let report = service
                .export_unlinked_tasks(TeamId::new(team)?, MemberId::new(member)?)
                .await?;
            emit(&report)
        }
        Commands::Status { task } => {
            let service = MappingService::new(mappings, backend, github, events, clock)
                .with_template(template);
            let task_id = TaskId::new(task)?;
            let lookup = service.get_mapping(task_id).await?;
            if lookup.is_linked() {
                emit(&service.refresh_status(task_id).await?)
            } else {
                emit(&lookup)
            }
        }
        Commands::Sync { task, member } => {
            let service = MappingService::new(mappings, backend, github, events, clock)
                .with_template(template);
            let mapping = service
                .sync(TaskId::new(task)?, MemberId::new(member)?)
                .await?;
            emit(&mapping)
        }
        Commands::Merge {
            team,
            pr,
            method,
            task,
            confirm_retries,
        } => {
            let service = MergeService::new(backend, github, Arc::new(TokioDelay), events, clock)
                .with_retry_policy(config.merge);
            let mut request =
                MergeRequest::new(TeamId::new(team)?, PullRequestNumber::new(pr)?).with_method(method);
            if let Some(task_id) = task {
                request = request.completing(TaskId::new(task_id)?);
            }
            let mut outcome = service.merge(request).await?;
            let mut remaining = confirm_retries;
            while let MergeOutcome::RetryPrompt(prompt) = outcome {
                if remaining == 0 {
                    return Err(prompt.decline().into());
                }
                remaining -= 1;
                info!(attempts = prompt.attempts(), "confirming merge retry");
                outcome = service.confirm_retry(prompt).await?;
            }
            report_merge(&outcome)
        }
        Commands::Rules { team, ref action } => {
            let service = ColumnRuleService::new(backend);
            let team_id = TeamId::new(team)?;
            let rules = match *action {
                RuleAction::List => service.rules(team_id).await?,
                RuleAction::Add { ref prefix, column } => {
                    service
                        .add_rule(team_id, prefix, ColumnId::new(column)?)
                        .await?
                }
                RuleAction::Remove { index } => {
                    let removed = service.remove_rule(team_id, index).await?;
                    info!(prefix = removed.prefix(), "removed column rule");
                    service.rules(team_id).await?
                }
            };
            emit_rules(&rules)
        }
        Commands::Repos => emit(&backend.list_repositories().await?),
        Commands::Connect { team, ref url } => {
            let repository = RepositoryFullName::from_url(url)?;
            backend
                .connect_repository(TeamId::new(team)?, &repository)
                .await?;
            emit(&repository)
        }
        Commands::Disconnect { team } => {
            backend.disconnect_repository(TeamId::new(team)?).await?;
            Ok(())
        }
        Commands::Webhook {
            team,
            ref url,
            ref events,
            inactive,
        } => {
            let team_id = TeamId::new(team)?;
            match *url {
                Some(ref delivery_url) => {
                    let config =
                        WebhookConfig::new(delivery_url.as_str(), events.clone(), !inactive);
                    let installed = backend.update_webhook_config(team_id, &config).await?;
                    info!(%team_id, url = %installed.url, active = installed.active, "webhook installed");
                    emit(&installed)
                }
                None => emit(&backend.webhook_config(team_id).await?),
            }
        }
    }
}

fn emit_rules(rules: &ColumnRuleSet) -> Result<()> {
    let persisted: serde_json::Value = serde_json::from_str(&rules.to_persisted())?;
    emit(&persisted)
}

fn report_merge(outcome: &MergeOutcome) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    match outcome {
        MergeOutcome::Merged {
            sha,
            attempts,
            task_completion,
        } => {
            writeln!(stdout, "merged {sha} after {attempts} attempt(s)")?;
            match task_completion {
                TaskCompletion::NotRequested => {}
                TaskCompletion::Completed(task_id) => writeln!(stdout, "completed task {task_id}")?,
                TaskCompletion::Failed { task_id, message } => {
                    writeln!(stdout, "task {task_id} left open: {message}")?;
                }
            }
        }
        MergeOutcome::Conflicted { files } => {
            writeln!(stdout, "merge blocked by {} conflicting file(s):", files.len())?;
            for file in files {
                writeln!(stdout, "  {}", file.filename)?;
            }
        }
        MergeOutcome::RetryPrompt(prompt) => {
            writeln!(stdout, "not mergeable yet: {}", prompt.message())?;
        }
    }
    Ok(())
}

fn emit(value: &impl Serialize) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}")?;
    Ok(())
}
