//! REST client for the collaboration backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{build_client, ensure_success, read_json, read_optional_json, transport};
use crate::sync::{
    domain::{
        ApplyRequest, BoardTask, ColumnId, ConflictAnalysis, MemberId, NewBoardTask,
        PersistedTeamSettings, PullRequestNumber, RepositoryFullName, TaskId, TeamId,
    },
    ports::{ConflictAdvisor, RemoteError, RemoteResult, TaskBoard, TeamDirectory},
};

/// Client for the backend's task, team and conflict-resolution endpoints.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskDto {
    id: TaskId,
    team_id: TeamId,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    column_id: Option<ColumnId>,
    #[serde(default)]
    completed: bool,
    updated_at: DateTime<Utc>,
}

impl From<TaskDto> for BoardTask {
    fn from(dto: TaskDto) -> Self {
        let mut task = Self::new(dto.id, dto.team_id, dto.title, dto.updated_at);
        if let Some(description) = dto.description {
            task = task.with_description(description);
        }
        if let Some(column_id) = dto.column_id {
            task = task.with_column(column_id);
        }
        if dto.completed {
            task = task.completed();
        }
        task
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskBody<'a> {
    title: &'a str,
    description: Option<&'a str>,
    column_id: Option<ColumnId>,
    requester_id: MemberId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ColumnMappingsBody<'a> {
    github_column_mappings: &'a str,
}

#[derive(Debug, Serialize)]
struct ResolveConflictBody<'a> {
    filename: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyResolutionBody<'a> {
    filename: &'a str,
    code: &'a str,
    head_sha: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectRepositoryBody<'a> {
    repo_url: &'a str,
}

/// Repository visible to the authenticated GitHub user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySummary {
    /// `owner/name`.
    pub full_name: String,
    /// Whether the repository is private.
    #[serde(default)]
    pub private: bool,
    /// Browser URL.
    pub html_url: String,
}

/// Webhook settings of a team's connected repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    /// Delivery URL.
    pub url: String,
    /// Subscribed GitHub events.
    #[serde(default)]
    pub events: Vec<String>,
    /// Whether a signing secret is configured.
    #[serde(default)]
    pub secret_configured: bool,
    /// Whether deliveries are enabled.
    #[serde(default)]
    pub active: bool,
}

/// Events subscribed when an install names none.
pub const DEFAULT_WEBHOOK_EVENTS: [&str; 2] = ["issues", "pull_request"];

impl WebhookConfig {
    /// Describes a webhook to install at `url`.
    ///
    /// An empty `events` list subscribes to [`DEFAULT_WEBHOOK_EVENTS`]. The
    /// secret flag is owned by the backend and starts unset.
    #[must_use]
    pub fn new(url: impl Into<String>, events: Vec<String>, active: bool) -> Self {
        let subscribed = if events.is_empty() {
            DEFAULT_WEBHOOK_EVENTS.iter().map(|&event| event.to_owned()).collect()
        } else {
            events
        };
        Self {
            url: url.into(),
            events: subscribed,
            secret_configured: false,
            active,
        }
    }
}

impl BackendClient {
    /// Creates a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Transport`] when the token cannot be used as a
    /// header or the HTTP client cannot be built.
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> RemoteResult<Self> {
        Ok(Self {
            http: build_client(token, "application/json", timeout)?,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{path}", self.base_url)
    }

    /// Lists repositories the backend's GitHub credentials can access.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteError`] for transport failures and non-2xx answers.
    pub async fn list_repositories(&self) -> RemoteResult<Vec<RepositorySummary>> {
        const OPERATION: &str = "list repositories";
        let response = self
            .http
            .get(self.url("/github/repositories"))
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        read_json(OPERATION, response).await
    }

    /// Connects a repository to a team.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteError`] for transport failures and non-2xx answers.
    pub async fn connect_repository(
        &self,
        team_id: TeamId,
        repository: &RepositoryFullName,
    ) -> RemoteResult<()> {
        const OPERATION: &str = "connect repository";
        let repo_url = format!("https://github.com/{repository}");
        let response = self
            .http
            .post(self.url(&format!("/teams/{team_id}/github/repository")))
            .json(&ConnectRepositoryBody {
                repo_url: &repo_url,
            })
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        ensure_success(OPERATION, response).await?;
        debug!(%team_id, %repository, "connected repository");
        Ok(())
    }

    /// Disconnects the team's repository.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteError`] for transport failures and non-2xx answers.
    pub async fn disconnect_repository(&self, team_id: TeamId) -> RemoteResult<()> {
        const OPERATION: &str = "disconnect repository";
        let response = self
            .http
            .delete(self.url(&format!("/teams/{team_id}/github/repository")))
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        ensure_success(OPERATION, response).await?;
        Ok(())
    }

    /// Reads the webhook configuration of the team's repository.
    ///
    /// Returns `None` when no webhook is installed.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteError`] for transport failures and non-2xx answers.
    pub async fn webhook_config(&self, team_id: TeamId) -> RemoteResult<Option<WebhookConfig>> {
        const OPERATION: &str = "read webhook config";
        let response = self
            .http
            .get(self.url(&format!("/teams/{team_id}/github/webhook")))
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        read_optional_json(OPERATION, response).await
    }

    /// Installs or replaces the webhook of the team's repository.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteError`] for transport failures and non-2xx answers.
    pub async fn update_webhook_config(
        &self,
        team_id: TeamId,
        config: &WebhookConfig,
    ) -> RemoteResult<WebhookConfig> {
        const OPERATION: &str = "update webhook config";
        let response = self
            .http
            .put(self.url(&format!("/teams/{team_id}/github/webhook")))
            .json(config)
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        read_json(OPERATION, response).await
    }
}

#[async_trait]
impl TaskBoard for BackendClient {
    async fn find_task(&self, task_id: TaskId) -> RemoteResult<Option<BoardTask>> {
        const OPERATION: &str = "fetch task";
        let response = self
            .http
            .get(self.url(&format!("/tasks/{task_id}")))
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        let dto: Option<TaskDto> = read_optional_json(OPERATION, response).await?;
        Ok(dto.map(BoardTask::from))
    }

    async fn list_tasks(&self, team_id: TeamId) -> RemoteResult<Vec<BoardTask>> {
        const OPERATION: &str = "list tasks";
        let response = self
            .http
            .get(self.url(&format!("/teams/{team_id}/tasks")))
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        let dtos: Vec<TaskDto> = read_json(OPERATION, response).await?;
        Ok(dtos.into_iter().map(BoardTask::from).collect())
    }

    async fn create_task(
        &self,
        team_id: TeamId,
        task: &NewBoardTask,
        requester: MemberId,
    ) -> RemoteResult<BoardTask> {
        const OPERATION: &str = "create task";
        let response = self
            .http
            .post(self.url(&format!("/teams/{team_id}/tasks")))
            .json(&CreateTaskBody {
                title: &task.title,
                description: task.description.as_deref(),
                column_id: task.column_id,
                requester_id: requester,
            })
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        let dto: TaskDto = read_json(OPERATION, response).await?;
        Ok(dto.into())
    }

    async fn complete_task(&self, task_id: TaskId) -> RemoteResult<()> {
        const OPERATION: &str = "complete task";
        let response = self
            .http
            .post(self.url(&format!("/tasks/{task_id}/complete")))
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        ensure_success(OPERATION, response).await?;
        Ok(())
    }
}

#[async_trait]
impl TeamDirectory for BackendClient {
    async fn team_settings(&self, team_id: TeamId) -> RemoteResult<PersistedTeamSettings> {
        const OPERATION: &str = "fetch team";
        let response = self
            .http
            .get(self.url(&format!("/teams/{team_id}")))
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        read_json(OPERATION, response).await
    }

    async fn save_column_mappings(&self, team_id: TeamId, serialized: &str) -> RemoteResult<()> {
        const OPERATION: &str = "save column mappings";
        let response = self
            .http
            .put(self.url(&format!("/teams/{team_id}/github/column-mappings")))
            .json(&ColumnMappingsBody {
                github_column_mappings: serialized,
            })
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        ensure_success(OPERATION, response).await?;
        Ok(())
    }
}

#[async_trait]
impl ConflictAdvisor for BackendClient {
    async fn resolve_conflict(
        &self,
        team_id: TeamId,
        pr_number: PullRequestNumber,
        filename: &str,
    ) -> RemoteResult<ConflictAnalysis> {
        const OPERATION: &str = "resolve conflict";
        let response = self
            .http
            .post(self.url(&format!(
                "/teams/{team_id}/pull-requests/{pr_number}/resolve-conflict"
            )))
            .json(&ResolveConflictBody { filename })
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        let analysis: ConflictAnalysis = read_json(OPERATION, response).await?;
        if analysis.options.is_empty() {
            return Err(RemoteError::Rejected {
                status: 422,
                message: format!("no resolution options returned for {filename}"),
            });
        }
        Ok(analysis)
    }

    async fn apply_resolution(
        &self,
        team_id: TeamId,
        pr_number: PullRequestNumber,
        request: &ApplyRequest,
    ) -> RemoteResult<()> {
        const OPERATION: &str = "apply resolution";
        let response = self
            .http
            .post(self.url(&format!(
                "/teams/{team_id}/pull-requests/{pr_number}/apply-resolution"
            )))
            .json(&ApplyResolutionBody {
                filename: &request.filename,
                code: &request.code,
                head_sha: &request.head_sha,
            })
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        ensure_success(OPERATION, response).await?;
        Ok(())
    }
}
