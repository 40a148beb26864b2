//! GitHub REST API gateway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

use super::{build_client, ensure_success, into_error, read_json, read_optional_json, transport};
use crate::sync::{
    domain::{
        BranchName, ConflictFile, FileChangeStatus, IssueDraft, IssueNumber, IssueState,
        MergeMethod, NewPullRequest, PrDetail, PullRequestNumber, PullRequestRecord, RemoteIssue,
        RepositoryFullName,
    },
    ports::{GitHubGateway, MergeReceipt, RemoteError, RemoteResult},
};

/// Public GitHub API root.
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

const PAGE_SIZE: usize = 100;

/// [`GitHubGateway`] backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubRestGateway {
    http: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct IssueDto {
    number: IssueNumber,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: IssueState,
    html_url: String,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

impl From<IssueDto> for RemoteIssue {
    fn from(dto: IssueDto) -> Self {
        Self {
            number: dto.number,
            title: dto.title,
            body: dto.body,
            state: dto.state,
            html_url: dto.html_url,
            updated_at: dto.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct IssueBody<'a> {
    title: &'a str,
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<IssueState>,
}

#[derive(Debug, Deserialize)]
struct RepositoryDto {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct GitObjectDto {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitRefDto {
    object: GitObjectDto,
}

#[derive(Debug, Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    reference: String,
    sha: &'a str,
}

#[derive(Debug, Deserialize)]
struct BranchRefDto {
    #[serde(rename = "ref")]
    name: String,
    #[serde(default)]
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestDto {
    number: PullRequestNumber,
    title: String,
    state: IssueState,
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    merged_at: Option<DateTime<Utc>>,
    html_url: String,
    head: BranchRefDto,
    base: BranchRefDto,
    #[serde(default)]
    mergeable: Option<bool>,
    #[serde(default)]
    mergeable_state: Option<String>,
}

impl PullRequestDto {
    fn record(&self, from_github: bool) -> PullRequestRecord {
        PullRequestRecord {
            number: self.number,
            title: self.title.clone(),
            head_branch: self.head.name.clone(),
            base_branch: self.base.name.clone(),
            state: self.state,
            merged: self.merged || self.merged_at.is_some(),
            from_github,
            html_url: self.html_url.clone(),
        }
    }

    fn is_dirty(&self) -> bool {
        self.mergeable == Some(false) && self.mergeable_state.as_deref() == Some("dirty")
    }
}

#[derive(Debug, Serialize)]
struct CreatePullBody<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    body: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PullFileDto {
    filename: String,
    status: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

impl From<PullFileDto> for ConflictFile {
    fn from(dto: PullFileDto) -> Self {
        let status = match dto.status.as_str() {
            "added" => FileChangeStatus::Added,
            "removed" => FileChangeStatus::Removed,
            "renamed" => FileChangeStatus::Renamed,
            _ => FileChangeStatus::Modified,
        };
        Self {
            filename: dto.filename,
            status,
            additions: dto.additions,
            deletions: dto.deletions,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TimelineEventDto {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    source: Option<TimelineSourceDto>,
}

#[derive(Debug, Deserialize)]
struct TimelineSourceDto {
    #[serde(default)]
    issue: Option<TimelineIssueDto>,
}

#[derive(Debug, Deserialize)]
struct TimelineIssueDto {
    number: u64,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct MergeBody {
    merge_method: MergeMethod,
}

#[derive(Debug, Deserialize)]
struct MergeDto {
    sha: String,
    #[serde(default)]
    message: String,
}

fn cross_referenced_numbers(events: Vec<TimelineEventDto>) -> BTreeSet<u64> {
    events
        .into_iter()
        .filter(|event| event.event.as_deref() == Some("cross-referenced"))
        .filter_map(|event| event.source.and_then(|source| source.issue))
        .filter(|issue| issue.pull_request.is_some())
        .map(|issue| issue.number)
        .collect()
}

impl GitHubRestGateway {
    /// Creates a gateway for the API at `api_base` authenticated by `token`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Transport`] when the token cannot be used as a
    /// header or the HTTP client cannot be built.
    pub fn new(api_base: &str, token: &str, timeout: Duration) -> RemoteResult<Self> {
        Ok(Self {
            http: build_client(token, "application/vnd.github+json", timeout)?,
            api_base: api_base.trim_end_matches('/').to_owned(),
        })
    }

    fn repo_url(&self, repository: &RepositoryFullName, path: &str) -> String {
        format!("{}/repos/{repository}{path}", self.api_base)
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &str, url: String) -> RemoteResult<T> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| transport(operation, &err))?;
        read_json(operation, response).await
    }

    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> RemoteResult<Vec<T>> {
        let mut rows = Vec::new();
        let per_page = PAGE_SIZE.to_string();
        let mut page = 1_u32;
        loop {
            let page_value = page.to_string();
            let response = self
                .http
                .get(url)
                .query(query)
                .query(&[("per_page", per_page.as_str()), ("page", page_value.as_str())])
                .send()
                .await
                .map_err(|err| transport(operation, &err))?;
            let chunk: Vec<T> = read_json(operation, response).await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < PAGE_SIZE {
                return Ok(rows);
            }
            page = page.saturating_add(1);
        }
    }

    async fn pull_request(
        &self,
        repository: &RepositoryFullName,
        number: u64,
    ) -> RemoteResult<PullRequestDto> {
        self.get_json(
            "fetch pull request",
            self.repo_url(repository, &format!("/pulls/{number}")),
        )
        .await
    }

    async fn send_issue(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> RemoteResult<RemoteIssue> {
        let response = request
            .send()
            .await
            .map_err(|err| transport(operation, &err))?;
        let dto: IssueDto = read_json(operation, response).await?;
        Ok(dto.into())
    }
}

#[async_trait]
impl GitHubGateway for GitHubRestGateway {
    async fn get_issue(
        &self,
        repository: &RepositoryFullName,
        number: IssueNumber,
    ) -> RemoteResult<Option<RemoteIssue>> {
        const OPERATION: &str = "fetch issue";
        let response = self
            .http
            .get(self.repo_url(repository, &format!("/issues/{number}")))
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        let dto: Option<IssueDto> = read_optional_json(OPERATION, response).await?;
        Ok(dto
            .filter(|issue| issue.pull_request.is_none())
            .map(RemoteIssue::from))
    }

    async fn list_open_issues(
        &self,
        repository: &RepositoryFullName,
    ) -> RemoteResult<Vec<RemoteIssue>> {
        let rows: Vec<IssueDto> = self
            .get_all_pages(
                "list issues",
                &self.repo_url(repository, "/issues"),
                &[("state", "open")],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(RemoteIssue::from)
            .collect())
    }

    async fn create_issue(
        &self,
        repository: &RepositoryFullName,
        draft: &IssueDraft,
    ) -> RemoteResult<RemoteIssue> {
        let request = self
            .http
            .post(self.repo_url(repository, "/issues"))
            .json(&IssueBody {
                title: draft.title(),
                body: draft.body(),
                state: None,
            });
        let created = self.send_issue("create issue", request).await?;
        if draft.state() == IssueState::Open {
            return Ok(created);
        }
        self.update_issue(repository, created.number, draft).await
    }

    async fn update_issue(
        &self,
        repository: &RepositoryFullName,
        number: IssueNumber,
        draft: &IssueDraft,
    ) -> RemoteResult<RemoteIssue> {
        let request = self
            .http
            .patch(self.repo_url(repository, &format!("/issues/{number}")))
            .json(&IssueBody {
                title: draft.title(),
                body: draft.body(),
                state: Some(draft.state()),
            });
        self.send_issue("update issue", request).await
    }

    async fn default_branch(&self, repository: &RepositoryFullName) -> RemoteResult<BranchName> {
        let repo: RepositoryDto = self
            .get_json("fetch repository", self.repo_url(repository, ""))
            .await?;
        BranchName::new(repo.default_branch)
            .map_err(|err| RemoteError::Transport(format!("fetch repository: {err}")))
    }

    async fn branch_head(
        &self,
        repository: &RepositoryFullName,
        branch: &BranchName,
    ) -> RemoteResult<String> {
        let reference: GitRefDto = self
            .get_json(
                "fetch branch",
                self.repo_url(repository, &format!("/git/ref/heads/{branch}")),
            )
            .await?;
        Ok(reference.object.sha)
    }

    async fn create_branch(
        &self,
        repository: &RepositoryFullName,
        branch: &BranchName,
        from_sha: &str,
    ) -> RemoteResult<()> {
        const OPERATION: &str = "create branch";
        let response = self
            .http
            .post(self.repo_url(repository, "/git/refs"))
            .json(&CreateRefBody {
                reference: format!("refs/heads/{branch}"),
                sha: from_sha,
            })
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        ensure_success(OPERATION, response).await?;
        debug!(%repository, %branch, "created branch");
        Ok(())
    }

    async fn create_pull_request(
        &self,
        repository: &RepositoryFullName,
        request: &NewPullRequest,
    ) -> RemoteResult<PullRequestRecord> {
        const OPERATION: &str = "create pull request";
        let response = self
            .http
            .post(self.repo_url(repository, "/pulls"))
            .json(&CreatePullBody {
                title: request.title(),
                head: request.head().as_str(),
                base: request.base().as_str(),
                body: request.body(),
            })
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        let dto: PullRequestDto = read_json(OPERATION, response).await?;
        Ok(dto.record(false))
    }

    async fn list_pull_requests(
        &self,
        repository: &RepositoryFullName,
    ) -> RemoteResult<Vec<PullRequestRecord>> {
        let rows: Vec<PullRequestDto> = self
            .get_all_pages(
                "list pull requests",
                &self.repo_url(repository, "/pulls"),
                &[("state", "all")],
            )
            .await?;
        Ok(rows.iter().map(|dto| dto.record(false)).collect())
    }

    async fn cross_referenced_pull_requests(
        &self,
        repository: &RepositoryFullName,
        issue: IssueNumber,
    ) -> RemoteResult<Vec<PullRequestRecord>> {
        let events: Vec<TimelineEventDto> = self
            .get_all_pages(
                "list issue timeline",
                &self.repo_url(repository, &format!("/issues/{issue}/timeline")),
                &[],
            )
            .await?;
        let mut records = Vec::new();
        for number in cross_referenced_numbers(events) {
            match self.pull_request(repository, number).await {
                Ok(dto) => records.push(dto.record(true)),
                // Cross-references may point at pull requests in other repositories.
                Err(RemoteError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(records)
    }

    async fn pull_request_detail(
        &self,
        repository: &RepositoryFullName,
        number: PullRequestNumber,
    ) -> RemoteResult<PrDetail> {
        let dto = self.pull_request(repository, number.value()).await?;
        let conflict_files = if dto.is_dirty() {
            let files: Vec<PullFileDto> = self
                .get_all_pages(
                    "list pull request files",
                    &self.repo_url(repository, &format!("/pulls/{number}/files")),
                    &[],
                )
                .await?;
            files.into_iter().map(ConflictFile::from).collect()
        } else {
            Vec::new()
        };
        Ok(PrDetail {
            record: dto.record(false),
            head_sha: dto.head.sha.clone(),
            mergeable: dto.mergeable,
            has_conflicts: dto.is_dirty(),
            conflict_files,
        })
    }

    async fn merge_pull_request(
        &self,
        repository: &RepositoryFullName,
        number: PullRequestNumber,
        method: MergeMethod,
    ) -> RemoteResult<MergeReceipt> {
        const OPERATION: &str = "merge pull request";
        let response = self
            .http
            .put(self.repo_url(repository, &format!("/pulls/{number}/merge")))
            .json(&MergeBody {
                merge_method: method,
            })
            .send()
            .await
            .map_err(|err| transport(OPERATION, &err))?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            return Err(classify_merge_refusal(into_error(OPERATION, response).await));
        }
        let merged: MergeDto = read_json(OPERATION, response).await?;
        Ok(MergeReceipt {
            sha: merged.sha,
            message: merged.message,
        })
    }
}

/// Separates the transient "not mergeable yet" 405 from permanent refusals.
///
/// GitHub also answers 405 for branch protection and disallowed merge
/// methods; those keep their raw message and are never retried.
fn classify_merge_refusal(error: RemoteError) -> RemoteError {
    match error {
        RemoteError::Rejected { status: 405, message }
            if message.to_ascii_lowercase().contains("not mergeable") =>
        {
            RemoteError::NotMergeable(message)
        }
        other => other,
    }
}
