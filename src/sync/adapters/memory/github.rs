//! In-memory stand-in for GitHub.
//!
//! Issues and pull requests share one number sequence per repository, as on
//! GitHub. Failures and merge answers can be scripted for tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use super::poisoned;
use crate::sync::{
    domain::{
        BranchName, IssueDraft, IssueNumber, IssueState, MergeMethod, NewPullRequest, PrDetail,
        PullRequestNumber, PullRequestRecord, RemoteIssue, RepositoryFullName,
    },
    ports::{GitHubGateway, MergeReceipt, RemoteError, RemoteResult},
};

/// Operations whose failure can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailingOperation {
    /// `create_issue`.
    CreateIssue,
    /// `update_issue`.
    UpdateIssue,
    /// `create_branch`.
    CreateBranch,
    /// `pull_request_detail`.
    PullRequestDetail,
    /// `list_open_issues`.
    ListIssues,
}

/// GitHub repositories held in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGitHub {
    state: Arc<RwLock<HashMap<RepositoryFullName, RepoState>>>,
}

#[derive(Debug, Default)]
struct RepoState {
    default_branch: String,
    next_number: u64,
    issues: BTreeMap<u64, RemoteIssue>,
    branches: BTreeMap<String, String>,
    pull_requests: BTreeMap<u64, PrDetail>,
    cross_references: HashMap<u64, Vec<u64>>,
    merge_script: VecDeque<RemoteResult<MergeReceipt>>,
    merge_calls: u32,
    failing: HashSet<FailingOperation>,
}

impl RepoState {
    fn allocate_number(&mut self) -> u64 {
        self.next_number = self.next_number.saturating_add(1);
        self.next_number
    }

    fn check(&self, operation: FailingOperation) -> RemoteResult<()> {
        if self.failing.contains(&operation) {
            return Err(RemoteError::Rejected {
                status: 502,
                message: format!("{operation:?} failed upstream"),
            });
        }
        Ok(())
    }
}

fn missing_repository(repository: &RepositoryFullName) -> RemoteError {
    RemoteError::NotFound(format!("repository {repository} not found"))
}

fn issue_number(value: u64) -> RemoteResult<IssueNumber> {
    IssueNumber::new(value).map_err(|err| RemoteError::Transport(err.to_string()))
}

fn pr_number(value: u64) -> RemoteResult<PullRequestNumber> {
    PullRequestNumber::new(value).map_err(|err| RemoteError::Transport(err.to_string()))
}

fn fake_sha(seed: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(seed.as_bytes());
    digest
        .iter()
        .take(20)
        .fold(String::with_capacity(40), |mut acc, byte| {
            acc.push_str(&format!("{byte:02x}"));
            acc
        })
}

impl InMemoryGitHub {
    /// Creates an empty GitHub with no repositories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_repo<T>(
        &self,
        repository: &RepositoryFullName,
        f: impl FnOnce(&mut RepoState) -> RemoteResult<T>,
    ) -> RemoteResult<T> {
        let mut state = self.state.write().map_err(poisoned)?;
        let repo = state
            .get_mut(repository)
            .ok_or_else(|| missing_repository(repository))?;
        f(repo)
    }

    /// Creates a repository whose default branch is `default_branch`.
    pub fn add_repository(&self, repository: &RepositoryFullName, default_branch: &str) {
        if let Ok(mut state) = self.state.write() {
            let repo = state.entry(repository.clone()).or_default();
            repo.default_branch = default_branch.to_owned();
            repo.branches
                .insert(default_branch.to_owned(), fake_sha(default_branch));
        }
    }

    /// Opens an issue and returns its number.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] for an unknown repository.
    pub fn add_issue(
        &self,
        repository: &RepositoryFullName,
        title: &str,
        body: Option<&str>,
    ) -> RemoteResult<IssueNumber> {
        self.with_repo(repository, |repo| {
            let number = issue_number(repo.allocate_number())?;
            repo.issues.insert(
                number.value(),
                RemoteIssue {
                    number,
                    title: title.to_owned(),
                    body: body.map(str::to_owned),
                    state: IssueState::Open,
                    html_url: format!("https://github.com/{repository}/issues/{number}"),
                    updated_at: Utc::now(),
                },
            );
            Ok(number)
        })
    }

    /// Edits an issue as a GitHub user would.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] for an unknown repository or issue.
    pub fn edit_issue(
        &self,
        repository: &RepositoryFullName,
        number: IssueNumber,
        title: &str,
        state: IssueState,
    ) -> RemoteResult<()> {
        self.with_repo(repository, |repo| {
            let issue = repo
                .issues
                .get_mut(&number.value())
                .ok_or_else(|| RemoteError::NotFound(format!("issue #{number} not found")))?;
            title.clone_into(&mut issue.title);
            issue.state = state;
            issue.updated_at = Utc::now();
            Ok(())
        })
    }

    /// Returns an issue snapshot.
    #[must_use]
    pub fn issue(&self, repository: &RepositoryFullName, number: IssueNumber) -> Option<RemoteIssue> {
        self.with_repo(repository, |repo| Ok(repo.issues.get(&number.value()).cloned()))
            .ok()
            .flatten()
    }

    /// Returns the number of issues in a repository.
    #[must_use]
    pub fn issue_count(&self, repository: &RepositoryFullName) -> usize {
        self.with_repo(repository, |repo| Ok(repo.issues.len()))
            .unwrap_or_default()
    }

    /// Returns whether a branch exists.
    #[must_use]
    pub fn has_branch(&self, repository: &RepositoryFullName, branch: &str) -> bool {
        self.with_repo(repository, |repo| Ok(repo.branches.contains_key(branch)))
            .unwrap_or_default()
    }

    /// Stores or replaces a pull request detail.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] for an unknown repository.
    pub fn put_pull_request(
        &self,
        repository: &RepositoryFullName,
        detail: PrDetail,
    ) -> RemoteResult<()> {
        self.with_repo(repository, |repo| {
            let number = detail.record.number.value();
            repo.next_number = repo.next_number.max(number);
            repo.pull_requests.insert(number, detail);
            Ok(())
        })
    }

    /// Records that `issue` is referenced by pull request `pr`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] for an unknown repository.
    pub fn cross_reference(
        &self,
        repository: &RepositoryFullName,
        issue: IssueNumber,
        pr: PullRequestNumber,
    ) -> RemoteResult<()> {
        self.with_repo(repository, |repo| {
            repo.cross_references
                .entry(issue.value())
                .or_default()
                .push(pr.value());
            Ok(())
        })
    }

    /// Queues answers for upcoming merge calls. Once the queue is empty,
    /// merges succeed.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] for an unknown repository.
    pub fn script_merges(
        &self,
        repository: &RepositoryFullName,
        answers: impl IntoIterator<Item = RemoteResult<MergeReceipt>>,
    ) -> RemoteResult<()> {
        self.with_repo(repository, |repo| {
            repo.merge_script.extend(answers);
            Ok(())
        })
    }

    /// Returns how many merge calls were made.
    #[must_use]
    pub fn merge_calls(&self, repository: &RepositoryFullName) -> u32 {
        self.with_repo(repository, |repo| Ok(repo.merge_calls))
            .unwrap_or_default()
    }

    /// Makes an operation fail until [`Self::recover`] is called.
    pub fn fail(&self, repository: &RepositoryFullName, operation: FailingOperation) {
        let _ignored = self.with_repo(repository, |repo| {
            repo.failing.insert(operation);
            Ok(())
        });
    }

    /// Clears an injected failure.
    pub fn recover(&self, repository: &RepositoryFullName, operation: FailingOperation) {
        let _ignored = self.with_repo(repository, |repo| {
            repo.failing.remove(&operation);
            Ok(())
        });
    }
}

#[async_trait]
impl GitHubGateway for InMemoryGitHub {
    async fn get_issue(
        &self,
        repository: &RepositoryFullName,
        number: IssueNumber,
    ) -> RemoteResult<Option<RemoteIssue>> {
        self.with_repo(repository, |repo| Ok(repo.issues.get(&number.value()).cloned()))
    }

    async fn list_open_issues(
        &self,
        repository: &RepositoryFullName,
    ) -> RemoteResult<Vec<RemoteIssue>> {
        self.with_repo(repository, |repo| {
            repo.check(FailingOperation::ListIssues)?;
            Ok(repo
                .issues
                .values()
                .filter(|issue| issue.state == IssueState::Open)
                .cloned()
                .collect())
        })
    }

    async fn create_issue(
        &self,
        repository: &RepositoryFullName,
        draft: &IssueDraft,
    ) -> RemoteResult<RemoteIssue> {
        self.with_repo(repository, |repo| {
            repo.check(FailingOperation::CreateIssue)?;
            let number = issue_number(repo.allocate_number())?;
            let issue = RemoteIssue {
                number,
                title: draft.title().to_owned(),
                body: draft.body().map(str::to_owned),
                state: draft.state(),
                html_url: format!("https://github.com/{repository}/issues/{number}"),
                updated_at: Utc::now(),
            };
            repo.issues.insert(number.value(), issue.clone());
            Ok(issue)
        })
    }

    async fn update_issue(
        &self,
        repository: &RepositoryFullName,
        number: IssueNumber,
        draft: &IssueDraft,
    ) -> RemoteResult<RemoteIssue> {
        self.with_repo(repository, |repo| {
            repo.check(FailingOperation::UpdateIssue)?;
            let issue = repo
                .issues
                .get_mut(&number.value())
                .ok_or_else(|| RemoteError::NotFound(format!("issue #{number} not found")))?;
            draft.title().clone_into(&mut issue.title);
            issue.body = draft.body().map(str::to_owned);
            issue.state = draft.state();
            issue.updated_at = Utc::now();
            Ok(issue.clone())
        })
    }

    async fn default_branch(&self, repository: &RepositoryFullName) -> RemoteResult<BranchName> {
        self.with_repo(repository, |repo| {
            BranchName::new(repo.default_branch.clone())
                .map_err(|err| RemoteError::Transport(err.to_string()))
        })
    }

    async fn branch_head(
        &self,
        repository: &RepositoryFullName,
        branch: &BranchName,
    ) -> RemoteResult<String> {
        self.with_repo(repository, |repo| {
            repo.branches
                .get(branch.as_str())
                .cloned()
                .ok_or_else(|| RemoteError::NotFound(format!("branch {branch} not found")))
        })
    }

    async fn create_branch(
        &self,
        repository: &RepositoryFullName,
        branch: &BranchName,
        from_sha: &str,
    ) -> RemoteResult<()> {
        self.with_repo(repository, |repo| {
            repo.check(FailingOperation::CreateBranch)?;
            if repo.branches.contains_key(branch.as_str()) {
                return Err(RemoteError::Rejected {
                    status: 422,
                    message: "Reference already exists".to_owned(),
                });
            }
            repo.branches
                .insert(branch.as_str().to_owned(), from_sha.to_owned());
            Ok(())
        })
    }

    async fn create_pull_request(
        &self,
        repository: &RepositoryFullName,
        request: &NewPullRequest,
    ) -> RemoteResult<PullRequestRecord> {
        self.with_repo(repository, |repo| {
            let head_sha = repo
                .branches
                .get(request.head().as_str())
                .cloned()
                .ok_or_else(|| RemoteError::Rejected {
                    status: 422,
                    message: format!("head branch {} does not exist", request.head()),
                })?;
            let number = pr_number(repo.allocate_number())?;
            let record = PullRequestRecord {
                number,
                title: request.title().to_owned(),
                head_branch: request.head().as_str().to_owned(),
                base_branch: request.base().as_str().to_owned(),
                state: IssueState::Open,
                merged: false,
                from_github: false,
                html_url: format!("https://github.com/{repository}/pull/{number}"),
            };
            repo.pull_requests.insert(
                number.value(),
                PrDetail {
                    record: record.clone(),
                    head_sha,
                    mergeable: None,
                    has_conflicts: false,
                    conflict_files: Vec::new(),
                },
            );
            Ok(record)
        })
    }

    async fn list_pull_requests(
        &self,
        repository: &RepositoryFullName,
    ) -> RemoteResult<Vec<PullRequestRecord>> {
        self.with_repo(repository, |repo| {
            Ok(repo
                .pull_requests
                .values()
                .map(|detail| detail.record.clone())
                .collect())
        })
    }

    async fn cross_referenced_pull_requests(
        &self,
        repository: &RepositoryFullName,
        issue: IssueNumber,
    ) -> RemoteResult<Vec<PullRequestRecord>> {
        self.with_repo(repository, |repo| {
            let numbers = repo
                .cross_references
                .get(&issue.value())
                .cloned()
                .unwrap_or_default();
            Ok(numbers
                .iter()
                .filter_map(|number| repo.pull_requests.get(number))
                .map(|detail| detail.record.clone())
                .collect())
        })
    }

    async fn pull_request_detail(
        &self,
        repository: &RepositoryFullName,
        number: PullRequestNumber,
    ) -> RemoteResult<PrDetail> {
        self.with_repo(repository, |repo| {
            repo.check(FailingOperation::PullRequestDetail)?;
            repo.pull_requests
                .get(&number.value())
                .cloned()
                .ok_or_else(|| RemoteError::NotFound(format!("pull request #{number} not found")))
        })
    }

    async fn merge_pull_request(
        &self,
        repository: &RepositoryFullName,
        number: PullRequestNumber,
        method: MergeMethod,
    ) -> RemoteResult<MergeReceipt> {
        self.with_repo(repository, |repo| {
            repo.merge_calls = repo.merge_calls.saturating_add(1);
            if let Some(answer) = repo.merge_script.pop_front() {
                let receipt = answer?;
                mark_merged(repo, number);
                return Ok(receipt);
            }
            let detail = repo
                .pull_requests
                .get(&number.value())
                .ok_or_else(|| RemoteError::NotFound(format!("pull request #{number} not found")))?;
            if detail.has_conflicts {
                return Err(RemoteError::Rejected {
                    status: 409,
                    message: "Merge conflict".to_owned(),
                });
            }
            mark_merged(repo, number);
            Ok(MergeReceipt {
                sha: fake_sha(&format!("{method}:{number}")),
                message: "Pull Request successfully merged".to_owned(),
            })
        })
    }
}

fn mark_merged(repo: &mut RepoState, number: PullRequestNumber) {
    if let Some(detail) = repo.pull_requests.get_mut(&number.value()) {
        detail.record.state = IssueState::Closed;
        detail.record.merged = true;
    }
}
