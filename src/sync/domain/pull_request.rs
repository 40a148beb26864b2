//! Pull request records and mergeability detail.

use super::{BranchName, IssueState, SyncDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Positive pull request number from GitHub.
///
/// # Examples
///
///     use boardsync::sync::domain::PullRequestNumber;
///
///     let pr_num = PullRequestNumber::new(42).expect("valid");
///     assert_eq!(pr_num.value(), 42);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PullRequestNumber(u64);

impl PullRequestNumber {
    /// Creates a validated pull request number.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidPullRequestNumber`] when the value
    /// is zero.
    pub const fn new(value: u64) -> Result<Self, SyncDomainError> {
        if value == 0 {
            return Err(SyncDomainError::InvalidPullRequestNumber(value));
        }
        Ok(Self(value))
    }

    /// Returns the underlying numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PullRequestNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pull request associated with a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestRecord {
    /// Pull request number.
    pub number: PullRequestNumber,
    /// Pull request title.
    pub title: String,
    /// Branch holding the proposed changes.
    pub head_branch: String,
    /// Branch the changes target.
    pub base_branch: String,
    /// Open or closed.
    pub state: IssueState,
    /// Whether the pull request was merged.
    pub merged: bool,
    /// Whether it was discovered through an issue cross-reference rather
    /// than through the task's branch.
    #[serde(default)]
    pub from_github: bool,
    /// Browser URL.
    pub html_url: String,
}

impl PullRequestRecord {
    /// Returns whether the pull request reached its terminal merged state.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.state == IssueState::Closed && self.merged
    }

    /// Returns whether the pull request can still change.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == IssueState::Open
    }
}

/// Validated request for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    head: BranchName,
    base: BranchName,
    title: String,
    body: Option<String>,
}

impl NewPullRequest {
    /// Validates pull request input.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::EmptyHeadBranch`] or
    /// [`SyncDomainError::EmptyTitle`] when required input is blank, and
    /// [`SyncDomainError::InvalidBranchName`] for malformed branch names.
    pub fn new(
        head: &str,
        base: BranchName,
        title: &str,
        body: Option<&str>,
    ) -> Result<Self, SyncDomainError> {
        if head.trim().is_empty() {
            return Err(SyncDomainError::EmptyHeadBranch);
        }
        let normalized_title = title.trim();
        if normalized_title.is_empty() {
            return Err(SyncDomainError::EmptyTitle("pull request"));
        }
        Ok(Self {
            head: BranchName::new(head)?,
            base,
            title: normalized_title.to_owned(),
            body: body
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_owned),
        })
    }

    /// Returns the head branch.
    #[must_use]
    pub const fn head(&self) -> &BranchName {
        &self.head
    }

    /// Returns the base branch.
    #[must_use]
    pub const fn base(&self) -> &BranchName {
        &self.base
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// How a file changed in a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChangeStatus {
    /// Content changed.
    Modified,
    /// File is new.
    Added,
    /// File was deleted.
    Removed,
    /// File moved.
    Renamed,
}

/// File GitHub reports as conflicting between head and base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictFile {
    /// Repository-relative path.
    pub filename: String,
    /// Change kind.
    pub status: FileChangeStatus,
    /// Added lines.
    pub additions: u64,
    /// Deleted lines.
    pub deletions: u64,
}

/// Mergeability detail of a pull request; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrDetail {
    /// The pull request itself.
    pub record: PullRequestRecord,
    /// Commit at the head of the pull request.
    pub head_sha: String,
    /// GitHub's mergeability flag; `None` while GitHub is still computing.
    pub mergeable: Option<bool>,
    /// Whether conflicting files were detected.
    pub has_conflicts: bool,
    /// Conflicting files in GitHub's order.
    pub conflict_files: Vec<ConflictFile>,
}

impl PrDetail {
    /// Returns whether GitHub has finished computing mergeability.
    #[must_use]
    pub const fn mergeability_known(&self) -> bool {
        self.mergeable.is_some()
    }

    /// Returns whether `filename` is listed as conflicting.
    #[must_use]
    pub fn is_conflicting(&self, filename: &str) -> bool {
        self.conflict_files
            .iter()
            .any(|file| file.filename == filename)
    }
}
