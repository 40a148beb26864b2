//! GitHub issue value objects.

use super::{ContentSnapshot, IssueNumber, SyncDomainError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Open/closed state shared by issues and pull requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    /// Work is outstanding.
    Open,
    /// Work is finished or abandoned.
    Closed,
}

impl IssueState {
    /// Returns the GitHub wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    /// Maps a task completion flag to the issue state.
    #[must_use]
    pub const fn from_completed(completed: bool) -> Self {
        if completed { Self::Closed } else { Self::Open }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue as reported by GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIssue {
    /// Issue number.
    pub number: IssueNumber,
    /// Issue title.
    pub title: String,
    /// Issue body in Markdown.
    pub body: Option<String>,
    /// Current issue state.
    pub state: IssueState,
    /// Browser URL of the issue.
    pub html_url: String,
    /// Last modification time on GitHub.
    pub updated_at: DateTime<Utc>,
}

impl RemoteIssue {
    /// Returns the content compared against the mapped task.
    #[must_use]
    pub fn content(&self) -> ContentSnapshot {
        ContentSnapshot::new(
            &self.title,
            self.body.as_deref(),
            self.state == IssueState::Closed,
        )
    }
}

/// Payload for creating or overwriting an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDraft {
    title: String,
    body: Option<String>,
    state: IssueState,
}

impl IssueDraft {
    /// Creates an issue payload with a required title.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::EmptyTitle`] when the title is blank.
    pub fn new(title: &str) -> Result<Self, SyncDomainError> {
        let normalized = title.trim();
        if normalized.is_empty() {
            return Err(SyncDomainError::EmptyTitle("issue"));
        }
        Ok(Self {
            title: normalized.to_owned(),
            body: None,
            state: IssueState::Open,
        })
    }

    /// Sets the issue body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        let value = body.into();
        let normalized = value.trim();
        self.body = (!normalized.is_empty()).then(|| normalized.to_owned());
        self
    }

    /// Sets the issue state.
    #[must_use]
    pub const fn with_state(mut self, state: IssueState) -> Self {
        self.state = state;
        self
    }

    /// Returns the issue title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the issue body.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Returns the requested issue state.
    #[must_use]
    pub const fn state(&self) -> IssueState {
        self.state
    }

    /// Returns the content this draft will leave on GitHub.
    #[must_use]
    pub fn content(&self) -> ContentSnapshot {
        ContentSnapshot::new(
            &self.title,
            self.body.as_deref(),
            self.state == IssueState::Closed,
        )
    }
}
