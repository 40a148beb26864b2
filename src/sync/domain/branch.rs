//! Branch-name value object and task branch naming.

use super::{SyncDomainError, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for a validated branch name.
const MAX_BRANCH_NAME_LENGTH: usize = 200;

/// Maximum number of title characters carried into a task branch name.
const MAX_TITLE_SLUG_LENGTH: usize = 48;

/// Characters `git check-ref-format` refuses inside a ref name.
const FORBIDDEN_CHARS: [char; 8] = ['~', '^', ':', '?', '*', '[', '\\', '\u{7f}'];

/// Validated Git branch name.
///
/// # Examples
///
///     use boardsync::sync::domain::BranchName;
///
///     let name = BranchName::new("feature/my-branch").expect("valid");
///     assert_eq!(name.as_str(), "feature/my-branch");
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(String);

impl BranchName {
    /// Creates a validated branch name.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidBranchName`] when the value is empty,
    /// exceeds the length limit, or breaks Git ref-name rules.
    pub fn new(value: impl Into<String>) -> Result<Self, SyncDomainError> {
        let raw = value.into();
        let normalized = raw.trim();

        if Self::is_invalid_branch_name(normalized) {
            return Err(SyncDomainError::InvalidBranchName(raw));
        }

        Ok(Self(normalized.to_owned()))
    }

    /// Derives the work branch for a task.
    ///
    /// The name is `task-{id}-{slug}` where the slug is the transliterated,
    /// lowercased title truncated at a word boundary, or just `task-{id}`
    /// when the title has no usable characters. The same task id and title
    /// always produce the same name.
    #[must_use]
    pub fn for_task(task_id: TaskId, title: &str) -> Self {
        let prefix = Self::task_prefix(task_id);
        let slugged = slug::slugify(title);
        let truncated = truncate_slug(&slugged, MAX_TITLE_SLUG_LENGTH);
        if truncated.is_empty() {
            Self(prefix)
        } else {
            Self(format!("{prefix}-{truncated}"))
        }
    }

    /// Returns the prefix shared by every branch created for `task_id`.
    #[must_use]
    pub fn task_prefix(task_id: TaskId) -> String {
        format!("task-{task_id}")
    }

    /// Returns whether this branch was derived for `task_id`.
    #[must_use]
    pub fn belongs_to_task(&self, task_id: TaskId) -> bool {
        let prefix = Self::task_prefix(task_id);
        self.0
            .strip_prefix(prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('-'))
    }

    fn is_invalid_branch_name(name: &str) -> bool {
        let is_empty = name.is_empty();
        let exceeds_length_limit = name.len() > MAX_BRANCH_NAME_LENGTH;
        let has_forbidden_char = name
            .chars()
            .any(|ch| ch.is_whitespace() || ch.is_control() || FORBIDDEN_CHARS.contains(&ch));
        let has_bad_sequence = name.contains("..") || name.contains("//") || name.contains("@{");
        let has_bad_edges = name.starts_with('/')
            || name.ends_with('/')
            || name.starts_with('-')
            || name.ends_with('.')
            || name.ends_with(".lock");

        is_empty || exceeds_length_limit || has_forbidden_char || has_bad_sequence || has_bad_edges
    }

    /// Returns the branch name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn truncate_slug(slugged: &str, limit: usize) -> &str {
    if slugged.len() <= limit {
        return slugged;
    }
    let head = slugged.get(..limit).unwrap_or(slugged);
    head.rfind('-')
        .and_then(|cut| head.get(..cut))
        .filter(|trimmed| !trimmed.is_empty())
        .unwrap_or(head)
}
