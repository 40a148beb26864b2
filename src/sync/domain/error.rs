//! Error types for synchronization domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing domain values or driving the domain
/// state machines.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncDomainError {
    /// A numeric identifier was zero.
    #[error("invalid {kind} identifier {value}, expected a positive integer")]
    InvalidIdentifier {
        /// Identifier kind, for example `task` or `team`.
        kind: &'static str,
        /// Rejected value.
        value: u64,
    },

    /// The repository name does not follow `owner/repo` format.
    #[error("invalid repository name '{0}', expected owner/repo")]
    InvalidRepository(String),

    /// The issue number is invalid.
    #[error("invalid issue number {0}, expected a positive integer")]
    InvalidIssueNumber(u64),

    /// The pull request number is invalid.
    #[error("invalid pull request number {0}, expected a positive integer")]
    InvalidPullRequestNumber(u64),

    /// The branch name is empty or contains characters Git rejects.
    #[error("invalid branch name '{0}'")]
    InvalidBranchName(String),

    /// An issue or pull request title is empty after trimming.
    #[error("{0} title must not be empty")]
    EmptyTitle(&'static str),

    /// The head branch of a pull request is missing.
    #[error("head branch must not be empty")]
    EmptyHeadBranch,

    /// A column rule prefix is empty after trimming.
    #[error("column rule prefix must not be empty")]
    EmptyRulePrefix,

    /// A column rule index does not address an existing rule.
    #[error("column rule index {index} out of range ({len} rules)")]
    RuleIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of rules in the set.
        len: usize,
    },

    /// A resolution option index does not address an existing option.
    #[error("resolution option {index} out of range ({len} options)")]
    OptionIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of available options.
        len: usize,
    },

    /// Applying a resolution requires a selected option.
    #[error("no resolution option selected")]
    NoOptionSelected,

    /// The team has no GitHub repository connected.
    #[error("team {0} has no GitHub repository connected")]
    RepositoryNotConnected(u64),

    /// The task has no issue mapping.
    #[error("task {0} is not linked to an issue")]
    TaskNotLinked(u64),

    /// The pull request is closed and cannot be merged.
    #[error("pull request #{0} is closed")]
    PullRequestClosed(u64),

    /// A state machine was asked to take an edge it does not have.
    #[error("invalid {machine} transition: {from} -> {to}")]
    InvalidTransition {
        /// State machine name.
        machine: &'static str,
        /// Current state.
        from: &'static str,
        /// Requested state.
        to: &'static str,
    },
}

/// Error returned while parsing persisted enumerations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseSyncValueError {
    /// Enumeration being parsed.
    pub kind: &'static str,
    /// Rejected value.
    pub value: String,
}

impl ParseSyncValueError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}
