//! Team-scoped GitHub configuration parsed from the persisted team record.

use super::{ColumnId, ColumnRuleSet, RepositoryFullName};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw team fields as persisted by the collaboration backend.
///
/// Every field is optional and loosely typed; [`TeamGithubSettings::parse`]
/// turns malformed values into defaults instead of failing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTeamSettings {
    /// Serialised `prefix -> columnId` rules.
    #[serde(default)]
    pub github_column_mappings: Option<String>,
    /// Default destination column, stored as a string or a number.
    #[serde(default)]
    pub github_default_column_id: Option<Value>,
    /// Connected repository URL.
    #[serde(default)]
    pub github_repo_url: Option<String>,
    /// Board columns in display order.
    #[serde(default)]
    pub board_column_ids: Vec<u64>,
}

/// Validated GitHub settings of a team.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TeamGithubSettings {
    repository: Option<RepositoryFullName>,
    column_rules: ColumnRuleSet,
    default_column: Option<ColumnId>,
    board_columns: Vec<ColumnId>,
}

impl TeamGithubSettings {
    /// Parses persisted settings defensively.
    #[must_use]
    pub fn parse(raw: &PersistedTeamSettings) -> Self {
        let repository = raw
            .github_repo_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .and_then(|url| match RepositoryFullName::from_url(url) {
                Ok(repository) => Some(repository),
                Err(error) => {
                    tracing::warn!(%error, "ignoring unusable repository url");
                    None
                }
            });
        let default_column = raw
            .github_default_column_id
            .as_ref()
            .and_then(|value| match value {
                Value::Number(number) => number.as_u64(),
                Value::String(text) => text.trim().parse().ok(),
                _ => None,
            })
            .and_then(|id| ColumnId::new(id).ok());
        let board_columns = raw
            .board_column_ids
            .iter()
            .filter_map(|id| ColumnId::new(*id).ok())
            .collect();

        Self {
            repository,
            column_rules: ColumnRuleSet::from_persisted(raw.github_column_mappings.as_deref()),
            default_column,
            board_columns,
        }
    }

    /// Returns the connected repository, if any.
    #[must_use]
    pub const fn repository(&self) -> Option<&RepositoryFullName> {
        self.repository.as_ref()
    }

    /// Returns the column rules.
    #[must_use]
    pub const fn column_rules(&self) -> &ColumnRuleSet {
        &self.column_rules
    }

    /// Returns the configured default column.
    #[must_use]
    pub const fn default_column(&self) -> Option<ColumnId> {
        self.default_column
    }

    /// Returns the first board column, the last-resort destination.
    #[must_use]
    pub fn first_board_column(&self) -> Option<ColumnId> {
        self.board_columns.first().copied()
    }

    /// Resolves the destination column for an issue title.
    #[must_use]
    pub fn resolve_column(&self, issue_title: &str) -> Option<ColumnId> {
        self.column_rules.resolve_column(
            issue_title,
            self.default_column,
            self.first_board_column(),
        )
    }
}
