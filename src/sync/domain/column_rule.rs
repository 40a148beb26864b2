//! Issue-title prefix rules that place imported issues on the board.
//!
//! Rules are ordered and the first matching prefix wins, so a broad prefix
//! listed early shadows a more specific one listed later.

use super::{ColumnId, SyncDomainError};
use serde_json::{Map, Value};
use thiserror::Error;

/// Error returned when a prefix already exists in the rule set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("a column rule for prefix '{prefix}' already exists")]
pub struct DuplicateRuleError {
    /// The rejected prefix as supplied.
    pub prefix: String,
}

/// Maps an issue-title prefix to a destination column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMappingRule {
    prefix: String,
    column_id: ColumnId,
}

impl ColumnMappingRule {
    /// Returns the title prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the destination column.
    #[must_use]
    pub const fn column_id(&self) -> ColumnId {
        self.column_id
    }

    fn matches(&self, title: &str) -> bool {
        let candidate = title.trim_start();
        let mut title_chars = candidate.chars().flat_map(char::to_lowercase);
        self.prefix
            .chars()
            .flat_map(char::to_lowercase)
            .all(|expected| title_chars.next() == Some(expected))
    }

    fn same_prefix(&self, prefix: &str) -> bool {
        self.prefix.to_lowercase() == prefix.to_lowercase()
    }
}

/// Ordered, prefix-unique set of column rules for one team.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnRuleSet {
    rules: Vec<ColumnMappingRule>,
}

impl ColumnRuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub const fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Parses the persisted `prefix -> columnId` object.
    ///
    /// Missing or malformed data yields an empty set. Individual entries
    /// with unusable column ids or duplicate prefixes are skipped.
    #[must_use]
    pub fn from_persisted(raw: Option<&str>) -> Self {
        let Some(text) = raw.map(str::trim).filter(|text| !text.is_empty()) else {
            return Self::new();
        };
        let parsed = match serde_json::from_str::<Map<String, Value>>(text) {
            Ok(object) => object,
            Err(error) => {
                tracing::warn!(%error, "ignoring malformed column mapping rules");
                return Self::new();
            }
        };

        let mut set = Self::new();
        for (prefix, value) in parsed {
            let Some(column_id) = column_id_from_value(&value) else {
                tracing::warn!(%prefix, "ignoring column rule with invalid column id");
                continue;
            };
            if let Err(error) = set.add_rule(&prefix, column_id) {
                tracing::warn!(%error, "ignoring persisted column rule");
            }
        }
        set
    }

    /// Serialises the set as a flat `prefix -> columnId` JSON object in
    /// insertion order.
    #[must_use]
    pub fn to_persisted(&self) -> String {
        let object: Map<String, Value> = self
            .rules
            .iter()
            .map(|rule| (rule.prefix.clone(), Value::from(rule.column_id.value())))
            .collect();
        Value::Object(object).to_string()
    }

    /// Appends a rule.
    ///
    /// # Errors
    ///
    /// Returns [`ColumnRuleError::Duplicate`] when the prefix already exists
    /// (case-insensitively) and [`ColumnRuleError::Invalid`] when it is
    /// blank. The set is unchanged on error.
    pub fn add_rule(&mut self, prefix: &str, column_id: ColumnId) -> Result<(), ColumnRuleError> {
        let normalized = prefix.trim();
        if normalized.is_empty() {
            return Err(SyncDomainError::EmptyRulePrefix.into());
        }
        if self.rules.iter().any(|rule| rule.same_prefix(normalized)) {
            return Err(DuplicateRuleError {
                prefix: prefix.to_owned(),
            }
            .into());
        }
        self.rules.push(ColumnMappingRule {
            prefix: normalized.to_owned(),
            column_id,
        });
        Ok(())
    }

    /// Removes the rule at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::RuleIndexOutOfRange`] when no rule exists
    /// at `index`.
    pub fn remove_rule(&mut self, index: usize) -> Result<ColumnMappingRule, SyncDomainError> {
        if index >= self.rules.len() {
            return Err(SyncDomainError::RuleIndexOutOfRange {
                index,
                len: self.rules.len(),
            });
        }
        Ok(self.rules.remove(index))
    }

    /// Picks the column for an issue title.
    ///
    /// The first rule whose prefix matches wins; otherwise `default_column`,
    /// otherwise `first_board_column`.
    #[must_use]
    pub fn resolve_column(
        &self,
        issue_title: &str,
        default_column: Option<ColumnId>,
        first_board_column: Option<ColumnId>,
    ) -> Option<ColumnId> {
        self.rules
            .iter()
            .find(|rule| rule.matches(issue_title))
            .map(ColumnMappingRule::column_id)
            .or(default_column)
            .or(first_board_column)
    }

    /// Returns the rules in insertion order.
    #[must_use]
    pub fn rules(&self) -> &[ColumnMappingRule] {
        &self.rules
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns whether the set has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Errors raised while editing a rule set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ColumnRuleError {
    /// The prefix already exists.
    #[error(transparent)]
    Duplicate(#[from] DuplicateRuleError),
    /// The rule is invalid.
    #[error(transparent)]
    Invalid(#[from] SyncDomainError),
}

fn column_id_from_value(value: &Value) -> Option<ColumnId> {
    let raw = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    ColumnId::new(raw).ok()
}
