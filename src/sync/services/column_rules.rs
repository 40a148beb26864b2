//! Team column rules persisted on the team record.

use std::sync::Arc;
use tracing::info;

use super::{InFlightRegistry, SyncResult, settings::load_settings};
use crate::sync::{
    domain::{ColumnId, ColumnMappingRule, ColumnRuleSet, TeamId},
    ports::TeamDirectory,
};

/// Reads and edits a team's `prefix -> column` rules.
#[derive(Clone)]
pub struct ColumnRuleService<D>
where
    D: TeamDirectory,
{
    directory: Arc<D>,
    in_flight: InFlightRegistry,
}

impl<D> ColumnRuleService<D>
where
    D: TeamDirectory,
{
    /// Creates a column rule service.
    #[must_use]
    pub fn new(directory: Arc<D>) -> Self {
        Self {
            directory,
            in_flight: InFlightRegistry::new(),
        }
    }

    /// Shares an in-flight registry with other services.
    #[must_use]
    pub fn with_in_flight(mut self, registry: InFlightRegistry) -> Self {
        self.in_flight = registry;
        self
    }

    /// Returns the team's rules.
    ///
    /// # Errors
    ///
    /// Returns [`super::SyncError::Upstream`] when the team cannot be read.
    pub async fn rules(&self, team_id: TeamId) -> SyncResult<ColumnRuleSet> {
        let settings = load_settings(self.directory.as_ref(), team_id).await?;
        Ok(settings.column_rules().clone())
    }

    /// Appends a rule and persists the set.
    ///
    /// The stored rules are left untouched when the prefix duplicates an
    /// existing one.
    ///
    /// # Errors
    ///
    /// Returns [`super::SyncError::DuplicateRule`] for a case-insensitive
    /// duplicate prefix and [`super::SyncError::Validation`] for a blank
    /// one.
    pub async fn add_rule(
        &self,
        team_id: TeamId,
        prefix: &str,
        column_id: ColumnId,
    ) -> SyncResult<ColumnRuleSet> {
        let _guard = self.in_flight.acquire("column_rules", team_id)?;
        let mut rules = self.rules(team_id).await?;
        rules.add_rule(prefix, column_id)?;
        self.directory
            .save_column_mappings(team_id, &rules.to_persisted())
            .await?;
        info!(%team_id, prefix = prefix.trim(), %column_id, "added column rule");
        Ok(rules)
    }

    /// Removes the rule at `index` and persists the set.
    ///
    /// # Errors
    ///
    /// Returns [`super::SyncError::Validation`] when `index` is out of range.
    pub async fn remove_rule(&self, team_id: TeamId, index: usize) -> SyncResult<ColumnMappingRule> {
        let _guard = self.in_flight.acquire("column_rules", team_id)?;
        let mut rules = self.rules(team_id).await?;
        let removed = rules.remove_rule(index)?;
        self.directory
            .save_column_mappings(team_id, &rules.to_persisted())
            .await?;
        info!(%team_id, prefix = removed.prefix(), "removed column rule");
        Ok(removed)
    }

    /// Resolves the destination column for an issue title.
    ///
    /// # Errors
    ///
    /// Returns [`super::SyncError::Upstream`] when the team cannot be read.
    pub async fn resolve_column(&self, team_id: TeamId, issue_title: &str) -> SyncResult<Option<ColumnId>> {
        let settings = load_settings(self.directory.as_ref(), team_id).await?;
        Ok(settings.resolve_column(issue_title))
    }
}
