//! In-memory conflict advisor with scripted analyses.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::poisoned;
use crate::sync::{
    domain::{ApplyRequest, ConflictAnalysis, PullRequestNumber, TeamId},
    ports::{ConflictAdvisor, RemoteError, RemoteResult},
};

type AnalysisKey = (TeamId, PullRequestNumber, String);

/// Conflict advisor answering from prepared analyses.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConflictAdvisor {
    state: Arc<RwLock<AdvisorState>>,
}

#[derive(Debug, Default)]
struct AdvisorState {
    analyses: HashMap<AnalysisKey, ConflictAnalysis>,
    applied: Vec<(PullRequestNumber, ApplyRequest)>,
    apply_failure: Option<String>,
}

impl InMemoryConflictAdvisor {
    /// Creates an advisor without analyses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares the analysis returned for one file of one pull request.
    pub fn prepare(&self, team_id: TeamId, pr_number: PullRequestNumber, analysis: ConflictAnalysis) {
        if let Ok(mut state) = self.state.write() {
            let key = (team_id, pr_number, analysis.filename.clone());
            state.analyses.insert(key, analysis);
        }
    }

    /// Makes every apply call fail with `message`; `None` clears it.
    pub fn fail_apply(&self, message: Option<&str>) {
        if let Ok(mut state) = self.state.write() {
            state.apply_failure = message.map(str::to_owned);
        }
    }

    /// Returns the resolutions pushed so far.
    #[must_use]
    pub fn applied(&self) -> Vec<(PullRequestNumber, ApplyRequest)> {
        self.state
            .read()
            .map(|state| state.applied.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConflictAdvisor for InMemoryConflictAdvisor {
    async fn resolve_conflict(
        &self,
        team_id: TeamId,
        pr_number: PullRequestNumber,
        filename: &str,
    ) -> RemoteResult<ConflictAnalysis> {
        let state = self.state.read().map_err(poisoned)?;
        state
            .analyses
            .get(&(team_id, pr_number, filename.to_owned()))
            .cloned()
            .ok_or_else(|| RemoteError::Rejected {
                status: 422,
                message: format!("no analysis available for {filename}"),
            })
    }

    async fn apply_resolution(
        &self,
        _team_id: TeamId,
        pr_number: PullRequestNumber,
        request: &ApplyRequest,
    ) -> RemoteResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        if let Some(message) = &state.apply_failure {
            return Err(RemoteError::Rejected {
                status: 500,
                message: message.clone(),
            });
        }
        state.applied.push((pr_number, request.clone()));
        Ok(())
    }
}
