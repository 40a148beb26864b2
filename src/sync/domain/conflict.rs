//! AI-assisted conflict resolution state machine.

use super::{PullRequestNumber, SyncDomainError, TeamId};
use serde::{Deserialize, Serialize};

/// One candidate resolution for a conflicting file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionOption {
    /// Short label.
    pub title: String,
    /// Explanation of the approach.
    pub description: String,
    /// Full replacement content for the file.
    pub code: String,
}

/// Analysis of a conflicting file with ordered resolution options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictAnalysis {
    /// Conflicting file.
    pub filename: String,
    /// Head commit the options were computed against.
    pub head_sha: String,
    /// Free-text analysis of the conflict.
    pub analysis: String,
    /// Candidate resolutions in suggested order.
    pub options: Vec<ResolutionOption>,
}

/// Resolution lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionState {
    /// Nothing requested yet.
    Idle,
    /// Waiting for the advisor's analysis.
    Analyzing,
    /// Options are available; one may be selected.
    OptionsReady {
        /// The advisor's analysis.
        analysis: ConflictAnalysis,
        /// Index of the chosen option.
        selected: Option<usize>,
    },
    /// The chosen option is being pushed.
    Applying {
        /// The advisor's analysis.
        analysis: ConflictAnalysis,
        /// Index of the option being applied.
        selected: usize,
    },
    /// The chosen option was pushed.
    Applied {
        /// Index of the applied option.
        selected: usize,
    },
    /// Analysis or application failed.
    Failed {
        /// User-facing error message.
        message: String,
        /// Analysis kept from before an apply failure, for retrying.
        analysis: Option<ConflictAnalysis>,
        /// Selection kept from before an apply failure.
        selected: Option<usize>,
    },
}

impl ResolutionState {
    /// Returns the state name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::OptionsReady { .. } => "options_ready",
            Self::Applying { .. } => "applying",
            Self::Applied { .. } => "applied",
            Self::Failed { .. } => "failed",
        }
    }

    /// Returns whether a remote call is outstanding.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::Analyzing | Self::Applying { .. })
    }
}

/// Payload handed to the advisor when applying a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRequest {
    /// Conflicting file.
    pub filename: String,
    /// Replacement content.
    pub code: String,
    /// Head commit the code was computed against.
    pub head_sha: String,
}

/// Resolution of one conflicting file in one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictResolutionSession {
    team_id: TeamId,
    pr_number: PullRequestNumber,
    filename: String,
    state: ResolutionState,
}

impl ConflictResolutionSession {
    /// Opens an idle session for `filename`.
    #[must_use]
    pub fn new(team_id: TeamId, pr_number: PullRequestNumber, filename: impl Into<String>) -> Self {
        Self {
            team_id,
            pr_number,
            filename: filename.into(),
            state: ResolutionState::Idle,
        }
    }

    /// Returns the team.
    #[must_use]
    pub const fn team_id(&self) -> TeamId {
        self.team_id
    }

    /// Returns the pull request.
    #[must_use]
    pub const fn pr_number(&self) -> PullRequestNumber {
        self.pr_number
    }

    /// Returns the conflicting file.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> &ResolutionState {
        &self.state
    }

    /// Returns the analysis when one is held.
    #[must_use]
    pub const fn analysis(&self) -> Option<&ConflictAnalysis> {
        match &self.state {
            ResolutionState::OptionsReady { analysis, .. }
            | ResolutionState::Applying { analysis, .. }
            | ResolutionState::Failed {
                analysis: Some(analysis),
                ..
            } => Some(analysis),
            _ => None,
        }
    }

    /// Returns the selected option index.
    #[must_use]
    pub const fn selected(&self) -> Option<usize> {
        match &self.state {
            ResolutionState::OptionsReady { selected, .. }
            | ResolutionState::Failed { selected, .. } => *selected,
            ResolutionState::Applying { selected, .. }
            | ResolutionState::Applied { selected } => Some(*selected),
            _ => None,
        }
    }

    /// Enters `Analyzing`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidTransition`] while another call is
    /// outstanding or after the resolution was applied.
    pub fn begin_analysis(&mut self) -> Result<(), SyncDomainError> {
        match self.state {
            ResolutionState::Idle
            | ResolutionState::OptionsReady { .. }
            | ResolutionState::Failed { .. } => {
                self.state = ResolutionState::Analyzing;
                Ok(())
            }
            _ => Err(self.invalid("analyzing")),
        }
    }

    /// Leaves `Analyzing` with the advisor's options.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidTransition`] outside `Analyzing`.
    pub fn options_ready(&mut self, analysis: ConflictAnalysis) -> Result<(), SyncDomainError> {
        if !matches!(self.state, ResolutionState::Analyzing) {
            return Err(self.invalid("options_ready"));
        }
        self.state = ResolutionState::OptionsReady {
            analysis,
            selected: None,
        };
        Ok(())
    }

    /// Selects an option. Local only.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::OptionIndexOutOfRange`] for an unknown
    /// option and [`SyncDomainError::InvalidTransition`] when no options are
    /// held.
    pub fn select_option(&mut self, index: usize) -> Result<(), SyncDomainError> {
        let transition_error = self.invalid("options_ready");
        match &mut self.state {
            ResolutionState::OptionsReady { analysis, selected }
            | ResolutionState::Failed {
                analysis: Some(analysis),
                selected,
                ..
            } => {
                let len = analysis.options.len();
                if index >= len {
                    return Err(SyncDomainError::OptionIndexOutOfRange { index, len });
                }
                *selected = Some(index);
                Ok(())
            }
            _ => Err(transition_error),
        }
    }

    /// Enters `Applying` and returns what must be sent to the advisor.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::NoOptionSelected`] without a selection and
    /// [`SyncDomainError::InvalidTransition`] when no analysis is held.
    pub fn begin_apply(&mut self) -> Result<ApplyRequest, SyncDomainError> {
        let transition_error = self.invalid("applying");
        let current = std::mem::replace(&mut self.state, ResolutionState::Idle);
        let (analysis, selected) = match current {
            ResolutionState::OptionsReady { analysis, selected }
            | ResolutionState::Failed {
                analysis: Some(analysis),
                selected,
                ..
            } => (analysis, selected),
            other => {
                self.state = other;
                return Err(transition_error);
            }
        };
        let Some(index) = selected else {
            self.state = ResolutionState::OptionsReady {
                analysis,
                selected: None,
            };
            return Err(SyncDomainError::NoOptionSelected);
        };
        let Some(option) = analysis.options.get(index) else {
            let len = analysis.options.len();
            self.state = ResolutionState::OptionsReady {
                analysis,
                selected: None,
            };
            return Err(SyncDomainError::OptionIndexOutOfRange { index, len });
        };
        let request = ApplyRequest {
            filename: self.filename.clone(),
            code: option.code.clone(),
            head_sha: analysis.head_sha.clone(),
        };
        self.state = ResolutionState::Applying {
            analysis,
            selected: index,
        };
        Ok(request)
    }

    /// Leaves `Applying` successfully.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidTransition`] outside `Applying`.
    pub fn applied(&mut self) -> Result<(), SyncDomainError> {
        let ResolutionState::Applying { selected, .. } = self.state else {
            return Err(self.invalid("applied"));
        };
        self.state = ResolutionState::Applied { selected };
        Ok(())
    }

    /// Records a failed analysis or application.
    ///
    /// An apply failure keeps the analysis and selection so the user can
    /// retry without a new analysis.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidTransition`] when no call is
    /// outstanding.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), SyncDomainError> {
        let transition_error = self.invalid("failed");
        let current = std::mem::replace(&mut self.state, ResolutionState::Idle);
        let (analysis, selected) = match current {
            ResolutionState::Analyzing => (None, None),
            ResolutionState::Applying { analysis, selected } => (Some(analysis), Some(selected)),
            other => {
                self.state = other;
                return Err(transition_error);
            }
        };
        self.state = ResolutionState::Failed {
            message: message.into(),
            analysis,
            selected,
        };
        Ok(())
    }

    const fn invalid(&self, to: &'static str) -> SyncDomainError {
        SyncDomainError::InvalidTransition {
            machine: "conflict resolution",
            from: self.state.name(),
            to,
        }
    }
}
