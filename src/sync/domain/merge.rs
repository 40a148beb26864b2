//! Merge execution state machine and retry policies.

use super::{ParseSyncValueError, SyncDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// GitHub merge strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// Merge commit.
    #[default]
    Merge,
    /// Squash into a single commit.
    Squash,
    /// Rebase onto the base branch.
    Rebase,
}

impl MergeMethod {
    /// Returns the GitHub wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Squash => "squash",
            Self::Rebase => "rebase",
        }
    }
}

impl FromStr for MergeMethod {
    type Err = ParseSyncValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "squash" => Ok(Self::Squash),
            "rebase" => Ok(Self::Rebase),
            _ => Err(ParseSyncValueError::new("merge method", value)),
        }
    }
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of a merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergePhase {
    /// Nothing attempted.
    Ready,
    /// Fetching mergeability.
    Checking,
    /// GitHub reports the pull request mergeable.
    Mergeable,
    /// Conflicting files were detected.
    Conflicted,
    /// GitHub has not decided yet.
    Unknown,
    /// The merge call is outstanding.
    Merging,
    /// Automatic retries are exhausted; waiting for the user.
    AwaitingConfirmation,
    /// The pull request was merged.
    Merged,
    /// The merge failed terminally.
    Failed,
}

impl MergePhase {
    /// Returns the phase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Checking => "checking",
            Self::Mergeable => "mergeable",
            Self::Conflicted => "conflicted",
            Self::Unknown => "unknown",
            Self::Merging => "merging",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Merged => "merged",
            Self::Failed => "failed",
        }
    }

    const fn allows(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Ready, Self::Checking)
                | (
                    Self::Checking,
                    Self::Mergeable | Self::Conflicted | Self::Unknown | Self::Failed
                )
                | (Self::Mergeable | Self::Unknown, Self::Merging)
                | (
                    Self::Merging,
                    Self::Merged | Self::Failed | Self::Merging | Self::AwaitingConfirmation
                )
                | (Self::AwaitingConfirmation, Self::Merging | Self::Failed)
        )
    }
}

/// Progress of one merge through [`MergePhase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeProgress {
    phase: MergePhase,
    attempts: u32,
}

impl Default for MergeProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeProgress {
    /// Starts in [`MergePhase::Ready`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: MergePhase::Ready,
            attempts: 0,
        }
    }

    /// Resumes a merge that is waiting for the user after `attempts` tries.
    #[must_use]
    pub const fn awaiting_confirmation(attempts: u32) -> Self {
        Self {
            phase: MergePhase::AwaitingConfirmation,
            attempts,
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> MergePhase {
        self.phase
    }

    /// Returns the number of merge calls made so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Moves to `next`, counting entries into [`MergePhase::Merging`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidTransition`] for edges the machine
    /// does not have.
    pub fn advance(&mut self, next: MergePhase) -> Result<(), SyncDomainError> {
        if !self.phase.allows(next) {
            return Err(SyncDomainError::InvalidTransition {
                machine: "merge",
                from: self.phase.as_str(),
                to: next.as_str(),
            });
        }
        if next == MergePhase::Merging {
            self.attempts = self.attempts.saturating_add(1);
        }
        self.phase = next;
        Ok(())
    }
}

/// Retry policy for GitHub's transient "not mergeable" answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeRetryPolicy {
    /// Automatic retries after the first attempt.
    pub automatic_retries: u32,
    /// Fixed delay between automatic attempts.
    #[serde(with = "duration_secs")]
    pub automatic_delay: Duration,
    /// Delay before each user-confirmed retry.
    #[serde(with = "duration_secs")]
    pub confirmed_delay: Duration,
}

impl Default for MergeRetryPolicy {
    fn default() -> Self {
        Self {
            automatic_retries: 2,
            automatic_delay: Duration::from_secs(3),
            confirmed_delay: Duration::from_secs(5),
        }
    }
}

/// Bounded exponential backoff used while GitHub computes mergeability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// First delay.
    #[serde(with = "duration_secs")]
    pub initial_interval: Duration,
    /// Upper bound for a single delay.
    #[serde(with = "duration_secs")]
    pub max_interval: Duration,
    /// Total time after which polling gives up.
    #[serde(with = "duration_secs")]
    pub max_duration: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(8),
            max_duration: Duration::from_secs(30),
        }
    }
}

impl PollPolicy {
    /// Returns the delays to wait between polls, in order.
    ///
    /// Delays double from the initial interval, are capped at the maximum
    /// interval, and the last one is shortened so the total never exceeds
    /// the maximum duration.
    #[must_use]
    pub fn schedule(&self) -> Vec<Duration> {
        let mut delays = Vec::new();
        let mut elapsed = Duration::ZERO;
        let mut next = self.initial_interval.min(self.max_interval);
        while elapsed < self.max_duration && !next.is_zero() {
            let remaining = self.max_duration.saturating_sub(elapsed);
            let delay = next.min(remaining);
            delays.push(delay);
            elapsed = elapsed.saturating_add(delay);
            next = next.saturating_mul(2).min(self.max_interval);
        }
        delays
    }
}

pub(crate) mod duration_secs {
    //! Serde helpers storing durations as fractional seconds.

    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(crate) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(seconds).map_err(serde::de::Error::custom)
    }
}
