//! Sync status tracking between a task and its mapped issue.
//!
//! The tracker never resolves differences. It only classifies them so that
//! callers can decide between an explicit re-sync (last write wins for
//! metadata) and the human-driven conflict flow used for code.

use super::ParseSyncValueError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Consistency state of a task/issue mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// Both sides carry the same content.
    Synced,
    /// One side changed and has not been propagated yet.
    Pending,
    /// Both sides changed with divergent content.
    Conflict,
    /// The last sync attempt failed.
    Error,
}

impl SyncStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "SYNCED",
            Self::Pending => "PENDING",
            Self::Conflict => "CONFLICT",
            Self::Error => "ERROR",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = ParseSyncValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SYNCED" => Ok(Self::Synced),
            "PENDING" => Ok(Self::Pending),
            "CONFLICT" => Ok(Self::Conflict),
            "ERROR" => Ok(Self::Error),
            _ => Err(ParseSyncValueError::new("sync status", value)),
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content shared between a task and its issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSnapshot {
    title: String,
    body: String,
    closed: bool,
}

impl ContentSnapshot {
    /// Creates a snapshot, normalizing whitespace at the edges.
    #[must_use]
    pub fn new(title: &str, body: Option<&str>, closed: bool) -> Self {
        Self {
            title: title.trim().to_owned(),
            body: body.map(str::trim).unwrap_or_default().replace("\r\n", "\n"),
            closed,
        }
    }

    /// Computes the SHA-256 fingerprint of the snapshot.
    #[must_use]
    pub fn fingerprint(&self) -> ContentFingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update([0]);
        hasher.update(self.body.as_bytes());
        hasher.update([0]);
        hasher.update([u8::from(self.closed)]);
        let digest = hasher.finalize();
        let hex = digest.iter().fold(String::with_capacity(64), |mut acc, byte| {
            acc.push_str(&format!("{byte:02x}"));
            acc
        });
        ContentFingerprint(hex)
    }
}

/// Hex-encoded SHA-256 digest of a [`ContentSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// Wraps a persisted fingerprint.
    #[must_use]
    pub fn from_persisted(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One side of a mapping at observation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Content fingerprint.
    pub fingerprint: ContentFingerprint,
    /// Last modification time of this side.
    pub modified_at: DateTime<Utc>,
}

impl Observation {
    /// Observes a content snapshot modified at `modified_at`.
    #[must_use]
    pub fn of(content: &ContentSnapshot, modified_at: DateTime<Utc>) -> Self {
        Self {
            fingerprint: content.fingerprint(),
            modified_at,
        }
    }
}

/// What the mapping remembers about its last sync.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LastKnownState {
    /// Fingerprint both sides shared after the last successful sync.
    pub synced_fingerprint: Option<ContentFingerprint>,
    /// Time of the last successful sync.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Whether the most recent sync attempt failed.
    pub last_attempt_failed: bool,
}

impl LastKnownState {
    fn side_changed(&self, side: &Observation) -> bool {
        match (&self.synced_fingerprint, self.last_synced_at) {
            (Some(baseline), _) => *baseline != side.fingerprint,
            (None, Some(synced_at)) => side.modified_at > synced_at,
            (None, None) => true,
        }
    }
}

/// Classifies a mapping from both observations and the last known state.
#[must_use]
pub fn evaluate(local: &Observation, remote: &Observation, last: &LastKnownState) -> SyncStatus {
    if last.last_attempt_failed {
        return SyncStatus::Error;
    }
    if local.fingerprint == remote.fingerprint {
        return SyncStatus::Synced;
    }
    let local_changed = last.side_changed(local);
    let remote_changed = last.side_changed(remote);
    let has_baseline = last.synced_fingerprint.is_some() || last.last_synced_at.is_some();
    if has_baseline && local_changed && remote_changed {
        SyncStatus::Conflict
    } else {
        SyncStatus::Pending
    }
}
