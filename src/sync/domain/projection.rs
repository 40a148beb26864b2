//! Local projection of a pull request's conflict state.
//!
//! GitHub recomputes conflicts asynchronously after a push, so a correct
//! resolution can still be reported as conflicting for several seconds. The
//! projection keeps the last remote detail as the source of truth and layers
//! pending optimistic removals on top of it. [`PrDetailProjection::reconcile`]
//! folds a fresh remote detail back in.

use super::{ConflictFile, PrDetail};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRemoval {
    filename: String,
    applied_at: DateTime<Utc>,
}

/// Outcome of folding a fresh remote detail into the projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Removals the remote now agrees with.
    pub confirmed: Vec<String>,
    /// Removals the remote still disputes after the optimistic window.
    pub rolled_back: Vec<String>,
}

/// Remote pull request detail plus optimistic local edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrDetailProjection {
    remote: PrDetail,
    pending: Vec<PendingRemoval>,
    optimistic_window: Duration,
}

impl PrDetailProjection {
    /// Starts a projection from a remote detail.
    #[must_use]
    pub const fn new(remote: PrDetail, optimistic_window: Duration) -> Self {
        Self {
            remote,
            pending: Vec::new(),
            optimistic_window,
        }
    }

    /// Returns the last remote detail.
    #[must_use]
    pub const fn remote(&self) -> &PrDetail {
        &self.remote
    }

    /// Returns filenames removed locally but not yet confirmed remotely.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(|removal| removal.filename.as_str())
    }

    /// Returns the detail as the user should see it.
    ///
    /// Pending files are hidden. When no conflicting file remains visible
    /// but the remote still reports conflicts, the view reports the pull
    /// request as mergeable.
    #[must_use]
    pub fn view(&self) -> PrDetail {
        let mut detail = self.remote.clone();
        if self.pending.is_empty() {
            return detail;
        }
        detail
            .conflict_files
            .retain(|file| !self.is_pending(&file.filename));
        if detail.conflict_files.is_empty() {
            detail.has_conflicts = false;
            detail.mergeable = Some(true);
        }
        detail
    }

    /// Returns the conflicting files still visible to the user.
    #[must_use]
    pub fn visible_conflicts(&self) -> Vec<ConflictFile> {
        self.view().conflict_files
    }

    /// Optimistically removes `filename` from the conflict list.
    ///
    /// Returns `false` when the file is not visibly conflicting.
    pub fn resolve_optimistically(&mut self, filename: &str, now: DateTime<Utc>) -> bool {
        if !self.remote.is_conflicting(filename) || self.is_pending(filename) {
            return false;
        }
        self.pending.push(PendingRemoval {
            filename: filename.to_owned(),
            applied_at: now,
        });
        true
    }

    /// Replaces the remote detail and settles pending removals.
    ///
    /// A removal is confirmed once the remote stops listing the file. It is
    /// rolled back when the remote still lists the file after the
    /// optimistic window has elapsed; otherwise it stays pending.
    pub fn reconcile(&mut self, fresh: PrDetail, now: DateTime<Utc>) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let window = self.optimistic_window;
        self.pending.retain(|removal| {
            if !fresh.is_conflicting(&removal.filename) {
                report.confirmed.push(removal.filename.clone());
                return false;
            }
            if now - removal.applied_at >= window {
                report.rolled_back.push(removal.filename.clone());
                return false;
            }
            true
        });
        self.remote = fresh;
        report
    }

    fn is_pending(&self, filename: &str) -> bool {
        self.pending.iter().any(|removal| removal.filename == filename)
    }
}
