//! AI-assisted conflict resolution flow.

use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{InFlightRegistry, SyncResult, settings::connected_repository};
use crate::sync::{
    domain::{
        ConflictResolutionSession, PrDetailProjection, PullRequestNumber, ReconcileReport,
        TeamId,
    },
    ports::{ConflictAdvisor, GitHubGateway, RemoteError, TeamDirectory},
};

/// Default time a locally resolved file stays hidden while GitHub
/// recomputes conflicts.
pub const DEFAULT_OPTIMISTIC_WINDOW: chrono::Duration = chrono::Duration::seconds(30);

/// Drives conflict resolution sessions against the advisor and keeps the
/// pull request projection current.
#[derive(Clone)]
pub struct ConflictResolutionService<D, G, A, C>
where
    D: TeamDirectory,
    G: GitHubGateway,
    A: ConflictAdvisor,
    C: Clock + Send + Sync,
{
    directory: Arc<D>,
    github: Arc<G>,
    advisor: Arc<A>,
    clock: Arc<C>,
    optimistic_window: chrono::Duration,
    in_flight: InFlightRegistry,
}

impl<D, G, A, C> ConflictResolutionService<D, G, A, C>
where
    D: TeamDirectory,
    G: GitHubGateway,
    A: ConflictAdvisor,
    C: Clock + Send + Sync,
{
    /// Creates a service with the default optimistic window.
    #[must_use]
    pub fn new(directory: Arc<D>, github: Arc<G>, advisor: Arc<A>, clock: Arc<C>) -> Self {
        Self {
            directory,
            github,
            advisor,
            clock,
            optimistic_window: DEFAULT_OPTIMISTIC_WINDOW,
            in_flight: InFlightRegistry::new(),
        }
    }

    /// Replaces the optimistic window.
    #[must_use]
    pub const fn with_optimistic_window(mut self, window: chrono::Duration) -> Self {
        self.optimistic_window = window;
        self
    }

    /// Shares an in-flight registry with other services.
    #[must_use]
    pub fn with_in_flight(mut self, registry: InFlightRegistry) -> Self {
        self.in_flight = registry;
        self
    }

    /// Fetches a pull request and starts a projection of its conflicts.
    ///
    /// # Errors
    ///
    /// Returns [`super::SyncError::Upstream`] when GitHub cannot be read.
    pub async fn open_projection(
        &self,
        team_id: TeamId,
        pr_number: PullRequestNumber,
    ) -> SyncResult<PrDetailProjection> {
        let repository = connected_repository(self.directory.as_ref(), team_id).await?;
        let detail = self.github.pull_request_detail(&repository, pr_number).await?;
        Ok(PrDetailProjection::new(detail, self.optimistic_window))
    }

    /// Asks the advisor to analyse the session's file.
    ///
    /// On failure the session moves to `Failed` with the advisor's message,
    /// as it does when the returned future is dropped before the advisor
    /// answers.
    ///
    /// # Errors
    ///
    /// Returns [`super::SyncError::Validation`] while another call of the
    /// session is outstanding and [`super::SyncError::Upstream`] when the
    /// advisor fails.
    pub async fn request_resolution(&self, session: &mut ConflictResolutionSession) -> SyncResult<()> {
        let _guard = self.in_flight.acquire("conflict.analyze", session_key(session))?;
        session.begin_analysis()?;
        let mut call = OutstandingCall::new(session);
        let result = self
            .advisor
            .resolve_conflict(call.session.team_id(), call.session.pr_number(), call.session.filename())
            .await
            .and_then(|analysis| {
                if analysis.options.is_empty() {
                    return Err(RemoteError::Rejected {
                        status: 422,
                        message: format!("no resolution options for {}", call.session.filename()),
                    });
                }
                Ok(analysis)
            });
        match result {
            Ok(analysis) => {
                debug!(pr_number = %call.session.pr_number(), filename = call.session.filename(), options = analysis.options.len(), "resolution options ready");
                call.session.options_ready(analysis)?;
                Ok(())
            }
            Err(err) => {
                warn!(pr_number = %call.session.pr_number(), filename = call.session.filename(), error = %err, "conflict analysis failed");
                call.session.fail(err.message())?;
                Err(err.into())
            }
        }
    }

    /// Pushes the selected option and hides the file optimistically.
    ///
    /// On failure the session moves to `Failed`, keeping the analysis and
    /// selection, and the projection is left unchanged. Dropping the future
    /// mid-call has the same effect.
    ///
    /// # Errors
    ///
    /// Returns [`super::SyncError::Validation`] without a selection and
    /// [`super::SyncError::Upstream`] when the advisor fails.
    pub async fn apply(
        &self,
        session: &mut ConflictResolutionSession,
        projection: &mut PrDetailProjection,
    ) -> SyncResult<()> {
        let _guard = self.in_flight.acquire("conflict.apply", session_key(session))?;
        let request = session.begin_apply()?;
        let mut call = OutstandingCall::new(session);
        match self
            .advisor
            .apply_resolution(call.session.team_id(), call.session.pr_number(), &request)
            .await
        {
            Ok(()) => {
                call.session.applied()?;
                projection.resolve_optimistically(&request.filename, self.clock.utc());
                info!(pr_number = %call.session.pr_number(), filename = %request.filename, "applied conflict resolution");
                Ok(())
            }
            Err(err) => {
                warn!(pr_number = %call.session.pr_number(), filename = %request.filename, error = %err, "applying resolution failed");
                call.session.fail(err.message())?;
                Err(err.into())
            }
        }
    }

    /// Reconciles the projection with a fresh remote detail.
    ///
    /// Fetch failures are logged and leave the projection untouched.
    pub async fn recheck(&self, team_id: TeamId, projection: &mut PrDetailProjection) -> ReconcileReport {
        let pr_number = projection.remote().record.number;
        let fresh = match connected_repository(self.directory.as_ref(), team_id).await {
            Ok(repository) => self
                .github
                .pull_request_detail(&repository, pr_number)
                .await
                .map_err(Into::into),
            Err(err) => Err(err),
        };
        match fresh {
            Ok(detail) => {
                let report = projection.reconcile(detail, self.clock.utc());
                if !report.rolled_back.is_empty() {
                    warn!(%pr_number, files = ?report.rolled_back, "optimistic resolutions rolled back");
                }
                report
            }
            Err(err) => {
                debug!(%pr_number, error = %err, "conflict recheck skipped");
                ReconcileReport::default()
            }
        }
    }
}

/// Moves a session to `Failed` when its advisor call is dropped mid-flight.
struct OutstandingCall<'a> {
    session: &'a mut ConflictResolutionSession,
}

impl<'a> OutstandingCall<'a> {
    const fn new(session: &'a mut ConflictResolutionSession) -> Self {
        Self { session }
    }
}

impl Drop for OutstandingCall<'_> {
    fn drop(&mut self) {
        if self.session.state().is_in_flight() {
            warn!(pr_number = %self.session.pr_number(), filename = self.session.filename(), "conflict call interrupted");
            drop(self.session.fail(INTERRUPTED));
        }
    }
}

const INTERRUPTED: &str = "interrupted before the advisor answered";

fn session_key(session: &ConflictResolutionSession) -> String {
    format!(
        "{}/{}/{}",
        session.team_id(),
        session.pr_number(),
        session.filename()
    )
}
