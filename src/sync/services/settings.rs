//! Team settings lookups shared by services.

use super::SyncResult;
use crate::sync::{
    domain::{RepositoryFullName, SyncDomainError, TeamGithubSettings, TeamId},
    ports::TeamDirectory,
};

pub(super) async fn load_settings<D>(directory: &D, team_id: TeamId) -> SyncResult<TeamGithubSettings>
where
    D: TeamDirectory + ?Sized,
{
    let raw = directory.team_settings(team_id).await?;
    Ok(TeamGithubSettings::parse(&raw))
}

pub(super) async fn connected_repository<D>(
    directory: &D,
    team_id: TeamId,
) -> SyncResult<RepositoryFullName>
where
    D: TeamDirectory + ?Sized,
{
    let settings = load_settings(directory, team_id).await?;
    require_repository(&settings, team_id)
}

pub(super) fn require_repository(
    settings: &TeamGithubSettings,
    team_id: TeamId,
) -> SyncResult<RepositoryFullName> {
    settings
        .repository()
        .cloned()
        .ok_or_else(|| SyncDomainError::RepositoryNotConnected(team_id.value()).into())
}
