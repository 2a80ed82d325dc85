//! Who may view which ranking.

use crate::auth::{Viewer, ViewerRole};
use crate::db::CompetitionDirectory;
use crate::ranking::RankingResult;
use crate::scoring::CompetitionId;

/// WebSocket close code sent when a connect is denied
pub const CLOSE_ACCESS_DENIED: u16 = 4003;

/// Whether `viewer` may see rankings of `competition_id`.
///
/// Unknown competitions are denied for everyone. Staff and organizers see
/// every known competition, judges only those they are assigned to, and
/// everyone else only public ones.
pub async fn can_view(
    directory: &dyn CompetitionDirectory,
    viewer: &Viewer,
    competition_id: CompetitionId,
) -> RankingResult<bool> {
    let Some(competition) = directory.competition(competition_id).await? else {
        return Ok(false);
    };

    match viewer {
        Viewer::Authenticated { role, .. } if role.is_manager() => Ok(true),
        Viewer::Authenticated {
            user_id,
            role: ViewerRole::Judge,
            ..
        } => directory.is_judge_assigned(*user_id, competition_id).await,
        _ => Ok(competition.is_public),
    }
}
