use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;
use time::OffsetDateTime;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    dao::models::{LeaderboardKind, LeaderboardRecordEntity},
    dto::leaderboard::LeaderboardResponse,
    error::AppError,
    services::leaderboard as leaderboard_service,
    state::SharedState,
};

/// Optional query parameters selecting a specific period.
#[derive(Debug, Deserialize, IntoParams)]
pub struct LeaderboardQuery {
    /// Explicit period key. Defaults to the current period for daily and
    /// weekly boards.
    pub period: Option<String>,
    /// Set identifier, required for `set` boards when no period is given.
    pub set_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/leaderboards/{kind}",
    tag = "leaderboards",
    params(
        ("kind" = String, Path, description = "Board kind: daily, weekly, all_time or set"),
        LeaderboardQuery
    ),
    responses(
        (status = 200, description = "Requested leaderboard (empty when never written)", body = LeaderboardResponse),
        (status = 400, description = "Unknown board kind or missing set id")
    )
)]
/// Fetch a leaderboard. Boards that were never written come back empty
/// rather than as 404s.
pub async fn get_leaderboard(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let kind = LeaderboardKind::parse(&kind)
        .ok_or_else(|| AppError::BadRequest(format!("unknown leaderboard kind: {kind}")))?;

    let period = match (query.period, kind) {
        (Some(period), _) => period,
        (None, LeaderboardKind::Set) => {
            let set_id = query.set_id.ok_or_else(|| {
                AppError::BadRequest("set boards need a period or a set_id".into())
            })?;
            leaderboard_service::period_key(kind, OffsetDateTime::now_utc(), Some(set_id))
        }
        (None, _) => leaderboard_service::period_key(kind, OffsetDateTime::now_utc(), None),
    };

    let store = state
        .store()
        .await
        .ok_or_else(|| AppError::ServiceUnavailable("degraded mode".into()))?;
    let record = store
        .find_leaderboard(kind, period.clone())
        .await
        .map_err(|err| AppError::ServiceUnavailable(err.to_string()))?
        .unwrap_or_else(|| LeaderboardRecordEntity::empty(kind, period));

    Ok(Json(record.into()))
}

/// Configure the leaderboard routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/leaderboards/{kind}", get(get_leaderboard))
}
