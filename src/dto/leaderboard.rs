use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::models::{LeaderboardEntryEntity, LeaderboardRecordEntity},
    dto::format_system_time,
};

/// One ranked row of a leaderboard response.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntryDto {
    pub rank: u32,
    pub user_id: String,
    pub display_name: String,
    pub score: i64,
}

impl From<LeaderboardEntryEntity> for LeaderboardEntryDto {
    fn from(value: LeaderboardEntryEntity) -> Self {
        Self {
            rank: value.rank,
            user_id: value.user_id,
            display_name: value.display_name,
            score: value.score,
        }
    }
}

/// Response returned by `GET /leaderboards/{kind}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub kind: String,
    pub period: String,
    pub entries: Vec<LeaderboardEntryDto>,
    /// RFC 3339 timestamp of the last rewrite.
    pub updated_at: String,
}

impl From<LeaderboardRecordEntity> for LeaderboardResponse {
    fn from(value: LeaderboardRecordEntity) -> Self {
        Self {
            kind: value.kind.as_str().to_string(),
            period: value.period,
            entries: value
                .entries
                .into_iter()
                .map(LeaderboardEntryDto::from)
                .collect(),
            updated_at: format_system_time(value.updated_at),
        }
    }
}
