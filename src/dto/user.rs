use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{EarnedBadgeEntity, UserEntity, UserStatsEntity},
    dto::format_system_time,
};

/// Cumulative statistics block of a user profile.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserStatsDto {
    pub total_correct: u64,
    pub total_wrong: u64,
    pub total_points: i64,
    pub sets_played: u64,
    pub sets_won: u64,
    pub perfect_sets: u64,
    pub current_streak: u64,
    pub longest_streak: u64,
}

impl From<UserStatsEntity> for UserStatsDto {
    fn from(value: UserStatsEntity) -> Self {
        Self {
            total_correct: value.total_correct,
            total_wrong: value.total_wrong,
            total_points: value.total_points,
            sets_played: value.sets_played,
            sets_won: value.sets_won,
            perfect_sets: value.perfect_sets,
            current_streak: value.current_streak,
            longest_streak: value.longest_streak,
        }
    }
}

/// One earned badge in a user profile.
#[derive(Debug, Serialize, ToSchema)]
pub struct EarnedBadgeDto {
    pub badge_id: String,
    /// RFC 3339 timestamp of the grant.
    pub earned_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_id: Option<Uuid>,
}

impl From<EarnedBadgeEntity> for EarnedBadgeDto {
    fn from(value: EarnedBadgeEntity) -> Self {
        Self {
            badge_id: value.badge_id,
            earned_at: format_system_time(value.earned_at),
            set_id: value.set_id,
        }
    }
}

/// Response returned by `GET /users/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub display_name: String,
    /// RFC 3339 timestamp of the first appearance.
    pub created_at: String,
    pub stats: UserStatsDto,
    pub badges: Vec<EarnedBadgeDto>,
}

impl From<UserEntity> for UserResponse {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            display_name: value.display_name,
            created_at: format_system_time(value.created_at),
            stats: value.stats.into(),
            badges: value.badges.into_iter().map(EarnedBadgeDto::from).collect(),
        }
    }
}
