//! Persisted entities exchanged with the storage layer.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A trivia question as stored in the question bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionEntity {
    /// Stable identifier inside the question bank.
    pub id: String,
    /// Question text shown to players.
    pub text: String,
    /// The answer options, in display order.
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_index: usize,
    /// Category tag.
    pub category: String,
    /// Difficulty tag.
    pub difficulty: String,
    /// Optional explanation shown at the reveal.
    #[serde(default)]
    pub explanation: Option<String>,
    /// Whether this question has already been served in a set.
    #[serde(default)]
    pub used: bool,
}

/// Cumulative per-user statistics, updated at question and set boundaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStatsEntity {
    /// Lifetime count of correct answers.
    pub total_correct: u64,
    /// Lifetime count of wrong answers.
    pub total_wrong: u64,
    /// Lifetime sum of points earned (may go negative).
    pub total_points: i64,
    /// Number of sets the user participated in to completion.
    pub sets_played: u64,
    /// Number of sets the user finished in first place.
    pub sets_won: u64,
    /// Number of sets where the user answered every question correctly.
    pub perfect_sets: u64,
    /// Current consecutive set-win streak.
    pub current_streak: u64,
    /// Longest consecutive set-win streak ever reached.
    pub longest_streak: u64,
}

/// Signed increments applied to [`UserStatsEntity`] in one storage call.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatDeltas {
    /// Increment for correct answers.
    pub correct: u64,
    /// Increment for wrong answers.
    pub wrong: u64,
    /// Signed increment for total points.
    pub points: i64,
    /// Increment for sets played.
    pub sets_played: u64,
    /// Increment for sets won.
    pub sets_won: u64,
    /// Increment for perfect sets.
    pub perfect_sets: u64,
}

/// A badge granted to a user, with the context it was earned in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarnedBadgeEntity {
    /// Identifier of the badge definition.
    pub badge_id: String,
    /// When the badge was granted.
    pub earned_at: SystemTime,
    /// Set during which the badge was earned, when applicable.
    pub set_id: Option<Uuid>,
}

/// A registered user together with their stats and earned badges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntity {
    /// Stable user identifier.
    pub id: String,
    /// Display name last seen for this user.
    pub display_name: String,
    /// When the user first appeared.
    pub created_at: SystemTime,
    /// Cumulative statistics.
    pub stats: UserStatsEntity,
    /// Badges earned so far, in grant order.
    pub badges: Vec<EarnedBadgeEntity>,
}

impl UserEntity {
    /// Build a fresh user record with zeroed stats.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            created_at: SystemTime::now(),
            stats: UserStatsEntity::default(),
            badges: Vec::new(),
        }
    }
}

/// The leaderboard families maintained by the scoring pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardKind {
    /// Rolls over at midnight UTC.
    Daily,
    /// Rolls over every Monday.
    Weekly,
    /// Never rolls over.
    AllTime,
    /// One board per finished set.
    Set,
}

impl LeaderboardKind {
    /// Parse the lowercase wire name used in URLs.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "all_time" => Some(Self::AllTime),
            "set" => Some(Self::Set),
            _ => None,
        }
    }

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::AllTime => "all_time",
            Self::Set => "set",
        }
    }
}

/// One ranked row inside a leaderboard record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntryEntity {
    /// Dense rank, starting at 1.
    pub rank: u32,
    /// User this row belongs to.
    pub user_id: String,
    /// Display name captured at update time.
    pub display_name: String,
    /// Accumulated score for the period.
    pub score: i64,
}

/// A full leaderboard for one kind and period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardRecordEntity {
    /// Which family this board belongs to.
    pub kind: LeaderboardKind,
    /// Period key, e.g. `2026-08-27` or `week-2026-08-24`.
    pub period: String,
    /// Ranked entries, bounded in size.
    pub entries: Vec<LeaderboardEntryEntity>,
    /// Last time the board was rewritten.
    pub updated_at: SystemTime,
}

impl LeaderboardRecordEntity {
    /// Build an empty board for the given kind and period.
    pub fn empty(kind: LeaderboardKind, period: impl Into<String>) -> Self {
        Self {
            kind,
            period: period.into(),
            entries: Vec::new(),
            updated_at: SystemTime::now(),
        }
    }
}
