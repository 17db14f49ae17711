//! Persisted user stats, streaks and badge grants.

use std::time::SystemTime;

use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::{
        QuizStore,
        models::{EarnedBadgeEntity, StatDeltas, UserEntity},
        storage::StorageResult,
    },
    error::ServiceError,
    services::badges::{self, BadgeContext},
};

/// One human participant's outcome for a finished set. Answer counts and
/// points were already persisted as the answers settled; the outcome only
/// carries the set-boundary facts.
#[derive(Debug, Clone)]
pub struct SetOutcome {
    pub user_id: String,
    pub display_name: String,
    /// Whether the user shared the top score.
    pub won: bool,
    /// Whether the user answered every question of the set correctly.
    pub perfect: bool,
}

/// Fetch a user profile by id.
pub async fn profile(store: &dyn QuizStore, user_id: &str) -> Result<UserEntity, ServiceError> {
    store
        .find_user(user_id.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("unknown user {user_id}")))
}

/// Persist one settled answer: the correct/wrong counter and the signed
/// points delta.
pub async fn record_answer(
    store: &dyn QuizStore,
    user_id: &str,
    display_name: &str,
    correct: bool,
    points: i64,
) -> StorageResult<()> {
    store
        .ensure_user(user_id.to_string(), display_name.to_string())
        .await?;
    store
        .increment_stats(
            user_id.to_string(),
            StatDeltas {
                correct: u64::from(correct),
                wrong: u64::from(!correct),
                points,
                ..Default::default()
            },
        )
        .await?;
    Ok(())
}

/// Persist one participant's set outcome: stats increments, the win streak,
/// and any newly earned badges. Returns the ids of badges granted.
pub async fn record_outcome(
    store: &dyn QuizStore,
    set_id: Uuid,
    outcome: &SetOutcome,
) -> StorageResult<Vec<&'static str>> {
    store
        .ensure_user(outcome.user_id.clone(), outcome.display_name.clone())
        .await?;

    let deltas = StatDeltas {
        sets_played: 1,
        sets_won: u64::from(outcome.won),
        perfect_sets: u64::from(outcome.perfect),
        ..Default::default()
    };
    let user = store
        .increment_stats(outcome.user_id.clone(), deltas)
        .await?;

    let next_streak = if outcome.won {
        user.stats.current_streak + 1
    } else {
        0
    };
    let user = store.set_streak(outcome.user_id.clone(), next_streak).await?;

    let ctx = BadgeContext {
        stats: &user.stats,
        won_set: outcome.won,
        perfect_set: outcome.perfect,
    };

    let mut granted = Vec::new();
    for badge in badges::earned_badges(&ctx) {
        let already_owned = user.badges.iter().any(|b| b.badge_id == badge.id);
        // One-shot badges are granted at most once; repeatable ones once per set.
        let duplicate_for_set = user
            .badges
            .iter()
            .any(|b| b.badge_id == badge.id && b.set_id == Some(set_id));
        if (badge.repeatable && duplicate_for_set) || (!badge.repeatable && already_owned) {
            continue;
        }

        store
            .append_badge(
                outcome.user_id.clone(),
                EarnedBadgeEntity {
                    badge_id: badge.id.to_string(),
                    earned_at: SystemTime::now(),
                    set_id: Some(set_id),
                },
            )
            .await?;
        granted.push(badge.id);
    }

    Ok(granted)
}

/// Persist every participant's outcome, isolating failures per user so one
/// broken record never blocks the rest of the set teardown.
pub async fn record_outcomes(store: &dyn QuizStore, set_id: Uuid, outcomes: &[SetOutcome]) {
    for outcome in outcomes {
        if let Err(err) = record_outcome(store, set_id, outcome).await {
            warn!(user_id = %outcome.user_id, error = %err, "failed to persist set outcome");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::memory::MemoryStore;

    fn outcome(user_id: &str, won: bool, perfect: bool) -> SetOutcome {
        SetOutcome {
            user_id: user_id.into(),
            display_name: user_id.to_uppercase(),
            won,
            perfect,
        }
    }

    #[tokio::test]
    async fn answers_accumulate_counters_and_points() {
        let store = MemoryStore::new();

        record_answer(&store, "alice", "ALICE", true, 50).await.unwrap();
        record_answer(&store, "alice", "ALICE", false, -200)
            .await
            .unwrap();

        let user = store.find_user("alice".into()).await.unwrap().unwrap();
        assert_eq!(user.stats.total_correct, 1);
        assert_eq!(user.stats.total_wrong, 1);
        assert_eq!(user.stats.total_points, -150);
    }

    #[tokio::test]
    async fn outcome_updates_stats_and_streak() {
        let store = MemoryStore::new();
        let set_id = Uuid::new_v4();

        record_outcome(&store, set_id, &outcome("alice", true, false))
            .await
            .unwrap();

        let user = store.find_user("alice".into()).await.unwrap().unwrap();
        assert_eq!(user.stats.sets_played, 1);
        assert_eq!(user.stats.sets_won, 1);
        assert_eq!(user.stats.current_streak, 1);
        assert_eq!(user.stats.longest_streak, 1);
    }

    #[tokio::test]
    async fn loss_resets_streak_but_keeps_longest() {
        let store = MemoryStore::new();

        record_outcome(&store, Uuid::new_v4(), &outcome("bob", true, false))
            .await
            .unwrap();
        record_outcome(&store, Uuid::new_v4(), &outcome("bob", true, false))
            .await
            .unwrap();
        record_outcome(&store, Uuid::new_v4(), &outcome("bob", false, false))
            .await
            .unwrap();

        let user = store.find_user("bob".into()).await.unwrap().unwrap();
        assert_eq!(user.stats.current_streak, 0);
        assert_eq!(user.stats.longest_streak, 2);
    }

    #[tokio::test]
    async fn one_shot_badges_are_not_granted_twice() {
        let store = MemoryStore::new();

        let granted = record_outcome(&store, Uuid::new_v4(), &outcome("carol", true, false))
            .await
            .unwrap();
        assert_eq!(granted, vec!["first_win"]);

        let granted = record_outcome(&store, Uuid::new_v4(), &outcome("carol", true, false))
            .await
            .unwrap();
        assert!(granted.is_empty());
    }

    #[tokio::test]
    async fn clean_sweep_repeats_across_sets() {
        let store = MemoryStore::new();

        let granted = record_outcome(&store, Uuid::new_v4(), &outcome("dave", true, true))
            .await
            .unwrap();
        assert!(granted.contains(&"clean_sweep"));

        let granted = record_outcome(&store, Uuid::new_v4(), &outcome("dave", true, true))
            .await
            .unwrap();
        assert!(granted.contains(&"clean_sweep"));

        let user = store.find_user("dave".into()).await.unwrap().unwrap();
        let sweeps = user
            .badges
            .iter()
            .filter(|b| b.badge_id == "clean_sweep")
            .count();
        assert_eq!(sweeps, 2);
    }
}
