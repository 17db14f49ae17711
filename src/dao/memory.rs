//! In-process store used for single-node deployments and tests.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use rand::seq::SliceRandom;
use tokio::sync::Mutex;

use super::{
    QuestionReservation, QuizStore,
    models::{
        EarnedBadgeEntity, LeaderboardKind, LeaderboardRecordEntity, QuestionEntity, StatDeltas,
        UserEntity,
    },
    storage::{StorageError, StorageResult},
};

#[derive(Default)]
struct Inner {
    questions: DashMap<String, QuestionEntity>,
    users: DashMap<String, UserEntity>,
    leaderboards: DashMap<(LeaderboardKind, String), LeaderboardRecordEntity>,
    // Serializes reservations so marking questions used stays all-or-nothing.
    reservation: Mutex<()>,
}

/// Store keeping every collection in process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn user_or_missing(inner: &Inner, user_id: &str) -> StorageResult<UserEntity> {
        inner
            .users
            .get(user_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StorageError::unavailable(format!("unknown user {user_id}")))
    }
}

impl QuizStore for MemoryStore {
    fn reserve_questions(
        &self,
        count: usize,
    ) -> BoxFuture<'static, StorageResult<QuestionReservation>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let _guard = inner.reservation.lock().await;

            let mut unused: Vec<String> = inner
                .questions
                .iter()
                .filter(|entry| !entry.used)
                .map(|entry| entry.key().clone())
                .collect();

            if unused.len() < count {
                return Ok(QuestionReservation::Insufficient {
                    available: unused.len(),
                });
            }

            unused.shuffle(&mut rand::rng());
            unused.truncate(count);

            let mut reserved = Vec::with_capacity(count);
            for id in unused {
                if let Some(mut entry) = inner.questions.get_mut(&id) {
                    entry.used = true;
                    reserved.push(entry.clone());
                }
            }

            Ok(QuestionReservation::Reserved(reserved))
        })
    }

    fn insert_questions(
        &self,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            for question in questions {
                inner.questions.insert(question.id.clone(), question);
            }
            Ok(())
        })
    }

    fn ensure_user(
        &self,
        user_id: String,
        display_name: String,
    ) -> BoxFuture<'static, StorageResult<UserEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let entry = inner
                .users
                .entry(user_id.clone())
                .and_modify(|user| user.display_name = display_name.clone())
                .or_insert_with(|| UserEntity::new(user_id, display_name));
            Ok(entry.clone())
        })
    }

    fn find_user(&self, user_id: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.users.get(&user_id).map(|entry| entry.clone())) })
    }

    fn increment_stats(
        &self,
        user_id: String,
        deltas: StatDeltas,
    ) -> BoxFuture<'static, StorageResult<UserEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(mut entry) = inner.users.get_mut(&user_id) {
                let stats = &mut entry.stats;
                stats.total_correct += deltas.correct;
                stats.total_wrong += deltas.wrong;
                stats.total_points += deltas.points;
                stats.sets_played += deltas.sets_played;
                stats.sets_won += deltas.sets_won;
                stats.perfect_sets += deltas.perfect_sets;
                return Ok(entry.clone());
            }
            Self::user_or_missing(&inner, &user_id)
        })
    }

    fn set_streak(
        &self,
        user_id: String,
        current: u64,
    ) -> BoxFuture<'static, StorageResult<UserEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(mut entry) = inner.users.get_mut(&user_id) {
                entry.stats.current_streak = current;
                if current > entry.stats.longest_streak {
                    entry.stats.longest_streak = current;
                }
                return Ok(entry.clone());
            }
            Self::user_or_missing(&inner, &user_id)
        })
    }

    fn append_badge(
        &self,
        user_id: String,
        badge: EarnedBadgeEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            match inner.users.get_mut(&user_id) {
                Some(mut entry) => {
                    entry.badges.push(badge);
                    Ok(())
                }
                None => Err(StorageError::unavailable(format!("unknown user {user_id}"))),
            }
        })
    }

    fn find_leaderboard(
        &self,
        kind: LeaderboardKind,
        period: String,
    ) -> BoxFuture<'static, StorageResult<Option<LeaderboardRecordEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .leaderboards
                .get(&(kind, period))
                .map(|entry| entry.clone()))
        })
    }

    fn put_leaderboard(
        &self,
        record: LeaderboardRecordEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner
                .leaderboards
                .insert((record.kind, record.period.clone()), record);
            Ok(())
        })
    }

    fn create_leaderboard_if_absent(
        &self,
        record: LeaderboardRecordEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            match inner
                .leaderboards
                .entry((record.kind, record.period.clone()))
            {
                Entry::Occupied(_) => Ok(false),
                Entry::Vacant(slot) => {
                    slot.insert(record);
                    Ok(true)
                }
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str) -> QuestionEntity {
        QuestionEntity {
            id: id.into(),
            text: "?".into(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index: 0,
            category: "general".into(),
            difficulty: "easy".into(),
            explanation: None,
            used: false,
        }
    }

    #[tokio::test]
    async fn reservation_is_all_or_nothing() {
        let store = MemoryStore::new();
        store
            .insert_questions((0..3).map(|i| question(&format!("q{i}"))).collect())
            .await
            .unwrap();

        match store.reserve_questions(5).await.unwrap() {
            QuestionReservation::Insufficient { available } => assert_eq!(available, 3),
            other => panic!("expected insufficient, got {other:?}"),
        }

        // The failed reservation must not have consumed anything.
        match store.reserve_questions(3).await.unwrap() {
            QuestionReservation::Reserved(reserved) => assert_eq!(reserved.len(), 3),
            other => panic!("expected reservation, got {other:?}"),
        }

        match store.reserve_questions(1).await.unwrap() {
            QuestionReservation::Insufficient { available } => assert_eq!(available, 0),
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ensure_user_refreshes_display_name() {
        let store = MemoryStore::new();
        let created = store
            .ensure_user("u1".into(), "Alice".into())
            .await
            .unwrap();
        assert_eq!(created.display_name, "Alice");
        assert_eq!(created.stats.total_correct, 0);

        let refreshed = store
            .ensure_user("u1".into(), "Alicia".into())
            .await
            .unwrap();
        assert_eq!(refreshed.display_name, "Alicia");
        assert_eq!(refreshed.created_at, created.created_at);
    }

    #[tokio::test]
    async fn set_streak_raises_longest() {
        let store = MemoryStore::new();
        store.ensure_user("u1".into(), "Alice".into()).await.unwrap();

        let user = store.set_streak("u1".into(), 3).await.unwrap();
        assert_eq!(user.stats.longest_streak, 3);

        let user = store.set_streak("u1".into(), 0).await.unwrap();
        assert_eq!(user.stats.current_streak, 0);
        assert_eq!(user.stats.longest_streak, 3);
    }

    #[tokio::test]
    async fn conditional_create_respects_existing_board() {
        let store = MemoryStore::new();
        let record = LeaderboardRecordEntity::empty(LeaderboardKind::Set, "set-1");

        assert!(store.create_leaderboard_if_absent(record.clone()).await.unwrap());
        assert!(!store.create_leaderboard_if_absent(record).await.unwrap());
    }
}
