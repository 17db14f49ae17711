//! Data access layer: the storage abstraction and its implementations.

pub mod memory;
pub mod models;
pub mod storage;

use futures::future::BoxFuture;

use self::{
    models::{
        EarnedBadgeEntity, LeaderboardKind, LeaderboardRecordEntity, QuestionEntity, StatDeltas,
        UserEntity,
    },
    storage::StorageResult,
};

/// Outcome of an atomic question reservation.
#[derive(Debug, Clone)]
pub enum QuestionReservation {
    /// Enough unused questions existed; all of them are now marked used.
    Reserved(Vec<QuestionEntity>),
    /// Not enough unused questions; nothing was marked.
    Insufficient {
        /// How many unused questions the bank currently holds.
        available: usize,
    },
}

/// Persistence operations required by the quiz services.
///
/// Every method returns a boxed future so implementations stay object safe
/// and can be swapped behind the shared state's store slot.
pub trait QuizStore: Send + Sync {
    /// Atomically reserve `count` unused questions, marking them used.
    /// When fewer than `count` are available nothing is marked.
    fn reserve_questions(
        &self,
        count: usize,
    ) -> BoxFuture<'static, StorageResult<QuestionReservation>>;

    /// Insert questions into the bank, replacing entries with the same id.
    fn insert_questions(
        &self,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Fetch the user record, creating a zeroed one when absent. The display
    /// name is refreshed on every call.
    fn ensure_user(
        &self,
        user_id: String,
        display_name: String,
    ) -> BoxFuture<'static, StorageResult<UserEntity>>;

    /// Fetch a user record by id.
    fn find_user(&self, user_id: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;

    /// Apply stat increments to a user, returning the updated record.
    fn increment_stats(
        &self,
        user_id: String,
        deltas: StatDeltas,
    ) -> BoxFuture<'static, StorageResult<UserEntity>>;

    /// Overwrite the user's current streak, raising the longest streak when
    /// the new value exceeds it. Returns the updated record.
    fn set_streak(
        &self,
        user_id: String,
        current: u64,
    ) -> BoxFuture<'static, StorageResult<UserEntity>>;

    /// Append a badge grant to the user's badge list.
    fn append_badge(
        &self,
        user_id: String,
        badge: EarnedBadgeEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Fetch one leaderboard by kind and period key.
    fn find_leaderboard(
        &self,
        kind: LeaderboardKind,
        period: String,
    ) -> BoxFuture<'static, StorageResult<Option<LeaderboardRecordEntity>>>;

    /// Replace a leaderboard record wholesale.
    fn put_leaderboard(
        &self,
        record: LeaderboardRecordEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Store the record only when no board exists for its kind and period.
    /// Returns whether the record was written.
    fn create_leaderboard_if_absent(
        &self,
        record: LeaderboardRecordEntity,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Cheap liveness probe used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;

    /// Attempt to re-establish the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

pub use memory::MemoryStore;
