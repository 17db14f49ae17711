//! Periodic leaderboard maintenance.
//!
//! Boards are stored as whole records and rewritten with a read-modify-write
//! cycle as answers settle. Concurrent writers can lose an update; with a
//! single set running at a time this stays a non-issue.

use std::time::SystemTime;

use time::{Date, Duration, OffsetDateTime};
use tracing::warn;
use uuid::Uuid;

use crate::dao::{
    QuizStore,
    models::{LeaderboardEntryEntity, LeaderboardKind, LeaderboardRecordEntity},
    storage::StorageResult,
};

/// A signed score contribution for one user.
#[derive(Debug, Clone)]
pub struct ScoredUser {
    pub user_id: String,
    pub display_name: String,
    pub score: i64,
}

fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Period key for a board of the given kind at the given instant.
///
/// Daily boards key on the UTC calendar date, weekly boards on the Monday
/// opening the UTC week, the all-time board on a fixed key, and set boards
/// on the set identifier.
pub fn period_key(kind: LeaderboardKind, now: OffsetDateTime, set_id: Option<Uuid>) -> String {
    match kind {
        LeaderboardKind::Daily => format_date(now.date()),
        LeaderboardKind::Weekly => {
            let days_from_monday = now.weekday().number_days_from_monday();
            let monday = now.date() - Duration::days(i64::from(days_from_monday));
            format!("week-{}", format_date(monday))
        }
        LeaderboardKind::AllTime => "all".to_string(),
        LeaderboardKind::Set => match set_id {
            Some(id) => format!("set-{id}"),
            None => "set-unknown".to_string(),
        },
    }
}

/// Assign dense ranks in place: ties share a rank, the next distinct score
/// takes the following rank.
pub fn assign_dense_ranks(entries: &mut [LeaderboardEntryEntity]) {
    let mut rank = 0u32;
    let mut last_score: Option<i64> = None;
    for entry in entries.iter_mut() {
        if last_score != Some(entry.score) {
            rank += 1;
            last_score = Some(entry.score);
        }
        entry.rank = rank;
    }
}

fn merge_scores(
    mut entries: Vec<LeaderboardEntryEntity>,
    scored: &[ScoredUser],
    max_entries: usize,
) -> Vec<LeaderboardEntryEntity> {
    for user in scored {
        match entries.iter_mut().find(|entry| entry.user_id == user.user_id) {
            Some(entry) => {
                entry.score += user.score;
                entry.display_name = user.display_name.clone();
            }
            None => entries.push(LeaderboardEntryEntity {
                rank: 0,
                user_id: user.user_id.clone(),
                display_name: user.display_name.clone(),
                score: user.score,
            }),
        }
    }

    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries.truncate(max_entries);
    assign_dense_ranks(&mut entries);
    entries
}

async fn update_board(
    store: &dyn QuizStore,
    kind: LeaderboardKind,
    period: String,
    scored: &[ScoredUser],
    max_entries: usize,
) -> StorageResult<()> {
    let existing = store.find_leaderboard(kind, period.clone()).await?;
    let mut record =
        existing.unwrap_or_else(|| LeaderboardRecordEntity::empty(kind, period.clone()));
    record.entries = merge_scores(std::mem::take(&mut record.entries), scored, max_entries);
    record.updated_at = SystemTime::now();
    store.put_leaderboard(record).await
}

/// Fold signed score deltas into the daily, weekly and all-time boards.
/// Failures are logged per board and never abort the remaining updates.
pub async fn apply_score_deltas(
    store: &dyn QuizStore,
    scored: &[ScoredUser],
    max_entries: usize,
) {
    if scored.is_empty() {
        return;
    }

    let now = OffsetDateTime::now_utc();
    for kind in [
        LeaderboardKind::Daily,
        LeaderboardKind::Weekly,
        LeaderboardKind::AllTime,
    ] {
        let period = period_key(kind, now, None);
        if let Err(err) = update_board(store, kind, period.clone(), scored, max_entries).await {
            warn!(kind = kind.as_str(), period, error = %err, "leaderboard update failed");
        }
    }
}

/// Publish the immutable per-set board. A second call for the same set is a
/// no-op so set end stays idempotent.
pub async fn create_set_board(
    store: &dyn QuizStore,
    set_id: Uuid,
    scored: &[ScoredUser],
    max_entries: usize,
) -> StorageResult<bool> {
    let period = period_key(LeaderboardKind::Set, OffsetDateTime::now_utc(), Some(set_id));
    let mut record = LeaderboardRecordEntity::empty(LeaderboardKind::Set, period);
    record.entries = merge_scores(Vec::new(), scored, max_entries);
    store.create_leaderboard_if_absent(record).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn scored(user_id: &str, score: i64) -> ScoredUser {
        ScoredUser {
            user_id: user_id.into(),
            display_name: user_id.to_uppercase(),
            score,
        }
    }

    #[test]
    fn daily_key_is_the_utc_date() {
        let now = datetime!(2026-08-27 13:45 UTC);
        assert_eq!(period_key(LeaderboardKind::Daily, now, None), "2026-08-27");
    }

    #[test]
    fn weekly_key_anchors_on_monday() {
        // 2026-08-27 is a Thursday; its week opened on Monday the 24th.
        let now = datetime!(2026-08-27 13:45 UTC);
        assert_eq!(
            period_key(LeaderboardKind::Weekly, now, None),
            "week-2026-08-24"
        );

        let monday = datetime!(2026-08-24 00:00 UTC);
        assert_eq!(
            period_key(LeaderboardKind::Weekly, monday, None),
            "week-2026-08-24"
        );
    }

    #[test]
    fn all_time_key_is_fixed() {
        let now = datetime!(2026-08-27 13:45 UTC);
        assert_eq!(period_key(LeaderboardKind::AllTime, now, None), "all");
    }

    #[test]
    fn merge_accumulates_and_ranks_densely() {
        let existing = vec![LeaderboardEntryEntity {
            rank: 1,
            user_id: "a".into(),
            display_name: "A".into(),
            score: 100,
        }];

        let merged = merge_scores(existing, &[scored("a", 50), scored("b", 150)], 100);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].user_id, "a");
        assert_eq!(merged[0].score, 150);
        assert_eq!(merged[0].rank, 1);
        assert_eq!(merged[1].user_id, "b");
        assert_eq!(merged[1].rank, 1); // tie at 150 shares the rank
    }

    #[test]
    fn merge_is_bounded_and_sorted() {
        let scored_users: Vec<ScoredUser> =
            (0..10).map(|i| scored(&format!("u{i}"), i)).collect();

        let merged = merge_scores(Vec::new(), &scored_users, 3);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].score, 9);
        assert_eq!(merged[2].score, 7);
        assert_eq!(
            merged.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }
}
