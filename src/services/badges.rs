//! Badge definitions and evaluation.
//!
//! Badges are evaluated after a user's stats have been updated at set end.
//! Most badges are one-shot thresholds on cumulative stats; `clean_sweep` is
//! repeatable and granted for the set that was just played.

use crate::dao::models::UserStatsEntity;

/// Context a badge predicate runs against.
#[derive(Debug, Clone, Copy)]
pub struct BadgeContext<'a> {
    /// Stats after the set's increments were applied.
    pub stats: &'a UserStatsEntity,
    /// Whether the user won the set that just finished.
    pub won_set: bool,
    /// Whether the user answered every question of the set correctly.
    pub perfect_set: bool,
}

/// A badge the scoring pipeline can grant.
pub struct BadgeDefinition {
    /// Stable identifier stored on the user record.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// One-line description shown in profiles.
    pub description: &'static str,
    /// Repeatable badges can be granted once per qualifying set; the rest
    /// are granted at most once per user.
    pub repeatable: bool,
    earned: fn(&BadgeContext<'_>) -> bool,
}

impl BadgeDefinition {
    /// Whether the badge's condition holds in this context.
    pub fn earned(&self, ctx: &BadgeContext<'_>) -> bool {
        (self.earned)(ctx)
    }
}

impl std::fmt::Debug for BadgeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BadgeDefinition")
            .field("id", &self.id)
            .field("repeatable", &self.repeatable)
            .finish()
    }
}

/// Every badge the system knows about, in evaluation order.
pub static REGISTRY: &[BadgeDefinition] = &[
    BadgeDefinition {
        id: "first_win",
        name: "First Win",
        description: "Win your first set",
        repeatable: false,
        earned: |ctx| ctx.stats.sets_won >= 1,
    },
    BadgeDefinition {
        id: "wins_10",
        name: "Champion",
        description: "Win 10 sets",
        repeatable: false,
        earned: |ctx| ctx.stats.sets_won >= 10,
    },
    BadgeDefinition {
        id: "streak_10",
        name: "On Fire",
        description: "Win 10 sets in a row",
        repeatable: false,
        earned: |ctx| ctx.stats.current_streak >= 10,
    },
    BadgeDefinition {
        id: "correct_100",
        name: "Scholar",
        description: "Answer 100 questions correctly",
        repeatable: false,
        earned: |ctx| ctx.stats.total_correct >= 100,
    },
    BadgeDefinition {
        id: "correct_1000",
        name: "Sage",
        description: "Answer 1,000 questions correctly",
        repeatable: false,
        earned: |ctx| ctx.stats.total_correct >= 1_000,
    },
    BadgeDefinition {
        id: "correct_10000",
        name: "Oracle",
        description: "Answer 10,000 questions correctly",
        repeatable: false,
        earned: |ctx| ctx.stats.total_correct >= 10_000,
    },
    BadgeDefinition {
        id: "sets_50",
        name: "Regular",
        description: "Play 50 sets to completion",
        repeatable: false,
        earned: |ctx| ctx.stats.sets_played >= 50,
    },
    BadgeDefinition {
        id: "clean_sweep",
        name: "Clean Sweep",
        description: "Answer every question of a set correctly",
        repeatable: true,
        earned: |ctx| ctx.perfect_set,
    },
];

/// Badges whose condition holds in this context. The caller is responsible
/// for filtering one-shot badges the user already owns.
pub fn earned_badges(ctx: &BadgeContext<'_>) -> Vec<&'static BadgeDefinition> {
    REGISTRY.iter().filter(|badge| badge.earned(ctx)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(stats: &UserStatsEntity, won_set: bool, perfect_set: bool) -> BadgeContext<'_> {
        BadgeContext {
            stats,
            won_set,
            perfect_set,
        }
    }

    #[test]
    fn fresh_user_earns_nothing() {
        let stats = UserStatsEntity::default();
        assert!(earned_badges(&ctx(&stats, false, false)).is_empty());
    }

    #[test]
    fn first_win_triggers_on_first_victory() {
        let stats = UserStatsEntity {
            sets_won: 1,
            sets_played: 1,
            current_streak: 1,
            ..Default::default()
        };

        let earned: Vec<&str> = earned_badges(&ctx(&stats, true, false))
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(earned, vec!["first_win"]);
    }

    #[test]
    fn cumulative_thresholds_stack() {
        let stats = UserStatsEntity {
            total_correct: 1_200,
            sets_played: 60,
            sets_won: 12,
            current_streak: 10,
            ..Default::default()
        };

        let earned: Vec<&str> = earned_badges(&ctx(&stats, true, false))
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(
            earned,
            vec![
                "first_win",
                "wins_10",
                "streak_10",
                "correct_100",
                "correct_1000",
                "sets_50"
            ]
        );
    }

    #[test]
    fn clean_sweep_is_the_only_repeatable_badge() {
        let repeatable: Vec<&str> = REGISTRY
            .iter()
            .filter(|b| b.repeatable)
            .map(|b| b.id)
            .collect();
        assert_eq!(repeatable, vec!["clean_sweep"]);

        let stats = UserStatsEntity {
            perfect_sets: 3,
            ..Default::default()
        };
        let earned: Vec<&str> = earned_badges(&ctx(&stats, false, true))
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(earned, vec!["clean_sweep"]);
    }
}
