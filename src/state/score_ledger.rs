//! In-memory score ledger scoped to the active set.

use indexmap::IndexMap;

/// Player → accumulated score for the active set only. No persistence;
/// the ledger is dropped together with its session.
#[derive(Debug, Clone, Default)]
pub struct ScoreLedger {
    entries: IndexMap<String, i64>,
}

impl ScoreLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player with a zero score so they appear in snapshots
    /// before their first answer.
    pub fn ensure(&mut self, player_id: &str) {
        self.entries.entry(player_id.to_string()).or_insert(0);
    }

    /// Apply a signed delta, creating the entry at zero when absent.
    pub fn apply(&mut self, player_id: &str, delta: i64) -> i64 {
        let score = self.entries.entry(player_id.to_string()).or_insert(0);
        *score += delta;
        *score
    }

    /// Current score for one player, zero when unknown.
    pub fn score(&self, player_id: &str) -> i64 {
        self.entries.get(player_id).copied().unwrap_or(0)
    }

    /// Immutable ordered view of every entry.
    pub fn snapshot(&self) -> IndexMap<String, i64> {
        self.entries.clone()
    }

    /// Entries sorted by score descending, ties kept in insertion order.
    pub fn ranked(&self) -> Vec<(String, i64)> {
        let mut ranked: Vec<(String, i64)> = self
            .entries
            .iter()
            .map(|(id, score)| (id.clone(), *score))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_creates_entry_at_zero() {
        let mut ledger = ScoreLedger::new();
        assert_eq!(ledger.apply("a", 50), 50);
        assert_eq!(ledger.apply("a", -200), -150);
        assert_eq!(ledger.score("a"), -150);
        assert_eq!(ledger.score("missing"), 0);
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let mut ledger = ScoreLedger::new();
        ledger.ensure("b");
        ledger.ensure("a");
        ledger.apply("c", 10);

        let snapshot = ledger.snapshot();
        let ids: Vec<&String> = snapshot.keys().collect::<Vec<_>>();
        assert_eq!(
            ids.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            vec!["b", "a", "c"]
        );
    }

    #[test]
    fn ranked_sorts_descending_with_stable_ties() {
        let mut ledger = ScoreLedger::new();
        ledger.apply("first", 50);
        ledger.apply("second", 50);
        ledger.apply("third", 100);

        let ranked = ledger.ranked();
        assert_eq!(ranked[0].0, "third");
        assert_eq!(ranked[1].0, "first");
        assert_eq!(ranked[2].0, "second");
    }
}
