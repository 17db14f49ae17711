//! Runtime representation of the active quiz set and its participants.

use indexmap::IndexMap;
use uuid::Uuid;

use crate::{dao::models::QuestionEntity, state::score_ledger::ScoreLedger};

/// Number of recent latency reports kept per player.
pub const LATENCY_SAMPLE_SIZE: usize = 5;

/// A trivia question loaded into a set. Immutable once the set starts.
#[derive(Debug, Clone)]
pub struct Question {
    /// Stable identifier inside the question bank.
    pub id: String,
    /// Question text shown to players.
    pub text: String,
    /// The four answer options, in display order.
    pub options: Vec<String>,
    /// Index into `options` of the correct answer. Withheld from broadcasts
    /// until the reveal.
    pub correct_index: usize,
    /// Category tag (e.g. "science").
    pub category: String,
    /// Difficulty tag (e.g. "medium").
    pub difficulty: String,
    /// Optional explanation shown at the reveal.
    pub explanation: Option<String>,
}

/// Player info tracked during a set.
#[derive(Debug, Clone)]
pub struct Player {
    /// Authenticated player identifier.
    pub id: String,
    /// Display name chosen by the player.
    pub display_name: String,
    /// Automated players compete on the buzzer but never touch persisted
    /// stats, streaks, badges, or leaderboards.
    pub automated: bool,
    /// Unix milliseconds when the player joined the set.
    pub joined_at_ms: u64,
    /// Recent client-reported latency values, bounded to [`LATENCY_SAMPLE_SIZE`].
    pub latency_samples: Vec<u64>,
    /// Correct answers given by this player in the current set.
    pub set_correct: u32,
    /// Wrong answers given by this player in the current set.
    pub set_wrong: u32,
}

impl Player {
    /// Record a reported latency sample, evicting the oldest beyond the cap.
    pub fn record_latency(&mut self, latency_ms: u64) {
        self.latency_samples.push(latency_ms);
        if self.latency_samples.len() > LATENCY_SAMPLE_SIZE {
            self.latency_samples.remove(0);
        }
    }
}

/// A buzz submitted for the current question. Cleared at question boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct Buzz {
    /// Client-reported wall-clock timestamp in unix milliseconds.
    pub client_timestamp_ms: u64,
    /// Client-reported round-trip latency in milliseconds (unclamped).
    pub reported_latency_ms: u64,
    /// Server-adjusted timestamp after latency compensation.
    pub adjusted_timestamp_ms: f64,
}

/// Aggregated state for the single in-progress quiz set.
#[derive(Debug, Clone)]
pub struct QuizSession {
    /// Identifier of this set.
    pub set_id: Uuid,
    /// The reserved questions, fixed length, immutable once the set starts.
    pub questions: Vec<Question>,
    /// Index of the question currently (or next) in play.
    pub current_index: usize,
    /// Participating players keyed by id, in join order.
    pub players: IndexMap<String, Player>,
    /// Accumulated scores for the set. Entries outlive player removal so a
    /// disconnect does not erase prior correct answers.
    pub scores: ScoreLedger,
    /// Buzzes received for the current question, in arrival order.
    pub buzzes: IndexMap<String, Buzz>,
    /// Winner of the current question's buzz arbitration, if any.
    pub buzz_winner: Option<String>,
    /// Deadline (unix milliseconds) for the winner's answer.
    pub answer_deadline_ms: Option<u64>,
}

impl QuizSession {
    /// Build a fresh session around the reserved questions, starting before
    /// the first question with no players.
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            set_id: Uuid::new_v4(),
            questions,
            current_index: 0,
            players: IndexMap::new(),
            scores: ScoreLedger::new(),
            buzzes: IndexMap::new(),
            buzz_winner: None,
            answer_deadline_ms: None,
        }
    }

    /// Total number of questions in this set.
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// The question currently in play, when the index is still in range.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    /// Whether every question of the set has been consumed.
    pub fn exhausted(&self) -> bool {
        self.current_index >= self.questions.len()
    }

    /// Drop all buzz state for the current question.
    pub fn clear_buzzes(&mut self) {
        self.buzzes.clear();
        self.buzz_winner = None;
        self.answer_deadline_ms = None;
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            text: value.text,
            options: value.options,
            correct_index: value.correct_index,
            category: value.category,
            difficulty: value.difficulty,
            explanation: value.explanation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str) -> Question {
        Question {
            id: id.into(),
            text: "?".into(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index: 0,
            category: "general".into(),
            difficulty: "medium".into(),
            explanation: None,
        }
    }

    #[test]
    fn latency_samples_are_bounded() {
        let mut player = Player {
            id: "p".into(),
            display_name: "P".into(),
            automated: false,
            joined_at_ms: 0,
            latency_samples: Vec::new(),
            set_correct: 0,
            set_wrong: 0,
        };

        for latency in 0..10u64 {
            player.record_latency(latency);
        }

        assert_eq!(player.latency_samples.len(), LATENCY_SAMPLE_SIZE);
        assert_eq!(player.latency_samples, vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn clear_buzzes_resets_winner_and_deadline() {
        let mut session = QuizSession::new(vec![question("q1")]);
        session.buzzes.insert(
            "p".into(),
            Buzz {
                client_timestamp_ms: 100,
                reported_latency_ms: 40,
                adjusted_timestamp_ms: 80.0,
            },
        );
        session.buzz_winner = Some("p".into());
        session.answer_deadline_ms = Some(4_000);

        session.clear_buzzes();

        assert!(session.buzzes.is_empty());
        assert!(session.buzz_winner.is_none());
        assert!(session.answer_deadline_ms.is_none());
    }

    #[test]
    fn exhaustion_tracks_question_index() {
        let mut session = QuizSession::new(vec![question("q1"), question("q2")]);
        assert!(!session.exhausted());
        session.current_index = 2;
        assert!(session.exhausted());
        assert!(session.current_question().is_none());
    }
}
