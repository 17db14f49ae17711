use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{game::PlayerSummary, game::QuestionPublic, phase::VisiblePhase};

/// Shared snapshot describing the current set phase and related context.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct PhaseSnapshot {
    pub phase: VisiblePhase,
    pub set_id: Option<Uuid>,
    /// True when the backend operates in degraded mode (no storage backend).
    pub degraded: bool,
    /// Zero-based index of the question currently (or next) in play.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_index: Option<usize>,
    /// Total number of questions in the active set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<usize>,
    /// Present during question_active/answer_window/question_settled phases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionPublic>,
    /// Present during the answer_window phase to expose the buzz winner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buzz_winner: Option<String>,
    /// Present during the session_ending phase to display final standings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standings: Option<Vec<PlayerSummary>>,
}
