use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::SetPhase;

/// Publicly visible set phase exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum VisiblePhase {
    /// No active set.
    Idle,
    /// A set exists; players may join before the next question.
    Forming,
    /// A question is live and buzzes are accepted.
    QuestionActive,
    /// The buzz winner owns the answer window.
    AnswerWindow,
    /// The answer has been settled; waiting for the reveal.
    QuestionSettled,
    /// The set is over; final standings are being published.
    SessionEnding,
}

impl From<&SetPhase> for VisiblePhase {
    fn from(value: &SetPhase) -> Self {
        match value {
            SetPhase::Idle => VisiblePhase::Idle,
            SetPhase::Forming => VisiblePhase::Forming,
            SetPhase::QuestionActive => VisiblePhase::QuestionActive,
            SetPhase::AnswerWindow => VisiblePhase::AnswerWindow,
            SetPhase::QuestionSettled => VisiblePhase::QuestionSettled,
            SetPhase::SessionEnding => VisiblePhase::SessionEnding,
        }
    }
}
