use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        common::PhaseSnapshot,
        validation::{validate_display_name, validate_player_id},
    },
    state::session::Question,
};

/// Payload used by a player to join the forming set.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    #[validate(custom(function = validate_player_id))]
    pub player_id: String,
    #[validate(custom(function = validate_display_name))]
    pub display_name: String,
    /// Automated players compete on the buzzer but never touch persisted
    /// stats or leaderboards.
    #[serde(default)]
    pub automated: bool,
}

/// Payload submitted when a player hits the buzzer.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BuzzRequest {
    #[validate(custom(function = validate_player_id))]
    pub player_id: String,
    /// Client wall-clock timestamp of the buzz, unix milliseconds.
    pub client_timestamp_ms: u64,
    /// Client-measured round-trip latency in milliseconds.
    pub latency_ms: u64,
}

/// Payload submitted by the buzz winner to answer the current question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AnswerRequest {
    #[validate(custom(function = validate_player_id))]
    pub player_id: String,
    /// Index of the chosen option.
    pub answer_index: usize,
}

/// A question as shown to players, with the correct answer withheld.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct QuestionPublic {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub category: String,
    pub difficulty: String,
}

impl From<&Question> for QuestionPublic {
    fn from(value: &Question) -> Self {
        Self {
            id: value.id.clone(),
            text: value.text.clone(),
            options: value.options.clone(),
            category: value.category.clone(),
            difficulty: value.difficulty.clone(),
        }
    }
}

/// One player's standing inside the active set.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct PlayerSummary {
    pub id: String,
    pub display_name: String,
    pub score: i64,
    pub automated: bool,
    /// Dense rank, present once standings have been computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

/// Response returned when a new set has been started.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartSetResponse {
    pub set_id: Uuid,
    pub total_questions: usize,
}

/// Response returned when the next question goes live.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartQuestionResponse {
    pub index: usize,
    pub total: usize,
    pub question: QuestionPublic,
    /// How long the question stays open, in milliseconds.
    pub duration_ms: u64,
}

/// Outcome of a buzz submission.
///
/// Late or out-of-phase buzzes are not errors; they simply come back with
/// `winner` false.
#[derive(Debug, Serialize, ToSchema)]
pub struct BuzzResponse {
    /// Whether the buzz was recorded for arbitration.
    pub accepted: bool,
    /// Whether this player currently owns the answer window.
    pub winner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
    /// Latency-compensated timestamp assigned to this buzz.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_timestamp_ms: Option<f64>,
    /// Deadline for the winner's answer, unix milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_deadline_ms: Option<u64>,
}

/// Outcome of an answer submission.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerResponse {
    /// Whether the answer was evaluated. False when the submitter is not the
    /// buzz winner or the answer window is closed.
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_index: Option<usize>,
    /// Signed points granted by this answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
    /// The player's set score after the answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Response returned after revealing and closing the current question.
#[derive(Debug, Serialize, ToSchema)]
pub struct EndQuestionResponse {
    pub correct_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Accumulated set scores at the reveal.
    pub scores: IndexMap<String, i64>,
    /// Buzz winner of the closed question, if anyone buzzed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
    /// Whether the set has run out of questions.
    pub exhausted: bool,
    /// Index of the next question, absent when exhausted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_index: Option<usize>,
}

/// Response returned when a set ends, including the final standings.
#[derive(Debug, Serialize, ToSchema)]
pub struct EndSetResponse {
    /// False when no set was active and the call was a no-op.
    pub ended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_id: Option<Uuid>,
    pub standings: Vec<PlayerSummary>,
    /// Players sharing the top score, empty when no set was active.
    pub winner_ids: Vec<String>,
}

/// Full status payload returned by `GET /game/status`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub snapshot: PhaseSnapshot,
    pub players: Vec<PlayerSummary>,
}
