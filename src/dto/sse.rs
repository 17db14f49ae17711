use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{
    common::PhaseSnapshot,
    game::{PlayerSummary, QuestionPublic},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across the SSE channel.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from a pre-rendered data string.
    pub fn new<E>(event: E, data: String) -> Self
    where
        E: Into<Option<String>>,
    {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever the set phase changes.
pub struct PhaseChangedEvent(pub PhaseSnapshot);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player joins the set.
pub struct PlayerJoinedEvent {
    pub player: PlayerSummary,
    pub player_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player leaves the set. Their score entry survives.
pub struct PlayerLeftEvent {
    pub player_id: String,
    pub player_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the next question goes live.
pub struct QuestionStartEvent {
    pub index: usize,
    pub total: usize,
    pub question: QuestionPublic,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a buzz wins the arbitration.
pub struct BuzzEvent {
    pub winner_id: String,
    pub display_name: String,
    /// Latency-compensated timestamp of the winning buzz.
    pub adjusted_timestamp_ms: f64,
    pub answer_deadline_ms: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the buzz winner's answer has been settled.
pub struct AnswerEvent {
    pub player_id: String,
    pub correct: bool,
    pub correct_index: usize,
    pub points: i64,
    pub score: i64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast at the reveal, once the question is closed.
pub struct QuestionEndEvent {
    pub index: usize,
    pub correct_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Accumulated set scores at the reveal.
    pub scores: IndexMap<String, i64>,
    /// Winner of the question's buzz arbitration, if anyone buzzed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
    pub exhausted: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the set ends with its final standings.
pub struct SetEndEvent {
    pub set_id: Uuid,
    pub standings: Vec<PlayerSummary>,
    pub winner_ids: Vec<String>,
}
