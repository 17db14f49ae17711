//! Typed broadcast helpers for the session event stream.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        common::PhaseSnapshot,
        game::{PlayerSummary, QuestionPublic},
        phase::VisiblePhase,
        sse::{
            AnswerEvent, BuzzEvent, PhaseChangedEvent, PlayerJoinedEvent, PlayerLeftEvent,
            QuestionEndEvent, QuestionStartEvent, ServerEvent, SetEndEvent, SystemStatus,
        },
    },
    state::{SharedState, state_machine::SetPhase},
};

const EVENT_PHASE_CHANGED: &str = "phase_changed";
const EVENT_PLAYER_JOINED: &str = "player.joined";
const EVENT_PLAYER_LEFT: &str = "player.left";
const EVENT_QUESTION_START: &str = "question.start";
const EVENT_BUZZ: &str = "buzz";
const EVENT_ANSWER: &str = "answer";
const EVENT_QUESTION_END: &str = "question.end";
const EVENT_SET_END: &str = "set.end";
const EVENT_SYSTEM_STATUS: &str = "system.status";

fn send_event<T: Serialize>(state: &SharedState, event: &str, payload: &T) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(server_event) => state.events().broadcast(server_event),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}

/// Broadcast that a player joined the forming set.
pub fn broadcast_player_joined(state: &SharedState, player: PlayerSummary, player_count: usize) {
    send_event(
        state,
        EVENT_PLAYER_JOINED,
        &PlayerJoinedEvent {
            player,
            player_count,
        },
    );
}

/// Broadcast that a player left the set.
pub fn broadcast_player_left(state: &SharedState, player_id: &str, player_count: usize) {
    send_event(
        state,
        EVENT_PLAYER_LEFT,
        &PlayerLeftEvent {
            player_id: player_id.to_string(),
            player_count,
        },
    );
}

/// Broadcast the next live question, correct answer withheld.
pub fn broadcast_question_start(
    state: &SharedState,
    index: usize,
    total: usize,
    question: QuestionPublic,
    duration_ms: u64,
) {
    send_event(
        state,
        EVENT_QUESTION_START,
        &QuestionStartEvent {
            index,
            total,
            question,
            duration_ms,
        },
    );
}

/// Broadcast the buzz arbitration winner.
pub fn broadcast_buzz(
    state: &SharedState,
    winner_id: &str,
    display_name: &str,
    adjusted_timestamp_ms: f64,
    answer_deadline_ms: u64,
) {
    send_event(
        state,
        EVENT_BUZZ,
        &BuzzEvent {
            winner_id: winner_id.to_string(),
            display_name: display_name.to_string(),
            adjusted_timestamp_ms,
            answer_deadline_ms,
        },
    );
}

/// Broadcast the settled answer and the player's new set score.
pub fn broadcast_answer(
    state: &SharedState,
    player_id: &str,
    correct: bool,
    correct_index: usize,
    points: i64,
    score: i64,
) {
    send_event(
        state,
        EVENT_ANSWER,
        &AnswerEvent {
            player_id: player_id.to_string(),
            correct,
            correct_index,
            points,
            score,
        },
    );
}

/// Broadcast the reveal closing the current question.
pub fn broadcast_question_end(
    state: &SharedState,
    index: usize,
    correct_index: usize,
    explanation: Option<String>,
    scores: IndexMap<String, i64>,
    winner_id: Option<String>,
    exhausted: bool,
) {
    send_event(
        state,
        EVENT_QUESTION_END,
        &QuestionEndEvent {
            index,
            correct_index,
            explanation,
            scores,
            winner_id,
            exhausted,
        },
    );
}

/// Broadcast the final standings of a finished set.
pub fn broadcast_set_end(
    state: &SharedState,
    set_id: Uuid,
    standings: Vec<PlayerSummary>,
    winner_ids: Vec<String>,
) {
    send_event(
        state,
        EVENT_SET_END,
        &SetEndEvent {
            set_id,
            standings,
            winner_ids,
        },
    );
}

/// Broadcast a degraded-mode flip.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Build the shared phase snapshot from the current state.
pub async fn build_phase_snapshot(state: &SharedState, phase: &SetPhase) -> PhaseSnapshot {
    let degraded = state.is_degraded().await;
    state
        .read_session(|session| {
            let question = session.and_then(|s| match phase {
                SetPhase::QuestionActive | SetPhase::AnswerWindow | SetPhase::QuestionSettled => {
                    s.current_question().map(QuestionPublic::from)
                }
                _ => None,
            });

            PhaseSnapshot {
                phase: VisiblePhase::from(phase),
                set_id: session.map(|s| s.set_id),
                degraded,
                question_index: session.map(|s| s.current_index),
                total_questions: session.map(|s| s.total_questions()),
                question,
                buzz_winner: session.and_then(|s| s.buzz_winner.clone()),
                standings: None,
            }
        })
        .await
}

/// Broadcast the committed phase change together with its context snapshot.
pub async fn broadcast_phase_changed(state: &SharedState, phase: &SetPhase) {
    let snapshot = build_phase_snapshot(state, phase).await;
    send_event(state, EVENT_PHASE_CHANGED, &PhaseChangedEvent(snapshot));
}
