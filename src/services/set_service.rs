//! Set lifecycle coordination: starting sets and questions, buzz arbitration,
//! answer settlement, and the end-of-set scoring pipeline.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::{Duration, sleep};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::QuestionReservation,
    dto::{
        common::PhaseSnapshot,
        game::{
            AnswerRequest, AnswerResponse, BuzzRequest, BuzzResponse, EndQuestionResponse,
            EndSetResponse, JoinRequest, PlayerSummary, QuestionPublic, StartQuestionResponse,
            StartSetResponse, StatusResponse,
        },
    },
    error::ServiceError,
    services::{
        buzz,
        leaderboard::{self, ScoredUser},
        sse_events,
        user_service::{self, SetOutcome},
    },
    state::{
        SharedState,
        session::{Buzz, Player, QuizSession},
        state_machine::{SetEvent, SetPhase},
        transitions::run_transition_with_broadcast,
    },
};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Final standings for the session: ledger order with dense ranks, display
/// names resolved from the player roster with the raw id as fallback for
/// players who left mid-set.
fn standings(session: &QuizSession) -> Vec<PlayerSummary> {
    let mut summaries = Vec::new();
    let mut rank = 0u32;
    let mut last_score: Option<i64> = None;

    for (player_id, score) in session.scores.ranked() {
        if last_score != Some(score) {
            rank += 1;
            last_score = Some(score);
        }
        let player = session.players.get(&player_id);
        summaries.push(PlayerSummary {
            display_name: player
                .map(|p| p.display_name.clone())
                .unwrap_or_else(|| player_id.clone()),
            automated: player.map(|p| p.automated).unwrap_or(false),
            id: player_id,
            score,
            rank: Some(rank),
        });
    }

    summaries
}

/// Roster view used by the status endpoint: join order, no ranks.
fn roster(session: &QuizSession) -> Vec<PlayerSummary> {
    session
        .players
        .values()
        .map(|player| PlayerSummary {
            id: player.id.clone(),
            display_name: player.display_name.clone(),
            score: session.scores.score(&player.id),
            automated: player.automated,
            rank: None,
        })
        .collect()
}

/// Start a new set: reserve questions atomically and install a fresh session.
///
/// Fails with [`ServiceError::InsufficientContent`] when the bank holds fewer
/// unused questions than a full set needs; nothing is marked used in that case.
pub async fn start_set(state: &SharedState) -> Result<StartSetResponse, ServiceError> {
    let config = state.config();
    let required = config.questions_per_set;
    let store = state.require_store().await?;

    let state_for_work = state.clone();
    let (response, _phase) = run_transition_with_broadcast(state, SetEvent::SetStarted, || async move {
        let reservation = store.reserve_questions(required).await?;
        let questions = match reservation {
            QuestionReservation::Reserved(entities) => {
                entities.into_iter().map(Into::into).collect()
            }
            QuestionReservation::Insufficient { available } => {
                return Err(ServiceError::InsufficientContent {
                    available,
                    required,
                });
            }
        };

        let session = QuizSession::new(questions);
        let response = StartSetResponse {
            set_id: session.set_id,
            total_questions: session.total_questions(),
        };
        state_for_work
            .with_session_slot_mut(|slot| *slot = Some(session))
            .await;
        Ok(response)
    })
    .await?;

    info!(set_id = %response.set_id, questions = response.total_questions, "set started");
    Ok(response)
}

/// Add a player to the active set, or refresh their display name when they
/// rejoin. Joining is rejected while no set runs or standings are being
/// published.
pub async fn add_player(
    state: &SharedState,
    request: JoinRequest,
) -> Result<PlayerSummary, ServiceError> {
    match state.phase().await {
        SetPhase::Idle => {
            return Err(ServiceError::InvalidState("no active set to join".into()));
        }
        SetPhase::SessionEnding => {
            return Err(ServiceError::InvalidState(
                "set is ending; joining is closed".into(),
            ));
        }
        _ => {}
    }

    let joined_at_ms = now_ms();
    let (summary, player_count) = state
        .with_session_mut(|session| {
            let player = session
                .players
                .entry(request.player_id.clone())
                .or_insert_with(|| Player {
                    id: request.player_id.clone(),
                    display_name: request.display_name.clone(),
                    automated: request.automated,
                    joined_at_ms,
                    latency_samples: Vec::new(),
                    set_correct: 0,
                    set_wrong: 0,
                });
            player.display_name = request.display_name.clone();
            session.scores.ensure(&request.player_id);

            let summary = PlayerSummary {
                id: player.id.clone(),
                display_name: player.display_name.clone(),
                score: session.scores.score(&request.player_id),
                automated: player.automated,
                rank: None,
            };
            Ok((summary, session.players.len()))
        })
        .await?;

    sse_events::broadcast_player_joined(state, summary.clone(), player_count);

    // Humans get a persisted profile as soon as they join; a storage outage
    // only costs the upsert, not the seat.
    if !summary.automated {
        match state.store().await {
            Some(store) => {
                if let Err(err) = store
                    .ensure_user(summary.id.clone(), summary.display_name.clone())
                    .await
                {
                    warn!(player_id = %summary.id, error = %err, "failed to upsert joining user");
                }
            }
            None => warn!(player_id = %summary.id, "degraded mode: joining user was not persisted"),
        }
    }

    Ok(summary)
}

/// Remove a player from the active set. Their score entry survives so the
/// final standings keep points they earned before leaving.
pub async fn remove_player(state: &SharedState, player_id: &str) -> Result<(), ServiceError> {
    let player_count = state
        .with_session_mut(|session| {
            if session.players.shift_remove(player_id).is_none() {
                return Err(ServiceError::NotFound(format!(
                    "player {player_id} is not in the set"
                )));
            }
            Ok(session.players.len())
        })
        .await?;

    sse_events::broadcast_player_left(state, player_id, player_count);
    Ok(())
}

/// Put the next question on screen and open the buzzers.
pub async fn start_question(
    state: &SharedState,
) -> Result<StartQuestionResponse, ServiceError> {
    let config = state.config();
    let state_for_work = state.clone();

    let (response, _phase) =
        run_transition_with_broadcast(state, SetEvent::QuestionStarted, || async move {
            state_for_work
                .with_session_mut(|session| {
                    let index = session.current_index;
                    let total = session.total_questions();
                    let question = session.current_question().ok_or_else(|| {
                        ServiceError::InvalidState("set has no questions left".into())
                    })?;
                    let public = QuestionPublic::from(question);
                    session.clear_buzzes();
                    Ok(StartQuestionResponse {
                        index,
                        total,
                        question: public,
                        duration_ms: config.question_duration_ms,
                    })
                })
                .await
        })
        .await?;

    sse_events::broadcast_question_start(
        state,
        response.index,
        response.total,
        response.question.clone(),
        response.duration_ms,
    );
    Ok(response)
}

/// Record a buzz and run the arbitration.
///
/// Out-of-phase buzzes are not errors: they come back with `winner` false so
/// clients racing the reveal get a structured answer instead of a 4xx.
pub async fn submit_buzz(
    state: &SharedState,
    request: BuzzRequest,
) -> Result<BuzzResponse, ServiceError> {
    let config = state.config();

    match state.phase().await {
        SetPhase::QuestionActive => {}
        _ => {
            let winner_id = state
                .read_session(|session| session.and_then(|s| s.buzz_winner.clone()))
                .await;
            return Ok(BuzzResponse {
                accepted: false,
                winner: false,
                winner_id,
                adjusted_timestamp_ms: None,
                answer_deadline_ms: None,
            });
        }
    }

    let adjusted = buzz::adjusted_timestamp(
        request.client_timestamp_ms,
        request.latency_ms,
        config.max_latency_compensation_ms,
    );

    // Record the buzz first so a concurrent arbitration sees it. A re-buzz
    // overwrites the timestamps but keeps the original arrival slot.
    state
        .with_session_mut(|session| {
            let player = session.players.get_mut(&request.player_id).ok_or_else(|| {
                ServiceError::NotFound(format!("player {} is not in the set", request.player_id))
            })?;
            player.record_latency(request.latency_ms);
            session.buzzes.insert(
                request.player_id.clone(),
                Buzz {
                    client_timestamp_ms: request.client_timestamp_ms,
                    reported_latency_ms: request.latency_ms,
                    adjusted_timestamp_ms: adjusted,
                },
            );
            Ok(())
        })
        .await?;

    let deadline_ms = now_ms() + config.answer_timeout_ms;
    let state_for_work = state.clone();
    let promotion = run_transition_with_broadcast(
        state,
        SetEvent::BuzzAccepted {
            player_id: request.player_id.clone(),
        },
        || async move {
            state_for_work
                .with_session_mut(|session| {
                    let winner = buzz::earliest(&session.buzzes)
                        .map(str::to_string)
                        .ok_or_else(|| {
                            ServiceError::InvalidState("no buzzes to arbitrate".into())
                        })?;
                    let winner_adjusted_ms = session
                        .buzzes
                        .get(&winner)
                        .map(|buzz| buzz.adjusted_timestamp_ms)
                        .unwrap_or_default();
                    let winner_name = session
                        .players
                        .get(&winner)
                        .map(|player| player.display_name.clone())
                        .unwrap_or_else(|| winner.clone());
                    session.buzz_winner = Some(winner.clone());
                    session.answer_deadline_ms = Some(deadline_ms);
                    Ok((winner, winner_name, winner_adjusted_ms, session.current_index))
                })
                .await
        },
    )
    .await;

    match promotion {
        Ok(((winner_id, winner_name, winner_adjusted_ms, question_index), _phase)) => {
            sse_events::broadcast_buzz(
                state,
                &winner_id,
                &winner_name,
                winner_adjusted_ms,
                deadline_ms,
            );
            spawn_answer_watcher(state.clone(), question_index, winner_id.clone(), deadline_ms);

            let is_winner = winner_id == request.player_id;
            Ok(BuzzResponse {
                accepted: true,
                winner: is_winner,
                winner_id: Some(winner_id),
                adjusted_timestamp_ms: Some(adjusted),
                answer_deadline_ms: is_winner.then_some(deadline_ms),
            })
        }
        Err(ServiceError::InvalidState(_)) => {
            // A concurrent buzz already promoted a winner; check whether the
            // arbitration picked us anyway.
            let winner_id = state
                .read_session(|session| session.and_then(|s| s.buzz_winner.clone()))
                .await;
            let is_winner = winner_id.as_deref() == Some(request.player_id.as_str());
            Ok(BuzzResponse {
                accepted: true,
                winner: is_winner,
                winner_id,
                adjusted_timestamp_ms: Some(adjusted),
                answer_deadline_ms: None,
            })
        }
        Err(err) => Err(err),
    }
}

/// Settle the buzz winner's answer and apply the score delta.
///
/// Submissions from anyone but the current winner, or after the window
/// closed, settle nothing and come back with `accepted` false.
pub async fn submit_answer(
    state: &SharedState,
    request: AnswerRequest,
) -> Result<AnswerResponse, ServiceError> {
    let config = state.config();

    let rejected = AnswerResponse {
        accepted: false,
        correct: None,
        correct_index: None,
        points: None,
        score: None,
        explanation: None,
    };

    if state.phase().await != SetPhase::AnswerWindow {
        return Ok(rejected);
    }

    let eligible = state
        .read_session(|session| {
            session.is_some_and(|s| {
                s.buzz_winner.as_deref() == Some(request.player_id.as_str())
                    && s.answer_deadline_ms.is_some_and(|deadline| now_ms() <= deadline)
            })
        })
        .await;
    if !eligible {
        return Ok(rejected);
    }

    let state_for_work = state.clone();
    let player_id = request.player_id.clone();
    let answer_index = request.answer_index;
    let result = run_transition_with_broadcast(state, SetEvent::AnswerSettled, || async move {
        state_for_work
            .with_session_mut(|session| {
                // Re-check under the write lock; the watcher may have closed
                // the window while we waited for the gate.
                if session.buzz_winner.as_deref() != Some(player_id.as_str()) {
                    return Err(ServiceError::InvalidState(
                        "answer window no longer belongs to this player".into(),
                    ));
                }
                let question = session.current_question().ok_or_else(|| {
                    ServiceError::InvalidState("no question in play".into())
                })?;
                let correct = answer_index == question.correct_index;
                let correct_index = question.correct_index;
                let explanation = question.explanation.clone();

                let points = if correct {
                    config.points_correct
                } else {
                    config.points_wrong
                };
                let score = session.scores.apply(&player_id, points);
                if let Some(player) = session.players.get_mut(&player_id) {
                    if correct {
                        player.set_correct += 1;
                    } else {
                        player.set_wrong += 1;
                    }
                }
                session.answer_deadline_ms = None;

                Ok(AnswerResponse {
                    accepted: true,
                    correct: Some(correct),
                    correct_index: Some(correct_index),
                    points: Some(points),
                    score: Some(score),
                    explanation,
                })
            })
            .await
    })
    .await;

    match result {
        Ok((response, _phase)) => {
            let correct = response.correct.unwrap_or(false);
            let points = response.points.unwrap_or(0);
            sse_events::broadcast_answer(
                state,
                &request.player_id,
                correct,
                response.correct_index.unwrap_or(0),
                points,
                response.score.unwrap_or(0),
            );
            persist_answer(state, &request.player_id, correct, points).await;
            Ok(response)
        }
        // The window was closed by a concurrent reveal; benign rejection.
        Err(ServiceError::InvalidState(_)) => Ok(rejected),
        Err(err) => Err(err),
    }
}

/// Persist a settled answer for a human player: stat counters and the three
/// rolling leaderboards. Automated players are skipped, and storage failures
/// degrade silently past a warning.
async fn persist_answer(state: &SharedState, player_id: &str, correct: bool, points: i64) {
    let participant = state
        .read_session(|session| {
            session.and_then(|s| {
                s.players
                    .get(player_id)
                    .map(|p| (p.automated, p.display_name.clone()))
            })
        })
        .await;
    let Some((false, display_name)) = participant else {
        return;
    };

    let Some(store) = state.store().await else {
        warn!(player_id, "degraded mode: answer was not persisted");
        return;
    };

    if let Err(err) =
        user_service::record_answer(store.as_ref(), player_id, &display_name, correct, points)
            .await
    {
        warn!(player_id, error = %err, "failed to persist answer stats");
    }
    let scored = [ScoredUser {
        user_id: player_id.to_string(),
        display_name,
        score: points,
    }];
    leaderboard::apply_score_deltas(store.as_ref(), &scored, state.config().leaderboard_size)
        .await;
}

/// Reveal the current question and advance the set, entering the ending
/// phase when the last question was consumed.
pub async fn end_question(state: &SharedState) -> Result<EndQuestionResponse, ServiceError> {
    let would_exhaust = state
        .with_session(|session| Ok(session.current_index + 1 >= session.total_questions()))
        .await?;
    let event = if would_exhaust {
        SetEvent::QuestionsExhausted
    } else {
        SetEvent::QuestionEnded
    };

    let state_for_work = state.clone();
    let ((response, index), _phase) = run_transition_with_broadcast(state, event, || async move {
        state_for_work
            .with_session_mut(|session| {
                let index = session.current_index;
                let question = session.current_question().ok_or_else(|| {
                    ServiceError::InvalidState("no question in play".into())
                })?;
                let correct_index = question.correct_index;
                let explanation = question.explanation.clone();

                // Snapshot the reveal context before the buzz state is wiped.
                let scores = session.scores.snapshot();
                let winner_id = session.buzz_winner.clone();

                session.clear_buzzes();
                session.current_index += 1;
                let exhausted = session.exhausted();

                Ok((
                    EndQuestionResponse {
                        correct_index,
                        explanation,
                        scores,
                        winner_id,
                        exhausted,
                        next_index: (!exhausted).then_some(session.current_index),
                    },
                    index,
                ))
            })
            .await
    })
    .await?;

    sse_events::broadcast_question_end(
        state,
        index,
        response.correct_index,
        response.explanation.clone(),
        response.scores.clone(),
        response.winner_id.clone(),
        response.exhausted,
    );
    Ok(response)
}

fn nothing_to_end() -> EndSetResponse {
    EndSetResponse {
        ended: false,
        set_id: None,
        standings: Vec::new(),
        winner_ids: Vec::new(),
    }
}

/// Tear down the set: compute the final standings, persist every human
/// participant's outcome, publish the per-set leaderboard, and return to
/// idle. Calling this with no active set, or losing the teardown to a
/// concurrent call, is a no-op.
pub async fn end_set(state: &SharedState) -> Result<EndSetResponse, ServiceError> {
    let has_session = state.read_session(|session| session.is_some()).await;
    if !has_session {
        return Ok(nothing_to_end());
    }

    struct Teardown {
        set_id: Uuid,
        standings: Vec<PlayerSummary>,
        winner_ids: Vec<String>,
        outcomes: Vec<SetOutcome>,
        scored: Vec<ScoredUser>,
    }

    let state_for_work = state.clone();
    let outcome = run_transition_with_broadcast(state, SetEvent::SetEnded, || async move {
        state_for_work
            .with_session_slot_mut(|slot| {
                let session = slot.take().ok_or_else(|| {
                    ServiceError::InvalidState("no active set to end".into())
                })?;

                let standings = standings(&session);
                let top_score = standings.first().map(|entry| entry.score);
                let winner_ids: Vec<String> = standings
                    .iter()
                    .filter(|entry| Some(entry.score) == top_score)
                    .map(|entry| entry.id.clone())
                    .collect();

                let total_questions = session.total_questions() as u32;
                let mut outcomes = Vec::new();
                let mut scored = Vec::new();
                for player in session.players.values() {
                    if player.automated {
                        continue;
                    }
                    outcomes.push(SetOutcome {
                        user_id: player.id.clone(),
                        display_name: player.display_name.clone(),
                        won: winner_ids.contains(&player.id),
                        perfect: total_questions > 0 && player.set_correct == total_questions,
                    });
                    scored.push(ScoredUser {
                        user_id: player.id.clone(),
                        display_name: player.display_name.clone(),
                        score: session.scores.score(&player.id),
                    });
                }

                Ok(Teardown {
                    set_id: session.set_id,
                    standings,
                    winner_ids,
                    outcomes,
                    scored,
                })
            })
            .await
    })
    .await;

    let teardown = match outcome {
        Ok((teardown, _phase)) => teardown,
        // A concurrent call won the gate and already tore the set down.
        Err(ServiceError::InvalidState(_)) => return Ok(nothing_to_end()),
        Err(err) => return Err(err),
    };

    // Persistence runs after the in-memory teardown committed; a storage
    // outage degrades the scoring pipeline but never blocks the reset.
    match state.store().await {
        Some(store) => {
            let max_entries = state.config().leaderboard_size;
            user_service::record_outcomes(store.as_ref(), teardown.set_id, &teardown.outcomes)
                .await;
            if let Err(err) = leaderboard::create_set_board(
                store.as_ref(),
                teardown.set_id,
                &teardown.scored,
                max_entries,
            )
            .await
            {
                warn!(set_id = %teardown.set_id, error = %err, "failed to publish set leaderboard");
            }
        }
        None => warn!(
            set_id = %teardown.set_id,
            "degraded mode: set results were not persisted"
        ),
    }

    sse_events::broadcast_set_end(
        state,
        teardown.set_id,
        teardown.standings.clone(),
        teardown.winner_ids.clone(),
    );
    info!(set_id = %teardown.set_id, "set ended");

    Ok(EndSetResponse {
        ended: true,
        set_id: Some(teardown.set_id),
        standings: teardown.standings,
        winner_ids: teardown.winner_ids,
    })
}

/// Current phase and roster, for polling clients.
pub async fn get_status(state: &SharedState) -> StatusResponse {
    let phase = state.phase().await;
    let snapshot: PhaseSnapshot = sse_events::build_phase_snapshot(state, &phase).await;
    let players = state
        .read_session(|session| session.map(roster).unwrap_or_default())
        .await;
    StatusResponse { snapshot, players }
}

/// Close the answer window when the winner lets the deadline lapse.
fn spawn_answer_watcher(
    state: SharedState,
    question_index: usize,
    winner_id: String,
    deadline_ms: u64,
) {
    tokio::spawn(async move {
        let wait = deadline_ms.saturating_sub(now_ms());
        sleep(Duration::from_millis(wait)).await;

        if state.phase().await != SetPhase::AnswerWindow {
            return;
        }
        let still_pending = state
            .read_session(|session| {
                session.is_some_and(|s| {
                    s.current_index == question_index
                        && s.buzz_winner.as_deref() == Some(winner_id.as_str())
                })
            })
            .await;
        if !still_pending {
            return;
        }

        info!(winner_id, question_index, "answer window expired; closing question");
        if let Err(err) = end_question(&state).await {
            warn!(error = %err, "failed to close question after answer timeout");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::{
        config::{AppConfig, DEFAULT_POINTS_CORRECT},
        dao::{MemoryStore, QuizStore, models::LeaderboardKind, models::QuestionEntity},
        state::AppState,
    };

    fn question(id: &str) -> QuestionEntity {
        QuestionEntity {
            id: id.into(),
            text: format!("question {id}"),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index: 0,
            category: "general".into(),
            difficulty: "easy".into(),
            explanation: Some("because".into()),
            used: false,
        }
    }

    async fn state_with_bank(questions_per_set: usize, bank_size: usize) -> SharedState {
        let config = AppConfig {
            questions_per_set,
            answer_timeout_ms: 60_000,
            ..Default::default()
        };
        let state = AppState::new(config);

        let store = MemoryStore::new();
        store
            .insert_questions((0..bank_size).map(|i| question(&format!("q{i}"))).collect())
            .await
            .unwrap();
        state.install_store(Arc::new(store)).await;
        state
    }

    fn join(player_id: &str, automated: bool) -> JoinRequest {
        JoinRequest {
            player_id: player_id.into(),
            display_name: player_id.to_uppercase(),
            automated,
        }
    }

    fn buzz_at(player_id: &str, client_timestamp_ms: u64, latency_ms: u64) -> BuzzRequest {
        BuzzRequest {
            player_id: player_id.into(),
            client_timestamp_ms,
            latency_ms,
        }
    }

    fn answer(player_id: &str, answer_index: usize) -> AnswerRequest {
        AnswerRequest {
            player_id: player_id.into(),
            answer_index,
        }
    }

    #[tokio::test]
    async fn short_bank_aborts_set_start_without_consuming_questions() {
        let state = state_with_bank(20, 15).await;

        let err = start_set(&state).await.unwrap_err();
        match err {
            ServiceError::InsufficientContent {
                available,
                required,
            } => {
                assert_eq!(available, 15);
                assert_eq!(required, 20);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(state.phase().await, SetPhase::Idle);

        // Every question must still be reservable.
        let store = state.store().await.unwrap();
        match store.reserve_questions(15).await.unwrap() {
            crate::dao::QuestionReservation::Reserved(reserved) => assert_eq!(reserved.len(), 15),
            other => panic!("expected reservation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_buzz_wins_and_correct_answer_scores() {
        let state = state_with_bank(1, 1).await;

        start_set(&state).await.unwrap();
        add_player(&state, join("alice", false)).await.unwrap();
        add_player(&state, join("bob", false)).await.unwrap();

        start_question(&state).await.unwrap();

        let first = submit_buzz(&state, buzz_at("alice", 100, 0)).await.unwrap();
        assert!(first.winner);
        assert_eq!(first.winner_id.as_deref(), Some("alice"));
        assert_eq!(state.phase().await, SetPhase::AnswerWindow);

        // Bob buzzes after the window opened: benign rejection.
        let late = submit_buzz(&state, buzz_at("bob", 90, 0)).await.unwrap();
        assert!(!late.winner);
        assert!(!late.accepted);
        assert_eq!(late.winner_id.as_deref(), Some("alice"));

        let settled = submit_answer(&state, answer("alice", 0)).await.unwrap();
        assert!(settled.accepted);
        assert_eq!(settled.correct, Some(true));
        assert_eq!(settled.points, Some(DEFAULT_POINTS_CORRECT));
        assert_eq!(settled.score, Some(DEFAULT_POINTS_CORRECT));
        assert_eq!(state.phase().await, SetPhase::QuestionSettled);

        let scores = state
            .read_session(|session| session.unwrap().scores.snapshot())
            .await;
        assert_eq!(scores.get("alice"), Some(&DEFAULT_POINTS_CORRECT));
        assert_eq!(scores.get("bob"), Some(&0));
    }

    #[tokio::test]
    async fn non_winner_answer_never_touches_the_ledger() {
        let state = state_with_bank(1, 1).await;

        start_set(&state).await.unwrap();
        add_player(&state, join("alice", false)).await.unwrap();
        add_player(&state, join("bob", false)).await.unwrap();
        start_question(&state).await.unwrap();
        submit_buzz(&state, buzz_at("alice", 100, 0)).await.unwrap();

        let rejected = submit_answer(&state, answer("bob", 0)).await.unwrap();
        assert!(!rejected.accepted);
        assert!(rejected.correct.is_none());

        let scores = state
            .read_session(|session| session.unwrap().scores.snapshot())
            .await;
        assert_eq!(scores.get("bob"), Some(&0));
        assert_eq!(state.phase().await, SetPhase::AnswerWindow);
    }

    #[tokio::test]
    async fn expired_deadline_rejects_the_answer() {
        let state = state_with_bank(1, 1).await;

        start_set(&state).await.unwrap();
        add_player(&state, join("alice", false)).await.unwrap();
        start_question(&state).await.unwrap();
        submit_buzz(&state, buzz_at("alice", 100, 0)).await.unwrap();

        state
            .with_session_mut(|session| {
                session.answer_deadline_ms = Some(now_ms().saturating_sub(1));
                Ok(())
            })
            .await
            .unwrap();

        let rejected = submit_answer(&state, answer("alice", 0)).await.unwrap();
        assert!(!rejected.accepted);
    }

    #[tokio::test]
    async fn end_question_clears_buzzes_and_advances() {
        let state = state_with_bank(2, 2).await;

        start_set(&state).await.unwrap();
        add_player(&state, join("alice", false)).await.unwrap();
        start_question(&state).await.unwrap();
        submit_buzz(&state, buzz_at("alice", 100, 0)).await.unwrap();
        submit_answer(&state, answer("alice", 0)).await.unwrap();

        let closed = end_question(&state).await.unwrap();
        assert!(!closed.exhausted);
        assert_eq!(closed.next_index, Some(1));
        // The reveal carries the winner and the scores as they stood.
        assert_eq!(closed.winner_id.as_deref(), Some("alice"));
        assert_eq!(closed.scores.get("alice"), Some(&DEFAULT_POINTS_CORRECT));
        assert_eq!(state.phase().await, SetPhase::Forming);

        state
            .read_session(|session| {
                let session = session.unwrap();
                assert!(session.buzzes.is_empty());
                assert!(session.buzz_winner.is_none());
                assert_eq!(session.current_index, 1);
            })
            .await;

        // The second question can run and exhaust the set without a buzz.
        start_question(&state).await.unwrap();
        let closed = end_question(&state).await.unwrap();
        assert!(closed.exhausted);
        assert!(closed.winner_id.is_none());
        assert_eq!(state.phase().await, SetPhase::SessionEnding);
    }

    #[tokio::test]
    async fn end_set_persists_outcomes_and_is_idempotent() {
        let state = state_with_bank(1, 1).await;

        start_set(&state).await.unwrap();
        add_player(&state, join("alice", false)).await.unwrap();
        add_player(&state, join("bot-1", true)).await.unwrap();
        start_question(&state).await.unwrap();
        submit_buzz(&state, buzz_at("alice", 100, 0)).await.unwrap();
        submit_answer(&state, answer("alice", 0)).await.unwrap();
        end_question(&state).await.unwrap();

        let ended = end_set(&state).await.unwrap();
        assert!(ended.ended);
        let set_id = ended.set_id.unwrap();
        assert_eq!(ended.winner_ids, vec!["alice".to_string()]);
        assert_eq!(ended.standings[0].rank, Some(1));
        assert_eq!(state.phase().await, SetPhase::Idle);

        let store = state.store().await.unwrap();
        let alice = store.find_user("alice".into()).await.unwrap().unwrap();
        assert_eq!(alice.stats.sets_played, 1);
        assert_eq!(alice.stats.sets_won, 1);
        assert_eq!(alice.stats.total_correct, 1);
        assert_eq!(alice.stats.current_streak, 1);
        // A perfect one-question set grants the repeatable badge and first_win.
        let badge_ids: Vec<&str> = alice.badges.iter().map(|b| b.badge_id.as_str()).collect();
        assert!(badge_ids.contains(&"first_win"));
        assert!(badge_ids.contains(&"clean_sweep"));

        // Automated players never reach persistence.
        assert!(store.find_user("bot-1".into()).await.unwrap().is_none());

        // The per-set board exists with Alice on top.
        let board = store
            .find_leaderboard(LeaderboardKind::Set, format!("set-{set_id}"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(board.entries[0].user_id, "alice");
        assert_eq!(board.entries[0].rank, 1);

        // The rolling boards were already fed when the answer settled.
        let all_time = store
            .find_leaderboard(LeaderboardKind::AllTime, "all".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(all_time.entries[0].user_id, "alice");
        assert_eq!(all_time.entries[0].score, DEFAULT_POINTS_CORRECT);

        // Ending again is a no-op.
        let again = end_set(&state).await.unwrap();
        assert!(!again.ended);
        assert!(again.set_id.is_none());
    }

    #[tokio::test]
    async fn broadcasts_carry_the_full_play_context() {
        let state = state_with_bank(1, 1).await;
        start_set(&state).await.unwrap();
        add_player(&state, join("alice", false)).await.unwrap();

        let mut events = state.events().subscribe();

        start_question(&state).await.unwrap();
        submit_buzz(&state, buzz_at("alice", 100, 80)).await.unwrap();
        submit_answer(&state, answer("alice", 0)).await.unwrap();
        end_question(&state).await.unwrap();

        let mut by_name = std::collections::HashMap::new();
        while let Ok(event) = events.try_recv() {
            if let Some(name) = event.event.clone() {
                let payload: serde_json::Value = serde_json::from_str(&event.data).unwrap();
                by_name.insert(name, payload);
            }
        }

        let buzz = &by_name["buzz"];
        assert_eq!(buzz["winner_id"], "alice");
        assert_eq!(buzz["display_name"], "ALICE");
        assert_eq!(buzz["adjusted_timestamp_ms"], 60.0); // 100 - 80/2

        let settled = &by_name["answer"];
        assert_eq!(settled["correct"], true);
        assert_eq!(settled["correct_index"], 0);
        assert_eq!(settled["score"], DEFAULT_POINTS_CORRECT);

        let reveal = &by_name["question.end"];
        assert_eq!(reveal["winner_id"], "alice");
        assert_eq!(reveal["scores"]["alice"], DEFAULT_POINTS_CORRECT);
        assert_eq!(reveal["correct_index"], 0);
    }

    #[tokio::test]
    async fn end_set_losing_the_teardown_race_is_a_noop() {
        let state = state_with_bank(1, 1).await;

        // A session in the slot with the machine already idle is what the
        // second of two simultaneous teardown calls observes.
        state
            .with_session_slot_mut(|slot| *slot = Some(QuizSession::new(Vec::new())))
            .await;

        let ended = end_set(&state).await.unwrap();
        assert!(!ended.ended);
        assert!(ended.set_id.is_none());
        assert!(ended.standings.is_empty());
    }

    #[tokio::test]
    async fn departed_player_keeps_their_points_in_the_standings() {
        let state = state_with_bank(1, 1).await;

        start_set(&state).await.unwrap();
        add_player(&state, join("alice", false)).await.unwrap();
        add_player(&state, join("bob", false)).await.unwrap();
        start_question(&state).await.unwrap();
        submit_buzz(&state, buzz_at("bob", 100, 0)).await.unwrap();
        submit_answer(&state, answer("bob", 0)).await.unwrap();
        end_question(&state).await.unwrap();

        remove_player(&state, "bob").await.unwrap();

        let ended = end_set(&state).await.unwrap();
        let bob_row = ended
            .standings
            .iter()
            .find(|entry| entry.id == "bob")
            .unwrap();
        assert_eq!(bob_row.score, DEFAULT_POINTS_CORRECT);
        // Departed players fall back to their raw id as display name.
        assert_eq!(bob_row.display_name, "bob");

        // The answer bob settled while present was already persisted, but he
        // missed the set-boundary outcome.
        let store = state.store().await.unwrap();
        let bob = store.find_user("bob".into()).await.unwrap().unwrap();
        assert_eq!(bob.stats.total_correct, 1);
        assert_eq!(bob.stats.total_points, DEFAULT_POINTS_CORRECT);
        assert_eq!(bob.stats.sets_played, 0);
    }
}
