use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use axum_valid::Valid;

use crate::{
    dto::game::{
        AnswerRequest, AnswerResponse, BuzzRequest, BuzzResponse, EndQuestionResponse,
        EndSetResponse, JoinRequest, PlayerSummary, StartQuestionResponse, StartSetResponse,
        StatusResponse,
    },
    error::AppError,
    services::set_service,
    state::SharedState,
};

/// Routes driving the set lifecycle and in-set play.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/game/set/start", post(start_set))
        .route("/game/set/end", post(end_set))
        .route("/game/players", post(join))
        .route("/game/players/{id}", delete(leave))
        .route("/game/question/start", post(start_question))
        .route("/game/question/end", post(end_question))
        .route("/game/buzz", post(submit_buzz))
        .route("/game/answer", post(submit_answer))
        .route("/game/status", get(status))
}

/// Start a new set by reserving a full batch of unused questions.
#[utoipa::path(
    post,
    path = "/game/set/start",
    tag = "game",
    responses(
        (status = 200, description = "Set started", body = StartSetResponse),
        (status = 409, description = "A set is already running, or the question bank is too small")
    )
)]
pub async fn start_set(
    State(state): State<SharedState>,
) -> Result<Json<StartSetResponse>, AppError> {
    let response = set_service::start_set(&state).await?;
    Ok(Json(response))
}

/// Join the active set, or refresh the display name of a returning player.
#[utoipa::path(
    post,
    path = "/game/players",
    tag = "game",
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Player joined", body = PlayerSummary),
        (status = 409, description = "No joinable set")
    )
)]
pub async fn join(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinRequest>>,
) -> Result<Json<PlayerSummary>, AppError> {
    let summary = set_service::add_player(&state, payload).await?;
    Ok(Json(summary))
}

/// Leave the active set. The player's score entry survives in the standings.
#[utoipa::path(
    delete,
    path = "/game/players/{id}",
    tag = "game",
    params(("id" = String, Path, description = "Identifier of the player to remove")),
    responses(
        (status = 204, description = "Player removed"),
        (status = 404, description = "Player is not in the set")
    )
)]
pub async fn leave(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<axum::http::StatusCode, AppError> {
    set_service::remove_player(&state, &id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// Put the next question on screen and open the buzzers.
#[utoipa::path(
    post,
    path = "/game/question/start",
    tag = "game",
    responses(
        (status = 200, description = "Question live", body = StartQuestionResponse),
        (status = 409, description = "Not between questions")
    )
)]
pub async fn start_question(
    State(state): State<SharedState>,
) -> Result<Json<StartQuestionResponse>, AppError> {
    let response = set_service::start_question(&state).await?;
    Ok(Json(response))
}

/// Submit a buzz for the current question.
#[utoipa::path(
    post,
    path = "/game/buzz",
    tag = "game",
    request_body = BuzzRequest,
    responses(
        (status = 200, description = "Arbitration outcome; late buzzes are not errors", body = BuzzResponse),
        (status = 404, description = "Player is not in the set")
    )
)]
pub async fn submit_buzz(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<BuzzRequest>>,
) -> Result<Json<BuzzResponse>, AppError> {
    let response = set_service::submit_buzz(&state, payload).await?;
    Ok(Json(response))
}

/// Submit the buzz winner's answer.
#[utoipa::path(
    post,
    path = "/game/answer",
    tag = "game",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Settlement outcome; non-winner submissions are not errors", body = AnswerResponse)
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<AnswerRequest>>,
) -> Result<Json<AnswerResponse>, AppError> {
    let response = set_service::submit_answer(&state, payload).await?;
    Ok(Json(response))
}

/// Reveal the current question and advance the set.
#[utoipa::path(
    post,
    path = "/game/question/end",
    tag = "game",
    responses(
        (status = 200, description = "Question closed", body = EndQuestionResponse),
        (status = 409, description = "No question in play")
    )
)]
pub async fn end_question(
    State(state): State<SharedState>,
) -> Result<Json<EndQuestionResponse>, AppError> {
    let response = set_service::end_question(&state).await?;
    Ok(Json(response))
}

/// End the set: final standings, persisted outcomes, leaderboard updates.
/// Idempotent: ending with no active set is a successful no-op.
#[utoipa::path(
    post,
    path = "/game/set/end",
    tag = "game",
    responses(
        (status = 200, description = "Set ended (or nothing to end)", body = EndSetResponse)
    )
)]
pub async fn end_set(State(state): State<SharedState>) -> Result<Json<EndSetResponse>, AppError> {
    let response = set_service::end_set(&state).await?;
    Ok(Json(response))
}

/// Current phase snapshot and player roster.
#[utoipa::path(
    get,
    path = "/game/status",
    tag = "game",
    responses((status = 200, description = "Current status", body = StatusResponse))
)]
pub async fn status(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(set_service::get_status(&state).await)
}
