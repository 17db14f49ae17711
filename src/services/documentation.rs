use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Arena Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::events_stream,
        crate::routes::game::start_set,
        crate::routes::game::end_set,
        crate::routes::game::join,
        crate::routes::game::leave,
        crate::routes::game::start_question,
        crate::routes::game::end_question,
        crate::routes::game::submit_buzz,
        crate::routes::game::submit_answer,
        crate::routes::game::status,
        crate::routes::leaderboard::get_leaderboard,
        crate::routes::user::get_user,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::game::JoinRequest,
            crate::dto::game::BuzzRequest,
            crate::dto::game::AnswerRequest,
            crate::dto::game::StartSetResponse,
            crate::dto::game::StartQuestionResponse,
            crate::dto::game::BuzzResponse,
            crate::dto::game::AnswerResponse,
            crate::dto::game::EndQuestionResponse,
            crate::dto::game::EndSetResponse,
            crate::dto::game::StatusResponse,
            crate::dto::game::PlayerSummary,
            crate::dto::game::QuestionPublic,
            crate::dto::common::PhaseSnapshot,
            crate::dto::phase::VisiblePhase,
            crate::dto::leaderboard::LeaderboardResponse,
            crate::dto::leaderboard::LeaderboardEntryDto,
            crate::dto::user::UserResponse,
            crate::dto::user::UserStatsDto,
            crate::dto::user::EarnedBadgeDto,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events stream"),
        (name = "game", description = "Set lifecycle and in-set play"),
        (name = "leaderboards", description = "Periodic and per-set leaderboards"),
        (name = "users", description = "User profiles, stats and badges"),
    )
)]
pub struct ApiDoc;
