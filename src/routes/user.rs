use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::user::UserResponse, error::AppError, services::user_service, state::SharedState,
};

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "Identifier of the user")),
    responses(
        (status = 200, description = "User profile with stats and badges", body = UserResponse),
        (status = 404, description = "Unknown user")
    )
)]
/// Fetch a user profile: cumulative stats, streaks and earned badges.
pub async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let store = state.require_store().await?;
    let user = user_service::profile(store.as_ref(), &id).await?;
    Ok(Json(user.into()))
}

/// Configure the user routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/users/{id}", get(get_user))
}
