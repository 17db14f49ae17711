//! Health reporting backed by the degraded-mode flag.

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report the current health of the backend.
pub async fn health(state: &SharedState) -> HealthResponse {
    if state.is_degraded().await {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}
