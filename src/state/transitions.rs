//! Helper wiring phase transitions to the event stream.

use crate::{
    error::ServiceError,
    services::sse_events,
    state::{SharedState, state_machine::SetEvent, state_machine::SetPhase},
};

/// Run a transition through [`AppState::run_transition`] and broadcast the
/// resulting phase change to every subscriber once it is committed.
///
/// [`AppState::run_transition`]: crate::state::AppState::run_transition
pub async fn run_transition_with_broadcast<F, Fut, T>(
    state: &SharedState,
    event: SetEvent,
    work: F,
) -> Result<(T, SetPhase), ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, ServiceError>>,
{
    let (value, next) = state.run_transition(event, work).await?;
    sse_events::broadcast_phase_changed(state, &next).await;
    Ok((value, next))
}
