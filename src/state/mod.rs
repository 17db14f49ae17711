//! Shared application state: the single active session, the question
//! lifecycle state machine, the storage slot, and the broadcast hub.

pub mod score_ledger;
pub mod session;
mod sse;
pub mod state_machine;
pub mod transitions;

use std::{sync::Arc, time::Duration};

use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::timeout;
use tracing::warn;

use crate::{
    config::AppConfig,
    dao::QuizStore,
    error::ServiceError,
    state::{session::QuizSession, state_machine::SetPhase},
};

pub use self::sse::SseHub;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};
use self::state_machine::{SetEvent, SetStateMachine};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Upper bound on the time a single transition may spend in its work closure.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Central application state storing the active session and database handles.
pub struct AppState {
    config: Arc<AppConfig>,
    store: RwLock<Option<Arc<dyn QuizStore>>>,
    events: SseHub,
    machine: RwLock<SetStateMachine>,
    session: RwLock<Option<QuizSession>>,
    degraded: watch::Sender<bool>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config: Arc::new(config),
            store: RwLock::new(None),
            events: SseHub::new(16),
            machine: RwLock::new(SetStateMachine::new()),
            session: RwLock::new(None),
            degraded: degraded_tx,
            transition_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        })
    }

    /// Immutable quiz rule configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn QuizStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the store or fail with a degraded-mode error.
    pub async fn require_store(&self) -> Result<Arc<dyn QuizStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn QuizStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        if *self.degraded.borrow() == value {
            return;
        }

        let _ = self.degraded.send(value);
    }

    /// Broadcast hub used for the session event stream.
    pub fn events(&self) -> &SseHub {
        &self.events
    }

    /// Snapshot the current phase of the shared state machine.
    pub async fn phase(&self) -> SetPhase {
        self.machine.read().await.phase()
    }

    /// Create a snapshot of the shared state machine.
    pub async fn snapshot(&self) -> Snapshot {
        let sm = self.machine.read().await;
        sm.snapshot()
    }

    /// Run a read-only closure against the session slot.
    pub async fn read_session<F, T>(&self, f: F) -> T
    where
        F: FnOnce(Option<&QuizSession>) -> T,
    {
        let guard = self.session.read().await;
        f(guard.as_ref())
    }

    /// Run a closure against the active session, failing when none exists.
    pub async fn with_session<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&QuizSession) -> Result<T, ServiceError>,
    {
        let guard = self.session.read().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| ServiceError::InvalidState("no active set".into()))?;
        f(session)
    }

    /// Run a mutating closure against the active session, failing when none exists.
    pub async fn with_session_mut<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut QuizSession) -> Result<T, ServiceError>,
    {
        let mut guard = self.session.write().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| ServiceError::InvalidState("no active set".into()))?;
        f(session)
    }

    /// Run a closure against the raw session slot (install or clear).
    pub async fn with_session_slot_mut<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut Option<QuizSession>) -> T,
    {
        let mut guard = self.session.write().await;
        f(&mut guard)
    }

    /// Plan a transition on the shared state machine, returning the plan.
    async fn plan_transition(&self, event: SetEvent) -> Result<Plan, PlanError> {
        let mut sm = self.machine.write().await;
        sm.plan(event)
    }

    /// Apply the planned transition to the shared state machine, returning the next phase.
    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<SetPhase, ApplyError> {
        let mut sm = self.machine.write().await;
        sm.apply(plan_id)
    }

    /// Abort a planned transition of the shared state machine.
    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.machine.write().await;
        sm.abort(plan_id)
    }

    /// Run `work` under the single-transition-at-a-time gate: the transition
    /// is planned first, the in-memory work executes, and the phase change is
    /// committed only when the work succeeds. Side effects (persistence,
    /// broadcast) belong after the commit, never inside `work`.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: SetEvent,
        work: F,
    ) -> Result<(T, SetPhase), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let Plan { id: plan_id, .. } = self.plan_transition(event.clone()).await?;

        let work_future = work();
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                drop(gate);
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}
