//! Question-lifecycle state machine shared by every concurrent request handler.

use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

/// Phases a quiz set moves through, from idle to the final standings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetPhase {
    /// No set is currently running.
    Idle,
    /// A set exists; players can join and the next question can start.
    Forming,
    /// The current question is on screen and buzzes are accepted.
    QuestionActive,
    /// A buzz winner exists and owns the answer window.
    AnswerWindow,
    /// The answer has been settled; waiting for the reveal.
    QuestionSettled,
    /// All questions consumed; final standings are being computed.
    SessionEnding,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetEvent {
    /// A new set was created with its reserved questions.
    SetStarted,
    /// The next question goes live, buzzers open.
    QuestionStarted,
    /// A buzz won the arbitration (id identifies the winning player).
    BuzzAccepted {
        /// Identifier of the player who buzzed first.
        player_id: String,
    },
    /// The buzz winner's answer was validated and scored.
    AnswerSettled,
    /// The current question was revealed and more questions remain.
    QuestionEnded,
    /// The current question was revealed and the set is exhausted.
    QuestionsExhausted,
    /// The set is over; standings computed, state cleared.
    SetEnded,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SetPhase,
    /// The event that cannot be applied from this phase.
    pub event: SetEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: SetPhase,
        /// Current phase.
        actual: SetPhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: SetPhase,
    /// Phase the state machine will transition to.
    pub to: SetPhase,
    /// Event that triggered this transition.
    pub event: SetEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: SetPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<SetPhase>,
}

/// State machine implementing the question lifecycle of a quiz set.
#[derive(Debug, Clone)]
pub struct SetStateMachine {
    phase: SetPhase,
    version: usize,
    pending: Option<Plan>,
}

impl Default for SetStateMachine {
    fn default() -> Self {
        Self {
            phase: SetPhase::Idle,
            version: 0,
            pending: None,
        }
    }
}

impl SetStateMachine {
    /// Create a new state machine initialised in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SetPhase {
        self.phase.clone()
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase.clone(),
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to.clone()),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: SetEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event.clone())
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase.clone(),
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<SetPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase.clone(),
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;
        self.pending = None;

        Ok(self.phase.clone())
    }

    /// Abort a planned transition without applying it, returning the state machine to its previous state.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: SetEvent) -> Result<SetPhase, InvalidTransition> {
        let next = match (self.phase.clone(), event) {
            (SetPhase::Idle, SetEvent::SetStarted) => SetPhase::Forming,
            (SetPhase::Forming | SetPhase::QuestionSettled, SetEvent::QuestionStarted) => {
                SetPhase::QuestionActive
            }
            (SetPhase::QuestionActive, SetEvent::BuzzAccepted { .. }) => SetPhase::AnswerWindow,
            (SetPhase::AnswerWindow, SetEvent::AnswerSettled) => SetPhase::QuestionSettled,
            (
                SetPhase::QuestionActive | SetPhase::AnswerWindow | SetPhase::QuestionSettled,
                SetEvent::QuestionEnded,
            ) => SetPhase::Forming,
            (
                SetPhase::Forming
                | SetPhase::QuestionActive
                | SetPhase::AnswerWindow
                | SetPhase::QuestionSettled,
                SetEvent::QuestionsExhausted,
            ) => SetPhase::SessionEnding,
            (from, SetEvent::SetEnded) if from != SetPhase::Idle => SetPhase::Idle,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut SetStateMachine, event: SetEvent) -> SetPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_idle() {
        let sm = SetStateMachine::new();
        assert_eq!(sm.phase(), SetPhase::Idle);
    }

    #[test]
    fn full_happy_path_through_set() {
        let mut sm = SetStateMachine::new();

        assert_eq!(apply(&mut sm, SetEvent::SetStarted), SetPhase::Forming);
        assert_eq!(
            apply(&mut sm, SetEvent::QuestionStarted),
            SetPhase::QuestionActive
        );
        assert_eq!(
            apply(
                &mut sm,
                SetEvent::BuzzAccepted {
                    player_id: "player-1".into()
                }
            ),
            SetPhase::AnswerWindow
        );
        assert_eq!(
            apply(&mut sm, SetEvent::AnswerSettled),
            SetPhase::QuestionSettled
        );
        assert_eq!(apply(&mut sm, SetEvent::QuestionEnded), SetPhase::Forming);
        assert_eq!(
            apply(&mut sm, SetEvent::QuestionStarted),
            SetPhase::QuestionActive
        );
        assert_eq!(
            apply(&mut sm, SetEvent::QuestionsExhausted),
            SetPhase::SessionEnding
        );
        assert_eq!(apply(&mut sm, SetEvent::SetEnded), SetPhase::Idle);
    }

    #[test]
    fn unanswered_question_can_end_from_active() {
        let mut sm = SetStateMachine::new();
        apply(&mut sm, SetEvent::SetStarted);
        apply(&mut sm, SetEvent::QuestionStarted);
        assert_eq!(apply(&mut sm, SetEvent::QuestionEnded), SetPhase::Forming);
    }

    #[test]
    fn timed_out_answer_window_can_end() {
        let mut sm = SetStateMachine::new();
        apply(&mut sm, SetEvent::SetStarted);
        apply(&mut sm, SetEvent::QuestionStarted);
        apply(
            &mut sm,
            SetEvent::BuzzAccepted {
                player_id: "player-2".into(),
            },
        );
        assert_eq!(apply(&mut sm, SetEvent::QuestionEnded), SetPhase::Forming);
    }

    #[test]
    fn buzz_event_carries_winner_id() {
        let mut sm = SetStateMachine::new();
        apply(&mut sm, SetEvent::SetStarted);
        apply(&mut sm, SetEvent::QuestionStarted);

        let plan = sm
            .plan(SetEvent::BuzzAccepted {
                player_id: "player-7".into(),
            })
            .unwrap();
        match &plan.event {
            SetEvent::BuzzAccepted { player_id } => assert_eq!(player_id, "player-7"),
            other => panic!("expected buzz event, got {other:?}"),
        }
        assert_eq!(sm.apply(plan.id).unwrap(), SetPhase::AnswerWindow);
    }

    #[test]
    fn set_can_end_early_from_any_running_phase() {
        let mut sm = SetStateMachine::new();
        apply(&mut sm, SetEvent::SetStarted);
        apply(&mut sm, SetEvent::QuestionStarted);
        assert_eq!(apply(&mut sm, SetEvent::SetEnded), SetPhase::Idle);
    }

    #[test]
    fn buzz_rejected_outside_active_question() {
        let mut sm = SetStateMachine::new();
        apply(&mut sm, SetEvent::SetStarted);

        let err = sm
            .plan(SetEvent::BuzzAccepted {
                player_id: "player-1".into(),
            })
            .unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, SetPhase::Forming);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = SetStateMachine::new();
        let err = sm.plan(SetEvent::QuestionStarted).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, SetPhase::Idle);
                assert_eq!(invalid.event, SetEvent::QuestionStarted);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn second_plan_is_rejected_while_pending() {
        let mut sm = SetStateMachine::new();
        let _plan = sm.plan(SetEvent::SetStarted).unwrap();
        assert_eq!(
            sm.plan(SetEvent::SetStarted).unwrap_err(),
            PlanError::AlreadyPending
        );
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = SetStateMachine::new();
        let plan = sm.plan(SetEvent::SetStarted).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.snapshot().pending.is_none());
        assert_eq!(sm.phase(), SetPhase::Idle);
    }
}
