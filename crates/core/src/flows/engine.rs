use thiserror::Error;

use crate::flows::states::{RequestEvent, RequestState, StateTransition};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: RequestState, event: RequestEvent },
}

/// Transition table for a single pipeline request:
/// `Received → Perceived → Decided → Acted → Completed`, with `Errored`
/// reachable from every non-terminal state.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestFlow;

impl RequestFlow {
    pub fn new() -> Self {
        Self
    }

    pub fn initial_state(&self) -> RequestState {
        RequestState::Received
    }

    pub fn apply(
        &self,
        current: RequestState,
        event: RequestEvent,
    ) -> Result<StateTransition, FlowTransitionError> {
        use RequestEvent::{
            ActionExecuted, FeaturesExtracted, IntentDecided, ResultMerged, StageFailed,
        };
        use RequestState::{Acted, Completed, Decided, Errored, Perceived, Received};

        let to = match (current, event) {
            (Received, FeaturesExtracted) => Perceived,
            (Perceived, IntentDecided) => Decided,
            (Decided, ActionExecuted) => Acted,
            (Acted, ResultMerged) => Completed,
            (state, StageFailed(_)) if !state.is_terminal() => Errored,
            _ => return Err(FlowTransitionError::InvalidTransition { state: current, event }),
        };

        Ok(StateTransition { from: current, to, event })
    }
}
