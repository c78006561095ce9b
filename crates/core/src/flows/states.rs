use serde::{Deserialize, Serialize};

use crate::errors::ErrorKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestState {
    Received,
    Perceived,
    Decided,
    Acted,
    Completed,
    Errored,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Errored)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Perceived => "perceived",
            Self::Decided => "decided",
            Self::Acted => "acted",
            Self::Completed => "completed",
            Self::Errored => "errored",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestEvent {
    FeaturesExtracted,
    IntentDecided,
    ActionExecuted,
    ResultMerged,
    StageFailed(ErrorKind),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: RequestState,
    pub to: RequestState,
    pub event: RequestEvent,
}
