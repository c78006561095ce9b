use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::intent::IntentId;
use crate::flows::FlowTransitionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    UnknownIntent,
    Timeout,
    Cancelled,
    InternalFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::UnknownIntent => "unknown_intent",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::InternalFailure => "internal_failure",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("intent {0} has no registry entry")]
    UnknownIntent(IntentId),
    #[error("classification exceeded its {timeout_ms}ms deadline")]
    Timeout { timeout_ms: u64 },
    #[error("request was cancelled by the caller")]
    Cancelled,
    #[error("internal failure: {0}")]
    InternalFailure(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::UnknownIntent(_) => ErrorKind::UnknownIntent,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InternalFailure(_) => ErrorKind::InternalFailure,
        }
    }

    /// Summary safe to hand to an end user. Never includes the error detail.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidInput => {
                "I couldn't read that request. Please send some text and try again."
            }
            ErrorKind::UnknownIntent => {
                "I understood something I'm not configured to handle. Please try rephrasing."
            }
            ErrorKind::Timeout => "I took too long to think about that. Please try again shortly.",
            ErrorKind::Cancelled => "The request was cancelled before it finished.",
            ErrorKind::InternalFailure => "Something went wrong while processing your request.",
        }
    }
}

impl From<FlowTransitionError> for PipelineError {
    fn from(value: FlowTransitionError) -> Self {
        Self::InternalFailure(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Maps a pipeline error kind to its transport class for one request.
    pub fn new(kind: ErrorKind, correlation_id: impl Into<String>) -> Self {
        let message = kind.as_str().to_owned();
        let correlation_id = correlation_id.into();
        match kind {
            ErrorKind::InvalidInput => Self::BadRequest { message, correlation_id },
            ErrorKind::Timeout | ErrorKind::Cancelled => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ErrorKind::UnknownIntent | ErrorKind::InternalFailure => {
                Self::Internal { message, correlation_id }
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}
