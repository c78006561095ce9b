use serde::{Deserialize, Serialize};

use crate::errors::{ErrorKind, PipelineError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub response: String,
    pub confidence: f64,
    pub action_tag: Option<String>,
}

/// Inbound call data. `user_id` and `session_id` are opaque pass-through
/// values; the pipeline only records them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub text: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl AgentRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub response: String,
    pub confidence: f64,
    pub success: bool,
    #[serde(rename = "intent")]
    pub intent_label: Option<String>,
    #[serde(rename = "action")]
    pub action_tag: Option<String>,
    pub processed_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl AgentResult {
    pub fn completed(
        action: ActionResult,
        intent_label: impl Into<String>,
        processed_text: impl Into<String>,
    ) -> Self {
        Self {
            response: action.response,
            confidence: action.confidence,
            success: true,
            intent_label: Some(intent_label.into()),
            action_tag: action.action_tag,
            processed_text: Some(processed_text.into()),
            error: None,
        }
    }

    /// Failure envelope. Carries only the error kind's safe summary; nothing
    /// computed by earlier stages leaks into it.
    pub fn errored(error: &PipelineError) -> Self {
        Self {
            response: error.user_message().to_string(),
            confidence: 0.0,
            success: false,
            intent_label: None,
            action_tag: None,
            processed_text: None,
            error: Some(error.kind()),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error
    }
}
