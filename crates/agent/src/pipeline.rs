use std::collections::BTreeMap;
use std::sync::Arc;

use parley_core::{
    AgentRequest, AgentResult, AuditContext, AuditEvent, AuditOutcome, AuditSink, ErrorKind,
    IntentId, PipelineError, RequestEvent, RequestFlow, RequestState, TracingAuditSink,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::action::ActionExecutor;
use crate::decision::DecisionEngine;
use crate::perception::FeatureExtractor;

const AUDIT_ACTOR: &str = "pipeline";

/// Perception → Decision → Action, with one [`AgentResult`] per request.
///
/// Holds no per-request state, so one instance is shared as
/// `Arc<AgentPipeline>` across tasks.
pub struct AgentPipeline {
    perception: Arc<dyn FeatureExtractor>,
    decision: DecisionEngine,
    action: Arc<dyn ActionExecutor>,
    audit: Arc<dyn AuditSink>,
    flow: RequestFlow,
}

struct Outcome {
    result: AgentResult,
    intent_id: IntentId,
    floored: bool,
}

impl AgentPipeline {
    pub fn new(
        perception: Arc<dyn FeatureExtractor>,
        decision: DecisionEngine,
        action: Arc<dyn ActionExecutor>,
    ) -> Self {
        Self {
            perception,
            decision,
            action,
            audit: Arc::new(TracingAuditSink),
            flow: RequestFlow::new(),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn decision(&self) -> &DecisionEngine {
        &self.decision
    }

    pub fn list_intents(&self) -> BTreeMap<IntentId, String> {
        self.decision.registry().snapshot()
    }

    pub fn is_ready(&self) -> bool {
        self.decision.is_ready()
    }

    pub async fn handle(&self, request: AgentRequest) -> AgentResult {
        self.handle_with_cancellation(request, CancellationToken::new()).await
    }

    /// Like [`handle`](Self::handle), but stops with `Cancelled` as soon as
    /// `cancel` fires. A classification that completes after cancellation is
    /// discarded.
    pub async fn handle_with_cancellation(
        &self,
        request: AgentRequest,
        cancel: CancellationToken,
    ) -> AgentResult {
        let correlation_id =
            request.correlation_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = tracing::info_span!(
            "pipeline.request",
            correlation_id = %correlation_id,
            user_id = request.user_id.as_deref().unwrap_or("-"),
            session_id = request.session_id.as_deref().unwrap_or("-"),
        );
        let context = AuditContext::new(
            correlation_id,
            request.user_id.clone(),
            request.session_id.clone(),
            AUDIT_ACTOR,
        );

        let mut state = self.flow.initial_state();
        let outcome = self.run(&request, &cancel, &mut state).instrument(span.clone()).await;
        let _entered = span.enter();

        match outcome {
            Ok(outcome) => {
                info!(
                    event_name = "pipeline.request.completed",
                    intent = outcome.result.intent_label.as_deref().unwrap_or_default(),
                    intent_id = outcome.intent_id.0,
                    floored = outcome.floored,
                    action = outcome.result.action_tag.as_deref().unwrap_or("none"),
                    confidence = outcome.result.confidence,
                    "request completed"
                );
                let mut event =
                    AuditEvent::new(&context, "pipeline.request.completed", AuditOutcome::Success)
                        .with_metadata("intent", outcome.result.intent_label.clone().unwrap_or_default())
                        .with_metadata("confidence", outcome.result.confidence.to_string());
                if let Some(action) = &outcome.result.action_tag {
                    event = event.with_metadata("action", action.clone());
                }
                self.audit.emit(event);
                outcome.result
            }
            Err(error) => {
                let failed_state = state;
                let kind = error.kind();
                state = self
                    .flow
                    .apply(state, RequestEvent::StageFailed(kind))
                    .map(|transition| transition.to)
                    .unwrap_or(RequestState::Errored);
                warn!(
                    event_name = "pipeline.request.errored",
                    error_kind = kind.as_str(),
                    failed_state = failed_state.as_str(),
                    state = state.as_str(),
                    error = %error,
                    "request failed"
                );
                let audit_outcome = match kind {
                    ErrorKind::InvalidInput | ErrorKind::Cancelled => AuditOutcome::Rejected,
                    _ => AuditOutcome::Failed,
                };
                self.audit.emit(
                    AuditEvent::new(&context, "pipeline.request.errored", audit_outcome)
                        .with_metadata("error_kind", kind.as_str())
                        .with_metadata("failed_state", failed_state.as_str()),
                );
                AgentResult::errored(&error)
            }
        }
    }

    async fn run(
        &self,
        request: &AgentRequest,
        cancel: &CancellationToken,
        state: &mut RequestState,
    ) -> Result<Outcome, PipelineError> {
        ensure_live(cancel)?;
        let text = intake(request)?;

        let features = self.perception.process(Some(text))?;
        self.advance(state, RequestEvent::FeaturesExtracted)?;

        ensure_live(cancel)?;
        let prediction = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            prediction = self.decision.predict_intent(&features) => prediction?,
        };
        ensure_live(cancel)?;
        let label = self.decision.label(prediction.intent_id)?.to_string();
        self.advance(state, RequestEvent::IntentDecided)?;

        ensure_live(cancel)?;
        let action = self.action.execute(&prediction, &features);
        if !(0.0..=1.0).contains(&action.confidence) {
            return Err(PipelineError::InternalFailure(format!(
                "action reported confidence {} outside [0, 1]",
                action.confidence
            )));
        }
        self.advance(state, RequestEvent::ActionExecuted)?;

        let result = AgentResult::completed(action, label, features.processed_text);
        self.advance(state, RequestEvent::ResultMerged)?;

        Ok(Outcome { result, intent_id: prediction.intent_id, floored: prediction.floored })
    }

    fn advance(&self, state: &mut RequestState, event: RequestEvent) -> Result<(), PipelineError> {
        *state = self.flow.apply(*state, event)?.to;
        Ok(())
    }
}

impl std::fmt::Debug for AgentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentPipeline").field("decision", &self.decision).finish_non_exhaustive()
    }
}

fn intake(request: &AgentRequest) -> Result<&str, PipelineError> {
    match request.text.as_deref() {
        None => Err(PipelineError::InvalidInput("request text is missing".to_string())),
        Some(text) if text.trim().is_empty() => {
            Err(PipelineError::InvalidInput("request text is empty".to_string()))
        }
        Some(text) => Ok(text),
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use parley_core::{AgentRequest, ErrorKind, PipelineError};

    use super::intake;

    #[test]
    fn intake_rejects_missing_and_blank_text() {
        let missing = intake(&AgentRequest::default()).expect_err("missing text");
        assert_eq!(missing.kind(), ErrorKind::InvalidInput);

        for blank in ["", "   ", "\n\t"] {
            let error = intake(&AgentRequest::text(blank)).expect_err("blank text");
            assert_eq!(error, PipelineError::InvalidInput("request text is empty".to_string()));
        }

        assert_eq!(intake(&AgentRequest::text(" hi ")), Ok(" hi "));
    }
}
