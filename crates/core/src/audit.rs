use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub correlation_id: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub actor: String,
}

impl AuditContext {
    pub fn new(
        correlation_id: impl Into<String>,
        user_id: Option<String>,
        session_id: Option<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self { correlation_id: correlation_id.into(), user_id, session_id, actor: actor.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub correlation_id: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub event_type: String,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(context: &AuditContext, event_type: impl Into<String>, outcome: AuditOutcome) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            correlation_id: context.correlation_id.clone(),
            user_id: context.user_id.clone(),
            session_id: context.session_id.clone(),
            event_type: event_type.into(),
            actor: context.actor.clone(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Writes audit events to the `tracing` pipeline at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        tracing::info!(
            target: "parley::audit",
            event_name = %event.event_type,
            event_id = %event.event_id,
            correlation_id = %event.correlation_id,
            outcome = ?event.outcome,
            actor = %event.actor,
            metadata = %metadata,
            "audit event recorded"
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};

    #[test]
    fn in_memory_sink_records_events_with_correlation_fields() {
        let sink = InMemoryAuditSink::default();
        let context = AuditContext::new(
            "req-123",
            Some("web-user".to_owned()),
            Some("web-session-1".to_owned()),
            "pipeline",
        );
        sink.emit(
            AuditEvent::new(&context, "pipeline.request.completed", AuditOutcome::Success)
                .with_metadata("intent", "greeting")
                .with_metadata("action", "greet_user"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-123");
        assert_eq!(events[0].user_id.as_deref(), Some("web-user"));
        assert_eq!(events[0].session_id.as_deref(), Some("web-session-1"));
        assert_eq!(events[0].metadata.get("intent").map(String::as_str), Some("greeting"));
    }

    #[test]
    fn cloned_sinks_share_the_same_buffer() {
        let sink = InMemoryAuditSink::default();
        let clone = sink.clone();
        let context = AuditContext::new("req-9", None, None, "pipeline");

        clone.emit(AuditEvent::new(&context, "pipeline.request.errored", AuditOutcome::Failed));

        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.events()[0].outcome, AuditOutcome::Failed);
    }
}
