use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use parley_agent::AgentPipeline;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    pipeline: Arc<AgentPipeline>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub model_loaded: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub classifier: HealthCheck,
    pub intents: usize,
    pub checked_at: String,
}

pub fn router(pipeline: Arc<AgentPipeline>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(HealthState { pipeline })
}

/// Liveness probe. Always 200 while the process is serving.
pub async fn root(State(state): State<HealthState>) -> Json<Liveness> {
    Json(Liveness { status: "healthy", model_loaded: state.pipeline.is_ready() })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let classifier = classifier_check(&state.pipeline);
    let ready = classifier.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "parley-server runtime initialized".to_string(),
        },
        classifier,
        intents: state.pipeline.list_intents().len(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn classifier_check(pipeline: &AgentPipeline) -> HealthCheck {
    let name = pipeline.decision().classifier().name();
    if pipeline.is_ready() {
        HealthCheck { status: "ready", detail: format!("{name} classifier loaded") }
    } else {
        HealthCheck { status: "degraded", detail: format!("{name} classifier has not finished loading") }
    }
}
