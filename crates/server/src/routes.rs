use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::HeaderName, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parley_agent::AgentPipeline;
use parley_core::{AgentRequest, AgentResult, InterfaceError};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;
use uuid::Uuid;

use crate::health;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    pipeline: Arc<AgentPipeline>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub input_text: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub response: String,
    pub confidence: f64,
    pub success: bool,
    pub intent: Option<String>,
    pub action: Option<String>,
    pub processed_text: Option<String>,
}

impl From<AgentResult> for AgentResponse {
    fn from(result: AgentResult) -> Self {
        Self {
            response: result.response,
            confidence: result.confidence,
            success: result.success,
            intent: result.intent_label,
            action: result.action_tag,
            processed_text: result.processed_text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentsResponse {
    pub intents: BTreeMap<String, String>,
}

/// Full HTTP surface: liveness, readiness, processing, and intent listing,
/// with CORS restricted to `allowed_origins`.
pub fn router(pipeline: Arc<AgentPipeline>, allowed_origins: &[String]) -> Router {
    let api = Router::new()
        .route("/process", post(process))
        .route("/intents", get(intents))
        .with_state(ApiState { pipeline: Arc::clone(&pipeline) });

    api.merge(health::router(pipeline)).layer(cors_layer(allowed_origins))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(
                    event_name = "system.server.cors_origin_skipped",
                    origin = %origin,
                    error = %error,
                    "ignoring unparseable CORS origin"
                );
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            HeaderName::from_static(CORRELATION_HEADER),
        ])
        .expose_headers([HeaderName::from_static(CORRELATION_HEADER)])
}

pub async fn process(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<ProcessRequest>,
) -> Response {
    let correlation_id = correlation_id(&headers);
    let request = AgentRequest {
        text: payload.input_text,
        user_id: payload.user_id,
        session_id: payload.session_id,
        correlation_id: Some(correlation_id.clone()),
    };

    let result = state.pipeline.handle(request).await;
    let status = match result.error_kind() {
        None => StatusCode::OK,
        Some(kind) => {
            let failure = InterfaceError::new(kind, correlation_id.as_str());
            warn!(
                event_name = "api.process.failed",
                correlation_id = failure.correlation_id(),
                error = %failure,
                "process request failed"
            );
            status_for(&failure)
        }
    };

    let mut response = (status, Json(AgentResponse::from(result))).into_response();
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(HeaderName::from_static(CORRELATION_HEADER), value);
    }
    response
}

pub async fn intents(State(state): State<ApiState>) -> Json<IntentsResponse> {
    let intents = state
        .pipeline
        .list_intents()
        .into_iter()
        .map(|(id, label)| (id.to_string(), label))
        .collect();
    Json(IntentsResponse { intents })
}

fn status_for(failure: &InterfaceError) -> StatusCode {
    match failure {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Honors a caller-supplied id when it is a short printable token.
fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use parley_agent::build_pipeline;
    use parley_core::config::AppConfig;
    use serde_json::Value;
    use tower::ServiceExt;

    use parley_core::{ErrorKind, InterfaceError};

    use crate::routes::{router, status_for, AgentResponse, CORRELATION_HEADER};

    async fn app() -> Router {
        let config = AppConfig::default();
        let pipeline = build_pipeline(&config).await.expect("pipeline");
        router(Arc::new(pipeline), &config.server.allowed_origins)
    }

    fn post_process(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/process")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn process_returns_greeting_and_echoes_correlation_id() {
        let mut request = post_process(r#"{"input_text":"Hello there","user_id":"web-user"}"#);
        request.headers_mut().insert(CORRELATION_HEADER, "req-42".parse().expect("header"));

        let response = app().await.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CORRELATION_HEADER).and_then(|value| value.to_str().ok()),
            Some("req-42")
        );

        let payload: AgentResponse =
            serde_json::from_value(json_body(response).await).expect("agent response");
        assert!(payload.success);
        assert_eq!(payload.intent.as_deref(), Some("greeting"));
        assert_eq!(payload.processed_text.as_deref(), Some("hello there"));
    }

    #[tokio::test]
    async fn blank_text_is_a_bad_request_with_generated_correlation_id() {
        let response = app().await.oneshot(post_process(r#"{"input_text":"   "}"#)).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().contains_key(CORRELATION_HEADER));
        let payload = json_body(response).await;
        assert_eq!(payload["success"], false);
        assert_eq!(payload["intent"], Value::Null);
    }

    #[tokio::test]
    async fn failed_request_keeps_the_caller_correlation_id() {
        let mut request = post_process(r#"{"user_id":"web-user"}"#);
        request.headers_mut().insert(CORRELATION_HEADER, "req-missing-text".parse().expect("header"));

        let response = app().await.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(CORRELATION_HEADER).and_then(|value| value.to_str().ok()),
            Some("req-missing-text")
        );
    }

    #[test]
    fn error_kinds_map_to_status_by_interface_class() {
        let cases = [
            (ErrorKind::InvalidInput, StatusCode::BAD_REQUEST),
            (ErrorKind::Timeout, StatusCode::SERVICE_UNAVAILABLE),
            (ErrorKind::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (ErrorKind::UnknownIntent, StatusCode::INTERNAL_SERVER_ERROR),
            (ErrorKind::InternalFailure, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, expected) in cases {
            let failure = InterfaceError::new(kind, "req-7");
            assert_eq!(failure.correlation_id(), "req-7");
            assert_eq!(status_for(&failure), expected, "{kind:?}");
        }
    }

    #[tokio::test]
    async fn intents_lists_labels_by_id() {
        let request = Request::builder().uri("/intents").body(Body::empty()).expect("request");
        let response = app().await.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["intents"]["0"], "greeting");
        assert_eq!(payload["intents"]["8"], "unknown");
    }

    #[tokio::test]
    async fn root_reports_model_loaded() {
        let request = Request::builder().uri("/").body(Body::empty()).expect("request");
        let response = app().await.oneshot(request).await.expect("response");

        let payload = json_body(response).await;
        assert_eq!(payload["status"], "healthy");
        assert_eq!(payload["model_loaded"], true);
    }

    #[tokio::test]
    async fn cors_allows_configured_origin_only() {
        let allowed = Request::builder()
            .uri("/")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .expect("request");
        let response = app().await.oneshot(allowed).await.expect("response");
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).and_then(|v| v.to_str().ok()),
            Some("http://localhost:3000")
        );

        let denied = Request::builder()
            .uri("/")
            .header(header::ORIGIN, "http://evil.example")
            .body(Body::empty())
            .expect("request");
        let response = app().await.oneshot(denied).await.expect("response");
        assert!(!response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
