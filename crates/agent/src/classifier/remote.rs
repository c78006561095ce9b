use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parley_core::{FeatureSet, IntentId};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{Classification, Classifier, ClassifierError};

/// Classifier served by an external model over HTTP.
///
/// `POST {endpoint}/classify` receives the processed text and tokens and
/// answers with an intent id and confidence. Readiness comes from a
/// `GET {endpoint}/health` probe made by [`Classifier::load`].
pub struct RemoteClassifier {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    ready: AtomicBool,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
    tokens: &'a [String],
}

#[derive(Deserialize)]
struct ClassifyResponse {
    intent_id: u32,
    confidence: f64,
}

impl RemoteClassifier {
    pub fn new(endpoint: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            ready: AtomicBool::new(false),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(api_key) => request.bearer_auth(api_key.expose_secret()),
            None => request,
        }
    }
}

#[async_trait]
impl Classifier for RemoteClassifier {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn classify(&self, features: &FeatureSet) -> Result<Classification, ClassifierError> {
        if !self.is_ready() {
            return Err(ClassifierError::NotReady(format!("{} has not passed a health probe", self.endpoint)));
        }

        let body = ClassifyRequest { text: &features.processed_text, tokens: &features.tokens };
        let response = self
            .authorize(self.client.post(format!("{}/classify", self.endpoint)))
            .json(&body)
            .send()
            .await
            .map_err(|error| ClassifierError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Transport(format!("classify endpoint answered {status}")));
        }

        let payload: ClassifyResponse =
            response.json().await.map_err(|error| ClassifierError::Malformed(error.to_string()))?;

        Ok(Classification { intent_id: IntentId(payload.intent_id), confidence: payload.confidence })
    }

    async fn load(&self) -> Result<(), ClassifierError> {
        let response = self
            .authorize(self.client.get(format!("{}/health", self.endpoint)))
            .send()
            .await
            .map_err(|error| ClassifierError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            self.ready.store(false, Ordering::Release);
            return Err(ClassifierError::NotReady(format!("health probe answered {status}")));
        }

        self.ready.store(true, Ordering::Release);
        tracing::info!(
            event_name = "system.classifier.ready",
            endpoint = %self.endpoint,
            "remote classifier passed health probe"
        );
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for RemoteClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClassifier")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("ready", &self.is_ready())
            .finish()
    }
}
