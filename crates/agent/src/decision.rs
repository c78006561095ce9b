use std::sync::Arc;
use std::time::Duration;

use parley_core::{FeatureSet, IntentId, IntentRegistry, PipelineError, Prediction};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::classifier::Classifier;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfidencePolicy {
    pub floor: f64,
}

impl ConfidencePolicy {
    /// Replaces a below-floor choice with `unknown`, keeping the raw score.
    pub fn apply(&self, intent_id: IntentId, confidence: f64, unknown: IntentId) -> Prediction {
        if confidence < self.floor && intent_id != unknown {
            return Prediction { intent_id: unknown, confidence, floored: true };
        }
        Prediction::new(intent_id, confidence)
    }
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self { floor: 0.35 }
    }
}

/// Second pipeline stage: wraps a [`Classifier`] with the registry check,
/// the confidence floor, and the inference deadline.
pub struct DecisionEngine {
    classifier: Arc<dyn Classifier>,
    registry: Arc<IntentRegistry>,
    policy: ConfidencePolicy,
    timeout: Duration,
    inference_gate: Option<Mutex<()>>,
}

impl DecisionEngine {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        registry: Arc<IntentRegistry>,
        policy: ConfidencePolicy,
        timeout: Duration,
    ) -> Self {
        let inference_gate = (!classifier.is_reentrant()).then(|| Mutex::new(()));
        Self { classifier, registry, policy, timeout, inference_gate }
    }

    /// Forces one inference at a time even for a reentrant classifier.
    pub fn with_serialized_inference(mut self) -> Self {
        self.inference_gate.get_or_insert_with(|| Mutex::new(()));
        self
    }

    pub fn registry(&self) -> &IntentRegistry {
        &self.registry
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.classifier.is_ready()
    }

    pub async fn predict_intent(&self, features: &FeatureSet) -> Result<Prediction, PipelineError> {
        let inference = async {
            if !self.classifier.is_ready() {
                self.reload().await?;
            }
            let _permit = match &self.inference_gate {
                Some(gate) => Some(gate.lock().await),
                None => None,
            };
            self.classifier.classify(features).await.map_err(PipelineError::from)
        };
        let classification = tokio::time::timeout(self.timeout, inference)
            .await
            .map_err(|_| PipelineError::Timeout { timeout_ms: self.timeout_ms() })??;

        let confidence = classification.confidence;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(PipelineError::InternalFailure(format!(
                "{} classifier reported confidence {confidence} outside [0, 1]",
                self.classifier.name()
            )));
        }
        if !self.registry.contains(classification.intent_id) {
            return Err(PipelineError::UnknownIntent(classification.intent_id));
        }

        Ok(self.policy.apply(classification.intent_id, confidence, self.registry.unknown_id()))
    }

    /// Retries a classifier that was not ready at startup, so a model that
    /// comes up later is picked up on the next request.
    async fn reload(&self) -> Result<(), PipelineError> {
        let name = self.classifier.name();
        match self.classifier.load().await {
            Ok(()) if self.classifier.is_ready() => {
                info!(event_name = "system.classifier.recovered", classifier = name, "classifier became ready");
                Ok(())
            }
            Ok(()) => Err(PipelineError::InternalFailure(format!("{name} classifier is not ready"))),
            Err(error) => {
                warn!(
                    event_name = "system.classifier.reload_failed",
                    classifier = name,
                    error = %error,
                    "classifier is still not ready"
                );
                Err(PipelineError::InternalFailure(format!("{name} classifier is not ready: {error}")))
            }
        }
    }

    pub fn label(&self, intent_id: IntentId) -> Result<&str, PipelineError> {
        self.registry.label(intent_id)
    }

    /// Checks that every id the classifier can emit has a registry entry.
    /// Classifiers without a declared domain are checked per request instead.
    pub fn verify_coverage(&self) -> Result<(), PipelineError> {
        let Some(domain) = self.classifier.output_domain() else {
            return Ok(());
        };
        match domain.into_iter().find(|id| !self.registry.contains(*id)) {
            Some(uncovered) => Err(PipelineError::UnknownIntent(uncovered)),
            None => Ok(()),
        }
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("classifier", &self.classifier.name())
            .field("intents", &self.registry.len())
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .field("serialized", &self.inference_gate.is_some())
            .finish()
    }
}
