use std::sync::Arc;

use parley_core::config::{AppConfig, ClassifierProvider};
use parley_core::PipelineError;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::{CatalogError, IntentCatalog};
use crate::classifier::{Classifier, ClassifierError, RemoteClassifier};
use crate::decision::{ConfidencePolicy, DecisionEngine};
use crate::perception::{PerceptionSettings, TextPerception};
use crate::pipeline::AgentPipeline;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("classifier setup failed: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("classifier output is not covered by the intent registry: {0}")]
    Coverage(PipelineError),
}

/// Builds the pipeline described by `config`, loading the catalog it names.
pub async fn build_pipeline(config: &AppConfig) -> Result<AgentPipeline, BuildError> {
    let catalog = IntentCatalog::resolve(config.catalog.path.as_deref())?;
    build_pipeline_with_catalog(config, &catalog).await
}

/// A classifier that fails to load does not abort the build; the pipeline
/// reports not-ready and requests fail until it recovers.
pub async fn build_pipeline_with_catalog(
    config: &AppConfig,
    catalog: &IntentCatalog,
) -> Result<AgentPipeline, BuildError> {
    let perception =
        TextPerception::new(PerceptionSettings { embedding_dims: config.pipeline.embedding_dims });
    let classifier = build_classifier(config, catalog, &perception)?;

    if let Err(error) = classifier.load().await {
        warn!(
            event_name = "system.bootstrap.classifier_unready",
            classifier = classifier.name(),
            error = %error,
            "classifier failed to load"
        );
    }

    let mut decision = DecisionEngine::new(
        Arc::clone(&classifier),
        catalog.registry(),
        ConfidencePolicy { floor: config.pipeline.confidence_floor },
        config.pipeline.classify_timeout(),
    );
    if config.classifier.serialize_inference {
        decision = decision.with_serialized_inference();
    }
    decision.verify_coverage().map_err(BuildError::Coverage)?;

    let action =
        catalog.action_table(&config.pipeline.fallback_response, config.pipeline.fallback_confidence);

    info!(
        event_name = "system.bootstrap.pipeline_ready",
        classifier = classifier.name(),
        catalog = catalog.origin(),
        intents = catalog.registry().len(),
        ready = classifier.is_ready(),
        "agent pipeline assembled"
    );

    Ok(AgentPipeline::new(Arc::new(perception), decision, Arc::new(action)))
}

pub fn build_classifier(
    config: &AppConfig,
    catalog: &IntentCatalog,
    perception: &TextPerception,
) -> Result<Arc<dyn Classifier>, ClassifierError> {
    let classifier: Arc<dyn Classifier> = match config.classifier.provider {
        ClassifierProvider::Keyword => Arc::new(catalog.keyword_classifier()),
        ClassifierProvider::Prototype => Arc::new(catalog.prototype_classifier(perception)?),
        ClassifierProvider::Remote => {
            let endpoint = config.classifier.endpoint.as_deref().ok_or_else(|| {
                ClassifierError::Configuration("remote classifier needs an endpoint".to_string())
            })?;
            let api_key = config
                .classifier
                .api_key
                .as_ref()
                .map(|key| SecretString::from(key.expose_secret().to_string()));
            Arc::new(RemoteClassifier::new(endpoint, api_key))
        }
    };
    Ok(classifier)
}
