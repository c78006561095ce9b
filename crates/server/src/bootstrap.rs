use std::sync::Arc;

use parley_agent::{build_pipeline, AgentPipeline, BuildError};
use parley_core::config::{AppConfig, ConfigError};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub pipeline: Arc<AgentPipeline>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("agent pipeline setup failed: {0}")]
    Pipeline(#[from] BuildError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        classifier = config.classifier.provider.as_str(),
        "starting application bootstrap"
    );

    let pipeline = build_pipeline(&config).await?;
    info!(
        event_name = "system.bootstrap.pipeline_built",
        correlation_id = "bootstrap",
        intents = pipeline.list_intents().len(),
        model_loaded = pipeline.is_ready(),
        "agent pipeline ready to serve"
    );

    Ok(Application { config, pipeline: Arc::new(pipeline) })
}

#[cfg(test)]
mod tests {
    use parley_core::config::{AppConfig, ClassifierProvider, ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap_with_config, Application, BootstrapError};

    async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        bootstrap_with_config(AppConfig::load(options)?).await
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_remote_provider_without_endpoint() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                classifier_provider: Some(ClassifierProvider::Remote),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("classifier.endpoint"), "{message}");
    }

    #[tokio::test]
    async fn bootstrap_builds_the_builtin_keyword_pipeline() {
        let app = bootstrap(LoadOptions::default()).await.expect("bootstrap with defaults");

        assert!(app.pipeline.is_ready());
        assert_eq!(app.pipeline.list_intents().len(), 9);
        assert_eq!(app.config.server.port, 8000);
    }
}
