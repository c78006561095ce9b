//! Pluggable intent classification.
//!
//! The decision stage only ever sees `Arc<dyn Classifier>`. Three variants ship
//! with the crate: a rule-based keyword matcher, a prototype (centroid)
//! matcher over hashed feature vectors, and an HTTP-backed remote model.

mod keyword;
mod prototype;
mod remote;

pub use keyword::{KeywordClassifier, KeywordRule};
pub use prototype::PrototypeClassifier;
pub use remote::RemoteClassifier;

use async_trait::async_trait;
use parley_core::{FeatureSet, IntentId, PipelineError};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub intent_id: IntentId,
    pub confidence: f64,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier is not ready: {0}")]
    NotReady(String),
    #[error("classifier configuration is invalid: {0}")]
    Configuration(String),
    #[error("classifier transport failed: {0}")]
    Transport(String),
    #[error("classifier returned malformed output: {0}")]
    Malformed(String),
}

impl From<ClassifierError> for PipelineError {
    fn from(value: ClassifierError) -> Self {
        PipelineError::InternalFailure(value.to_string())
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn classify(&self, features: &FeatureSet) -> Result<Classification, ClassifierError>;

    /// Finishes any deferred loading. Called once at startup.
    async fn load(&self) -> Result<(), ClassifierError> {
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }

    /// Whether `classify` may run concurrently with itself.
    fn is_reentrant(&self) -> bool {
        true
    }

    /// Every id this classifier can emit, when that set is known up front.
    fn output_domain(&self) -> Option<Vec<IntentId>> {
        None
    }
}
