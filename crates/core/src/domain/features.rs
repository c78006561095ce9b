use serde::{Deserialize, Serialize};

/// Normalized view of one input string, shared read-only by the decision and
/// action stages of a single request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub processed_text: String,
    pub tokens: Vec<String>,
    pub vector: Option<Vec<f32>>,
}

impl FeatureSet {
    pub fn new(processed_text: impl Into<String>, tokens: Vec<String>) -> Self {
        Self { processed_text: processed_text.into(), tokens, vector: None }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
