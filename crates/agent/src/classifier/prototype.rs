use async_trait::async_trait;
use parley_core::{FeatureSet, IntentId};

use super::{Classification, Classifier, ClassifierError};

/// Nearest-centroid matcher over the hashed feature vectors produced by
/// perception. Each intent's centroid is the normalized mean of its example
/// embeddings; confidence is the cosine similarity to the closest centroid.
#[derive(Clone, Debug)]
pub struct PrototypeClassifier {
    centroids: Vec<(IntentId, Vec<f32>)>,
    dims: usize,
    no_match: IntentId,
}

impl PrototypeClassifier {
    /// Builds centroids from `(intent, example embedding)` pairs. Examples for
    /// the same intent may appear in any order.
    pub fn from_examples<I>(examples: I, dims: usize, no_match: IntentId) -> Result<Self, ClassifierError>
    where
        I: IntoIterator<Item = (IntentId, Vec<f32>)>,
    {
        if dims == 0 {
            return Err(ClassifierError::Configuration(
                "prototype classifier needs embedding_dims > 0".to_string(),
            ));
        }

        let mut centroids: Vec<(IntentId, Vec<f32>)> = Vec::new();
        for (intent_id, embedding) in examples {
            if embedding.len() != dims {
                return Err(ClassifierError::Configuration(format!(
                    "example for intent {intent_id} has {} dims, expected {dims}",
                    embedding.len()
                )));
            }
            match centroids.iter_mut().find(|(id, _)| *id == intent_id) {
                Some((_, sum)) => {
                    for (total, value) in sum.iter_mut().zip(&embedding) {
                        *total += value;
                    }
                }
                None => centroids.push((intent_id, embedding)),
            }
        }

        centroids.retain_mut(|(_, sum)| normalize(sum));
        if centroids.is_empty() {
            return Err(ClassifierError::Configuration(
                "prototype classifier needs at least one non-empty example".to_string(),
            ));
        }

        Ok(Self { centroids, dims, no_match })
    }

    pub fn intents(&self) -> impl Iterator<Item = IntentId> + '_ {
        self.centroids.iter().map(|(id, _)| *id)
    }
}

#[async_trait]
impl Classifier for PrototypeClassifier {
    fn name(&self) -> &'static str {
        "prototype"
    }

    async fn classify(&self, features: &FeatureSet) -> Result<Classification, ClassifierError> {
        let vector = features.vector.as_ref().ok_or_else(|| {
            ClassifierError::NotReady("feature set carries no embedding".to_string())
        })?;
        if vector.len() != self.dims {
            return Err(ClassifierError::Malformed(format!(
                "embedding has {} dims, expected {}",
                vector.len(),
                self.dims
            )));
        }

        let mut best = Classification { intent_id: self.no_match, confidence: 0.0 };
        for (intent_id, centroid) in &self.centroids {
            let similarity = f64::from(dot(vector, centroid)).clamp(0.0, 1.0);
            if similarity > best.confidence {
                best = Classification { intent_id: *intent_id, confidence: similarity };
            }
        }
        Ok(best)
    }

    fn output_domain(&self) -> Option<Vec<IntentId>> {
        let mut domain = self.intents().collect::<Vec<_>>();
        domain.push(self.no_match);
        domain.sort();
        domain.dedup();
        Some(domain)
    }
}

fn dot(left: &[f32], right: &[f32]) -> f32 {
    left.iter().zip(right).map(|(a, b)| a * b).sum()
}

/// Scales to unit length; false when the vector is all zeros.
fn normalize(vector: &mut [f32]) -> bool {
    let norm = dot(vector, vector).sqrt();
    if norm <= f32::EPSILON {
        return false;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
    true
}
