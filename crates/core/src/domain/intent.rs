use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntentId(pub u32);

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for IntentId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// The decided intent together with the confidence that produced it.
///
/// `floored` is set when the classifier's own choice scored below the
/// confidence floor and was replaced by the registry's reserved unknown intent;
/// `confidence` still carries the classifier's raw score in that case.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub intent_id: IntentId,
    pub confidence: f64,
    pub floored: bool,
}

impl Prediction {
    pub fn new(intent_id: IntentId, confidence: f64) -> Self {
        Self { intent_id, confidence, floored: false }
    }
}
