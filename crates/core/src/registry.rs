use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::domain::intent::IntentId;
use crate::errors::PipelineError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("intent id {0} is registered more than once")]
    DuplicateId(IntentId),
    #[error("intent label `{0}` is registered more than once")]
    DuplicateLabel(String),
    #[error("intent {0} has an empty label")]
    EmptyLabel(IntentId),
    #[error("reserved unknown intent {0} is not present in the registry")]
    MissingUnknown(IntentId),
}

/// Immutable id → label table, built once at startup.
///
/// Iteration order is ascending by id. The registry always contains one
/// reserved entry that the decision stage falls back to when classifier
/// confidence is below the floor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentRegistry {
    labels: BTreeMap<IntentId, String>,
    unknown: IntentId,
}

impl IntentRegistry {
    pub fn new<I, L>(entries: I, unknown: IntentId) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (IntentId, L)>,
        L: Into<String>,
    {
        let mut labels = BTreeMap::new();
        let mut seen_labels = BTreeSet::new();

        for (id, label) in entries {
            let label = label.into();
            if label.trim().is_empty() {
                return Err(RegistryError::EmptyLabel(id));
            }
            if !seen_labels.insert(label.clone()) {
                return Err(RegistryError::DuplicateLabel(label));
            }
            if labels.insert(id, label).is_some() {
                return Err(RegistryError::DuplicateId(id));
            }
        }

        if !labels.contains_key(&unknown) {
            return Err(RegistryError::MissingUnknown(unknown));
        }

        Ok(Self { labels, unknown })
    }

    pub fn label(&self, id: IntentId) -> Result<&str, PipelineError> {
        self.labels.get(&id).map(String::as_str).ok_or(PipelineError::UnknownIntent(id))
    }

    pub fn contains(&self, id: IntentId) -> bool {
        self.labels.contains_key(&id)
    }

    pub fn unknown_id(&self) -> IntentId {
        self.unknown
    }

    pub fn iter(&self) -> impl Iterator<Item = (IntentId, &str)> {
        self.labels.iter().map(|(id, label)| (*id, label.as_str()))
    }

    pub fn snapshot(&self) -> BTreeMap<IntentId, String> {
        self.labels.clone()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
