//! TOML intent catalog.
//!
//! One file describes the whole conversational surface: the registry entries,
//! the keyword rules and prototype examples classifiers are built from, and the
//! action handlers for each intent.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parley_core::{IntentId, IntentRegistry, RegistryError};
use serde::Deserialize;
use thiserror::Error;

use crate::action::{ActionHandler, ActionTable};
use crate::classifier::{ClassifierError, KeywordClassifier, KeywordRule, PrototypeClassifier};
use crate::perception::{normalize_text, tokenize, TextPerception};

const BUILTIN_CATALOG: &str = include_str!("../catalog/default.toml");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read intent catalog {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse intent catalog {origin}: {source}")]
    Parse { origin: String, source: toml::de::Error },
    #[error("intent catalog {origin} is inconsistent: {source}")]
    Registry { origin: String, source: RegistryError },
    #[error("intent catalog {origin} is invalid: {message}")]
    Invalid { origin: String, message: String },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    unknown: UnknownEntry,
    #[serde(default)]
    intents: Vec<IntentEntry>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnknownEntry {
    id: u32,
    label: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntentEntry {
    pub id: u32,
    pub label: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub handlers: Vec<HandlerEntry>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerEntry {
    pub responses: Vec<String>,
    pub action: Option<String>,
    #[serde(default)]
    pub when_any: Vec<String>,
    pub confidence: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct IntentCatalog {
    origin: String,
    unknown: IntentId,
    intents: Vec<IntentEntry>,
    registry: Arc<IntentRegistry>,
}

impl IntentCatalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(BUILTIN_CATALOG, "<builtin>")
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path)
            .map_err(|source| CatalogError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&content, path.display().to_string())
    }

    /// Loads `path` when given, the built-in catalog otherwise.
    pub fn resolve(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn from_toml_str(content: &str, origin: impl Into<String>) -> Result<Self, CatalogError> {
        let origin = origin.into();
        let file: CatalogFile = toml::from_str(content)
            .map_err(|source| CatalogError::Parse { origin: origin.clone(), source })?;

        for intent in &file.intents {
            validate_handlers(intent).map_err(|message| CatalogError::Invalid {
                origin: origin.clone(),
                message,
            })?;
        }

        let unknown = IntentId(file.unknown.id);
        let entries = file
            .intents
            .iter()
            .map(|intent| (IntentId(intent.id), intent.label.clone()))
            .chain(std::iter::once((unknown, file.unknown.label.clone())));
        let registry = IntentRegistry::new(entries, unknown)
            .map_err(|source| CatalogError::Registry { origin: origin.clone(), source })?;

        Ok(Self { origin, unknown, intents: file.intents, registry: Arc::new(registry) })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn unknown_id(&self) -> IntentId {
        self.unknown
    }

    pub fn intents(&self) -> &[IntentEntry] {
        &self.intents
    }

    pub fn registry(&self) -> Arc<IntentRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn action_table(&self, fallback_response: &str, fallback_confidence: f64) -> ActionTable {
        let mut table = ActionTable::new(fallback_response, fallback_confidence);
        for intent in &self.intents {
            for entry in &intent.handlers {
                let handler = ActionHandler {
                    responses: entry.responses.clone(),
                    action_tag: entry.action.clone(),
                    when_any: entry
                        .when_any
                        .iter()
                        .flat_map(|token| tokenize(&normalize_text(token)))
                        .collect::<BTreeSet<_>>(),
                    confidence: entry.confidence,
                };
                table.register(IntentId(intent.id), handler);
            }
        }
        table
    }

    /// Keywords are normalized like request text; multi-word keywords become
    /// phrase rules.
    pub fn keyword_classifier(&self) -> KeywordClassifier {
        let rules = self
            .intents
            .iter()
            .map(|intent| {
                intent.keywords.iter().fold(KeywordRule::new(IntentId(intent.id)), |rule, keyword| {
                    let tokens = tokenize(&normalize_text(keyword));
                    match tokens.len() {
                        0 => rule,
                        1 => rule.keyword(tokens[0].clone()),
                        _ => rule.phrase(tokens.join(" ")),
                    }
                })
            })
            .collect();
        KeywordClassifier::new(rules, self.unknown)
    }

    pub fn prototype_classifier(
        &self,
        perception: &TextPerception,
    ) -> Result<PrototypeClassifier, ClassifierError> {
        let examples = self.intents.iter().flat_map(|intent| {
            intent
                .examples
                .iter()
                .filter_map(move |example| perception.embed(example).map(|vector| (IntentId(intent.id), vector)))
        });
        PrototypeClassifier::from_examples(examples, perception.settings().embedding_dims, self.unknown)
    }
}

fn validate_handlers(intent: &IntentEntry) -> Result<(), String> {
    for (index, handler) in intent.handlers.iter().enumerate() {
        if handler.responses.is_empty() {
            return Err(format!("handler {index} of intent `{}` has no responses", intent.label));
        }
        if let Some(confidence) = handler.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(format!(
                    "handler {index} of intent `{}` has confidence {confidence} outside [0, 1]",
                    intent.label
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use parley_core::{FeatureSet, IntentId, Prediction, RegistryError};

    use super::{CatalogError, IntentCatalog};
    use crate::action::ActionExecutor;
    use crate::classifier::Classifier;
    use crate::perception::TextPerception;

    #[test]
    fn builtin_catalog_covers_the_conversational_set() {
        let catalog = IntentCatalog::builtin().expect("builtin catalog");
        let labels = catalog.registry().iter().map(|(_, label)| label.to_string()).collect::<Vec<_>>();

        assert_eq!(
            labels,
            vec![
                "greeting",
                "farewell",
                "thanks",
                "help",
                "capabilities",
                "joke",
                "identity",
                "how_it_works",
                "unknown"
            ]
        );
        assert_eq!(catalog.unknown_id(), IntentId(8));
    }

    #[test]
    fn builtin_keyword_rules_cover_suggested_prompts() {
        let catalog = IntentCatalog::builtin().expect("builtin catalog");
        let classifier = catalog.keyword_classifier();
        let perception = TextPerception::default();
        let registry = catalog.registry();

        for (text, expected) in [
            ("What can you do?", "capabilities"),
            ("Tell me a joke", "joke"),
            ("How does this work?", "how_it_works"),
            ("What's your name?", "identity"),
            ("hello there", "greeting"),
        ] {
            let scored = classifier.score(&perception.extract(text));
            assert_eq!(registry.label(scored.intent_id), Ok(expected), "{text}");
        }
    }

    #[test]
    fn classifier_domains_are_covered_by_registry() {
        let catalog = IntentCatalog::builtin().expect("builtin catalog");
        let registry = catalog.registry();
        let prototype =
            catalog.prototype_classifier(&TextPerception::default()).expect("prototype classifier");

        for domain in [catalog.keyword_classifier().output_domain(), prototype.output_domain()] {
            let domain = domain.expect("declared domain");
            assert!(domain.iter().all(|id| registry.contains(*id)));
        }
    }

    #[test]
    fn help_handlers_prefer_password_reset_when_triggered() {
        let catalog = IntentCatalog::builtin().expect("builtin catalog");
        let table = catalog.action_table("fallback", 0.3);
        let perception = TextPerception::default();

        let reset = table.execute(&Prediction::new(IntentId(3), 0.6), &perception.extract("I forgot my PASSWORD"));
        assert_eq!(reset.action_tag.as_deref(), Some("reset_password"));
        assert_eq!(reset.confidence, 0.9);

        let general = table.execute(&Prediction::new(IntentId(3), 0.6), &perception.extract("I need help"));
        assert_eq!(general.action_tag.as_deref(), Some("offer_help"));
        assert_eq!(general.confidence, 0.6);

        let unknown = table.execute(&Prediction::new(IntentId(8), 0.1), &FeatureSet::new("", Vec::new()));
        assert_eq!(&unknown, table.fallback());
    }

    #[test]
    fn rejects_collisions_and_bad_handlers() {
        let colliding = IntentCatalog::from_toml_str(
            "[unknown]\nid = 0\nlabel = \"unknown\"\n\n[[intents]]\nid = 0\nlabel = \"greeting\"\n",
            "test",
        );
        assert!(matches!(
            colliding,
            Err(CatalogError::Registry { source: RegistryError::DuplicateId(IntentId(0)), .. })
        ));

        let empty_responses = IntentCatalog::from_toml_str(
            "[unknown]\nid = 9\nlabel = \"unknown\"\n\n[[intents]]\nid = 0\nlabel = \"greeting\"\n\n[[intents.handlers]]\nresponses = []\n",
            "test",
        );
        assert!(matches!(empty_responses, Err(CatalogError::Invalid { .. })));

        let bad_confidence = IntentCatalog::from_toml_str(
            "[unknown]\nid = 9\nlabel = \"unknown\"\n\n[[intents]]\nid = 0\nlabel = \"greeting\"\n\n[[intents.handlers]]\nresponses = [\"hi\"]\nconfidence = 1.5\n",
            "test",
        );
        assert!(matches!(bad_confidence, Err(CatalogError::Invalid { .. })));

        let unknown_field = IntentCatalog::from_toml_str("[unknown]\nid = 9\nlabel = \"unknown\"\nextra = 1\n", "test");
        assert!(matches!(unknown_field, Err(CatalogError::Parse { .. })));
    }

    #[test]
    fn loads_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            "[unknown]\nid = 1\nlabel = \"unknown\"\n\n[[intents]]\nid = 0\nlabel = \"ping\"\nkeywords = [\"ping\"]\n\n[[intents.handlers]]\nresponses = [\"pong\"]\n"
        )
        .expect("write catalog");

        let catalog = IntentCatalog::load(file.path()).expect("file catalog");
        assert_eq!(catalog.registry().len(), 2);
        assert_eq!(catalog.origin(), file.path().display().to_string());

        let missing = IntentCatalog::load(&file.path().with_extension("missing"));
        assert!(matches!(missing, Err(CatalogError::Read { .. })));
    }
}
