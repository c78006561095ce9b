use std::collections::{BTreeMap, BTreeSet};

use parley_core::{ActionResult, FeatureSet, IntentId, Prediction};

/// Third pipeline stage: turns a decided intent into a response.
///
/// Infallible. Anything the table cannot answer gets the fallback result.
pub trait ActionExecutor: Send + Sync {
    fn execute(&self, prediction: &Prediction, features: &FeatureSet) -> ActionResult;
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActionHandler {
    pub responses: Vec<String>,
    pub action_tag: Option<String>,
    /// Tokens that trigger this handler. Empty means always.
    pub when_any: BTreeSet<String>,
    /// Reported instead of the decided confidence when set.
    pub confidence: Option<f64>,
}

impl ActionHandler {
    pub fn respond(response: impl Into<String>) -> Self {
        Self {
            responses: vec![response.into()],
            action_tag: None,
            when_any: BTreeSet::new(),
            confidence: None,
        }
    }

    pub fn or_respond(mut self, response: impl Into<String>) -> Self {
        self.responses.push(response.into());
        self
    }

    pub fn tagged(mut self, action_tag: impl Into<String>) -> Self {
        self.action_tag = Some(action_tag.into());
        self
    }

    pub fn when_any<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.when_any.extend(tokens.into_iter().map(Into::into));
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    fn triggers(&self, features: &FeatureSet) -> bool {
        self.when_any.is_empty() || features.tokens.iter().any(|token| self.when_any.contains(token))
    }

    fn render(&self, features: &FeatureSet) -> Option<String> {
        let template = match self.responses.len() {
            0 => return None,
            1 => &self.responses[0],
            count => &self.responses[pick_index(&features.processed_text, count)],
        };
        Some(
            template
                .replace("{text}", &features.processed_text)
                .replace("{tokens}", &features.tokens.len().to_string()),
        )
    }
}

/// Intent id → ordered handler list, plus the fallback result.
#[derive(Clone, Debug)]
pub struct ActionTable {
    handlers: BTreeMap<IntentId, Vec<ActionHandler>>,
    fallback: ActionResult,
}

impl ActionTable {
    pub fn new(fallback_response: impl Into<String>, fallback_confidence: f64) -> Self {
        Self {
            handlers: BTreeMap::new(),
            fallback: ActionResult {
                response: fallback_response.into(),
                confidence: fallback_confidence.clamp(0.0, 1.0),
                action_tag: None,
            },
        }
    }

    /// Appends a handler; handlers for one intent are tried in registration order.
    pub fn register(&mut self, intent_id: IntentId, handler: ActionHandler) -> &mut Self {
        self.handlers.entry(intent_id).or_default().push(handler);
        self
    }

    pub fn fallback(&self) -> &ActionResult {
        &self.fallback
    }

    pub fn handlers(&self, intent_id: IntentId) -> &[ActionHandler] {
        self.handlers.get(&intent_id).map(Vec::as_slice).unwrap_or_default()
    }
}

impl ActionExecutor for ActionTable {
    fn execute(&self, prediction: &Prediction, features: &FeatureSet) -> ActionResult {
        let matched = self
            .handlers(prediction.intent_id)
            .iter()
            .filter(|handler| handler.triggers(features))
            .find_map(|handler| handler.render(features).map(|response| (handler, response)));

        match matched {
            Some((handler, response)) => ActionResult {
                response,
                confidence: handler.confidence.unwrap_or(prediction.confidence).clamp(0.0, 1.0),
                action_tag: handler.action_tag.clone(),
            },
            None => self.fallback.clone(),
        }
    }
}

fn pick_index(processed_text: &str, count: usize) -> usize {
    let digest = blake3::hash(processed_text.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(prefix) % count as u64) as usize
}

#[cfg(test)]
mod tests {
    use parley_core::{FeatureSet, IntentId, Prediction};

    use super::{ActionExecutor, ActionHandler, ActionTable};

    fn features(text: &str) -> FeatureSet {
        FeatureSet::new(text, text.split_whitespace().map(str::to_string).collect())
    }

    fn table() -> ActionTable {
        let mut table = ActionTable::new("I'm not sure how to respond to that.", 0.3);
        table
            .register(IntentId(0), ActionHandler::respond("Hello!").tagged("greet_user"))
            .register(
                IntentId(3),
                ActionHandler::respond("Let's reset your password.")
                    .tagged("reset_password")
                    .when_any(["password", "login"])
                    .with_confidence(0.99),
            )
            .register(IntentId(3), ActionHandler::respond("You said: {text} ({tokens} words)"))
            .register(IntentId(4), ActionHandler::respond("only for cats").when_any(["cat"]));
        table
    }

    #[test]
    fn matched_handler_echoes_decided_confidence() {
        let result = table().execute(&Prediction::new(IntentId(0), 0.92), &features("hello there"));

        assert_eq!(result.response, "Hello!");
        assert_eq!(result.confidence, 0.92);
        assert_eq!(result.action_tag.as_deref(), Some("greet_user"));
    }

    #[test]
    fn first_triggered_handler_wins_and_fixed_confidence_applies() {
        let table = table();

        let reset = table.execute(&Prediction::new(IntentId(3), 0.5), &features("i forgot my password"));
        assert_eq!(reset.action_tag.as_deref(), Some("reset_password"));
        assert_eq!(reset.confidence, 0.99);

        let general = table.execute(&Prediction::new(IntentId(3), 0.5), &features("help me please"));
        assert_eq!(general.response, "You said: help me please (3 words)");
        assert_eq!(general.action_tag, None);
        assert_eq!(general.confidence, 0.5);
    }

    #[test]
    fn fallback_is_identical_regardless_of_features() {
        let table = table();
        let unmapped_a = table.execute(&Prediction::new(IntentId(42), 0.9), &features("anything"));
        let unmapped_b = table.execute(&Prediction::new(IntentId(42), 0.1), &features(""));
        let untriggered = table.execute(&Prediction::new(IntentId(4), 0.8), &features("a dog"));

        assert_eq!(&unmapped_a, table.fallback());
        assert_eq!(unmapped_a, unmapped_b);
        assert_eq!(unmapped_a, untriggered);
        assert_eq!(unmapped_a.confidence, 0.3);
    }

    #[test]
    fn template_choice_is_stable_per_text() {
        let mut table = ActionTable::new("fallback", 0.3);
        table.register(
            IntentId(5),
            ActionHandler::respond("one").or_respond("two").or_respond("three"),
        );
        let prediction = Prediction::new(IntentId(5), 0.7);

        let first = table.execute(&prediction, &features("tell me a joke"));
        let second = table.execute(&prediction, &features("tell me a joke"));
        assert_eq!(first, second);
        assert!(["one", "two", "three"].contains(&first.response.as_str()));
    }
}
