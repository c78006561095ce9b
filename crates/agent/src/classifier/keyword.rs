use std::collections::BTreeSet;

use async_trait::async_trait;
use parley_core::{FeatureSet, IntentId};

use super::{Classification, Classifier, ClassifierError};

/// Phrase matches weigh as much as this many single keyword hits.
const PHRASE_WEIGHT: u32 = 2;
/// Hit count at which match strength saturates.
const SATURATION_HITS: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeywordRule {
    pub intent_id: IntentId,
    pub keywords: BTreeSet<String>,
    /// Multi-word phrases, stored as space-joined tokens.
    pub phrases: Vec<String>,
}

impl KeywordRule {
    pub fn new(intent_id: IntentId) -> Self {
        Self { intent_id, keywords: BTreeSet::new(), phrases: Vec::new() }
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.insert(keyword.into());
        self
    }

    pub fn phrase(mut self, phrase: impl Into<String>) -> Self {
        self.phrases.push(phrase.into());
        self
    }

    fn hits(&self, features: &FeatureSet, padded_tokens: &str) -> u32 {
        let keyword_hits = features
            .tokens
            .iter()
            .filter(|token| self.keywords.contains(token.as_str()))
            .collect::<BTreeSet<_>>()
            .len() as u32;
        let phrase_hits = self
            .phrases
            .iter()
            .filter(|phrase| padded_tokens.contains(&format!(" {phrase} ")))
            .count() as u32;

        keyword_hits + phrase_hits * PHRASE_WEIGHT
    }
}

/// Rule-based matcher. The rule with the most hits wins; ties go to the rule
/// registered first. Confidence combines how strongly the winner matched with
/// how much of the total evidence it holds.
#[derive(Clone, Debug)]
pub struct KeywordClassifier {
    rules: Vec<KeywordRule>,
    no_match: IntentId,
}

impl KeywordClassifier {
    pub fn new(rules: Vec<KeywordRule>, no_match: IntentId) -> Self {
        Self { rules, no_match }
    }

    pub fn score(&self, features: &FeatureSet) -> Classification {
        let padded_tokens = format!(" {} ", features.tokens.join(" "));

        let mut best: Option<(IntentId, u32)> = None;
        let mut total_hits = 0u32;
        for rule in &self.rules {
            let hits = rule.hits(features, &padded_tokens);
            total_hits += hits;
            if hits > 0 && best.map_or(true, |(_, best_hits)| hits > best_hits) {
                best = Some((rule.intent_id, hits));
            }
        }

        match best {
            Some((intent_id, hits)) => {
                let share = f64::from(hits) / f64::from(total_hits);
                let strength = f64::from(hits.min(SATURATION_HITS)) / f64::from(SATURATION_HITS);
                let confidence = share * (0.6 + 0.4 * strength);
                Classification { intent_id, confidence: confidence.clamp(0.0, 1.0) }
            }
            None => Classification { intent_id: self.no_match, confidence: 0.0 },
        }
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn classify(&self, features: &FeatureSet) -> Result<Classification, ClassifierError> {
        Ok(self.score(features))
    }

    fn output_domain(&self) -> Option<Vec<IntentId>> {
        let mut domain = self.rules.iter().map(|rule| rule.intent_id).collect::<BTreeSet<_>>();
        domain.insert(self.no_match);
        Some(domain.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use parley_core::IntentId;

    use super::{KeywordClassifier, KeywordRule};
    use crate::classifier::Classifier;
    use crate::perception::TextPerception;

    fn classifier() -> KeywordClassifier {
        KeywordClassifier::new(
            vec![
                KeywordRule::new(IntentId(0)).keyword("hello").keyword("hi").keyword("hey"),
                KeywordRule::new(IntentId(1)).keyword("bye").phrase("see you"),
                KeywordRule::new(IntentId(2)).keyword("joke").keyword("funny"),
            ],
            IntentId(9),
        )
    }

    #[test]
    fn single_unique_keyword_clears_a_moderate_floor() {
        let features = TextPerception::default().extract("hello there");
        let result = classifier().score(&features);

        assert_eq!(result.intent_id, IntentId(0));
        assert!(result.confidence > 0.7 && result.confidence < 0.8, "{}", result.confidence);
    }

    #[test]
    fn phrases_match_on_token_boundaries() {
        let perception = TextPerception::default();

        let phrase = classifier().score(&perception.extract("OK, see you tomorrow!"));
        assert_eq!(phrase.intent_id, IntentId(1));

        let partial = classifier().score(&perception.extract("oversee your work"));
        assert_eq!(partial.intent_id, IntentId(9));
        assert_eq!(partial.confidence, 0.0);
    }

    #[test]
    fn conflicting_evidence_lowers_confidence() {
        let perception = TextPerception::default();
        let clean = classifier().score(&perception.extract("hey, a funny joke"));
        let mixed = classifier().score(&perception.extract("hey bye, a funny joke"));

        assert_eq!(clean.intent_id, IntentId(2));
        assert_eq!(mixed.intent_id, IntentId(2));
        assert!(mixed.confidence < clean.confidence);
    }

    #[test]
    fn new_rule_starts_empty_and_never_matches() {
        let rule = KeywordRule::new(IntentId(0));
        assert!(rule.keywords.is_empty());
        assert!(rule.phrases.is_empty());

        let empty = KeywordClassifier::new(vec![rule], IntentId(9));
        let result = empty.score(&TextPerception::default().extract("hello there"));
        assert_eq!(result.intent_id, IntentId(9));
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn ties_go_to_the_first_registered_rule() {
        let features = TextPerception::default().extract("hi bye");
        assert_eq!(classifier().score(&features).intent_id, IntentId(0));
    }

    #[test]
    fn output_domain_includes_no_match_intent() {
        let domain = classifier().output_domain();
        assert_eq!(domain, Some(vec![IntentId(0), IntentId(1), IntentId(2), IntentId(9)]));
    }
}
