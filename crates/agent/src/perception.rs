use parley_core::{FeatureSet, PipelineError};

/// First pipeline stage: turns raw request text into a [`FeatureSet`].
///
/// Implementations must be pure: equal input yields an equal feature set.
pub trait FeatureExtractor: Send + Sync {
    fn process(&self, raw_text: Option<&str>) -> Result<FeatureSet, PipelineError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PerceptionSettings {
    /// Width of the hashed bag-of-words vector. Zero disables the vector.
    pub embedding_dims: usize,
}

impl Default for PerceptionSettings {
    fn default() -> Self {
        Self { embedding_dims: 256 }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TextPerception {
    settings: PerceptionSettings,
}

impl TextPerception {
    pub fn new(settings: PerceptionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> PerceptionSettings {
        self.settings
    }

    pub fn extract(&self, raw_text: &str) -> FeatureSet {
        let processed_text = normalize_text(raw_text);
        let tokens = tokenize(&processed_text);
        let vector = match self.settings.embedding_dims {
            0 => None,
            dims => Some(embed_tokens(&tokens, dims)),
        };

        FeatureSet { processed_text, tokens, vector }
    }

    /// Embeds an arbitrary phrase the same way request text is embedded.
    pub fn embed(&self, phrase: &str) -> Option<Vec<f32>> {
        match self.settings.embedding_dims {
            0 => None,
            dims => Some(embed_tokens(&tokenize(&normalize_text(phrase)), dims)),
        }
    }
}

impl FeatureExtractor for TextPerception {
    fn process(&self, raw_text: Option<&str>) -> Result<FeatureSet, PipelineError> {
        let raw_text = raw_text
            .ok_or_else(|| PipelineError::InvalidInput("request text is missing".to_string()))?;
        Ok(self.extract(raw_text))
    }
}

/// Lowercases, turns whitespace and control characters into single spaces and
/// trims both ends.
pub fn normalize_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut pending_space = false;

    for character in text.chars() {
        if character.is_whitespace() || character.is_control() {
            pending_space = !normalized.is_empty();
            continue;
        }
        if pending_space {
            normalized.push(' ');
            pending_space = false;
        }
        normalized.extend(character.to_lowercase());
    }

    normalized
}

pub fn tokenize(normalized_text: &str) -> Vec<String> {
    normalized_text
        .split(|character: char| !(character.is_alphanumeric() || character == '\''))
        .map(|token| token.trim_matches('\''))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn embed_tokens(tokens: &[String], dims: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dims];
    for token in tokens {
        vector[bucket(token, dims)] += 1.0;
    }

    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

fn bucket(token: &str, dims: usize) -> usize {
    let digest = blake3::hash(token.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(prefix) % dims as u64) as usize
}
