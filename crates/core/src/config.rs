use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub classifier: ClassifierConfig,
    pub catalog: CatalogConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub confidence_floor: f64,
    pub classify_timeout_ms: u64,
    pub fallback_response: String,
    pub fallback_confidence: f64,
    pub embedding_dims: usize,
}

#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub provider: ClassifierProvider,
    pub endpoint: Option<String>,
    pub api_key: Option<SecretString>,
    pub serialize_inference: bool,
}

#[derive(Clone, Debug, Default)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierProvider {
    Keyword,
    Prototype,
    Remote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub classifier_provider: Option<ClassifierProvider>,
    pub classifier_endpoint: Option<String>,
    pub classifier_api_key: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub confidence_floor: Option<f64>,
    pub classify_timeout_ms: Option<u64>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_FALLBACK_RESPONSE: &str = "I'm not sure how to respond to that.";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig {
                confidence_floor: 0.35,
                classify_timeout_ms: 3_000,
                fallback_response: DEFAULT_FALLBACK_RESPONSE.to_string(),
                fallback_confidence: 0.3,
                embedding_dims: 256,
            },
            classifier: ClassifierConfig {
                provider: ClassifierProvider::Keyword,
                endpoint: None,
                api_key: None,
                serialize_inference: false,
            },
            catalog: CatalogConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                allowed_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ],
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl PipelineConfig {
    pub fn classify_timeout(&self) -> Duration {
        Duration::from_millis(self.classify_timeout_ms)
    }
}

impl ClassifierProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Prototype => "prototype",
            Self::Remote => "remote",
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for ClassifierProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "prototype" => Ok(Self::Prototype),
            "remote" => Ok(Self::Remote),
            other => Err(ConfigError::Validation(format!(
                "unsupported classifier provider `{other}` (expected keyword|prototype|remote)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("parley.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(pipeline) = patch.pipeline {
            if let Some(confidence_floor) = pipeline.confidence_floor {
                self.pipeline.confidence_floor = confidence_floor;
            }
            if let Some(classify_timeout_ms) = pipeline.classify_timeout_ms {
                self.pipeline.classify_timeout_ms = classify_timeout_ms;
            }
            if let Some(fallback_response) = pipeline.fallback_response {
                self.pipeline.fallback_response = fallback_response;
            }
            if let Some(fallback_confidence) = pipeline.fallback_confidence {
                self.pipeline.fallback_confidence = fallback_confidence;
            }
            if let Some(embedding_dims) = pipeline.embedding_dims {
                self.pipeline.embedding_dims = embedding_dims;
            }
        }

        if let Some(classifier) = patch.classifier {
            if let Some(provider) = classifier.provider {
                self.classifier.provider = provider;
            }
            if let Some(endpoint) = classifier.endpoint {
                self.classifier.endpoint = Some(endpoint);
            }
            if let Some(classifier_api_key_value) = classifier.api_key {
                self.classifier.api_key = Some(secret_value(classifier_api_key_value));
            }
            if let Some(serialize_inference) = classifier.serialize_inference {
                self.classifier.serialize_inference = serialize_inference;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(path) = catalog.path {
                self.catalog.path = Some(path);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(allowed_origins) = server.allowed_origins {
                self.server.allowed_origins = allowed_origins;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PARLEY_PIPELINE_CONFIDENCE_FLOOR") {
            self.pipeline.confidence_floor = parse_f64("PARLEY_PIPELINE_CONFIDENCE_FLOOR", &value)?;
        }
        if let Some(value) = read_env("PARLEY_PIPELINE_CLASSIFY_TIMEOUT_MS") {
            self.pipeline.classify_timeout_ms =
                parse_u64("PARLEY_PIPELINE_CLASSIFY_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("PARLEY_PIPELINE_FALLBACK_RESPONSE") {
            self.pipeline.fallback_response = value;
        }
        if let Some(value) = read_env("PARLEY_PIPELINE_FALLBACK_CONFIDENCE") {
            self.pipeline.fallback_confidence =
                parse_f64("PARLEY_PIPELINE_FALLBACK_CONFIDENCE", &value)?;
        }
        if let Some(value) = read_env("PARLEY_PIPELINE_EMBEDDING_DIMS") {
            self.pipeline.embedding_dims = parse_usize("PARLEY_PIPELINE_EMBEDDING_DIMS", &value)?;
        }

        if let Some(value) = read_env("PARLEY_CLASSIFIER_PROVIDER") {
            self.classifier.provider = value.parse()?;
        }
        if let Some(value) = read_env("PARLEY_CLASSIFIER_ENDPOINT") {
            self.classifier.endpoint = Some(value);
        }
        if let Some(value) = read_env("PARLEY_CLASSIFIER_API_KEY") {
            self.classifier.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PARLEY_CLASSIFIER_SERIALIZE_INFERENCE") {
            self.classifier.serialize_inference =
                parse_bool("PARLEY_CLASSIFIER_SERIALIZE_INFERENCE", &value)?;
        }

        if let Some(value) = read_env("PARLEY_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("PARLEY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PARLEY_SERVER_PORT") {
            self.server.port = parse_u16("PARLEY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PARLEY_SERVER_ALLOWED_ORIGINS") {
            self.server.allowed_origins = value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = read_env("PARLEY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PARLEY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("PARLEY_LOGGING_LEVEL").or_else(|| read_env("PARLEY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PARLEY_LOGGING_FORMAT").or_else(|| read_env("PARLEY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(provider) = overrides.classifier_provider {
            self.classifier.provider = provider;
        }
        if let Some(endpoint) = overrides.classifier_endpoint {
            self.classifier.endpoint = Some(endpoint);
        }
        if let Some(classifier_api_key) = overrides.classifier_api_key {
            self.classifier.api_key = Some(secret_value(classifier_api_key));
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = Some(catalog_path);
        }
        if let Some(confidence_floor) = overrides.confidence_floor {
            self.pipeline.confidence_floor = confidence_floor;
        }
        if let Some(classify_timeout_ms) = overrides.classify_timeout_ms {
            self.pipeline.classify_timeout_ms = classify_timeout_ms;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_pipeline(&self.pipeline)?;
        validate_classifier(&self.classifier)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("parley.toml"), PathBuf::from("config/parley.toml")]
        .into_iter()
        .find(|path| path.exists())
}

pub fn detect_config_path() -> Option<PathBuf> {
    resolve_config_path(None)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&pipeline.confidence_floor) {
        return Err(ConfigError::Validation(
            "pipeline.confidence_floor must be in range 0.0..=1.0".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&pipeline.fallback_confidence) {
        return Err(ConfigError::Validation(
            "pipeline.fallback_confidence must be in range 0.0..=1.0".to_string(),
        ));
    }

    if pipeline.classify_timeout_ms == 0 || pipeline.classify_timeout_ms > 60_000 {
        return Err(ConfigError::Validation(
            "pipeline.classify_timeout_ms must be in range 1..=60000".to_string(),
        ));
    }

    if pipeline.fallback_response.trim().is_empty() {
        return Err(ConfigError::Validation(
            "pipeline.fallback_response must not be empty".to_string(),
        ));
    }

    if pipeline.embedding_dims > 65_536 {
        return Err(ConfigError::Validation(
            "pipeline.embedding_dims must be at most 65536 (0 disables vectors)".to_string(),
        ));
    }

    Ok(())
}

fn validate_classifier(classifier: &ClassifierConfig) -> Result<(), ConfigError> {
    match classifier.provider {
        ClassifierProvider::Remote => {
            let endpoint = classifier.endpoint.as_deref().map(str::trim).unwrap_or_default();
            if endpoint.is_empty() {
                return Err(ConfigError::Validation(
                    "classifier.endpoint is required for the remote provider".to_string(),
                ));
            }
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::Validation(
                    "classifier.endpoint must start with http:// or https://".to_string(),
                ));
            }
            let blank_key = classifier
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(false);
            if blank_key {
                return Err(ConfigError::Validation(
                    "classifier.api_key must not be blank when set".to_string(),
                ));
            }
        }
        ClassifierProvider::Keyword | ClassifierProvider::Prototype => {}
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    if let Some(origin) = server
        .allowed_origins
        .iter()
        .find(|origin| !origin.starts_with("http://") && !origin.starts_with("https://"))
    {
        return Err(ConfigError::Validation(format!(
            "server.allowed_origins entry `{origin}` must start with http:// or https://"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    pipeline: Option<PipelinePatch>,
    classifier: Option<ClassifierPatch>,
    catalog: Option<CatalogPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    confidence_floor: Option<f64>,
    classify_timeout_ms: Option<u64>,
    fallback_response: Option<String>,
    fallback_confidence: Option<f64>,
    embedding_dims: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierPatch {
    provider: Option<ClassifierProvider>,
    endpoint: Option<String>,
    api_key: Option<String>,
    serialize_inference: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    allowed_origins: Option<Vec<String>>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ClassifierProvider, ConfigError, ConfigOverrides, LoadOptions, LogFormat,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_and_use_keyword_classifier() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(
            config.classifier.provider == ClassifierProvider::Keyword,
            "default provider should be keyword",
        )?;
        ensure(config.pipeline.classify_timeout_ms == 3_000, "default timeout should be 3s")?;
        ensure(
            config.server.allowed_origins.contains(&"http://localhost:3000".to_string()),
            "default origins should include the local web client",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PARLEY_CLASSIFIER_KEY", "key-from-env");
        env::set_var("TEST_PARLEY_CLASSIFIER_URL", "http://127.0.0.1:9900");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("parley.toml");
            fs::write(
                &path,
                r#"
[classifier]
provider = "remote"
endpoint = "${TEST_PARLEY_CLASSIFIER_URL}"
api_key = "${TEST_PARLEY_CLASSIFIER_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.classifier.endpoint.as_deref() == Some("http://127.0.0.1:9900"),
                "endpoint should be interpolated from environment",
            )?;
            ensure(
                config.classifier.api_key.as_ref().map(|key| key.expose_secret().to_string())
                    == Some("key-from-env".to_string()),
                "api key should be interpolated from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_PARLEY_CLASSIFIER_KEY", "TEST_PARLEY_CLASSIFIER_URL"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PARLEY_LOG_LEVEL", "warn");
        env::set_var("PARLEY_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["PARLEY_LOG_LEVEL", "PARLEY_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PARLEY_PIPELINE_CONFIDENCE_FLOOR", "0.5");
        env::set_var("PARLEY_SERVER_ALLOWED_ORIGINS", "https://chat.example.com, http://a.test");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("parley.toml");
            fs::write(
                &path,
                r#"
[pipeline]
confidence_floor = 0.2
classify_timeout_ms = 1500

[server]
port = 9001

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    server_port: Some(9100),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.server.port == 9100, "override port should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                (config.pipeline.confidence_floor - 0.5).abs() < f64::EPSILON,
                "env confidence floor should win over file",
            )?;
            ensure(
                config.pipeline.classify_timeout_ms == 1500,
                "file timeout should win over default",
            )?;
            ensure(
                config.server.allowed_origins
                    == vec!["https://chat.example.com".to_string(), "http://a.test".to_string()],
                "comma separated origins should be split and trimmed",
            )?;
            Ok(())
        })();

        clear_vars(&["PARLEY_PIPELINE_CONFIDENCE_FLOOR", "PARLEY_SERVER_ALLOWED_ORIGINS"]);
        result
    }

    #[test]
    fn remote_provider_without_endpoint_fails_fast() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PARLEY_CLASSIFIER_PROVIDER", "remote");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("classifier.endpoint")
            );
            ensure(has_message, "validation failure should mention classifier.endpoint")
        })();

        clear_vars(&["PARLEY_CLASSIFIER_PROVIDER"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PARLEY_PIPELINE_CLASSIFY_TIMEOUT_MS", "soon");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected invalid override error".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "PARLEY_PIPELINE_CLASSIFY_TIMEOUT_MS"),
                "invalid override should name the variable",
            )
        })();

        clear_vars(&["PARLEY_PIPELINE_CLASSIFY_TIMEOUT_MS"]);
        result
    }

    #[test]
    fn out_of_range_confidence_floor_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides { confidence_floor: Some(1.5), ..ConfigOverrides::default() },
            ..LoadOptions::default()
        })
        .err()
        .ok_or_else(|| "expected validation failure".to_string())?;

        ensure(
            error.to_string().contains("pipeline.confidence_floor"),
            "error should mention pipeline.confidence_floor",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PARLEY_CLASSIFIER_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["PARLEY_CLASSIFIER_API_KEY"]);
        result
    }

    #[test]
    fn missing_required_file_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("absent.toml");
        let error = AppConfig::load(LoadOptions {
            config_path: Some(path),
            require_file: true,
            ..LoadOptions::default()
        })
        .err()
        .ok_or_else(|| "expected missing file error".to_string())?;

        ensure(
            matches!(error, ConfigError::MissingConfigFile(_)),
            "missing file should be a MissingConfigFile error",
        )
    }
}
