use std::env;
use std::fs;
use std::path::Path;

use parley_core::config::{detect_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let pipeline = &config.pipeline;
    let classifier = &config.classifier;
    let api_key = classifier
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        Field {
            key: "pipeline.confidence_floor",
            value: pipeline.confidence_floor.to_string(),
            env_keys: &["PARLEY_PIPELINE_CONFIDENCE_FLOOR"],
        },
        Field {
            key: "pipeline.classify_timeout_ms",
            value: pipeline.classify_timeout_ms.to_string(),
            env_keys: &["PARLEY_PIPELINE_CLASSIFY_TIMEOUT_MS"],
        },
        Field {
            key: "pipeline.fallback_response",
            value: pipeline.fallback_response.clone(),
            env_keys: &["PARLEY_PIPELINE_FALLBACK_RESPONSE"],
        },
        Field {
            key: "pipeline.fallback_confidence",
            value: pipeline.fallback_confidence.to_string(),
            env_keys: &["PARLEY_PIPELINE_FALLBACK_CONFIDENCE"],
        },
        Field {
            key: "pipeline.embedding_dims",
            value: pipeline.embedding_dims.to_string(),
            env_keys: &["PARLEY_PIPELINE_EMBEDDING_DIMS"],
        },
        Field {
            key: "classifier.provider",
            value: classifier.provider.as_str().to_string(),
            env_keys: &["PARLEY_CLASSIFIER_PROVIDER"],
        },
        Field {
            key: "classifier.endpoint",
            value: classifier.endpoint.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["PARLEY_CLASSIFIER_ENDPOINT"],
        },
        Field { key: "classifier.api_key", value: api_key, env_keys: &["PARLEY_CLASSIFIER_API_KEY"] },
        Field {
            key: "classifier.serialize_inference",
            value: classifier.serialize_inference.to_string(),
            env_keys: &["PARLEY_CLASSIFIER_SERIALIZE_INFERENCE"],
        },
        Field {
            key: "catalog.path",
            value: config
                .catalog
                .path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<builtin>".to_string()),
            env_keys: &["PARLEY_CATALOG_PATH"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["PARLEY_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["PARLEY_SERVER_PORT"],
        },
        Field {
            key: "server.allowed_origins",
            value: config.server.allowed_origins.join(","),
            env_keys: &["PARLEY_SERVER_ALLOWED_ORIGINS"],
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["PARLEY_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["PARLEY_LOGGING_LEVEL", "PARLEY_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["PARLEY_LOGGING_FORMAT", "PARLEY_LOG_FORMAT"],
        },
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a recognizable prefix like `sk-` and hides everything after it.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
