use parley_agent::IntentCatalog;
use parley_core::config::{AppConfig, LoadOptions};

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("intents", "config_validation", error.to_string(), 2)
        }
    };

    let catalog = match IntentCatalog::resolve(config.catalog.path.as_deref()) {
        Ok(catalog) => catalog,
        Err(error) => return CommandResult::failure("intents", "catalog", error.to_string(), 3),
    };

    let registry = catalog.registry();
    let mut lines = vec![format!("catalog {}: {} intents", catalog.origin(), registry.len())];
    for (id, label) in registry.iter() {
        let marker = if id == registry.unknown_id() { " (reserved unknown)" } else { "" };
        lines.push(format!("  - {id}: {label}{marker}"));
    }

    CommandResult::success("intents", lines.join("\n"))
}
