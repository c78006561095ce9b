use parley_agent::build_pipeline;
use parley_core::config::{AppConfig, LoadOptions};
use parley_core::{AgentRequest, AgentResult};
use serde::Serialize;

use crate::commands::{block_on, escape_json, CommandResult};

#[derive(Debug, Serialize)]
struct AskReport {
    command: &'static str,
    correlation_id: String,
    result: AgentResult,
}

pub fn run(text: &str, user_id: Option<String>, session_id: Option<String>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("ask", "config_validation", error.to_string(), 2),
    };

    let correlation_id = format!("cli-{}", std::process::id());
    let request = AgentRequest {
        text: Some(text.to_string()),
        user_id,
        session_id,
        correlation_id: Some(correlation_id.clone()),
    };

    let outcome = block_on(async {
        let pipeline = build_pipeline(&config).await?;
        Ok::<_, parley_agent::BuildError>(pipeline.handle(request).await)
    });

    let result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(error)) => return CommandResult::failure("ask", "pipeline_build", error.to_string(), 3),
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                4,
            )
        }
    };

    let exit_code = if result.success { 0 } else { 1 };
    let report = AskReport { command: "ask", correlation_id, result };
    let output = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"ask\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    });

    CommandResult { exit_code, output }
}
