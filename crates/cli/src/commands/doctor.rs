use std::sync::Arc;

use parley_agent::builder::build_classifier;
use parley_agent::{Classifier, IntentCatalog, PerceptionSettings, TextPerception};
use parley_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

use crate::commands::{block_on, escape_json, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CHECKS: [&str; 5] = [
    "config_validation",
    "catalog_load",
    "classifier_setup",
    "registry_coverage",
    "classifier_readiness",
];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 5 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();
    run_checks(&mut checks);

    for name in CHECKS.iter().copied().skip(checks.len()) {
        checks.push(DoctorCheck {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because an earlier check failed".to_string(),
        });
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Pushes checks in `CHECKS` order and stops at the first failure.
fn run_checks(checks: &mut Vec<DoctorCheck>) {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(pass("config_validation", "configuration loaded and validated"));
            config
        }
        Err(error) => return checks.push(fail("config_validation", error.to_string())),
    };

    let catalog = match IntentCatalog::resolve(config.catalog.path.as_deref()) {
        Ok(catalog) => {
            checks.push(pass(
                "catalog_load",
                format!("{} intents from {}", catalog.registry().len(), catalog.origin()),
            ));
            catalog
        }
        Err(error) => return checks.push(fail("catalog_load", error.to_string())),
    };

    let perception =
        TextPerception::new(PerceptionSettings { embedding_dims: config.pipeline.embedding_dims });
    let classifier: Arc<dyn Classifier> = match build_classifier(&config, &catalog, &perception) {
        Ok(classifier) => {
            checks.push(pass(
                "classifier_setup",
                format!("{} classifier constructed", classifier.name()),
            ));
            classifier
        }
        Err(error) => return checks.push(fail("classifier_setup", error.to_string())),
    };

    let registry = catalog.registry();
    match classifier.output_domain() {
        Some(domain) => match domain.iter().find(|id| !registry.contains(**id)) {
            Some(uncovered) => {
                return checks.push(fail(
                    "registry_coverage",
                    format!("classifier can emit intent {uncovered} which has no registry entry"),
                ))
            }
            None => checks.push(pass(
                "registry_coverage",
                format!("all {} classifier outputs have registry entries", domain.len()),
            )),
        },
        None => checks.push(pass(
            "registry_coverage",
            "classifier declares no output domain; ids are checked per request",
        )),
    }

    match block_on(classifier.load()) {
        Ok(Ok(())) if classifier.is_ready() => {
            checks.push(pass("classifier_readiness", format!("{} classifier is ready", classifier.name())))
        }
        Ok(Ok(())) => checks.push(fail("classifier_readiness", "classifier loaded but reports not ready")),
        Ok(Err(error)) => checks.push(fail("classifier_readiness", error.to_string())),
        Err(error) => checks.push(fail(
            "classifier_readiness",
            format!("failed to initialize async runtime: {error}"),
        )),
    }
}

fn pass(name: &'static str, details: impl Into<String>) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Pass, details: details.into() }
}

fn fail(name: &'static str, details: impl Into<String>) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Fail, details: details.into() }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
