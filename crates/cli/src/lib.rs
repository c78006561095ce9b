pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "parley",
    about = "Parley operator CLI",
    long_about = "Run single requests through the Parley pipeline, inspect the intent catalog and config, and check readiness.",
    after_help = "Examples:\n  parley ask \"hello there\"\n  parley doctor --json\n  parley smoke"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Send one utterance through the pipeline and print the JSON result")]
    Ask {
        text: String,
        #[arg(long, help = "Opaque user id recorded with the request")]
        user: Option<String>,
        #[arg(long, help = "Opaque session id recorded with the request")]
        session: Option<String>,
    },
    #[command(about = "List the intents in the active catalog, ordered by id")]
    Intents,
    #[command(about = "Run canned utterances end to end with per-check timing details")]
    Smoke,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, catalog, registry coverage, and classifier readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ask { text, user, session } => commands::ask::run(&text, user, session),
        Command::Intents => commands::intents::run(),
        Command::Smoke => commands::smoke::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
