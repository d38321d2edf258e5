mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;

use beaver_core::config::{load_dotenv, Config};

use crate::cli::{CliArgs, Command};
use crate::commands::Output;

fn main() -> Result<()> {
    load_dotenv();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    config.log_summary();

    let args = CliArgs::parse();
    let output = match &args.command {
        Command::Analyze {
            evidence,
            max_chars,
            scoring,
            prompt,
        } => commands::analyze(&config, evidence, *max_chars, scoring.as_deref(), *prompt),
        Command::Redact { evidence } => commands::redact(evidence),
        Command::Truncate { evidence, max_chars } => commands::truncate_file(&config, evidence, *max_chars),
        Command::Compare {
            a,
            b,
            prompt,
            explanation,
        } => commands::compare(&config, a, b, *prompt, explanation.as_deref()),
        Command::Scan {
            dump,
            max_findings,
            markdown,
        } => commands::scan(&config, dump, *max_findings, *markdown),
    }?;

    match output {
        Output::Text(text) => println!("{}", text),
        Output::Json(value) => {
            let rendered = if args.pretty {
                serde_json::to_string_pretty(&value)
            } else {
                serde_json::to_string(&value)
            }
            .context("failed to render JSON")?;
            println!("{}", rendered);
        }
    }
    Ok(())
}
