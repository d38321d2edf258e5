use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Deterministic diagnosis of Kubernetes evidence.
///
/// Every command reads JSON files written by a collector and prints JSON
/// to stdout. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "beaver", about = "Deterministic diagnosis of Kubernetes evidence")]
pub struct CliArgs {
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Redact, truncate and classify one evidence tree
    Analyze {
        /// Evidence JSON file
        evidence: PathBuf,

        /// Character budget for the evidence kept in the report
        #[arg(long)]
        max_chars: Option<usize>,

        /// ScoringConfig YAML document overriding the built-in constants
        #[arg(long)]
        scoring: Option<PathBuf>,

        /// Print the analysis prompt instead of the JSON report
        #[arg(long)]
        prompt: bool,
    },

    /// Scrub secrets from an evidence tree
    Redact {
        evidence: PathBuf,
    },

    /// Shrink an evidence tree to a character budget
    Truncate {
        evidence: PathBuf,

        /// Character budget (defaults to MAX_EVIDENCE_CHARS)
        #[arg(long)]
        max_chars: Option<usize>,
    },

    /// Diff two stored analyses (A = older, B = newer)
    Compare {
        a: PathBuf,
        b: PathBuf,

        /// Print the explanation prompt instead of the JSON comparison
        #[arg(long)]
        prompt: bool,

        /// Raw model answer to attach as the explanation
        #[arg(long, conflicts_with = "prompt")]
        explanation: Option<PathBuf>,
    },

    /// Classify every pod, node and workload in a cluster dump
    Scan {
        dump: PathBuf,

        /// Cap on reported findings (defaults to SCAN_MAX_FINDINGS)
        #[arg(long)]
        max_findings: Option<usize>,

        /// Print the markdown summary instead of the JSON report
        #[arg(long)]
        markdown: bool,
    },
}
