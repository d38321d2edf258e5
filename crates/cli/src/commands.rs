use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use beaver_core::{read_json_file, AnalysisJson, Config};
use beaver_diff::{Comparison, Snapshot, SnapshotMeta};
use beaver_intelligence::{diagnose, scan_cluster, ClusterDump, DiagnoseOptions, ScoringConfig};
use beaver_sanitize::{redact_with_report, truncate, RedactionReport, TruncationReport};

/// What a command leaves on stdout.
pub enum Output {
    Json(Value),
    Text(String),
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    read_json_file(path).with_context(|| format!("failed to read {}", path.display()))
}

fn to_json<T: Serialize>(value: &T) -> Result<Output> {
    Ok(Output::Json(serde_json::to_value(value).context("failed to serialize output")?))
}

// ── analyze ─────────────────────────────────────────────────────────

pub fn analyze(
    config: &Config,
    evidence: &Path,
    max_chars: Option<usize>,
    scoring: Option<&Path>,
    prompt: bool,
) -> Result<Output> {
    let tree: Value = read_json(evidence)?;
    let mut options = DiagnoseOptions::from_limits(&config.limits);
    if let Some(max) = max_chars {
        options.max_evidence_chars = max;
    }
    if let Some(path) = scoring {
        let yaml = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let doc = ScoringConfig::from_yaml(&yaml).with_context(|| format!("invalid scoring config {}", path.display()))?;
        tracing::info!(id = %doc.metadata.id, "scoring config loaded");
        options.scoring = doc.spec;
    }

    let diagnosis = diagnose(&tree, &options);
    tracing::info!(
        name = %diagnosis.target.name,
        confidence = diagnosis.engine.engine_confidence,
        findings = diagnosis.engine.findings.len(),
        "analysis complete"
    );
    if prompt {
        return Ok(Output::Text(diagnosis.prompt()));
    }
    to_json(&diagnosis)
}

// ── redact / truncate ───────────────────────────────────────────────

#[derive(Serialize)]
struct Redacted {
    evidence: Value,
    report: RedactionReport,
}

pub fn redact(evidence: &Path) -> Result<Output> {
    let tree: Value = read_json(evidence)?;
    let (evidence, report) = redact_with_report(&tree);
    tracing::info!(redactions = report.len(), "redaction complete");
    to_json(&Redacted { evidence, report })
}

#[derive(Serialize)]
struct Truncated {
    evidence: Value,
    report: TruncationReport,
}

pub fn truncate_file(config: &Config, evidence: &Path, max_chars: Option<usize>) -> Result<Output> {
    let tree: Value = read_json(evidence)?;
    let max = max_chars.unwrap_or(config.limits.max_evidence_chars);
    let (evidence, report) = truncate(&tree, max);
    to_json(&Truncated { evidence, report })
}

// ── compare ─────────────────────────────────────────────────────────

/// A stored analysis: evidence (or its stored summary text) plus the
/// analysis record and identity.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SnapshotFile {
    pub evidence: Option<Value>,
    /// Stored form; may be text cut off mid-value.
    pub evidence_summary: Option<Value>,
    pub analysis_json: AnalysisJson,
    #[serde(flatten)]
    pub meta: SnapshotMeta,
}

impl SnapshotFile {
    pub fn into_parts(self) -> (Snapshot, SnapshotMeta) {
        let snapshot = match (self.evidence, self.evidence_summary) {
            (Some(evidence), _) => Snapshot::new(evidence, self.analysis_json),
            (None, Some(Value::String(text))) => Snapshot::from_stored(Some(&text), self.analysis_json),
            (None, Some(value)) if !value.is_null() => Snapshot::new(value, self.analysis_json),
            _ => Snapshot::from_stored(None, self.analysis_json),
        };
        (snapshot, self.meta)
    }
}

pub fn compare(config: &Config, a: &Path, b: &Path, prompt: bool, explanation: Option<&Path>) -> Result<Output> {
    if a == b {
        bail!("analysis A and analysis B must be different files");
    }
    let (snap_a, meta_a) = read_json::<SnapshotFile>(a)?.into_parts();
    let (snap_b, meta_b) = read_json::<SnapshotFile>(b)?.into_parts();

    let mut comparison = Comparison::new(&snap_a, &snap_b, meta_a, meta_b);
    tracing::info!(changes = comparison.changes.len(), "comparison complete");

    if prompt {
        if !comparison.wants_explanation() {
            tracing::warn!("no changes between the analyses; the prompt has nothing to explain");
        }
        return Ok(Output::Text(comparison.prompt(config.limits.max_compare_chars)));
    }
    if let Some(path) = explanation {
        let answer = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read explanation {}", path.display()))?;
        if comparison.wants_explanation() {
            comparison.explain::<std::convert::Infallible>(Ok(answer.as_str()));
        }
    }
    to_json(&comparison)
}

// ── scan ────────────────────────────────────────────────────────────

pub fn scan(config: &Config, dump: &Path, max_findings: Option<usize>, markdown: bool) -> Result<Output> {
    let dump: ClusterDump = read_json(dump)?;
    let mut scan_config = config.scan.clone();
    if let Some(max) = max_findings {
        scan_config.max_findings = max;
    }
    let generated_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let report = scan_cluster(&dump, &scan_config, &generated_at);
    tracing::info!(
        findings = report.findings.len(),
        most_severe = ?report.most_severe(),
        "scan complete"
    );
    if markdown {
        return Ok(Output::Text(report.summary_markdown));
    }
    to_json(&report)
}
