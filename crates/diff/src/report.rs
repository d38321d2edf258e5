//! Rendering a comparison for humans and for the explanation model.

use serde::{Deserialize, Serialize};

use beaver_core::strip_code_fence;

use crate::change::ChangeRecord;
use crate::engine::diff;
use crate::snapshot::Snapshot;

pub const COMPARE_SYSTEM: &str = "You are an expert SRE/DevOps engineer. You are given a list of deterministic diffs between two Kubernetes analysis runs (A = older, B = newer).
Your task: write a short engineer-friendly explanation of what likely changed and why, referencing only the diff items by path (e.g. \"pod.status.phase\", \"pod.status.containerStatuses[app].lastState\").
Rules:
- Base your reasoning ONLY on the diff items provided. Do not invent facts.
- Cite evidence paths from the diff (e.g. \"The pod phase moved to Running (pod.status.phase)\").
- Be concise (2-5 sentences for likely_reasoning).
- Output valid JSON with keys: likely_reasoning (string), diff_summary (string, markdown).";

/// Bullets listed when no explanation is requested.
pub const BULLET_LIMIT: usize = 50;
/// Bullets listed when the explanation model failed.
pub const FALLBACK_BULLET_LIMIT: usize = 30;
const REASONING_FALLBACK_CHARS: usize = 1500;

/// Identity of a stored analysis, as shown next to a comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotMeta {
    pub id: Option<String>,
    pub created_at: Option<String>,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub kubectl_commands: Vec<String>,
}

impl SnapshotMeta {
    fn headline(&self) -> String {
        format!(
            "{} | {} {} ({})",
            self.created_at.as_deref().unwrap_or("N/A"),
            self.kind,
            self.name,
            self.namespace.as_deref().filter(|ns| !ns.is_empty()).unwrap_or("N/A")
        )
    }
}

/// `- **path**: impact` lines for the first `limit` changes.
pub fn render_bullets(changes: &[ChangeRecord], limit: usize) -> String {
    changes
        .iter()
        .take(limit)
        .map(|c| format!("- **{}**: {}", c.path, c.impact))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Explanation prompt ──────────────────────────────────────────────

pub struct ComparePrompt<'a> {
    pub a: &'a SnapshotMeta,
    pub b: &'a SnapshotMeta,
    pub changes: &'a [ChangeRecord],
    pub max_chars: usize,
}

impl ComparePrompt<'_> {
    /// The user part of the prompt, capped to `max_chars` characters.
    pub fn render(&self) -> String {
        let changes = serde_json::to_string_pretty(self.changes).unwrap_or_else(|_| "[]".to_string());
        let prompt = format!(
            "Analysis A: {}\nAnalysis B: {}\n\nDIFF ITEMS (path, before -> after, impact):\n{}\n\n\
             Return a JSON object with keys: likely_reasoning (string), diff_summary (string, markdown).",
            self.a.headline(),
            self.b.headline(),
            changes
        );
        prompt.chars().take(self.max_chars).collect()
    }

    /// System text, capped prompt, and the closing instruction.
    pub fn full(&self) -> String {
        format!("{}\n\n{}\n\nReturn only the JSON object.", COMPARE_SYSTEM, self.render())
    }
}

// ── Explanation answer ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareExplanation {
    pub likely_reasoning: String,
    pub diff_summary: String,
}

/// Read the model's answer. Text that is not a JSON object becomes the
/// reasoning (first 1500 chars) with an empty summary.
pub fn parse_compare_response(raw: &str) -> CompareExplanation {
    let body = strip_code_fence(raw);
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) if value.is_object() => {
            let text = |key: &str| value.get(key).and_then(|v| v.as_str()).unwrap_or("").to_string();
            CompareExplanation {
                likely_reasoning: text("likely_reasoning"),
                diff_summary: text("diff_summary"),
            }
        }
        _ => {
            tracing::warn!(chars = body.chars().count(), "compare answer is not a JSON object");
            CompareExplanation {
                likely_reasoning: body.chars().take(REASONING_FALLBACK_CHARS).collect(),
                diff_summary: String::new(),
            }
        }
    }
}

// ── Comparison ──────────────────────────────────────────────────────

/// A finished comparison of two stored analyses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub diff_summary: String,
    pub changes: Vec<ChangeRecord>,
    pub likely_reasoning: String,
    pub analysis_a: SnapshotMeta,
    pub analysis_b: SnapshotMeta,
}

impl Comparison {
    /// Diff two snapshots; the summary lists the changes as bullets.
    pub fn new(a: &Snapshot, b: &Snapshot, mut meta_a: SnapshotMeta, mut meta_b: SnapshotMeta) -> Self {
        let changes = diff(a, b);
        meta_a.kubectl_commands = a.analysis.kubectl_commands.clone();
        meta_b.kubectl_commands = b.analysis.kubectl_commands.clone();
        Self {
            diff_summary: render_bullets(&changes, BULLET_LIMIT),
            changes,
            likely_reasoning: String::new(),
            analysis_a: meta_a,
            analysis_b: meta_b,
        }
    }

    /// Whether an explanation is worth asking for.
    pub fn wants_explanation(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn prompt(&self, max_chars: usize) -> String {
        ComparePrompt {
            a: &self.analysis_a,
            b: &self.analysis_b,
            changes: &self.changes,
            max_chars,
        }
        .full()
    }

    /// Apply the model's answer, or fall back to a shorter bullet list.
    pub fn explain<E: std::fmt::Display>(&mut self, answer: Result<&str, E>) {
        match answer {
            Ok(raw) => {
                let parsed = parse_compare_response(raw);
                self.likely_reasoning = parsed.likely_reasoning;
                self.diff_summary = parsed.diff_summary;
            }
            Err(err) => {
                tracing::warn!(%err, "compare explanation failed");
                self.likely_reasoning.clear();
                self.diff_summary = render_bullets(&self.changes, FALLBACK_BULLET_LIMIT);
            }
        }
    }
}
