//! Analysis prompt assembly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use beaver_core::EvidenceExt;

use crate::engine::EngineReport;
use crate::heuristics::HeuristicMatch;

pub const SYSTEM_ROLE: &str = "You are an expert SRE/DevOps engineer specializing in Kubernetes troubleshooting.
Your task is to analyze evidence collected from a Kubernetes cluster and produce a structured diagnosis.
Rules:
- Base your analysis ONLY on the evidence provided. Do not invent facts.
- Use evidence_refs to point to specific keys in the evidence (e.g. pod.status.containerStatuses[0].state).
- Treat the deterministic findings below as grounded facts; explain them, do not contradict them.
- Be concise but actionable.
- If critical data is missing, say so in follow_up_questions.
- For risk_notes, mention any risks (data loss, impact, downtime) if relevant.";

pub const OUTPUT_SCHEMA: &str = "Respond with a single JSON object (no markdown code fence, no extra text) with exactly these keys:
- summary (string): 2-4 sentence summary of what is happening.
- likely_root_causes (array of { cause, confidence: \"high\"|\"medium\"|\"low\", evidence_refs: string[] })
- recommended_actions (array of strings, prioritized)
- kubectl_commands (array of strings: suggested commands to validate or fix)
- follow_up_questions (array of strings: if more data would help)
- risk_notes (array of strings: e.g. data loss risk, impact)";

/// The resource being diagnosed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Target {
    /// Read the `target` block a collector stores alongside the evidence.
    pub fn from_evidence(evidence: &Value) -> Self {
        let target = evidence.field_or_null("target");
        Self {
            kind: non_empty(target.trimmed("kind")).unwrap_or("Pod").to_string(),
            name: non_empty(target.trimmed("name")).unwrap_or("unknown").to_string(),
            namespace: non_empty(target.trimmed("namespace")).map(str::to_string),
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Deterministic prompt text for one analysis.
pub struct AnalysisPrompt<'a> {
    pub target: &'a Target,
    pub heuristics: &'a [HeuristicMatch],
    pub engine: &'a EngineReport,
    /// Already redacted and truncated.
    pub evidence: &'a Value,
}

impl AnalysisPrompt<'_> {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(SYSTEM_ROLE);
        out.push_str("\n\n");
        out.push_str(&format!(
            "Analyze the following Kubernetes troubleshooting evidence for {} \"{}\" (namespace: {}).\n\n",
            self.target.kind,
            self.target.name,
            self.target.namespace.as_deref().unwrap_or("N/A")
        ));
        out.push_str(OUTPUT_SCHEMA);
        out.push_str("\n\n");
        out.push_str(&self.deterministic_context());
        out.push_str("EVIDENCE (JSON):\n");
        out.push_str(&serde_json::to_string_pretty(self.evidence).unwrap_or_default());
        out.push_str("\n\nReturn only the JSON object.");
        out
    }

    fn deterministic_context(&self) -> String {
        let mut out = String::new();
        if !self.heuristics.is_empty() {
            out.push_str("HEURISTIC CANDIDATES:\n");
            for m in self.heuristics {
                let observed: Vec<String> = m.evidence_refs.iter().map(ToString::to_string).collect();
                out.push_str(&format!("- {} (observed at {})\n", m.condition, observed.join(", ")));
                for c in &m.candidates {
                    out.push_str(&format!("  - [{}] {}\n", c.confidence, c.cause));
                }
            }
            out.push('\n');
        }
        if self.engine.has_findings() {
            out.push_str(&format!(
                "ENGINE FINDINGS (confidence {:.2}):\n",
                self.engine.engine_confidence
            ));
            for f in &self.engine.findings {
                out.push_str(&format!("- {} ({:.2}): {}\n", f.root_cause, f.confidence, f.description));
            }
            out.push('\n');
        }
        out
    }
}
