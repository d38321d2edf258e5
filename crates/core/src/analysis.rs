//! The structured analysis record stored next to each evidence snapshot.
//!
//! It is produced by the (external) LLM layer; the deterministic core only
//! reads it when comparing snapshots and renders it for humans.

use serde::{Deserialize, Serialize};

/// Longest summary kept when an LLM answer is not valid JSON.
const FALLBACK_SUMMARY_CHARS: usize = 2000;

/// A root cause suggested by the reasoning layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootCauseItem {
    pub cause: String,
    /// `high`, `medium`, or `low`. Kept as text: the model may answer otherwise.
    pub confidence: String,
    pub evidence_refs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisJson {
    pub summary: String,
    pub likely_root_causes: Vec<RootCauseItem>,
    pub recommended_actions: Vec<String>,
    pub kubectl_commands: Vec<String>,
    pub follow_up_questions: Vec<String>,
    pub risk_notes: Vec<String>,
}

impl AnalysisJson {
    /// Parse a model answer, tolerating a surrounding markdown code fence.
    pub fn parse_llm_response(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(strip_code_fence(raw))
    }

    /// Like [`parse_llm_response`](Self::parse_llm_response), but never fails:
    /// an unparseable answer becomes the summary of an otherwise empty record.
    pub fn from_llm_response_lossy(raw: &str) -> Self {
        match Self::parse_llm_response(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "LLM response was not valid JSON");
                Self {
                    summary: raw.chars().take(FALLBACK_SUMMARY_CHARS).collect(),
                    ..Self::default()
                }
            }
        }
    }

    /// Render as the markdown document shown next to the JSON.
    pub fn to_markdown(&self) -> String {
        let mut parts = vec![
            "## Summary".to_string(),
            self.summary.clone(),
            String::new(),
            "## Likely root causes".to_string(),
        ];
        for rc in &self.likely_root_causes {
            parts.push(format!("- **{}** (confidence: {})", rc.cause, rc.confidence));
            if !rc.evidence_refs.is_empty() {
                parts.push(format!("  - Evidence: {}", rc.evidence_refs.join(", ")));
            }
        }
        parts.push(String::new());
        parts.push("## Recommended actions".to_string());
        for (i, action) in self.recommended_actions.iter().enumerate() {
            parts.push(format!("{}. {}", i + 1, action));
        }
        parts.push(String::new());
        parts.push("## Suggested kubectl commands".to_string());
        for cmd in &self.kubectl_commands {
            parts.push(format!("```bash\n{}\n```", cmd));
        }
        if !self.follow_up_questions.is_empty() {
            parts.push(String::new());
            parts.push("## Follow-up questions".to_string());
            parts.extend(self.follow_up_questions.iter().map(|q| format!("- {}", q)));
        }
        if !self.risk_notes.is_empty() {
            parts.push(String::new());
            parts.push("## Risk notes".to_string());
            parts.extend(self.risk_notes.iter().map(|r| format!("- {}", r)));
        }
        parts.join("\n")
    }
}

/// Remove a leading markdown code fence (optionally tagged `json`) and its closing fence.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start();
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim_end()
}
