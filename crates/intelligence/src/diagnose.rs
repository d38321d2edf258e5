//! Full deterministic pass over one collected evidence tree.

use serde::Serialize;
use serde_json::Value;

use beaver_core::config::LimitsConfig;
use beaver_sanitize::{redact_with_report, truncate_with, RedactionReport, TruncationPolicy, TruncationReport};

use crate::engine::{analyze_with, EngineReport};
use crate::heuristics::{lookup, HeuristicMatch};
use crate::prompt::{AnalysisPrompt, Target};
use crate::scoring::ScoringSpec;

#[derive(Debug, Clone)]
pub struct DiagnoseOptions {
    pub max_evidence_chars: usize,
    pub truncation: TruncationPolicy,
    pub scoring: ScoringSpec,
}

impl Default for DiagnoseOptions {
    fn default() -> Self {
        Self::from_limits(&LimitsConfig::default())
    }
}

impl DiagnoseOptions {
    pub fn from_limits(limits: &LimitsConfig) -> Self {
        Self {
            max_evidence_chars: limits.max_evidence_chars,
            truncation: TruncationPolicy {
                max_list_items: limits.max_events,
                max_log_lines: limits.max_log_lines,
                ..TruncationPolicy::default()
            },
            scoring: ScoringSpec::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub target: Target,
    pub redaction: RedactionReport,
    pub truncation: TruncationReport,
    pub heuristics: Vec<HeuristicMatch>,
    pub engine: EngineReport,
    /// Redacted and truncated tree, ready for a prompt.
    pub evidence: Value,
}

impl Diagnosis {
    pub fn prompt(&self) -> String {
        AnalysisPrompt {
            target: &self.target,
            heuristics: &self.heuristics,
            engine: &self.engine,
            evidence: &self.evidence,
        }
        .render()
    }
}

/// Redact, truncate, then run the heuristic table and the engine.
///
/// Both classifiers read the redacted tree before truncation, so a shed
/// section never hides a signal.
pub fn diagnose(evidence: &Value, options: &DiagnoseOptions) -> Diagnosis {
    let (clean, redaction) = redact_with_report(evidence);
    let (small, truncation) = truncate_with(&clean, options.max_evidence_chars, &options.truncation);
    let heuristics = lookup(&clean);
    let engine = analyze_with(&clean, &options.scoring);
    tracing::debug!(
        redactions = redaction.len(),
        truncated = truncation.truncated,
        conditions = heuristics.len(),
        findings = engine.findings.len(),
        "diagnosis complete"
    );
    Diagnosis {
        target: Target::from_evidence(&clean),
        redaction,
        truncation,
        heuristics,
        engine,
        evidence: small,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn signals_survive_heavy_truncation() {
        let evidence = json!({
            "pod": {
                "spec": {"note": "x".repeat(5000)},
                "status": {"containerStatuses": [
                    {"name": "app", "state": {"waiting": {"reason": "CrashLoopBackOff"}}, "restartCount": 2}
                ]}
            }
        });
        let options = DiagnoseOptions {
            max_evidence_chars: 200,
            ..Default::default()
        };
        let d = diagnose(&evidence, &options);
        assert!(d.truncation.truncated);
        assert!(d.evidence["pod"].as_str().is_some_and(|s| s.starts_with("[TRUNCATED:")));
        assert!(d.engine.signals.crash_loop_back_off);
        assert_eq!(d.heuristics.len(), 1);
    }

    #[test]
    fn limits_drive_the_truncation_policy() {
        let limits = LimitsConfig {
            max_log_lines: 10,
            max_events: 5,
            ..Default::default()
        };
        let options = DiagnoseOptions::from_limits(&limits);
        assert_eq!(options.truncation.max_log_lines, 10);
        assert_eq!(options.truncation.max_list_items, 5);
        assert_eq!(options.truncation.high_volume_keys, TruncationPolicy::default().high_volume_keys);

        // Defaults agree with the truncator's own policy.
        assert_eq!(DiagnoseOptions::default().truncation, TruncationPolicy::default());

        let lines: Vec<Value> = (0..40).map(|i| json!(format!("line {i}"))).collect();
        let events: Vec<Value> = (0..30).map(|i| json!({"reason": "BackOff", "message": "m".repeat(i % 7)})).collect();
        let evidence = json!({"pod_logs": {"app": lines}, "pod_events": events});
        let options = DiagnoseOptions {
            max_evidence_chars: 500,
            ..DiagnoseOptions::from_limits(&limits)
        };
        let d = diagnose(&evidence, &options);
        let kept = d.evidence["pod_logs"]["app"].as_array().map(Vec::len);
        assert!(kept.is_none() || kept == Some(10), "{:?}", d.evidence);
        assert!(d.truncation.sections_truncated.contains(&"pod_logs.app".to_string()));
        assert!(d.truncation.sections_truncated.contains(&"pod_events".to_string()));
    }

    #[test]
    fn secrets_never_reach_the_prompt() {
        let evidence = json!({
            "target": {"kind": "Pod", "name": "api"},
            "pod": {"spec": {"containers": [{"env": [{"name": "X", "value": "PASSWORD=hunter2"}]}]}}
        });
        let d = diagnose(&evidence, &DiagnoseOptions::default());
        assert_eq!(d.redaction.len(), 1);
        assert!(!d.prompt().contains("hunter2"));
        assert!(d.prompt().contains("(namespace: N/A)"));
    }
}
