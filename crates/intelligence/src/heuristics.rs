//! Heuristic root-cause candidates for well-known failure conditions.
//!
//! Unlike the engine this does not score anything: each condition seen in
//! the evidence contributes its fixed candidate list, together with the path
//! where it was first observed, as grounding for the LLM prompt.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use beaver_core::{container_statuses, EvidenceExt, EvidencePath};

/// Event lists scanned for condition reasons, in scan order.
const EVENT_KEYS: &[&str] = &["pod_events", "workload_events", "node_events"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    CrashLoopBackOff,
    ImagePullBackOff,
    ErrImagePull,
    Unschedulable,
    #[serde(rename = "OOMKilled")]
    OomKilled,
    Error,
}

impl Condition {
    pub fn as_str(self) -> &'static str {
        match self {
            Condition::CrashLoopBackOff => "CrashLoopBackOff",
            Condition::ImagePullBackOff => "ImagePullBackOff",
            Condition::ErrImagePull => "ErrImagePull",
            Condition::Unschedulable => "Unschedulable",
            Condition::OomKilled => "OOMKilled",
            Condition::Error => "Error",
        }
    }

    /// Map a raw status or event reason onto a known condition.
    pub fn normalize(reason: &str) -> Option<Self> {
        match reason.trim() {
            "CrashLoopBackOff" => Some(Condition::CrashLoopBackOff),
            "ImagePullBackOff" => Some(Condition::ImagePullBackOff),
            "ErrImagePull" => Some(Condition::ErrImagePull),
            "Unschedulable" | "FailedScheduling" | "Scheduling" => Some(Condition::Unschedulable),
            "OOMKilled" => Some(Condition::OomKilled),
            "Error" => Some(Condition::Error),
            _ => None,
        }
    }

    fn rules(self) -> &'static [HeuristicRule] {
        match self {
            Condition::CrashLoopBackOff => CRASH_LOOP_RULES,
            Condition::ImagePullBackOff | Condition::ErrImagePull => IMAGE_PULL_RULES,
            Condition::Unschedulable => UNSCHEDULABLE_RULES,
            Condition::OomKilled => OOM_RULES,
            Condition::Error => ERROR_RULES,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Likelihood {
    High,
    Medium,
    Low,
}

impl fmt::Display for Likelihood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Likelihood::High => "high",
            Likelihood::Medium => "medium",
            Likelihood::Low => "low",
        })
    }
}

// ── Rule table ──────────────────────────────────────────────────────

/// `(cause, likelihood, evidence-ref templates)`.
pub struct HeuristicRule {
    pub cause: &'static str,
    pub confidence: Likelihood,
    pub evidence_refs: &'static [&'static str],
}

const fn rule(
    cause: &'static str,
    confidence: Likelihood,
    evidence_refs: &'static [&'static str],
) -> HeuristicRule {
    HeuristicRule {
        cause,
        confidence,
        evidence_refs,
    }
}

static CRASH_LOOP_RULES: &[HeuristicRule] = &[
    rule(
        "Application exit / crash (non-zero exit code)",
        Likelihood::High,
        &["pod.status.containerStatuses", "pod_logs", "previous_logs"],
    ),
    rule(
        "OOMKilled (out of memory)",
        Likelihood::High,
        &["pod.status.containerStatuses[].lastState.terminated"],
    ),
    rule(
        "Missing config or secret",
        Likelihood::Medium,
        &["pod.status.containerStatuses", "pod_events"],
    ),
    rule(
        "Startup probe or readiness failure",
        Likelihood::Medium,
        &["pod.status.containerStatuses", "pod_events"],
    ),
];

static IMAGE_PULL_RULES: &[HeuristicRule] = &[
    rule(
        "Image name or tag invalid / not found",
        Likelihood::High,
        &["pod.status.containerStatuses[].state.waiting", "pod_events"],
    ),
    rule(
        "ImagePullSecrets missing or insufficient",
        Likelihood::High,
        &["pod.spec", "pod_events"],
    ),
    rule(
        "Registry unreachable or auth failure",
        Likelihood::Medium,
        &["pod_events"],
    ),
];

static UNSCHEDULABLE_RULES: &[HeuristicRule] = &[
    rule(
        "Insufficient CPU/memory on nodes",
        Likelihood::High,
        &["pod_events", "node.status"],
    ),
    rule(
        "Node selector or affinity not satisfied",
        Likelihood::High,
        &["pod.spec", "pod_events"],
    ),
    rule(
        "PVC bound / storage or topology constraint",
        Likelihood::Medium,
        &["pod_events"],
    ),
    rule(
        "Taints / node unschedulable",
        Likelihood::Medium,
        &["pod_events", "node.spec.taints"],
    ),
];

static OOM_RULES: &[HeuristicRule] = &[
    rule(
        "Container exceeded memory limit",
        Likelihood::High,
        &["pod.status.containerStatuses[].lastState.terminated"],
    ),
    rule(
        "Increase memory limit or fix leak",
        Likelihood::High,
        &["pod.spec", "pod_logs"],
    ),
];

static ERROR_RULES: &[HeuristicRule] = &[
    rule(
        "Application crash or non-zero exit",
        Likelihood::High,
        &["pod.status.containerStatuses", "pod_logs", "previous_logs"],
    ),
    rule(
        "Check logs for stack trace or error message",
        Likelihood::Medium,
        &["pod_logs", "previous_logs"],
    ),
];

// ── Output ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub cause: String,
    pub confidence: Likelihood,
    pub evidence_refs: Vec<EvidencePath>,
}

/// One detected condition with its candidate causes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicMatch {
    pub condition: Condition,
    /// Where the condition was first observed.
    pub evidence_refs: Vec<EvidencePath>,
    pub candidates: Vec<Candidate>,
}

impl HeuristicMatch {
    fn new(condition: Condition, observed_at: EvidencePath) -> Self {
        let candidates = condition
            .rules()
            .iter()
            .map(|r| Candidate {
                cause: r.cause.to_string(),
                confidence: r.confidence,
                evidence_refs: r
                    .evidence_refs
                    .iter()
                    .filter_map(|t| EvidencePath::parse(t).ok())
                    .collect(),
            })
            .collect();
        Self {
            condition,
            evidence_refs: vec![observed_at],
            candidates,
        }
    }
}

/// Scan the evidence for known conditions, first occurrence wins.
pub fn lookup(evidence: &Value) -> Vec<HeuristicMatch> {
    let mut matches: Vec<HeuristicMatch> = Vec::new();
    for (reason, observed_at) in observed_reasons(evidence) {
        let Some(condition) = Condition::normalize(reason) else {
            continue;
        };
        if matches.iter().any(|m| m.condition == condition) {
            continue;
        }
        matches.push(HeuristicMatch::new(condition, observed_at));
    }
    tracing::debug!(
        conditions = ?matches.iter().map(|m| m.condition.as_str()).collect::<Vec<_>>(),
        "heuristic lookup"
    );
    matches
}

/// Raw reasons in scan order: waiting states, terminated states (current
/// then last, per container), then event reasons.
fn observed_reasons(evidence: &Value) -> Vec<(&str, EvidencePath)> {
    let pod = evidence.field_or_null("pod");
    let statuses = container_statuses(pod);
    let base = || EvidencePath::keys(["pod", "status", "containerStatuses"]);
    let mut out = Vec::new();

    for (i, status) in statuses.iter().enumerate() {
        if let Some(waiting) = status.at(&["state", "waiting"]).filter(|w| w.is_object()) {
            let reason = waiting.trimmed("reason");
            if !reason.is_empty() {
                out.push((reason, base().index(i).key("state").key("waiting")));
            }
        }
    }

    for (i, status) in statuses.iter().enumerate() {
        for state_key in ["state", "lastState"] {
            if let Some(terminated) = status.at(&[state_key, "terminated"]).filter(|t| t.is_object()) {
                let reason = terminated.trimmed("reason");
                if !reason.is_empty() {
                    out.push((reason, base().index(i).key(state_key).key("terminated")));
                }
            }
        }
    }

    for key in EVENT_KEYS {
        for (i, event) in evidence.items(key).iter().enumerate() {
            let reason = event.trimmed("reason");
            if !reason.is_empty() {
                out.push((reason, EvidencePath::root().key(*key).index(i).key("reason")));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conditions(matches: &[HeuristicMatch]) -> Vec<Condition> {
        matches.iter().map(|m| m.condition).collect()
    }

    #[test]
    fn empty_evidence_has_no_candidates() {
        assert!(lookup(&json!({})).is_empty());
        assert!(lookup(&json!({"pod": {"status": {}}})).is_empty());
    }

    #[test]
    fn crash_loop_from_waiting_state() {
        let matches = lookup(&json!({"pod": {"status": {"containerStatuses": [
            {"name": "app", "state": {"waiting": {"reason": "CrashLoopBackOff"}}}
        ]}}}));
        assert_eq!(conditions(&matches), vec![Condition::CrashLoopBackOff]);
        assert_eq!(
            matches[0].evidence_refs[0].to_string(),
            "pod.status.containerStatuses[0].state.waiting"
        );
        assert_eq!(matches[0].candidates.len(), 4);
        assert_eq!(matches[0].candidates[0].confidence, Likelihood::High);
        assert_eq!(
            matches[0].candidates[1].evidence_refs[0].to_string(),
            "pod.status.containerStatuses[].lastState.terminated"
        );
    }

    #[test]
    fn image_pull_conditions_share_candidates() {
        let matches = lookup(&json!({"pod": {"status": {"containerStatuses": [
            {"state": {"waiting": {"reason": "ErrImagePull"}}},
            {"state": {"waiting": {"reason": "ImagePullBackOff"}}}
        ]}}}));
        assert_eq!(
            conditions(&matches),
            vec![Condition::ErrImagePull, Condition::ImagePullBackOff]
        );
        assert_eq!(matches[0].candidates, matches[1].candidates);
        assert_eq!(
            matches[1].evidence_refs[0].to_string(),
            "pod.status.containerStatuses[1].state.waiting"
        );
    }

    #[test]
    fn failed_scheduling_event_maps_to_unschedulable() {
        let matches = lookup(&json!({"pod_events": [
            {"type": "Normal", "reason": "Pulled"},
            {"type": "Warning", "reason": "FailedScheduling", "message": "0/3 nodes are available"}
        ]}));
        assert_eq!(conditions(&matches), vec![Condition::Unschedulable]);
        assert_eq!(matches[0].evidence_refs[0].to_string(), "pod_events[1].reason");
        assert_eq!(matches[0].candidates.len(), 4);
    }

    #[test]
    fn waiting_reasons_scan_before_terminated_and_events() {
        let matches = lookup(&json!({
            "pod": {"status": {"containerStatuses": [{
                "state": {"waiting": {"reason": "CrashLoopBackOff"}},
                "lastState": {"terminated": {"reason": "OOMKilled"}}
            }, {
                "state": {"terminated": {"reason": "Error"}}
            }]}},
            "node_events": [{"reason": "Scheduling"}]
        }));
        assert_eq!(
            conditions(&matches),
            vec![
                Condition::CrashLoopBackOff,
                Condition::OomKilled,
                Condition::Error,
                Condition::Unschedulable
            ]
        );
        assert_eq!(
            matches[1].evidence_refs[0].to_string(),
            "pod.status.containerStatuses[0].lastState.terminated"
        );
        assert_eq!(
            matches[2].evidence_refs[0].to_string(),
            "pod.status.containerStatuses[1].state.terminated"
        );
    }

    #[test]
    fn first_occurrence_wins() {
        let matches = lookup(&json!({
            "pod": {"status": {"containerStatuses": [
                {"lastState": {"terminated": {"reason": "OOMKilled"}}},
                {"lastState": {"terminated": {"reason": "OOMKilled"}}}
            ]}},
            "pod_events": [{"reason": "OOMKilled"}]
        }));
        assert_eq!(matches.len(), 1);
        assert_eq!(
            matches[0].evidence_refs[0].to_string(),
            "pod.status.containerStatuses[0].lastState.terminated"
        );
    }

    #[test]
    fn unknown_reasons_are_skipped() {
        let matches = lookup(&json!({
            "pod": {"status": {"containerStatuses": [
                {"state": {"waiting": {"reason": "ContainerCreating"}}},
                {"state": {"terminated": {"reason": "Completed"}}}
            ]}},
            "pod_events": [{"reason": "Scheduled"}, {"reason": ""}, "junk"]
        }));
        assert!(matches.is_empty());
    }

    #[test]
    fn every_reference_template_parses() {
        for condition in [
            Condition::CrashLoopBackOff,
            Condition::ImagePullBackOff,
            Condition::ErrImagePull,
            Condition::Unschedulable,
            Condition::OomKilled,
            Condition::Error,
        ] {
            for rule in condition.rules() {
                for template in rule.evidence_refs {
                    assert!(EvidencePath::parse(template).is_ok(), "{template}");
                }
            }
        }
    }

    #[test]
    fn serializes_condition_names_verbatim() {
        let matches = lookup(&json!({"pod": {"status": {"containerStatuses": [
            {"lastState": {"terminated": {"reason": "OOMKilled"}}}
        ]}}}));
        let json = serde_json::to_value(&matches).unwrap();
        assert_eq!(json[0]["condition"], json!("OOMKilled"));
        assert_eq!(json[0]["candidates"][0]["confidence"], json!("high"));
        assert_eq!(
            json[0]["evidence_refs"][0],
            json!("pod.status.containerStatuses[0].lastState.terminated")
        );
    }
}
