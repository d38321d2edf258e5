//! Deterministic signal extraction from collected Kubernetes evidence.
//!
//! Every detector is independent. A missing or mistyped sub-tree leaves its
//! signal at the default (false / 0); it never turns into a negative finding.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use beaver_core::{
    container_statuses, non_negative_count, EvidenceExt, EVENT_LIST_KEYS, WORKLOAD_KEYS,
};

const CRASH_LOOP_REASON: &str = "CrashLoopBackOff";
const IMAGE_PULL_REASONS: &[&str] = &["ImagePullBackOff", "ErrImagePull"];
const OOM_REASON: &str = "OOMKilled";
const FAILED_SCHEDULING_REASON: &str = "FailedScheduling";

/// Boolean signals a classifier rule can require or exclude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    CrashLoopBackOff,
    ImagePullBackOff,
    OomKilled,
    Unschedulable,
    NodeNotReady,
    ReplicaMismatch,
}

impl Signal {
    pub const ALL: [Signal; 6] = [
        Signal::CrashLoopBackOff,
        Signal::ImagePullBackOff,
        Signal::OomKilled,
        Signal::Unschedulable,
        Signal::NodeNotReady,
        Signal::ReplicaMismatch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::CrashLoopBackOff => "crash_loop_back_off",
            Signal::ImagePullBackOff => "image_pull_back_off",
            Signal::OomKilled => "oom_killed",
            Signal::Unschedulable => "unschedulable",
            Signal::NodeNotReady => "node_not_ready",
            Signal::ReplicaMismatch => "replica_mismatch",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-schema signal record. `Default` is "no supporting evidence".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalVector {
    pub crash_loop_back_off: bool,
    pub image_pull_back_off: bool,
    pub oom_killed: bool,
    pub unschedulable: bool,
    /// Sum of `restartCount` over all pod container statuses.
    pub restart_count: u64,
    pub node_not_ready: bool,
    pub replica_mismatch: bool,
    /// Events of type `Warning` across every event list.
    pub warning_event_count: u64,
}

impl SignalVector {
    pub fn is_set(&self, signal: Signal) -> bool {
        match signal {
            Signal::CrashLoopBackOff => self.crash_loop_back_off,
            Signal::ImagePullBackOff => self.image_pull_back_off,
            Signal::OomKilled => self.oom_killed,
            Signal::Unschedulable => self.unschedulable,
            Signal::NodeNotReady => self.node_not_ready,
            Signal::ReplicaMismatch => self.replica_mismatch,
        }
    }

    /// Set boolean signals, in [`Signal::ALL`] order.
    pub fn active(&self) -> Vec<Signal> {
        Signal::ALL.into_iter().filter(|s| self.is_set(*s)).collect()
    }
}

/// Extract the signal vector. Total: never fails, whatever the tree holds.
pub fn extract(evidence: &Value) -> SignalVector {
    let mut signals = SignalVector::default();

    if let Some(pod) = evidence.field("pod") {
        detect_container_states(pod, &mut signals);
    }
    detect_events(evidence, &mut signals);
    signals.replica_mismatch = WORKLOAD_KEYS
        .iter()
        .filter_map(|key| evidence.field(key))
        .any(workload_under_replicated);
    signals.node_not_ready = node_not_ready(evidence);

    tracing::debug!(
        active = ?signals.active(),
        restart_count = signals.restart_count,
        warning_event_count = signals.warning_event_count,
        "signals extracted"
    );
    signals
}

fn detect_container_states(pod: &Value, signals: &mut SignalVector) {
    for status in container_statuses(pod).iter().filter(|s| s.is_object()) {
        if let Some(count) = non_negative_count(status, "restartCount") {
            signals.restart_count = signals.restart_count.saturating_add(count);
        }

        let waiting_reason = status
            .at(&["state", "waiting"])
            .map(|w| w.trimmed("reason"))
            .unwrap_or("");
        if waiting_reason == CRASH_LOOP_REASON {
            signals.crash_loop_back_off = true;
        }
        if IMAGE_PULL_REASONS.contains(&waiting_reason) {
            signals.image_pull_back_off = true;
        }

        let terminated_reason = status
            .at(&["lastState", "terminated"])
            .map(|t| t.trimmed("reason"))
            .unwrap_or("");
        if terminated_reason == OOM_REASON {
            signals.oom_killed = true;
        }
    }
}

fn detect_events(evidence: &Value, signals: &mut SignalVector) {
    let events = EVENT_LIST_KEYS
        .iter()
        .flat_map(|key| evidence.items(key))
        .filter(|ev| ev.is_object());
    for event in events {
        if event
            .text("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("warning"))
        {
            signals.warning_event_count += 1;
        }
        if event.trimmed("reason") == FAILED_SCHEDULING_REASON {
            signals.unschedulable = true;
        }
    }
}

/// Desired replicas declared and positive, with fewer ready.
fn workload_under_replicated(workload: &Value) -> bool {
    let Some(desired) = workload.at(&["spec", "replicas"]).and_then(Value::as_i64) else {
        return false;
    };
    let ready = workload
        .at(&["status", "readyReplicas"])
        .and_then(Value::as_i64)
        .unwrap_or(0);
    desired > 0 && ready < desired
}

fn node_not_ready(evidence: &Value) -> bool {
    evidence
        .at(&["node", "status"])
        .map(|status| status.items("conditions"))
        .unwrap_or(&[])
        .iter()
        .any(|c| c.text("type") == Some("Ready") && c.text("status") != Some("True"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod_with_statuses(statuses: Value) -> Value {
        json!({"pod": {"status": {"containerStatuses": statuses}}})
    }

    #[test]
    fn empty_evidence_returns_default_signals() {
        assert_eq!(extract(&json!({})), SignalVector::default());
        assert_eq!(extract(&Value::Null), SignalVector::default());
        assert!(SignalVector::default().active().is_empty());
    }

    #[test]
    fn crash_loop_detected_from_waiting_state() {
        let signals = extract(&pod_with_statuses(json!([
            {"state": {"waiting": {"reason": "CrashLoopBackOff"}}, "restartCount": 5}
        ])));
        assert!(signals.crash_loop_back_off);
        assert_eq!(signals.restart_count, 5);
    }

    #[test]
    fn both_image_pull_reasons_set_the_signal() {
        for reason in ["ImagePullBackOff", "ErrImagePull", " ErrImagePull "] {
            let signals = extract(&pod_with_statuses(json!([
                {"state": {"waiting": {"reason": reason}}, "restartCount": 0}
            ])));
            assert!(signals.image_pull_back_off, "{reason}");
        }
    }

    #[test]
    fn oom_killed_from_last_state_terminated() {
        let signals = extract(&pod_with_statuses(json!([{
            "state": {"running": {}},
            "lastState": {"terminated": {"reason": "OOMKilled", "exitCode": 137}},
            "restartCount": 3
        }])));
        assert!(signals.oom_killed);
        assert_eq!(signals.restart_count, 3);
        // Only the last state counts for OOM.
        let current = extract(&pod_with_statuses(json!([
            {"state": {"terminated": {"reason": "OOMKilled"}}}
        ])));
        assert!(!current.oom_killed);
    }

    #[test]
    fn restart_count_summed_ignoring_bad_values() {
        let signals = extract(&pod_with_statuses(json!([
            {"name": "a", "restartCount": 2},
            {"name": "b", "restartCount": 4},
            {"name": "c", "restartCount": -3},
            {"name": "d", "restartCount": "7"},
            {"name": "e", "restartCount": 1.5},
            "not-an-object"
        ])));
        assert_eq!(signals.restart_count, 6);
    }

    #[test]
    fn unschedulable_from_failed_scheduling_event() {
        let signals = extract(&json!({
            "pod_events": [{"type": "Warning", "reason": "FailedScheduling", "message": "0/3 nodes"}]
        }));
        assert!(signals.unschedulable);
        assert_eq!(signals.warning_event_count, 1);
    }

    #[test]
    fn warning_events_counted_across_event_keys() {
        let signals = extract(&json!({
            "pod_events": [{"type": "Warning"}, {"type": "Normal"}, {"type": "warning"}],
            "workload_events": [{"type": "WARNING"}],
            "deployment_events": [{"type": "Warning"}],
            "node_events": [{"type": "Warning"}, "junk", null],
            "unrelated_events": [{"type": "Warning"}]
        }));
        assert_eq!(signals.warning_event_count, 5);
        assert!(!signals.unschedulable);
    }

    #[test]
    fn replica_mismatch_from_any_workload() {
        let signals = extract(&json!({
            "deployment": {"spec": {"replicas": 3}, "status": {"readyReplicas": 3}},
            "statefulset": {"spec": {"replicas": 2}, "status": {}}
        }));
        assert!(signals.replica_mismatch);
    }

    #[test]
    fn no_replica_mismatch_when_ready_or_undeclared() {
        for evidence in [
            json!({"deployment": {"spec": {"replicas": 3}, "status": {"readyReplicas": 3}}}),
            json!({"deployment": {"spec": {"replicas": 0}, "status": {}}}),
            json!({"deployment": {"spec": {}, "status": {"readyReplicas": 0}}}),
            json!({"deployment": {"spec": {"replicas": "3"}}}),
            json!({"deployment": {}}),
        ] {
            assert!(!extract(&evidence).replica_mismatch, "{evidence}");
        }
    }

    #[test]
    fn node_not_ready_from_conditions() {
        let not_ready = json!({"node": {"status": {"conditions": [
            {"type": "MemoryPressure", "status": "False"},
            {"type": "Ready", "status": "Unknown"}
        ]}}});
        assert!(extract(&not_ready).node_not_ready);

        let ready = json!({"node": {"status": {"conditions": [{"type": "Ready", "status": "True"}]}}});
        assert!(!extract(&ready).node_not_ready);
    }

    #[test]
    fn signal_names_match_field_names() {
        let json = serde_json::to_value(SignalVector::default()).unwrap();
        for signal in Signal::ALL {
            assert!(json.get(signal.as_str()).is_some(), "{signal}");
            assert_eq!(serde_json::to_value(signal).unwrap(), json!(signal.as_str()));
        }
    }
}
