//! Cluster health scan: classify raw pod, node and workload objects into
//! severity-ranked findings.
//!
//! Everything time-dependent comes from the caller: how long each pod has
//! been Pending and the report timestamp. The scan itself never reads the
//! clock or talks to the cluster.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use beaver_core::config::ScanConfig;
use beaver_core::{container_statuses, EvidenceExt};
use beaver_sanitize::{redact, truncate, truncate_log_lines};

/// Character cap on the log snippet attached to a finding.
pub const EVIDENCE_SNIPPET_MAX_CHARS: usize = 2000;
const SNIPPET_LOG_LINES: usize = 20;

// ── Severity / category ─────────────────────────────────────────────

/// Declared from least to most severe so `Ord` ranks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanCategory {
    Resources,
    Crash,
    Image,
    Scheduling,
    Config,
    Node,
    Unknown,
}

impl ScanCategory {
    /// Categories whose findings get a log snippet attached.
    fn wants_logs(self) -> bool {
        matches!(self, ScanCategory::Crash | ScanCategory::Resources | ScanCategory::Image)
    }
}

/// Severity, category and human text for one detected problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub severity: Severity,
    pub category: ScanCategory,
    pub title: String,
    pub description: String,
}

impl Classification {
    fn new(severity: Severity, category: ScanCategory, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            title: title.into(),
            description: description.into(),
        }
    }
}

// ── Classification rules ────────────────────────────────────────────

/// Observed state of one pod container.
#[derive(Debug, Clone, Copy, Default)]
pub struct PodStatus<'a> {
    pub waiting_reason: Option<&'a str>,
    pub terminated_reason: Option<&'a str>,
    pub phase: Option<&'a str>,
    pub pending_minutes: Option<f64>,
    pub container: Option<&'a str>,
}

/// Terminated reasons win over waiting reasons, which win over phase.
pub fn classify_pod_status(status: &PodStatus<'_>, pending_threshold: u32) -> Classification {
    use ScanCategory::*;
    use Severity::*;

    let suffix = status
        .container
        .map(|c| format!(" (container: {})", c))
        .unwrap_or_default();

    match status.terminated_reason {
        Some("OOMKilled") => {
            return Classification::new(
                High,
                Resources,
                "Pod container OOMKilled",
                format!("Container was killed by OOM{}. Consider increasing memory limit or request.", suffix),
            )
        }
        Some(reason) => {
            return Classification::new(
                Medium,
                Crash,
                format!("Pod container terminated: {}", reason),
                format!("Container exited with reason {}{}. Check logs and events.", reason, suffix),
            )
        }
        None => {}
    }

    match status.waiting_reason {
        Some(reason @ ("ImagePullBackOff" | "ErrImagePull")) => {
            return Classification::new(
                High,
                Image,
                "Image pull failed",
                format!(
                    "Pod cannot pull image ({}){}. Check image name, tag, and pull secrets.",
                    reason, suffix
                ),
            )
        }
        Some("CrashLoopBackOff") => {
            return Classification::new(
                High,
                Crash,
                "Pod in CrashLoopBackOff",
                format!("Container is crashing and restarting{}. Check logs and application config.", suffix),
            )
        }
        Some(reason) => {
            return Classification::new(
                Low,
                Scheduling,
                format!("Pod waiting: {}", reason),
                format!("Container is in waiting state ({}){}.", reason, suffix),
            )
        }
        None => {}
    }

    if status.phase == Some("Pending") {
        return match status.pending_minutes {
            Some(minutes) if minutes >= f64::from(pending_threshold) => Classification::new(
                Medium,
                Scheduling,
                "Pod Pending too long",
                format!(
                    "Pod has been Pending for {}+ minutes. Check scheduler, resources, and node availability.",
                    minutes.trunc() as i64
                ),
            ),
            _ => Classification::new(
                Info,
                Scheduling,
                "Pod Pending",
                "Pod is in Pending state. May be normal if recently created.",
            ),
        };
    }
    Classification::new(Info, Unknown, "Pod status", "Pod has non-ready or unknown status.")
}

/// Pressure conditions that are `True`, then Ready when it is not.
pub fn classify_node(node: &Value) -> Vec<Classification> {
    let name = node_name(node);
    let conditions = node_conditions(node);
    let mut out = Vec::new();

    for (kind, condition) in &conditions {
        if condition.text("status") != Some("True") || *kind == "Ready" {
            continue;
        }
        let classification = match *kind {
            "MemoryPressure" => Classification::new(
                Severity::High,
                ScanCategory::Node,
                "Node under MemoryPressure",
                format!("Node {} has MemoryPressure. Pods may be evicted or fail to schedule.", name),
            ),
            "DiskPressure" => Classification::new(
                Severity::High,
                ScanCategory::Node,
                "Node under DiskPressure",
                format!(
                    "Node {} has DiskPressure. Check disk usage and consider expanding or cleaning.",
                    name
                ),
            ),
            "PIDPressure" => Classification::new(
                Severity::Medium,
                ScanCategory::Node,
                "Node under PIDPressure",
                format!("Node {} has PIDPressure. Process count is high.", name),
            ),
            other => Classification::new(
                Severity::Low,
                ScanCategory::Node,
                format!("Node condition: {}", other),
                format!("Node {} condition {} is True.", name, other),
            ),
        };
        out.push(classification);
    }

    let ready = conditions.iter().find(|(kind, _)| *kind == "Ready");
    if let Some((_, ready)) = ready {
        if ready.text("status") != Some("True") {
            out.push(Classification::new(
                Severity::Critical,
                ScanCategory::Node,
                "Node NotReady",
                format!("Node {} is not Ready. Workloads may not schedule or run correctly.", name),
            ));
        }
    }
    out
}

pub fn classify_replica_mismatch(kind: &str, namespace: &str, name: &str, desired: i64, ready: i64) -> Classification {
    let severity = if desired > 0 && ready == 0 {
        Severity::High
    } else {
        Severity::Medium
    };
    Classification::new(
        severity,
        ScanCategory::Config,
        format!("{} replica mismatch", kind),
        format!(
            "{} {}/{}: desired={}, ready={}. Check pod status and events.",
            kind, namespace, name, desired, ready
        ),
    )
}

/// Conditions keyed by type, in first-seen order; a repeated type keeps
/// the last entry.
fn node_conditions(node: &Value) -> Vec<(&str, &Value)> {
    let mut out: Vec<(&str, &Value)> = Vec::new();
    let conditions = node.field("status").map(|s| s.items("conditions")).unwrap_or(&[]);
    for condition in conditions {
        let Some(kind) = condition.text("type") else {
            continue;
        };
        match out.iter_mut().find(|(k, _)| *k == kind) {
            Some(slot) => slot.1 = condition,
            None => out.push((kind, condition)),
        }
    }
    out
}

fn node_name(node: &Value) -> &str {
    node.at(&["metadata", "name"])
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
}

// ── Timestamps ──────────────────────────────────────────────────────

fn normalize_timestamp(ts: &str) -> String {
    if ts.ends_with('Z') || ts.contains('+') {
        ts.to_string()
    } else {
        format!("{}Z", ts)
    }
}

fn state_time(state: Option<&Value>) -> Option<&str> {
    let terminated = state?.field("terminated")?;
    terminated
        .text("finishedAt")
        .filter(|s| !s.is_empty())
        .or_else(|| terminated.text("startedAt").filter(|s| !s.is_empty()))
}

/// When a container problem last happened: termination time (last, then
/// current), running start, then pod creation.
pub fn occurred_at_for_container(status: Option<&Value>, pod: &Value) -> Option<String> {
    let from_status = status.and_then(|cs| {
        state_time(cs.field("lastState"))
            .or_else(|| state_time(cs.field("state")))
            .or_else(|| {
                cs.at(&["state", "running", "startedAt"])
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            })
    });
    from_status
        .or_else(|| {
            pod.at(&["metadata", "creationTimestamp"])
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .map(normalize_timestamp)
}

/// Latest condition transition time.
pub fn occurred_at_for_node(node: &Value) -> Option<String> {
    node.field("status")
        .map(|s| s.items("conditions"))
        .unwrap_or(&[])
        .iter()
        .filter_map(|c| c.text("lastTransitionTime"))
        .filter(|s| !s.is_empty())
        .max()
        .map(normalize_timestamp)
}

// ── Suggested commands ──────────────────────────────────────────────

pub fn pod_commands(namespace: &str, name: &str, category: ScanCategory) -> Vec<String> {
    let mut cmds = vec![
        format!("kubectl get pod -n {} {} -o wide", namespace, name),
        format!("kubectl describe pod -n {} {}", namespace, name),
        format!("kubectl logs -n {} {} --tail=100", namespace, name),
    ];
    if category == ScanCategory::Image {
        cmds.push(format!(
            "kubectl get pod -n {} {} -o jsonpath='{{.status.containerStatuses}}'",
            namespace, name
        ));
    }
    cmds
}

pub fn node_commands(name: &str) -> Vec<String> {
    vec![
        format!("kubectl describe node {}", name),
        format!("kubectl get node {} -o wide", name),
    ]
}

pub fn workload_commands(kind: &str, namespace: &str, name: &str) -> Vec<String> {
    let kind = kind.to_lowercase();
    vec![
        format!("kubectl get {} -n {} {} -o wide", kind, namespace, name),
        format!("kubectl describe {} -n {} {}", kind, namespace, name),
        format!(
            "kubectl get pods -n {ns} -l app.kubernetes.io/name={name} 2>/dev/null || kubectl get pods -n {ns}",
            ns = namespace,
            name = name
        ),
    ]
}

// ── Findings ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFinding {
    pub severity: Severity,
    pub category: ScanCategory,
    pub title: String,
    pub description: String,
    pub affected_refs: Vec<ResourceRef>,
    pub evidence_refs: Vec<String>,
    pub suggested_commands: Vec<String>,
    pub evidence_snippet: Option<String>,
    pub occurred_at: Option<String>,
}

impl ScanFinding {
    fn from_classification(c: Classification, affected: ResourceRef, suggested_commands: Vec<String>) -> Self {
        Self {
            severity: c.severity,
            category: c.category,
            title: c.title,
            description: c.description,
            affected_refs: vec![affected],
            evidence_refs: Vec::new(),
            suggested_commands,
            evidence_snippet: None,
            occurred_at: None,
        }
    }
}

/// One pod plus what the caller knows about it.
#[derive(Debug, Clone, Copy)]
pub struct PodScan<'a> {
    pub pod: &'a Value,
    /// Minutes spent Pending, when the pod is Pending and its age is known.
    pub pending_minutes: Option<f64>,
    /// Per-container log lines (`{container: [line, ...]}`).
    pub logs: Option<&'a Value>,
}

/// Redacted, truncated tail of one container's log.
pub fn log_snippet(container: &str, lines: &[Value]) -> String {
    let tail = truncate_log_lines(lines, SNIPPET_LOG_LINES);
    let mut per_container = Map::new();
    per_container.insert(container.to_string(), Value::Array(tail));
    let mut raw = Map::new();
    raw.insert("pod_logs".to_string(), Value::Object(per_container));
    let raw = Value::Object(raw);
    let (small, _) = truncate(&redact(&raw), EVIDENCE_SNIPPET_MAX_CHARS);
    let text = serde_json::to_string(&small).unwrap_or_default();
    text.chars().take(EVIDENCE_SNIPPET_MAX_CHARS).collect()
}

pub fn scan_pod(input: &PodScan<'_>, pending_threshold: u32) -> Vec<ScanFinding> {
    let pod = input.pod;
    let namespace = pod.at(&["metadata", "namespace"]).and_then(Value::as_str).unwrap_or("default");
    let name = pod.at(&["metadata", "name"]).and_then(Value::as_str).unwrap_or("unknown");
    let phase = pod.at(&["status", "phase"]).and_then(Value::as_str);
    let pending_due = |minutes: Option<f64>| minutes.map_or(true, |m| m >= f64::from(pending_threshold));
    let pod_ref = || ResourceRef {
        kind: "Pod".to_string(),
        namespace: Some(namespace.to_string()),
        name: name.to_string(),
    };

    let statuses = container_statuses(pod);
    let mut out = Vec::new();
    for cs in statuses {
        let container = cs.text("name");
        let waiting_reason = cs.at(&["state", "waiting", "reason"]).and_then(Value::as_str);
        // The last termination overrides the current one.
        let terminated_reason = cs
            .at(&["lastState", "terminated", "reason"])
            .and_then(Value::as_str)
            .or_else(|| cs.at(&["state", "terminated", "reason"]).and_then(Value::as_str));
        let waiting_reason = waiting_reason.filter(|r| !r.is_empty());
        let terminated_reason = terminated_reason.filter(|r| !r.is_empty());

        let pending = phase == Some("Pending") && pending_due(input.pending_minutes);
        if waiting_reason.is_none() && terminated_reason.is_none() && !pending {
            continue;
        }
        let classification = classify_pod_status(
            &PodStatus {
                waiting_reason,
                terminated_reason,
                phase,
                pending_minutes: input.pending_minutes,
                container,
            },
            pending_threshold,
        );
        let category = classification.category;
        let mut finding = ScanFinding::from_classification(
            classification,
            pod_ref(),
            pod_commands(namespace, name, category),
        );
        if category.wants_logs() {
            if let (Some(container), Some(logs)) = (container, input.logs) {
                if let Some(lines) = logs.get(container).and_then(Value::as_array) {
                    finding.evidence_snippet = Some(log_snippet(container, lines));
                    finding.evidence_refs = vec![format!("pod-{}-{}-{}", namespace, name, container)];
                }
            }
        }
        finding.occurred_at = occurred_at_for_container(Some(cs), pod);
        out.push(finding);
    }

    let overdue = input
        .pending_minutes
        .is_some_and(|m| m >= f64::from(pending_threshold));
    if statuses.is_empty() && phase == Some("Pending") && overdue {
        let classification = classify_pod_status(
            &PodStatus {
                phase,
                pending_minutes: input.pending_minutes,
                ..Default::default()
            },
            pending_threshold,
        );
        let mut finding = ScanFinding::from_classification(
            classification,
            pod_ref(),
            pod_commands(namespace, name, ScanCategory::Scheduling),
        );
        finding.occurred_at = occurred_at_for_container(None, pod);
        out.push(finding);
    }
    out
}

pub fn scan_node(node: &Value) -> Vec<ScanFinding> {
    let name = node_name(node);
    let occurred_at = occurred_at_for_node(node);
    classify_node(node)
        .into_iter()
        .map(|c| {
            let mut finding = ScanFinding::from_classification(
                c,
                ResourceRef {
                    kind: "Node".to_string(),
                    namespace: None,
                    name: name.to_string(),
                },
                node_commands(name),
            );
            finding.occurred_at = occurred_at.clone();
            finding
        })
        .collect()
}

/// A Deployment or StatefulSet whose ready count differs from desired.
pub fn scan_workload(kind: &str, workload: &Value) -> Option<ScanFinding> {
    let namespace = workload.at(&["metadata", "namespace"]).and_then(Value::as_str).unwrap_or("default");
    let name = workload.at(&["metadata", "name"]).and_then(Value::as_str).unwrap_or("unknown");
    let desired = workload.at(&["spec", "replicas"]).and_then(Value::as_i64).unwrap_or(0);
    let ready = workload.at(&["status", "readyReplicas"]).and_then(Value::as_i64).unwrap_or(0);
    if desired == ready {
        return None;
    }
    Some(ScanFinding::from_classification(
        classify_replica_mismatch(kind, namespace, name, desired, ready),
        ResourceRef {
            kind: kind.to_string(),
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        },
        workload_commands(kind, namespace, name),
    ))
}

// ── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub generated_at: String,
    pub findings: Vec<ScanFinding>,
    pub counts: SeverityCounts,
    pub summary_markdown: String,
    /// Collection errors joined with `; ` (partial results).
    pub error: Option<String>,
}

impl ScanReport {
    /// Cap at `max_findings` in discovery order, then rank most severe first.
    pub fn build(mut findings: Vec<ScanFinding>, errors: &[String], max_findings: usize, generated_at: &str) -> Self {
        findings.truncate(max_findings);
        findings.sort_by(|a, b| (b.severity, &b.title).cmp(&(a.severity, &a.title)));

        let mut counts = SeverityCounts::default();
        for f in &findings {
            counts.add(f.severity);
        }

        let mut lines = vec![
            format!("## Scan summary ({})", generated_at),
            format!(
                "- **Critical:** {} | **High:** {} | **Medium:** {} | **Low:** {} | **Info:** {}",
                counts.critical, counts.high, counts.medium, counts.low, counts.info
            ),
            format!("- Total findings: {}", findings.len()),
        ];
        if !errors.is_empty() {
            lines.push("\n**Errors (partial results):**".to_string());
            lines.extend(errors.iter().map(|e| format!("- {}", e)));
        }

        Self {
            generated_at: generated_at.to_string(),
            findings,
            counts,
            summary_markdown: lines.join("\n"),
            error: (!errors.is_empty()).then(|| errors.join("; ")),
        }
    }

    pub fn most_severe(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }
}

/// Raw objects gathered by a collector for one scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterDump {
    pub pods: Vec<Value>,
    pub nodes: Vec<Value>,
    pub deployments: Vec<Value>,
    pub statefulsets: Vec<Value>,
    /// `namespace/name` → minutes spent Pending.
    pub pending_minutes: BTreeMap<String, f64>,
    /// `namespace/name` → `{container: [line, ...]}`.
    pub logs: BTreeMap<String, Value>,
    /// Collection errors (RBAC, scope) carried into the report.
    pub errors: Vec<String>,
}

fn object_key(object: &Value) -> String {
    format!(
        "{}/{}",
        object.at(&["metadata", "namespace"]).and_then(Value::as_str).unwrap_or(""),
        object.at(&["metadata", "name"]).and_then(Value::as_str).unwrap_or("")
    )
}

/// Scan pods, then workloads, then nodes, and build the report.
pub fn scan_cluster(dump: &ClusterDump, config: &ScanConfig, generated_at: &str) -> ScanReport {
    let max = config.max_findings;
    let mut findings: Vec<ScanFinding> = Vec::new();

    for pod in &dump.pods {
        if findings.len() >= max {
            break;
        }
        let key = object_key(pod);
        let input = PodScan {
            pod,
            pending_minutes: dump.pending_minutes.get(&key).copied(),
            logs: dump.logs.get(&key),
        };
        findings.extend(scan_pod(&input, config.pending_minutes));
    }

    let workloads = dump
        .deployments
        .iter()
        .map(|w| ("Deployment", w))
        .chain(dump.statefulsets.iter().map(|w| ("StatefulSet", w)));
    for (kind, workload) in workloads {
        if findings.len() >= max {
            break;
        }
        findings.extend(scan_workload(kind, workload));
    }

    for node in &dump.nodes {
        if findings.len() >= max {
            break;
        }
        findings.extend(scan_node(node));
    }

    tracing::debug!(
        pods = dump.pods.len(),
        nodes = dump.nodes.len(),
        findings = findings.len(),
        "cluster scan classified"
    );
    let report = ScanReport::build(findings, &dump.errors, max, generated_at);
    if let Some(top) = report.findings.first() {
        tracing::info!(severity = %top.severity, title = %top.title, "most severe scan finding");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status<'a>() -> PodStatus<'a> {
        PodStatus::default()
    }

    #[test]
    fn oom_is_high_resources() {
        let c = classify_pod_status(
            &PodStatus {
                terminated_reason: Some("OOMKilled"),
                container: Some("app"),
                ..status()
            },
            5,
        );
        assert_eq!((c.severity, c.category), (Severity::High, ScanCategory::Resources));
        assert_eq!(c.title, "Pod container OOMKilled");
        assert!(c.description.contains("(container: app)"));
    }

    #[test]
    fn terminated_reason_beats_waiting_reason() {
        let c = classify_pod_status(
            &PodStatus {
                waiting_reason: Some("CrashLoopBackOff"),
                terminated_reason: Some("Error"),
                ..status()
            },
            5,
        );
        assert_eq!((c.severity, c.category), (Severity::Medium, ScanCategory::Crash));
        assert_eq!(c.title, "Pod container terminated: Error");
    }

    #[test]
    fn waiting_reasons() {
        let image = classify_pod_status(&PodStatus { waiting_reason: Some("ErrImagePull"), ..status() }, 5);
        assert_eq!((image.severity, image.category), (Severity::High, ScanCategory::Image));
        assert_eq!(image.title, "Image pull failed");

        let crash = classify_pod_status(&PodStatus { waiting_reason: Some("CrashLoopBackOff"), ..status() }, 5);
        assert_eq!((crash.severity, crash.category), (Severity::High, ScanCategory::Crash));

        let other = classify_pod_status(&PodStatus { waiting_reason: Some("ContainerCreating"), ..status() }, 5);
        assert_eq!((other.severity, other.category), (Severity::Low, ScanCategory::Scheduling));
        assert_eq!(other.title, "Pod waiting: ContainerCreating");
    }

    #[test]
    fn pending_threshold() {
        let long = classify_pod_status(
            &PodStatus { phase: Some("Pending"), pending_minutes: Some(12.7), ..status() },
            5,
        );
        assert_eq!(long.title, "Pod Pending too long");
        assert_eq!(long.severity, Severity::Medium);
        assert!(long.description.contains("12+ minutes"));

        let short = classify_pod_status(
            &PodStatus { phase: Some("Pending"), pending_minutes: Some(1.0), ..status() },
            5,
        );
        assert_eq!((short.severity, short.title.as_str()), (Severity::Info, "Pod Pending"));

        let unknown = classify_pod_status(&PodStatus { phase: Some("Running"), ..status() }, 5);
        assert_eq!((unknown.severity, unknown.category), (Severity::Info, ScanCategory::Unknown));
    }

    #[test]
    fn node_pressure_and_not_ready() {
        let node = json!({
            "metadata": {"name": "node-1"},
            "status": {"conditions": [
                {"type": "MemoryPressure", "status": "True", "lastTransitionTime": "2024-05-01T10:00:00Z"},
                {"type": "DiskPressure", "status": "False"},
                {"type": "PIDPressure", "status": "True"},
                {"type": "NetworkUnavailable", "status": "True", "lastTransitionTime": "2024-05-01T11:00:00"},
                {"type": "Ready", "status": "Unknown"}
            ]}
        });
        let titles: Vec<(Severity, String)> = classify_node(&node).into_iter().map(|c| (c.severity, c.title)).collect();
        assert_eq!(
            titles,
            vec![
                (Severity::High, "Node under MemoryPressure".to_string()),
                (Severity::Medium, "Node under PIDPressure".to_string()),
                (Severity::Low, "Node condition: NetworkUnavailable".to_string()),
                (Severity::Critical, "Node NotReady".to_string()),
            ]
        );
        assert_eq!(occurred_at_for_node(&node).as_deref(), Some("2024-05-01T11:00:00Z"));
        let findings = scan_node(&node);
        assert_eq!(findings[0].suggested_commands[0], "kubectl describe node node-1");
        assert_eq!(findings[0].affected_refs[0].namespace, None);
    }

    #[test]
    fn healthy_node_has_no_findings() {
        let node = json!({"metadata": {"name": "n"}, "status": {"conditions": [
            {"type": "Ready", "status": "True"},
            {"type": "MemoryPressure", "status": "False"}
        ]}});
        assert!(classify_node(&node).is_empty());
        assert!(classify_node(&json!({})).is_empty());
    }

    #[test]
    fn replica_mismatch_severity() {
        assert_eq!(classify_replica_mismatch("Deployment", "shop", "web", 3, 0).severity, Severity::High);
        let partial = classify_replica_mismatch("Deployment", "shop", "web", 3, 1);
        assert_eq!(partial.severity, Severity::Medium);
        assert_eq!(partial.title, "Deployment replica mismatch");
        assert_eq!(
            partial.description,
            "Deployment shop/web: desired=3, ready=1. Check pod status and events."
        );
        let workload = json!({"metadata": {"namespace": "shop", "name": "web"}, "spec": {"replicas": 2}, "status": {"readyReplicas": 2}});
        assert!(scan_workload("Deployment", &workload).is_none());
    }

    #[test]
    fn container_timestamps_prefer_last_termination() {
        let pod = json!({"metadata": {"creationTimestamp": "2024-05-01T09:00:00Z"}});
        let cs = json!({
            "lastState": {"terminated": {"startedAt": "2024-05-01T09:30:00Z", "finishedAt": "2024-05-01T09:45:00Z"}},
            "state": {"running": {"startedAt": "2024-05-01T09:46:00Z"}}
        });
        assert_eq!(occurred_at_for_container(Some(&cs), &pod).as_deref(), Some("2024-05-01T09:45:00Z"));
        let running = json!({"state": {"running": {"startedAt": "2024-05-01T09:46:00"}}});
        assert_eq!(occurred_at_for_container(Some(&running), &pod).as_deref(), Some("2024-05-01T09:46:00Z"));
        assert_eq!(occurred_at_for_container(None, &pod).as_deref(), Some("2024-05-01T09:00:00Z"));
        assert_eq!(occurred_at_for_container(None, &json!({})), None);
    }

    #[test]
    fn pod_scan_attaches_redacted_log_snippet() {
        let pod = json!({
            "metadata": {"namespace": "shop", "name": "api-1"},
            "status": {"phase": "Running", "containerStatuses": [{
                "name": "api",
                "state": {"waiting": {"reason": "CrashLoopBackOff"}},
                "lastState": {"terminated": {"reason": "Error", "finishedAt": "2024-05-01T10:00:00Z"}}
            }]}
        });
        let logs = json!({"api": ["boot", "Authorization: Bearer abc", "panic"]});
        let findings = scan_pod(&PodScan { pod: &pod, pending_minutes: None, logs: Some(&logs) }, 5);
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.title, "Pod container terminated: Error");
        assert_eq!(f.evidence_refs, vec!["pod-shop-api-1-api"]);
        let snippet = f.evidence_snippet.as_deref().unwrap();
        assert!(snippet.contains("panic"));
        assert!(!snippet.contains("abc"));
        assert_eq!(f.occurred_at.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert_eq!(f.suggested_commands.len(), 3);
    }

    #[test]
    fn pending_pod_without_statuses_needs_known_age() {
        let pod = json!({"metadata": {"namespace": "ns", "name": "p"}, "status": {"phase": "Pending"}});
        assert!(scan_pod(&PodScan { pod: &pod, pending_minutes: None, logs: None }, 5).is_empty());
        assert!(scan_pod(&PodScan { pod: &pod, pending_minutes: Some(2.0), logs: None }, 5).is_empty());
        let findings = scan_pod(&PodScan { pod: &pod, pending_minutes: Some(9.0), logs: None }, 5);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Pod Pending too long");
    }

    #[test]
    fn report_caps_sorts_and_counts() {
        let mk = |severity, title: &str| ScanFinding {
            severity,
            category: ScanCategory::Node,
            title: title.to_string(),
            description: String::new(),
            affected_refs: vec![],
            evidence_refs: vec![],
            suggested_commands: vec![],
            evidence_snippet: None,
            occurred_at: None,
        };
        let findings = vec![
            mk(Severity::Low, "a"),
            mk(Severity::Critical, "b"),
            mk(Severity::High, "a"),
            mk(Severity::High, "c"),
            mk(Severity::Info, "dropped"),
        ];
        let errors = vec!["list nodes: Forbidden".to_string()];
        let report = ScanReport::build(findings, &errors, 4, "2024-05-01T10:00:00Z");
        let order: Vec<(Severity, &str)> = report.findings.iter().map(|f| (f.severity, f.title.as_str())).collect();
        assert_eq!(
            order,
            vec![(Severity::Critical, "b"), (Severity::High, "c"), (Severity::High, "a"), (Severity::Low, "a")]
        );
        assert_eq!(report.counts.high, 2);
        assert_eq!(report.counts.info, 0);
        assert!(report.summary_markdown.starts_with("## Scan summary (2024-05-01T10:00:00Z)"));
        assert!(report.summary_markdown.contains("- Total findings: 4"));
        assert!(report.summary_markdown.contains("- list nodes: Forbidden"));
        assert_eq!(report.error.as_deref(), Some("list nodes: Forbidden"));
        assert_eq!(report.most_severe(), Some(Severity::Critical));
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Severity::Critical).unwrap(), json!("critical"));
        assert_eq!(serde_json::to_value(ScanCategory::Resources).unwrap(), json!("resources"));
    }
}
