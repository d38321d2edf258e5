//! Structural diff of two snapshots (A = older, B = newer).
//!
//! Rules run in a fixed order: pod phase and conditions, container
//! statuses, the same two for every problematic pod (by index), new events,
//! container resources, analysis metadata, node conditions. Absent values
//! compare equal to `null`, so a snapshot diffed with itself yields nothing.

use serde_json::Value;

use beaver_core::{EvidenceExt, EvidencePath};

use crate::change::{ChangeKind, ChangeRecord};
use crate::snapshot::Snapshot;

const EVENT_KEYS: &[&str] = &["pod_events", "workload_events", "node_events"];
const PROBLEMATIC_PODS_KEY: &str = "problematic_pods_evidence";
const SUMMARY_PREVIEW_CHARS: usize = 200;
const EVENT_MESSAGE_PREVIEW_CHARS: usize = 100;

static NULL: Value = Value::Null;

pub fn diff(a: &Snapshot, b: &Snapshot) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();

    let pod = EvidencePath::root().key("pod");
    diff_pod(a.evidence.field_or_null("pod"), b.evidence.field_or_null("pod"), &pod, &mut changes);

    let a_pods = a.evidence.items(PROBLEMATIC_PODS_KEY);
    let b_pods = b.evidence.items(PROBLEMATIC_PODS_KEY);
    for i in 0..a_pods.len().max(b_pods.len()) {
        let a_entry = a_pods.get(i).unwrap_or(&NULL);
        let b_entry = b_pods.get(i).unwrap_or(&NULL);
        if a_entry.is_blank() && b_entry.is_blank() {
            continue;
        }
        let prefix = EvidencePath::root().key(PROBLEMATIC_PODS_KEY).index(i).key("pod");
        diff_pod(a_entry.field_or_null("pod"), b_entry.field_or_null("pod"), &prefix, &mut changes);
    }

    diff_events(&a.evidence, &b.evidence, &mut changes);
    diff_resources(&a.evidence, &b.evidence, &mut changes);
    diff_analysis(a, b, &mut changes);
    diff_node_conditions(&a.evidence, &b.evidence, &mut changes);

    tracing::debug!(changes = changes.len(), "snapshots diffed");
    changes
}

fn diff_pod(a_pod: &Value, b_pod: &Value, prefix: &EvidencePath, out: &mut Vec<ChangeRecord>) {
    diff_phase_and_conditions(a_pod, b_pod, prefix, out);
    diff_container_statuses(a_pod, b_pod, prefix, out);
}

// ── Pod phase / conditions ──────────────────────────────────────────

fn diff_phase_and_conditions(a_pod: &Value, b_pod: &Value, prefix: &EvidencePath, out: &mut Vec<ChangeRecord>) {
    let a_status = a_pod.field_or_null("status");
    let b_status = b_pod.field_or_null("status");
    if a_status.is_blank() && b_status.is_blank() {
        return;
    }
    let status = prefix.clone().key("status");

    let a_phase = a_status.field_or_null("phase");
    let b_phase = b_status.field_or_null("phase");
    if a_phase != b_phase {
        out.push(ChangeRecord::new(
            ChangeKind::PodPhase,
            status.clone().key("phase"),
            a_phase.clone(),
            b_phase.clone(),
            format!("Pod phase changed from {} to {}", display_or_na(a_phase), display_or_na(b_phase)),
        ));
    }

    let conditions = status.key("conditions");
    for (kind, a_cond, b_cond) in paired_by(a_status.items("conditions"), b_status.items("conditions"), "type") {
        if a_cond == b_cond {
            continue;
        }
        out.push(ChangeRecord::new(
            ChangeKind::Condition,
            conditions.clone().select(kind),
            a_cond.clone(),
            b_cond.clone(),
            format!(
                "Condition {}: {} -> {}",
                kind,
                display_or_na(a_cond.field_or_null("status")),
                display_or_na(b_cond.field_or_null("status"))
            ),
        ));
    }
}

// ── Container statuses ──────────────────────────────────────────────

fn diff_container_statuses(a_pod: &Value, b_pod: &Value, prefix: &EvidencePath, out: &mut Vec<ChangeRecord>) {
    let statuses = prefix.clone().key("status").key("containerStatuses");
    let a_list = a_pod.field_or_null("status").items("containerStatuses");
    let b_list = b_pod.field_or_null("status").items("containerStatuses");

    for (name, a_cs, b_cs) in paired_by(a_list, b_list, "name") {
        let base = statuses.clone().select(name);
        match (a_cs.is_null(), b_cs.is_null()) {
            (true, _) => {
                out.push(ChangeRecord::new(
                    ChangeKind::ContainerAdded,
                    base,
                    Value::Null,
                    b_cs.clone(),
                    format!("Container {} appeared or was not previously reported", name),
                ));
                continue;
            }
            (_, true) => {
                out.push(ChangeRecord::new(
                    ChangeKind::ContainerRemoved,
                    base,
                    a_cs.clone(),
                    Value::Null,
                    format!("Container {} is no longer reported", name),
                ));
                continue;
            }
            _ => {}
        }

        let a_restarts = a_cs.field_or_null("restartCount");
        let b_restarts = b_cs.field_or_null("restartCount");
        if restarts_or_zero(a_restarts) != restarts_or_zero(b_restarts) {
            out.push(ChangeRecord::new(
                ChangeKind::RestartCount,
                base.clone().key("restartCount"),
                a_restarts.clone(),
                b_restarts.clone(),
                format!(
                    "Container {} restart count: {} -> {}",
                    name,
                    display_or_na(a_restarts),
                    display_or_na(b_restarts)
                ),
            ));
        }

        for (key, kind, impact) in [
            ("state", ChangeKind::ContainerState, "state changed"),
            ("lastState", ChangeKind::LastState, "last termination/running state changed"),
        ] {
            let a_state = a_cs.field_or_null(key);
            let b_state = b_cs.field_or_null(key);
            if a_state != b_state {
                out.push(ChangeRecord::new(
                    kind,
                    base.clone().key(key),
                    a_state.clone(),
                    b_state.clone(),
                    format!("Container {} {}", name, impact),
                ));
            }
        }
    }
}

fn restarts_or_zero(value: &Value) -> Value {
    if value.is_null() {
        Value::from(0)
    } else {
        value.clone()
    }
}

// ── Events ──────────────────────────────────────────────────────────

fn diff_events(a: &Value, b: &Value, out: &mut Vec<ChangeRecord>) {
    for key in EVENT_KEYS {
        let a_len = a.items(key).len();
        let b_list = b.items(key);
        if b_list.len() <= a_len {
            continue;
        }
        for (i, event) in b_list.iter().enumerate().skip(a_len) {
            if !event.is_object() {
                continue;
            }
            let reason = event.text("reason").unwrap_or("");
            if event.text("type") != Some("Warning") && reason.is_empty() {
                continue;
            }
            let message: String = event
                .text("message")
                .unwrap_or("")
                .chars()
                .take(EVENT_MESSAGE_PREVIEW_CHARS)
                .collect();
            out.push(ChangeRecord::new(
                ChangeKind::Event,
                EvidencePath::root().key(*key).index(i),
                Value::Null,
                event.clone(),
                format!("New event: {} - {}", reason, message),
            ));
        }
    }
}

// ── Resources ───────────────────────────────────────────────────────

fn diff_resources(a: &Value, b: &Value, out: &mut Vec<ChangeRecord>) {
    let (Some(a_list), Some(b_list)) = (spec_containers(a), spec_containers(b)) else {
        return;
    };
    let path = EvidencePath::keys(["pod", "spec", "containers"]);
    for (name, a_c, b_c) in paired_by(a_list, b_list, "name") {
        let (Some(a_res), Some(b_res)) = (a_c.field("resources"), b_c.field("resources")) else {
            continue;
        };
        if a_res != b_res {
            out.push(ChangeRecord::new(
                ChangeKind::Resources,
                path.clone().select(name).key("resources"),
                a_res.clone(),
                b_res.clone(),
                format!("Container {} resources (requests/limits) changed", name),
            ));
        }
    }
}

fn spec_containers(evidence: &Value) -> Option<&[Value]> {
    evidence
        .at(&["pod", "spec", "containers"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

// ── Analysis metadata ───────────────────────────────────────────────

fn diff_analysis(a: &Snapshot, b: &Snapshot, out: &mut Vec<ChangeRecord>) {
    let base = EvidencePath::root().key("analysis_json");
    if a.analysis.summary != b.analysis.summary {
        out.push(ChangeRecord::new(
            ChangeKind::Summary,
            base.clone().key("summary"),
            Value::String(preview(&a.analysis.summary)),
            Value::String(preview(&b.analysis.summary)),
            "Summary changed",
        ));
    }
    if a.analysis.kubectl_commands != b.analysis.kubectl_commands {
        out.push(ChangeRecord::new(
            ChangeKind::KubectlCommands,
            base.key("kubectl_commands"),
            Value::from(a.analysis.kubectl_commands.clone()),
            Value::from(b.analysis.kubectl_commands.clone()),
            "Suggested kubectl commands changed",
        ));
    }
}

fn preview(text: &str) -> String {
    text.chars().take(SUMMARY_PREVIEW_CHARS).collect()
}

// ── Node conditions ─────────────────────────────────────────────────

/// `node.status.conditions`, or the flattened `node.conditions`.
fn node_conditions(evidence: &Value) -> Option<(&[Value], bool)> {
    let node = evidence.field("node")?;
    if let Some(list) = node.at(&["status", "conditions"]).and_then(Value::as_array) {
        return Some((list.as_slice(), true));
    }
    node.field("conditions")
        .and_then(Value::as_array)
        .map(|list| (list.as_slice(), false))
}

fn diff_node_conditions(a: &Value, b: &Value, out: &mut Vec<ChangeRecord>) {
    let a_found = node_conditions(a);
    let b_found = node_conditions(b);
    if a_found.is_none() && b_found.is_none() {
        return;
    }
    let under_status = b_found.or(a_found).is_some_and(|(_, nested)| nested);
    let path = if under_status {
        EvidencePath::keys(["node", "status", "conditions"])
    } else {
        EvidencePath::keys(["node", "conditions"])
    };
    let a_list = a_found.map(|(list, _)| list).unwrap_or(&[]);
    let b_list = b_found.map(|(list, _)| list).unwrap_or(&[]);

    for (kind, a_cond, b_cond) in paired_by(a_list, b_list, "type") {
        if a_cond == b_cond {
            continue;
        }
        out.push(ChangeRecord::new(
            ChangeKind::NodeCondition,
            path.clone().select(kind),
            a_cond.clone(),
            b_cond.clone(),
            format!("Node condition {} changed", kind),
        ));
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Pair list items by a string member: B's order first, then items only in
/// A. A missing side is `null`. A repeated identifier keeps its last item.
fn paired_by<'a>(a: &'a [Value], b: &'a [Value], id_key: &str) -> Vec<(&'a str, &'a Value, &'a Value)> {
    let index = |list: &'a [Value]| -> Vec<(&'a str, &'a Value)> {
        let mut out: Vec<(&'a str, &'a Value)> = Vec::new();
        for item in list {
            let Some(id) = item.text(id_key).filter(|s| !s.is_empty()) else {
                continue;
            };
            match out.iter_mut().find(|(k, _)| *k == id) {
                Some(slot) => slot.1 = item,
                None => out.push((id, item)),
            }
        }
        out
    };
    let a_index = index(a);
    let b_index = index(b);
    let lookup = |index: &[(&'a str, &'a Value)], id: &str| -> &'a Value {
        index.iter().find(|(k, _)| *k == id).map(|(_, v)| *v).unwrap_or(&NULL)
    };

    let mut pairs: Vec<(&'a str, &'a Value, &'a Value)> = b_index
        .iter()
        .map(|(id, b_item)| (*id, lookup(&a_index, *id), *b_item))
        .collect();
    pairs.extend(
        a_index
            .iter()
            .filter(|(id, _)| !b_index.iter().any(|(k, _)| k == id))
            .map(|(id, a_item)| (*id, *a_item, &NULL)),
    );
    pairs
}

fn display_or_na(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
