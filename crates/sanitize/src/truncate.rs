//! Character-budget truncation of evidence trees.
//!
//! Reduction happens in a fixed order so the same input and budget always
//! give the same output:
//!
//! 1. High-volume collections are capped: event/log lists keep their first
//!    `max_list_items` entries (the dropped count goes under a sibling
//!    `_<key>_truncated` marker), per-container log maps keep the last
//!    `max_log_lines` lines of each container.
//! 2. While still over budget, the largest remaining top-level member is
//!    replaced by a `[TRUNCATED: N chars]` placeholder.
//!
//! A step is skipped when it would not shrink the tree, so the result is
//! never larger than the input. When nothing else can be shed the result is
//! returned over budget; callers embedding it in a prompt apply their own caps.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use beaver_core::serialized_len;

/// Knobs for the first (collection-capping) reduction step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruncationPolicy {
    /// Entries kept from the head of a high-volume list.
    pub max_list_items: usize,
    /// Lines kept from the tail of each container's log.
    pub max_log_lines: usize,
    /// Top-level keys holding event lists or log collections.
    pub high_volume_keys: Vec<String>,
}

impl Default for TruncationPolicy {
    fn default() -> Self {
        Self {
            max_list_items: 50,
            max_log_lines: 200,
            high_volume_keys: [
                "pod_logs",
                "previous_logs",
                "events",
                "pod_events",
                "workload_events",
                "node_events",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// What a truncation pass cut. Descriptive only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TruncationReport {
    /// True when the input exceeded the budget.
    pub truncated: bool,
    /// Paths of shrunk or replaced sections, in the order they were cut.
    pub sections_truncated: Vec<String>,
    pub total_chars_before: usize,
    pub total_chars_after: usize,
}

impl TruncationReport {
    pub fn within(&self, max_chars: usize) -> bool {
        self.total_chars_after <= max_chars
    }
}

/// Keep the last `max_lines` lines.
pub fn truncate_log_lines<T: Clone>(lines: &[T], max_lines: usize) -> Vec<T> {
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].to_vec()
}

/// Truncate with the default policy.
pub fn truncate(tree: &Value, max_chars: usize) -> (Value, TruncationReport) {
    truncate_with(tree, max_chars, &TruncationPolicy::default())
}

pub fn truncate_with(
    tree: &Value,
    max_chars: usize,
    policy: &TruncationPolicy,
) -> (Value, TruncationReport) {
    let before = serialized_len(tree);
    let mut report = TruncationReport {
        truncated: false,
        sections_truncated: Vec::new(),
        total_chars_before: before,
        total_chars_after: before,
    };
    if before <= max_chars {
        return (tree.clone(), report);
    }
    report.truncated = true;

    let Some(root) = tree.as_object() else {
        tracing::warn!(chars = before, max_chars, "evidence over budget but not an object; left as is");
        return (tree.clone(), report);
    };

    let mut out = root.clone();
    cap_high_volume(&mut out, policy, &mut report.sections_truncated);
    if object_len(&out) > max_chars {
        shed_largest(&mut out, max_chars, &mut report.sections_truncated);
    }

    report.total_chars_after = object_len(&out);
    tracing::debug!(
        before = report.total_chars_before,
        after = report.total_chars_after,
        sections = ?report.sections_truncated,
        "evidence truncated"
    );
    if report.total_chars_after > max_chars {
        tracing::warn!(
            after = report.total_chars_after,
            max_chars,
            "evidence still over budget after truncation"
        );
    }
    (Value::Object(out), report)
}

fn object_len(map: &Map<String, Value>) -> usize {
    serde_json::to_string(map)
        .map(|s| s.chars().count())
        .unwrap_or(0)
}

fn marker_key(key: &str) -> String {
    format!("_{}_truncated", key)
}

fn is_marker(key: &str) -> bool {
    key.starts_with('_')
}

fn record(sections: &mut Vec<String>, path: String) {
    if !sections.contains(&path) {
        sections.push(path);
    }
}

/// Step 1: cap lists and tail per-container logs under the designated keys.
fn cap_high_volume(out: &mut Map<String, Value>, policy: &TruncationPolicy, sections: &mut Vec<String>) {
    for key in &policy.high_volume_keys {
        let Some(value) = out.get(key) else {
            continue;
        };
        match value {
            Value::Array(items) if items.len() > policy.max_list_items => {
                let dropped = items.len() - policy.max_list_items;
                let kept: Vec<Value> = items[..policy.max_list_items].to_vec();
                let len_before = object_len(out);
                let previous_marker = out.get(&marker_key(key)).cloned();
                let original = out.insert(key.clone(), Value::Array(kept));
                out.insert(marker_key(key), Value::from(dropped));
                if object_len(out) > len_before {
                    // The marker costs more than the dropped entries.
                    if let Some(original) = original {
                        out.insert(key.clone(), original);
                    }
                    match previous_marker {
                        Some(marker) => {
                            out.insert(marker_key(key), marker);
                        }
                        None => {
                            out.shift_remove(&marker_key(key));
                        }
                    }
                    continue;
                }
                record(sections, key.clone());
            }
            Value::Object(_) => {
                let Some(Value::Object(per_container)) = out.get_mut(key) else {
                    continue;
                };
                for (container, lines) in per_container.iter_mut() {
                    let Value::Array(lines) = lines else {
                        continue;
                    };
                    if lines.len() > policy.max_log_lines {
                        *lines = truncate_log_lines(lines, policy.max_log_lines);
                        record(sections, format!("{}.{}", key, container));
                    }
                }
            }
            _ => {}
        }
    }
}

/// Step 2: replace the largest top-level member until under budget.
fn shed_largest(out: &mut Map<String, Value>, max_chars: usize, sections: &mut Vec<String>) {
    let mut shed: Vec<String> = Vec::new();
    let mut current = object_len(out);

    while current > max_chars {
        // First key wins ties so the choice does not depend on sort stability.
        let mut largest: Option<(&String, usize)> = None;
        for (key, value) in out.iter() {
            if is_marker(key) || shed.contains(key) {
                continue;
            }
            let size = serialized_len(value);
            if largest.map_or(true, |(_, best)| size > best) {
                largest = Some((key, size));
            }
        }
        let Some((key, size)) = largest else {
            break;
        };
        let key = key.clone();

        let placeholder = Value::String(format!("[TRUNCATED: {} chars]", size));
        let placeholder_len = serialized_len(&placeholder);
        if placeholder_len >= size {
            // The largest member is already smaller than a placeholder.
            break;
        }
        out.insert(key.clone(), placeholder);
        current = current - size + placeholder_len;
        record(sections, key.clone());
        shed.push(key);
    }
}
