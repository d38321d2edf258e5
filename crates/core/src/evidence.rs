//! The evidence tree and safe lookups over it.
//!
//! Evidence is a `serde_json::Value` built with `preserve_order`, so object
//! keys keep the order the collector wrote them in. Every lookup here is
//! total: a missing key, a type mismatch, or an out-of-range index yields
//! `None` (or an empty slice), never an error.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::path::{EvidencePath, Segment};

/// A serialized snapshot of one or more Kubernetes objects.
pub type Evidence = Value;

/// Event lists a collector may attach, scoped to pod, workload, or node.
pub const EVENT_LIST_KEYS: &[&str] = &[
    "pod_events",
    "workload_events",
    "deployment_events",
    "statefulset_events",
    "daemonset_events",
    "replicaset_events",
    "job_events",
    "node_events",
];

/// Workload objects that declare a desired replica count.
pub const WORKLOAD_KEYS: &[&str] = &["deployment", "statefulset", "daemonset", "replicaset"];

static NULL: Value = Value::Null;

/// Optional-chaining accessors for evidence values.
pub trait EvidenceExt {
    /// Object member, or `None` when absent or `self` is not an object.
    fn field(&self, key: &str) -> Option<&Value>;

    /// Object member, or `Value::Null` when absent. Mirrors "missing equals null"
    /// comparisons used by the diff rules.
    fn field_or_null(&self, key: &str) -> &Value;

    /// Member that is an array; empty when absent or of another type.
    fn items(&self, key: &str) -> &[Value];

    /// Member that is a string.
    fn text(&self, key: &str) -> Option<&str>;

    /// Member that is a string, trimmed; empty string when absent.
    fn trimmed(&self, key: &str) -> &str;

    /// Walk a chain of object keys.
    fn at(&self, keys: &[&str]) -> Option<&Value>;

    /// Resolve a typed path. Wildcards do not resolve to a single value.
    fn resolve(&self, path: &EvidencePath) -> Option<&Value>;

    /// True for null, empty strings, empty arrays, and empty objects.
    fn is_blank(&self) -> bool;
}

impl EvidenceExt for Value {
    fn field(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|m| m.get(key))
    }

    fn field_or_null(&self, key: &str) -> &Value {
        self.field(key).unwrap_or(&NULL)
    }

    fn items(&self, key: &str) -> &[Value] {
        self.field(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    fn trimmed(&self, key: &str) -> &str {
        self.text(key).map(str::trim).unwrap_or("")
    }

    fn at(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().try_fold(self, |node, key| node.field(key))
    }

    fn resolve(&self, path: &EvidencePath) -> Option<&Value> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| step(node, segment))
    }

    fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }
}

fn step<'a>(node: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match segment {
        Segment::Key(key) => node.field(key),
        Segment::Index(index) => node.as_array().and_then(|items| items.get(*index)),
        Segment::Select(name) => {
            let items = node.as_array()?;
            items
                .iter()
                .find(|item| item.text("name") == Some(name.as_str()))
                .or_else(|| {
                    items
                        .iter()
                        .find(|item| item.text("type") == Some(name.as_str()))
                })
        }
        Segment::Each => None,
    }
}

/// Character count of the compact JSON serialization.
pub fn serialized_len(value: &Value) -> usize {
    // Serializing a `Value` cannot fail: keys are always strings.
    serde_json::to_string(value)
        .map(|s| s.chars().count())
        .unwrap_or(0)
}

/// Container statuses of a serialized pod (`status.containerStatuses`).
pub fn container_statuses(pod: &Value) -> &[Value] {
    pod.field("status")
        .map(|status| status.items("containerStatuses"))
        .unwrap_or(&[])
}

/// Non-negative integer member, ignoring floats, negatives, and other types.
pub fn non_negative_count(value: &Value, key: &str) -> Option<u64> {
    value.field(key).and_then(Value::as_u64)
}

/// Read and parse a JSON document written by a collector or a store.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
