//! Snapshots: the evidence and analysis stored for one past diagnosis.
//!
//! Stored evidence summaries are capped by the persistence layer, so the
//! JSON text may stop mid-value. Such text is salvaged by cutting it back to
//! the last complete value and closing every bracket still open.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use beaver_core::AnalysisJson;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "empty_object")]
    pub evidence: Value,
    #[serde(default)]
    pub analysis: AnalysisJson,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            evidence: empty_object(),
            analysis: AnalysisJson::default(),
        }
    }
}

impl Snapshot {
    pub fn new(evidence: Value, analysis: AnalysisJson) -> Self {
        Self { evidence, analysis }
    }

    /// Build from a stored, possibly cut-off evidence summary.
    pub fn from_stored(evidence_summary: Option<&str>, analysis: AnalysisJson) -> Self {
        Self {
            evidence: parse_stored_evidence(evidence_summary.unwrap_or("")),
            analysis,
        }
    }
}

/// Blank → `{}`; valid JSON as is; cut-off JSON salvaged; otherwise `{}`.
pub fn parse_stored_evidence(text: &str) -> Value {
    let text = text.trim();
    if text.is_empty() {
        return empty_object();
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(err) => match salvage(text) {
            Some(value) => {
                tracing::warn!(%err, chars = text.chars().count(), "stored evidence was cut off; salvaged prefix");
                value
            }
            None => {
                tracing::warn!(%err, "stored evidence is not JSON; using empty evidence");
                empty_object()
            }
        },
    }
}

/// A prefix of the input that ends on a complete value, with the closers
/// needed at that point.
struct Cut {
    end: usize,
    closers: String,
}

/// Recover the longest prefix of a cut-off JSON object that parses once its
/// open brackets are closed.
pub fn salvage(text: &str) -> Option<Value> {
    if !text.starts_with('{') {
        return None;
    }
    // An empty object is always a valid floor.
    let mut cuts: Vec<Cut> = vec![Cut {
        end: 1,
        closers: "}".to_string(),
    }];
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
                cuts.push(Cut {
                    end: i + c.len_utf8(),
                    closers: stack.iter().rev().collect(),
                });
                if stack.is_empty() {
                    break;
                }
            }
            ',' => cuts.push(Cut {
                end: i,
                closers: stack.iter().rev().collect(),
            }),
            _ => {}
        }
    }
    cuts.iter().rev().find_map(|cut| {
        let candidate = format!("{}{}", &text[..cut.end], cut.closers);
        serde_json::from_str::<Value>(&candidate)
            .ok()
            .filter(Value::is_object)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_and_missing_are_empty() {
        assert_eq!(parse_stored_evidence(""), json!({}));
        assert_eq!(parse_stored_evidence("   \n"), json!({}));
        assert_eq!(Snapshot::from_stored(None, AnalysisJson::default()).evidence, json!({}));
    }

    #[test]
    fn valid_json_is_parsed_as_is() {
        let text = r#"{"pod": {"status": {"phase": "Running"}}}"#;
        assert_eq!(parse_stored_evidence(text), json!({"pod": {"status": {"phase": "Running"}}}));
    }

    #[test]
    fn cut_off_json_keeps_complete_members() {
        let text = r#"{"pod": {"status": {"phase": "Pending", "conditions": [{"type": "Ready", "status": "False"}, {"type": "Sched"#;
        assert_eq!(
            parse_stored_evidence(text),
            json!({"pod": {"status": {"phase": "Pending", "conditions": [{"type": "Ready", "status": "False"}]}}})
        );
    }

    #[test]
    fn cut_inside_string_with_brackets() {
        let text = r#"{"a": "x}]\"y", "b": {"c": 1}, "d": "unterminated [ {"#;
        assert_eq!(parse_stored_evidence(text), json!({"a": "x}]\"y", "b": {"c": 1}}));
    }

    #[test]
    fn cut_right_after_key_falls_back_to_previous_member() {
        let text = r#"{"target": {"kind": "Pod"}, "pod": "#;
        assert_eq!(parse_stored_evidence(text), json!({"target": {"kind": "Pod"}}));
    }

    #[test]
    fn trailing_junk_after_complete_object() {
        assert_eq!(parse_stored_evidence(r#"{"a": [1, 2]} trailing"#), json!({"a": [1, 2]}));
    }

    #[test]
    fn garbage_is_empty() {
        assert_eq!(parse_stored_evidence("not json at all"), json!({}));
        assert_eq!(parse_stored_evidence("[1, 2"), json!({}));
        assert_eq!(parse_stored_evidence("{\"a"), json!({}));
    }

    #[test]
    fn snapshot_deserializes_with_defaults() {
        let snap: Snapshot = serde_json::from_value(json!({})).unwrap();
        assert_eq!(snap, Snapshot::default());
    }
}
