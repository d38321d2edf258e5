//! Secret redaction over evidence trees.
//!
//! Two independent rule families:
//! - **Key rules**: a member whose normalized key contains a sensitive
//!   fragment is replaced wholesale, without looking at its value.
//! - **Value rules**: any other string is checked for bearer/basic/token
//!   markers, long base64 blobs, and `PASSWORD=...`-style assignments.
//!
//! Replacement markers never match a rule themselves, so redacting twice
//! gives the same tree as redacting once.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use beaver_core::EvidencePath;

pub const REDACTED: &str = "[REDACTED]";
pub const REDACTED_BASE64: &str = "[REDACTED_BASE64]";
pub const REDACTED_ENV: &str = "[REDACTED_ENV]";

/// Matched against keys lower-cased with separators stripped.
const SENSITIVE_KEY_FRAGMENTS: &[&str] = &[
    "token",
    "bearer",
    "authorization",
    "secret",
    "password",
    "apikey",
    "credentials",
    "cookie",
    "auth",
    "privatekey",
    "clientsecret",
];

/// Matched case-insensitively anywhere in a string value.
const SECRET_VALUE_MARKERS: &[&str] = &["bearer ", "basic ", "token"];

/// Strings must be longer than this to count as a base64 blob.
const BASE64_MIN_CHARS: usize = 40;

static BASE64_BLOB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/]+={0,2}$").unwrap());

static SENSITIVE_ENV_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(PASSWORD|SECRET|TOKEN|KEY|CREDENTIAL|PRIVATE|AUTH)(_[A-Z0-9_]*)?=").unwrap()
});

/// Which rule replaced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionRule {
    SensitiveKey,
    SecretMarker,
    Base64Blob,
    EnvAssignment,
}

impl RedactionRule {
    /// The literal written in place of the redacted value.
    pub fn replacement(self) -> &'static str {
        match self {
            RedactionRule::SensitiveKey | RedactionRule::SecretMarker => REDACTED,
            RedactionRule::Base64Blob => REDACTED_BASE64,
            RedactionRule::EnvAssignment => REDACTED_ENV,
        }
    }
}

/// One replaced value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Redaction {
    pub path: EvidencePath,
    pub rule: RedactionRule,
}

/// Side report of a redaction pass, in tree order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RedactionReport {
    pub redactions: Vec<Redaction>,
}

impl RedactionReport {
    pub fn is_empty(&self) -> bool {
        self.redactions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.redactions.len()
    }
}

/// True when the key, lower-cased with `_`, `-`, `.` and whitespace removed,
/// contains a sensitive fragment.
pub fn is_sensitive_key(key: &str) -> bool {
    let normalized: String = key
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | '.') && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    SENSITIVE_KEY_FRAGMENTS
        .iter()
        .any(|fragment| normalized.contains(fragment))
}

/// The value rule a string trips, if any.
pub fn classify_text(value: &str) -> Option<RedactionRule> {
    let lower = value.to_lowercase();
    if SECRET_VALUE_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(RedactionRule::SecretMarker);
    }
    let trimmed = value.trim();
    if trimmed.chars().count() > BASE64_MIN_CHARS && BASE64_BLOB.is_match(trimmed) {
        return Some(RedactionRule::Base64Blob);
    }
    if SENSITIVE_ENV_ASSIGNMENT.is_match(trimmed) {
        return Some(RedactionRule::EnvAssignment);
    }
    None
}

/// Apply the value rules to a single string (log lines, snippets).
pub fn redact_text(value: &str) -> Cow<'_, str> {
    match classify_text(value) {
        Some(rule) => Cow::Borrowed(rule.replacement()),
        None => Cow::Borrowed(value),
    }
}

/// Redact a tree, discarding the report.
pub fn redact(tree: &Value) -> Value {
    redact_with_report(tree).0
}

/// Redact a tree and list every replaced path.
pub fn redact_with_report(tree: &Value) -> (Value, RedactionReport) {
    let mut report = RedactionReport::default();
    let redacted = walk(tree, &EvidencePath::root(), &mut report);
    if !report.is_empty() {
        tracing::debug!(redactions = report.len(), "evidence redacted");
    }
    (redacted, report)
}

fn walk(value: &Value, path: &EvidencePath, report: &mut RedactionReport) -> Value {
    match value {
        Value::Object(map) => Value::Object(walk_object(map, path, report)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| walk(item, &path.clone().index(i), report))
                .collect(),
        ),
        Value::String(s) => match classify_text(s) {
            Some(rule) => {
                report.redactions.push(Redaction {
                    path: path.clone(),
                    rule,
                });
                Value::String(rule.replacement().to_string())
            }
            None => value.clone(),
        },
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
    }
}

fn walk_object(
    map: &Map<String, Value>,
    path: &EvidencePath,
    report: &mut RedactionReport,
) -> Map<String, Value> {
    let mut out = Map::with_capacity(map.len());
    for (key, child) in map {
        let child_path = path.clone().key(key.as_str());
        if is_sensitive_key(key) {
            report.redactions.push(Redaction {
                path: child_path,
                rule: RedactionRule::SensitiveKey,
            });
            out.insert(key.clone(), Value::String(REDACTED.to_string()));
        } else {
            out.insert(key.clone(), walk(child, &child_path, report));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_rule_wins_before_value_rules() {
        let tree = json!({"AUTHORIZATION_TOKEN": "Bearer abc123"});
        let (out, report) = redact_with_report(&tree);
        assert_eq!(out, json!({"AUTHORIZATION_TOKEN": "[REDACTED]"}));
        assert_eq!(report.len(), 1);
        assert_eq!(report.redactions[0].rule, RedactionRule::SensitiveKey);
        assert_eq!(report.redactions[0].path.to_string(), "AUTHORIZATION_TOKEN");
    }

    #[test]
    fn key_normalization_strips_separators() {
        assert!(is_sensitive_key("api_key"));
        assert!(is_sensitive_key("Client-Secret"));
        assert!(is_sensitive_key("x.private.key"));
        assert!(is_sensitive_key("Set-Cookie"));
        assert!(!is_sensitive_key("restartCount"));
        assert!(!is_sensitive_key("image"));
    }

    #[test]
    fn key_rule_replaces_non_string_values() {
        let tree = json!({"credentials": {"user": "admin"}, "password": 1234});
        let out = redact(&tree);
        assert_eq!(out, json!({"credentials": "[REDACTED]", "password": "[REDACTED]"}));
    }

    #[test]
    fn value_markers_are_case_insensitive() {
        assert_eq!(classify_text("Authorization: BASIC dXNlcjpwYXNz"), Some(RedactionRule::SecretMarker));
        assert_eq!(classify_text("got Token from cache"), Some(RedactionRule::SecretMarker));
        assert_eq!(classify_text("Back-off restarting failed container"), None);
    }

    #[test]
    fn long_base64_values_are_redacted() {
        let blob = "QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVphYmNkZWZnaGlqa2xtbm9w";
        assert!(blob.len() > 40);
        assert_eq!(classify_text(blob), Some(RedactionRule::Base64Blob));
        assert_eq!(classify_text(&format!("{blob}==")), Some(RedactionRule::Base64Blob));
        // Short or non-alphabet strings are left alone.
        assert_eq!(classify_text("QUJDREVG"), None);
        assert_eq!(classify_text(&format!("{blob} with spaces")), None);
    }

    #[test]
    fn env_assignments_with_sensitive_prefix() {
        assert_eq!(classify_text("PASSWORD=hunter2"), Some(RedactionRule::EnvAssignment));
        assert_eq!(classify_text("secret_key_base=abc"), Some(RedactionRule::EnvAssignment));
        assert_eq!(classify_text("  AUTH_HEADER=x"), Some(RedactionRule::EnvAssignment));
        assert_eq!(classify_text("KEY="), Some(RedactionRule::EnvAssignment));
        assert_eq!(classify_text("DB_PASSWORD=x"), None);
        assert_eq!(classify_text("LOG_LEVEL=debug"), None);
    }

    #[test]
    fn nested_arrays_and_scalars() {
        let tree = json!({
            "pod_logs": {"app": ["starting", "using bearer abcdef", "PRIVATE_KEY_PATH=/x"]},
            "restartCount": 3,
            "ready": false,
            "reason": null
        });
        let (out, report) = redact_with_report(&tree);
        assert_eq!(
            out,
            json!({
                "pod_logs": {"app": ["starting", "[REDACTED]", "[REDACTED_ENV]"]},
                "restartCount": 3,
                "ready": false,
                "reason": null
            })
        );
        let paths: Vec<String> = report.redactions.iter().map(|r| r.path.to_string()).collect();
        assert_eq!(paths, vec!["pod_logs.app[1]", "pod_logs.app[2]"]);
    }

    #[test]
    fn redaction_is_idempotent() {
        let tree = json!({
            "env": ["TOKEN=abc", "MODE=prod"],
            "cookie": "a=b",
            "blob": "QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVphYmNkZWZnaGlqa2xtbm9w"
        });
        let once = redact(&tree);
        assert_eq!(redact(&once), once);
    }

    #[test]
    fn redact_text_borrows_clean_input() {
        assert!(matches!(redact_text("plain line"), Cow::Borrowed("plain line")));
        assert_eq!(redact_text("bearer xyz"), "[REDACTED]");
    }
}
