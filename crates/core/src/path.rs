//! Typed locators into an evidence tree.
//!
//! The textual grammar is the one the LLM prompts and UI already use:
//! keys joined by `.`, positions and selectors in brackets.
//!
//! - `pod.status.phase`
//! - `pod_events[3]`
//! - `pod.status.conditions[Ready]` (array element whose `type` or `name` is `Ready`)
//! - `pod.status.containerStatuses[].lastState` (template wildcard)
//! - `pod.status.containerStatuses["1"]` (quoted: a selector that would
//!   otherwise read as a position or break the brackets)

use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BeaverError;

/// One step of an [`EvidencePath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object member.
    Key(String),
    /// Array position.
    Index(usize),
    /// Array element whose `name` (or, failing that, `type`) equals the selector.
    Select(String),
    /// Every element of an array. Only meaningful in templates; never resolves.
    Each,
}

/// A path from the root of an evidence tree to one of its values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EvidencePath {
    segments: Vec<Segment>,
}

impl EvidencePath {
    /// The empty path, addressing the whole tree.
    pub fn root() -> Self {
        Self::default()
    }

    /// Path made of object keys only.
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: keys.into_iter().map(|k| Segment::Key(k.into())).collect(),
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(Segment::Key(key.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(Segment::Index(index));
        self
    }

    pub fn select(mut self, selector: impl Into<String>) -> Self {
        self.segments.push(Segment::Select(selector.into()));
        self
    }

    pub fn each(mut self) -> Self {
        self.segments.push(Segment::Each);
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parse the dotted/bracketed grammar. The empty string is the root path.
    pub fn parse(input: &str) -> Result<Self, BeaverError> {
        let invalid = |reason: &str| BeaverError::InvalidPath {
            path: input.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut key = String::new();
        let mut chars = input.chars().peekable();
        // Set after a closing bracket: the next char must start a new segment.
        let mut after_bracket = false;

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if key.is_empty() && !after_bracket {
                        return Err(invalid("empty key"));
                    }
                    if !key.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut key)));
                    }
                    after_bracket = false;
                    if chars.peek().is_none() {
                        return Err(invalid("trailing '.'"));
                    }
                }
                '[' => {
                    if !key.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut key)));
                    }
                    let segment = if chars.peek() == Some(&'"') {
                        chars.next();
                        Segment::Select(quoted_selector(&mut chars).map_err(|reason| invalid(reason))?)
                    } else {
                        let mut inner = String::new();
                        let mut closed = false;
                        for c in chars.by_ref() {
                            if c == ']' {
                                closed = true;
                                break;
                            }
                            if c == '[' {
                                return Err(invalid("nested '['"));
                            }
                            inner.push(c);
                        }
                        if !closed {
                            return Err(invalid("unclosed '['"));
                        }
                        bracket_segment(&inner)
                    };
                    segments.push(segment);
                    after_bracket = true;
                }
                ']' => return Err(invalid("unexpected ']'")),
                other => {
                    if after_bracket {
                        return Err(invalid("expected '.' or '[' after ']'"));
                    }
                    key.push(other);
                }
            }
        }
        if !key.is_empty() {
            segments.push(Segment::Key(key));
        }
        Ok(Self { segments })
    }
}

/// Body of a `["..."]` selector after the opening quote, through the
/// closing `]`. `\"` and `\\` are the only escapes.
fn quoted_selector(chars: &mut Peekable<Chars<'_>>) -> Result<String, &'static str> {
    let mut out = String::new();
    loop {
        match chars.next() {
            Some('\\') => match chars.next() {
                Some(c @ ('"' | '\\')) => out.push(c),
                _ => return Err("invalid escape in quoted selector"),
            },
            Some('"') => break,
            Some(c) => out.push(c),
            None => return Err("unclosed quoted selector"),
        }
    }
    match chars.next() {
        Some(']') => Ok(out),
        _ => Err("expected ']' after quoted selector"),
    }
}

/// Selectors printed bare would read back as something else.
fn needs_quotes(selector: &str) -> bool {
    selector.is_empty()
        || selector.bytes().all(|b| b.is_ascii_digit())
        || selector.contains(['[', ']', '"', '\\'])
}

fn bracket_segment(inner: &str) -> Segment {
    if inner.is_empty() {
        Segment::Each
    } else if inner.bytes().all(|b| b.is_ascii_digit()) {
        inner
            .parse()
            .map(Segment::Index)
            .unwrap_or_else(|_| Segment::Select(inner.to_string()))
    } else {
        Segment::Select(inner.to_string())
    }
}

impl fmt::Display for EvidencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                Segment::Index(index) => write!(f, "[{}]", index)?,
                Segment::Select(name) if needs_quotes(name) => {
                    f.write_str("[\"")?;
                    for c in name.chars() {
                        if matches!(c, '"' | '\\') {
                            f.write_str("\\")?;
                        }
                        write!(f, "{}", c)?;
                    }
                    f.write_str("\"]")?;
                }
                Segment::Select(name) => write!(f, "[{}]", name)?,
                Segment::Each => f.write_str("[]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for EvidencePath {
    type Err = BeaverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for EvidencePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EvidencePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mixed_segments() {
        let path = EvidencePath::keys(["pod", "status", "containerStatuses"])
            .index(0)
            .key("state")
            .key("waiting");
        assert_eq!(path.to_string(), "pod.status.containerStatuses[0].state.waiting");

        let cond = EvidencePath::keys(["pod", "status", "conditions"]).select("Ready");
        assert_eq!(cond.to_string(), "pod.status.conditions[Ready]");

        let template = EvidencePath::keys(["pod", "status", "containerStatuses"])
            .each()
            .key("lastState");
        assert_eq!(template.to_string(), "pod.status.containerStatuses[].lastState");
    }

    #[test]
    fn parse_matches_display() {
        for raw in [
            "pod.status.phase",
            "pod_events[3]",
            "problematic_pods_evidence[1].pod.status.containerStatuses[app].restartCount",
            "node.status.conditions[Ready]",
            "pod.status.containerStatuses[].lastState.terminated",
            "a[0][1].b",
        ] {
            let parsed = EvidencePath::parse(raw).unwrap();
            assert_eq!(parsed.to_string(), raw);
        }
    }

    #[test]
    fn parse_classifies_brackets() {
        let path = EvidencePath::parse("x[2][web][]").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("x".into()),
                Segment::Index(2),
                Segment::Select("web".into()),
                Segment::Each,
            ]
        );
    }

    #[test]
    fn parse_empty_is_root() {
        assert!(EvidencePath::parse("").unwrap().segments().is_empty());
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in ["a..b", ".a", "a.", "a[0", "a]", "a[0]b", "a[[0]]", "a[\"x", "a[\"x\"", "a[\"x\"y]", "a[\"\\n\"]"] {
            assert!(EvidencePath::parse(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn ambiguous_selectors_are_quoted() {
        let numeric = EvidencePath::keys(["pod", "status", "containerStatuses"])
            .select("1")
            .key("restartCount");
        assert_eq!(numeric.to_string(), "pod.status.containerStatuses[\"1\"].restartCount");

        let bracketed = EvidencePath::keys(["pod", "status", "conditions"]).select("x]y");
        assert_eq!(bracketed.to_string(), "pod.status.conditions[\"x]y\"]");

        let escaped = EvidencePath::root().key("a").select(r#"q"b\s"#);
        assert_eq!(escaped.to_string(), r#"a["q\"b\\s"]"#);

        let empty = EvidencePath::root().key("a").select("");
        assert_eq!(empty.to_string(), r#"a[""]"#);
    }

    #[test]
    fn selectors_round_trip_through_text() {
        for selector in ["Ready", "1", "007", "x]y", "a[b", "dotted.name", r#"q"b\s"#, ""] {
            let path = EvidencePath::keys(["pod", "status", "containerStatuses"])
                .select(selector)
                .key("state");
            let back = EvidencePath::parse(&path.to_string()).unwrap();
            assert_eq!(back, path, "{selector:?}");
            assert!(matches!(back.segments()[3], Segment::Select(_)));

            let json = serde_json::to_string(&path).unwrap();
            let from_json: EvidencePath = serde_json::from_str(&json).unwrap();
            assert_eq!(from_json, path);
        }
        // Bare digits still mean a position.
        assert_eq!(EvidencePath::parse("a[1]").unwrap().segments()[1], Segment::Index(1));
    }

    #[test]
    fn serde_uses_display_string() {
        let path = EvidencePath::keys(["analysis_json", "summary"]);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"analysis_json.summary\"");
        let back: EvidencePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
