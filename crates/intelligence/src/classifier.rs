//! Signal → root-cause classification over a fixed rule table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::signals::{Signal, SignalVector};

/// Root-cause identifiers produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCause {
    ResourceExhaustion,
    ImageError,
    AppRuntimeError,
    SchedulingIssue,
    RolloutIssue,
    NodeFailure,
}

impl RootCause {
    pub fn as_str(self) -> &'static str {
        match self {
            RootCause::ResourceExhaustion => "resource_exhaustion",
            RootCause::ImageError => "image_error",
            RootCause::AppRuntimeError => "app_runtime_error",
            RootCause::SchedulingIssue => "scheduling_issue",
            RootCause::RolloutIssue => "rollout_issue",
            RootCause::NodeFailure => "node_failure",
        }
    }
}

impl fmt::Display for RootCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified root cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub root_cause: RootCause,
    pub confidence: f64,
    pub signals_triggered: Vec<Signal>,
    pub description: String,
}

/// A rule fires when `requires` is set and `unless` (if any) is not.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierRule {
    pub root_cause: RootCause,
    pub confidence: f64,
    pub requires: Signal,
    pub unless: Option<Signal>,
    pub description: &'static str,
}

impl ClassifierRule {
    fn fires(&self, signals: &SignalVector) -> bool {
        signals.is_set(self.requires) && !self.unless.is_some_and(|s| signals.is_set(s))
    }
}

/// Evaluation order is output order.
pub static RULES: &[ClassifierRule] = &[
    ClassifierRule {
        root_cause: RootCause::ResourceExhaustion,
        confidence: 0.95,
        requires: Signal::OomKilled,
        unless: None,
        description: "Container was killed due to exceeding memory limit (OOMKilled).",
    },
    ClassifierRule {
        root_cause: RootCause::ImageError,
        confidence: 0.99,
        requires: Signal::ImagePullBackOff,
        unless: None,
        description: "Image pull failed. Check image name, tag, and registry credentials.",
    },
    // A crash loop caused by OOM is already reported as resource exhaustion.
    ClassifierRule {
        root_cause: RootCause::AppRuntimeError,
        confidence: 0.80,
        requires: Signal::CrashLoopBackOff,
        unless: Some(Signal::OomKilled),
        description: "Application is crashing repeatedly. Check logs for error details.",
    },
    ClassifierRule {
        root_cause: RootCause::SchedulingIssue,
        confidence: 0.90,
        requires: Signal::Unschedulable,
        unless: None,
        description: "Pod cannot be scheduled. Check node resources, selectors, and taints.",
    },
    ClassifierRule {
        root_cause: RootCause::RolloutIssue,
        confidence: 0.85,
        requires: Signal::ReplicaMismatch,
        unless: None,
        description: "Ready replicas are less than desired. Rollout may be stalled.",
    },
    ClassifierRule {
        root_cause: RootCause::NodeFailure,
        confidence: 0.90,
        requires: Signal::NodeNotReady,
        unless: None,
        description: "Node is reporting NotReady status. Check kubelet and system resources.",
    },
];

/// Classify signals into findings, at most one per root cause.
pub fn classify(signals: &SignalVector) -> Vec<Finding> {
    RULES
        .iter()
        .filter(|rule| rule.fires(signals))
        .map(|rule| Finding {
            root_cause: rule.root_cause,
            confidence: rule.confidence,
            signals_triggered: vec![rule.requires],
            description: rule.description.to_string(),
        })
        .collect()
}
