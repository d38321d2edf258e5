//! Signals → findings → confidence in one call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classifier::{classify, Finding};
use crate::scoring::{score_with, ScoringSpec};
use crate::signals::{extract, SignalVector};

/// Output of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineReport {
    pub signals: SignalVector,
    pub findings: Vec<Finding>,
    pub engine_confidence: f64,
}

impl EngineReport {
    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }
}

/// Run the engine with the default scoring constants.
pub fn analyze(evidence: &Value) -> EngineReport {
    analyze_with(evidence, &ScoringSpec::default())
}

pub fn analyze_with(evidence: &Value, scoring: &ScoringSpec) -> EngineReport {
    let signals = extract(evidence);
    let findings = classify(&signals);
    let engine_confidence = score_with(&signals, &findings, scoring);
    tracing::debug!(
        findings = findings.len(),
        engine_confidence,
        "engine analysis complete"
    );
    EngineReport {
        signals,
        findings,
        engine_confidence,
    }
}
