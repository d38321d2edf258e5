//! Engine confidence scoring and its YAML-loadable constants.
//!
//! The score is the strongest finding's confidence plus small, capped
//! bonuses for corroborating volume (restarts, warning events, additional
//! findings), clamped to the ceiling and rounded.

use serde::{Deserialize, Serialize};

use beaver_core::{BeaverError, Result};

use crate::classifier::Finding;
use crate::signals::SignalVector;

pub const SCORING_CONFIG_KIND: &str = "ScoringConfig";

// ── YAML-level types ────────────────────────────────────────────────

/// Top-level ScoringConfig document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ScoringMetadata,
    pub spec: ScoringSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringSpec {
    /// Bonus per container restart.
    #[serde(default = "Bonus::restarts")]
    pub restarts: Bonus,
    /// Bonus per Warning event.
    #[serde(default = "Bonus::warnings")]
    pub warning_events: Bonus,
    /// Bonus per finding beyond the first.
    #[serde(default = "Bonus::findings")]
    pub extra_findings: Bonus,
    #[serde(default = "default_ceiling")]
    pub ceiling: f64,
    /// Decimal places kept in the final score.
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

/// `min(count * per_unit, cap)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Bonus {
    pub per_unit: f64,
    pub cap: f64,
}

impl Bonus {
    fn restarts() -> Self {
        Self { per_unit: 0.01, cap: 0.05 }
    }

    fn warnings() -> Self {
        Self { per_unit: 0.01, cap: 0.05 }
    }

    fn findings() -> Self {
        Self { per_unit: 0.02, cap: 0.05 }
    }

    pub fn apply(&self, count: u64) -> f64 {
        (count as f64 * self.per_unit).min(self.cap)
    }

    fn is_valid(&self) -> bool {
        self.per_unit.is_finite() && self.cap.is_finite() && self.per_unit >= 0.0 && self.cap >= 0.0
    }
}

fn default_ceiling() -> f64 {
    1.0
}

fn default_decimals() -> u32 {
    4
}

impl Default for ScoringSpec {
    fn default() -> Self {
        Self {
            restarts: Bonus::restarts(),
            warning_events: Bonus::warnings(),
            extra_findings: Bonus::findings(),
            ceiling: default_ceiling(),
            decimals: default_decimals(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: SCORING_CONFIG_KIND.to_string(),
            metadata: ScoringMetadata {
                id: "scoring-default".to_string(),
                name: "Default engine scoring".to_string(),
                description: None,
            },
            spec: ScoringSpec::default(),
        }
    }
}

impl ScoringConfig {
    /// Parse and validate a ScoringConfig document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ScoringConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kind != SCORING_CONFIG_KIND {
            return Err(BeaverError::Config(format!(
                "expected kind {}, got {}",
                SCORING_CONFIG_KIND, self.kind
            )));
        }
        let spec = &self.spec;
        for (name, bonus) in [
            ("restarts", &spec.restarts),
            ("warning_events", &spec.warning_events),
            ("extra_findings", &spec.extra_findings),
        ] {
            if !bonus.is_valid() {
                return Err(BeaverError::Config(format!(
                    "{}: per_unit and cap must be finite and non-negative",
                    name
                )));
            }
        }
        if !(spec.ceiling > 0.0 && spec.ceiling <= 1.0) {
            return Err(BeaverError::Config(format!(
                "ceiling must be in (0, 1], got {}",
                spec.ceiling
            )));
        }
        if spec.decimals > 10 {
            return Err(BeaverError::Config(format!(
                "decimals must be at most 10, got {}",
                spec.decimals
            )));
        }
        Ok(())
    }
}

// ── Scoring ─────────────────────────────────────────────────────────

/// Score with the default constants.
pub fn score(signals: &SignalVector, findings: &[Finding]) -> f64 {
    score_with(signals, findings, &ScoringSpec::default())
}

pub fn score_with(signals: &SignalVector, findings: &[Finding], spec: &ScoringSpec) -> f64 {
    let Some(base) = findings
        .iter()
        .map(|f| f.confidence)
        .reduce(f64::max)
    else {
        return 0.0;
    };
    let extra = findings.len().saturating_sub(1) as u64;
    let raw = base
        + spec.restarts.apply(signals.restart_count)
        + spec.warning_events.apply(signals.warning_event_count)
        + spec.extra_findings.apply(extra);
    round_to(raw.min(spec.ceiling), spec.decimals)
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
