use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub limits: LimitsConfig,
    pub scan: ScanConfig,
    pub log: LogConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `BEAVER_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("BEAVER_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            limits: LimitsConfig::from_env_profiled(p),
            scan: ScanConfig::from_env_profiled(p),
            log: LogConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  limits:  max_evidence_chars={}, max_compare_chars={}, max_log_lines={}, max_events={}",
            self.limits.max_evidence_chars,
            self.limits.max_compare_chars,
            self.limits.max_log_lines,
            self.limits.max_events
        );
        tracing::info!(
            "  scan:    max_findings={}, pending_minutes={}",
            self.scan.max_findings,
            self.scan.pending_minutes
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: String::new(),
            limits: LimitsConfig::default(),
            scan: ScanConfig::default(),
            log: LogConfig::default(),
        }
    }
}

// ── Limits ────────────────────────────────────────────────────

/// Size caps applied around the LLM boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitsConfig {
    /// Character budget for evidence embedded in an analysis prompt.
    pub max_evidence_chars: usize,
    /// Character budget for a compare prompt (diff + minimal context).
    pub max_compare_chars: usize,
    /// Lines kept from the tail of each container's log.
    pub max_log_lines: usize,
    /// Entries kept from the head of each event list.
    pub max_events: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_evidence_chars: 60_000,
            max_compare_chars: 8_000,
            max_log_lines: 200,
            max_events: 50,
        }
    }
}

impl LimitsConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            max_evidence_chars: profiled_env_usize(p, "MAX_EVIDENCE_CHARS", d.max_evidence_chars),
            max_compare_chars: profiled_env_usize(p, "MAX_COMPARE_CHARS", d.max_compare_chars),
            max_log_lines: profiled_env_usize(p, "MAX_LOG_LINES", d.max_log_lines),
            max_events: profiled_env_usize(p, "MAX_EVENTS", d.max_events),
        }
    }
}

// ── Scan ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanConfig {
    /// Cap on findings per scan to bound the payload.
    pub max_findings: usize,
    /// A pod Pending at least this long is reported as a finding.
    pub pending_minutes: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_findings: 200,
            pending_minutes: 5,
        }
    }
}

impl ScanConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            max_findings: profiled_env_usize(p, "SCAN_MAX_FINDINGS", d.max_findings),
            pending_minutes: profiled_env_u32(p, "SCAN_PENDING_MINUTES", d.pending_minutes),
        }
    }
}

// ── Logging ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl LogConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            level: profiled_env_or(p, "BEAVER_LOG_LEVEL", "warn"),
        }
    }
}
