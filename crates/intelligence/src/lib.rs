//! Deterministic diagnosis: signal extraction, root-cause classification,
//! confidence scoring, the heuristic candidate table and cluster-scan
//! classification.

pub mod classifier;
pub mod diagnose;
pub mod engine;
pub mod heuristics;
pub mod prompt;
pub mod scan;
pub mod scoring;
pub mod signals;

pub use classifier::{classify, Finding, RootCause};
pub use diagnose::{diagnose, DiagnoseOptions, Diagnosis};
pub use engine::{analyze, analyze_with, EngineReport};
pub use heuristics::{lookup, Candidate, Condition, HeuristicMatch, Likelihood};
pub use prompt::{AnalysisPrompt, Target};
pub use scan::{scan_cluster, ClusterDump, ScanCategory, ScanFinding, ScanReport, Severity};
pub use scoring::{score, score_with, ScoringConfig, ScoringSpec};
pub use signals::{extract, Signal, SignalVector};
