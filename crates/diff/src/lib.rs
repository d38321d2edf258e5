//! Structural comparison of two stored diagnoses.
//!
//! - [`snapshot`]: evidence plus analysis, salvaged from stored text
//! - [`engine`]: the ordered diff rules
//! - [`report`]: bullets, the explanation prompt and its answer

pub mod change;
pub mod engine;
pub mod report;
pub mod snapshot;

pub use change::{ChangeKind, ChangeRecord};
pub use engine::diff;
pub use report::{
    parse_compare_response, render_bullets, CompareExplanation, ComparePrompt, Comparison, SnapshotMeta,
    COMPARE_SYSTEM,
};
pub use snapshot::{parse_stored_evidence, salvage, Snapshot};
