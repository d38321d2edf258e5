//! Evidence sanitization before anything leaves the process.
//!
//! - [`redact`]: scrub secret-shaped keys and values
//! - [`truncate`]: shrink a tree to a character budget and report what was cut

pub mod redact;
pub mod truncate;

pub use redact::{
    redact, redact_text, redact_with_report, Redaction, RedactionReport, RedactionRule,
    REDACTED, REDACTED_BASE64, REDACTED_ENV,
};
pub use truncate::{
    truncate, truncate_log_lines, truncate_with, TruncationPolicy, TruncationReport,
};
