//! Shared model for the cluster diagnosis core.
//!
//! - [`evidence`]: the evidence tree and total lookups over it
//! - [`path`]: typed dotted/bracketed locators into a tree
//! - [`analysis`]: the stored analysis record and its rendering
//! - [`config`]: environment-driven limits and logging defaults

pub mod analysis;
pub mod config;
pub mod error;
pub mod evidence;
pub mod path;

pub use analysis::*;
pub use config::Config;
pub use error::*;
pub use evidence::*;
pub use path::*;
