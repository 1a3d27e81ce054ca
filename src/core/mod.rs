//! Core building blocks shared by every stage
//!
//! - **clock**: the single sampled run date and its renderings
//! - **config**: nightly.toml parsing and validation
//! - **context**: immutable per-run context (trigger, date, config, gate decision)
//! - **error**: error types with contextual help and exit codes
//! - **process**: external command execution for the opaque build/merge/docs steps
//! - **vcs**: git operations (SystemGit)

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod process;
pub mod vcs;
