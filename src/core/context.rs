//! Run context - build once, pass everywhere
//!
//! # Design
//!
//! `RunContext` holds everything that is fixed for the lifetime of one pipeline
//! run: the trigger, the single sampled date, the loaded configuration and the
//! Activity Gate's decision. It is built once in the `run` command and passed by
//! reference into every stage. No stage re-reads the clock or the config file.
//!
//! ```text
//! commands/run.rs:
//!   TriggerContext + ReleaseDate::sample() + NightlyConfig::load()
//!   |
//!   gate::evaluate() -> ActivityDecision
//!   |
//!   v
//! RunContext (immutable) -> pipeline::Pipeline::run(&ctx)
//! ```

use crate::core::clock::ReleaseDate;
use crate::core::config::NightlyConfig;
use crate::gate::ActivityDecision;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What started this run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
  /// Cron-style nightly trigger, subject to the Activity Gate
  Scheduled,
  /// Operator-initiated; always proceeds
  Manual,
}

impl fmt::Display for TriggerKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TriggerKind::Scheduled => write!(f, "scheduled"),
      TriggerKind::Manual => write!(f, "manual"),
    }
  }
}

/// Run identifier (short SHA256 over trigger + start instant + pid)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
  /// Use an externally supplied identifier (e.g. the CI run number)
  pub fn external(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  /// Derive an identifier for a run that was not given one
  pub fn generate(trigger: TriggerKind, date: &ReleaseDate) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(trigger.to_string().as_bytes());
    hasher.update(date.instant().to_rfc3339().as_bytes());
    hasher.update(std::process::id().to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    Self(digest[..12].to_string())
  }

  #[cfg(test)]
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for RunId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Immutable trigger information, created at pipeline start
#[derive(Debug, Clone, Serialize)]
pub struct TriggerContext {
  pub kind: TriggerKind,
  pub run_id: RunId,
}

/// Everything a stage may read. Never mutated after construction.
#[derive(Clone)]
pub struct RunContext {
  /// Repository root (absolute path); config-relative paths resolve against it
  pub root: PathBuf,

  pub trigger: TriggerContext,

  /// The one instant this run is named after
  pub date: ReleaseDate,

  pub config: Arc<NightlyConfig>,

  /// Activity Gate output; every stage is gated on it
  pub decision: ActivityDecision,
}

impl RunContext {
  pub fn new(
    root: PathBuf,
    trigger: TriggerContext,
    date: ReleaseDate,
    config: Arc<NightlyConfig>,
    decision: ActivityDecision,
  ) -> Self {
    Self {
      root,
      trigger,
      date,
      config,
      decision,
    }
  }

  /// Resolve a config-relative path against the repository root
  pub fn resolve(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.root.join(path)
    }
  }

  /// Scratch area for this run's date
  pub fn work_dir(&self) -> PathBuf {
    self.resolve(&self.config.paths.work_dir).join(&self.date.dashed)
  }

  /// `<product>-nightly-<underscore date>`
  pub fn artifact_prefix(&self) -> String {
    self.date.artifact_prefix(&self.config.project.name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{TimeZone, Utc};

  #[test]
  fn test_run_id_is_short_hex() {
    let date = ReleaseDate::from_instant(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    let id = RunId::generate(TriggerKind::Scheduled, &date);
    assert_eq!(id.as_str().len(), 12);
    assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn test_external_run_id_kept_verbatim() {
    assert_eq!(RunId::external("4711").to_string(), "4711");
  }

  #[test]
  fn test_trigger_display() {
    assert_eq!(TriggerKind::Manual.to_string(), "manual");
    assert_eq!(TriggerKind::Scheduled.to_string(), "scheduled");
  }
}
